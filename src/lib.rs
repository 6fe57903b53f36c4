// Library root
// -----------
// Client library for the Olog electronic logbook service. The `olog`
// binary (`main.rs`) is a thin command line front end over these modules.
//
// Module responsibilities:
// - `model`: log entries, logbooks, tags, properties and attachments.
// - `codec`: JSON encoding/decoding matching the Olog REST schema.
// - `api`: blocking HTTP client, one request per operation.
// - `config`: `pyOlog.conf` lookup (url, username, password, defaults).
// - `credentials`: username/password resolution (config, keyring, prompt).
// - `simple`: string-based convenience client with name verification.
// - `handler`: `tracing` layer that posts events as log entries.
// - `cli` / `ui`: argument parsing and terminal flows for the binary.
pub mod api;
pub mod cli;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod model;
pub mod simple;
pub mod ui;

pub use api::{ClientConfig, DeleteTarget, OlogClient, SearchQuery};
pub use error::{OlogError, Result};
pub use model::{Attachment, LogEntry, Logbook, Property, Tag};
pub use simple::{LogRequest, SimpleClient};

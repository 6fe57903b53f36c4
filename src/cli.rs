// Command line arguments for the `olog` binary.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

const AFTER_HELP: &str = "\
Example:
  olog -l Operations -t Data -u swilkins -a ./image.png

This makes a log entry into the 'Operations' logbook tagged 'Data' from the
account 'swilkins' with 'image.png' attached. The text is read from stdin
when it is piped in, from --file when given, and from $EDITOR otherwise.

Defaults for the URL, username, logbooks and tags are read from
/etc/pyOlog.conf, ~/pyOlog.conf, ~/.pyOlog.conf and ./pyOlog.conf.";

#[derive(Parser, Debug)]
#[command(
    name = "olog",
    version,
    about = "Command line utility for making Olog entries",
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[command(flatten)]
    pub conn: Connection,

    #[command(flatten)]
    pub entry: EntryArgs,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct Connection {
    /// Base URL of the Olog service
    #[arg(long, global = true, env = "OLOG_URL")]
    pub url: Option<String>,

    /// Username for Olog access
    #[arg(short = 'u', long = "user", global = true)]
    pub username: Option<String>,

    /// Password (otherwise config file, keyring, then prompt)
    #[arg(short = 'p', long = "passwd", global = true)]
    pub password: Option<String>,

    /// Never ask for a password on the terminal
    #[arg(long, global = true)]
    pub no_prompt: bool,

    /// Do not send credentials at all
    #[arg(long, global = true, conflicts_with_all = ["username", "password"])]
    pub anonymous: bool,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EntryArgs {
    /// Logbook name(s); repeat or separate with commas
    #[arg(short, long, value_delimiter = ',')]
    pub logbooks: Vec<String>,

    /// Tag name(s); repeat or separate with commas
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// File containing the log entry text
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Files to attach
    #[arg(short, long = "attach", value_delimiter = ',')]
    pub attachments: Vec<PathBuf>,

    /// Property as NAME:KEY=VALUE (repeatable)
    #[arg(long = "property", value_name = "NAME:KEY=VALUE")]
    pub properties: Vec<String>,

    /// Post even if a logbook or tag is unknown to the server
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search log entries, e.g. `olog find logbook=Operations tag=RF`
    Find {
        /// Search parameters as KEY=VALUE, passed to the server in order
        #[arg(value_name = "KEY=VALUE", required = true)]
        params: Vec<String>,
    },

    /// List logbook names
    Logbooks,

    /// List tag names
    Tags,

    /// List properties and their attribute keys
    Properties,

    /// Download the attachments of a log entry
    Attachments {
        id: u64,
        /// Directory to save the files into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Create a logbook
    CreateLogbook {
        name: String,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Create a tag
    CreateTag {
        name: String,
        #[arg(long)]
        inactive: bool,
    },

    /// Create a property with the given attribute keys
    CreateProperty {
        name: String,
        keys: Vec<String>,
    },

    /// Delete exactly one log entry, logbook, tag or property
    #[command(group(ArgGroup::new("target").required(true).args(["entry", "logbook", "tag", "property"])))]
    Delete {
        #[arg(long)]
        entry: Option<u64>,
        #[arg(long)]
        logbook: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        property: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Splits `KEY=VALUE`.
pub fn parse_pair(s: &str) -> Option<(String, String)> {
    let (k, v) = s.split_once('=')?;
    let k = k.trim();
    if k.is_empty() {
        return None;
    }
    Some((k.to_string(), v.trim().to_string()))
}

/// Splits `NAME:KEY=VALUE`.
pub fn parse_property(s: &str) -> Option<(String, String, String)> {
    let (name, pair) = s.split_once(':')?;
    let (k, v) = parse_pair(pair)?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), k, v))
}

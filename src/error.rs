// Error taxonomy for the library. The binary wraps these in `anyhow` at the
// edge; everything under `olog::` returns `olog::Result`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OlogError {
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    /// The log entry was created but one of its attachments failed to upload.
    #[error("Log entry {entry_id} created, but uploading attachment '{file_name}' failed: {source}")]
    AttachmentUpload {
        entry_id: u64,
        file_name: String,
        #[source]
        source: Box<OlogError>,
    },

    /// A username is known but no password could be found.
    #[error("No password available for Olog user '{0}'")]
    AuthConfig(String),

    /// The caller asked for something the client refuses to send.
    #[error("Invalid usage: {0}")]
    Usage(String),

    /// A response object lacks required fields.
    #[error("Cannot decode {entity}: missing field(s) {}", .missing.join(", "))]
    Decode {
        entity: String,
        missing: Vec<String>,
    },

    /// A response value has the wrong shape.
    #[error("Cannot decode {entity}: {detail}")]
    Malformed { entity: String, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error in {}:{line}: {detail}", .path.display())]
    Config {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("Invalid base URL '{url}': {detail}")]
    Url { url: String, detail: String },
}

pub type Result<T> = std::result::Result<T, OlogError>;

impl OlogError {
    pub(crate) fn malformed(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        OlogError::Malformed {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// HTTP status for `Http` errors, looking through attachment failures.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            OlogError::Http { status, .. } => Some(*status),
            OlogError::AttachmentUpload { source, .. } => source.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_lists_every_missing_field() {
        let e = OlogError::Decode {
            entity: "log entry".into(),
            missing: vec!["id".into(), "createdDate".into()],
        };
        assert_eq!(
            e.to_string(),
            "Cannot decode log entry: missing field(s) id, createdDate"
        );
    }

    #[test]
    fn status_sees_through_attachment_failures() {
        let inner = OlogError::Http {
            status: reqwest::StatusCode::FORBIDDEN,
            url: "http://x/resources/attachments/3".into(),
            body: String::new(),
        };
        let e = OlogError::AttachmentUpload {
            entry_id: 3,
            file_name: "a.png".into(),
            source: Box::new(inner),
        };
        assert_eq!(e.status(), Some(reqwest::StatusCode::FORBIDDEN));
        assert!(e.to_string().contains("a.png"));
    }
}

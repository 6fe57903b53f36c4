// Convenience layer over `OlogClient` taking plain strings instead of model
// values, and checking logbook/tag names against the server before posting.

use crate::api::{ClientConfig, DeleteTarget, OlogClient, SearchQuery};
use crate::error::{OlogError, Result};
use crate::model::{Attachment, LogEntry, Logbook, Property, Tag};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Flattened, name-only view of a stored entry. Attachments are not part of
/// a search result; `OlogClient::list_attachments` fetches them by id.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub id: u64,
    pub create_time: Option<DateTime<Utc>>,
    pub modify_time: Option<DateTime<Utc>>,
    pub text: String,
    pub owner: Option<String>,
    pub logbooks: Vec<String>,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, BTreeMap<String, String>>,
}

impl EntrySummary {
    /// `None` for entries that were never stored.
    pub fn from_entry(entry: &LogEntry) -> Option<Self> {
        Some(EntrySummary {
            id: entry.id()?,
            create_time: entry.create_time(),
            modify_time: entry.modify_time(),
            text: entry.text.clone(),
            owner: entry.owner.clone(),
            logbooks: entry.logbooks.iter().map(|l| l.name.clone()).collect(),
            tags: entry.tags.iter().map(|t| t.name.clone()).collect(),
            properties: entry
                .properties
                .iter()
                .map(|p| (p.name.clone(), p.attributes.clone()))
                .collect(),
        })
    }
}

/// Attachment given either as a path on disk or a ready value.
#[derive(Debug, Clone)]
pub enum AttachmentSpec {
    Path(PathBuf),
    Value(Attachment),
}

impl From<PathBuf> for AttachmentSpec {
    fn from(p: PathBuf) -> Self {
        AttachmentSpec::Path(p)
    }
}

impl From<&str> for AttachmentSpec {
    fn from(p: &str) -> Self {
        AttachmentSpec::Path(PathBuf::from(p))
    }
}

impl From<Attachment> for AttachmentSpec {
    fn from(a: Attachment) -> Self {
        AttachmentSpec::Value(a)
    }
}

/// Arguments for [`SimpleClient::log`].
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub text: String,
    pub logbooks: Vec<String>,
    pub tags: Vec<String>,
    pub properties: Vec<Property>,
    pub attachments: Vec<AttachmentSpec>,
    /// Check logbook and tag names exist on the server first.
    pub verify: bool,
}

impl LogRequest {
    pub fn new(text: impl Into<String>) -> Self {
        LogRequest {
            text: text.into(),
            logbooks: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
            attachments: Vec::new(),
            verify: true,
        }
    }

    pub fn logbook(mut self, name: impl Into<String>) -> Self {
        self.logbooks.push(name.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn attach(mut self, attachment: impl Into<AttachmentSpec>) -> Self {
        self.attachments.push(attachment.into());
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

pub struct SimpleClient {
    session: OlogClient,
}

impl SimpleClient {
    pub fn new(settings: ClientConfig) -> Result<Self> {
        Ok(SimpleClient {
            session: OlogClient::new(settings)?,
        })
    }

    pub fn from_client(session: OlogClient) -> Self {
        SimpleClient { session }
    }

    pub fn client(&self) -> &OlogClient {
        &self.session
    }

    /// Names of all logbooks on the server.
    pub fn logbooks(&self) -> Result<Vec<String>> {
        Ok(self.session.list_logbooks()?.into_iter().map(|l| l.name).collect())
    }

    /// Names of all tags on the server.
    pub fn tags(&self) -> Result<Vec<String>> {
        Ok(self.session.list_tags()?.into_iter().map(|t| t.name).collect())
    }

    pub fn create_logbook(&self, name: &str, owner: Option<&str>) -> Result<()> {
        let logbook = match owner {
            Some(o) => Logbook::with_owner(name, o),
            None => Logbook::new(name),
        };
        self.session.create_logbook(&logbook)
    }

    pub fn create_tag(&self, name: &str, active: bool) -> Result<()> {
        self.session.create_tag(&Tag::with_active(name, active))
    }

    pub fn create_property<I, S>(&self, name: &str, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session.create_property(&Property::with_keys(name, keys))
    }

    pub fn find(&self, query: &SearchQuery) -> Result<Vec<EntrySummary>> {
        Ok(self
            .session
            .find(query)?
            .iter()
            .filter_map(EntrySummary::from_entry)
            .collect())
    }

    /// Creates an entry from plain names. With `verify`, every logbook and
    /// tag must already exist on the server or nothing is posted.
    pub fn log(&self, request: LogRequest) -> Result<LogEntry> {
        if request.verify {
            if !request.logbooks.is_empty() {
                check_known("Logbook", &request.logbooks, &self.logbooks()?)?;
            }
            if !request.tags.is_empty() {
                check_known("Tag", &request.tags, &self.tags()?)?;
            }
        }

        let mut entry = LogEntry::new(request.text);
        for name in request.logbooks {
            entry = entry.logbook(Logbook::new(name));
        }
        for name in request.tags {
            entry = entry.tag(Tag::new(name));
        }
        for property in request.properties {
            entry = entry.property(property);
        }
        for spec in request.attachments {
            let attachment = match spec {
                AttachmentSpec::Path(p) => Attachment::from_path(p)?,
                AttachmentSpec::Value(a) => a,
            };
            entry = entry.attachment(attachment);
        }
        self.session.log(&entry)
    }

    /// Deletes using keyword-style selectors, e.g. `[("tagName", "RF")]`.
    pub fn delete<K, V>(&self, selectors: &[(K, V)]) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let target = DeleteTarget::from_selectors(selectors)?;
        self.session.delete(&target)
    }
}

fn check_known(kind: &str, wanted: &[String], known: &[String]) -> Result<()> {
    let unknown: Vec<&str> = wanted
        .iter()
        .filter(|w| !known.contains(*w))
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(OlogError::Usage(format!(
            "{kind} does not exist in Olog: {}",
            unknown.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_known_names_every_missing_name() {
        let known = vec!["Operations".to_string(), "Controls".to_string()];
        assert!(check_known("Logbook", &["Controls".into()], &known).is_ok());
        let err = check_known("Logbook", &["Ops".into(), "Controls".into(), "X".into()], &known)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid usage: Logbook does not exist in Olog: Ops, X");
    }

    #[test]
    fn unsaved_entries_have_no_summary() {
        assert_eq!(EntrySummary::from_entry(&LogEntry::new("draft")), None);
    }

    #[test]
    fn log_request_defaults_to_verifying() {
        let r = LogRequest::new("hi").logbook("Ops").tag("RF").attach("/tmp/x.png");
        assert!(r.verify);
        assert_eq!(r.logbooks, vec!["Ops"]);
        assert!(matches!(r.attachments[0], AttachmentSpec::Path(_)));
    }
}

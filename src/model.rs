// Domain model: the entities the Olog service stores. Entities reference
// each other by name; the server holds the canonical copy, the client only
// builds values to send and reads back what the server returns.

use crate::error::{OlogError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const TAG_ACTIVE: &str = "Active";
pub const TAG_INACTIVE: &str = "Inactive";

/// A named category into which log entries are filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logbook {
    pub name: String,
    pub owner: Option<String>,
}

impl Logbook {
    pub fn new(name: impl Into<String>) -> Self {
        Logbook {
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Logbook {
            name: name.into(),
            owner: Some(owner.into()),
        }
    }
}

/// A label attachable to many entries. `state` is `"Active"` or `"Inactive"`
/// on every server seen so far, but it is kept as free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub state: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Tag::with_active(name, true)
    }

    pub fn with_active(name: impl Into<String>, active: bool) -> Self {
        Tag {
            name: name.into(),
            state: if active { TAG_ACTIVE } else { TAG_INACTIVE }.to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.eq_ignore_ascii_case(TAG_ACTIVE)
    }
}

/// A named bag of string key/value metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Property {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Property definition with the given attribute keys and empty values,
    /// the shape the service expects when a property is first created.
    pub fn with_keys<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes = keys
            .into_iter()
            .map(|k| (k.into(), String::new()))
            .collect();
        Property {
            name: name.into(),
            attributes,
        }
    }

    /// Adds an attribute; the value is stored in its string form.
    pub fn attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Clone, PartialEq, Eq)]
enum Source {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// A file attached to a log entry.
///
/// Path-backed attachments are not read until upload, and the file is only
/// held open for the duration of that request.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    file_name: String,
    source: Source,
}

impl Attachment {
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Attachment {
            file_name: file_name.into(),
            source: Source::Bytes(data.into()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                OlogError::Usage(format!("attachment path has no file name: {}", path.display()))
            })?
            .to_string();
        Ok(Attachment {
            file_name,
            source: Source::File(path.to_path_buf()),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(p) => Some(p),
            Source::Bytes(_) => None,
        }
    }

    /// In-memory content, if this attachment was built from bytes or
    /// downloaded from the server.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.source {
            Source::Bytes(b) => Some(b),
            Source::File(_) => None,
        }
    }

    /// Reads the content, from memory or from disk.
    pub fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            Source::Bytes(b) => Ok(b.clone()),
            Source::File(p) => Ok(std::fs::read(p)?),
        }
    }

    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    pub(crate) fn into_part(self) -> Result<reqwest::blocking::multipart::Part> {
        use reqwest::blocking::multipart::Part;
        let mime = self.content_type();
        let part = match self.source {
            Source::Bytes(b) => Part::bytes(b),
            Source::File(p) => {
                let file = std::fs::File::open(&p)?;
                let len = file.metadata()?.len();
                Part::reader_with_length(file, len)
            }
        };
        part.file_name(self.file_name)
            .mime_str(&mime)
            .map_err(OlogError::Transport)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Attachment");
        d.field("file_name", &self.file_name);
        match &self.source {
            Source::Bytes(b) => d.field("bytes", &b.len()),
            Source::File(p) => d.field("path", p),
        };
        d.finish()
    }
}

/// A single log entry.
///
/// `id`, `create_time` and `modify_time` are assigned by the server and are
/// only ever filled in by decoding a response: an entry whose `id()` is
/// `None` has never been persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    pub(crate) id: Option<u64>,
    pub(crate) create_time: Option<DateTime<Utc>>,
    pub(crate) modify_time: Option<DateTime<Utc>>,
    pub text: String,
    pub owner: Option<String>,
    pub logbooks: Vec<Logbook>,
    pub tags: Vec<Tag>,
    pub properties: Vec<Property>,
    pub attachments: Vec<Attachment>,
}

impl LogEntry {
    pub fn new(text: impl Into<String>) -> Self {
        LogEntry {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    pub fn modify_time(&self) -> Option<DateTime<Utc>> {
        self.modify_time
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn logbook(mut self, logbook: Logbook) -> Self {
        if !self.logbooks.iter().any(|l| l.name == logbook.name) {
            self.logbooks.push(logbook);
        }
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        if !self.tags.iter().any(|t| t.name == tag.name) {
            self.tags.push(tag);
        }
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        if !self.properties.iter().any(|p| p.name == property.name) {
            self.properties.push(property);
        }
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn logbook_names(&self) -> Vec<&str> {
        self.logbooks.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_keep_name_sets_unique_and_ordered() {
        let e = LogEntry::new("beam dump")
            .logbook(Logbook::new("Operations"))
            .logbook(Logbook::new("Controls"))
            .logbook(Logbook::new("Operations"))
            .tag(Tag::new("RF"))
            .tag(Tag::with_active("RF", false));
        assert_eq!(e.logbook_names(), vec!["Operations", "Controls"]);
        assert_eq!(e.tags.len(), 1);
        assert!(e.tags[0].is_active());
        assert!(!e.is_persisted());
    }

    #[test]
    fn property_attributes_are_stringified() {
        let p = Property::new("motor").attribute("position", 12).attribute("moving", false);
        assert_eq!(p.get("position"), Some("12"));
        assert_eq!(p.get("moving"), Some("false"));
    }

    #[test]
    fn with_keys_leaves_values_empty() {
        let p = Property::with_keys("context", ["scan", "run"]);
        assert_eq!(p.attributes.len(), 2);
        assert_eq!(p.get("scan"), Some(""));
    }

    #[test]
    fn attachment_content_type_follows_extension() {
        assert_eq!(Attachment::from_bytes("plot.png", vec![1]).content_type(), "image/png");
        assert_eq!(
            Attachment::from_bytes("blob", vec![1]).content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn attachment_from_path_reads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let a = Attachment::from_path(&path).unwrap();
        assert_eq!(a.file_name(), "notes.txt");
        assert!(a.read().is_err());
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(a.read().unwrap(), b"hello");
    }
}

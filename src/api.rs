// API client module: a small blocking HTTP client for the Olog REST
// resources. Each method is exactly one request (plus one per attachment
// for `log`), with no retries and no caching.

use crate::codec;
use crate::config::Config;
use crate::credentials::{CredentialResolver, Credentials};
use crate::error::{OlogError, Result};
use crate::model::{Attachment, LogEntry, Logbook, Property, Tag};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

const LOGS: &str = "logs";
const LOGBOOKS: &str = "logbooks";
const TAGS: &str = "tags";
const PROPERTIES: &str = "properties";
const ATTACHMENTS: &str = "attachments";

const JSON: &str = "application/json";

/// Ordered search parameters for [`OlogClient::find`]. Keys are forwarded
/// verbatim; the server decides which ones it understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new() -> Self {
        SearchQuery::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Full text search; `*` wildcards are passed through.
    pub fn search(self, text: impl ToString) -> Self {
        self.param("search", text)
    }

    pub fn tag(self, name: impl ToString) -> Self {
        self.param("tag", name)
    }

    pub fn logbook(self, name: impl ToString) -> Self {
        self.param("logbook", name)
    }

    pub fn property(self, name: impl ToString) -> Self {
        self.param("property", name)
    }

    /// Epoch seconds.
    pub fn start(self, epoch: impl ToString) -> Self {
        self.param("start", epoch)
    }

    pub fn end(self, epoch: impl ToString) -> Self {
        self.param("end", epoch)
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// What to delete. Names are trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    LogEntry(u64),
    Logbook(String),
    Tag(String),
    Property(String),
}

impl DeleteTarget {
    /// Builds a target from keyword-style selectors (`logEntryId`,
    /// `logbookName`, `tagName`, `propertyName`). Exactly one is allowed.
    pub fn from_selectors<K, V>(selectors: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let [(key, value)] = selectors else {
            return Err(OlogError::Usage(format!(
                "can only delete a single logbook/tag/property/log entry, got {} selectors",
                selectors.len()
            )));
        };
        let value = value.as_ref().trim();
        match key.as_ref() {
            "logEntryId" => value.parse().map(DeleteTarget::LogEntry).map_err(|_| {
                OlogError::Usage(format!("logEntryId must be numeric, got {value:?}"))
            }),
            "logbookName" => non_blank(key.as_ref(), value).map(DeleteTarget::Logbook),
            "tagName" => non_blank(key.as_ref(), value).map(DeleteTarget::Tag),
            "propertyName" => non_blank(key.as_ref(), value).map(DeleteTarget::Property),
            other => Err(OlogError::Usage(format!("unknown delete selector `{other}`"))),
        }
    }

    /// Collection and key. A blank name would address the whole collection,
    /// so it is refused here as well.
    fn resource(&self) -> Result<(&'static str, String)> {
        match self {
            DeleteTarget::LogEntry(id) => Ok((LOGS, id.to_string())),
            DeleteTarget::Logbook(n) => Ok((LOGBOOKS, non_blank("logbookName", n)?)),
            DeleteTarget::Tag(n) => Ok((TAGS, non_blank("tagName", n)?)),
            DeleteTarget::Property(n) => Ok((PROPERTIES, non_blank("propertyName", n)?)),
        }
    }
}

fn non_blank(selector: &str, name: &str) -> Result<String> {
    match name.trim() {
        "" => Err(OlogError::Usage(format!("{selector} must not be blank"))),
        name => Ok(name.to_string()),
    }
}

/// Everything needed to build an [`OlogClient`]. Unset fields fall back to
/// the config files.
pub struct ClientConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    prompt: bool,
    anonymous: bool,
    accept_invalid_certs: Option<bool>,
    timeout: Option<Duration>,
    config: Option<Config>,
    resolver: Option<CredentialResolver>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: None,
            username: None,
            password: None,
            prompt: true,
            anonymous: false,
            accept_invalid_certs: None,
            timeout: None,
            config: None,
            resolver: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        ClientConfig::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn credentials(self, credentials: Credentials) -> Self {
        self.username(credentials.username).password(credentials.password)
    }

    /// Whether the terminal may be used to ask for a password.
    pub fn prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Skip credential resolution and never send authentication.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Disables TLS certificate verification. Only for servers with
    /// self-signed certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = Some(accept);
        self
    }

    /// No timeout is applied unless one is set here.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use this configuration instead of reading the standard files.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Blocking client for one Olog server. Credentials are fixed at
/// construction; build a new client to change them.
#[derive(Clone)]
pub struct OlogClient {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl OlogClient {
    pub fn new(settings: ClientConfig) -> Result<Self> {
        let config = match settings.config {
            Some(c) => c,
            None => Config::load()?,
        };
        let url = config.value("url", settings.url.as_deref()).unwrap_or_else(|| config.url());
        let base_url = parse_base(&url)?;
        info!(url = %base_url, "using base URL");

        let credentials = if settings.anonymous {
            info!("anonymous session requested");
            None
        } else {
            let resolver = settings
                .resolver
                .unwrap_or_else(|| CredentialResolver::standard(settings.prompt));
            resolver.resolve(
                settings.username.as_deref(),
                settings.password.as_deref(),
                &config,
            )?
        };
        match &credentials {
            Some(c) => info!(username = %c.username, "using basic authentication"),
            None => info!("no authentication configured"),
        }

        let insecure = insecure(settings.accept_invalid_certs, &config);
        if insecure {
            warn!("TLS certificate verification is disabled");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(settings.timeout)
            .build()?;
        Ok(OlogClient {
            client,
            base_url,
            credentials,
        })
    }

    /// Client configured entirely from the config files, prompting for a
    /// password if needed.
    pub fn from_config_files() -> Result<Self> {
        OlogClient::new(ClientConfig::new())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    fn resource(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("resources").extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, json_body: bool) -> RequestBuilder {
        let mut req = self.client.request(method, url).header(ACCEPT, JSON);
        if json_body {
            req = req.header(CONTENT_TYPE, JSON);
        }
        if let Some(c) = &self.credentials {
            req = req.basic_auth(&c.username, Some(&c.password));
        }
        req
    }

    fn send(&self, req: RequestBuilder) -> Result<Response> {
        let req = req.build()?;
        let method = req.method().clone();
        let url = req.url().to_string();
        debug!(%method, %url, "request");
        let res = self.client.execute(req)?;
        let status = res.status();
        debug!(%method, %url, %status, "response");
        if !status.is_success() {
            let body = res.text().unwrap_or_else(|_| "".into());
            return Err(OlogError::Http { status, url, body });
        }
        Ok(res)
    }

    fn get_json(&self, url: Url) -> Result<serde_json::Value> {
        let res = self.send(self.request(Method::GET, url, true))?;
        Ok(res.json()?)
    }

    /// Creates a log entry, then uploads each of its attachments.
    ///
    /// An attachment failure is returned as [`OlogError::AttachmentUpload`];
    /// the entry itself stays created and later attachments are skipped.
    pub fn log(&self, entry: &LogEntry) -> Result<LogEntry> {
        let body = codec::encode_log_entry(entry);
        let res = self.send(self.request(Method::POST, self.resource(&[LOGS]), true).json(&body))?;
        let created = codec::decode_created_entry(&res.json::<serde_json::Value>()?)?;
        let id = created
            .id()
            .ok_or_else(|| OlogError::malformed("created log entry", "server assigned no id"))?;
        info!(id, "log entry created");

        for attachment in &entry.attachments {
            let file_name = attachment.file_name().to_string();
            self.upload_attachment(id, attachment.clone())
                .map_err(|e| OlogError::AttachmentUpload {
                    entry_id: id,
                    file_name,
                    source: Box::new(e),
                })?;
        }
        Ok(created)
    }

    /// Adds one file to an existing entry as a multipart `file` field.
    pub fn upload_attachment(&self, entry_id: u64, attachment: Attachment) -> Result<()> {
        let id = entry_id.to_string();
        let url = self.resource(&[ATTACHMENTS, id.as_str()]);
        let file_name = attachment.file_name().to_string();
        let form = multipart::Form::new().part("file", attachment.into_part()?);
        self.send(self.request(Method::POST, url, false).multipart(form))?;
        info!(entry_id, file = %file_name, "attachment uploaded");
        Ok(())
    }

    pub fn create_logbook(&self, logbook: &Logbook) -> Result<()> {
        let url = self.resource(&[LOGBOOKS, logbook.name.as_str()]);
        self.send(self.request(Method::PUT, url, true).json(&codec::encode_logbook(logbook)))?;
        Ok(())
    }

    pub fn create_tag(&self, tag: &Tag) -> Result<()> {
        let url = self.resource(&[TAGS, tag.name.as_str()]);
        self.send(self.request(Method::PUT, url, true).json(&codec::encode_tag(tag)))?;
        Ok(())
    }

    pub fn create_property(&self, property: &Property) -> Result<()> {
        let url = self.resource(&[PROPERTIES, property.name.as_str()]);
        self.send(self.request(Method::PUT, url, true).json(&codec::encode_property(property)))?;
        Ok(())
    }

    /// Searches for entries; results come back in server order.
    ///
    /// ```no_run
    /// # use olog::api::{OlogClient, ClientConfig, SearchQuery};
    /// let client = OlogClient::new(ClientConfig::new().anonymous())?;
    /// let entries = client.find(&SearchQuery::new().logbook("controls").tag("magnets"))?;
    /// # Ok::<(), olog::OlogError>(())
    /// ```
    pub fn find(&self, query: &SearchQuery) -> Result<Vec<LogEntry>> {
        let req = self
            .request(Method::GET, self.resource(&[LOGS]), true)
            .query(query.params());
        let res = self.send(req)?;
        codec::decode_log_entries(&res.json::<serde_json::Value>()?)
    }

    /// Lists an entry's attachments and downloads each of them.
    pub fn list_attachments(&self, entry_id: u64) -> Result<Vec<Attachment>> {
        let id = entry_id.to_string();
        let names = codec::decode_attachment_names(&self.get_json(self.resource(&[ATTACHMENTS, id.as_str()]))?)?;
        let mut attachments = Vec::with_capacity(names.len());
        for name in names {
            let url = self.resource(&[ATTACHMENTS, id.as_str(), name.as_str()]);
            let res = self.send(self.request(Method::GET, url, false))?;
            let data = res.bytes()?;
            attachments.push(Attachment::from_bytes(name, data.to_vec()));
        }
        Ok(attachments)
    }

    pub fn list_logbooks(&self) -> Result<Vec<Logbook>> {
        codec::decode_logbooks(&self.get_json(self.resource(&[LOGBOOKS]))?)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        codec::decode_tags(&self.get_json(self.resource(&[TAGS]))?)
    }

    pub fn list_properties(&self) -> Result<Vec<Property>> {
        codec::decode_properties(&self.get_json(self.resource(&[PROPERTIES]))?)
    }

    pub fn delete(&self, target: &DeleteTarget) -> Result<()> {
        let (collection, key) = target.resource()?;
        let url = self.resource(&[collection, key.as_str()]);
        self.send(self.request(Method::DELETE, url, true))?;
        info!(?target, "deleted");
        Ok(())
    }
}

/// Whether to skip certificate checks. An explicit choice wins over
/// `verify_ssl` in the config; verification stays on otherwise.
fn insecure(explicit: Option<bool>, config: &Config) -> bool {
    explicit
        .or_else(|| config.flag("verify_ssl").map(|verify| !verify))
        .unwrap_or(false)
}

fn parse_base(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| OlogError::Url {
        url: url.to_string(),
        detail: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(OlogError::Url {
            url: url.to_string(),
            detail: "not a hierarchical URL".into(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> OlogClient {
        OlogClient::new(ClientConfig::new().url(url).anonymous().config(Config::default())).unwrap()
    }

    #[test]
    fn resource_paths_hang_off_the_base() {
        let c = client("http://localhost:8181/Olog");
        assert_eq!(
            c.resource(&[LOGBOOKS, "Operations"]).as_str(),
            "http://localhost:8181/Olog/resources/logbooks/Operations"
        );
        let c = client("http://localhost:8181/Olog/");
        assert_eq!(
            c.resource(&[LOGS]).as_str(),
            "http://localhost:8181/Olog/resources/logs"
        );
    }

    #[test]
    fn names_are_percent_encoded_in_paths() {
        let c = client("http://h/Olog");
        assert_eq!(
            c.resource(&[TAGS, "beam line/2"]).as_str(),
            "http://h/Olog/resources/tags/beam%20line%2F2"
        );
    }

    #[test]
    fn selectors_must_name_exactly_one_target() {
        let none: [(&str, &str); 0] = [];
        assert!(matches!(DeleteTarget::from_selectors(&none), Err(OlogError::Usage(_))));
        assert!(matches!(
            DeleteTarget::from_selectors(&[("logbookName", "A"), ("tagName", "B")]),
            Err(OlogError::Usage(_))
        ));
        assert!(matches!(
            DeleteTarget::from_selectors(&[("channelName", "A")]),
            Err(OlogError::Usage(_))
        ));
        assert_eq!(
            DeleteTarget::from_selectors(&[("logbookName", "  X ")]).unwrap(),
            DeleteTarget::Logbook("X".into())
        );
        assert_eq!(
            DeleteTarget::from_selectors(&[("logEntryId", "42")]).unwrap(),
            DeleteTarget::LogEntry(42)
        );
    }

    #[test]
    fn blank_names_are_not_delete_targets() {
        for key in ["logbookName", "tagName", "propertyName"] {
            assert!(matches!(
                DeleteTarget::from_selectors(&[(key, "   ")]),
                Err(OlogError::Usage(_))
            ));
        }
        assert!(matches!(
            DeleteTarget::Tag(" ".into()).resource(),
            Err(OlogError::Usage(_))
        ));
    }

    #[test]
    fn certificates_are_verified_unless_turned_off() {
        let mut config = Config::default();
        assert!(!insecure(None, &config));

        config.set("verify_ssl", "false");
        assert!(insecure(None, &config));
        assert!(!insecure(Some(false), &config));

        config.set("verify_ssl", "true");
        assert!(insecure(Some(true), &config));
        assert!(!insecure(None, &config));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let r = OlogClient::new(ClientConfig::new().url("not a url").anonymous().config(Config::default()));
        assert!(matches!(r, Err(OlogError::Url { .. })));
    }

    #[test]
    fn search_query_keeps_insertion_order() {
        let q = SearchQuery::new().logbook("controls").tag("magnets").param("custom", 1);
        let keys: Vec<&str> = q.params().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["logbook", "tag", "custom"]);
    }
}

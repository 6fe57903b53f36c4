// Forwards application log events to Olog as log entries.

use crate::simple::{LogRequest, SimpleClient};
use std::cell::Cell;
use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// Targets whose events would be produced by posting itself.
const SKIPPED_TARGETS: [&str; 5] = ["olog", "reqwest", "hyper", "rustls", "h2"];

thread_local! {
    static POSTING: Cell<bool> = const { Cell::new(false) };
}

/// `tracing` layer that posts each event at or above its level as a log entry.
///
/// ```no_run
/// use olog::api::ClientConfig;
/// use olog::handler::OlogLayer;
/// use olog::simple::SimpleClient;
/// use tracing_subscriber::prelude::*;
///
/// let client = SimpleClient::new(ClientConfig::new())?;
/// let layer = OlogLayer::new(client)
///     .logbooks(["Operations"])
///     .tags(["pyOlog"])
///     .min_level(tracing::Level::WARN);
/// tracing_subscriber::registry().with(layer).init();
/// tracing::warn!(pressure = 3.2, "vacuum interlock tripped");
/// # Ok::<(), olog::OlogError>(())
/// ```
pub struct OlogLayer {
    client: SimpleClient,
    logbooks: Vec<String>,
    tags: Vec<String>,
    level: Level,
}

impl OlogLayer {
    /// Posts `INFO` and above, with no logbooks or tags.
    pub fn new(client: SimpleClient) -> Self {
        OlogLayer {
            client,
            logbooks: Vec::new(),
            tags: Vec::new(),
            level: Level::INFO,
        }
    }

    pub fn logbooks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logbooks = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn tags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    fn wants(&self, event: &Event<'_>) -> bool {
        let meta = event.metadata();
        // More verbose levels compare greater.
        if *meta.level() > self.level {
            return false;
        }
        let target = meta.target();
        !SKIPPED_TARGETS
            .iter()
            .any(|t| target == *t || target.starts_with(&format!("{t}::")))
    }

    fn request(&self, text: String) -> LogRequest {
        let mut req = LogRequest::new(text).verify(false);
        req.logbooks = self.logbooks.clone();
        req.tags = self.tags.clone();
        req
    }
}

/// Renders an event as `LEVEL target: message key=value ...`.
pub fn format_event(event: &Event<'_>) -> String {
    let meta = event.metadata();
    let mut visitor = TextVisitor::default();
    event.record(&mut visitor);
    let mut text = format!("{} {}: {}", meta.level(), meta.target(), visitor.message);
    for (k, v) in visitor.fields {
        let _ = write!(text, " {k}={v}");
    }
    text
}

#[derive(Default)]
struct TextVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for TextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

impl<S: Subscriber> Layer<S> for OlogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.wants(event) || POSTING.with(Cell::get) {
            return;
        }
        POSTING.with(|p| p.set(true));
        let result = self.client.log(self.request(format_event(event)));
        POSTING.with(|p| p.set(false));
        if let Err(e) = result {
            eprintln!("olog: failed to post log event: {e}");
        }
    }
}

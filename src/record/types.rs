use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::Config;
use crate::link::{Link, LinkAnnotation, resolve_annotations};
use crate::mime::Mime;

/// Test execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    XFailed,
    XPassed,
    Error,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::XFailed => "xfailed",
            Status::XPassed => "xpassed",
            Status::Error => "error",
            Status::Unknown => "unknown",
        }
    }

    /// Capitalized name shown in the report
    pub fn label(&self) -> &'static str {
        match self {
            Status::Passed => "Passed",
            Status::Failed => "Failed",
            Status::Skipped => "Skipped",
            Status::XFailed => "Xfailed",
            Status::XPassed => "Xpassed",
            Status::Error => "Error",
            Status::Unknown => "Unknown",
        }
    }

    /// Whether a teardown screenshot is taken for this status
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Status::Failed | Status::Error | Status::Skipped | Status::XFailed | Status::XPassed
        )
    }

    /// Comment of the teardown screenshot step
    pub fn teardown_comment(&self) -> &'static str {
        match self {
            Status::Failed => "Last screenshot before failure",
            Status::XFailed => "Last screenshot before xfailure",
            Status::Skipped => "Last screenshot before skip",
            _ => "Last screenshot",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passed" => Ok(Status::Passed),
            "failed" => Ok(Status::Failed),
            "skipped" => Ok(Status::Skipped),
            "xfailed" => Ok(Status::XFailed),
            "xpassed" => Ok(Status::XPassed),
            "error" => Ok(Status::Error),
            "unknown" => Ok(Status::Unknown),
            other => Err(format!("unknown test status '{}'", other)),
        }
    }
}

/// Exception raised by the test body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
}

/// How the test ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub status: Status,
    /// Explicit fail/skip/xfail reason
    pub reason: Option<String>,
    pub exception: Option<ExceptionInfo>,
}

impl TestOutcome {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            reason: None,
            exception: None,
        }
    }

    pub fn passed() -> Self {
        Self::new(Status::Passed)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(Status::Failed).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_exception(mut self, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.exception = Some(ExceptionInfo {
            type_name: type_name.into(),
            message: message.into(),
        });
        self
    }
}

/// A persisted image, video or audio payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub mime: Mime,
    /// Link from the HTML report; `None` when no HTML report is produced
    pub uri: Option<String>,
    pub data: Vec<u8>,
}

/// A captured webpage source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    pub uri: Option<String>,
    pub text: String,
}

/// A comment with an optional screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub position: usize,
    pub comment: String,
    pub image: Option<Media>,
    pub page_source: Option<PageSource>,
    /// Status the comment is styled with (teardown screenshots on failure)
    pub emphasis: Option<Status>,
    /// A capture was attempted and failed
    pub capture_failed: bool,
}

/// A processed attachment, ready to render
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attachment {
    pub position: usize,
    pub comment: String,
    /// `None` for downloadable files of unknown type
    pub mime: Option<Mime>,
    /// Text shown verbatim (escaped) in the report
    pub text: Option<String>,
    /// Pre-rendered markup: CSV table, URI anchors, iframe data URI or
    /// download anchor
    pub inner_html: Option<String>,
    pub media: Option<Media>,
    /// File attached by reference without a MIME type
    pub source: Option<SourceFile>,
}

/// A file attached without a MIME type, read when it was attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Plain-text attachment used when the real content cannot be produced
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            mime: Some(Mime::Text),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_multimedia(&self) -> bool {
        self.media.is_some()
    }
}

/// One reporting entry, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Step(Step),
    Attachment(Attachment),
    Link(Link),
}

impl Entry {
    /// Image, video or audio carried by the entry
    pub fn media(&self) -> Option<&Media> {
        match self {
            Entry::Step(step) => step.image.as_ref(),
            Entry::Attachment(attachment) => attachment.media.as_ref(),
            Entry::Link(_) => None,
        }
    }
}

/// Lifecycle of a [`TestRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Accepting record calls
    Open,
    /// Rendered; record calls are ignored
    Sealed,
    /// Every sink persisted the record
    Flushed,
}

/// Everything reported for one test
#[derive(Debug, Clone)]
pub struct TestRecord {
    /// Unique test identifier, e.g. `tests/test_login.py::test_ok[chrome]`
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub parameters: Vec<(String, String)>,
    pub annotations: Vec<LinkAnnotation>,
    pub started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    entries: Vec<Entry>,
    outcome: Option<TestOutcome>,
    state: RecordState,
}

impl TestRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: None,
            parameters: Vec::new(),
            annotations: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            entries: Vec::new(),
            outcome: None,
            state: RecordState::Open,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.parameters.push((name.into(), value.to_string()));
        self
    }

    pub fn with_annotation(mut self, annotation: LinkAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn outcome(&self) -> Option<&TestOutcome> {
        self.outcome.as_ref()
    }

    pub fn status(&self) -> Status {
        self.outcome.as_ref().map_or(Status::Unknown, |o| o.status)
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_open(&self) -> bool {
        self.state == RecordState::Open
    }

    /// Position the next entry will take
    pub fn next_position(&self) -> usize {
        self.entries.len()
    }

    /// Annotation links followed by recorded links, in order
    pub fn links(&self, config: &Config) -> Vec<Link> {
        let mut links = resolve_annotations(&self.annotations, config);
        links.extend(self.entries.iter().filter_map(|e| match e {
            Entry::Link(link) => Some(link.clone()),
            _ => None,
        }));
        links
    }

    /// Number of entries carrying an image
    pub fn image_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(Entry::media)
            .filter(|m| m.mime.is_image())
            .count()
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub(crate) fn seal(&mut self, outcome: TestOutcome) {
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        self.state = RecordState::Sealed;
    }

    pub(crate) fn mark_flushed(&mut self) {
        if self.state == RecordState::Sealed {
            self.state = RecordState::Flushed;
        }
    }
}

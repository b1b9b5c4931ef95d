//! Per-test recorder.
//!
//! A [`Recorder`] wraps one [`TestRecord`] and is driven by exactly one test.
//! Record calls never fail the test: capture, read and formatting problems are
//! logged and the entry degrades to reduced content. Only argument misuse is
//! returned as [`ExtrasError::InvalidArgument`].

use html_escape::encode_quoted_attribute;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::attachment::{AttachmentInput, parse_attachment};
use super::types::{Entry, Media, PageSource, Status, Step, TestOutcome, TestRecord};
use crate::capture::{CaptureTarget, capture_target};
use crate::config::{Config, ScreenshotPolicy};
use crate::error::{ExtrasError, ExtrasResult};
use crate::link::{Link, LinkAnnotation};
use crate::render::ReportSink;
use crate::session::ReportSession;

/// Options of a `record_step` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOptions {
    /// Capture the whole scrollable page
    pub full_page: bool,
    /// Capture the page source even if the session does not
    pub page_source: bool,
    /// Escape HTML in the comment
    pub escape_html: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            full_page: true,
            page_source: false,
            escape_html: false,
        }
    }
}

/// Something that can be added to the downloads folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    File(PathBuf),
    Bytes {
        data: Vec<u8>,
        extension: Option<String>,
    },
}

impl From<PathBuf> for Download {
    fn from(path: PathBuf) -> Self {
        Download::File(path)
    }
}

impl From<&std::path::Path> for Download {
    fn from(path: &std::path::Path) -> Self {
        Download::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Download {
    fn from(data: Vec<u8>) -> Self {
        Download::Bytes {
            data,
            extension: None,
        }
    }
}

/// Records the steps, attachments and links of one test
pub struct Recorder {
    session: Arc<ReportSession>,
    record: TestRecord,
    /// First page-like target seen, used for teardown screenshots
    target: Option<Arc<dyn CaptureTarget>>,
}

impl Recorder {
    pub fn new(session: Arc<ReportSession>, record: TestRecord) -> Self {
        debug!(session = %session.id, test = %record.id, "recorder created");
        Self {
            session,
            record,
            target: None,
        }
    }

    pub fn record(&self) -> &TestRecord {
        &self.record
    }

    pub fn into_record(self) -> TestRecord {
        self.record
    }

    fn config(&self) -> &Config {
        self.session.config()
    }

    fn accepts(&self, call: &str) -> bool {
        if self.record.is_open() {
            return true;
        }
        warn!(
            test = %self.record.id,
            state = ?self.record.state(),
            "{} called after the test was rendered, ignored",
            call
        );
        false
    }

    /// Append a comment, with a screenshot of `target` when given and the
    /// screenshot policy allows step captures
    pub fn record_step(
        &mut self,
        comment: &str,
        target: Option<Arc<dyn CaptureTarget>>,
        options: StepOptions,
    ) {
        if !self.accepts("record_step") {
            return;
        }
        if let Some(target) = &target {
            if self.target.is_none() && target.is_page() {
                self.target = Some(Arc::clone(target));
            }
        }
        let comment = escape_comment(comment, options.escape_html);
        let mut step = Step {
            position: self.record.next_position(),
            comment,
            image: None,
            page_source: None,
            emphasis: None,
            capture_failed: false,
        };
        if let Some(target) = target.filter(|_| self.config().screenshots.captures_steps()) {
            let with_source = options.page_source || self.config().sources;
            self.capture_into(&mut step, target.as_ref(), options.full_page, with_source);
        }
        self.record.push(Entry::Step(step));
    }

    fn capture_into(
        &self,
        step: &mut Step,
        target: &dyn CaptureTarget,
        full_page: bool,
        with_source: bool,
    ) {
        match capture_target(target, full_page, with_source) {
            Ok(capture) => {
                let uri = self.session.save_media(&capture.image, capture.mime);
                step.image = Some(Media {
                    mime: capture.mime,
                    uri,
                    data: capture.image,
                });
                step.page_source = capture.page_source.map(|text| PageSource {
                    uri: self.session.save_page_source(&text),
                    text,
                });
            }
            Err(err) => {
                warn!(
                    test = %self.record.id,
                    target = target.source_type(),
                    "Error gathering screenshot: {}",
                    err
                );
                step.capture_failed = true;
            }
        }
    }

    /// Append an attachment. Fails only when `body` and `source` are both
    /// set or the body type does not fit the MIME type.
    pub fn record_attachment(&mut self, comment: &str, input: AttachmentInput) -> ExtrasResult<()> {
        input.validate()?;
        if !self.accepts("record_attachment") {
            return Ok(());
        }
        let escape = input.escape_html;
        let mut attachment = parse_attachment(input, &self.session, &self.record.id);
        attachment.position = self.record.next_position();
        attachment.comment = escape_comment(comment, escape);
        self.record.push(Entry::Attachment(attachment));
        Ok(())
    }

    /// Append a link; `name` defaults to the URI
    pub fn record_link(&mut self, uri: &str, name: Option<&str>) {
        if !self.accepts("record_link") {
            return;
        }
        self.record
            .push(Entry::Link(Link::new(uri, name.map(str::to_string))));
    }

    /// Attach declarative link metadata
    pub fn annotate(&mut self, annotation: LinkAnnotation) {
        if self.accepts("annotate") {
            self.record.annotations.push(annotation);
        }
    }

    /// Copy a file or write bytes into the downloads folder and return the
    /// report-relative URI
    pub fn add_to_downloads(&self, item: impl Into<Download>) -> ExtrasResult<String> {
        if !self.session.config().html_enabled() {
            return Err(ExtrasError::invalid("add_to_downloads requires an HTML report"));
        }
        let link = match item.into() {
            Download::File(path) => self.session.add_file_to_downloads(&path)?,
            Download::Bytes { data, extension } => self
                .session
                .add_bytes_to_downloads(&data, extension.as_deref())?,
        };
        link.ok_or_else(|| ExtrasError::invalid("add_to_downloads requires an HTML report"))
    }

    /// Seal the record with its outcome, take the teardown screenshot the
    /// policy asks for and emit the record into every sink.
    ///
    /// Rendering twice is an error.
    pub fn render(&mut self, outcome: TestOutcome, sinks: &mut [&mut dyn ReportSink]) -> ExtrasResult<()> {
        if !self.record.is_open() {
            return Err(ExtrasError::invalid(format!(
                "test '{}' was already rendered",
                self.record.id
            )));
        }
        self.teardown_screenshot(outcome.status);
        self.record.seal(outcome);

        let mut first_error = None;
        for sink in sinks.iter_mut() {
            if let Err(err) = sink.emit(&self.record, self.session.config()) {
                error!(test = %self.record.id, sink = sink.name(), "cannot emit test record: {}", err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                self.record.mark_flushed();
                Ok(())
            }
        }
    }

    fn teardown_screenshot(&mut self, status: Status) {
        let failure = status.is_failure();
        let wanted = match self.config().screenshots {
            ScreenshotPolicy::All | ScreenshotPolicy::Fail => failure,
            ScreenshotPolicy::Last => true,
            ScreenshotPolicy::None => false,
        };
        let Some(target) = self.target.clone().filter(|_| wanted) else {
            return;
        };
        let comment = if failure {
            status.teardown_comment()
        } else {
            "Last screenshot"
        };
        let mut step = Step {
            position: self.record.next_position(),
            comment: comment.to_string(),
            image: None,
            page_source: None,
            emphasis: failure.then_some(status),
            capture_failed: false,
        };
        let with_source = self.config().sources;
        self.capture_into(&mut step, target.as_ref(), true, with_source);
        self.record.push(Entry::Step(step));
    }
}

fn escape_comment(comment: &str, escape: bool) -> String {
    if escape {
        encode_quoted_attribute(comment).into_owned()
    } else {
        comment.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, CaptureResult, MockFramebuffer};
    use crate::record::attachment::Body;
    use crate::record::types::RecordState;
    use tempfile::TempDir;

    struct BrokenTarget;

    impl CaptureTarget for BrokenTarget {
        fn screenshot(&self, _full_page: bool) -> CaptureResult<Vec<u8>> {
            Err(CaptureError::Screenshot("browser closed".to_string()))
        }

        fn source_type(&self) -> &str {
            "broken"
        }
    }

    struct CountingSink(usize);

    impl ReportSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn emit(&mut self, _record: &TestRecord, _config: &Config) -> ExtrasResult<()> {
            self.0 += 1;
            Ok(())
        }
    }

    fn recorder(policy: ScreenshotPolicy) -> Recorder {
        let config = Config::builder().screenshots(policy).build().unwrap();
        let session = Arc::new(ReportSession::start(config).unwrap());
        Recorder::new(session, TestRecord::new("tests::sample"))
    }

    fn page() -> Arc<dyn CaptureTarget> {
        Arc::new(MockFramebuffer::with_color(8, 8, [0, 0, 255]).with_page_source("<html/>"))
    }

    #[test]
    fn test_step_without_target() {
        let mut rec = recorder(ScreenshotPolicy::All);
        rec.record_step("no target", None, StepOptions::default());
        let Entry::Step(step) = &rec.record().entries()[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.comment, "no target");
        assert!(step.image.is_none());
        assert!(!step.capture_failed);
    }

    #[test]
    fn test_step_with_target_and_source() {
        let mut rec = recorder(ScreenshotPolicy::All);
        let options = StepOptions {
            page_source: true,
            ..StepOptions::default()
        };
        rec.record_step("home", Some(page()), options);
        let Entry::Step(step) = &rec.record().entries()[0] else {
            panic!("expected a step");
        };
        assert!(step.image.is_some());
        assert_eq!(step.page_source.as_ref().unwrap().text, "<html/>");
    }

    #[test]
    fn test_capture_failure_keeps_comment() {
        let mut rec = recorder(ScreenshotPolicy::All);
        rec.record_step("login", Some(Arc::new(BrokenTarget)), StepOptions::default());
        let Entry::Step(step) = &rec.record().entries()[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.comment, "login");
        assert!(step.image.is_none());
        assert!(step.capture_failed);
    }

    #[test]
    fn test_escape_html_comment() {
        let mut rec = recorder(ScreenshotPolicy::All);
        let options = StepOptions {
            escape_html: true,
            ..StepOptions::default()
        };
        rec.record_step("<b>\"x\"</b>", None, options);
        let Entry::Step(step) = &rec.record().entries()[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.comment, "&lt;b&gt;&quot;x&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_fail_policy_only_teardown_on_failure() {
        let mut rec = recorder(ScreenshotPolicy::Fail);
        rec.record_step("a", Some(page()), StepOptions::default());
        assert_eq!(rec.record().image_count(), 0);
        rec.render(TestOutcome::failed("boom"), &mut []).unwrap();
        assert_eq!(rec.record().image_count(), 1);
        let Some(Entry::Step(last)) = rec.record().entries().last() else {
            panic!("expected a teardown step");
        };
        assert_eq!(last.comment, "Last screenshot before failure");
        assert_eq!(last.emphasis, Some(Status::Failed));

        let mut rec = recorder(ScreenshotPolicy::Fail);
        rec.record_step("a", Some(page()), StepOptions::default());
        rec.render(TestOutcome::passed(), &mut []).unwrap();
        assert_eq!(rec.record().image_count(), 0);
    }

    #[test]
    fn test_element_target_is_not_remembered() {
        struct Element;
        impl CaptureTarget for Element {
            fn screenshot(&self, _full_page: bool) -> CaptureResult<Vec<u8>> {
                MockFramebuffer::new(2, 2).to_png()
            }
            fn source_type(&self) -> &str {
                "element"
            }
            fn is_page(&self) -> bool {
                false
            }
        }
        let mut rec = recorder(ScreenshotPolicy::Last);
        rec.record_step("element", Some(Arc::new(Element)), StepOptions::default());
        rec.render(TestOutcome::passed(), &mut []).unwrap();
        assert_eq!(rec.record().entries().len(), 1);
    }

    #[test]
    fn test_failed_teardown_capture_is_flagged() {
        let mut rec = recorder(ScreenshotPolicy::Last);
        rec.record_step("a", Some(Arc::new(BrokenTarget)), StepOptions::default());
        rec.render(TestOutcome::passed(), &mut []).unwrap();
        let Some(Entry::Step(last)) = rec.record().entries().last() else {
            panic!("expected a teardown step");
        };
        assert_eq!(last.comment, "Last screenshot");
        assert!(last.capture_failed);
    }

    #[test]
    fn test_render_twice_is_an_error() {
        let mut rec = recorder(ScreenshotPolicy::None);
        let mut sink = CountingSink(0);
        rec.render(TestOutcome::passed(), &mut [&mut sink]).unwrap();
        assert_eq!(rec.record().state(), RecordState::Flushed);
        let again = rec.render(TestOutcome::passed(), &mut [&mut sink]);
        assert!(matches!(again, Err(ExtrasError::InvalidArgument(_))));
        assert_eq!(sink.0, 1);
    }

    #[test]
    fn test_calls_after_render_are_ignored() {
        let mut rec = recorder(ScreenshotPolicy::None);
        rec.render(TestOutcome::passed(), &mut []).unwrap();
        rec.record_step("late", None, StepOptions::default());
        rec.record_link("https://late", None);
        rec.record_attachment("late", AttachmentInput::body("x")).unwrap();
        assert!(rec.record().entries().is_empty());
    }

    #[test]
    fn test_misuse_is_reported_even_after_render() {
        let mut rec = recorder(ScreenshotPolicy::None);
        rec.render(TestOutcome::passed(), &mut []).unwrap();
        let input = AttachmentInput {
            body: Some(Body::Text("x".into())),
            source: Some("x.txt".into()),
            ..AttachmentInput::default()
        };
        assert!(rec.record_attachment("both", input).is_err());
    }

    #[test]
    fn test_add_to_downloads() {
        let tmp = TempDir::new().unwrap();
        let config = Config::builder()
            .html_report(tmp.path().join("report.html"))
            .build()
            .unwrap();
        let session = Arc::new(ReportSession::start(config).unwrap());
        let rec = Recorder::new(session, TestRecord::new("t"));
        let uri = rec
            .add_to_downloads(Download::Bytes {
                data: b"abc".to_vec(),
                extension: Some("txt".into()),
            })
            .unwrap();
        assert!(uri.starts_with("downloads/download-") && uri.ends_with(".txt"));
        assert!(tmp.path().join(&uri).is_file());

        let rec = recorder(ScreenshotPolicy::All);
        assert!(rec.add_to_downloads(b"abc".to_vec()).is_err());
    }
}

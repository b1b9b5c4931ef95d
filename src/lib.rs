//! Report Extras - steps, screenshots, attachments and links for test reports.
//!
//! This crate provides:
//! - A per-test [`Recorder`] accumulating comments, screenshots, page sources,
//!   attachments and links in call order
//! - `format_document` for XML, JSON and YAML attachments
//! - A [`ReportSession`] owning the report asset folders
//! - Render targets: a standalone HTML report and an Allure results directory
//! - `MockFramebuffer`, a drawable capture target for tests and demos
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use report_extras::{
//!     AttachmentInput, CaptureTarget, Config, HtmlReport, MockFramebuffer, Recorder,
//!     ReportSession, ReportSink, StepOptions, TestOutcome, TestRecord,
//! };
//!
//! let config = Config::builder().html_report("report/report.html").build().unwrap();
//! let session = Arc::new(ReportSession::start(config).unwrap());
//! let mut report = HtmlReport::new(session.config()).unwrap();
//!
//! let page: Arc<dyn CaptureTarget> = Arc::new(MockFramebuffer::new(320, 200));
//! let mut recorder = Recorder::new(Arc::clone(&session), TestRecord::new("tests::login"));
//! recorder.record_step("Login page", Some(page), StepOptions::default());
//! recorder
//!     .record_attachment("Response", AttachmentInput::body(r#"{"ok":true}"#).mime("json"))
//!     .unwrap();
//! recorder.render(TestOutcome::passed(), &mut [&mut report]).unwrap();
//!
//! report.write().unwrap();
//! session.finish().unwrap();
//! ```

pub mod capture;
pub mod config;
pub mod document;
pub mod error;
pub mod link;
pub mod mime;
pub mod record;
pub mod render;
pub mod session;

// Re-export configuration
pub use config::{Config, ConfigBuilder, ConfigError, LinksColumn, ScreenshotPolicy};

// Re-export errors
pub use error::{ExtrasError, ExtrasResult};

// Re-export capture types
pub use capture::{Capture, CaptureError, CaptureResult, CaptureTarget, MockFramebuffer};

// Re-export document formatting
pub use document::{DocumentKind, FormatError, FormattedText, format_document};

// Re-export links and mime types
pub use link::{Link, LinkAnnotation, LinkKind};
pub use mime::Mime;

// Re-export recording
pub use record::{
    Attachment, AttachmentInput, Body, Download, Entry, RecordState, Recorder, SourceFile, Status,
    Step, StepOptions, TestOutcome, TestRecord,
};

// Re-export render targets and the session
pub use render::{AllureResults, HtmlReport, ReportSink};
pub use session::ReportSession;

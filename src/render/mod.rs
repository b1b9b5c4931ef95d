//! Render targets.
//!
//! A [`ReportSink`] receives every sealed [`TestRecord`] once, at teardown.

pub mod allure;
pub mod html;
pub mod report;

use crate::config::Config;
use crate::error::ExtrasResult;
use crate::record::TestRecord;

pub use allure::AllureResults;
pub use html::render_fragments;
pub use report::{DEFAULT_CSS, HtmlReport};

/// Destination of rendered test records
pub trait ReportSink {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Add one sealed test record to the report
    fn emit(&mut self, record: &TestRecord, config: &Config) -> ExtrasResult<()>;
}

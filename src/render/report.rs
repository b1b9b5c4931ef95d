//! Standalone HTML report page.

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::ReportSink;
use super::html::render_fragments;
use crate::config::{Config, LinksColumn};
use crate::error::{ExtrasError, ExtrasResult};
use crate::link::Link;
use crate::record::{Status, TestRecord};

/// Built-in stylesheet
pub const DEFAULT_CSS: &str = r#"body { font-family: Helvetica, Arial, sans-serif; font-size: 12px; color: #222; }
h1 { font-size: 22px; }
#results-table { border-collapse: collapse; width: 100%; }
#results-table th, #results-table td { border: 1px solid #e6e6e6; padding: 5px; text-align: left; vertical-align: top; }
.col-result { width: 80px; font-weight: bold; }
.passed, .xpassed { color: green; }
.failed, .error { color: red; }
.skipped, .xfailed { color: orange; }
.extras_header { border: 0px; }
.extras_header_middle { width: 15px; }
.extras_title { font-weight: bold; }
.extras_status { font-weight: bold; padding: 2px 6px; border-radius: 3px; color: white; }
.extras_status_passed, .extras_status_xpassed { background-color: green; }
.extras_status_failed, .extras_status_error { background-color: red; }
.extras_status_skipped, .extras_status_xfailed { background-color: orange; }
.extras_status_unknown { background-color: gray; }
.extras_status_reason { font-style: italic; }
.extras_separator { border: 0; border-top: 1px solid #ccc; }
.extras_font { font-size: 13px; }
.extras_color_comment { color: black; }
.extras_color_failed, .extras_color_error { color: red; }
.extras_color_skipped, .extras_color_xfailed, .extras_color_xpassed { color: orange; }
.extras_code, .extras_pre { white-space: pre-wrap; font-family: monospace; background-color: #f6f6f6; padding: 4px; }
.extras_description { margin: 0; }
.extras_params_key { font-weight: bold; }
.extras_td { width: 320px; }
.extras_td_div { text-align: center; }
.extras_image, .extras_video { border: 1px solid black; width: 300px; object-fit: contain; }
.extras_audio { width: 300px; }
.extras_iframe { width: 100%; height: 300px; border: 1px solid #ccc; }
.extras_page_src { font-size: 11px; }
.extras_link { text-decoration: none; }
.visibility_last_scr_error .extras_font { text-decoration: line-through; }
"#;

/// One row of the results table
#[derive(Debug, Clone)]
struct ResultRow {
    title: String,
    status: Status,
    duration_ms: i64,
    links: Vec<Link>,
    fragments: Vec<String>,
}

/// Collects test fragments and writes them as one HTML page
#[derive(Debug)]
pub struct HtmlReport {
    path: PathBuf,
    title: String,
    links_column: LinksColumn,
    css: Option<PathBuf>,
    started_at: DateTime<Utc>,
    rows: Vec<ResultRow>,
}

impl HtmlReport {
    /// Report configured by `html_report`
    pub fn new(config: &Config) -> ExtrasResult<Self> {
        let path = config
            .html_report
            .clone()
            .ok_or_else(|| ExtrasError::invalid("no html_report path configured"))?;
        Ok(Self {
            path,
            title: config.title.clone(),
            links_column: config.links_column,
            css: config.css.clone(),
            started_at: Utc::now(),
            rows: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rendered page
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", encode_text(&self.title)));
        html.push_str(&format!("<style>\n{}</style>\n", DEFAULT_CSS));
        if let Some(css) = self.user_css() {
            html.push_str(&format!("<style>\n{}\n</style>\n", css));
        }
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1 id=\"title\">{}</h1>\n", encode_text(&self.title)));
        html.push_str(&format!(
            "<p>Report generated on {}.</p>\n<p class=\"summary\">{}</p>\n",
            self.started_at.format("%d-%b-%Y at %H:%M:%S"),
            self.summary()
        ));

        let show_links = self.links_column != LinksColumn::None;
        let columns = if show_links { 4 } else { 3 };
        html.push_str("<table id=\"results-table\">\n<thead><tr>");
        html.push_str("<th class=\"col-result\">Result</th><th class=\"col-name\">Test</th><th class=\"col-duration\">Duration</th>");
        if show_links {
            html.push_str("<th class=\"col-links\">Links</th>");
        }
        html.push_str("</tr></thead>\n");
        for row in &self.rows {
            html.push_str("<tbody class=\"results-table-row\">\n<tr>");
            html.push_str(&format!(
                "<td class=\"col-result {}\">{}</td><td class=\"col-name\">{}</td><td class=\"col-duration\">{} ms</td>",
                row.status,
                row.status.label(),
                encode_text(&row.title),
                row.duration_ms
            ));
            if show_links {
                html.push_str(&format!("<td class=\"col-links\">{}</td>", self.links_cell(&row.links)));
            }
            html.push_str(&format!(
                "</tr>\n<tr class=\"extras-row\"><td colspan=\"{}\"><div class=\"extra\">{}</div></td></tr>\n</tbody>\n",
                columns,
                row.fragments.concat()
            ));
        }
        html.push_str("</table>\n</body>\n</html>\n");
        html
    }

    fn links_cell(&self, links: &[Link]) -> String {
        links
            .iter()
            .filter(|link| self.links_column.shows(link.kind))
            .map(|link| {
                format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" title=\"{}\">{}</a>",
                    encode_double_quoted_attribute(&link.url),
                    encode_double_quoted_attribute(&link.name),
                    link.icon
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn summary(&self) -> String {
        let count = |status: Status| self.rows.iter().filter(|r| r.status == status).count();
        let parts: Vec<String> = [
            Status::Passed,
            Status::Failed,
            Status::Error,
            Status::Skipped,
            Status::XFailed,
            Status::XPassed,
        ]
        .into_iter()
        .map(|status| format!("{} {}", count(status), status))
        .collect();
        format!("{} tests: {}", self.rows.len(), parts.join(", "))
    }

    fn user_css(&self) -> Option<String> {
        let path = self.css.as_ref()?;
        match fs::read_to_string(path) {
            Ok(css) => Some(css),
            Err(err) => {
                warn!(file = %path.display(), "cannot read stylesheet: {}", err);
                None
            }
        }
    }

    /// Write the page to the configured path
    pub fn write(&self) -> ExtrasResult<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.to_html())?;
        debug!(file = %self.path.display(), tests = self.rows.len(), "html report written");
        Ok(self.path.clone())
    }
}

impl ReportSink for HtmlReport {
    fn name(&self) -> &str {
        "html"
    }

    fn emit(&mut self, record: &TestRecord, config: &Config) -> ExtrasResult<()> {
        let duration_ms = record
            .finished_at()
            .map_or(0, |end| (end - record.started_at).num_milliseconds());
        self.rows.push(ResultRow {
            title: record.title.clone(),
            status: record.status(),
            duration_ms,
            links: record.links(config),
            fragments: render_fragments(record, config),
        });
        Ok(())
    }
}

//! Session configuration with environment variable and TOML file support.
//!
//! The configuration is read once per session and shared read-only with the
//! report session and every recorder. It can be built from:
//! - Environment variables (`Config::from_env`)
//! - A TOML file with an `[extras]` table (`Config::load`)
//! - The builder (`Config::builder`)
//!
//! Every constructor validates the values; unknown keys and malformed values
//! fail with a [`ConfigError`].
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REPORT_EXTRAS_SCREENSHOTS` | Screenshot policy: all, last, fail, none | `all` |
//! | `REPORT_EXTRAS_SOURCES` | Whether to include webpage sources | `false` |
//! | `REPORT_EXTRAS_INDENT` | Indent for XML, JSON and YAML attachments | `4` |
//! | `REPORT_EXTRAS_ISSUE_LINK_PATTERN` | Issue link pattern, e.g. `https://bugs.example.com/issues/{}` | unset |
//! | `REPORT_EXTRAS_TMS_LINK_PATTERN` | Test case link pattern, e.g. `https://tms.example.com/tests/{}` | unset |
//! | `REPORT_EXTRAS_LINKS_COLUMN` | Links shown in the links column: all, issue, tms, link, none | `all` |
//! | `REPORT_EXTRAS_TITLE` | Report title | `Test Report` |
//! | `REPORT_EXTRAS_HTML` | HTML report file; its folder receives the assets | unset |
//! | `REPORT_EXTRAS_SINGLE_PAGE` | Embed assets as data URIs | `false` |
//! | `REPORT_EXTRAS_ALLURE_DIR` | Allure results directory | unset |
//! | `REPORT_EXTRAS_CSS` | User stylesheet | unset |
//!
//! # Example
//!
//! ```toml
//! [extras]
//! screenshots = "last"
//! sources = true
//! indent = 2
//! issue_link_pattern = "https://bugs.example.com/issues/{}"
//! html_report = "reports/index.html"
//! ```

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::link::LinkKind;

// ============================================================================
// Default Values
// ============================================================================

/// Default screenshot policy
pub const DEFAULT_SCREENSHOTS: ScreenshotPolicy = ScreenshotPolicy::All;

/// Default indent for structured documents
pub const DEFAULT_INDENT: usize = 4;

/// Default links column filter
pub const DEFAULT_LINKS_COLUMN: LinksColumn = LinksColumn::All;

/// Default report title
pub const DEFAULT_TITLE: &str = "Test Report";

/// Substitution slot in link patterns
pub const PATTERN_SLOT: &str = "{}";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_SCREENSHOTS: &str = "REPORT_EXTRAS_SCREENSHOTS";
pub const ENV_SOURCES: &str = "REPORT_EXTRAS_SOURCES";
pub const ENV_INDENT: &str = "REPORT_EXTRAS_INDENT";
pub const ENV_ISSUE_LINK_PATTERN: &str = "REPORT_EXTRAS_ISSUE_LINK_PATTERN";
pub const ENV_TMS_LINK_PATTERN: &str = "REPORT_EXTRAS_TMS_LINK_PATTERN";
pub const ENV_LINKS_COLUMN: &str = "REPORT_EXTRAS_LINKS_COLUMN";
pub const ENV_TITLE: &str = "REPORT_EXTRAS_TITLE";
pub const ENV_HTML: &str = "REPORT_EXTRAS_HTML";
pub const ENV_SINGLE_PAGE: &str = "REPORT_EXTRAS_SINGLE_PAGE";
pub const ENV_ALLURE_DIR: &str = "REPORT_EXTRAS_ALLURE_DIR";
pub const ENV_CSS: &str = "REPORT_EXTRAS_CSS";

/// Configuration errors. Fatal at session startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A recognized option with a value outside its domain
    #[error("Invalid value '{value}' for '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    /// Malformed or unrecognized configuration file content
    #[error("Invalid configuration file: {0}")]
    Parse(String),

    /// Configuration file could not be read
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl fmt::Display, expected: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Which screenshots end up in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotPolicy {
    /// Every step with a target plus a screenshot on failure
    All,
    /// Only one screenshot taken at teardown
    Last,
    /// Only a screenshot taken at teardown of failed tests
    Fail,
    /// No screenshots
    None,
}

impl ScreenshotPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotPolicy::All => "all",
            ScreenshotPolicy::Last => "last",
            ScreenshotPolicy::Fail => "fail",
            ScreenshotPolicy::None => "none",
        }
    }

    /// Whether `record_step` calls capture their target
    pub fn captures_steps(&self) -> bool {
        matches!(self, ScreenshotPolicy::All)
    }
}

impl FromStr for ScreenshotPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ScreenshotPolicy::All),
            "last" => Ok(ScreenshotPolicy::Last),
            "fail" => Ok(ScreenshotPolicy::Fail),
            "none" => Ok(ScreenshotPolicy::None),
            _ => Err(ConfigError::invalid("screenshots", s, "one of all, last, fail, none")),
        }
    }
}

impl fmt::Display for ScreenshotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which links are shown in the links column of the results table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinksColumn {
    All,
    Issue,
    Tms,
    Link,
    None,
}

impl LinksColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinksColumn::All => "all",
            LinksColumn::Issue => "issue",
            LinksColumn::Tms => "tms",
            LinksColumn::Link => "link",
            LinksColumn::None => "none",
        }
    }

    /// Whether links of the given kind appear in the column
    pub fn shows(&self, kind: LinkKind) -> bool {
        match self {
            LinksColumn::All => true,
            LinksColumn::None => false,
            LinksColumn::Issue => kind == LinkKind::Issue,
            LinksColumn::Tms => kind == LinkKind::Tms,
            LinksColumn::Link => kind == LinkKind::Link,
        }
    }
}

impl FromStr for LinksColumn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(LinksColumn::All),
            "issue" => Ok(LinksColumn::Issue),
            "tms" => Ok(LinksColumn::Tms),
            "link" => Ok(LinksColumn::Link),
            "none" => Ok(LinksColumn::None),
            _ => Err(ConfigError::invalid(
                "links_column",
                s,
                "one of all, issue, tms, link, none",
            )),
        }
    }
}

impl fmt::Display for LinksColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-wide configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Screenshot inclusion policy
    pub screenshots: ScreenshotPolicy,
    /// Whether to capture webpage sources with every screenshot
    pub sources: bool,
    /// Indent for XML, JSON and YAML attachments
    pub indent: usize,
    /// Issue link pattern with one `{}` slot
    pub issue_link_pattern: Option<String>,
    /// Test case link pattern with one `{}` slot
    pub tms_link_pattern: Option<String>,
    /// Links column filter
    pub links_column: LinksColumn,
    /// Report title
    pub title: String,
    /// HTML report file
    pub html_report: Option<PathBuf>,
    /// Whether the HTML report is self-contained
    pub single_page: bool,
    /// Allure results directory
    pub allure_dir: Option<PathBuf>,
    /// User stylesheet
    pub css: Option<PathBuf>,
}

impl Config {
    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            screenshots: DEFAULT_SCREENSHOTS,
            sources: false,
            indent: DEFAULT_INDENT,
            issue_link_pattern: None,
            tms_link_pattern: None,
            links_column: DEFAULT_LINKS_COLUMN,
            title: DEFAULT_TITLE.to_string(),
            html_report: None,
            single_page: false,
            allure_dir: None,
            css: None,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::defaults(),
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup using the
    /// `REPORT_EXTRAS_*` names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = RawConfig {
            screenshots: lookup(ENV_SCREENSHOTS),
            sources: lookup(ENV_SOURCES).map(RawBool::Text),
            indent: lookup(ENV_INDENT).map(RawInt::Text),
            issue_link_pattern: lookup(ENV_ISSUE_LINK_PATTERN),
            tms_link_pattern: lookup(ENV_TMS_LINK_PATTERN),
            links_column: lookup(ENV_LINKS_COLUMN),
            title: lookup(ENV_TITLE),
            html_report: lookup(ENV_HTML).map(PathBuf::from),
            single_page: lookup(ENV_SINGLE_PAGE).map(RawBool::Text),
            allure_dir: lookup(ENV_ALLURE_DIR).map(PathBuf::from),
            css: lookup(ENV_CSS).map(PathBuf::from),
        };
        raw.into_config()
    }

    /// Parse a TOML document with an `[extras]` table
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.extras.unwrap_or_default().into_config()
    }

    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every value; called by all constructors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indent == 0 {
            return Err(ConfigError::invalid("indent", self.indent, "a positive integer"));
        }
        if let Some(pattern) = &self.issue_link_pattern {
            validate_pattern("issue_link_pattern", pattern)?;
        }
        if let Some(pattern) = &self.tms_link_pattern {
            validate_pattern("tms_link_pattern", pattern)?;
        }
        if self.single_page && self.html_report.is_none() {
            return Err(ConfigError::invalid(
                "single_page",
                true,
                "an html_report to be configured",
            ));
        }
        Ok(())
    }

    /// Folder holding the HTML report and its assets
    pub fn html_folder(&self) -> Option<PathBuf> {
        self.html_report.as_ref().map(|file| {
            file.parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        })
    }

    /// Whether an HTML report is being produced
    pub fn html_enabled(&self) -> bool {
        self.html_report.is_some()
    }

    /// Whether an Allure results directory is configured
    pub fn allure_enabled(&self) -> bool {
        self.allure_dir.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Builder for programmatic configuration
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn screenshots(mut self, policy: ScreenshotPolicy) -> Self {
        self.config.screenshots = policy;
        self
    }

    pub fn sources(mut self, sources: bool) -> Self {
        self.config.sources = sources;
        self
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.config.indent = indent;
        self
    }

    pub fn issue_link_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.issue_link_pattern = Some(pattern.into());
        self
    }

    pub fn tms_link_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.tms_link_pattern = Some(pattern.into());
        self
    }

    pub fn links_column(mut self, column: LinksColumn) -> Self {
        self.config.links_column = column;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn html_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.html_report = Some(path.into());
        self
    }

    pub fn single_page(mut self, single_page: bool) -> Self {
        self.config.single_page = single_page;
        self
    }

    pub fn allure_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.allure_dir = Some(path.into());
        self
    }

    pub fn css(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.css = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Raw (unvalidated) representation shared by the env and file loaders
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    extras: Option<RawConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    screenshots: Option<String>,
    sources: Option<RawBool>,
    indent: Option<RawInt>,
    issue_link_pattern: Option<String>,
    tms_link_pattern: Option<String>,
    links_column: Option<String>,
    title: Option<String>,
    html_report: Option<PathBuf>,
    single_page: Option<RawBool>,
    allure_dir: Option<PathBuf>,
    css: Option<PathBuf>,
}

/// Booleans arrive as TOML booleans or as environment strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBool {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(i64),
    Text(String),
}

impl RawBool {
    fn resolve(self, key: &str) -> Result<bool, ConfigError> {
        match self {
            RawBool::Bool(b) => Ok(b),
            RawBool::Text(s) => parse_bool(&s)
                .ok_or_else(|| ConfigError::invalid(key, &s, "a boolean (true/false)")),
        }
    }
}

impl RawInt {
    fn resolve_positive(self, key: &str) -> Result<usize, ConfigError> {
        let value = match self {
            RawInt::Int(i) => i,
            RawInt::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid(key, &s, "a positive integer"))?,
        };
        if value <= 0 {
            return Err(ConfigError::invalid(key, value, "a positive integer"));
        }
        usize::try_from(value).map_err(|_| ConfigError::invalid(key, value, "a positive integer"))
    }
}

impl RawConfig {
    fn into_config(self) -> Result<Config, ConfigError> {
        let mut config = Config::defaults();
        if let Some(value) = self.screenshots {
            config.screenshots = value.parse()?;
        }
        if let Some(value) = self.sources {
            config.sources = value.resolve("sources")?;
        }
        if let Some(value) = self.indent {
            config.indent = value.resolve_positive("indent")?;
        }
        config.issue_link_pattern = non_empty(self.issue_link_pattern);
        config.tms_link_pattern = non_empty(self.tms_link_pattern);
        if let Some(value) = self.links_column {
            config.links_column = value.parse()?;
        }
        if let Some(title) = self.title {
            config.title = title;
        }
        config.html_report = self.html_report.filter(|p| !p.as_os_str().is_empty());
        if let Some(value) = self.single_page {
            config.single_page = value.resolve("single_page")?;
        }
        config.allure_dir = self.allure_dir.filter(|p| !p.as_os_str().is_empty());
        config.css = self.css.filter(|p| !p.as_os_str().is_empty());
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse ini-style booleans: true/false, yes/no, on/off, 1/0
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn validate_pattern(key: &str, pattern: &str) -> Result<(), ConfigError> {
    if pattern.matches(PATTERN_SLOT).count() != 1 {
        return Err(ConfigError::invalid(
            key,
            pattern,
            "a URL pattern with exactly one '{}' slot",
        ));
    }
    Ok(())
}

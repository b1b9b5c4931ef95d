//! Attachment parsing.
//!
//! Turns a caller-supplied body or file into a render-ready [`Attachment`].
//! Only argument misuse is an error; every content problem degrades to a
//! plain-text attachment describing it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use html_escape::encode_text;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error};

use super::types::{Attachment, Media, SourceFile};
use crate::config::Config;
use crate::document::{DocumentKind, format_document, format_json_value};
use crate::error::{ExtrasError, ExtrasResult};
use crate::mime::Mime;
use crate::render::html::{decorate_uri, decorate_uri_list};
use crate::session::{ReportSession, data_uri};

pub const EMPTY_BODY: &str = "Body or source is None or empty";

/// Attachment content
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Markup, structured text or base64-encoded multimedia
    Text(String),
    /// Raw image, video or audio bytes
    Bytes(Vec<u8>),
    /// Already parsed JSON document
    Json(Value),
    /// URI list
    UriList(Vec<String>),
}

impl Body {
    fn kind(&self) -> &'static str {
        match self {
            Body::Text(_) => "text",
            Body::Bytes(_) => "bytes",
            Body::Json(_) => "json",
            Body::UriList(_) => "uri list",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Body::Text(text) => text.is_empty(),
            Body::Bytes(data) => data.is_empty(),
            Body::Json(value) => value.is_null(),
            Body::UriList(uris) => uris.iter().all(|u| u.is_empty()),
        }
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(value)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Vec<String>> for Body {
    fn from(value: Vec<String>) -> Self {
        Body::UriList(value)
    }
}

/// Arguments of a `record_attachment` call
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentInput {
    pub body: Option<Body>,
    pub source: Option<PathBuf>,
    /// MIME string, alias or extension
    pub mime: Option<String>,
    pub csv_delimiter: u8,
    pub escape_html: bool,
}

impl Default for AttachmentInput {
    fn default() -> Self {
        Self {
            body: None,
            source: None,
            mime: None,
            csv_delimiter: b',',
            escape_html: false,
        }
    }
}

impl AttachmentInput {
    pub fn body(body: impl Into<Body>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    pub fn escape_html(mut self) -> Self {
        self.escape_html = true;
        self
    }

    /// Canonical MIME; unsupported values are dropped
    pub fn resolved_mime(&self) -> Option<Mime> {
        let raw = self.mime.as_deref()?;
        let mime = Mime::parse(raw);
        if mime.is_none() {
            debug!(mime = raw, "unsupported mime type, attachment handled without one");
        }
        mime
    }

    /// Reject combinations that can only be programmer mistakes
    pub fn validate(&self) -> ExtrasResult<()> {
        if self.body.is_some() && self.source.is_some() {
            return Err(ExtrasError::invalid(
                "'body' and 'source' are mutually exclusive",
            ));
        }
        let Some(body) = &self.body else {
            return Ok(());
        };
        let mime = self.resolved_mime();
        let allowed = match body {
            Body::Text(_) => true,
            Body::Bytes(_) => mime.is_some_and(|m| m.is_multimedia()),
            Body::Json(_) => mime.is_none_or(|m| m == Mime::Json),
            Body::UriList(_) => mime.is_none_or(|m| m == Mime::UriList),
        };
        if allowed {
            Ok(())
        } else {
            let mime = mime.map_or("no mime type".to_string(), |m| m.to_string());
            Err(ExtrasError::invalid(format!(
                "{} body is not supported with {}",
                body.kind(),
                mime
            )))
        }
    }
}

/// Build a render-ready attachment. `input` must have passed `validate()`.
pub(crate) fn parse_attachment(
    input: AttachmentInput,
    session: &ReportSession,
    test_id: &str,
) -> Attachment {
    let config = session.config();
    let mime = input.resolved_mime();
    let delimiter = input.csv_delimiter;

    let body = match (input.body, input.source) {
        (Some(body), _) => body,
        (None, Some(path)) => match mime {
            None => return downloadable(path, session, test_id),
            Some(mime) => match read_source(&path, mime) {
                Ok(body) => body,
                Err(err) => {
                    error!(test = test_id, file = %path.display(), "Error reading file: {}", err);
                    return Attachment::plain(format!("Error reading file: {}", path.display()));
                }
            },
        },
        (None, None) => return Attachment::plain(EMPTY_BODY),
    };
    parse_body(body, mime, config, delimiter, session, test_id)
}

fn read_source(path: &std::path::Path, mime: Mime) -> std::io::Result<Body> {
    if mime.is_binary() {
        fs::read(path).map(Body::Bytes)
    } else {
        fs::read_to_string(path).map(Body::Text)
    }
}

/// File of unknown type: read now, copied to the downloads folder and linked
fn downloadable(path: PathBuf, session: &ReportSession, test_id: &str) -> Attachment {
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(err) => {
            error!(test = test_id, file = %path.display(), "Error reading file: {}", err);
            return Attachment::plain(format!("Error reading file: {}", path.display()));
        }
    };
    let inner_html = match session.add_file_to_downloads(&path) {
        Ok(link) => link.map(|uri| decorate_uri(&uri)),
        Err(err) => {
            error!(test = test_id, file = %path.display(), "cannot add file to downloads: {}", err);
            return Attachment::plain(format!("Error reading file: {}", path.display()));
        }
    };
    Attachment {
        inner_html,
        source: Some(SourceFile { path, data }),
        ..Attachment::default()
    }
}

pub(crate) fn parse_body(
    body: Body,
    mime: Option<Mime>,
    config: &Config,
    delimiter: u8,
    session: &ReportSession,
    test_id: &str,
) -> Attachment {
    if body.is_empty() {
        return Attachment::plain(EMPTY_BODY);
    }
    let text = match body {
        Body::UriList(uris) => return uri_list(&uris),
        Body::Json(value) => {
            return match format_json_value(&value, config.indent) {
                Ok(text) => structured(Mime::Json, text),
                Err(err) => {
                    error!(test = test_id, "{}", err);
                    Attachment::plain(format!("Error formatting JSON:\n{}", value))
                }
            };
        }
        Body::Bytes(data) => {
            // validate() guarantees a multimedia mime
            let mime = mime.unwrap_or(Mime::Png);
            return multimedia(data, mime, session);
        }
        Body::Text(text) => text,
    };
    let Some(mime) = mime else {
        return Attachment::plain(text);
    };

    if mime == Mime::Svg {
        return multimedia(text.into_bytes(), mime, session);
    }
    if mime.is_multimedia() {
        return match STANDARD.decode(text.trim()) {
            Ok(data) => multimedia(data, mime, session),
            Err(err) => {
                let family = mime.as_str().split('/').next().unwrap_or("media");
                error!(test = test_id, "Error parsing {} bytes: {}", family, err);
                Attachment::plain(format!("Error parsing {} bytes.", family))
            }
        };
    }
    if let Some(kind) = DocumentKind::from_mime(mime) {
        return match format_document(&text, kind, config.indent) {
            Ok(formatted) => structured(mime, formatted.text),
            Err(err) => {
                error!(test = test_id, "{}", err);
                Attachment::plain(format!("Error formatting {}:\n{}", kind, text))
            }
        };
    }
    match mime {
        Mime::Csv => match csv_table(&text, delimiter) {
            Ok(table) => Attachment {
                mime: Some(Mime::Csv),
                inner_html: Some(table),
                text: Some(text),
                ..Attachment::default()
            },
            Err(err) => {
                error!(test = test_id, "Error formatting CSV: {}", err);
                Attachment::plain(format!("Error formatting CSV:\n{}", text))
            }
        },
        Mime::Html => Attachment {
            mime: Some(Mime::Html),
            inner_html: Some(data_uri(Mime::Html.as_str(), text.as_bytes())),
            text: Some(text),
            ..Attachment::default()
        },
        Mime::UriList => {
            let uris: Vec<String> = text.lines().map(str::to_string).collect();
            uri_list(&uris)
        }
        _ => Attachment::plain(text),
    }
}

fn structured(mime: Mime, text: String) -> Attachment {
    Attachment {
        mime: Some(mime),
        text: Some(text),
        ..Attachment::default()
    }
}

fn multimedia(data: Vec<u8>, mime: Mime, session: &ReportSession) -> Attachment {
    let uri = session.save_media(&data, mime);
    Attachment {
        mime: Some(mime),
        media: Some(Media { mime, uri, data }),
        ..Attachment::default()
    }
}

fn uri_list(uris: &[String]) -> Attachment {
    let uris: Vec<&str> = uris.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();
    Attachment {
        mime: Some(Mime::UriList),
        text: Some(uris.join("\n")),
        inner_html: Some(decorate_uri_list(&uris)),
        ..Attachment::default()
    }
}

/// HTML table with the first record as header row
pub fn csv_table(text: &str, delimiter: u8) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut html = String::from("<table>");
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let tag = if index == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in record.iter() {
            html.push_str(&format!("<{tag}>{}</{tag}>", encode_text(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn session() -> ReportSession {
        ReportSession::start(Config::defaults()).unwrap()
    }

    fn html_session(tmp: &TempDir) -> ReportSession {
        let config = Config::builder()
            .html_report(tmp.path().join("report.html"))
            .build()
            .unwrap();
        ReportSession::start(config).unwrap()
    }

    fn parse(input: AttachmentInput) -> Attachment {
        input.validate().unwrap();
        parse_attachment(input, &session(), "test")
    }

    #[test]
    fn test_body_and_source_rejected() {
        let input = AttachmentInput::body("x").with_source("/tmp/x.txt");
        assert!(matches!(input.validate(), Err(ExtrasError::InvalidArgument(_))));
    }

    #[test]
    fn test_type_mime_mismatch_rejected() {
        assert!(AttachmentInput::body(vec![1u8, 2]).validate().is_err());
        assert!(AttachmentInput::body(vec![1u8, 2]).mime("json").validate().is_err());
        assert!(AttachmentInput::body(json!({"a": 1})).mime("xml").validate().is_err());
        assert!(AttachmentInput::body(vec!["a".to_string()]).mime("csv").validate().is_err());
        assert!(AttachmentInput::body(vec![1u8, 2]).mime("png").validate().is_ok());
        assert!(AttachmentInput::body(json!({"a": 1})).validate().is_ok());
    }

    #[test]
    fn test_unknown_mime_is_dropped() {
        let input = AttachmentInput::body("plain").mime("application/pdf");
        assert_eq!(input.resolved_mime(), None);
        let attachment = parse(input);
        assert_eq!(attachment.mime, Some(Mime::Text));
        assert_eq!(attachment.text.as_deref(), Some("plain"));
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(parse(AttachmentInput::body("")).text.as_deref(), Some(EMPTY_BODY));
        assert_eq!(parse(AttachmentInput::default()).text.as_deref(), Some(EMPTY_BODY));
    }

    #[test]
    fn test_json_value_indented() {
        let attachment = parse(AttachmentInput::body(json!({"a": 1})).mime("json"));
        assert_eq!(attachment.mime, Some(Mime::Json));
        assert_eq!(attachment.text.as_deref(), Some("{\n    \"a\": 1\n}"));
    }

    #[test]
    fn test_malformed_document_degrades() {
        let attachment = parse(AttachmentInput::body("<a><b></a>").mime("xml"));
        assert_eq!(attachment.mime, Some(Mime::Text));
        assert_eq!(attachment.text.as_deref(), Some("Error formatting XML:\n<a><b></a>"));
    }

    #[test]
    fn test_csv_table() {
        let attachment = parse(AttachmentInput::body("h1;h2\n1;<2>").mime("csv").delimiter(b';'));
        assert_eq!(
            attachment.inner_html.as_deref(),
            Some("<table><tr><th>h1</th><th>h2</th></tr><tr><td>1</td><td>&lt;2&gt;</td></tr></table>")
        );
    }

    #[test]
    fn test_html_iframe_uri() {
        let attachment = parse(AttachmentInput::body("<p>").mime("html"));
        assert_eq!(attachment.inner_html.as_deref(), Some("data:text/html;base64,PHA+"));
    }

    #[test]
    fn test_uri_list_from_text_and_list() {
        let from_text = parse(AttachmentInput::body("https://a\n\nhttps://b").mime("uri"));
        let from_list = parse(AttachmentInput::body(vec![
            "https://a".to_string(),
            String::new(),
            "https://b".to_string(),
        ]));
        assert_eq!(from_text.inner_html, from_list.inner_html);
        assert_eq!(from_text.text.as_deref(), Some("https://a\nhttps://b"));
    }

    #[test]
    fn test_base64_image_body() {
        let attachment = parse(AttachmentInput::body("iVBORw==").mime("png"));
        let media = attachment.media.unwrap();
        assert_eq!(media.data, vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(media.uri, None);

        let attachment = parse(AttachmentInput::body("not base64!").mime("png"));
        assert_eq!(attachment.text.as_deref(), Some("Error parsing image bytes."));
    }

    #[test]
    fn test_missing_source_file() {
        let attachment = parse(AttachmentInput::source("/nonexistent/data.json").mime("json"));
        assert_eq!(
            attachment.text.as_deref(),
            Some("Error reading file: /nonexistent/data.json")
        );
    }

    #[test]
    fn test_source_with_mime_is_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.yaml");
        fs::write(&path, "a: 1\n").unwrap();
        let attachment = parse(AttachmentInput::source(&path).mime("yaml"));
        assert_eq!(attachment.mime, Some(Mime::Yaml));
        assert_eq!(attachment.text.as_deref(), Some("a: 1\n"));
    }

    #[test]
    fn test_source_without_mime_is_downloadable() {
        let tmp = TempDir::new().unwrap();
        let session = html_session(&tmp);
        let path = tmp.path().join("archive.zip");
        fs::write(&path, b"PK").unwrap();

        let attachment = parse_attachment(AttachmentInput::source(&path), &session, "test");
        assert_eq!(attachment.mime, None);
        let source = attachment.source.unwrap();
        assert_eq!(source.path, path);
        assert_eq!(source.data, b"PK");
        let anchor = attachment.inner_html.unwrap();
        assert!(anchor.contains(">archive.zip</a>"), "{}", anchor);
    }
}

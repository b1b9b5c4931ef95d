//! Pretty-printing of structured text attachments.
//!
//! [`format_document`] parses XML, JSON or YAML and re-serializes it with the
//! configured indent. XML comments are dropped. Malformed input fails with
//! [`FormatError`] and leaves the caller's text untouched.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fmt;
use serde_yaml::Value as YamlValue;
use thiserror::Error;
use tracing::debug;

use crate::mime::Mime;

/// Structured document kinds accepted by [`format_document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Xml,
    Json,
    Yaml,
}

impl DocumentKind {
    pub fn from_mime(mime: Mime) -> Option<Self> {
        match mime {
            Mime::Xml => Some(DocumentKind::Xml),
            Mime::Json => Some(DocumentKind::Json),
            Mime::Yaml => Some(DocumentKind::Yaml),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Xml => "XML",
            DocumentKind::Json => "JSON",
            DocumentKind::Yaml => "YAML",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mime::parse(s)
            .and_then(DocumentKind::from_mime)
            .ok_or_else(|| format!("'{}' is not one of xml, json, yaml", s))
    }
}

/// A formatted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedText {
    pub kind: DocumentKind,
    pub text: String,
}

/// Malformed structured document
#[derive(Debug, Error)]
#[error("Error formatting {kind}: {message}")]
pub struct FormatError {
    pub kind: DocumentKind,
    pub message: String,
}

impl FormatError {
    fn new(kind: DocumentKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Parse `text` as `kind` and re-serialize it with `indent` spaces per level
pub fn format_document(
    text: &str,
    kind: DocumentKind,
    indent: usize,
) -> Result<FormattedText, FormatError> {
    let text = match kind {
        DocumentKind::Json => {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|e| FormatError::new(kind, e))?;
            format_json_value(&value, indent)?
        }
        DocumentKind::Xml => format_xml(text, indent)?,
        DocumentKind::Yaml => format_yaml(text, indent)?,
    };
    Ok(FormattedText { kind, text })
}

/// Serialize an already parsed JSON value with `indent` spaces per level
pub fn format_json_value(value: &serde_json::Value, indent: usize) -> Result<String, FormatError> {
    let pad = " ".repeat(indent);
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(pad.as_bytes()));
    value
        .serialize(&mut serializer)
        .map_err(|e| FormatError::new(DocumentKind::Json, e))?;
    String::from_utf8(out).map_err(|e| FormatError::new(DocumentKind::Json, e))
}

fn format_xml(text: &str, indent: usize) -> Result<String, FormatError> {
    let kind = DocumentKind::Xml;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);

    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        let event = reader.read_event().map_err(|e| {
            FormatError::new(kind, format!("{} at position {}", e, reader.buffer_position()))
        })?;
        match event {
            Event::Eof => break,
            Event::Comment(_) => continue,
            Event::Start(ref e) => {
                check_attributes(e)?;
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(ref e) => {
                check_attributes(e)?;
                if depth == 0 {
                    roots += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| FormatError::new(kind, "unexpected closing tag"))?;
            }
            Event::Text(ref t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(FormatError::new(kind, "text outside the root element"));
                }
                continue;
            }
            Event::Text(ref t) => {
                t.unescape().map_err(|e| FormatError::new(kind, e))?;
            }
            _ => {}
        }
        if roots > 1 {
            return Err(FormatError::new(kind, "more than one root element"));
        }
        writer
            .write_event(event)
            .map_err(|e| FormatError::new(kind, e))?;
    }

    if depth != 0 {
        return Err(FormatError::new(kind, "unclosed element"));
    }
    if roots == 0 {
        return Err(FormatError::new(kind, "no root element"));
    }
    String::from_utf8(writer.into_inner()).map_err(|e| FormatError::new(kind, e))
}

/// Reject duplicate or malformed attributes and unknown entities in values
fn check_attributes(start: &BytesStart) -> Result<(), FormatError> {
    let kind = DocumentKind::Xml;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::new(kind, e))?;
        attr.unescape_value().map_err(|e| FormatError::new(kind, e))?;
    }
    Ok(())
}

fn format_yaml(text: &str, indent: usize) -> Result<String, FormatError> {
    let kind = DocumentKind::Yaml;
    let value: YamlValue = serde_yaml::from_str(text).map_err(|e| FormatError::new(kind, e))?;
    let mut out = String::with_capacity(text.len());
    if emit_yaml_block(&value, 0, indent, &mut out).is_some() {
        return Ok(out);
    }
    // Complex keys, tags and similar fall back to serde_yaml's own layout
    debug!("YAML document needs default layout, indent {} ignored", indent);
    serde_yaml::to_string(&value).map_err(|e| FormatError::new(kind, e))
}

/// Emit `value` as a block whose lines start at column `pad`
fn emit_yaml_block(value: &YamlValue, pad: usize, indent: usize, out: &mut String) -> Option<()> {
    match value {
        YamlValue::Mapping(map) if !map.is_empty() => {
            for (key, item) in map {
                out.push_str(&" ".repeat(pad));
                emit_yaml_entry(key, item, pad, indent, out)?;
            }
        }
        YamlValue::Sequence(seq) if !seq.is_empty() => {
            for item in seq {
                out.push_str(&" ".repeat(pad));
                emit_yaml_item(item, pad, indent, out)?;
            }
        }
        scalar => {
            out.push_str(&" ".repeat(pad));
            emit_yaml_scalar(scalar, pad, indent, out)?;
        }
    }
    Some(())
}

/// `key: value` with the cursor already at column `pad`
fn emit_yaml_entry(
    key: &YamlValue,
    value: &YamlValue,
    pad: usize,
    indent: usize,
    out: &mut String,
) -> Option<()> {
    out.push_str(&inline_yaml_key(key)?);
    out.push(':');
    if is_yaml_collection(value) {
        out.push('\n');
        emit_yaml_block(value, pad + indent, indent, out)
    } else {
        out.push(' ');
        emit_yaml_scalar(value, pad, indent, out)
    }
}

/// `- item` with the cursor already at column `pad`. Item content starts at
/// `pad + indent` so that following mapping keys line up with the first one.
fn emit_yaml_item(item: &YamlValue, pad: usize, indent: usize, out: &mut String) -> Option<()> {
    let offset = indent.max(2);
    out.push('-');
    out.push_str(&" ".repeat(offset - 1));
    let child = pad + offset;
    match item {
        YamlValue::Mapping(map) if !map.is_empty() => {
            for (i, (key, value)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(child));
                }
                emit_yaml_entry(key, value, child, indent, out)?;
            }
        }
        YamlValue::Sequence(seq) if !seq.is_empty() => {
            for (i, inner) in seq.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(child));
                }
                emit_yaml_item(inner, child, indent, out)?;
            }
        }
        scalar => emit_yaml_scalar(scalar, pad, indent, out)?,
    }
    Some(())
}

fn emit_yaml_scalar(value: &YamlValue, pad: usize, indent: usize, out: &mut String) -> Option<()> {
    let rendered = match value {
        YamlValue::Mapping(map) if map.is_empty() => "{}".to_string(),
        YamlValue::Sequence(seq) if seq.is_empty() => "[]".to_string(),
        YamlValue::Mapping(_) | YamlValue::Sequence(_) => return None,
        other => serde_yaml::to_string(other).ok()?,
    };
    let mut lines = rendered.trim_end_matches('\n').lines();
    let head = lines.next().unwrap_or("");
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        out.push_str(head);
        out.push('\n');
        return Some(());
    }

    // Block scalars are re-anchored under the parent. Explicit indentation
    // indicators and keep-chomping do not survive that, so quote instead.
    let movable = opens_block_scalar(head)
        && !head.ends_with('+')
        && !head.chars().any(|c| c.is_ascii_digit());
    if !movable {
        let YamlValue::String(s) = value else {
            return None;
        };
        out.push_str(&serde_json::to_string(s).ok()?);
        out.push('\n');
        return Some(());
    }

    out.push_str(head);
    out.push('\n');
    let prefix = " ".repeat(pad + indent);
    for line in rest {
        if line.is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(&prefix);
        out.push_str(line.strip_prefix("  ")?);
        out.push('\n');
    }
    Some(())
}

fn inline_yaml_key(key: &YamlValue) -> Option<String> {
    if is_yaml_collection(key) || matches!(key, YamlValue::Tagged(_)) {
        return None;
    }
    let rendered = serde_yaml::to_string(key).ok()?;
    let rendered = rendered.trim_end_matches('\n');
    if rendered.contains('\n') {
        return None;
    }
    Some(rendered.to_string())
}

fn is_yaml_collection(value: &YamlValue) -> bool {
    match value {
        YamlValue::Mapping(map) => !map.is_empty(),
        YamlValue::Sequence(seq) => !seq.is_empty(),
        _ => false,
    }
}

fn opens_block_scalar(line: &str) -> bool {
    let mut chars = line.trim_end().chars();
    matches!(chars.next(), Some('|') | Some('>'))
        && chars.all(|c| c.is_ascii_digit() || c == '+' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Structural XML events, ignoring whitespace and comments
    fn xml_events(text: &str) -> Vec<String> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);
        let mut events = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                Event::Comment(_) => {}
                Event::Decl(_) => {}
                other => events.push(format!("{:?}", other)),
            }
        }
        events
    }

    #[test]
    fn test_json_indent() {
        let formatted = format_document(r#"{"a":1}"#, DocumentKind::Json, 4).unwrap();
        assert_eq!(formatted.text, "{\n    \"a\": 1\n}");
        let formatted = format_document(r#"{"a":[1,2]}"#, DocumentKind::Json, 2).unwrap();
        assert_eq!(formatted.text, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_json_keeps_key_order() {
        let formatted = format_document(r#"{"z":1,"a":2}"#, DocumentKind::Json, 1).unwrap();
        assert_eq!(formatted.text, "{\n \"z\": 1,\n \"a\": 2\n}");
    }

    #[test]
    fn test_json_malformed() {
        let err = format_document("{\"a\":", DocumentKind::Json, 4).unwrap_err();
        assert_eq!(err.kind, DocumentKind::Json);
        assert!(err.to_string().starts_with("Error formatting JSON"));
    }

    #[test]
    fn test_xml_indent_and_comments() {
        let input = "<root><!-- note --><a x=\"1\">text</a><b/></root>";
        let formatted = format_document(input, DocumentKind::Xml, 2).unwrap();
        assert_eq!(
            formatted.text,
            "<root>\n  <a x=\"1\">text</a>\n  <b/>\n</root>"
        );
        assert!(!formatted.text.contains("note"));
    }

    #[test]
    fn test_xml_reparse_is_equivalent() {
        let input = "<?xml version=\"1.0\"?>\n<cfg>\n   <item id=\"1\">one</item>\n\n <item id=\"2\"><sub/></item>\n</cfg>";
        let formatted = format_document(input, DocumentKind::Xml, 4).unwrap();
        assert_eq!(xml_events(&formatted.text), xml_events(input));
    }

    #[test]
    fn test_xml_malformed() {
        assert!(format_document("<a><b></a>", DocumentKind::Xml, 4).is_err());
        assert!(format_document("<a>", DocumentKind::Xml, 4).is_err());
        assert!(format_document("<a/><b/>", DocumentKind::Xml, 4).is_err());
        assert!(format_document("just text", DocumentKind::Xml, 4).is_err());
        assert!(format_document("", DocumentKind::Xml, 4).is_err());
        assert!(format_document("<a x='1' x='2'/>", DocumentKind::Xml, 2).is_err());
        assert!(format_document("<a x=1/>", DocumentKind::Xml, 2).is_err());
        assert!(format_document("<a>&undefined;</a>", DocumentKind::Xml, 2).is_err());
        assert!(format_document("<a b=\"&nope;\"/>", DocumentKind::Xml, 2).is_err());
    }

    #[test]
    fn test_xml_entities_are_kept() {
        let input = "<a t=\"&quot;x&quot;\">&lt;b&gt; &amp; &#65;</a>";
        let formatted = format_document(input, DocumentKind::Xml, 2).unwrap();
        assert_eq!(formatted.text, input);
    }

    fn yaml_round_trip(input: &str, indent: usize) -> String {
        let formatted = format_document(input, DocumentKind::Yaml, indent).unwrap();
        let reparsed: serde_yaml::Value = serde_yaml::from_str(&formatted.text).unwrap();
        let original: serde_yaml::Value = serde_yaml::from_str(input).unwrap();
        assert_eq!(reparsed, original);
        formatted.text
    }

    #[test]
    fn test_yaml_indent() {
        let input = "a:\n  b:\n    c: 1\n  list:\n  - x\n  - y\n";
        assert_eq!(
            yaml_round_trip(input, 4),
            "a:\n    b:\n        c: 1\n    list:\n        -   x\n        -   y\n"
        );
    }

    #[test]
    fn test_yaml_sequence_of_mappings() {
        let input = "- name: one\n  id: 1\n- name: two\n  tags: [a, b]\n";
        assert_eq!(
            yaml_round_trip(input, 4),
            "-   name: one\n    id: 1\n-   name: two\n    tags:\n        -   a\n        -   b\n"
        );
        yaml_round_trip(input, 1);
        yaml_round_trip(input, 3);
    }

    #[test]
    fn test_yaml_multiline_strings() {
        yaml_round_trip("outer:\n  text: \"line one\\n  indented two\\n\"\n", 4);
        yaml_round_trip("- \"  leading\\nspaces\"\n- \"keep\\n\\n\\n\"\n", 3);
    }

    #[test]
    fn test_yaml_empty_collections_and_scalars() {
        yaml_round_trip("a: {}\nb: []\nc: null\nd: '123'\n", 4);
        assert_eq!(yaml_round_trip("42\n", 4), "42\n");
    }

    #[test]
    fn test_yaml_malformed() {
        assert!(format_document("a: [1, 2", DocumentKind::Yaml, 4).is_err());
        assert!(format_document("a: b: c", DocumentKind::Yaml, 4).is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("json".parse::<DocumentKind>().unwrap(), DocumentKind::Json);
        assert_eq!("text/xml".parse::<DocumentKind>().unwrap(), DocumentKind::Xml);
        assert!("csv".parse::<DocumentKind>().is_err());
    }
}

//! HTML fragments of one test: header table, separator and steps table.
//!
//! The `decorate_*` helpers produce the individual elements. CSS classes are
//! prefixed with `extras_` and styled by [`super::report::DEFAULT_CSS`].

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::Config;
use crate::link::Link;
use crate::mime::Mime;
use crate::record::{Attachment, Entry, Media, Status, Step, TestOutcome, TestRecord};
use crate::session::DOWNLOADS_DIR;

const NEW_TAB: &str = r#"target="_blank" rel="noopener noreferrer""#;
const COMMENT_CLASS: &str = "extras_font extras_color_comment";

/// Header table, optional separator and steps table, in that order
pub fn render_fragments(record: &TestRecord, config: &Config) -> Vec<String> {
    let mut header = String::new();
    let outcome = record
        .outcome()
        .cloned()
        .unwrap_or_else(|| TestOutcome::new(Status::Unknown));
    header.push_str(&status_row(&outcome));
    if let Some(description) = &record.description {
        header.push_str(&header_row("Description", &decorate_description(description)));
    }
    if !record.parameters.is_empty() {
        header.push_str(&header_row("Parameters", &decorate_parameters(&record.parameters)));
    }
    if outcome.exception.is_some() {
        header.push_str(&header_row("Exception", &decorate_exception(&outcome)));
    }
    let links = record.links(config);
    if !links.is_empty() {
        header.push_str(&header_row("Links", &decorate_links(&links)));
    }

    let steps: String = record
        .entries()
        .iter()
        .map(|entry| entry_row(entry, config.single_page))
        .collect();

    if !steps.is_empty() {
        header.push_str(
            "<tr class=\"visibility_execution\">\
             <td style=\"border: 0px\"><span class=\"extras_title\">Execution</span></td>\
             <td class=\"extras_header_middle\" style=\"border: 0px\"></td>\
             <td style=\"border: 0px\"></td>\
             </tr>",
        );
    }
    let rows = header.matches("</tr>").count();
    let mut fragments = vec![format!("<table class=\"extras_header\">{}</table>", header)];
    if !steps.is_empty() {
        if rows > 1 {
            fragments.push("<hr class=\"extras_separator\">".to_string());
        }
        fragments.push(format!("<table style=\"width: 100%;\">{}</table>", steps));
    }
    fragments
}

fn header_row(title: &str, content: &str) -> String {
    format!(
        "<tr>\
         <td style=\"border: 0px\"><span class=\"extras_title\">{}</span></td>\
         <td class=\"extras_header_middle\" style=\"border: 0px\"></td>\
         <td style=\"border: 0px\">{}</td>\
         </tr>",
        title, content
    )
}

/// Status badge and reason
pub fn status_row(outcome: &TestOutcome) -> String {
    let status = outcome.status;
    format!(
        "<tr>\
         <td style=\"border: 0px\"><span class=\"extras_status extras_status_{}\">{}</span></td>\
         <td class=\"extras_header_middle\" style=\"border: 0px\"></td>\
         <td style=\"border: 0px\" class=\"extras_status_reason\">{}</td>\
         </tr>",
        status,
        status.label(),
        decorate_reason(outcome)
    )
}

pub fn decorate_reason(outcome: &TestOutcome) -> String {
    match outcome.reason.as_deref() {
        Some(reason) if !reason.is_empty() => {
            let reason = reason.strip_prefix("reason: ").unwrap_or(reason);
            format!("Reason: {}", encode_text(reason))
        }
        _ => String::new(),
    }
}

pub fn decorate_description(description: &str) -> String {
    let description = encode_text(description.trim()).replace('\n', "<br>");
    format!("<pre class=\"extras_description extras_code\">{}</pre>", description)
}

pub fn decorate_parameters(parameters: &[(String, String)]) -> String {
    parameters
        .iter()
        .map(|(key, value)| {
            format!(
                "<span class=\"extras_params_key\">{}</span><span class=\"extras_params_value\">: {}</span><br>",
                encode_text(key),
                encode_text(value)
            )
        })
        .collect()
}

pub fn decorate_exception(outcome: &TestOutcome) -> String {
    match &outcome.exception {
        Some(exception) => format!(
            "<pre class=\"extras_code\">{}</pre><br><pre class=\"extras_code\">{}</pre>",
            encode_text(&exception.type_name),
            encode_text(&exception.message)
        ),
        None => String::new(),
    }
}

pub fn decorate_links(links: &[Link]) -> String {
    links
        .iter()
        .map(|link| {
            format!(
                "<a href=\"{}\" {} class=\"extras_link\">{} {}</a>",
                encode_double_quoted_attribute(&link.url),
                NEW_TAB,
                link.icon,
                encode_text(&link.name)
            )
        })
        .collect::<Vec<_>>()
        .join("&nbsp;&nbsp;")
}

/// One `<tr>` of the steps table
pub fn entry_row(entry: &Entry, single_page: bool) -> String {
    match entry {
        Entry::Step(step) => step_row(step, single_page),
        Entry::Attachment(attachment) => attachment_row(attachment, single_page),
        Entry::Link(link) => {
            let anchor = format!(
                "<a href=\"{}\" {}>{}</a>",
                encode_double_quoted_attribute(&link.url),
                NEW_TAB,
                encode_text(&link.name)
            );
            wide_row(&decorate_comment(&anchor, COMMENT_CLASS))
        }
    }
}

fn step_row(step: &Step, single_page: bool) -> String {
    let class = match step.emphasis {
        Some(status) => format!("extras_font extras_color_{}", status),
        None => COMMENT_CLASS.to_string(),
    };
    let comment = decorate_comment(&step.comment, &class);
    let image = step
        .image
        .as_ref()
        .and_then(|media| media.uri.as_deref())
        .map(|uri| decorate_image(uri, single_page));
    let source = step
        .page_source
        .as_ref()
        .and_then(|source| source.uri.as_deref());
    let row = match image {
        Some(image) => media_row(&comment, &image, source),
        None => wide_row(&comment),
    };
    if step.capture_failed {
        row.replacen("<tr>", "<tr class=\"visibility_last_scr_error\">", 1)
    } else {
        row
    }
}

fn attachment_row(attachment: &Attachment, single_page: bool) -> String {
    let comment = decorate_comment(&attachment.comment, COMMENT_CLASS);
    if let Some(media) = &attachment.media {
        if let Some(element) = decorate_media(media, single_page) {
            return media_row(&comment, &element, None);
        }
    }
    wide_row(&format!("{}{}", comment, decorate_attachment(attachment)))
}

fn media_row(comment: &str, multimedia: &str, source: Option<&str>) -> String {
    let content = match source {
        Some(uri) => format!("{}<br>{}", multimedia, decorate_page_source(uri)),
        None => multimedia.to_string(),
    };
    format!(
        "<tr><td>{}</td><td class=\"extras_td\"><div class=\"extras_td_div\">{}</div></td></tr>",
        comment, content
    )
}

fn wide_row(content: &str) -> String {
    format!("<tr><td colspan=\"2\">{}</td></tr>", content)
}

/// Image, SVG, video or audio element; `None` when the media has no link
pub fn decorate_media(media: &Media, single_page: bool) -> Option<String> {
    let uri = media.uri.as_deref()?;
    let element = match media.mime {
        Mime::Svg => decorate_image_svg(uri, &String::from_utf8_lossy(&media.data), single_page),
        mime if mime.is_video() => decorate_video(uri, mime),
        mime if mime.is_audio() => decorate_audio(uri, mime),
        _ => decorate_image(uri, single_page),
    };
    Some(element)
}

pub fn decorate_comment(comment: &str, class: &str) -> String {
    if comment.is_empty() {
        return String::new();
    }
    format!("<span class=\"{}\">{}</span>", class, comment)
}

/// Linked thumbnail, or a bare image for embedded data URIs
pub fn decorate_image(uri: &str, single_page: bool) -> String {
    if uri.is_empty() {
        return String::new();
    }
    if single_page {
        format!("<img src=\"{}\" class=\"extras_image\">", uri)
    } else {
        format!(
            "<a href=\"{uri}\" {NEW_TAB}><img src=\"{uri}\" class=\"extras_image\"></a>",
            uri = encode_double_quoted_attribute(uri)
        )
    }
}

pub fn decorate_image_svg(uri: &str, svg: &str, single_page: bool) -> String {
    if uri.is_empty() || svg.is_empty() {
        return String::new();
    }
    if single_page {
        svg.to_string()
    } else {
        format!("<a href=\"{}\" {}>{}</a>", encode_double_quoted_attribute(uri), NEW_TAB, svg)
    }
}

pub fn decorate_video(uri: &str, mime: Mime) -> String {
    format!(
        "<video controls class=\"extras_video\"><source src=\"{}\" type=\"{}\">\
         Your browser does not support the video tag.</video>",
        uri, mime
    )
}

pub fn decorate_audio(uri: &str, mime: Mime) -> String {
    format!(
        "<audio controls class=\"extras_audio\"><source src=\"{}\" type=\"{}\">\
         Your browser does not support the audio tag.</audio>",
        uri, mime
    )
}

pub fn decorate_page_source(uri: &str) -> String {
    format!(
        "<a href=\"{}\" {} class=\"extras_page_src\">[page source]</a>",
        uri, NEW_TAB
    )
}

/// Anchor for a URI. Download links show the file name only.
pub fn decorate_uri(uri: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    let text = if uri.starts_with(DOWNLOADS_DIR) {
        uri.rsplit('/').next().unwrap_or(uri)
    } else {
        uri
    };
    format!(
        "<a href=\"{}\" {}>{}</a>",
        encode_double_quoted_attribute(uri),
        NEW_TAB,
        encode_text(text)
    )
}

pub fn decorate_uri_list(uris: &[&str]) -> String {
    uris.iter()
        .filter(|uri| !uri.is_empty())
        .map(|uri| format!("{}<br>", decorate_uri(uri)))
        .collect()
}

/// Body of a non-multimedia attachment, placed below its comment
pub fn decorate_attachment(attachment: &Attachment) -> String {
    if let Some(inner_html) = attachment.inner_html.as_deref().filter(|h| !h.is_empty()) {
        return match attachment.mime {
            None => format!(" {}", inner_html),
            Some(Mime::Html) => format!("<br><iframe class=\"extras_iframe\" src=\"{}\"></iframe>", inner_html),
            Some(_) => format!("<pre class=\"extras_pre\">{}</pre>", inner_html),
        };
    }
    match attachment.text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => format!("<pre class=\"extras_pre\">{}</pre>", encode_text(text)),
        None => String::new(),
    }
}

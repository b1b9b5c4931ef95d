//! Supported attachment MIME types.
//!
//! Callers may name a type by its MIME string (`application/json`), by a
//! common alias (`text/xml`) or by a file extension (`json`, `png`, `uri`).
//! [`Mime::parse`] maps all of these onto the closed [`Mime`] enum.

use std::fmt;
use std::str::FromStr;

/// MIME types understood by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mime {
    Json,
    Xml,
    Yaml,
    Bmp,
    Gif,
    Jpeg,
    Png,
    Svg,
    Csv,
    Html,
    Text,
    UriList,
    Mp4,
    Ogg,
    Ogv,
    Webm,
    Mpeg,
    Wav,
}

const ALL: [Mime; 18] = [
    Mime::Json,
    Mime::Xml,
    Mime::Yaml,
    Mime::Bmp,
    Mime::Gif,
    Mime::Jpeg,
    Mime::Png,
    Mime::Svg,
    Mime::Csv,
    Mime::Html,
    Mime::Text,
    Mime::UriList,
    Mime::Mp4,
    Mime::Ogg,
    Mime::Ogv,
    Mime::Webm,
    Mime::Mpeg,
    Mime::Wav,
];

impl Mime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mime::Json => "application/json",
            Mime::Xml => "application/xml",
            Mime::Yaml => "application/yaml",
            Mime::Bmp => "image/bmp",
            Mime::Gif => "image/gif",
            Mime::Jpeg => "image/jpeg",
            Mime::Png => "image/png",
            Mime::Svg => "image/svg+xml",
            Mime::Csv => "text/csv",
            Mime::Html => "text/html",
            Mime::Text => "text/plain",
            Mime::UriList => "text/uri-list",
            Mime::Mp4 => "video/mp4",
            Mime::Ogg => "video/ogg",
            Mime::Ogv => "video/ogv",
            Mime::Webm => "video/webm",
            Mime::Mpeg => "audio/mpeg",
            Mime::Wav => "audio/wav",
        }
    }

    /// Canonicalize a MIME string, alias or file extension.
    /// Returns `None` for anything unsupported.
    pub fn parse(value: &str) -> Option<Mime> {
        let value = value.trim().to_lowercase();
        let alias = match value.as_str() {
            "text/xml" | "xml" => Some(Mime::Xml),
            "text/json" | "json" => Some(Mime::Json),
            "application/x-yaml" | "text/yaml" | "yaml" | "yml" => Some(Mime::Yaml),
            "text" | "txt" | "plain" => Some(Mime::Text),
            "svg" => Some(Mime::Svg),
            "uri" | "uri-list" => Some(Mime::UriList),
            "bmp" => Some(Mime::Bmp),
            "gif" => Some(Mime::Gif),
            "jpeg" | "jpg" | "image/jpg" => Some(Mime::Jpeg),
            "png" => Some(Mime::Png),
            "csv" => Some(Mime::Csv),
            "html" | "htm" => Some(Mime::Html),
            "mp4" => Some(Mime::Mp4),
            "ogg" => Some(Mime::Ogg),
            "ogv" => Some(Mime::Ogv),
            "webm" => Some(Mime::Webm),
            "mp3" | "mpeg" | "audio/mp3" => Some(Mime::Mpeg),
            "wav" | "audio/x-wav" => Some(Mime::Wav),
            _ => None,
        };
        alias.or_else(|| ALL.iter().copied().find(|m| m.as_str() == value))
    }

    /// File extension used for sidecar files
    pub fn extension(&self) -> &'static str {
        match self {
            Mime::Text => "txt",
            Mime::Svg => "svg",
            Mime::UriList => "uri",
            Mime::Mpeg => "mp3",
            other => {
                let s = other.as_str();
                &s[s.find('/').map_or(0, |i| i + 1)..]
            }
        }
    }

    pub fn is_image(&self) -> bool {
        self.as_str().starts_with("image/")
    }

    /// Image in a binary encoding (everything but SVG)
    pub fn is_image_binary(&self) -> bool {
        self.is_image() && *self != Mime::Svg
    }

    pub fn is_video(&self) -> bool {
        self.as_str().starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.as_str().starts_with("audio/")
    }

    /// Rendered in the multimedia column of the report
    pub fn is_multimedia(&self) -> bool {
        self.is_image() || self.is_video() || self.is_audio()
    }

    /// Carried as raw bytes rather than text
    pub fn is_binary(&self) -> bool {
        self.is_image_binary() || self.is_video() || self.is_audio()
    }
}

impl FromStr for Mime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mime::parse(s).ok_or_else(|| format!("unsupported mime type '{}'", s))
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension of an unsupported MIME string or file name: the text after the
/// last `.` or `/`
pub fn unknown_extension(value: &str) -> &str {
    match value.rfind(['.', '/']) {
        Some(i) => &value[i + 1..],
        None => value,
    }
}

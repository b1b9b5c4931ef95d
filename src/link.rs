//! Links to issue trackers, test management systems and arbitrary URLs.
//!
//! Links come from two places: `record_link` calls during the test, and
//! declarative [`LinkAnnotation`]s attached to the test record. Annotations
//! hold only keys; they are resolved against the configured URL patterns when
//! the record is rendered.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::config::{Config, PATTERN_SLOT};

/// Kind of link, also used by the links column filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Link,
    Issue,
    Tms,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Link => "link",
            LinkKind::Issue => "issue",
            LinkKind::Tms => "tms",
        }
    }

    /// Default icon as an HTML entity
    pub fn default_icon(&self) -> &'static str {
        match self {
            LinkKind::Link => "&#127758;",
            LinkKind::Issue => "&#128030;",
            LinkKind::Tms => "&#128221;",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub name: String,
    pub kind: LinkKind,
    pub icon: String,
}

impl Link {
    /// Plain link; `name` defaults to the URL
    pub fn new(url: impl Into<String>, name: Option<String>) -> Self {
        let url = url.into();
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| url.clone());
        Self::with_kind(url, name, LinkKind::Link, None)
    }

    pub fn with_kind(
        url: impl Into<String>,
        name: impl Into<String>,
        kind: LinkKind,
        icon: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            kind,
            icon: icon.unwrap_or_else(|| kind.default_icon().to_string()),
        }
    }
}

/// Declarative link metadata attached to a test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAnnotation {
    /// Issue keys, resolved with the issue link pattern
    Issue {
        keys: Vec<String>,
        icon: Option<String>,
    },
    /// Test case keys, resolved with the test management link pattern
    Tms {
        keys: Vec<String>,
        icon: Option<String>,
    },
    /// A raw URL with an optional display name
    Url {
        url: String,
        name: Option<String>,
        icon: Option<String>,
    },
}

impl LinkAnnotation {
    /// Issue keys, comma separated or one per item
    pub fn issues<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LinkAnnotation::Issue {
            keys: split_keys(keys),
            icon: None,
        }
    }

    pub fn tms<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LinkAnnotation::Tms {
            keys: split_keys(keys),
            icon: None,
        }
    }

    pub fn url(url: impl Into<String>, name: Option<&str>) -> Self {
        LinkAnnotation::Url {
            url: url.into(),
            name: name.map(str::to_string),
            icon: None,
        }
    }

    /// Override the default icon
    pub fn icon(mut self, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match &mut self {
            LinkAnnotation::Issue { icon, .. }
            | LinkAnnotation::Tms { icon, .. }
            | LinkAnnotation::Url { icon, .. } => *icon = value,
        }
        self
    }

    /// Resolve into links. Keys without a configured pattern are skipped.
    pub fn resolve(&self, config: &Config) -> Vec<Link> {
        match self {
            LinkAnnotation::Issue { keys, icon } => resolve_keys(
                keys,
                config.issue_link_pattern.as_deref(),
                LinkKind::Issue,
                icon,
            ),
            LinkAnnotation::Tms { keys, icon } => resolve_keys(
                keys,
                config.tms_link_pattern.as_deref(),
                LinkKind::Tms,
                icon,
            ),
            LinkAnnotation::Url { url, name, icon } => {
                let name = name.clone().unwrap_or_else(|| url.clone());
                vec![Link::with_kind(url.clone(), name, LinkKind::Link, icon.clone())]
            }
        }
    }
}

fn split_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .flat_map(|k| {
            k.as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|k| !k.is_empty())
        .collect()
}

fn resolve_keys(
    keys: &[String],
    pattern: Option<&str>,
    kind: LinkKind,
    icon: &Option<String>,
) -> Vec<Link> {
    let Some(pattern) = pattern else {
        if !keys.is_empty() {
            warn!(kind = %kind, keys = ?keys, "no {} link pattern configured, links skipped", kind);
        }
        return Vec::new();
    };
    keys.iter()
        .map(|key| {
            Link::with_kind(
                pattern.replacen(PATTERN_SLOT, key, 1),
                key.clone(),
                kind,
                icon.clone(),
            )
        })
        .collect()
}

/// Resolve every annotation in order
pub fn resolve_annotations(annotations: &[LinkAnnotation], config: &Config) -> Vec<Link> {
    annotations.iter().flat_map(|a| a.resolve(config)).collect()
}

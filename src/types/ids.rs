// src/types/ids.rs
use super::ValidationError;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use url::Url;

/// Strong typing for IDs with phantom types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T> {
    value: String,
    _phantom: PhantomData<T>,
}

/// Marker types for different ID kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageMarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentMarker;

/// Type aliases for specific ID types
pub type PageId = Id<PageMarker>;
pub type AttachmentId = Id<AttachmentMarker>;

impl<T> Id<T> {
    /// Create an ID from a raw identifier, rejecting blank input.
    pub fn new(input: impl Into<String>) -> Result<Self, ValidationError> {
        let value = input.into().trim().to_string();
        if value.is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }
        Ok(Self {
            value,
            _phantom: PhantomData,
        })
    }

    /// Create an ID from an already trusted string (internal use)
    pub(crate) fn from_trusted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _phantom: PhantomData,
        }
    }

    /// Get the ID as a string reference
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl PageId {
    /// Parse a numeric Confluence page id.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidId(format!(
                "page id must be numeric, got '{}'",
                input
            )));
        }
        Ok(Self::from_trusted(trimmed))
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Confluence returns ids as strings in most payloads and as numbers in a few
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(Self::from_trusted(s)),
            serde_json::Value::Number(n) => Ok(Self::from_trusted(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number id, got {}",
                other
            ))),
        }
    }
}

/// How a user or a link names a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageReference {
    /// A numeric page id.
    Id(PageId),
    /// A `/display/SPACE/Title` style reference.
    SpaceTitle { space: String, title: String },
}

static CLOUD_PAGE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/pages/(\d+)(?:/|$)").expect("cloud page path regex is valid")
});

impl PageReference {
    /// Parses a page id or a page URL.
    ///
    /// Supported forms:
    /// - `123456`
    /// - `.../pages/viewpage.action?pageId=123456`
    /// - `.../spaces/KEY/pages/123456/Title`
    /// - `.../display/KEY/Page+Title`
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if let Ok(id) = PageId::parse(trimmed) {
            return Ok(Self::Id(id));
        }

        let url = Url::parse(trimmed).map_err(|e| ValidationError::InvalidPageReference {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_url(&url).ok_or_else(|| ValidationError::InvalidPageReference {
            input: input.to_string(),
            reason: "URL does not name a page (expected pageId, /pages/<id> or /display/SPACE/Title)"
                .to_string(),
        })
    }

    /// Extracts a page reference from an absolute URL, if it names one.
    pub fn from_url(url: &Url) -> Option<Self> {
        if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "pageId") {
            return PageId::parse(&value).ok().map(Self::Id);
        }

        let path = url.path();
        if let Some(caps) = CLOUD_PAGE_PATH.captures(path) {
            return PageId::parse(&caps[1]).ok().map(Self::Id);
        }

        let (_, rest) = path.split_once("/display/")?;
        let (space, raw_title) = rest.split_once('/')?;
        if space.is_empty() || raw_title.is_empty() {
            return None;
        }
        Some(Self::SpaceTitle {
            space: space.to_string(),
            title: decode_display_title(raw_title),
        })
    }
}

/// Decodes the title segment of a `/display/` URL.
///
/// `+` encodes a space; `%2B` encodes a literal plus, so the plus
/// substitution has to happen before percent-decoding.
pub fn decode_display_title(raw: &str) -> String {
    let spaced = raw.trim_end_matches('/').replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::SpaceTitle { space, title } => write!(f, "{}/{}", space, title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_parsing() {
        let id = PageId::parse(" 1222798993 ").unwrap();
        assert_eq!(id.as_str(), "1222798993");

        assert!(PageId::parse("").is_err());
        assert!(PageId::parse("12ab").is_err());
    }

    #[test]
    fn test_reference_from_viewpage_url() {
        let reference = PageReference::parse(
            "https://confluence.example.com/pages/viewpage.action?pageId=1222798993",
        )
        .unwrap();
        assert_eq!(
            reference,
            PageReference::Id(PageId::parse("1222798993").unwrap())
        );
    }

    #[test]
    fn test_reference_from_cloud_url() {
        let reference =
            PageReference::parse("https://x.atlassian.net/wiki/spaces/ENG/pages/42/Runbook")
                .unwrap();
        assert_eq!(reference, PageReference::Id(PageId::parse("42").unwrap()));
    }

    #[test]
    fn test_reference_from_display_url() {
        let reference =
            PageReference::parse("https://confluence.example.com/display/SPACE/Page+With%2BPlus")
                .unwrap();
        assert_eq!(
            reference,
            PageReference::SpaceTitle {
                space: "SPACE".to_string(),
                title: "Page With+Plus".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_references() {
        assert!(PageReference::parse("not a url").is_err());
        assert!(PageReference::parse("https://confluence.example.com/display/SPACE").is_err());
        assert!(PageReference::parse("https://confluence.example.com/x/AbCd").is_err());
    }
}

// src/types/domain_types.rs
//! Domain-specific newtypes for type safety and validation.

use super::{PageId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Personal access token for the wiki REST API
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Create a new token with validation
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        let trimmed = token.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::InvalidApiToken {
                reason: "token cannot be empty".to_string(),
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidApiToken {
                reason: "token must not contain whitespace".to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the token as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiToken({})", self)
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redact token in display
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "{}...", visible)
    }
}

/// Validated base URL of the wiki instance, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BaseUrl::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl BaseUrl {
    pub fn parse(url: &str) -> Result<Self, ValidationError> {
        let trimmed = url.trim().trim_end_matches('/');
        match Url::parse(trimmed) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(ValidationError::InvalidUrl {
                        url: url.to_string(),
                        reason: "Only HTTP and HTTPS URLs are supported".to_string(),
                    });
                }
                Ok(Self(parsed))
            }
            Err(e) => Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// The base URL without a trailing slash.
    pub fn as_str(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Host part, lower-cased, used to tell internal links from external ones.
    pub fn host(&self) -> Option<String> {
        self.0.host_str().map(str::to_lowercase)
    }

    /// Canonical URL of a page on the source wiki.
    pub fn page_url(&self, id: &PageId) -> String {
        format!("{}/pages/viewpage.action?pageId={}", self.as_str(), id)
    }

    /// Joins an API path or a server-relative link onto the base URL.
    ///
    /// Server-relative links (`/download/...`) keep the context path of the
    /// base URL, matching how the wiki reports its own links.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.as_str(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical file name of an attachment inside the export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportFileName(String);

impl ExportFileName {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let base = BaseUrl::parse("https://confluence.example.com/").unwrap();
        assert_eq!(base.as_str(), "https://confluence.example.com");
        assert_eq!(
            base.page_url(&PageId::parse("7").unwrap()),
            "https://confluence.example.com/pages/viewpage.action?pageId=7"
        );
    }

    #[test]
    fn test_base_url_join_keeps_context_path() {
        let base = BaseUrl::parse("https://example.com/wiki").unwrap();
        assert_eq!(
            base.join("/download/attachments/1/a.png"),
            "https://example.com/wiki/download/attachments/1/a.png"
        );
        assert_eq!(base.join("https://cdn.example.com/x"), "https://cdn.example.com/x");
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        assert!(BaseUrl::parse("ftp://example.com").is_err());
        assert!(BaseUrl::parse("example").is_err());
    }

    #[test]
    fn test_token_is_redacted() {
        let token = ApiToken::new("abcdefghijkl").unwrap();
        assert_eq!(token.to_string(), "abcd...");
        assert!(ApiToken::new("  ").is_err());
    }
}

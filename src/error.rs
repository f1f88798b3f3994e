// src/error.rs
//! Application error types with structured error handling.
//!
//! `AppError` covers failures that abort an operation: a page that cannot be
//! fetched, markup that cannot be tokenized at all, a page that runs past its
//! deadline. Problems with a single macro or attachment are not errors; they
//! are recorded as a `ResourceStatus` in the export report.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Wiki REST API failures as a typed vocabulary, derived from HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WikiErrorCode {
    /// Credentials missing, invalid or expired
    Unauthorized,
    /// Authenticated but not allowed to read the resource
    Forbidden,
    /// The page, attachment or space does not exist
    NotFound,
    /// Too many requests, back off and retry
    RateLimited,
    /// 5xx from the wiki or a proxy in front of it
    ServerError(u16),
    /// Any other non-success status
    HttpStatus(u16),
}

impl WikiErrorCode {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError(status),
            other => Self::HttpStatus(other),
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

impl fmt::Display for WikiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not_found"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ServerError(code) => write!(f, "server_error_{}", code),
            Self::HttpStatus(code) => write!(f, "http_{}", code),
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Wiki API returned an error ({code}): {message}")]
    WikiService {
        code: WikiErrorCode,
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Malformed markup: {reason}")]
    MalformedMarkup { reason: String },

    #[error("Page {page_id} did not finish within {timeout:?}")]
    PageTimeout { page_id: String, timeout: Duration },

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Output delivery failed: {}", failures.join(", "))]
    DeliveryFailed { failures: Vec<String> },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    ValidationError(#[from] crate::types::ValidationError),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

/// Domain vocabulary for why a fetch failed.
///
/// Not an error type: a classification used to decide between retrying,
/// reporting and giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    Auth,
    NotFound,
    Transient,
    Other,
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "auth"),
            Self::NotFound => write!(f, "not found"),
            Self::Transient => write!(f, "transient"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Classifies an error raised while talking to the wiki or an include host.
pub fn classify_fetch_failure(error: &AppError) -> FetchFailureKind {
    match error {
        AppError::WikiService { code, .. } if code.is_auth() => FetchFailureKind::Auth,
        AppError::WikiService { code, .. } if code.is_not_found() => FetchFailureKind::NotFound,
        AppError::WikiService { code, .. } if code.is_retryable() => FetchFailureKind::Transient,
        AppError::NetworkFailure(err) => {
            if err.is_timeout() || err.is_connect() || err.is_request() {
                FetchFailureKind::Transient
            } else {
                FetchFailureKind::Other
            }
        }
        AppError::PageTimeout { .. } => FetchFailureKind::Transient,
        _ => FetchFailureKind::Other,
    }
}

/// Short reason recorded in the export report for a failed fetch.
pub fn failure_reason(error: &AppError) -> String {
    match error {
        AppError::PageTimeout { .. } => "timeout".to_string(),
        AppError::NetworkFailure(err) if err.is_timeout() => "timeout".to_string(),
        AppError::NetworkFailure(err) if err.is_connect() => "connection error".to_string(),
        AppError::WikiService { code, .. } => code.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_error(status: u16) -> AppError {
        AppError::WikiService {
            code: WikiErrorCode::from_http_status(status),
            message: "boom".to_string(),
            status: reqwest::StatusCode::from_u16(status).unwrap(),
        }
    }

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(WikiErrorCode::from_http_status(401), WikiErrorCode::Unauthorized);
        assert_eq!(WikiErrorCode::from_http_status(503), WikiErrorCode::ServerError(503));
        assert_eq!(WikiErrorCode::from_http_status(418), WikiErrorCode::HttpStatus(418));
        assert_eq!(WikiErrorCode::RateLimited.to_string(), "rate_limited");
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_fetch_failure(&service_error(401)), FetchFailureKind::Auth);
        assert_eq!(classify_fetch_failure(&service_error(403)), FetchFailureKind::Auth);
        assert_eq!(classify_fetch_failure(&service_error(404)), FetchFailureKind::NotFound);
        assert_eq!(classify_fetch_failure(&service_error(502)), FetchFailureKind::Transient);
        assert_eq!(classify_fetch_failure(&service_error(400)), FetchFailureKind::Other);
        assert_eq!(
            classify_fetch_failure(&AppError::PageTimeout {
                page_id: "1".to_string(),
                timeout: Duration::from_secs(1),
            }),
            FetchFailureKind::Transient
        );
    }

    #[test]
    fn test_failure_reasons_are_short() {
        assert_eq!(failure_reason(&service_error(404)), "not_found");
        assert_eq!(failure_reason(&service_error(503)), "server_error_503");
        assert_eq!(
            failure_reason(&AppError::PageTimeout {
                page_id: "1".to_string(),
                timeout: Duration::from_secs(1),
            }),
            "timeout"
        );
    }
}

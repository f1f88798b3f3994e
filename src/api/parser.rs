// src/api/parser.rs
//! Response parsing: HTTP status and body text in, domain values out.
//!
//! Kept free of I/O so every branch can be tested with literal JSON.

use super::client::ApiResponse;
use super::responses::{
    AttachmentResponse, ContentResponse, ContentSummary, ErrorResponse, Results, ToDomain,
};
use crate::constants::ERROR_BODY_PREVIEW_LENGTH;
use crate::error::{AppError, WikiErrorCode};
use crate::model::{AttachmentEntry, Page};
use crate::types::PageId;
use reqwest::StatusCode;

/// One page of an offset-paginated listing, already converted.
#[derive(Debug, Clone)]
pub struct OffsetPage<T> {
    pub results: Vec<T>,
    pub has_more: bool,
}

/// Parses a response body, turning non-success statuses into `WikiService` errors.
pub fn parse_api_response<T>(result: &ApiResponse<String>) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned,
{
    check_status(result)?;
    serde_json::from_str(&result.data).map_err(|e| {
        log::error!("Failed to parse response from {}: {}", result.url, e);
        AppError::MalformedResponse(format!("{} (body: {})", e, preview(&result.data)))
    })
}

/// Maps a non-success status to an error, preferring the wiki's own message.
pub fn check_status<T>(result: &ApiResponse<T>) -> Result<(), AppError>
where
    T: AsRef<[u8]>,
{
    if result.status.is_success() {
        return Ok(());
    }
    let body = String::from_utf8_lossy(result.data.as_ref());
    Err(service_error(result.status, &body, &result.url))
}

fn service_error(status: StatusCode, body: &str, url: &str) -> AppError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {} from {}: {}", status, url, preview(body)));

    AppError::WikiService {
        code: WikiErrorCode::from_http_status(status.as_u16()),
        message,
        status,
    }
}

fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(ERROR_BODY_PREVIEW_LENGTH).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub fn parse_page_response(result: &ApiResponse<String>) -> Result<Page, AppError> {
    let content: ContentResponse = parse_api_response(result)?;
    content.to_domain()
}

pub fn parse_attachment_page(
    result: &ApiResponse<String>,
) -> Result<OffsetPage<AttachmentEntry>, AppError> {
    let listing: Results<AttachmentResponse> = parse_api_response(result)?;
    let has_more = listing.has_more();
    let results = listing
        .results
        .into_iter()
        .map(ToDomain::to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OffsetPage { results, has_more })
}

/// First page id of a title search, if any matched.
pub fn parse_page_search(result: &ApiResponse<String>) -> Result<Option<PageId>, AppError> {
    let listing: Results<ContentSummary> = parse_api_response(result)?;
    Ok(listing.results.into_iter().next().map(|summary| summary.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(status: u16, body: &str) -> ApiResponse<String> {
        ApiResponse {
            data: body.to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            url: "https://wiki.example.com/rest/api/content/1".to_string(),
        }
    }

    #[test]
    fn test_page_with_all_renderings() {
        let body = r#"{
            "id": "123",
            "type": "page",
            "title": "Runbook",
            "space": {"key": "OPS", "name": "Operations"},
            "body": {
                "view": {"value": "<p>view</p>", "representation": "view"},
                "export_view": {"value": "<p>export</p>"},
                "editor": {"value": "<p>first</p>"}
            },
            "ancestors": [{"id": "1", "title": "Home"}, {"id": "7", "title": "Ops"}],
            "metadata": {"labels": {"results": [{"name": "ops"}, {"name": "alpha"}], "size": 2}}
        }"#;
        let page = parse_page_response(&response(200, body)).unwrap();
        assert_eq!(page.id.as_str(), "123");
        assert_eq!(page.title.as_str(), "Runbook");
        assert_eq!(page.space_key, "OPS");
        assert_eq!(page.body, "<p>view</p>");
        assert_eq!(page.body_export, "<p>export</p>");
        assert_eq!(page.editor_first_version, "<p>first</p>");
        let ancestors: Vec<_> = page.ancestors.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(ancestors, vec!["Home", "Ops"]);
        let labels: Vec<_> = page.labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["alpha", "ops"]);
        assert!(page.attachments.is_empty());
    }

    #[test]
    fn test_sparse_page_defaults() {
        let page = parse_page_response(&response(200, r#"{"id": 42}"#)).unwrap();
        assert_eq!(page.id.as_str(), "42");
        assert!(page.body.is_empty());
        assert!(page.ancestors.is_empty());
    }

    #[test]
    fn test_attachment_listing() {
        let body = r#"{
            "results": [
                {
                    "id": "att1",
                    "title": "Diagram.PNG",
                    "extensions": {"mediaType": "image/png", "fileSize": 2048},
                    "_links": {"download": "/download/attachments/123/Diagram.PNG?api=v2"}
                },
                {
                    "id": "att2",
                    "title": "notes.txt",
                    "metadata": {"mediaType": "text/plain"},
                    "_links": {"download": "/download/attachments/123/notes.txt"}
                }
            ],
            "start": 0, "limit": 2, "size": 2,
            "_links": {"next": "/rest/api/content/123/child/attachment?start=2"}
        }"#;
        let page = parse_attachment_page(&response(200, body)).unwrap();
        assert!(page.has_more);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].file_size, Some(2048));
        assert_eq!(page.results[1].media_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_error_status_uses_wiki_message() {
        let body = r#"{"statusCode": 404, "message": "No content found with id: 9"}"#;
        match parse_page_response(&response(404, body)) {
            Err(AppError::WikiService { code, message, .. }) => {
                assert_eq!(code, WikiErrorCode::NotFound);
                assert_eq!(message, "No content found with id: 9");
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_status_with_html_body() {
        match parse_page_response(&response(401, "<html>login</html>")) {
            Err(AppError::WikiService { code, message, .. }) => {
                assert_eq!(code, WikiErrorCode::Unauthorized);
                assert!(message.contains("<html>login</html>"));
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[test]
    fn test_page_search() {
        let found = parse_page_search(&response(200, r#"{"results": [{"id": "55"}]}"#)).unwrap();
        assert_eq!(found.map(|id| id.to_string()), Some("55".to_string()));
        let none = parse_page_search(&response(200, r#"{"results": []}"#)).unwrap();
        assert!(none.is_none());
    }
}

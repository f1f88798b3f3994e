// src/api/client.rs
//! Thin reqwest wrapper for the Confluence REST API.
//!
//! Handles authentication and raw request/response plumbing; parsing lives
//! in [`super::parser`].

use super::pagination::fetch_all_offsets;
use super::parser::{
    check_status, parse_attachment_page, parse_page_response, parse_page_search,
};
use super::WikiRepository;
use crate::config::Credentials;
use crate::constants::{
    PAGE_EXPANSIONS, RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS, WIKI_API_PAGE_SIZE,
    WIKI_FETCH_MAX_ATTEMPTS,
};
use crate::error::AppError;
use crate::error_recovery::retry_with_backoff;
use crate::model::{AttachmentEntry, AttachmentManifest, Page};
use crate::types::{BaseUrl, PageId};
use base64::Engine;
use reqwest::{header, Client, Response};
use std::time::Duration;
use url::Url;

/// A reqwest client bound to one wiki and one set of credentials.
#[derive(Clone)]
pub struct ConfluenceHttpClient {
    client: Client,
    base_url: BaseUrl,
}

impl ConfluenceHttpClient {
    pub fn new(base_url: BaseUrl, credentials: &Credentials) -> Result<Self, AppError> {
        let client = Client::builder()
            .default_headers(Self::create_headers(credentials)?)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Bearer token by default, basic auth when a username is configured.
    fn create_headers(credentials: &Credentials) -> Result<header::HeaderMap, AppError> {
        let mut headers = header::HeaderMap::new();

        let auth_header = match &credentials.username {
            Some(username) => {
                let pair = format!("{}:{}", username, credentials.token.as_str());
                format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(pair)
                )
            }
            None => format!("Bearer {}", credentials.token.as_str()),
        };
        let mut auth_value = header::HeaderValue::from_str(&auth_header).map_err(|e| {
            AppError::MissingConfiguration(format!("Invalid API token format: {}", e))
        })?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);

        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// Makes a GET request to an absolute URL.
    pub async fn get(&self, url: &str) -> Result<Response, AppError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        log::debug!("{} -> {}", url, response.status());
        Ok(response)
    }

    async fn get_text(&self, url: &str) -> Result<ApiResponse<String>, AppError> {
        let response = self.get(url).await?;
        extract_response_text(response).await
    }

    /// GET with bounded retries for transient failures.
    async fn get_text_with_retry(&self, url: &str) -> Result<ApiResponse<String>, AppError> {
        retry_with_backoff(
            move || async move {
                let result = self.get_text(url).await?;
                // Retryable statuses have to surface as errors to be retried
                check_status(&result)?;
                Ok(result)
            },
            WIKI_FETCH_MAX_ATTEMPTS,
            Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            Duration::from_millis(RETRY_MAX_DELAY_MS),
        )
        .await
    }

    fn api_url(&self, path: &str, params: &[(&str, String)]) -> Result<String, AppError> {
        let base = self.base_url.join(path);
        let url = Url::parse_with_params(&base, params).map_err(|e| {
            AppError::PathError(format!("Could not build API URL from {}: {}", base, e))
        })?;
        Ok(url.to_string())
    }
}

#[async_trait::async_trait]
impl WikiRepository for ConfluenceHttpClient {
    async fn fetch_page_by_id(&self, id: &PageId) -> Result<Page, AppError> {
        let url = self.api_url(
            &format!("rest/api/content/{}", id),
            &[("expand", PAGE_EXPANSIONS.to_string())],
        )?;
        let result = self.get_text_with_retry(&url).await?;
        parse_page_response(&result)
    }

    async fn fetch_attachment_manifest(
        &self,
        page_id: &PageId,
    ) -> Result<AttachmentManifest, AppError> {
        let path = format!("rest/api/content/{}/child/attachment", page_id);
        let entries = fetch_all_offsets(
            |start, limit| {
                let path = path.clone();
                async move {
                    let url = self.api_url(
                        &path,
                        &[("start", start.to_string()), ("limit", limit.to_string())],
                    )?;
                    let result = self.get_text_with_retry(&url).await?;
                    parse_attachment_page(&result)
                }
            },
            WIKI_API_PAGE_SIZE,
        )
        .await?;
        log::debug!("Page {} has {} attachments", page_id, entries.len());
        Ok(AttachmentManifest::new(entries))
    }

    async fn download_attachment(&self, entry: &AttachmentEntry) -> Result<Vec<u8>, AppError> {
        let url = self.base_url.join(&entry.download_link);
        let response = self.get(&url).await?;
        let result = extract_response_bytes(response).await?;
        check_status(&result)?;
        Ok(result.data)
    }

    async fn find_page_id(&self, space: &str, title: &str) -> Result<Option<PageId>, AppError> {
        let url = self.api_url(
            "rest/api/content",
            &[
                ("spaceKey", space.to_string()),
                ("title", title.to_string()),
                ("type", "page".to_string()),
            ],
        )?;
        let result = self.get_text_with_retry(&url).await?;
        parse_page_search(&result)
    }
}

/// Result of an HTTP operation with response metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: reqwest::StatusCode,
    pub url: String,
}

/// Extracts the response body as text with metadata.
pub async fn extract_response_text(response: Response) -> Result<ApiResponse<String>, AppError> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response.text().await?;

    Ok(ApiResponse {
        data: text,
        status,
        url,
    })
}

/// Extracts the raw response body with metadata.
pub async fn extract_response_bytes(response: Response) -> Result<ApiResponse<Vec<u8>>, AppError> {
    let status = response.status();
    let url = response.url().to_string();
    let bytes = response.bytes().await?;

    Ok(ApiResponse {
        data: bytes.to_vec(),
        status,
        url,
    })
}

// src/api/fake.rs
//! In-memory wiki used by unit tests.

use super::WikiRepository;
use crate::error::{AppError, WikiErrorCode};
use crate::model::{AttachmentEntry, AttachmentManifest, Page};
use crate::types::{AttachmentId, PageId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct InMemoryWiki {
    pages: HashMap<PageId, Page>,
    files: HashMap<AttachmentId, Result<Vec<u8>, u16>>,
    download_delay: Option<Duration>,
    downloads: AtomicUsize,
}

pub fn status_error(status: u16) -> AppError {
    AppError::WikiService {
        code: WikiErrorCode::from_http_status(status),
        message: format!("HTTP {}", status),
        status: reqwest::StatusCode::from_u16(status).unwrap_or(reqwest::StatusCode::BAD_REQUEST),
    }
}

impl InMemoryWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.insert(page.id.clone(), page);
        self
    }

    pub fn with_file(mut self, id: &str, bytes: &[u8]) -> Self {
        self.files
            .insert(AttachmentId::from_trusted(id), Ok(bytes.to_vec()));
        self
    }

    pub fn with_failing_file(mut self, id: &str, status: u16) -> Self {
        self.files.insert(AttachmentId::from_trusted(id), Err(status));
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WikiRepository for InMemoryWiki {
    async fn fetch_page_by_id(&self, id: &PageId) -> Result<Page, AppError> {
        self.pages.get(id).cloned().ok_or_else(|| status_error(404))
    }

    async fn fetch_attachment_manifest(
        &self,
        page_id: &PageId,
    ) -> Result<AttachmentManifest, AppError> {
        Ok(self
            .pages
            .get(page_id)
            .map(|page| page.attachments.clone())
            .unwrap_or_default())
    }

    async fn download_attachment(&self, entry: &AttachmentEntry) -> Result<Vec<u8>, AppError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        match self.files.get(&entry.id) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(status)) => Err(status_error(*status)),
            None => Err(status_error(404)),
        }
    }

    async fn find_page_id(&self, space: &str, title: &str) -> Result<Option<PageId>, AppError> {
        Ok(self
            .pages
            .values()
            .find(|page| page.space_key == space && page.title.as_str() == title)
            .map(|page| page.id.clone()))
    }
}

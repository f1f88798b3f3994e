// src/api/mod.rs
//! Wiki API interaction: the ability to retrieve pages and their files.
//!
//! Business logic depends on [`WikiRepository`], never on HTTP details.
//! The reqwest implementation lives in [`client`], wire types in
//! `responses`, and status/body parsing in [`parser`].

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
mod pagination;
pub mod parser;
mod responses;

use crate::error::{AppError, WikiErrorCode};
use crate::model::{AttachmentEntry, AttachmentManifest, Page};
use crate::types::{PageId, PageReference};

/// The ability to read pages and attachments from a wiki.
#[async_trait::async_trait]
pub trait WikiRepository: Send + Sync {
    async fn fetch_page_by_id(&self, id: &PageId) -> Result<Page, AppError>;
    async fn fetch_attachment_manifest(
        &self,
        page_id: &PageId,
    ) -> Result<AttachmentManifest, AppError>;
    async fn download_attachment(&self, entry: &AttachmentEntry) -> Result<Vec<u8>, AppError>;
    async fn find_page_id(&self, space: &str, title: &str) -> Result<Option<PageId>, AppError>;

    /// Fetches a page together with its attachment manifest.
    async fn fetch_page(&self, id: &PageId) -> Result<Page, AppError> {
        let mut page = self.fetch_page_by_id(id).await?;
        page.attachments = self.fetch_attachment_manifest(id).await?;
        Ok(page)
    }

    /// Turns a page reference into a page id, searching by title if needed.
    async fn resolve_reference(&self, reference: &PageReference) -> Result<PageId, AppError> {
        match reference {
            PageReference::Id(id) => Ok(id.clone()),
            PageReference::SpaceTitle { space, title } => {
                match self.find_page_id(space, title).await? {
                    Some(id) => Ok(id),
                    None => Err(AppError::WikiService {
                        code: WikiErrorCode::NotFound,
                        message: format!("No page titled '{}' in space {}", title, space),
                        status: reqwest::StatusCode::NOT_FOUND,
                    }),
                }
            }
        }
    }
}

pub use client::ConfluenceHttpClient;

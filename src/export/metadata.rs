// src/export/metadata.rs
use crate::attachments::AttachmentDownloads;
use crate::model::{Ancestor, Page};
use crate::types::{AttachmentId, BaseUrl, PageId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Contents of `metadata.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PageMetadata {
    pub id: PageId,
    pub title: String,
    pub space: String,
    pub source_url: String,
    pub ancestors: Vec<Ancestor>,
    pub labels: BTreeSet<String>,
    /// Entries in the page's attachment manifest.
    pub attachment_count: usize,
    /// Attachments written to the bundle.
    pub exported_attachment_count: usize,
    pub attachments: Vec<ExportedAttachment>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedAttachment {
    pub id: AttachmentId,
    pub title: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub size: usize,
}

impl PageMetadata {
    pub fn new(page: &Page, downloads: &AttachmentDownloads, base_url: &BaseUrl) -> Self {
        let attachments: Vec<ExportedAttachment> = downloads
            .exported()
            .filter_map(|item| {
                item.bytes.as_ref().map(|bytes| ExportedAttachment {
                    id: item.entry.id.clone(),
                    title: item.entry.title.clone(),
                    file_name: item.file_name.to_string(),
                    media_type: item.entry.media_type.clone(),
                    size: bytes.len(),
                })
            })
            .collect();

        Self {
            id: page.id.clone(),
            title: page.title.to_string(),
            space: page.space_key.clone(),
            source_url: base_url.page_url(&page.id),
            ancestors: page.ancestors.clone(),
            labels: page.labels.clone(),
            attachment_count: page.attachments.len(),
            exported_attachment_count: attachments.len(),
            attachments,
            exported_at: Utc::now(),
        }
    }
}

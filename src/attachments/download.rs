// src/attachments/download.rs
//! Bounded, concurrent download of the planned attachments.

use super::plan::AttachmentPlan;
use crate::api::WikiRepository;
use crate::constants::{RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS, WIKI_FETCH_MAX_ATTEMPTS};
use crate::error::failure_reason;
use crate::error_recovery::retry_with_backoff;
use crate::model::{AttachmentEntry, AttachmentManifest};
use crate::report::{ExportReport, ResourceKey, ResourceStatus};
use crate::types::{AttachmentId, ExportFileName};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Duration;

/// One planned attachment after its download attempt.
#[derive(Debug, Clone)]
pub struct DownloadedAttachment {
    pub entry: AttachmentEntry,
    pub file_name: ExportFileName,
    /// `None` when the download failed.
    pub bytes: Option<Vec<u8>>,
    pub status: ResourceStatus,
}

/// Download results keyed by attachment id, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct AttachmentDownloads {
    items: IndexMap<AttachmentId, DownloadedAttachment>,
}

impl AttachmentDownloads {
    pub fn get(&self, id: &AttachmentId) -> Option<&DownloadedAttachment> {
        self.items.get(id)
    }

    pub fn bytes(&self, id: &AttachmentId) -> Option<&[u8]> {
        self.items.get(id).and_then(|item| item.bytes.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadedAttachment> {
        self.items.values()
    }

    /// Attachments that have bytes to write.
    pub fn exported(&self) -> impl Iterator<Item = &DownloadedAttachment> {
        self.items.values().filter(|item| item.bytes.is_some())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Downloads every planned attachment through a pool of `workers`.
///
/// Each worker records its own attachment in the report. A failure only
/// affects that attachment.
pub async fn download_attachments(
    repository: &dyn WikiRepository,
    manifest: &AttachmentManifest,
    plan: &AttachmentPlan,
    workers: usize,
    timeout: Duration,
    report: &ExportReport,
) -> AttachmentDownloads {
    let planned = plan.referenced(manifest);
    if planned.is_empty() {
        return AttachmentDownloads::default();
    }
    log::debug!(
        "Page {}: downloading {} attachments with {} workers",
        report.page_id(),
        planned.len(),
        workers
    );

    let order: Vec<AttachmentId> = planned.iter().map(|(entry, _)| entry.id.clone()).collect();
    let mut finished: HashMap<AttachmentId, DownloadedAttachment> = stream::iter(planned)
        .map(|(entry, file_name)| async move {
            let downloaded = download_one(repository, &entry, file_name, timeout).await;
            report.record_with_detail(
                ResourceKey::Attachment {
                    id: entry.id.clone(),
                    title: entry.title.clone(),
                },
                downloaded.status.clone(),
                Some(downloaded.file_name.to_string()),
            );
            (entry.id.clone(), downloaded)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let items = order
        .into_iter()
        .filter_map(|id| finished.remove(&id).map(|item| (id, item)))
        .collect();
    AttachmentDownloads { items }
}

async fn download_one(
    repository: &dyn WikiRepository,
    entry: &AttachmentEntry,
    file_name: ExportFileName,
    timeout: Duration,
) -> DownloadedAttachment {
    let attempt = retry_with_backoff(
        move || repository.download_attachment(entry),
        WIKI_FETCH_MAX_ATTEMPTS,
        Duration::from_millis(RETRY_INITIAL_DELAY_MS),
        Duration::from_millis(RETRY_MAX_DELAY_MS),
    );

    let (bytes, status) = match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(bytes)) => {
            let status = match entry.file_size {
                Some(expected) if expected != bytes.len() as u64 => {
                    ResourceStatus::degraded(format!(
                        "size mismatch: manifest says {} bytes, downloaded {}",
                        expected,
                        bytes.len()
                    ))
                }
                _ => ResourceStatus::Ok,
            };
            (Some(bytes), status)
        }
        Ok(Err(e)) => {
            log::warn!("Download of attachment {} failed: {}", entry.title, e);
            (None, ResourceStatus::failed(failure_reason(&e)))
        }
        Err(_) => {
            log::warn!("Download of attachment {} timed out after {:?}", entry.title, timeout);
            (None, ResourceStatus::failed("timeout"))
        }
    };

    DownloadedAttachment {
        entry: entry.clone(),
        file_name,
        bytes,
        status,
    }
}

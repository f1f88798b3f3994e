// src/model/attachment.rs
use crate::types::AttachmentId;
use serde::{Deserialize, Serialize};

/// One file attached to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentEntry {
    pub id: AttachmentId,
    /// Original filename as shown by the wiki.
    pub title: String,
    pub media_type: Option<String>,
    /// Server-relative or absolute download link.
    pub download_link: String,
    pub file_size: Option<u64>,
}

/// The ordered attachment list of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentManifest {
    entries: Vec<AttachmentEntry>,
}

impl AttachmentManifest {
    pub fn new(entries: Vec<AttachmentEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_id(&self, id: &AttachmentId) -> Option<&AttachmentEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// First entry whose title matches exactly.
    pub fn by_title(&self, title: &str) -> Option<&AttachmentEntry> {
        self.entries.iter().find(|entry| entry.title == title)
    }

    /// Index of an entry in manifest order.
    pub fn position(&self, id: &AttachmentId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.id == id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn entry(id: &str, title: &str, size: u64) -> AttachmentEntry {
        AttachmentEntry {
            id: AttachmentId::from_trusted(id),
            title: title.to_string(),
            media_type: None,
            download_link: format!("/download/attachments/1/{}", title),
            file_size: Some(size),
        }
    }
}

// src/attachments/mod.rs
//! Attachment resolution: which files a page exports, under which names,
//! and their downloaded bytes.

mod download;
mod naming;
mod plan;

pub use download::{download_attachments, AttachmentDownloads, DownloadedAttachment};
pub use plan::{locate, AttachmentPlan};

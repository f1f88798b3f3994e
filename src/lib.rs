// src/lib.rs
//! confluence2md library: exports Confluence pages as self-contained
//! Markdown bundles.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `WikiErrorCode`, `ValidationError`
//! - **Configuration**: `PipelineConfig`, `ExportSettings`, `CommandLineInput`
//! - **Domain model**: `Page`, `AttachmentManifest`, `MarkupTree`
//! - **Domain types**: `PageId`, `AttachmentId`, `PageReference`, `BaseUrl`
//! - **API client**: `WikiRepository`, `ConfluenceHttpClient`
//! - **Export**: `PageExporter`, `PageOutcome`, `ExportReport`

mod api;
mod attachments;
mod config;
mod constants;
mod error;
mod error_recovery;
mod export;
mod formatting;
mod links;
mod macros;
mod markup;
mod model;
mod output;
mod pipeline;
mod report;
mod types;

// --- Error Handling ---
pub use crate::error::{failure_reason, AppError, WikiErrorCode};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{CommandLineInput, Credentials, ExportSettings, PipelineConfig};

// --- Domain Model ---
pub use crate::model::{
    Ancestor, AttachmentEntry, AttachmentManifest, MacroKind, MarkupNode, MarkupTree, Page,
    PageTitle,
};

// --- Domain Types ---
pub use crate::types::{ApiToken, AttachmentId, BaseUrl, ExportFileName, PageId, PageReference};

// --- API Client ---
pub use crate::api::{ConfluenceHttpClient, WikiRepository};
pub use crate::macros::{HttpIncludeSource, IncludeFetch, IncludeSource};

// --- Normalization and Rendering ---
pub use crate::formatting::render_document;
pub use crate::markup::{normalize_markup, normalize_page};

// --- Export ---
pub use crate::export::{ExportStage, PageBundle, PageExporter, PageMetadata, PageOutcome};
pub use crate::report::{ExportReport, FinalReport, ReportSummary, ResourceKey, ResourceStatus};

// --- Pipeline Traits ---
pub use crate::pipeline::{BundleDelivery, PageComposer, PageSource};

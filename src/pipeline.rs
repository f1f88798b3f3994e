// src/pipeline.rs
//! Pipeline capability traits: the three stages of a page export.
//!
//! Each trait describes a single capability.

use crate::error::AppError;
use crate::export::PageBundle;
use crate::links::CoExportMap;
use crate::model::Page;
use crate::output::OutputReport;
use crate::report::ExportReport;
use crate::types::PageReference;
use std::sync::Arc;

/// Retrieves a page and its attachment manifest.
#[async_trait::async_trait]
pub trait PageSource {
    async fn fetch(&self, reference: &PageReference) -> Result<Page, AppError>;
}

/// Turns a fetched page into a bundle: normalization through serialization.
#[async_trait::async_trait]
pub trait PageComposer {
    async fn compose(
        &self,
        page: &Page,
        directory: &str,
        co_export: Arc<CoExportMap>,
        report: Arc<ExportReport>,
    ) -> Result<PageBundle, AppError>;
}

/// Persists a bundle.
pub trait BundleDelivery {
    fn deliver(&self, bundle: PageBundle) -> Result<OutputReport, AppError>;
}

// src/export/context.rs
use crate::attachments::{AttachmentDownloads, AttachmentPlan};
use crate::config::ExportSettings;
use crate::links::CoExportMap;
use crate::macros::IncludeResults;
use crate::model::AttachmentManifest;
use crate::report::ExportReport;
use std::sync::Arc;

/// Everything the synchronous stages of one page export read.
///
/// Built after the I/O barrier: by then includes are fetched, attachments
/// are downloaded, and the only thing still written to is the report.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub settings: ExportSettings,
    pub report: Arc<ExportReport>,
    /// Directory name of the page inside the output directory.
    pub page_dir: String,
    pub manifest: AttachmentManifest,
    pub attachments: AttachmentPlan,
    pub downloads: AttachmentDownloads,
    pub includes: IncludeResults,
    pub co_export: Arc<CoExportMap>,
}

impl ExportContext {
    /// A context with no resolved resources yet.
    pub fn new(settings: ExportSettings, report: Arc<ExportReport>, page_dir: String) -> Self {
        Self {
            settings,
            report,
            page_dir,
            manifest: AttachmentManifest::default(),
            attachments: AttachmentPlan::default(),
            downloads: AttachmentDownloads::default(),
            includes: IncludeResults::default(),
            co_export: Arc::new(CoExportMap::default()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::types::{BaseUrl, PageId};

    /// A context for page 1 on `https://wiki.example.com`.
    pub fn context() -> ExportContext {
        let base = BaseUrl::parse("https://wiki.example.com").expect("fixture URL is valid");
        ExportContext::new(
            ExportSettings::new(base),
            Arc::new(ExportReport::new(PageId::parse("1").expect("fixture id is numeric"))),
            "page_1_Home".to_string(),
        )
    }
}

// src/export/bundle.rs
//! A fully serialized page, ready to be written, and its delivery.

use super::metadata::PageMetadata;
use crate::constants::{
    ATTACHMENTS_DIR, CONTENT_FILE_NAME, METADATA_FILE_NAME, RAW_EDITOR_FILE_NAME,
    RAW_EXPORT_VIEW_FILE_NAME, RAW_VIEW_FILE_NAME, REPORT_FILE_NAME,
};
use crate::error::AppError;
use crate::export::ExportContext;
use crate::model::Page;
use crate::output::{
    self, discard_directory, staging_directory_name, DeliveryTarget, OutputPlan, OutputReport,
};
use crate::pipeline::BundleDelivery;
use crate::report::FinalReport;
use std::path::{Path, PathBuf};

/// A named file of the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything one page export writes.
#[derive(Debug, Clone)]
pub struct PageBundle {
    /// Directory name inside the output directory.
    pub directory: String,
    pub markdown: String,
    pub report: FinalReport,
    pub metadata: PageMetadata,
    /// Downloaded attachments under their export names.
    pub attachments: Vec<BundleFile>,
    /// Raw markup variants, when requested.
    pub raw_markup: Vec<BundleFile>,
}

impl PageBundle {
    /// Collects the bundle after serialization. Finalizes the report, so
    /// nothing may be recorded for this page afterwards.
    pub fn assemble(page: &Page, markdown: String, ctx: &ExportContext) -> Self {
        let attachments = ctx
            .downloads
            .exported()
            .filter_map(|item| {
                item.bytes.as_ref().map(|bytes| BundleFile {
                    name: item.file_name.to_string(),
                    bytes: bytes.clone(),
                })
            })
            .collect();

        let raw_markup = if ctx.settings.keep_raw_markup {
            [
                (RAW_VIEW_FILE_NAME, &page.body),
                (RAW_EXPORT_VIEW_FILE_NAME, &page.body_export),
                (RAW_EDITOR_FILE_NAME, &page.editor_first_version),
            ]
            .into_iter()
            .filter(|(_, markup)| !markup.trim().is_empty())
            .map(|(name, markup)| BundleFile {
                name: name.to_string(),
                bytes: markup.as_bytes().to_vec(),
            })
            .collect()
        } else {
            Vec::new()
        };

        Self {
            directory: ctx.page_dir.clone(),
            markdown,
            report: ctx.report.finalize(),
            metadata: PageMetadata::new(page, &ctx.downloads, &ctx.settings.base_url),
            attachments,
            raw_markup,
        }
    }

    /// Plans the writes: everything goes to a staging directory first and is
    /// promoted over the final directory in one rename.
    pub fn into_plan(self, output_dir: &Path) -> Result<OutputPlan, AppError> {
        let staging = output_dir.join(staging_directory_name(&self.directory));
        let target = output_dir.join(&self.directory);

        let mut plan = OutputPlan::new()
            .with_operation(DeliveryTarget::ResetDirectory {
                path: staging.clone(),
            })
            .with_operation(DeliveryTarget::WriteFile {
                path: staging.join(CONTENT_FILE_NAME),
                content: self.markdown,
            })
            .with_operation(DeliveryTarget::WriteFile {
                path: staging.join(REPORT_FILE_NAME),
                content: self.report.to_json()?,
            })
            .with_operation(DeliveryTarget::WriteFile {
                path: staging.join(METADATA_FILE_NAME),
                content: serde_json::to_string_pretty(&self.metadata)?,
            });

        if !self.attachments.is_empty() {
            let attachments_dir = staging.join(ATTACHMENTS_DIR);
            plan = plan.with_operation(DeliveryTarget::CreateDirectory {
                path: attachments_dir.clone(),
            });
            for file in self.attachments {
                plan = plan.with_operation(DeliveryTarget::WriteBytes {
                    path: attachments_dir.join(file.name),
                    bytes: file.bytes,
                });
            }
        }

        for file in self.raw_markup {
            plan = plan.with_operation(DeliveryTarget::WriteBytes {
                path: staging.join(file.name),
                bytes: file.bytes,
            });
        }

        Ok(plan.with_operation(DeliveryTarget::PromoteDirectory { staging, target }))
    }
}

/// Writes bundles below one output directory.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    output_dir: PathBuf,
}

impl BundleWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl BundleDelivery for BundleWriter {
    fn deliver(&self, bundle: PageBundle) -> Result<OutputReport, AppError> {
        let staging = self
            .output_dir
            .join(staging_directory_name(&bundle.directory));
        let plan = bundle.into_plan(&self.output_dir)?;
        let report = output::deliver(plan)?;
        if !report.is_success() {
            discard_directory(&staging);
            return Err(AppError::DeliveryFailed {
                failures: report.failure_messages(),
            });
        }
        Ok(report)
    }
}

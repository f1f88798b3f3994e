// src/export/orchestrator.rs
//! Per-page export state machine and batch driver.
//!
//! A batch runs in two phases. First every reference is resolved and its
//! page fetched, which gives the set of co-exported pages needed for
//! relative links. Then each page goes through the rest of its pipeline.
//! The page timeout covers only time spent in the page's own pipeline:
//! the fetch, plus everything after its turn in the second phase comes.
//! Waiting for other pages is not charged.

use super::bundle::{BundleWriter, PageBundle};
use super::context::ExportContext;
use crate::api::WikiRepository;
use crate::attachments::{download_attachments, AttachmentPlan};
use crate::config::ExportSettings;
use crate::error::AppError;
use crate::formatting::render_document;
use crate::links::{breadcrumbs, rewrite_links, CoExportMap};
use crate::macros::{collect_include_urls, fetch_includes, transform_all, IncludeSource};
use crate::markup::normalize_page;
use crate::model::Page;
use crate::output::page_directory_name;
use crate::pipeline::{BundleDelivery, PageComposer, PageSource};
use crate::report::{ExportReport, ReportSummary};
use crate::types::{PageId, PageReference};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Pipeline states of one page, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportStage {
    Fetched,
    Normalized,
    Transformed,
    LinksRewritten,
    Serialized,
    Written,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetched => "fetched",
            Self::Normalized => "normalized",
            Self::Transformed => "transformed",
            Self::LinksRewritten => "links rewritten",
            Self::Serialized => "serialized",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

fn advance(page_id: &PageId, stage: ExportStage) {
    log::debug!("Page {}: {}", page_id, stage);
}

/// Final result of one requested page.
#[derive(Debug)]
pub enum PageOutcome {
    Written {
        page_id: PageId,
        title: String,
        directory: PathBuf,
        summary: ReportSummary,
    },
    Failed {
        /// The page id when known, otherwise the reference as given.
        reference: String,
        error: AppError,
    },
}

impl PageOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// A page past `Fetched`, with the time its fetch took.
struct FetchedPage {
    page: Page,
    directory: String,
    fetch_elapsed: Duration,
}

/// Drives page exports against one wiki.
#[derive(Clone)]
pub struct PageExporter {
    repository: Arc<dyn WikiRepository>,
    includes: Arc<dyn IncludeSource>,
    settings: ExportSettings,
}

impl PageExporter {
    pub fn new(
        repository: Arc<dyn WikiRepository>,
        includes: Arc<dyn IncludeSource>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            repository,
            includes,
            settings,
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Exports a single page.
    pub async fn export_page(&self, reference: &PageReference) -> PageOutcome {
        let mut outcomes = self.export_batch(std::slice::from_ref(reference)).await;
        outcomes.pop().unwrap_or_else(|| PageOutcome::Failed {
            reference: reference.to_string(),
            error: AppError::InternalError {
                message: "export produced no outcome".to_string(),
                source: None,
            },
        })
    }

    /// Exports every referenced page, `page_concurrency` at a time.
    ///
    /// Outcomes follow the order of `references`. A reference that resolves
    /// to a page already in the batch gets no outcome of its own.
    pub async fn export_batch(&self, references: &[PageReference]) -> Vec<PageOutcome> {
        let concurrency = self.settings.page_concurrency.max(1);
        log::info!(
            "Exporting {} pages ({} at a time) to {}",
            references.len(),
            concurrency,
            self.settings.output_dir.display()
        );

        let mut fetched: Vec<(usize, Result<FetchedPage, PageOutcome>)> =
            stream::iter(references.iter().enumerate())
                .map(|(index, reference)| async move { (index, self.fetch_stage(reference).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        fetched.sort_by_key(|(index, _)| *index);

        let mut outcomes: Vec<(usize, PageOutcome)> = Vec::new();
        let mut pages: IndexMap<PageId, (usize, FetchedPage)> = IndexMap::new();
        let mut co_export = CoExportMap::new();
        for (index, result) in fetched {
            match result {
                Ok(page) if pages.contains_key(&page.page.id) => {
                    log::info!("Page {} is requested more than once, exporting it once", page.page.id);
                }
                Ok(page) => {
                    co_export.insert(
                        page.page.id.clone(),
                        &page.page.space_key,
                        page.page.title.as_str(),
                        page.directory.clone(),
                    );
                    pages.insert(page.page.id.clone(), (index, page));
                }
                Err(outcome) => outcomes.push((index, outcome)),
            }
        }

        let co_export = Arc::new(co_export);
        let finished: Vec<(usize, PageOutcome)> = stream::iter(pages.into_values())
            .map(|(index, page)| {
                let co_export = Arc::clone(&co_export);
                async move { (index, self.finish_page(page, co_export).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        outcomes.extend(finished);
        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<PageOutcome> = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        let written = outcomes.iter().filter(|o| o.is_written()).count();
        log::info!("Batch done: {} written, {} failed", written, outcomes.len() - written);
        outcomes
    }

    async fn fetch_stage(&self, reference: &PageReference) -> Result<FetchedPage, PageOutcome> {
        let started = Instant::now();
        let deadline = started + self.settings.page_timeout;
        match timeout_at(deadline, self.fetch(reference)).await {
            Ok(Ok(page)) => {
                advance(&page.id, ExportStage::Fetched);
                let directory = page_directory_name(&page.id, page.title.as_str());
                Ok(FetchedPage {
                    page,
                    directory,
                    fetch_elapsed: started.elapsed(),
                })
            }
            Ok(Err(error)) => {
                log::error!("Could not fetch page {}: {}", reference, error);
                Err(PageOutcome::Failed {
                    reference: reference.to_string(),
                    error,
                })
            }
            Err(_) => {
                log::error!("Page {} timed out while fetching", reference);
                Err(PageOutcome::Failed {
                    reference: reference.to_string(),
                    error: AppError::PageTimeout {
                        page_id: reference.to_string(),
                        timeout: self.settings.page_timeout,
                    },
                })
            }
        }
    }

    async fn finish_page(&self, fetched: FetchedPage, co_export: Arc<CoExportMap>) -> PageOutcome {
        let FetchedPage {
            page,
            directory,
            fetch_elapsed,
        } = fetched;
        let deadline =
            Instant::now() + self.settings.page_timeout.saturating_sub(fetch_elapsed);
        let report = Arc::new(ExportReport::new(page.id.clone()));
        let failed = |error: AppError| {
            log::error!("Page {} failed: {}", page.id, error);
            PageOutcome::Failed {
                reference: page.id.to_string(),
                error,
            }
        };
        let timed_out = || AppError::PageTimeout {
            page_id: page.id.to_string(),
            timeout: self.settings.page_timeout,
        };

        let composed = timeout_at(
            deadline,
            self.compose(&page, &directory, co_export, Arc::clone(&report)),
        )
        .await;
        let bundle = match composed {
            Ok(Ok(bundle)) => bundle,
            Ok(Err(error)) => return failed(error),
            Err(_) => return failed(timed_out()),
        };
        // Writing is not cancellable, so it only starts within the deadline
        if Instant::now() >= deadline {
            return failed(timed_out());
        }

        let summary = bundle.report.summary;
        let writer = BundleWriter::new(self.settings.output_dir.clone());
        match tokio::task::spawn_blocking(move || writer.deliver(bundle)).await {
            Ok(Ok(_)) => {
                advance(&page.id, ExportStage::Written);
                log::info!(
                    "Exported page {} '{}' ({} ok, {} degraded, {} failed)",
                    page.id,
                    page.title,
                    summary.ok,
                    summary.degraded,
                    summary.failed
                );
                PageOutcome::Written {
                    page_id: page.id.clone(),
                    title: page.title.to_string(),
                    directory: self.settings.output_dir.join(&directory),
                    summary,
                }
            }
            Ok(Err(error)) => failed(error),
            Err(join_error) => failed(AppError::InternalError {
                message: "bundle writer stopped unexpectedly".to_string(),
                source: Some(Box::new(join_error)),
            }),
        }
    }
}

#[async_trait::async_trait]
impl PageSource for PageExporter {
    async fn fetch(&self, reference: &PageReference) -> Result<Page, AppError> {
        let id = self.repository.resolve_reference(reference).await?;
        self.repository.fetch_page(&id).await
    }
}

#[async_trait::async_trait]
impl PageComposer for PageExporter {
    async fn compose(
        &self,
        page: &Page,
        directory: &str,
        co_export: Arc<CoExportMap>,
        report: Arc<ExportReport>,
    ) -> Result<PageBundle, AppError> {
        let mut tree = normalize_page(page)?;
        for warning in tree.warnings() {
            report.note(format!("markup: {}", warning));
        }
        advance(&page.id, ExportStage::Normalized);

        let plan = AttachmentPlan::build(&tree, &page.attachments);
        let urls = collect_include_urls(&tree);
        let workers = self.settings.io_workers;

        // Both I/O groups share the pool size and finish before any transform
        let (downloads, includes) = tokio::join!(
            download_attachments(
                self.repository.as_ref(),
                &page.attachments,
                &plan,
                workers,
                self.settings.page_timeout,
                &report,
            ),
            fetch_includes(
                self.includes.as_ref(),
                urls,
                workers,
                self.settings.include_timeout,
            ),
        );

        let ctx = ExportContext {
            settings: self.settings.clone(),
            report: Arc::clone(&report),
            page_dir: directory.to_string(),
            manifest: page.attachments.clone(),
            attachments: plan,
            downloads,
            includes,
            co_export,
        };

        transform_all(&mut tree, &ctx);
        advance(&page.id, ExportStage::Transformed);

        rewrite_links(&mut tree, &ctx);
        advance(&page.id, ExportStage::LinksRewritten);

        let trail = breadcrumbs(page, &self.settings.base_url);
        let markdown = render_document(&tree, page.title.as_str(), &trail);
        advance(&page.id, ExportStage::Serialized);

        Ok(PageBundle::assemble(page, markdown, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::InMemoryWiki;
    use crate::macros::IncludeFetch;
    use crate::model::attachment_fixtures::entry;
    use crate::model::fixtures::page_with_body;
    use crate::model::AttachmentManifest;
    use crate::types::BaseUrl;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct NoIncludes;

    #[async_trait::async_trait]
    impl IncludeSource for NoIncludes {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> IncludeFetch {
            IncludeFetch::failed("not_found")
        }
    }

    fn exporter(wiki: InMemoryWiki, output_dir: PathBuf) -> PageExporter {
        let mut settings =
            ExportSettings::new(BaseUrl::parse("https://wiki.example.com").unwrap());
        settings.output_dir = output_dir;
        settings.io_workers = 2;
        PageExporter::new(Arc::new(wiki), Arc::new(NoIncludes), settings)
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(ExportStage::Fetched < ExportStage::Normalized);
        assert!(ExportStage::Serialized < ExportStage::Written);
        assert_eq!(ExportStage::LinksRewritten.to_string(), "links rewritten");
    }

    #[tokio::test]
    async fn test_compose_links_co_exported_pages() {
        let page = page_with_body(
            "1",
            "Home",
            r#"<p><a href="/pages/viewpage.action?pageId=2">next</a></p>"#,
        );
        let exporter = exporter(InMemoryWiki::new(), PathBuf::from("unused"));
        let mut co_export = CoExportMap::new();
        co_export.insert(page.id.clone(), "ENG", "Home", "page_1_Home".to_string());
        co_export.insert(
            PageId::parse("2").unwrap(),
            "ENG",
            "Next",
            "page_2_Next".to_string(),
        );

        let report = Arc::new(ExportReport::new(page.id.clone()));
        let bundle = exporter
            .compose(&page, "page_1_Home", Arc::new(co_export), report)
            .await
            .unwrap();
        assert_eq!(
            bundle.markdown,
            "# Home\n\n[next](../page_2_Next/content.md)\n"
        );
        assert!(bundle.attachments.is_empty());
        assert_eq!(bundle.metadata.attachment_count, 0);
    }

    #[tokio::test]
    async fn test_batch_writes_bundles_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = page_with_body(
            "1",
            "Home",
            r#"<p><img src="/download/attachments/1/logo.png" data-linked-resource-type="attachment" data-linked-resource-id="att1" alt="logo"/></p>"#,
        );
        page.attachments = AttachmentManifest::new(vec![
            entry("att1", "logo.png", 3),
            entry("att2", "unused.pdf", 9),
        ]);
        let wiki = InMemoryWiki::new()
            .with_page(page)
            .with_file("att1", b"png")
            .with_file("att2", b"123456789");
        let exporter = exporter(wiki, dir.path().to_path_buf());

        let references = vec![
            PageReference::Id(PageId::parse("1").unwrap()),
            PageReference::Id(PageId::parse("404").unwrap()),
        ];
        let outcomes = exporter.export_batch(&references).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_written());
        assert!(matches!(
            &outcomes[1],
            PageOutcome::Failed { reference, .. } if reference == "404"
        ));

        let bundle = dir.path().join("page_1_Home");
        let markdown = std::fs::read_to_string(bundle.join("content.md")).unwrap();
        assert_eq!(markdown, "# Home\n\n![logo](attachments/logo.png)\n");
        assert!(bundle.join("attachments/logo.png").exists());
        assert!(!bundle.join("attachments/unused.pdf").exists());
        assert!(bundle.join("export-report.json").exists());
        assert!(bundle.join("metadata.json").exists());
        assert!(!dir.path().join("page_404").exists());
    }

    #[tokio::test]
    async fn test_queued_pages_are_not_charged_for_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let mut wiki = InMemoryWiki::new().with_download_delay(Duration::from_millis(300));
        let mut references = Vec::new();
        for (id, att) in [("1", "att1"), ("2", "att2"), ("3", "att3")] {
            let mut page = page_with_body(
                id,
                &format!("Page {}", id),
                &format!(
                    r#"<p><img src="/download/attachments/{id}/a.png" data-linked-resource-type="attachment" data-linked-resource-id="{att}" alt="a"/></p>"#
                ),
            );
            page.attachments = AttachmentManifest::new(vec![entry(att, "a.png", 3)]);
            wiki = wiki.with_page(page).with_file(att, b"png");
            references.push(PageReference::Id(PageId::parse(id).unwrap()));
        }
        let mut exporter = exporter(wiki, dir.path().to_path_buf());
        exporter.settings.page_concurrency = 1;
        exporter.settings.page_timeout = Duration::from_millis(500);

        let outcomes = exporter.export_batch(&references).await;
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.is_written(), "{:?}", outcome);
        }
    }
}

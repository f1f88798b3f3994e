// tests/common/mod.rs
//! In-memory wiki and include fakes shared by the integration tests.

#![allow(dead_code)]

use confluence2md::{
    AppError, AttachmentEntry, AttachmentId, AttachmentManifest, BaseUrl, ExportSettings,
    IncludeFetch, IncludeSource, Page, PageExporter, PageId, PageTitle, WikiErrorCode,
    WikiRepository,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://wiki.example.com";

pub fn http_error(status: u16) -> AppError {
    AppError::WikiService {
        code: WikiErrorCode::from_http_status(status),
        message: format!("HTTP {}", status),
        status: reqwest::StatusCode::from_u16(status).unwrap(),
    }
}

/// A page in space ENG with the given view markup.
pub fn page(id: &str, title: &str, body: &str) -> Page {
    Page {
        id: PageId::parse(id).unwrap(),
        title: PageTitle::new(title),
        space_key: "ENG".to_string(),
        body: body.to_string(),
        body_export: String::new(),
        editor_first_version: String::new(),
        ancestors: Vec::new(),
        labels: BTreeSet::new(),
        attachments: AttachmentManifest::default(),
    }
}

pub fn attachment(id: &str, title: &str, size: u64) -> AttachmentEntry {
    AttachmentEntry {
        id: AttachmentId::new(id).unwrap(),
        title: title.to_string(),
        media_type: None,
        download_link: format!("/download/attachments/1/{}", title),
        file_size: Some(size),
    }
}

/// Serves pages and attachment bytes from memory.
#[derive(Default)]
pub struct FakeWiki {
    pages: HashMap<PageId, Page>,
    files: HashMap<AttachmentId, Vec<u8>>,
    page_status: Option<u16>,
    downloads: AtomicUsize,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.insert(page.id.clone(), page);
        self
    }

    pub fn with_file(mut self, id: &str, bytes: &[u8]) -> Self {
        self.files
            .insert(AttachmentId::new(id).unwrap(), bytes.to_vec());
        self
    }

    /// Every page request fails with this HTTP status.
    pub fn failing_with(mut self, status: u16) -> Self {
        self.page_status = Some(status);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WikiRepository for FakeWiki {
    async fn fetch_page_by_id(&self, id: &PageId) -> Result<Page, AppError> {
        if let Some(status) = self.page_status {
            return Err(http_error(status));
        }
        self.pages.get(id).cloned().ok_or_else(|| http_error(404))
    }

    async fn fetch_attachment_manifest(
        &self,
        page_id: &PageId,
    ) -> Result<AttachmentManifest, AppError> {
        Ok(self
            .pages
            .get(page_id)
            .map(|page| page.attachments.clone())
            .unwrap_or_default())
    }

    async fn download_attachment(&self, entry: &AttachmentEntry) -> Result<Vec<u8>, AppError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(&entry.id)
            .cloned()
            .ok_or_else(|| http_error(404))
    }

    async fn find_page_id(&self, space: &str, title: &str) -> Result<Option<PageId>, AppError> {
        Ok(self
            .pages
            .values()
            .find(|page| page.space_key == space && page.title.as_str() == title)
            .map(|page| page.id.clone()))
    }
}

/// Serves include files from memory; URLs listed as slow never answer
/// within the caller's timeout.
#[derive(Default)]
pub struct FakeIncludes {
    files: HashMap<String, String>,
    slow: Vec<String>,
}

impl FakeIncludes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, content: &str) -> Self {
        self.files.insert(url.to_string(), content.to_string());
        self
    }

    pub fn with_slow(mut self, url: &str) -> Self {
        self.slow.push(url.to_string());
        self
    }
}

#[async_trait::async_trait]
impl IncludeSource for FakeIncludes {
    async fn fetch(&self, url: &str, timeout: Duration) -> IncludeFetch {
        let answer = async {
            if self.slow.iter().any(|slow| slow == url) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.files.get(url).cloned()
        };
        match tokio::time::timeout(timeout, answer).await {
            Ok(Some(content)) => IncludeFetch::fetched(content),
            Ok(None) => IncludeFetch::failed("not_found"),
            Err(_) => IncludeFetch::failed("timeout"),
        }
    }
}

pub fn settings(output_dir: &Path) -> ExportSettings {
    let mut settings = ExportSettings::new(BaseUrl::parse(BASE_URL).unwrap());
    settings.output_dir = output_dir.to_path_buf();
    settings.io_workers = 2;
    settings.page_timeout = Duration::from_secs(10);
    settings.include_timeout = Duration::from_millis(100);
    settings
}

pub fn exporter(wiki: FakeWiki, includes: FakeIncludes, output_dir: &Path) -> PageExporter {
    PageExporter::new(Arc::new(wiki), Arc::new(includes), settings(output_dir))
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

pub fn report_json(bundle: &Path) -> serde_json::Value {
    serde_json::from_str(&read(&bundle.join("export-report.json"))).unwrap()
}

/// Sorted file names below `dir`, relative to it.
pub fn list_files(dir: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut files = Vec::new();
    if dir.exists() {
        walk(dir, dir, &mut files);
    }
    files.sort();
    files
}

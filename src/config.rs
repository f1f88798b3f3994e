// src/config.rs
use crate::constants::{
    DEFAULT_INCLUDE_TIMEOUT_SECS, DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_CONCURRENCY,
    DEFAULT_PAGE_TIMEOUT_SECS, IO_WORKERS_MAX, IO_WORKERS_MIN,
};
use crate::error::AppError;
use crate::types::{ApiToken, BaseUrl, PageReference, ValidationError};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about = "Export Confluence pages to Markdown bundles", long_about = None)]
pub struct CommandLineInput {
    /// Page ids or page URLs (viewpage.action?pageId=, /pages/<id>/, /display/SPACE/Title)
    #[arg(required = true)]
    pub pages: Vec<String>,

    /// Base URL of the wiki (defaults to the origin of the first page URL)
    #[arg(long, env = "CONFLUENCE_URL")]
    pub base_url: Option<String>,

    /// Directory that receives one folder per exported page
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: String,

    /// Deadline for one page in seconds
    #[arg(short, long, default_value_t = DEFAULT_PAGE_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Deadline for one remote diagram include in seconds
    #[arg(long, default_value_t = DEFAULT_INCLUDE_TIMEOUT_SECS)]
    pub include_timeout: u64,

    /// Concurrent downloads per page (default: CPU count, clamped to 2..=8)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Pages exported concurrently
    #[arg(long, default_value_t = DEFAULT_PAGE_CONCURRENCY)]
    pub page_concurrency: usize,

    /// Also write the raw markup variants next to the Markdown
    #[arg(long, default_value_t = false)]
    pub keep_raw: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Export knobs consumed by the core as plain values.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub base_url: BaseUrl,
    pub output_dir: PathBuf,
    pub page_timeout: Duration,
    pub include_timeout: Duration,
    pub io_workers: usize,
    pub page_concurrency: usize,
    pub keep_raw_markup: bool,
}

impl ExportSettings {
    /// Settings with the default knobs for the given wiki.
    pub fn new(base_url: BaseUrl) -> Self {
        Self {
            base_url,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            page_timeout: Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            include_timeout: Duration::from_secs(DEFAULT_INCLUDE_TIMEOUT_SECS),
            io_workers: default_io_workers(),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            keep_raw_markup: false,
        }
    }
}

/// How requests to the wiki authenticate.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: ApiToken,
    /// When set, the token is sent as the password of basic auth.
    pub username: Option<String>,
}

/// Resolved pipeline configuration, validated and ready to drive an export.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pages: Vec<PageReference>,
    pub credentials: Credentials,
    pub settings: ExportSettings,
    pub verbose: bool,
}

impl PipelineConfig {
    /// Resolves a complete pipeline configuration from CLI input and environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        Self::resolve_with_env(cli, |key| std::env::var(key).ok())
    }

    /// Same as [`resolve`](Self::resolve) with an injectable environment.
    pub fn resolve_with_env<E>(cli: CommandLineInput, env: E) -> Result<Self, AppError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let token = env("CONFLUENCE_TOKEN").ok_or_else(|| {
            AppError::MissingConfiguration(
                "CONFLUENCE_TOKEN environment variable not set".to_string(),
            )
        })?;
        let token = ApiToken::new(token)?;
        let username = env("CONFLUENCE_USERNAME").filter(|name| !name.trim().is_empty());

        let pages = cli
            .pages
            .iter()
            .map(|input| PageReference::parse(input))
            .collect::<Result<Vec<_>, _>>()?;

        let base_url = match cli.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => BaseUrl::parse(url)?,
            None => origin_of_first_url(&cli.pages).ok_or_else(|| {
                AppError::MissingConfiguration(
                    "no base URL: set CONFLUENCE_URL, pass --base-url, or give a page URL"
                        .to_string(),
                )
            })??,
        };

        let io_workers = match cli.workers {
            Some(workers) => check_bounds(workers as u64, 1, 64)? as usize,
            None => default_io_workers(),
        };

        let settings = ExportSettings {
            base_url,
            output_dir: PathBuf::from(cli.output_dir),
            page_timeout: Duration::from_secs(check_bounds(cli.timeout, 1, 3600)?),
            include_timeout: Duration::from_secs(check_bounds(cli.include_timeout, 1, 600)?),
            io_workers,
            page_concurrency: check_bounds(cli.page_concurrency as u64, 1, 32)? as usize,
            keep_raw_markup: cli.keep_raw,
        };

        Ok(PipelineConfig {
            pages,
            credentials: Credentials { token, username },
            settings,
            verbose: cli.verbose,
        })
    }
}

/// CPU count clamped to the I/O pool bounds.
pub fn default_io_workers() -> usize {
    num_cpus::get().clamp(IO_WORKERS_MIN, IO_WORKERS_MAX)
}

fn check_bounds(value: u64, min: u64, max: u64) -> Result<u64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfBounds { value, min, max })
    }
}

/// Origin of the first page given as a URL, keeping a `/wiki` context path.
fn origin_of_first_url(inputs: &[String]) -> Option<Result<BaseUrl, ValidationError>> {
    let url = inputs.iter().find_map(|input| Url::parse(input.trim()).ok())?;
    let host = url.host_str()?;
    let mut origin = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{}", port));
    }
    if url.path().starts_with("/wiki/") {
        origin.push_str("/wiki");
    }
    Some(BaseUrl::parse(&origin))
}

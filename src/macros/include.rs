// src/macros/include.rs
//! Remote `!include <url>` resolution for diagram source.
//!
//! URLs are collected from the whole page up front, deduplicated, and
//! fetched once each through the I/O pool. Transformers then substitute
//! directive lines from the collected results without further I/O.

use crate::api::client::ApiResponse;
use crate::api::parser::check_status;
use crate::constants::{INCLUDE_MAX_ATTEMPTS, RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS};
use crate::error::{failure_reason, AppError};
use crate::error_recovery::retry_with_backoff;
use crate::model::{MacroKind, MarkupTree};
use crate::report::ResourceStatus;
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;

static INCLUDE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!include\s+(https?://\S+)").expect("include regex is valid"));

/// A remote include found in a line of diagram source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// URL to fetch, without the block selector.
    pub url: String,
    /// `!<block>` suffix: a 0-based index or a `@startuml(id=...)` name.
    pub block: Option<String>,
}

pub fn parse_include(line: &str) -> Option<IncludeDirective> {
    let caps = INCLUDE_DIRECTIVE.captures(line)?;
    let raw = caps[1].trim_end();
    let (url, block) = match raw.split_once('!') {
        Some((url, block)) => {
            let block = block.trim();
            (url, (!block.is_empty()).then(|| block.to_string()))
        }
        None => (raw, None),
    };
    Some(IncludeDirective {
        url: url.to_string(),
        block,
    })
}

/// Outcome of fetching one include URL.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeFetch {
    pub content: Option<String>,
    pub status: ResourceStatus,
}

impl IncludeFetch {
    pub fn fetched(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            status: ResourceStatus::Ok,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            content: None,
            status: ResourceStatus::failed(reason),
        }
    }
}

/// Fetched includes of one page, keyed by URL.
pub type IncludeResults = HashMap<String, IncludeFetch>;

/// Where remote diagram includes come from.
#[async_trait::async_trait]
pub trait IncludeSource: Send + Sync {
    /// Fetches `url`; `timeout` bounds the whole call, retry included.
    async fn fetch(&self, url: &str, timeout: Duration) -> IncludeFetch;
}

/// Plain HTTP include source. Includes are public URLs, so no wiki
/// credentials are sent.
#[derive(Clone, Default)]
pub struct HttpIncludeSource {
    client: reqwest::Client,
}

impl HttpIncludeSource {
    pub fn new() -> Result<Self, AppError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    async fn get_once(&self, url: &str) -> Result<String, AppError> {
        log::debug!("GET include {}", url);
        let response = self.client.get(url).send().await?;
        let result = ApiResponse {
            status: response.status(),
            url: response.url().to_string(),
            data: response.text().await?,
        };
        check_status(&result)?;
        Ok(result.data)
    }
}

#[async_trait::async_trait]
impl IncludeSource for HttpIncludeSource {
    async fn fetch(&self, url: &str, timeout: Duration) -> IncludeFetch {
        let attempt = retry_with_backoff(
            move || self.get_once(url),
            INCLUDE_MAX_ATTEMPTS,
            Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            Duration::from_millis(RETRY_MAX_DELAY_MS),
        );
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(text)) => IncludeFetch::fetched(text.trim()),
            Ok(Err(e)) => {
                log::warn!("Diagram include {} failed: {}", url, e);
                IncludeFetch::failed(failure_reason(&e))
            }
            Err(_) => {
                log::warn!("Diagram include {} timed out after {:?}", url, timeout);
                IncludeFetch::failed("timeout")
            }
        }
    }
}

/// Distinct include URLs of all diagram macros, in document order.
pub fn collect_include_urls(tree: &MarkupTree) -> IndexSet<String> {
    tree.macros()
        .into_iter()
        .filter(|(_, node)| matches!(node.kind, MacroKind::DiagramAsCode(_)))
        .filter_map(|(_, node)| node.plain_body.as_deref())
        .flat_map(str::lines)
        .filter_map(parse_include)
        .map(|directive| directive.url)
        .collect()
}

/// Fetches every URL once through a pool of `workers`.
pub async fn fetch_includes(
    source: &dyn IncludeSource,
    urls: IndexSet<String>,
    workers: usize,
    timeout: Duration,
) -> IncludeResults {
    if urls.is_empty() {
        return IncludeResults::new();
    }
    log::debug!("Fetching {} diagram includes", urls.len());
    stream::iter(urls)
        .map(|url| async move {
            let fetched = source.fetch(&url, timeout).await;
            (url, fetched)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Picks one `@startuml ... @enduml` block from an included file.
///
/// `block` is a 0-based index or the id of a `@startuml(id=NAME)` block.
/// Unknown references select the first block; a file without blocks is
/// returned whole.
pub fn select_block(content: &str, block: &str) -> String {
    let mut blocks = Vec::new();
    let mut position = 0;
    while let Some(start) = content[position..].find("@startuml").map(|i| i + position) {
        let Some(end) = content[start..].find("@enduml").map(|i| i + start) else {
            break;
        };
        let end = end + "@enduml".len();
        blocks.push(content[start..end].trim());
        position = end;
    }

    let Some(first) = blocks.first() else {
        return content.trim().to_string();
    };

    if let Ok(index) = block.parse::<usize>() {
        return blocks.get(index).unwrap_or(first).to_string();
    }

    let id_pattern = Regex::new(&format!(
        r"(?i)@startuml\s*\(\s*id\s*=\s*{}\s*\)",
        regex::escape(block)
    ));
    match id_pattern {
        Ok(pattern) => blocks
            .iter()
            .find(|b| pattern.is_match(b))
            .unwrap_or(first)
            .to_string(),
        Err(_) => first.to_string(),
    }
}

/// Replaces include lines with fetched content.
///
/// Lines whose include failed stay verbatim; the failure reasons are
/// returned, deduplicated, in order of appearance. Every other byte of
/// `source`, line endings included, is kept as is.
pub fn expand_includes(source: &str, results: &IncludeResults) -> (String, Vec<String>) {
    let mut failures: Vec<String> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for segment in source.split_inclusive('\n') {
        let line = segment
            .strip_suffix("\r\n")
            .or_else(|| segment.strip_suffix('\n'))
            .unwrap_or(segment);
        let ending = &segment[line.len()..];
        let Some(directive) = parse_include(line) else {
            out.push_str(segment);
            continue;
        };
        let reason = match results.get(&directive.url) {
            Some(IncludeFetch {
                content: Some(content),
                ..
            }) => {
                match &directive.block {
                    Some(block) if !content.is_empty() => out.push_str(&select_block(content, block)),
                    _ => out.push_str(content),
                }
                out.push_str(ending);
                continue;
            }
            Some(fetch) => fetch.status.reason().unwrap_or("unavailable").to_string(),
            None => "not fetched".to_string(),
        };
        if !failures.contains(&reason) {
            failures.push(reason);
        }
        out.push_str(segment);
    }

    (out, failures)
}

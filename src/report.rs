// src/report.rs
//! Per-page export report.
//!
//! The report is created when a page export starts and is shared by every
//! worker of that page. Each resource key is written once; a second write
//! for the same key is rejected and logged. When the page is done the
//! report is frozen into a sorted, serializable [`FinalReport`].

use crate::model::MacroKind;
use crate::types::{AttachmentId, PageId};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Identifies one reported resource of a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKey {
    Macro {
        ordinal: usize,
        kind: MacroKind,
        name: String,
    },
    Attachment {
        id: AttachmentId,
        title: String,
    },
    /// A reference whose target is not in the attachment manifest.
    MissingAttachment { reference: String },
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Macro {
                ordinal,
                kind,
                name,
            } => write!(f, "macro #{} {} ({})", ordinal, name, kind),
            Self::Attachment { id, title } => write!(f, "attachment {} ({})", title, id),
            Self::MissingAttachment { reference } => {
                write!(f, "missing attachment {}", reference)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ResourceStatus {
    Ok,
    Degraded(String),
    Failed(String),
}

impl ResourceStatus {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Degraded(reason) | Self::Failed(reason) => Some(reason),
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded(reason) => write!(f, "degraded({})", reason),
            Self::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    #[serde(flatten)]
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Shared, append-only report of one page export.
#[derive(Debug)]
pub struct ExportReport {
    page_id: PageId,
    started_at: DateTime<Utc>,
    entries: DashMap<ResourceKey, ResourceEntry>,
    notes: Mutex<Vec<String>>,
}

impl ExportReport {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            started_at: Utc::now(),
            entries: DashMap::new(),
            notes: Mutex::new(Vec::new()),
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// Records the status of a resource. The first write for a key wins.
    pub fn record(&self, key: ResourceKey, status: ResourceStatus) -> bool {
        self.record_with_detail(key, status, None)
    }

    pub fn record_with_detail(
        &self,
        key: ResourceKey,
        status: ResourceStatus,
        detail: Option<String>,
    ) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                log::warn!(
                    "Page {}: ignoring second report for {} (kept {}, got {})",
                    self.page_id,
                    existing.key(),
                    existing.get().status,
                    status
                );
                false
            }
            Entry::Vacant(slot) => {
                if !status.is_ok() {
                    log::info!("Page {}: {} is {}", self.page_id, slot.key(), status);
                }
                slot.insert(ResourceEntry { status, detail });
                true
            }
        }
    }

    /// Adds a free-form note such as a normalization warning.
    pub fn note(&self, note: impl Into<String>) {
        self.notes.lock().push(note.into());
    }

    pub fn status(&self, key: &ResourceKey) -> Option<ResourceStatus> {
        self.entries.get(key).map(|entry| entry.status.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for entry in self.entries.iter() {
            match entry.status {
                ResourceStatus::Ok => summary.ok += 1,
                ResourceStatus::Degraded(_) => summary.degraded += 1,
                ResourceStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Freezes the report into its persisted form, sorted by resource.
    pub fn finalize(&self) -> FinalReport {
        let mut resources: Vec<ReportLine> = self
            .entries
            .iter()
            .map(|entry| ReportLine {
                resource: entry.key().clone(),
                entry: entry.value().clone(),
            })
            .collect();
        resources.sort_by(|a, b| a.resource.cmp(&b.resource));

        FinalReport {
            page_id: self.page_id.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            summary: self.summary(),
            resources,
            notes: self.notes.lock().clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub ok: usize,
    pub degraded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub resource: ResourceKey,
    #[serde(flatten)]
    pub entry: ResourceEntry,
}

/// The persisted report, written as `export-report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub page_id: PageId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub resources: Vec<ReportLine>,
    pub notes: Vec<String>,
}

impl FinalReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn macro_key(ordinal: usize) -> ResourceKey {
        ResourceKey::Macro {
            ordinal,
            kind: MacroKind::Unknown,
            name: "roadmap".to_string(),
        }
    }

    #[test]
    fn test_first_write_wins() {
        let report = ExportReport::new(PageId::parse("1").unwrap());
        assert!(report.record(macro_key(0), ResourceStatus::Ok));
        assert!(!report.record(macro_key(0), ResourceStatus::failed("late")));
        assert_eq!(report.status(&macro_key(0)), Some(ResourceStatus::Ok));
        assert_eq!(report.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_each_own_a_key() {
        let report = Arc::new(ExportReport::new(PageId::parse("1").unwrap()));
        let handles: Vec<_> = (0..16)
            .map(|ordinal| {
                let report = Arc::clone(&report);
                tokio::spawn(async move {
                    report.record(macro_key(ordinal), ResourceStatus::degraded("x"))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(report.summary().degraded, 16);
    }

    #[test]
    fn test_final_report_is_sorted_json() {
        let report = ExportReport::new(PageId::parse("5").unwrap());
        report.record(macro_key(2), ResourceStatus::Ok);
        report.record_with_detail(
            ResourceKey::Attachment {
                id: AttachmentId::new("att1").unwrap(),
                title: "a.png".to_string(),
            },
            ResourceStatus::failed("timeout"),
            Some("a.png".to_string()),
        );
        report.record(macro_key(0), ResourceStatus::degraded("unsupported macro"));
        report.note("unclosed <div>");

        let final_report = report.finalize();
        let ordinals: Vec<_> = final_report
            .resources
            .iter()
            .filter_map(|line| match &line.resource {
                ResourceKey::Macro { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect();
        assert_eq!(ordinals, vec![0, 2]);

        let json: serde_json::Value =
            serde_json::from_str(&final_report.to_json().unwrap()).unwrap();
        assert_eq!(json["page_id"], "5");
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["resources"][0]["resource"]["type"], "macro");
        assert_eq!(json["resources"][0]["status"], "degraded");
        assert_eq!(json["resources"][0]["reason"], "unsupported macro");
        assert_eq!(json["resources"][2]["detail"], "a.png");
        assert_eq!(json["notes"][0], "unclosed <div>");
    }
}

// src/export/mod.rs
//! Export orchestration: per-page pipeline, batch concurrency, bundles.

mod bundle;
mod context;
mod metadata;
mod orchestrator;

pub use bundle::PageBundle;
pub use context::ExportContext;
pub use metadata::PageMetadata;
pub use orchestrator::{ExportStage, PageExporter, PageOutcome};

#[cfg(test)]
pub(crate) use context::fixtures as context_fixtures;

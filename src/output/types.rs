// src/output/types.rs
//! Type definitions for output operations.
//!
//! A page bundle is described as an [`OutputPlan`] first and written by
//! [`deliver`](super::deliver) afterwards, so planning stays free of I/O.

use std::path::PathBuf;

/// Ordered list of filesystem operations for one bundle.
#[derive(Debug, Clone, Default)]
pub struct OutputPlan {
    pub operations: Vec<DeliveryTarget>,
}

impl OutputPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation to the plan.
    pub fn with_operation(mut self, operation: DeliveryTarget) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A single output operation.
#[derive(Debug, Clone)]
pub enum DeliveryTarget {
    /// Remove whatever is at `path` and create it empty.
    ResetDirectory { path: PathBuf },
    CreateDirectory { path: PathBuf },
    WriteFile { path: PathBuf, content: String },
    WriteBytes { path: PathBuf, bytes: Vec<u8> },
    /// Replace `target` with the fully written `staging` directory.
    PromoteDirectory { staging: PathBuf, target: PathBuf },
}

impl DeliveryTarget {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::ResetDirectory { path }
            | Self::CreateDirectory { path }
            | Self::WriteFile { path, .. }
            | Self::WriteBytes { path, .. } => path,
            Self::PromoteDirectory { target, .. } => target,
        }
    }
}

/// Result of executing an output plan.
#[derive(Debug, Clone, Default)]
pub struct OutputReport {
    pub completed: Vec<CompletedOperation>,
    pub failed: Vec<FailedOperation>,
    pub stats: ExecutionStats,
}

impl OutputReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completed(mut self, operation: CompletedOperation) -> Self {
        self.stats.operations_completed += 1;
        self.stats.bytes_written += operation.bytes_written;
        self.completed.push(operation);
        self
    }

    pub fn with_failed(mut self, operation: FailedOperation) -> Self {
        self.stats.operations_failed += 1;
        self.failed.push(operation);
        self
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per failed operation, for error messages.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|failure| format!("{}: {}", failure.operation.path().display(), failure.error))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CompletedOperation {
    pub operation: DeliveryTarget,
    pub bytes_written: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FailedOperation {
    pub operation: DeliveryTarget,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    pub operations_completed: usize,
    pub operations_failed: usize,
    pub bytes_written: usize,
    pub total_duration_ms: u64,
}

// src/output/writer.rs
//! Executes output operations by performing actual I/O.
//!
//! This module is the only place where bundle files are written.

use super::types::*;
use crate::error::AppError;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Delivers the output plan, stopping at the first failed operation.
///
/// Later operations depend on earlier ones (files go into directories the
/// plan created), so running past a failure would only add noise.
pub fn deliver(plan: OutputPlan) -> Result<OutputReport, AppError> {
    let mut report = OutputReport::new();
    let start_time = Instant::now();

    log::debug!("Executing output plan with {} operations", plan.len());

    for operation in plan.operations {
        let op_start = Instant::now();
        match execute_operation(&operation) {
            Ok(bytes_written) => {
                let duration_ms = op_start.elapsed().as_millis() as u64;
                report = report.with_completed(CompletedOperation {
                    operation,
                    bytes_written,
                    duration_ms,
                });
            }
            Err(e) => {
                log::error!("Operation on {} failed: {}", operation.path().display(), e);
                report = report.with_failed(FailedOperation {
                    operation,
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    report.stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

    log::debug!(
        "Output plan execution complete: {} succeeded, {} failed, {} bytes in {}ms",
        report.stats.operations_completed,
        report.stats.operations_failed,
        report.stats.bytes_written,
        report.stats.total_duration_ms
    );

    Ok(report)
}

fn execute_operation(operation: &DeliveryTarget) -> Result<usize, AppError> {
    match operation {
        DeliveryTarget::ResetDirectory { path } => {
            remove_directory(path)?;
            create_directory(path)?;
            Ok(0)
        }
        DeliveryTarget::CreateDirectory { path } => {
            create_directory(path)?;
            Ok(0)
        }
        DeliveryTarget::WriteFile { path, content } => write_file(path, content.as_bytes()),
        DeliveryTarget::WriteBytes { path, bytes } => write_file(path, bytes),
        DeliveryTarget::PromoteDirectory { staging, target } => {
            remove_directory(target)?;
            fs::rename(staging, target)?;
            log::info!("Wrote {}", target.display());
            Ok(0)
        }
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<usize, AppError> {
    log::debug!("Writing {} bytes to {}", content.len(), path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(content.len())
}

fn create_directory(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        if path.is_dir() {
            return Ok(());
        }
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {}", path.display()),
        )));
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn remove_directory(path: &Path) -> Result<(), AppError> {
    if path.is_dir() {
        log::debug!("Removing previous contents of {}", path.display());
        fs::remove_dir_all(path)?;
    } else if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Best-effort removal of a staging directory left by a failed delivery.
pub fn discard_directory(path: &Path) {
    if let Err(e) = remove_directory(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

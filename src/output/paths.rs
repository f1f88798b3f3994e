// src/output/paths.rs
//! Pure functions for path calculations and directory naming.

use crate::constants::SAFE_TITLE_MAX_CHARS;
use crate::error::AppError;
use crate::types::PageId;
use std::path::Path;

/// Replaces characters that are unsafe in a path segment with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Bundle directory of a page: `page_<id>_<safe title>`.
///
/// The title is cut to its first characters before sanitizing so the name
/// stays stable when only the end of a long title changes.
pub fn page_directory_name(id: &PageId, title: &str) -> String {
    let head: String = title.trim().chars().take(SAFE_TITLE_MAX_CHARS).collect();
    let safe = sanitize_filename(&head);
    let safe = safe.trim_matches('.');
    if safe.is_empty() {
        format!("page_{}", id)
    } else {
        format!("page_{}_{}", id, safe)
    }
}

/// Hidden sibling directory a bundle is written into before promotion.
pub fn staging_directory_name(directory: &str) -> String {
    format!(".{}.partial", directory)
}

/// Calculates a relative path from one file to another.
pub fn get_relative_path(from: &Path, to: &Path) -> Result<String, AppError> {
    let from_dir = from.parent().unwrap_or_else(|| Path::new("."));

    let relative = pathdiff::diff_paths(to, from_dir).ok_or_else(|| {
        AppError::PathError(format!(
            "Could not calculate relative path from {} to {}",
            from.display(),
            to.display()
        ))
    })?;

    // Ensure forward slashes for Markdown compatibility
    Ok(relative.to_string_lossy().replace('\\', "/"))
}

// src/attachments/naming.rs
//! Canonical export filenames.
//!
//! A filename is the slug of the attachment title's stem plus its
//! lower-cased extension. Names that collide get `-2`, `-3`, ... in the
//! order they are assigned, so the same input always yields the same names.

use crate::types::ExportFileName;
use std::collections::HashSet;

/// Lower-cased slug: alphanumeric runs joined by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Splits a title into stem and extension (without the dot).
///
/// Leading dots do not start an extension, and an extension has to be
/// short and alphanumeric to count.
fn split_extension(title: &str) -> (&str, Option<&str>) {
    let trimmed = title.trim();
    match trimmed.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < trimmed.len() => {
            let extension = &trimmed[dot + 1..];
            if extension.len() <= 10 && extension.chars().all(|c| c.is_ascii_alphanumeric()) {
                (&trimmed[..dot], Some(extension))
            } else {
                (trimmed, None)
            }
        }
        _ => (trimmed, None),
    }
}

/// The collision-free base name derived from a title, before suffixing.
pub fn base_file_name(title: &str) -> (String, Option<String>) {
    let (stem, extension) = split_extension(title);
    let slug = slugify(stem);
    let slug = if slug.is_empty() {
        "attachment".to_string()
    } else {
        slug
    };
    (slug, extension.map(str::to_ascii_lowercase))
}

/// Hands out unique names within one export.
#[derive(Debug, Default)]
pub struct FileNameAllocator {
    taken: HashSet<String>,
}

impl FileNameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, title: &str) -> ExportFileName {
        let (stem, extension) = base_file_name(title);
        let compose = |suffix: usize| {
            let stem = if suffix == 1 {
                stem.clone()
            } else {
                format!("{}-{}", stem, suffix)
            };
            match &extension {
                Some(extension) => format!("{}.{}", stem, extension),
                None => stem,
            }
        };

        let mut suffix = 1;
        let mut candidate = compose(suffix);
        while self.taken.contains(&candidate) {
            suffix += 1;
            candidate = compose(suffix);
        }
        self.taken.insert(candidate.clone());
        ExportFileName::new(candidate)
    }
}

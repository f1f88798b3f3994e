// src/model/mod.rs
//! Page snapshots, attachment manifests, and the normalized markup tree.

mod attachment;
pub mod markup;

pub use attachment::{AttachmentEntry, AttachmentManifest};
pub use markup::{
    AttachmentLocator, AttachmentRefNode, AttachmentResolution, BlockKind, CalloutStyle,
    DiagramEngine, DisplayHint, LinkNode, LinkTarget, MacroKind, MacroNode, MarkupNode,
    MarkupTree, NodeId, ReplacementBlock, TableCell, TableNode,
};

#[cfg(test)]
pub(crate) use attachment::fixtures as attachment_fixtures;

use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A wiki page snapshot as fetched for one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: PageTitle,
    pub space_key: String,
    /// Rendered view markup, the primary normalization input.
    pub body: String,
    /// Export-rendering variant; carries fully rendered issue tables.
    pub body_export: String,
    /// The wiki's "editor" variant.
    ///
    /// The REST API documents this as the editor format, but in practice it
    /// holds the first authored version of the page rather than the current
    /// one. It is only consulted for diagram sources that the view variant
    /// does not carry.
    pub editor_first_version: String,
    /// Ancestors ordered from the space root down to the direct parent.
    pub ancestors: Vec<Ancestor>,
    pub labels: BTreeSet<String>,
    /// Attachment manifest; empty until fetched.
    pub attachments: AttachmentManifest,
}

impl Page {
    /// Get the page title
    pub fn title(&self) -> &PageTitle {
        &self.title
    }

    /// Markup chosen for normalization: the view, or the export view when the
    /// view is empty.
    pub fn primary_markup(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.body_export
        } else {
            &self.body
        }
    }
}

/// An ancestor page, referenced but never exported itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: PageId,
    pub title: String,
}

/// Page title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTitle(String);

impl PageTitle {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for PageTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

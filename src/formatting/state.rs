// src/formatting/state.rs
//! Immutable formatting state with pure transitions for Markdown generation.

use crate::constants::HEADING_MAX_LEVEL;

/// Where in the document the serializer currently is.
///
/// Every transition returns a new value; the walker passes it down by value
/// so siblings never see each other's nesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatState {
    /// Enclosing generic containers (panels, expands, plain bodies).
    container_depth: usize,
    in_table: bool,
}

impl FormatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_container(self) -> Self {
        Self {
            container_depth: self.container_depth + 1,
            ..self
        }
    }

    pub fn enter_table(self) -> Self {
        Self {
            in_table: true,
            ..self
        }
    }

    pub fn in_table(&self) -> bool {
        self.in_table
    }

    /// Markdown heading level for a source heading, shifted by container depth.
    pub fn heading_level(&self, source_level: u8) -> u8 {
        let shifted = source_level as usize + self.container_depth;
        shifted.clamp(1, HEADING_MAX_LEVEL as usize) as u8
    }
}

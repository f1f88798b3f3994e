// src/formatting/mod.rs
//! Renders a transformed markup tree into Markdown.
//!
//! This is the only stage that normalizes whitespace; everything before it
//! keeps text exactly as the wiki delivered it.

mod markdown;
mod state;
mod text;

pub use markdown::render_document;

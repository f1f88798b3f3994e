// src/markup/mod.rs
//! Markup normalization: raw page markup in, [`MarkupTree`](crate::model::MarkupTree) out.

mod entities;
mod normalizer;
mod parser;

pub use normalizer::{normalize_markup, normalize_page};

// src/output/mod.rs
//! Output handling with clear separation of planning and execution.
//!
//! Planning builds an [`OutputPlan`] from pure data; [`deliver`] is the only
//! place that touches the filesystem.

mod paths;
mod types;
mod writer;

pub use paths::{get_relative_path, page_directory_name, staging_directory_name};
pub use types::{DeliveryTarget, OutputPlan, OutputReport};
pub use writer::{deliver, discard_directory};

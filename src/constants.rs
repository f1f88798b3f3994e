// src/constants.rs
//! Domain constants that define the operational boundaries of the system.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role.

// ---------------------------------------------------------------------------
// Wiki API boundaries
// ---------------------------------------------------------------------------

/// How many attachments the REST API returns per page of results.
pub const WIKI_API_PAGE_SIZE: usize = 100;

/// Body renderings and metadata requested with every page.
pub const PAGE_EXPANSIONS: &str =
    "body.view,body.export_view,body.editor,metadata.labels,space,ancestors";

/// Attempts for a single wiki request, first try included.
pub const WIKI_FETCH_MAX_ATTEMPTS: u32 = 3;

/// Attempts for a remote diagram include: one fetch plus one retry.
pub const INCLUDE_MAX_ATTEMPTS: u32 = 2;

/// First backoff delay between attempts, in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 250;

/// Upper bound of the backoff delay, in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Export defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_OUTPUT_DIR: &str = "./conf-export";

/// Deadline for one page, fetch through write.
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 60;

/// Deadline for one remote include, retry included.
pub const DEFAULT_INCLUDE_TIMEOUT_SECS: u64 = 15;

/// Bounds of the default I/O pool size, derived from the CPU count.
pub const IO_WORKERS_MIN: usize = 2;
pub const IO_WORKERS_MAX: usize = 8;

/// Pages exported at the same time in a batch.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 2;

/// Longest title fragment used in a page directory name, in characters.
pub const SAFE_TITLE_MAX_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Formatting boundaries
// ---------------------------------------------------------------------------

/// Deepest Markdown heading level.
pub const HEADING_MAX_LEVEL: u8 = 6;

/// Number of spaces per list nesting level.
pub const INDENT_SPACES: usize = 2;

/// Estimated output characters per tree node, used to pre-allocate.
pub const CHARS_PER_NODE_ESTIMATE: usize = 24;

// ---------------------------------------------------------------------------
// Error display
// ---------------------------------------------------------------------------

/// Maximum characters shown when previewing error response bodies.
pub const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Bundle layout
// ---------------------------------------------------------------------------

pub const CONTENT_FILE_NAME: &str = "content.md";
pub const REPORT_FILE_NAME: &str = "export-report.json";
pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Raw markup variants written next to the Markdown on request.
pub const RAW_VIEW_FILE_NAME: &str = "body.html";
pub const RAW_EXPORT_VIEW_FILE_NAME: &str = "export.html";
pub const RAW_EDITOR_FILE_NAME: &str = "editor.xml";

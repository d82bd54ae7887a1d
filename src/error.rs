//! Error types for the manual-corpus library.
//!
//! Every stage returns [`CorpusError`]. The stage drivers in [`crate::run`]
//! wrap the first per-manual failure in [`CorpusError::Manual`] so the
//! message names the manual that stopped the batch.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the manual-corpus library.
#[derive(Debug, Error)]
pub enum CorpusError {
    // ── Manifest errors ───────────────────────────────────────────────────
    /// The manuals configuration file does not exist.
    #[error("Manuals configuration not found: '{path}'\nCopy '{example}' and fill in your URLs.")]
    ConfigNotFound { path: PathBuf, example: PathBuf },

    /// A manual entry lacks one of the required fields.
    #[error("Missing required field '{field}' in configuration of '{key}'")]
    MissingField { key: String, field: &'static str },

    /// `pdf_url` is not a string ending in `.pdf`.
    #[error("Invalid URL for '{key}': '{url}' must point to a PDF")]
    InvalidUrl { key: String, url: String },

    /// The configuration parsed but lists no manuals.
    #[error("The configuration does not contain any manuals")]
    EmptyConfig,

    /// `--only` tokens that matched no configured manual.
    #[error("No manuals found for: {}", tokens.join(", "))]
    ManualsNotFound { tokens: Vec<String> },

    /// Builder validation or manifest shape error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// A file a stage depends on is missing (raw PDF, intermediate JSON, headers file).
    #[error("File not found: '{path}'\nRun the previous stage first or check the path.")]
    FileNotFound { path: PathBuf },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The server refused the request (HTTP 401/403).
    #[error(
        "Access denied (HTTP {status}). The vendor site usually requires session cookies.\n\
Retry with --headers-file pointing at your browser headers/cookies, \
or set TESLA_DOWNLOAD_HEADERS."
    )]
    AccessDenied { status: u16 },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} while downloading '{url}'")]
    Http { url: String, status: u16 },

    /// Transport-level failure while sending or streaming.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The response is not a PDF (typically an HTML login or error page).
    #[error(
        "Unexpected response (content-type: {content_type}). Check the headers/cookies used."
    )]
    ContentTypeMismatch { content_type: String },

    /// Header overrides from env or file are not a JSON object of strings.
    #[error("Invalid HTTP headers from {origin}: {detail}")]
    InvalidHeaders { origin: String, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// pdfium could not open the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Chunk / compile errors ────────────────────────────────────────────
    /// The intermediate document has no extracted pages.
    #[error("No extracted pages in '{path}'")]
    NoPages { path: PathBuf },

    /// The compile stage found no processed JSONL file at all.
    #[error("No processed files found to compile")]
    NoProcessedFiles,

    /// The text splitter rejected the chunk settings.
    #[error("Invalid chunk settings: {0}")]
    Splitter(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a pipeline artifact failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON artifact could not be parsed or serialised.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// A stage failed for one manual; the batch stopped there.
    #[error("{name}: {source}")]
    Manual {
        name: String,
        #[source]
        source: Box<CorpusError>,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CorpusError::Json {
            path: path.into(),
            source,
        }
    }

    /// Attach the manual's display name to a stage error.
    pub fn for_manual(self, name: impl Into<String>) -> Self {
        CorpusError::Manual {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

//! Records written to disk by the pipeline, and per-stage summaries.
//!
//! [`ChunkRecord`] is the durable contract: downstream indexers read the
//! processed and compiled JSONL files line by line, so its field names and
//! field order must not change.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Intermediate document (extract → chunk) ──────────────────────────────

/// Per-manual output of the extract stage, stored as pretty JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateDocument {
    pub metadata: IntermediateMetadata,
    /// Non-empty pages in ascending `page_number` order.
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateMetadata {
    pub model_key: String,
    pub slug: String,
    pub display_name: String,
    pub document_title: String,
    /// File name of the source PDF.
    pub pdf_source: String,
    pub total_pages: usize,
    pub extracted_pages: usize,
    pub extracted_at: String,
}

/// Cleaned text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed position in the PDF, counting empty pages too.
    pub page_number: usize,
    pub text: String,
    pub char_count: usize,
}

impl PageText {
    pub fn new(page_number: usize, text: String) -> Self {
        let char_count = text.chars().count();
        Self {
            page_number,
            text,
            char_count,
        }
    }
}

// ── Chunk records (chunk → compile → downstream) ─────────────────────────

/// One line of a processed or compiled JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub model_key: String,
    pub model_slug: String,
    pub model_name: String,
    pub document_title: String,
    pub source_file: String,
    pub page_start: usize,
    pub page_end: usize,
    pub source_pages: Vec<usize>,
    /// Zero-based, unique within one manual's file, in emission order.
    pub chunk_index: usize,
    /// Characters in `text` (Unicode scalar values, after trimming).
    pub char_count: usize,
    pub generated_at: String,
}

// ── Stage summaries ──────────────────────────────────────────────────────

/// Result of fetching one manual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FetchOutcome {
    /// The PDF was already on disk and `force` was off.
    Skipped { path: PathBuf },
    /// A fresh copy was streamed and moved into place.
    Downloaded { path: PathBuf, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub slug: String,
    pub total_pages: usize,
    pub extracted_pages: usize,
    pub json_path: PathBuf,
    pub text_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub slug: String,
    pub blocks: usize,
    pub chunks: usize,
    pub average_chars: f64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileSummary {
    pub output: PathBuf,
    pub files: usize,
    pub lines: usize,
    /// Display names of manuals without a processed file.
    pub skipped: Vec<String>,
}

//! # manual-corpus
//!
//! Turn vendor PDF owner's manuals into a JSONL corpus ready for
//! retrieval-augmented generation.
//!
//! ## Pipeline Overview
//!
//! ```text
//! config/manuals.json
//!  │
//!  ├─ 1. Fetch    stream each PDF with browser-like headers → raw/<slug>.pdf
//!  ├─ 2. Extract  per-page text via pdfium (spawn_blocking), cleaned
//!  │              → intermediate/<slug>.json + <slug>.txt
//!  ├─ 3. Chunk    pages → blocks → overlapping chunks with page ranges
//!  │              → processed/<slug>.jsonl
//!  └─ 4. Compile  concatenate every manual → compiled/manuales_compilados.jsonl
//! ```
//!
//! Every stage reads and writes files under the data directory only, so any
//! stage can be re-run on its own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manual_corpus::{chunk_manuals, compile_manuals, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .data_dir("data")
//!         .chunk_size(800)
//!         .chunk_overlap(120)
//!         .build()?;
//!     let only = vec!["model_3".to_string()];
//!     for summary in chunk_manuals(&config, &only).await? {
//!         eprintln!("{}: {} chunks", summary.slug, summary.chunks);
//!     }
//!     let compiled = compile_manuals(&config, &[]).await?;
//!     println!("{} lines -> {}", compiled.lines, compiled.output.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manual-corpus` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! manual-corpus = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DataLayout, PipelineConfig, PipelineConfigBuilder};
pub use error::CorpusError;
pub use manifest::{filter_manuals, load_manuals_config, normalize_identifier, ManualConfig};
pub use output::{
    ChunkMetadata, ChunkRecord, ChunkSummary, CompileSummary, ExtractionSummary, FetchOutcome,
    IntermediateDocument, IntermediateMetadata, PageText,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{
    chunk_manuals, compile_manuals, extract_manuals, fetch_manuals, run_all, select_manuals,
    RunSummary,
};

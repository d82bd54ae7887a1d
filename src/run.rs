//! Stage drivers: load the manifest, select manuals, run a stage over each.
//!
//! Manuals are processed one at a time in manifest order. The first failure
//! stops the batch and is returned wrapped in [`CorpusError::Manual`];
//! artifacts written for earlier manuals stay on disk.

use crate::config::PipelineConfig;
use crate::error::CorpusError;
use crate::manifest::{filter_manuals, load_manuals_config, ManualConfig};
use crate::output::{ChunkSummary, CompileSummary, ExtractionSummary, FetchOutcome};
use crate::pipeline::{chunk, compile, extract, fetch};
use serde::Serialize;
use tracing::{info, warn};

/// Load the manifest named by `config` and keep the manuals `only` selects.
///
/// An empty `only` selects every manual.
pub fn select_manuals(
    config: &PipelineConfig,
    only: &[String],
) -> Result<Vec<ManualConfig>, CorpusError> {
    let manuals = load_manuals_config(&config.manuals_path, &config.example_manuals_path)?;
    filter_manuals(&manuals, only)
}

/// Download every selected manual.
pub async fn fetch_manuals(
    config: &PipelineConfig,
    only: &[String],
) -> Result<Vec<FetchOutcome>, CorpusError> {
    let manuals = select_manuals(config, only)?;
    let headers = fetch::headers_from_env_or_file(config.headers_file.as_deref())?;
    let client = fetch::build_client(headers, config.timeout_secs)?;

    let mut outcomes = Vec::with_capacity(manuals.len());
    for manual in &manuals {
        let outcome = fetch::fetch_manual(&client, manual, config)
            .await
            .map_err(|e| e.for_manual(&manual.display_name))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Extract page text from every selected manual's PDF.
pub async fn extract_manuals(
    config: &PipelineConfig,
    only: &[String],
) -> Result<Vec<ExtractionSummary>, CorpusError> {
    let manuals = select_manuals(config, only)?;

    let mut summaries = Vec::with_capacity(manuals.len());
    for manual in &manuals {
        let summary = extract::extract_manual(manual, config)
            .await
            .map_err(|e| e.for_manual(&manual.display_name))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Chunk every selected manual's intermediate document.
pub async fn chunk_manuals(
    config: &PipelineConfig,
    only: &[String],
) -> Result<Vec<ChunkSummary>, CorpusError> {
    let manuals = select_manuals(config, only)?;

    let mut summaries = Vec::with_capacity(manuals.len());
    for manual in &manuals {
        let summary = chunk::chunk_manual(manual, config)
            .await
            .map_err(|e| e.for_manual(&manual.display_name))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Concatenate the processed files of the selected manuals.
///
/// Manuals without a processed file are skipped with a warning; if none is
/// left the result is [`CorpusError::NoProcessedFiles`].
pub async fn compile_manuals(
    config: &PipelineConfig,
    only: &[String],
) -> Result<CompileSummary, CorpusError> {
    let manuals = select_manuals(config, only)?;
    let layout = config.layout();

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for manual in &manuals {
        let path = manual.processed_jsonl_path(&layout);
        if path.exists() {
            files.push(path);
        } else {
            warn!(
                "[SKIP] {}: no processed file at {}",
                manual.display_name,
                path.display()
            );
            skipped.push(manual.display_name.clone());
        }
    }

    if files.is_empty() {
        return Err(CorpusError::NoProcessedFiles);
    }

    let output = config.compiled_path();
    let lines = compile::compile_files(&files, &output).await?;
    info!(
        "[OK] Compiled {} lines from {} files -> {}",
        lines,
        files.len(),
        output.display()
    );

    Ok(CompileSummary {
        output,
        files: files.len(),
        lines,
        skipped,
    })
}

/// Outcome of [`run_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub fetched: Vec<FetchOutcome>,
    pub extracted: Vec<ExtractionSummary>,
    pub chunked: Vec<ChunkSummary>,
    pub compiled: CompileSummary,
}

/// Fetch, extract, chunk and compile, stopping at the first failing stage.
pub async fn run_all(config: &PipelineConfig, only: &[String]) -> Result<RunSummary, CorpusError> {
    let fetched = fetch_manuals(config, only).await?;
    let extracted = extract_manuals(config, only).await?;
    let chunked = chunk_manuals(config, only).await?;
    let compiled = compile_manuals(config, only).await?;
    Ok(RunSummary {
        fetched,
        extracted,
        chunked,
        compiled,
    })
}

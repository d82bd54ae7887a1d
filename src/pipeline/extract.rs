//! Extract stage: read each PDF page's text layer via pdfium and clean it.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. The whole read runs
//! on a blocking-pool thread and hands back plain strings.
//!
//! Writes two artifacts per manual, both overwritten on every run:
//! `<data>/intermediate/<slug>.json` (consumed by the chunk stage) and
//! `<slug>.txt`, a flat dump labelled by page for eyeballing the cleanup.

use crate::config::PipelineConfig;
use crate::error::CorpusError;
use crate::manifest::ManualConfig;
use crate::output::{ExtractionSummary, IntermediateDocument, IntermediateMetadata, PageText};
use crate::pipeline::clean::clean_text;
use crate::pipeline::{now_iso, write_atomic};
use crate::progress::ProgressCallback;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Points at a pdfium shared library, or a directory containing one.
pub const PDFIUM_LIB_ENV_VAR: &str = "PDFIUM_LIB_PATH";

/// Extract and clean every page of a manual's raw PDF.
pub async fn extract_manual(
    manual: &ManualConfig,
    config: &PipelineConfig,
) -> Result<ExtractionSummary, CorpusError> {
    let layout = config.layout();
    let pdf_path = manual.raw_pdf_path(&layout);
    if !pdf_path.exists() {
        return Err(CorpusError::FileNotFound { path: pdf_path });
    }

    info!("Extracting text from {}", pdf_path.display());
    let path = pdf_path.clone();
    let label = manual.slug.clone();
    let progress = config.progress_callback.clone();
    let raw_pages = tokio::task::spawn_blocking(move || {
        read_page_texts(&path, &label, progress.as_ref())
    })
    .await
    .map_err(|e| CorpusError::Internal(format!("Extraction task panicked: {e}")))??;

    let (document, dump) = build_intermediate(manual, &raw_pages, &now_iso());
    if let Some(ref cb) = config.progress_callback {
        cb.on_extract_complete(document.metadata.total_pages, document.metadata.extracted_pages);
    }

    let json_path = manual.intermediate_json_path(&layout);
    let text_path = manual.intermediate_txt_path(&layout);
    let json = serde_json::to_string_pretty(&document).map_err(|e| CorpusError::json(&json_path, e))?;
    write_atomic(&json_path, json.as_bytes()).await?;
    write_atomic(&text_path, dump.as_bytes()).await?;

    info!(
        "[OK] {}: {}/{} pages with text -> {}",
        manual.display_name,
        document.metadata.extracted_pages,
        document.metadata.total_pages,
        json_path.display()
    );

    Ok(ExtractionSummary {
        slug: manual.slug.clone(),
        total_pages: document.metadata.total_pages,
        extracted_pages: document.metadata.extracted_pages,
        json_path,
        text_path,
    })
}

/// Clean raw page texts into the intermediate document and its text dump.
///
/// `raw_pages[i]` is page `i + 1`. Pages that clean to nothing are dropped
/// but still count toward `total_pages` and keep the numbering of the rest.
pub fn build_intermediate(
    manual: &ManualConfig,
    raw_pages: &[String],
    extracted_at: &str,
) -> (IntermediateDocument, String) {
    let total_pages = raw_pages.len();
    let mut pages = Vec::with_capacity(total_pages);
    let mut dump_entries = Vec::with_capacity(total_pages);

    for (idx, raw) in raw_pages.iter().enumerate() {
        let page_number = idx + 1;
        let cleaned = clean_text(raw);
        if cleaned.is_empty() {
            debug!("Page {} has no text after cleanup, skipping", page_number);
            continue;
        }
        dump_entries.push(format!("--- Page {page_number} ---\n{cleaned}\n"));
        pages.push(PageText::new(page_number, cleaned));
    }

    let metadata = IntermediateMetadata {
        model_key: manual.key.clone(),
        slug: manual.slug.clone(),
        display_name: manual.display_name.clone(),
        document_title: manual.document_title.clone(),
        pdf_source: manual.pdf_file_name(),
        total_pages,
        extracted_pages: pages.len(),
        extracted_at: extracted_at.to_string(),
    };

    (IntermediateDocument { metadata, pages }, dump_entries.join("\n"))
}

/// Read the raw text layer of every page, in document order.
///
/// Blocking. A page whose text cannot be read yields an empty string.
/// `progress` hears `on_extract_start` once and `on_page_extracted` per page
/// as it is read, with the raw character count.
pub fn read_page_texts(
    pdf_path: &Path,
    label: &str,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<String>, CorpusError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| CorpusError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if let Some(cb) = progress {
        cb.on_extract_start(label, total_pages);
    }

    let mut texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!("Page {}: text layer unreadable ({:?})", idx + 1, e);
                String::new()
            }
        };
        if let Some(cb) = progress {
            cb.on_page_extracted(idx + 1, total_pages, text.chars().count());
        }
        texts.push(text);
    }

    Ok(texts)
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
fn bind_pdfium() -> Result<Pdfium, CorpusError> {
    if let Some(path) = std::env::var_os(PDFIUM_LIB_ENV_VAR).map(PathBuf::from) {
        let lib = if path.is_dir() {
            path.join(Pdfium::pdfium_platform_library_name())
        } else {
            path
        };
        debug!("Binding pdfium from {}", lib.display());
        let bindings = Pdfium::bind_to_library(&lib).map_err(|e| {
            CorpusError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| CorpusError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

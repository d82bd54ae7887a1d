//! Chunk stage: pages → blocks → overlapping chunks → JSONL.
//!
//! ## Why blocks?
//!
//! Splitting page by page would cut every chunk at a page boundary, even
//! mid-sentence. Splitting the whole manual at once would produce chunks
//! whose page range is unknowable. Blocks sit in between: consecutive pages
//! are accumulated until they hold `block_threshold` characters, the
//! splitter runs inside each block, and every chunk inherits its block's
//! page range. No chunk ever spans two blocks.
//!
//! A page longer than the threshold becomes a block on its own; pages are
//! never cut here, only by the splitter.

use crate::config::PipelineConfig;
use crate::error::CorpusError;
use crate::manifest::ManualConfig;
use crate::output::{ChunkMetadata, ChunkRecord, ChunkSummary, IntermediateDocument, PageText};
use crate::pipeline::{now_iso, write_atomic};
use text_splitter::{Characters, ChunkConfig, TextSplitter};
use tracing::{debug, info};

/// Contiguous pages grouped for splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Page texts joined by a blank line.
    pub text: String,
    pub page_start: usize,
    pub page_end: usize,
    pub source_pages: Vec<usize>,
}

/// Group pages into blocks of at least `threshold` characters.
///
/// Pages are taken in order, trimmed, and skipped when empty. The buffer is
/// flushed as soon as its summed page length (separators excluded) reaches
/// `threshold`; whatever remains at the end becomes a final, shorter block.
pub fn build_blocks(pages: &[PageText], threshold: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_pages: Vec<usize> = Vec::new();
    let mut buffer_len = 0usize;

    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }

        buffer.push(text);
        buffer_pages.push(page.page_number);
        buffer_len += text.chars().count();

        if buffer_len >= threshold {
            blocks.push(flush_block(&mut buffer, &mut buffer_pages));
            buffer_len = 0;
        }
    }

    if !buffer.is_empty() {
        blocks.push(flush_block(&mut buffer, &mut buffer_pages));
    }

    blocks
}

fn flush_block(buffer: &mut Vec<&str>, pages: &mut Vec<usize>) -> Block {
    let source_pages = std::mem::take(pages);
    let block = Block {
        text: buffer.join("\n\n"),
        page_start: source_pages[0],
        page_end: source_pages[source_pages.len() - 1],
        source_pages,
    };
    buffer.clear();
    block
}

/// Boundary-aware splitter configured from chunk size and overlap.
///
/// Breaks prefer blank lines, then line breaks, then sentence ends, then
/// spaces. Sizes are measured in characters.
pub fn build_splitter(
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<TextSplitter<Characters>, CorpusError> {
    let chunk_config = ChunkConfig::new(chunk_size)
        .with_overlap(chunk_overlap)
        .map_err(|e| CorpusError::Splitter(e.to_string()))?;
    Ok(TextSplitter::new(chunk_config))
}

/// Split every block and stamp each chunk with its manual and page metadata.
///
/// `chunk_index` counts across all blocks of the manual, starting at zero.
pub fn chunk_blocks(
    manual: &ManualConfig,
    blocks: &[Block],
    splitter: &TextSplitter<Characters>,
    generated_at: &str,
) -> Vec<ChunkRecord> {
    let mut records = Vec::new();

    for block in blocks {
        for piece in splitter.chunks(&block.text) {
            let text = piece.trim();
            if text.is_empty() {
                continue;
            }
            let chunk_index = records.len();
            records.push(ChunkRecord {
                text: text.to_string(),
                metadata: ChunkMetadata {
                    model_key: manual.key.clone(),
                    model_slug: manual.slug.clone(),
                    model_name: manual.display_name.clone(),
                    document_title: manual.document_title.clone(),
                    source_file: manual.pdf_file_name(),
                    page_start: block.page_start,
                    page_end: block.page_end,
                    source_pages: block.source_pages.clone(),
                    chunk_index,
                    char_count: text.chars().count(),
                    generated_at: generated_at.to_string(),
                },
            });
        }
        debug!(
            "Block pages {}-{} -> {} chunks so far",
            block.page_start,
            block.page_end,
            records.len()
        );
    }

    records
}

/// Serialise records as JSON Lines, one object per line.
pub fn to_jsonl(records: &[ChunkRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Chunk one manual's intermediate document into its processed JSONL file.
pub async fn chunk_manual(
    manual: &ManualConfig,
    config: &PipelineConfig,
) -> Result<ChunkSummary, CorpusError> {
    let layout = config.layout();
    let json_path = manual.intermediate_json_path(&layout);
    if !json_path.exists() {
        return Err(CorpusError::FileNotFound { path: json_path });
    }

    let raw = tokio::fs::read_to_string(&json_path)
        .await
        .map_err(|e| CorpusError::io(&json_path, e))?;
    let document: IntermediateDocument =
        serde_json::from_str(&raw).map_err(|e| CorpusError::json(&json_path, e))?;
    if document.pages.is_empty() {
        return Err(CorpusError::NoPages { path: json_path });
    }

    let splitter = build_splitter(config.chunk_size, config.chunk_overlap)?;
    let blocks = build_blocks(&document.pages, config.block_threshold);
    let records = chunk_blocks(manual, &blocks, &splitter, &now_iso());

    let out_path = manual.processed_jsonl_path(&layout);
    let jsonl = to_jsonl(&records).map_err(|e| CorpusError::json(&out_path, e))?;
    write_atomic(&out_path, jsonl.as_bytes()).await?;

    let total_chars: usize = records.iter().map(|r| r.metadata.char_count).sum();
    let average_chars = total_chars as f64 / records.len().max(1) as f64;

    info!(
        "[OK] {}: {} chunks from {} blocks (avg {:.0} chars) -> {}",
        manual.display_name,
        records.len(),
        blocks.len(),
        average_chars,
        out_path.display()
    );

    Ok(ChunkSummary {
        slug: manual.slug.clone(),
        blocks: blocks.len(),
        chunks: records.len(),
        average_chars,
        path: out_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> ManualConfig {
        ManualConfig {
            key: "model_x".into(),
            display_name: "Model X".into(),
            slug: "model_x".into(),
            document_title: "Manual del propietario Model X".into(),
            pdf_url: "https://example.com/model_x.pdf".into(),
            source_url: None,
            language: "es".into(),
            region: Some("MX".into()),
        }
    }

    fn page(n: usize, len: usize) -> PageText {
        PageText::new(n, "a".repeat(len))
    }

    /// 26 paragraphs of 75 chars separated by blank lines: exactly 2000 chars.
    fn prose_paragraphs() -> Vec<String> {
        (0..26)
            .map(|i| {
                format!("Paragraph {i:02} describes one maintenance step for the vehicle in plain words.")
            })
            .collect()
    }

    #[test]
    fn three_pages_of_1500_form_one_block() {
        let pages = vec![page(1, 1500), page(2, 1500), page(3, 1500)];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source_pages, vec![1, 2, 3]);
        assert_eq!(blocks[0].page_start, 1);
        assert_eq!(blocks[0].page_end, 3);
        assert_eq!(blocks[0].text.chars().count(), 4500 + 2 * 2);
    }

    #[test]
    fn flush_happens_on_reaching_threshold() {
        let pages = vec![page(1, 2000), page(2, 1200), page(3, 100)];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].source_pages, vec![1, 2]);
        assert_eq!(blocks[1].source_pages, vec![3]);
    }

    #[test]
    fn oversized_page_is_its_own_block() {
        let pages = vec![page(4, 5000), page(5, 10)];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].source_pages, vec![4]);
        assert_eq!(blocks[0].text.len(), 5000);
        assert_eq!(blocks[1].source_pages, vec![5]);
    }

    #[test]
    fn blank_pages_are_skipped() {
        let pages = vec![
            PageText::new(1, "  uno ".into()),
            PageText::new(2, "   ".into()),
            PageText::new(3, "tres".into()),
        ];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "uno\n\ntres");
        assert_eq!(blocks[0].source_pages, vec![1, 3]);
    }

    #[test]
    fn block_text_is_its_pages_in_order() {
        let pages: Vec<PageText> = (1..=9)
            .map(|n| PageText::new(n, format!("page {n} ").repeat(90)))
            .collect();
        let blocks = build_blocks(&pages, 3200);
        assert!(blocks.len() > 1);

        let mut seen = Vec::new();
        for block in &blocks {
            let expected: Vec<&str> = block
                .source_pages
                .iter()
                .map(|n| pages[n - 1].text.trim())
                .collect();
            assert_eq!(block.text, expected.join("\n\n"));
            assert_eq!(block.page_start, block.source_pages[0]);
            assert_eq!(block.page_end, *block.source_pages.last().unwrap());
            seen.extend(block.source_pages.iter().copied());
        }
        assert_eq!(seen, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn no_pages_no_blocks() {
        assert!(build_blocks(&[], 3200).is_empty());
    }

    #[test]
    fn prose_block_splits_with_overlap_and_shared_metadata() {
        let paragraphs = prose_paragraphs();
        let pages = vec![
            PageText::new(7, paragraphs[..13].join("\n\n")),
            PageText::new(8, paragraphs[13..].join("\n\n")),
        ];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text.chars().count(), 2000);

        let splitter = build_splitter(800, 120).unwrap();
        let records = chunk_blocks(&manual(), &blocks, &splitter, "2024-01-01T00:00:00.000000+00:00");

        assert!(records.len() >= 3, "got {} chunks", records.len());
        for (i, r) in records.iter().enumerate() {
            assert!(r.metadata.char_count <= 800, "chunk {i} has {} chars", r.metadata.char_count);
            assert_eq!(r.metadata.char_count, r.text.chars().count());
            assert_eq!(r.metadata.chunk_index, i);
            assert_eq!(r.metadata.page_start, 7);
            assert_eq!(r.metadata.page_end, 8);
            assert_eq!(r.metadata.source_pages, vec![7, 8]);
            assert_eq!(r.metadata.source_file, "model_x.pdf");
        }

        // Consecutive chunks share text at the boundary.
        for pair in records.windows(2) {
            let lead = pair[1].text.split("\n\n").next().unwrap();
            assert!(
                pair[0].text.contains(lead),
                "no overlap between {:?} and {:?}",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn chunks_never_cross_blocks() {
        let pages = vec![page(1, 3300), PageText::new(2, "Short closing page.".into())];
        let blocks = build_blocks(&pages, 3200);
        assert_eq!(blocks.len(), 2);

        let splitter = build_splitter(800, 120).unwrap();
        let records = chunk_blocks(&manual(), &blocks, &splitter, "t");
        let last = records.last().unwrap();
        assert_eq!(last.text, "Short closing page.");
        assert_eq!(last.metadata.source_pages, vec![2]);
        assert!(records[..records.len() - 1]
            .iter()
            .all(|r| r.metadata.source_pages == vec![1]));
        let indices: Vec<usize> = records.iter().map(|r| r.metadata.chunk_index).collect();
        assert_eq!(indices, (0..records.len()).collect::<Vec<_>>());
    }

    #[test]
    fn overlap_larger_than_chunk_rejected() {
        assert!(matches!(build_splitter(100, 150), Err(CorpusError::Splitter(_))));
    }

    #[test]
    fn jsonl_has_one_record_per_line() {
        let blocks = build_blocks(&[PageText::new(1, "Hola mundo.".into())], 3200);
        let splitter = build_splitter(800, 120).unwrap();
        let records = chunk_blocks(&manual(), &blocks, &splitter, "t");
        let jsonl = to_jsonl(&records).unwrap();
        assert_eq!(jsonl.lines().count(), 1);
        assert!(jsonl.ends_with('\n'));
        let back: ChunkRecord = serde_json::from_str(jsonl.trim_end()).unwrap();
        assert_eq!(back.text, "Hola mundo.");
        assert_eq!(back.metadata.char_count, 11);
    }
}

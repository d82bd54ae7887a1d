//! Compile stage: concatenate per-manual JSONL files into one dataset.

use crate::error::CorpusError;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

/// Append every non-blank line of `files`, in order, to `output`.
///
/// Each line is written with exactly one trailing newline. The output file
/// is truncated first and its parent directories are created. Returns the
/// number of lines written.
pub async fn compile_files(files: &[PathBuf], output: &Path) -> Result<usize, CorpusError> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CorpusError::io(parent, e))?;
    }

    let out = tokio::fs::File::create(output)
        .await
        .map_err(|e| CorpusError::io(output, e))?;
    let mut writer = BufWriter::new(out);
    let mut total = 0usize;

    for path in files {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| CorpusError::io(path, e))?;
        let mut lines = BufReader::new(file).lines();
        let mut count = 0usize;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| CorpusError::io(path, e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| CorpusError::io(output, e))?;
            writer
                .write_all(b"\n")
                .await
                .map_err(|e| CorpusError::io(output, e))?;
            count += 1;
        }

        debug!("{}: {} lines", path.display(), count);
        total += count;
    }

    writer.flush().await.map_err(|e| CorpusError::io(output, e))?;
    Ok(total)
}

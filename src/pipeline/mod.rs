//! Pipeline stages for turning manuals into a JSONL corpus.
//!
//! Each submodule implements exactly one step and can be run on its own;
//! stages only communicate through files under the data directory.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ chunk ──▶ compile
//! (raw/*.pdf) (intermediate/*.json) (processed/*.jsonl) (compiled/*.jsonl)
//! ```
//!
//! 1. [`fetch`]   — stream the PDF with browser-like headers, atomically
//! 2. [`extract`] — per-page text via pdfium, cleaned by [`clean`]
//! 3. [`chunk`]   — group pages into blocks, split blocks into overlapping chunks
//! 4. [`compile`] — concatenate every manual's chunks into one dataset

pub mod chunk;
pub mod clean;
pub mod compile;
pub mod extract;
pub mod fetch;

use crate::error::CorpusError;
use chrono::{SecondsFormat, Utc};
use std::path::Path;

/// Current UTC time as RFC 3339 with microseconds, e.g.
/// `2024-05-01T12:00:00.123456+00:00`.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Write `contents` to `path` via a temp sibling and rename, creating
/// parent directories. Readers never observe a half-written artifact.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CorpusError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CorpusError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let written = match tokio::fs::write(tmp_path, contents).await {
        Ok(()) => tokio::fs::rename(tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(tmp_path).await;
        return Err(CorpusError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso_is_utc_with_micros() {
        let ts = now_iso();
        assert!(ts.ends_with("+00:00"), "got: {ts}");
        let (_, frac) = ts.split_once('.').unwrap();
        assert_eq!(frac.len(), "123456+00:00".len(), "got: {ts}");
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.json");
        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("a/b/out.json.tmp").exists());
    }

    #[tokio::test]
    async fn write_atomic_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        // A non-empty directory cannot be replaced by a file.
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let err = write_atomic(&path, b"data").await.unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }), "got: {err}");
        assert!(!dir.path().join("out.json.tmp").exists());
        assert!(path.is_dir());
    }
}

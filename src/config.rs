//! Configuration types for the manual pipeline.
//!
//! All stage behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Paths are explicit fields rather than
//! locations derived from where the binary lives: the CLI supplies the
//! defaults, the library only consumes them.

use crate::error::CorpusError;
use crate::manifest::ManualConfig;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the compiled dataset inside `<data>/compiled/`.
pub const COMPILED_FILE_NAME: &str = "manuales_compilados.jsonl";

/// Configuration shared by every pipeline stage.
///
/// # Example
/// ```rust
/// use manual_corpus::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .data_dir("/tmp/corpus")
///     .chunk_size(600)
///     .chunk_overlap(80)
///     .build()
///     .unwrap();
/// assert_eq!(config.layout().processed_dir(), std::path::Path::new("/tmp/corpus/processed"));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Root of the on-disk layout (`raw/`, `intermediate/`, `processed/`, `compiled/`).
    /// Default: `data`.
    pub data_dir: PathBuf,

    /// Manuals JSON. Default: `config/manuals.json`.
    pub manuals_path: PathBuf,

    /// Template named in the error when `manuals_path` is missing.
    /// Default: `config/manuals.example.json`.
    pub example_manuals_path: PathBuf,

    /// Per-request fetch timeout in seconds. Default: 90.
    ///
    /// Manuals run to hundreds of pages; 90 s covers a full download on a
    /// slow connection without hanging forever on a stalled one.
    pub timeout_secs: u64,

    /// Re-download PDFs that already exist. Default: false.
    pub force: bool,

    /// Optional JSON file of extra request headers (cookies etc.).
    pub headers_file: Option<PathBuf>,

    /// Target chunk length in characters. Default: 800.
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks. Default: 120.
    pub chunk_overlap: usize,

    /// Character count at which accumulated pages are flushed as one block.
    /// Default: 3200.
    ///
    /// Four chunks' worth of text per block lets overlap span page
    /// boundaries while keeping each chunk's page range narrow.
    pub block_threshold: usize,

    /// Compiled dataset path. If None, `<data>/compiled/manuales_compilados.jsonl`.
    pub output: Option<PathBuf>,

    /// Receives download and extraction progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            manuals_path: PathBuf::from("config/manuals.json"),
            example_manuals_path: PathBuf::from("config/manuals.example.json"),
            timeout_secs: 90,
            force: false,
            headers_file: None,
            chunk_size: 800,
            chunk_overlap: 120,
            block_threshold: 3200,
            output: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("data_dir", &self.data_dir)
            .field("manuals_path", &self.manuals_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("force", &self.force)
            .field("headers_file", &self.headers_file)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("block_threshold", &self.block_threshold)
            .field("output", &self.output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The on-disk layout rooted at `data_dir`.
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }

    /// Where the compile stage writes, honouring `output`.
    pub fn compiled_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.layout().compiled_path())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn manuals_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manuals_path = path.into();
        self
    }

    pub fn example_manuals_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.example_manuals_path = path.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn headers_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.headers_file = Some(path.into());
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn block_threshold(mut self, n: usize) -> Self {
        self.config.block_threshold = n;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, CorpusError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(CorpusError::InvalidConfig(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(CorpusError::InvalidConfig(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.block_threshold == 0 {
            return Err(CorpusError::InvalidConfig(
                "Block size must be ≥ 1".into(),
            ));
        }
        if c.timeout_secs == 0 {
            return Err(CorpusError::InvalidConfig(
                "Timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Data layout ──────────────────────────────────────────────────────────

/// Maps a manual's slug to each artifact path under one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.root.join("intermediate")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn compiled_path(&self) -> PathBuf {
        self.root.join("compiled").join(COMPILED_FILE_NAME)
    }

    pub fn raw_pdf_path(&self, manual: &ManualConfig) -> PathBuf {
        self.raw_dir().join(format!("{}.pdf", manual.slug))
    }

    pub fn intermediate_json_path(&self, manual: &ManualConfig) -> PathBuf {
        self.intermediate_dir().join(format!("{}.json", manual.slug))
    }

    pub fn intermediate_txt_path(&self, manual: &ManualConfig) -> PathBuf {
        self.intermediate_dir().join(format!("{}.txt", manual.slug))
    }

    pub fn processed_jsonl_path(&self, manual: &ManualConfig) -> PathBuf {
        self.processed_dir().join(format!("{}.jsonl", manual.slug))
    }
}

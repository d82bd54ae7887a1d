//! CLI binary for manual-corpus.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `PipelineConfig`, runs one stage (or all of them) and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use manual_corpus::{
    chunk_manuals, compile_manuals, extract_manuals, fetch_manuals, run_all, select_manuals,
    ChunkSummary, CompileSummary, ExtractionSummary, FetchOutcome, PipelineConfig,
    PipelineProgressCallback, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a byte bar while a PDF downloads and a page
/// bar while its text is extracted. Manuals run one at a time, so a single
/// bar slot is enough.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn replace(&self, bar: ProgressBar) {
        if let Some(old) = self.bar.lock().unwrap().replace(bar) {
            old.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            f(bar);
        }
    }

    fn take(&self) -> Option<ProgressBar> {
        self.bar.lock().unwrap().take()
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_download_start(&self, label: &str, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.cyan} {prefix:.bold}  \
                         [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  ")
                    .tick_strings(TICKS),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {bytes}  {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_strings(TICKS),
                );
                bar
            }
        };
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.replace(bar);
    }

    fn on_download_progress(&self, downloaded: u64) {
        self.with_bar(|bar| bar.set_position(downloaded));
    }

    fn on_download_complete(&self, total_bytes: u64) {
        if let Some(bar) = self.take() {
            let label = bar.prefix();
            bar.finish_and_clear();
            eprintln!(
                "  {} {}  {}",
                green("✓"),
                label,
                dim(&format!("{total_bytes} bytes"))
            );
        }
    }

    fn on_extract_start(&self, label: &str, total_pages: usize) {
        let bar = ProgressBar::new(total_pages as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.replace(bar);
    }

    fn on_page_extracted(&self, page_num: usize, _total_pages: usize, chars: usize) {
        self.with_bar(|bar| {
            bar.set_message(format!("page {page_num}: {chars} chars"));
            bar.inc(1);
        });
    }

    fn on_extract_complete(&self, _total_pages: usize, _extracted_pages: usize) {
        if let Some(bar) = self.take() {
            bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Download every manual listed in config/manuals.json
  manual-corpus fetch

  # Re-download two manuals, with browser cookies
  manual-corpus fetch --only model_3 "Model Y" --force --headers-file headers.json

  # Extract and chunk a single manual
  manual-corpus extract --only model_s
  manual-corpus chunk --only model_s --chunk-size 600 --chunk-overlap 80

  # Build the dataset somewhere else
  manual-corpus compile --output /tmp/corpus.jsonl

  # Everything, end to end
  manual-corpus run

ON-DISK LAYOUT (under --data-dir):
  raw/<slug>.pdf                 downloaded manuals
  intermediate/<slug>.json       cleaned page texts (+ <slug>.txt dump)
  processed/<slug>.jsonl         chunks with page ranges
  compiled/manuales_compilados.jsonl

ENVIRONMENT VARIABLES:
  MANUAL_CORPUS_CONFIG    Manuals JSON (default: config/manuals.json)
  MANUAL_CORPUS_DATA_DIR  Data directory (default: data)
  TESLA_DOWNLOAD_HEADERS  JSON object of extra request headers
  PDFIUM_LIB_PATH         Path to libpdfium, or a directory containing it
  RUST_LOG                Overrides the log filter (e.g. manual_corpus=debug)
"#;

/// Download vendor PDF manuals and turn them into a JSONL corpus.
#[derive(Parser, Debug)]
#[command(
    name = "manual-corpus",
    version,
    about = "Download PDF owner's manuals and compile them into a chunked JSONL corpus",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Manuals configuration (JSON object keyed by manual id).
    #[arg(long, global = true, env = "MANUAL_CORPUS_CONFIG", default_value = "config/manuals.json")]
    config: PathBuf,

    /// Root of raw/, intermediate/, processed/ and compiled/.
    #[arg(long, global = true, env = "MANUAL_CORPUS_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MANUAL_CORPUS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MANUAL_CORPUS_QUIET")]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true, env = "MANUAL_CORPUS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download manual PDFs into <data>/raw.
    Fetch {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Extract and clean page text into <data>/intermediate.
    Extract {
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Split page text into overlapping chunks in <data>/processed.
    Chunk {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        chunk: ChunkArgs,
    },
    /// Concatenate processed chunks into the compiled dataset.
    Compile {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        compile: CompileArgs,
    },
    /// Show configured manuals and which artifacts exist.
    List {
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Fetch, extract, chunk and compile in one go.
    Run {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        chunk: ChunkArgs,
        #[command(flatten)]
        compile: CompileArgs,
    },
}

#[derive(Args, Debug, Default)]
struct SelectArgs {
    /// Manual keys, slugs or display names to process (default: all).
    #[arg(long, num_args = 1..)]
    only: Vec<String>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Download again even if the PDF already exists.
    #[arg(long)]
    force: bool,

    /// JSON file with extra request headers (cookies, user agent…).
    #[arg(long)]
    headers_file: Option<PathBuf>,

    /// Connect/read timeout in seconds.
    #[arg(long, default_value_t = 90)]
    timeout: u64,
}

#[derive(Args, Debug)]
struct ChunkArgs {
    /// Target chunk length in characters.
    #[arg(long, default_value_t = 800)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, default_value_t = 120)]
    chunk_overlap: usize,

    /// Characters of page text accumulated before a block is split.
    #[arg(long, default_value_t = 3200)]
    block_size: usize,
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Compiled dataset path (default: <data>/compiled/manuales_compilados.jsonl).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Progress bars and INFO lines fight over stderr; keep warnings only
    // while bars are drawn.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli, show_progress).await {
        eprintln!("{} {:#}", red("✘"), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, show_progress: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let quiet = cli.quiet;

    match &cli.command {
        Command::Fetch { select, fetch } => {
            let config = build_config(&cli, progress, Some(fetch), None, None)?;
            let outcomes = fetch_manuals(&config, &select.only)
                .await
                .context("Fetch failed")?;
            if !quiet {
                print_fetch(&outcomes);
            }
        }
        Command::Extract { select } => {
            let config = build_config(&cli, progress, None, None, None)?;
            let summaries = extract_manuals(&config, &select.only)
                .await
                .context("Extraction failed")?;
            if !quiet {
                print_extract(&summaries);
            }
        }
        Command::Chunk { select, chunk } => {
            let config = build_config(&cli, progress, None, Some(chunk), None)?;
            let summaries = chunk_manuals(&config, &select.only)
                .await
                .context("Chunking failed")?;
            if !quiet {
                print_chunk(&summaries);
            }
        }
        Command::Compile { select, compile } => {
            let config = build_config(&cli, progress, None, None, Some(compile))?;
            let summary = compile_manuals(&config, &select.only)
                .await
                .context("Compilation failed")?;
            if !quiet {
                print_compile(&summary);
            }
        }
        Command::List { select } => {
            let config = build_config(&cli, None, None, None, None)?;
            list(&config, &select.only)?;
        }
        Command::Run {
            select,
            fetch,
            chunk,
            compile,
        } => {
            let config = build_config(&cli, progress, Some(fetch), Some(chunk), Some(compile))?;
            let summary = run_all(&config, &select.only)
                .await
                .context("Pipeline failed")?;
            if !quiet {
                print_fetch(&summary.fetched);
                print_extract(&summary.extracted);
                print_chunk(&summary.chunked);
                print_compile(&summary.compiled);
            }
        }
    }

    Ok(())
}

/// Map global and per-stage CLI args to `PipelineConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    fetch: Option<&FetchArgs>,
    chunk: Option<&ChunkArgs>,
    compile: Option<&CompileArgs>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .data_dir(&cli.data_dir)
        .manuals_path(&cli.config);

    if let Some(fetch) = fetch {
        builder = builder.force(fetch.force).timeout_secs(fetch.timeout);
        if let Some(ref path) = fetch.headers_file {
            builder = builder.headers_file(path);
        }
    }
    if let Some(chunk) = chunk {
        builder = builder
            .chunk_size(chunk.chunk_size)
            .chunk_overlap(chunk.chunk_overlap)
            .block_threshold(chunk.block_size);
    }
    if let Some(path) = compile.and_then(|c| c.output.as_ref()) {
        builder = builder.output(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn list(config: &PipelineConfig, only: &[String]) -> Result<()> {
    let manuals = select_manuals(config, only).context("Failed to load manuals")?;
    let layout = config.layout();
    let mark = |exists: bool| if exists { green("✓") } else { dim("·") };

    println!(
        "{}",
        bold(&format!(
            "{:<14} {:<14} {:<28} raw json jsonl",
            "KEY", "SLUG", "NAME"
        ))
    );
    for manual in &manuals {
        println!(
            "{:<14} {:<14} {:<28} {}   {}    {}",
            manual.key,
            manual.slug,
            manual.display_name,
            mark(manual.raw_pdf_path(&layout).exists()),
            mark(manual.intermediate_json_path(&layout).exists()),
            mark(manual.processed_jsonl_path(&layout).exists()),
        );
    }
    eprintln!("{}", dim(&format!("{} manuals", manuals.len())));
    Ok(())
}

fn print_fetch(outcomes: &[FetchOutcome]) {
    let mut downloaded = 0;
    for outcome in outcomes {
        match outcome {
            FetchOutcome::Downloaded { path, bytes } => {
                downloaded += 1;
                eprintln!(
                    "{}  {}  {}",
                    green("✔"),
                    bold(&path.display().to_string()),
                    dim(&format!("{bytes} bytes"))
                );
            }
            FetchOutcome::Skipped { path } => {
                eprintln!("{}  {}  {}", dim("–"), path.display(), dim("already present"));
            }
        }
    }
    eprintln!(
        "{} {} downloaded, {} skipped",
        cyan("◆"),
        downloaded,
        outcomes.len() - downloaded
    );
}

fn print_extract(summaries: &[ExtractionSummary]) {
    for s in summaries {
        let icon = if s.extracted_pages == 0 {
            yellow("⚠")
        } else {
            green("✔")
        };
        eprintln!(
            "{}  {}: {}/{} pages with text  →  {}",
            icon,
            bold(&s.slug),
            s.extracted_pages,
            s.total_pages,
            s.json_path.display()
        );
    }
}

fn print_chunk(summaries: &[ChunkSummary]) {
    for s in summaries {
        eprintln!(
            "{}  {}: {} chunks from {} blocks  {}  →  {}",
            green("✔"),
            bold(&s.slug),
            s.chunks,
            s.blocks,
            dim(&format!("avg {:.0} chars", s.average_chars)),
            s.path.display()
        );
    }
}

fn print_compile(summary: &CompileSummary) {
    if !summary.skipped.is_empty() {
        eprintln!(
            "{}  skipped (no processed file): {}",
            yellow("⚠"),
            summary.skipped.join(", ")
        );
    }
    eprintln!(
        "{}  {} lines from {} files  →  {}",
        green("✔"),
        summary.lines,
        summary.files,
        bold(&summary.output.display().to_string())
    );
}

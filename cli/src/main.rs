//! Batch driver for the tomecut textbook pipeline.
//!
//! Three subcommands mirror the pipeline stages:
//!
//! - `extract` — upload a book PDF, then split it into topic, lesson, and
//!   chunk PDFs from model-provided page ranges.
//! - `cutlines` — refine chunk boundaries by locating each chunk's heading
//!   on the rendered page and re-slicing the neighbouring PDFs.
//! - `keywords` — extract per-chunk keyword lists.
//!
//! # Usage
//!
//! ```bash
//! export GEMINI_API_KEYS=key1,key2
//!
//! tomecut extract Input/Tin-hoc-10.pdf \
//!     --structure-prompt prompts/structure.txt \
//!     --chunk-prompt prompts/chunks.txt
//!
//! # Needs a build with the PaddleOCR engine:
//! #   cargo build -p tomecut-cli --features paddle
//! tomecut cutlines Output/Tin-hoc-10 \
//!     --det-model models/det.onnx \
//!     --rec-model models/rec.onnx \
//!     --char-dict models/dict.txt
//!
//! tomecut keywords Output/Tin-hoc-10 --prompt prompts/keywords.txt
//! ```
//!
//! Logging goes through `RUST_LOG` (e.g. `RUST_LOG=tomecut=info`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tomecut::cutline::CutlineConfig;
use tomecut::gemini::{DEFAULT_MODEL, KeyRing};
use tomecut::ocr::OcrEngine;
use tomecut::pdf::{PageRenderer, RendererOptions};
use tomecut::{BookWorkspace, file_stem};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Name of the key-rotation state file kept next to the output tree.
const KEY_STATE_FILE: &str = ".gemini_key_index";

/// Splits textbooks into topics, lessons, and chunks, then refines the
/// chunk boundaries.
#[derive(Parser, Debug)]
#[command(name = "tomecut", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract book structure and split it into topic, lesson, and chunk PDFs
    Extract(ExtractArgs),

    /// Refine chunk boundaries with OCR-located headings
    Cutlines(CutlinesArgs),

    /// Extract per-chunk keyword lists
    Keywords(KeywordsArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Book PDF to process
    book_pdf: PathBuf,

    /// Output root; the book workspace is created under it
    #[arg(short, long, default_value = "Output")]
    output: PathBuf,

    /// File holding the book-structure prompt
    #[arg(long, value_name = "FILE", required_unless_present = "chunks_only")]
    structure_prompt: Option<PathBuf>,

    /// File holding the chunk-list prompt; `{total_pages}` is substituted
    /// per lesson
    #[arg(long, value_name = "FILE", required_unless_present = "book_only")]
    chunk_prompt: Option<PathBuf>,

    /// Gemini model name
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Key-rotation state file (default: <output>/.gemini_key_index)
    #[arg(long, value_name = "FILE")]
    key_state: Option<PathBuf>,

    /// Re-split lessons even when their chunk PDFs already exist
    #[arg(long)]
    force: bool,

    /// Stop after the topic/lesson split
    #[arg(long, conflicts_with = "chunks_only")]
    book_only: bool,

    /// Skip the book-level split and only chunk existing lesson PDFs
    #[arg(long)]
    chunks_only: bool,
}

#[derive(Args, Debug)]
struct CutlinesArgs {
    /// Book workspace directory (e.g. Output/<book>)
    book_dir: PathBuf,

    /// Text detection model (.onnx)
    #[arg(long, value_name = "FILE")]
    det_model: PathBuf,

    /// Text recognition model (.onnx)
    #[arg(long, value_name = "FILE")]
    rec_model: PathBuf,

    /// Recognition character dictionary
    #[arg(long, value_name = "FILE")]
    char_dict: PathBuf,

    /// Text-line orientation model (.onnx)
    #[arg(long, value_name = "FILE")]
    cls_model: Option<PathBuf>,

    /// Explicit path to the pdfium dynamic library
    #[arg(long, value_name = "PATH")]
    pdfium: Option<PathBuf>,

    /// Rasterization density for chunk first pages
    #[arg(long, default_value_t = CutlineConfig::default().dpi)]
    dpi: u16,

    /// Pixels to cut above the heading's top edge
    #[arg(long, default_value_t = CutlineConfig::default().offset_px)]
    offset: i32,

    /// Minimum matched initials required for a cut
    #[arg(long, default_value_t = CutlineConfig::default().min_match_required)]
    min_match: usize,

    /// Reprocess chunks whose processed flags are already set
    #[arg(long)]
    force: bool,

    /// Compute cuts and debug artifacts but leave every PDF alone
    #[arg(long)]
    no_pdf_update: bool,

    /// Copy each PDF to `<name>.pdf.bak` before its first rewrite
    #[arg(long)]
    backup: bool,
}

#[derive(Args, Debug)]
struct KeywordsArgs {
    /// Book workspace directory (e.g. Output/<book>)
    book_dir: PathBuf,

    /// File holding the keyword prompt; `{num_keywords}` is substituted
    /// per chunk
    #[arg(long, value_name = "FILE")]
    prompt: PathBuf,

    /// Gemini model name
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Key-rotation state file (default: next to the book directory)
    #[arg(long, value_name = "FILE")]
    key_state: Option<PathBuf>,

    /// Reprocess chunks whose keywords file is already populated
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Commands::Extract(args) => cmd_extract(&args),
        Commands::Cutlines(args) => cmd_cutlines(&args),
        Commands::Keywords(args) => cmd_keywords(&args),
    }
}

fn cmd_extract(args: &ExtractArgs) -> Result<()> {
    let ring = key_ring(args.key_state.clone(), &args.output)?;

    if !args.chunks_only {
        let prompt_path = args
            .structure_prompt
            .as_deref()
            .context("--structure-prompt is required")?;
        let prompt = read_prompt(prompt_path)?;
        info!(book = %args.book_pdf.display(), "extracting book structure");
        let stage = tomecut::extract_book_structure(
            &ring,
            &args.book_pdf,
            &args.output,
            &prompt,
            &args.model,
        )?;
        println!(
            "split into {} topic and {} lesson PDFs (manifest: {})",
            stage.topics.len(),
            stage.lessons.len(),
            stage.manifest_path.display(),
        );
    }
    if args.book_only {
        return Ok(());
    }

    let prompt_path = args.chunk_prompt.as_deref().context("--chunk-prompt is required")?;
    let prompt = read_prompt(prompt_path)?;
    let ws = BookWorkspace::open(&args.output.join(file_stem(&args.book_pdf)))?;
    info!(book_dir = %ws.base_dir().display(), "splitting lessons into chunks");
    let summary = tomecut::split_book_chunks(&ring, &ws, &prompt, &args.model, !args.force)?;
    println!(
        "chunked {} lessons into {} chunk PDFs, {} lessons skipped",
        summary.lesson_count,
        summary.chunk_pdfs.len(),
        summary.skipped_lessons.len(),
    );
    for skipped in &summary.skipped_lessons {
        println!("  {}: {}", skipped.lesson.display(), skipped.reason);
    }
    Ok(())
}

fn cmd_cutlines(args: &CutlinesArgs) -> Result<()> {
    let ws = BookWorkspace::open(&args.book_dir)?;
    let config = CutlineConfig {
        dpi: args.dpi,
        offset_px: args.offset,
        min_match_required: args.min_match,
        disable_pdf_update: args.no_pdf_update,
        force_reprocess: args.force,
        make_pdf_backup: args.backup,
        ..CutlineConfig::default()
    };
    let renderer =
        PageRenderer::new(&RendererOptions { pdfium_library_path: args.pdfium.clone() });
    let engine = build_engine(args)?;

    info!(book_dir = %args.book_dir.display(), "refining chunk boundaries");
    let summary = tomecut::refine_book_cutlines(&ws, &config, &renderer, engine.as_ref())?;
    println!(
        "cutlines: {} applied, {} skipped, {} failed",
        summary.ok, summary.skip, summary.fail
    );
    if let Some(dir) = &summary.debug_example {
        println!("  debug artifacts under e.g. {}", dir.display());
    }
    Ok(())
}

fn cmd_keywords(args: &KeywordsArgs) -> Result<()> {
    let ws = BookWorkspace::open(&args.book_dir)?;
    let state_dir = args.book_dir.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let ring = key_ring(args.key_state.clone(), &state_dir)?;
    let prompt = read_prompt(&args.prompt)?;

    info!(book_dir = %args.book_dir.display(), "extracting keywords");
    let summary =
        tomecut::extract_book_keywords(&ring, &ws, &prompt, &args.model, args.force)?;
    println!(
        "keywords: {} of {} chunks written, {} skipped, {} failed ({} lessons, {} lesson metas updated)",
        summary.ok,
        summary.total_chunks,
        summary.skip,
        summary.fail,
        summary.total_lessons,
        summary.lesson_meta_written,
    );
    Ok(())
}

/// Builds the key ring, defaulting the state file to `dir`.
fn key_ring(state: Option<PathBuf>, dir: &Path) -> Result<KeyRing> {
    let state = state.unwrap_or_else(|| dir.join(KEY_STATE_FILE));
    Ok(KeyRing::from_env(state)?)
}

fn read_prompt(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt file {}", path.display()))
}

#[cfg(feature = "paddle")]
fn build_engine(args: &CutlinesArgs) -> Result<Box<dyn OcrEngine>> {
    use tomecut::ocr::{PaddleEngine, PaddleModelPaths};

    let models = PaddleModelPaths {
        det_model_path: args.det_model.to_string_lossy().into_owned(),
        rec_model_path: args.rec_model.to_string_lossy().into_owned(),
        char_dict_path: args.char_dict.to_string_lossy().into_owned(),
        cls_model_path: args.cls_model.as_ref().map(|p| p.to_string_lossy().into_owned()),
    };
    Ok(Box::new(PaddleEngine::new(&models)?))
}

#[cfg(not(feature = "paddle"))]
fn build_engine(_args: &CutlinesArgs) -> Result<Box<dyn OcrEngine>> {
    anyhow::bail!("this build has no OCR engine; rebuild with `--features paddle`")
}

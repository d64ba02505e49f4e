use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;

use mdchunk::output::{self, ChunkEntry, ChunksIndex, Meta};
use mdchunk::telemetry::{self, ctx::LogCtx, ops::run::{Phase as RunPhase, Run}};
use mdchunk::{Chunk, Chunker, Document};

use crate::setup::{self, ChunkOpts};

#[derive(Args, Debug)]
pub struct RunCmd {
    /// Directory holding markdown (and passthrough JSON) files
    #[arg(short, long, default_value = "output")] input_dir: PathBuf,
    /// Where chunk files and chunks_index.json are written
    #[arg(short, long, default_value = "output/chunks")] output_dir: PathBuf,
    /// Report what would be chunked without writing anything
    #[arg(long, default_value_t = false)] dry_run: bool,
    #[command(flatten)] opts: ChunkOpts,
}

#[derive(Debug, Default, PartialEq)]
pub struct Inputs {
    pub markdown: Vec<PathBuf>,
    pub json: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub documents: usize,
    pub failed: Vec<String>,
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub passthrough: usize,
    pub index: String,
}

pub async fn run(selector: &str, args: RunCmd) -> Result<()> {
    let log = telemetry::run();
    let _g = log.root_span_kv([
        ("input_dir", args.input_dir.display().to_string()),
        ("output_dir", args.output_dir.display().to_string()),
        ("dry_run", args.dry_run.to_string()),
        ("tokenizer", selector.to_string()),
    ]).entered();
    let t0 = Instant::now();

    let _s = log.span(&RunPhase::Discover).entered();
    let inputs = discover(&args.input_dir).await?;
    drop(_s);
    log.info(format!("📂 Found {} markdown and {} JSON file(s) in {}", inputs.markdown.len(), inputs.json.len(), args.input_dir.display()));

    let chunker = setup::build_chunker(&args.opts, selector)?;

    if args.dry_run {
        let _sp = log.span(&RunPhase::Plan).entered();
        let plan = plan(&chunker, &inputs).await?;
        for f in &plan.files {
            log.info(format!("  {}: {} tokens{}", f.file, f.tokens, if f.needs_split { " (needs splitting)" } else { "" }));
        }
        log.info("   Drop --dry-run to write chunks.");
        return log.plan(&plan, None);
    }

    let summary = process(&log, &chunker, &inputs, &args.output_dir).await?;
    log.info(format!(
        "✅ Chunking complete: documents={} chunks={} tokens={} failed={}",
        summary.documents, summary.total_chunks, summary.total_tokens, summary.failed.len()
    ));
    let meta = Meta { duration_ms: Some(t0.elapsed().as_millis()), tokenizer: Some(chunker.tokens().version().to_string()) };
    log.result(&summary, Some(meta))
}

/// Markdown and JSON files directly inside `dir`, sorted by path.
pub async fn discover(dir: &Path) -> Result<Inputs> {
    let mut rd = fs::read_dir(dir)
        .await
        .with_context(|| format!("read input dir {}", dir.display()))?;
    let mut inputs = Inputs::default();
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match extension(&path).as_deref() {
            Some("md") => inputs.markdown.push(path),
            Some("json") => inputs.json.push(path),
            _ => {}
        }
    }
    inputs.markdown.sort();
    inputs.json.sort();
    Ok(inputs)
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[derive(Debug, Serialize)]
pub struct RunPlan {
    pub max_tokens: usize,
    pub files: Vec<PlannedFile>,
    pub passthrough: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlannedFile {
    pub file: String,
    pub tokens: usize,
    pub needs_split: bool,
}

async fn plan(chunker: &Chunker, inputs: &Inputs) -> Result<RunPlan> {
    let max_tokens = chunker.config().max_tokens;
    let mut files = Vec::with_capacity(inputs.markdown.len());
    for path in &inputs.markdown {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let tokens = chunker.tokens().estimate(&text);
        files.push(PlannedFile { file: file_name(path), tokens, needs_split: tokens > max_tokens });
    }
    let passthrough = inputs.json.iter().map(|p| file_name(p)).collect();
    Ok(RunPlan { max_tokens, files, passthrough })
}

/// Chunk every markdown file, copy JSON files through, and write the index.
///
/// A document that fails is logged and skipped; filesystem errors on the output side abort.
pub async fn process(log: &LogCtx<Run>, chunker: &Chunker, inputs: &Inputs, out_dir: &Path) -> Result<RunSummary> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let mut entries: Vec<ChunkEntry> = Vec::new();
    let mut failed = Vec::new();
    for path in &inputs.markdown {
        let name = file_name(path);
        let _c = log.span(&RunPhase::Chunk).entered();
        let chunks = match chunk_file(chunker, path).await {
            Ok(chunks) => chunks,
            Err(e) => {
                log.error_kv("failed to chunk document, skipping", [("file", name.clone()), ("error", format!("{e:#}"))]);
                failed.push(name);
                continue;
            }
        };
        drop(_c);

        let _w = log.span(&RunPhase::WriteChunks).entered();
        let written = output::write_chunks(out_dir, &stem(path), &chunks).await?;
        log.info_kv(&format!("  {name} → {} chunk(s)", written.len()), [("file", name.clone()), ("chunks", written.len().to_string())]);
        entries.extend(written);
    }

    let _p = log.span(&RunPhase::Passthrough).entered();
    for path in &inputs.json {
        output::copy_passthrough(path, out_dir).await?;
    }
    drop(_p);

    let _i = log.span(&RunPhase::WriteIndex).entered();
    let index = ChunksIndex::new(entries);
    let index_path = output::write_index(out_dir, &index).await?;

    Ok(RunSummary {
        documents: inputs.markdown.len() - failed.len(),
        failed,
        total_chunks: index.total_chunks,
        total_tokens: index.total_tokens,
        passthrough: inputs.json.len(),
        index: index_path.display().to_string(),
    })
}

pub async fn chunk_file(chunker: &Chunker, path: &Path) -> Result<Vec<Chunk>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let doc = Document::new(file_name(path), text);
    Ok(chunker.chunk_document(&doc).await?)
}

pub fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

pub fn stem(path: &Path) -> String {
    path.file_stem().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "document".to_string())
}

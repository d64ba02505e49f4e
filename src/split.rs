use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use mdchunk::output::{self, Meta};
use mdchunk::telemetry::{self, ops::split::Phase as SplitPhase};

use crate::run::{chunk_file, stem};
use crate::setup::{self, ChunkOpts};

#[derive(Args, Debug)]
pub struct SplitCmd {
    /// Markdown file to chunk
    file: PathBuf,
    #[arg(short, long, default_value = "chunks")] output_dir: PathBuf,
    #[command(flatten)] opts: ChunkOpts,
}

#[derive(Debug, Serialize)]
struct SplitResult {
    file: String,
    output_dir: String,
    chunks: Vec<SplitChunk>,
}

#[derive(Debug, Serialize)]
struct SplitChunk {
    chunk_id: String,
    title: String,
    tokens: usize,
    method: &'static str,
}

pub async fn run(selector: &str, args: SplitCmd) -> Result<()> {
    let log = telemetry::split();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("output_dir", args.output_dir.display().to_string()),
        ("tokenizer", selector.to_string()),
    ]).entered();
    let t0 = Instant::now();

    if !is_markdown(&args.file) {
        bail!("expected a markdown (.md) file, got {}", args.file.display());
    }
    let chunker = setup::build_chunker(&args.opts, selector)?;

    let _s = log.span(&SplitPhase::Chunk).entered();
    let chunks = chunk_file(&chunker, &args.file).await?;
    drop(_s);

    let _w = log.span(&SplitPhase::WriteChunks).entered();
    let entries = output::write_chunks(&args.output_dir, &stem(&args.file), &chunks).await?;
    drop(_w);

    for e in &entries {
        log.info(format!("  Created: {}.md ({} tokens)", e.chunk_id, e.estimated_tokens));
    }
    log.info(format!("✅ Created {} chunk(s) in {}", entries.len(), args.output_dir.display()));

    let result = SplitResult {
        file: args.file.display().to_string(),
        output_dir: args.output_dir.display().to_string(),
        chunks: entries
            .iter()
            .zip(&chunks)
            .map(|(e, c)| SplitChunk { chunk_id: e.chunk_id.clone(), title: e.title.clone(), tokens: e.estimated_tokens, method: c.method.as_str() })
            .collect(),
    };
    let meta = Meta { duration_ms: Some(t0.elapsed().as_millis()), tokenizer: Some(chunker.tokens().version().to_string()) };
    log.result(&result, Some(meta))
}

fn is_markdown(path: &std::path::Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

//! Chunk files on disk and the `chunks_index.json` that lists them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::pipeline::Chunk;

pub const INDEX_FILE: &str = "chunks_index.json";
pub const PASSTHROUGH_DIR: &str = "passthrough";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub chunk_id: String,
    pub file_path: String,
    pub title: String,
    pub estimated_tokens: usize,
    pub source_file: String,
    pub chunking_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksIndex {
    pub created_at: DateTime<Utc>,
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub source_files: Vec<String>,
    pub chunks: Vec<ChunkEntry>,
}

impl ChunksIndex {
    /// Totals are derived from `chunks`; source files keep first-seen order.
    pub fn new(chunks: Vec<ChunkEntry>) -> Self {
        let mut source_files: Vec<String> = Vec::new();
        for c in &chunks {
            if !source_files.contains(&c.source_file) {
                source_files.push(c.source_file.clone());
            }
        }
        Self {
            created_at: Utc::now(),
            total_chunks: chunks.len(),
            total_tokens: chunks.iter().map(|c| c.estimated_tokens).sum(),
            source_files,
            chunks,
        }
    }
}

/// Write each chunk as `<stem>_chunk_NNN.md` under `out_dir`.
pub async fn write_chunks(out_dir: &Path, stem: &str, chunks: &[Chunk]) -> Result<Vec<ChunkEntry>> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let mut entries = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let chunk_id = chunk.chunk_id(stem);
        let path = out_dir.join(format!("{chunk_id}.md"));
        fs::write(&path, chunk.to_markdown())
            .await
            .with_context(|| format!("write chunk {}", path.display()))?;
        entries.push(ChunkEntry {
            chunk_id,
            file_path: path.display().to_string(),
            title: chunk.title.clone(),
            estimated_tokens: chunk.token_count,
            source_file: chunk.source_file.clone(),
            chunking_method: chunk.method.as_str().to_string(),
        });
    }
    Ok(entries)
}

pub async fn write_index(out_dir: &Path, index: &ChunksIndex) -> Result<PathBuf> {
    let path = out_dir.join(INDEX_FILE);
    let body = serde_json::to_string_pretty(index).context("serialize chunk index")?;
    fs::write(&path, body)
        .await
        .with_context(|| format!("write index {}", path.display()))?;
    Ok(path)
}

/// Copy a file byte-for-byte into `<out_dir>/passthrough/`.
pub async fn copy_passthrough(src: &Path, out_dir: &Path) -> Result<PathBuf> {
    let dir = out_dir.join(PASSTHROUGH_DIR);
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("create passthrough dir {}", dir.display()))?;
    let name = src
        .file_name()
        .with_context(|| format!("no file name in {}", src.display()))?;
    let dest = dir.join(name);
    fs::copy(src, &dest)
        .await
        .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
    Ok(dest)
}

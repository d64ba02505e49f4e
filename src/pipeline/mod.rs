pub mod assemble;
pub mod fallback;
pub mod structural;
pub mod wedge;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, Instrument};

use crate::anchor::AnchorLocator;
use crate::config::ChunkerConfig;
use crate::error::ChunkError;
use crate::markdown::{parse_sections, SectionTree};
use crate::oracle::BoundaryOracle;
use crate::tokenizer::TokenEstimator;

use self::assemble::{assemble, Draft};
use self::structural::{decompose, Fragment};
use self::wedge::Wedge;

/// One input text with a stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File name (or any identifier) recorded on every chunk.
    pub source: String,
    /// Used for chunks that have no heading of their own.
    pub title: String,
    pub text: String,
}

impl Document {
    /// Title is the file stem of `source`.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let title = Path::new(&source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.clone());
        Self { source, title, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    /// The whole document fit the budget.
    Single,
    /// Produced by heading-driven decomposition.
    Header,
    /// Produced by the rolling-window splitter.
    Llm,
}

impl ChunkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkMethod::Single => "single",
            ChunkMethod::Header => "header",
            ChunkMethod::Llm => "llm",
        }
    }
}

/// How a rolling-window chunk was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Oracle,
    Paragraph,
    Line,
    Sentence,
    /// Budget-length truncation with no natural break available.
    Hard,
    /// Remaining text fit the budget.
    End,
}

impl BoundaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::Oracle => "oracle",
            BoundaryKind::Paragraph => "paragraph",
            BoundaryKind::Line => "line",
            BoundaryKind::Sentence => "sentence",
            BoundaryKind::Hard => "hard",
            BoundaryKind::End => "end",
        }
    }
}

/// A verbatim span of a document, sized to the token budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub content: String,
    pub title: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub char_count: usize,
    pub token_count: usize,
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_level: Option<u8>,
    pub method: ChunkMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundaryKind>,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
    pub tokenizer: String,
}

impl Chunk {
    /// Content preceded by a YAML frontmatter block. Chunk numbers are 1-based.
    pub fn to_markdown(&self) -> String {
        format!(
            "---\ntitle: {}\nsource: {}\nchunk: {}\ntotal: {}\ntokens: {}\nmethod: {}\n---\n\n{}",
            yaml_quote(&self.title),
            yaml_quote(&self.source_file),
            self.chunk_index + 1,
            self.total_chunks,
            self.token_count,
            yaml_quote(self.method.as_str()),
            self.content,
        )
    }

    /// `<stem>_chunk_NNN`, unique within one document.
    pub fn chunk_id(&self, stem: &str) -> String {
        format!("{stem}_chunk_{:03}", self.chunk_index + 1)
    }
}

// JSON string syntax is valid YAML double-quoted scalar syntax.
fn yaml_quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Splits documents into budget-sized chunks.
///
/// Stateless across documents; share it behind an `Arc` to process documents concurrently.
pub struct Chunker {
    cfg: ChunkerConfig,
    tokens: TokenEstimator,
    oracle: Arc<dyn BoundaryOracle>,
    locator: AnchorLocator,
}

impl Chunker {
    pub fn new(cfg: ChunkerConfig, tokens: TokenEstimator, oracle: Arc<dyn BoundaryOracle>) -> Result<Self, ChunkError> {
        cfg.validate()?;
        let locator = AnchorLocator::from_config(&cfg);
        Ok(Self { cfg, tokens, oracle, locator })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.cfg
    }

    pub fn tokens(&self) -> &TokenEstimator {
        &self.tokens
    }

    /// Chunk one document. Empty or whitespace-only documents yield no chunks.
    pub async fn chunk_document(&self, doc: &Document) -> Result<Vec<Chunk>, ChunkError> {
        let span = info_span!("chunk_document", source = %doc.source);
        self.chunk_inner(doc).instrument(span).await
    }

    async fn chunk_inner(&self, doc: &Document) -> Result<Vec<Chunk>, ChunkError> {
        let text = doc.text.as_str();
        if text.trim().is_empty() {
            debug!("blank document, nothing to chunk");
            return Ok(Vec::new());
        }

        let budget = self.cfg.max_tokens;
        let total = self.tokens.estimate(text);
        if total <= budget {
            info!(tokens = total, budget, "document fits in a single chunk");
            let single = Draft {
                start: 0,
                end: text.len(),
                title: doc.title.clone(),
                header_level: None,
                method: ChunkMethod::Single,
                boundary: None,
            };
            return assemble(doc, vec![single], &self.tokens);
        }

        let tree = SectionTree::build(parse_sections(text, &self.tokens));
        let fragments = decompose(&tree, text, &doc.title, &self.tokens, budget);

        let wedge = Wedge {
            cfg: &self.cfg,
            tokens: &self.tokens,
            oracle: self.oracle.as_ref(),
            locator: &self.locator,
        };

        let mut drafts: Vec<Draft> = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment {
                Fragment::Final(p) => {
                    drafts.push(Draft {
                        start: p.start,
                        end: p.end,
                        title: p.title,
                        header_level: p.header_level,
                        method: ChunkMethod::Header,
                        boundary: None,
                    });
                }
                Fragment::Oversized(p) => {
                    info!(title = %p.title, tokens = self.tokens.estimate(&text[p.start..p.end]), budget, "span over budget, splitting");
                    drafts.extend(wedge.split(text, &p).await);
                }
            }
        }

        let chunks = assemble(doc, drafts, &self.tokens)?;
        info!(tokens = total, chunks = chunks.len(), "document chunked");
        Ok(chunks)
    }
}

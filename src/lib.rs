//! Token-budgeted chunking of long markdown documents.
//!
//! Documents are split along their heading structure first; spans that are still over
//! budget are cut by a boundary oracle (normally an LLM) whose suggested cut points are
//! pinned to exact offsets by fuzzy anchor matching, with deterministic fallbacks.

pub mod anchor;
pub mod config;
pub mod error;
pub mod llm;
pub mod markdown;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod telemetry;
pub mod tokenizer;

pub use config::{ChunkerConfig, ConfigError};
pub use error::ChunkError;
pub use pipeline::{Chunk, ChunkMethod, Chunker, Document};
pub use tokenizer::TokenEstimator;

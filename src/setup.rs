use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use mdchunk::llm::{OpenAiClient, OpenAiClientConfig};
use mdchunk::oracle::{BoundaryOracle, LlmOracle, NoOracle};
use mdchunk::{ChunkerConfig, Chunker, TokenEstimator};

/// Chunking knobs shared by `run` and `split`; unset flags fall back to `MDCHUNK_*` env.
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkOpts {
    /// Token budget per chunk
    #[arg(long)] pub max_tokens: Option<usize>,
    /// Anchor length (tokens) requested from the boundary oracle
    #[arg(long)] pub anchor_tokens: Option<usize>,
    /// Reject oracle cuts whose after-anchor cannot be found
    #[arg(long, default_value_t = false)] pub strict_anchors: bool,
}

impl ChunkOpts {
    pub fn config(&self) -> Result<ChunkerConfig> {
        let mut cfg = ChunkerConfig::from_env();
        if let Some(v) = self.max_tokens { cfg.max_tokens = v; }
        if let Some(v) = self.anchor_tokens { cfg.anchor_tokens = v; }
        if self.strict_anchors { cfg.strict_after_anchor = true; }
        cfg.validate().context("invalid chunker configuration")?;
        Ok(cfg)
    }
}

pub fn tokenizer(selector: &str) -> Result<TokenEstimator> {
    TokenEstimator::from_selector(selector).with_context(|| format!("load tokenizer {selector:?}"))
}

pub fn build_chunker(opts: &ChunkOpts, selector: &str) -> Result<Chunker> {
    let cfg = opts.config()?;
    let tokens = tokenizer(selector)?;
    let oracle = build_oracle(cfg.max_candidates)?;
    Ok(Chunker::new(cfg, tokens, oracle)?)
}

/// LLM-backed oracle when an API key is configured, otherwise deterministic cuts only.
fn build_oracle(max_candidates: usize) -> Result<Arc<dyn BoundaryOracle>> {
    let llm = OpenAiClientConfig::from_env();
    if !llm.has_api_key() {
        warn!("no LLM API key set (MDCHUNK_LLM_API_KEY / OPENAI_API_KEY); oversized spans use paragraph, line and sentence cuts");
        return Ok(Arc::new(NoOracle));
    }
    let client = OpenAiClient::new(llm).context("init LLM client")?;
    info!(model = client.model(), "boundary oracle ready");
    Ok(Arc::new(LlmOracle::new(Arc::new(client), max_candidates)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_env_defaults() {
        let opts = ChunkOpts { max_tokens: Some(1_234), anchor_tokens: Some(20), strict_anchors: true };
        let cfg = opts.config().unwrap();
        assert_eq!(cfg.max_tokens, 1_234);
        assert_eq!(cfg.anchor_tokens, 20);
        assert!(cfg.strict_after_anchor);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let opts = ChunkOpts { max_tokens: Some(0), ..ChunkOpts::default() };
        let err = opts.config().unwrap_err();
        assert!(format!("{err:#}").contains("invalid chunker configuration"));
    }

    #[test]
    fn unknown_tokenizer_selector_fails() {
        assert!(tokenizer("bogus:thing").is_err());
    }
}

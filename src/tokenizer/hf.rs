use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::warn;

use super::{floor_char_boundary, Vocabulary};

/// Any Hugging Face `tokenizer.json`, loaded from disk or fetched from the Hub.
#[derive(Debug, Clone)]
pub struct HfVocabulary {
    inner: Tokenizer,
    version: String,
}

impl HfVocabulary {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tok = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("load tokenizer {}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Self::with_version(tok, format!("file:{name}"))
    }

    // resolves tokenizer.json through the local HF cache, downloading on first use
    pub fn from_hub(model_id: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.model(model_id.to_string());
        let path = repo
            .get("tokenizer.json")
            .with_context(|| format!("fetch tokenizer.json for {model_id}"))?;
        let tok = Tokenizer::from_file(&path).map_err(|e| anyhow!("{}", e))?;
        Self::with_version(tok, format!("hf:{model_id}"))
    }

    fn with_version(mut tok: Tokenizer, version: String) -> Result<Self> {
        // counting must see the whole text: drop any truncation/padding baked into the file
        tok.with_truncation(None).map_err(|e| anyhow!("{}", e))?;
        tok.with_padding(None);
        Ok(Self { inner: tok, version })
    }
}

impl Vocabulary for HfVocabulary {
    fn version(&self) -> &str {
        &self.version
    }

    fn count(&self, text: &str) -> usize {
        match self.inner.encode(text, false) {
            Ok(enc) => enc.get_ids().len(),
            Err(e) => {
                warn!(error = %e, "tokenizer encode failed, using char heuristic");
                text.len().div_ceil(4)
            }
        }
    }

    fn prefix_len(&self, text: &str, max_tokens: usize) -> usize {
        let enc = match self.inner.encode(text, false) {
            Ok(enc) => enc,
            Err(e) => {
                warn!(error = %e, "tokenizer encode failed, using char heuristic");
                return floor_char_boundary(text, max_tokens.saturating_mul(4));
            }
        };
        let offsets = enc.get_offsets();
        if offsets.len() <= max_tokens {
            return text.len();
        }
        let end = offsets[..max_tokens].iter().map(|&(_, e)| e).max().unwrap_or(0);
        floor_char_boundary(text, end)
    }
}

pub mod cl100k;
pub mod hf;

use std::sync::Arc;

use anyhow::{bail, Result};

pub use cl100k::Cl100k;
pub use hf::HfVocabulary;

/// A fixed, versioned tokenizer vocabulary.
///
/// Implementations must be deterministic and count monotonically with text length.
pub trait Vocabulary: Send + Sync {
    /// Recorded on every chunk so budgets stay comparable across runs.
    fn version(&self) -> &str;

    fn count(&self, text: &str) -> usize;

    /// Byte length of the longest verbatim prefix of `text` that holds at most
    /// `max_tokens` tokens. Always lands on a char boundary.
    fn prefix_len(&self, text: &str, max_tokens: usize) -> usize;
}

/// Token accounting used by every decomposition stage.
#[derive(Clone)]
pub struct TokenEstimator {
    vocab: Arc<dyn Vocabulary>,
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator").field("vocab", &self.vocab.version()).finish()
    }
}

impl TokenEstimator {
    pub fn new<V: Vocabulary + 'static>(vocab: V) -> Self {
        Self { vocab: Arc::new(vocab) }
    }

    pub fn cl100k() -> Result<Self> {
        Ok(Self::new(Cl100k::new()?))
    }

    /// Resolve a CLI tokenizer selector: `cl100k`, `file:<tokenizer.json>`, `hf:<model-id>`.
    pub fn from_selector(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() || selector.eq_ignore_ascii_case("cl100k") || selector == "cl100k_base" {
            return Self::cl100k();
        }
        if let Some(path) = selector.strip_prefix("file:") {
            return Ok(Self::new(HfVocabulary::from_file(path)?));
        }
        if let Some(model) = selector.strip_prefix("hf:") {
            return Ok(Self::new(HfVocabulary::from_hub(model)?));
        }
        bail!("unknown tokenizer selector {selector:?} (expected cl100k, file:<path> or hf:<model>)")
    }

    pub fn version(&self) -> &str {
        self.vocab.version()
    }

    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.vocab.count(text)
    }

    pub fn fits(&self, text: &str, budget: usize) -> bool {
        self.estimate(text) <= budget
    }

    /// Verbatim prefix of `text` holding at most `max_tokens` tokens.
    pub fn truncate_to_budget<'a>(&self, text: &'a str, max_tokens: usize) -> &'a str {
        if max_tokens == 0 || text.is_empty() {
            return "";
        }
        let end = floor_char_boundary(text, self.vocab.prefix_len(text, max_tokens));
        &text[..end]
    }

    /// Token-indexed slice `[start_token, start_token + length)` and its actual length.
    pub fn window<'a>(&self, text: &'a str, start_token: usize, length: usize) -> (&'a str, usize) {
        let start = if start_token == 0 {
            0
        } else {
            self.truncate_to_budget(text, start_token).len()
        };
        let rest = &text[start..];
        let slice = self.truncate_to_budget(rest, length);
        (slice, self.estimate(slice))
    }
}

/// Largest char boundary at or below `idx`.
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// One token per character. Keeps decomposition tests fast and exact.
#[cfg(test)]
pub(crate) struct PerChar;

#[cfg(test)]
impl Vocabulary for PerChar {
    fn version(&self) -> &str {
        "per-char"
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn prefix_len(&self, text: &str, max_tokens: usize) -> usize {
        text.char_indices().nth(max_tokens).map(|(i, _)| i).unwrap_or(text.len())
    }
}

#[cfg(test)]
pub(crate) fn per_char() -> TokenEstimator {
    TokenEstimator::new(PerChar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        let est = per_char();
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.truncate_to_budget("", 10), "");
    }

    #[test]
    fn truncation_is_a_verbatim_prefix() {
        let est = per_char();
        assert_eq!(est.truncate_to_budget("héllo wörld", 4), "héll");
        assert_eq!(est.truncate_to_budget("short", 100), "short");
        assert_eq!(est.truncate_to_budget("anything", 0), "");
    }

    #[test]
    fn window_slices_by_token_index() {
        let est = per_char();
        let (w, n) = est.window("abcdefghij", 3, 4);
        assert_eq!(w, "defg");
        assert_eq!(n, 4);

        let (w, n) = est.window("abcdefghij", 8, 10);
        assert_eq!(w, "ij");
        assert_eq!(n, 2);
    }

    #[test]
    fn floor_boundary_backs_off_inside_multibyte_char() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 99), 3);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let err = TokenEstimator::from_selector("sentencepiece:foo").unwrap_err();
        assert!(format!("{err}").contains("unknown tokenizer selector"));
    }
}

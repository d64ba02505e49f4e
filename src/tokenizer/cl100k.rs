use anyhow::{Context, Result};
use tiktoken_rs::{cl100k_base, CoreBPE};

use super::Vocabulary;

/// OpenAI `cl100k_base` BPE. The vocabulary ships inside the crate, so no network.
pub struct Cl100k {
    bpe: CoreBPE,
}

impl Cl100k {
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().context("load cl100k_base vocabulary")?;
        Ok(Self { bpe })
    }
}

impl Vocabulary for Cl100k {
    fn version(&self) -> &str {
        "cl100k_base"
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn prefix_len(&self, text: &str, max_tokens: usize) -> usize {
        let ids = self.bpe.encode_ordinary(text);
        if ids.len() <= max_tokens {
            return text.len();
        }

        // a token prefix may end inside a multi-byte char; back off until it decodes
        // to a real prefix of the input that still re-encodes within budget
        let mut k = max_tokens;
        while k > 0 {
            if let Ok(prefix) = self.bpe.decode(ids[..k].to_vec()) {
                if text.starts_with(prefix.as_str()) && self.count(&prefix) <= max_tokens {
                    return prefix.len();
                }
            }
            k -= 1;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use crate::tokenizer::TokenEstimator;

    #[test]
    fn counts_are_deterministic_and_monotonic() {
        let est = TokenEstimator::cl100k().unwrap();
        let short = "The quick brown fox";
        let long = "The quick brown fox jumps over the lazy dog, twice.";
        assert_eq!(est.estimate(short), est.estimate(short));
        assert!(est.estimate(short) > 0);
        assert!(est.estimate(long) >= est.estimate(short));
        assert_eq!(est.version(), "cl100k_base");
    }

    #[test]
    fn truncation_respects_budget_and_utf8() {
        let est = TokenEstimator::cl100k().unwrap();
        let text = "Zürich 🤖 über alles — naïve café, 東京タワー, and more text here.";
        for n in 1..12 {
            let prefix = est.truncate_to_budget(text, n);
            assert!(text.starts_with(prefix));
            assert!(est.estimate(prefix) <= n, "n={n} prefix={prefix:?}");
        }
        assert_eq!(est.truncate_to_budget(text, 10_000), text);
    }
}

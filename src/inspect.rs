use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use mdchunk::markdown::{parse_sections, SectionTree};
use mdchunk::output::Meta;
use mdchunk::telemetry::{self, ops::inspect::Phase as InspectPhase};
use mdchunk::TokenEstimator;

use crate::run::file_name;
use crate::setup::{self, ChunkOpts};

#[derive(Args, Debug)]
pub struct InspectCmd {
    /// File to measure
    file: PathBuf,
    /// Skip the section outline
    #[arg(long, default_value_t = false)] no_outline: bool,
    #[command(flatten)] opts: ChunkOpts,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub chars: usize,
    pub tokens: usize,
    pub chars_per_token: f64,
    pub max_tokens: usize,
    pub needs_split: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outline: Vec<String>,
}

/// entry point for inspect
pub async fn run(selector: &str, args: InspectCmd) -> Result<()> {
    let log = telemetry::inspect();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("tokenizer", selector.to_string()),
    ]).entered();

    let _r = log.span(&InspectPhase::Read).entered();
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    drop(_r);

    let max_tokens = args.opts.config()?.max_tokens;
    let tokens = setup::tokenizer(selector)?;

    let _c = log.span(&InspectPhase::Count).entered();
    let mut report = measure(&file_name(&args.file), &text, &tokens, max_tokens);
    drop(_c);

    if !args.no_outline {
        let _o = log.span(&InspectPhase::Outline).entered();
        report.outline = SectionTree::build(parse_sections(&text, &tokens)).outline();
    }

    log.info(format!("File: {}", report.file));
    log.info(format!("  Characters: {}", report.chars));
    log.info(format!("  Tokens: {}", report.tokens));
    log.info(format!("  Ratio: {:.1} chars/token", report.chars_per_token));
    log.info(format!("  Max allowed: {} tokens", report.max_tokens));
    if report.needs_split {
        log.info("  Status: exceeds budget (needs chunking)");
    } else {
        log.info("  Status: within budget (single chunk)");
    }
    for line in &report.outline {
        log.info(format!("  {line}"));
    }

    log.result(&report, Some(Meta { duration_ms: None, tokenizer: Some(tokens.version().to_string()) }))
}

pub fn measure(file: &str, text: &str, tokens: &TokenEstimator, max_tokens: usize) -> InspectReport {
    let chars = text.chars().count();
    let count = tokens.estimate(text);
    InspectReport {
        file: file.to_string(),
        chars,
        tokens: count,
        chars_per_token: if count == 0 { 0.0 } else { chars as f64 / count as f64 },
        max_tokens,
        needs_split: count > max_tokens,
        outline: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_zero_ratio() {
        let tokens = TokenEstimator::cl100k().unwrap();
        let r = measure("empty.md", "", &tokens, 100);
        assert_eq!(r.tokens, 0);
        assert_eq!(r.chars_per_token, 0.0);
        assert!(!r.needs_split);
    }

    #[test]
    fn budget_status_follows_token_count() {
        let tokens = TokenEstimator::cl100k().unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let small = measure("fox.md", &text, &tokens, 100_000);
        assert!(!small.needs_split);
        assert!(small.chars_per_token > 1.0);

        let tight = measure("fox.md", &text, &tokens, 50);
        assert!(tight.needs_split);
        assert_eq!(tight.chars, text.chars().count());
    }

    #[test]
    fn report_omits_empty_outline() {
        let tokens = TokenEstimator::cl100k().unwrap();
        let json = serde_json::to_value(measure("a.md", "hello", &tokens, 10)).unwrap();
        assert!(json.get("outline").is_none());
        assert_eq!(json["file"], "a.md");
    }
}

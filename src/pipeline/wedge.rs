//! Oracle-guided splitting of spans that have no structure left to split on.
//!
//! A rolling window of at most `max_tokens` tokens is taken from the remaining text; the
//! oracle proposes cut points inside it, the anchor locator pins them to exact offsets, and
//! the first usable one becomes a chunk boundary. Anything the oracle cannot deliver falls
//! back to a deterministic paragraph/line/sentence cut.

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::assemble::Draft;
use super::fallback::boundary_cut;
use super::structural::Piece;
use super::{BoundaryKind, ChunkMethod};
use crate::anchor::AnchorLocator;
use crate::config::ChunkerConfig;
use crate::oracle::{BoundaryOracle, CutPoint};
use crate::tokenizer::TokenEstimator;

pub struct Wedge<'c> {
    pub cfg: &'c ChunkerConfig,
    pub tokens: &'c TokenEstimator,
    pub oracle: &'c dyn BoundaryOracle,
    pub locator: &'c AnchorLocator,
}

struct Cut {
    offset: usize,
    title: Option<String>,
    kind: BoundaryKind,
}

impl Wedge<'_> {
    /// Split `piece` of `text` into drafts that each fit the budget (hard cuts aside).
    pub async fn split(&self, text: &str, piece: &Piece) -> Vec<Draft> {
        let budget = self.cfg.max_tokens;
        let mut drafts = Vec::new();
        let mut cursor = piece.start;

        loop {
            let rest = text[cursor..piece.end].trim_start();
            cursor = piece.end - rest.len();
            if rest.is_empty() {
                break;
            }

            let part = drafts.len() + 1;
            if self.tokens.fits(rest, budget) {
                let end = cursor + rest.trim_end().len();
                drafts.push(self.draft(cursor, end, piece, part, None, BoundaryKind::End));
                break;
            }

            let cut = self.next_cut(rest).await;
            let end = cursor + rest[..cut.offset].trim_end().len();
            debug!(part, chars = end - cursor, kind = cut.kind.as_str(), "wedge cut");
            drafts.push(self.draft(cursor, end, piece, part, cut.title, cut.kind));
            cursor += cut.offset;
        }

        info!(title = %piece.title, parts = drafts.len(), "split oversized span");
        drafts
    }

    async fn next_cut(&self, rest: &str) -> Cut {
        let mut window = self.tokens.truncate_to_budget(rest, self.cfg.max_tokens);
        if window.is_empty() {
            // a single character that alone exceeds the budget
            let first = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            window = &rest[..first];
        }

        for candidate in self.consult(window).await {
            match self.resolve(&candidate, rest, window) {
                Some(offset) => {
                    let title = Some(candidate.title).filter(|t| !t.trim().is_empty());
                    return Cut { offset, title, kind: BoundaryKind::Oracle };
                }
                None => debug!(title = %candidate.title, "candidate cut rejected"),
            }
        }

        let (offset, kind) = boundary_cut(window, self.cfg.min_cut_position);
        Cut { offset, title: None, kind }
    }

    /// Oracle candidates, best first. Failures and timeouts yield none.
    async fn consult(&self, window: &str) -> Vec<CutPoint> {
        match timeout(self.cfg.oracle_timeout, self.oracle.suggest_cuts(window, self.cfg.anchor_tokens)).await {
            Ok(Ok(mut cuts)) => {
                cuts.truncate(self.cfg.max_candidates);
                cuts
            }
            Ok(Err(err)) => {
                warn!(error = %err, "boundary oracle failed, using fallback cut");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout_secs = self.cfg.oracle_timeout.as_secs(), "boundary oracle timed out, using fallback cut");
                Vec::new()
            }
        }
    }

    /// Exact offset of a candidate cut in `rest`, if it is usable.
    ///
    /// The cut must leave at least `min_cut_position` characters before it, lie strictly
    /// inside `rest`, and keep the prefix within budget.
    fn resolve(&self, candidate: &CutPoint, rest: &str, window: &str) -> Option<usize> {
        let offset = self.locator.locate_cut(&candidate.before_anchor, &candidate.after_anchor, rest, 0)?;
        if offset == 0 || offset >= rest.len() {
            return None;
        }
        if rest[..offset].chars().count() < self.cfg.min_cut_position {
            debug!(offset, min = self.cfg.min_cut_position, "cut too close to window start");
            return None;
        }
        if offset > window.len() && !self.tokens.fits(rest[..offset].trim_end(), self.cfg.max_tokens) {
            debug!(offset, window = window.len(), "cut lies past the budget");
            return None;
        }
        Some(offset)
    }

    fn draft(&self, start: usize, end: usize, piece: &Piece, part: usize, title: Option<String>, kind: BoundaryKind) -> Draft {
        let title = title.unwrap_or_else(|| part_title(&piece.title, part));
        Draft {
            start,
            end,
            title,
            header_level: piece.header_level,
            method: ChunkMethod::Llm,
            boundary: Some(kind),
        }
    }
}

fn part_title(base: &str, part: usize) -> String {
    if base.trim().is_empty() {
        format!("Part {part}")
    } else {
        format!("{base} (Part {part})")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::oracle::testing::{cut, FailingOracle, FractionOracle, ScriptedOracle, StallingOracle};
    use crate::tokenizer::per_char;

    fn cfg(max_tokens: usize) -> ChunkerConfig {
        ChunkerConfig { max_tokens, ..ChunkerConfig::default() }
    }

    fn paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| format!("Paragraph {i:04} carries some filler text so that it has a reasonable length."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn split_with(oracle: &dyn BoundaryOracle, text: &str, cfg: &ChunkerConfig) -> Vec<Draft> {
        let tokens = per_char();
        let locator = AnchorLocator::from_config(cfg);
        let wedge = Wedge { cfg, tokens: &tokens, oracle, locator: &locator };
        let piece = Piece { start: 0, end: text.len(), title: "doc".into(), header_level: None };
        wedge.split(text, &piece).await
    }

    fn assert_covers(text: &str, drafts: &[Draft]) {
        assert!(crate::pipeline::assemble::check_coverage(text, drafts).is_ok());
    }

    #[tokio::test]
    async fn failing_oracle_falls_back_to_paragraph_cuts() {
        let text = paragraphs(60);
        let cfg = cfg(1_000);
        let drafts = split_with(&FailingOracle, &text, &cfg).await;

        assert!(drafts.len() >= 5);
        assert_covers(&text, &drafts);
        for d in &drafts {
            assert!(text[d.start..d.end].chars().count() <= 1_000);
            assert!(d.title.starts_with("doc (Part "));
        }
        assert!(drafts[..drafts.len() - 1].iter().all(|d| d.boundary == Some(BoundaryKind::Paragraph)));
        assert_eq!(drafts.last().unwrap().boundary, Some(BoundaryKind::End));
    }

    #[tokio::test]
    async fn oracle_cuts_are_used_with_their_titles() {
        let text = paragraphs(60);
        let cfg = cfg(1_000);
        let drafts = split_with(&FractionOracle::middle(), &text, &cfg).await;

        assert_covers(&text, &drafts);
        assert!(drafts.len() >= 8);
        assert_eq!(drafts[0].boundary, Some(BoundaryKind::Oracle));
        assert!(drafts[0].title.starts_with("Cut at "));
        assert_eq!(drafts[0].method, ChunkMethod::Llm);
    }

    #[tokio::test]
    async fn cut_too_close_to_start_is_rejected() {
        let text = paragraphs(60);
        let head: String = text.chars().take(10).collect();
        let after: String = text.chars().skip(10).take(30).collect();
        let oracle = ScriptedOracle::new(vec![vec![cut(&head, &after, "Too early")]]);
        let cfg = cfg(1_000);
        let drafts = split_with(&oracle, &text, &cfg).await;

        assert!(drafts[0].end - drafts[0].start > 100);
        assert_ne!(drafts[0].boundary, Some(BoundaryKind::Oracle));
        assert_eq!(drafts[0].title, "doc (Part 1)");
        assert_covers(&text, &drafts);
    }

    #[tokio::test]
    async fn later_candidate_is_tried_when_first_is_unusable() {
        let text = paragraphs(60);
        let good_before = "Paragraph 0005 carries some filler text so that it has a reasonable length.";
        let oracle = ScriptedOracle::new(vec![vec![
            cut("no such text anywhere in the document at all", "nothing", "Bad"),
            cut(good_before, "Paragraph 0006", "Good"),
        ]]);
        let cfg = cfg(1_000);
        let drafts = split_with(&oracle, &text, &cfg).await;

        assert_eq!(drafts[0].title, "Good");
        assert!(text[drafts[0].start..drafts[0].end].ends_with(good_before));
    }

    #[tokio::test]
    async fn strict_cut_keeps_after_anchor_running_past_the_window() {
        let text = paragraphs(60);
        let before = &text[920..980];
        let after = &text[980..1_040];
        let oracle = ScriptedOracle::new(vec![vec![cut(before, after, "Boundary")]]);
        let cfg = ChunkerConfig { strict_after_anchor: true, ..cfg(1_000) };
        let drafts = split_with(&oracle, &text, &cfg).await;

        assert_eq!(oracle.windows.lock().unwrap()[0], 1_000);
        assert_eq!(drafts[0].title, "Boundary");
        assert_eq!(drafts[0].end, 980);
        assert_eq!(drafts[0].boundary, Some(BoundaryKind::Oracle));
        assert_covers(&text, &drafts);
    }

    #[tokio::test]
    async fn cut_beyond_the_window_is_rejected_for_budget() {
        let text = paragraphs(60);
        let before = &text[1_140..1_200];
        let after = &text[1_200..1_240];
        let oracle = ScriptedOracle::new(vec![vec![cut(before, after, "Too far")]]);
        let drafts = split_with(&oracle, &text, &cfg(1_000)).await;

        assert_ne!(drafts[0].title, "Too far");
        assert_eq!(drafts[0].boundary, Some(BoundaryKind::Paragraph));
        assert!(drafts[0].end - drafts[0].start <= 1_000);
        assert!(oracle.windows.lock().unwrap().iter().all(|&w| w <= 1_000));
        assert_covers(&text, &drafts);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_oracle_times_out_into_fallback() {
        let text = paragraphs(20);
        let cfg = ChunkerConfig { oracle_timeout: Duration::from_secs(5), ..cfg(500) };
        let drafts = split_with(&StallingOracle, &text, &cfg).await;
        assert!(drafts.len() >= 3);
        assert_covers(&text, &drafts);
    }

    #[tokio::test]
    async fn unbroken_text_is_hard_cut_within_budget() {
        let text = "x".repeat(2_500);
        let drafts = split_with(&FailingOracle, &text, &cfg(1_000)).await;
        let sizes: Vec<usize> = drafts.iter().map(|d| d.end - d.start).collect();
        assert_eq!(sizes, vec![1_000, 1_000, 500]);
        assert_eq!(drafts[0].boundary, Some(BoundaryKind::Hard));
    }

    #[test]
    fn part_titles_fall_back_to_bare_numbers() {
        assert_eq!(part_title("Guide", 2), "Guide (Part 2)");
        assert_eq!(part_title("", 3), "Part 3");
    }
}

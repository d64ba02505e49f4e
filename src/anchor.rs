//! Approximate anchor matching.
//!
//! Oracle anchors are model output and rarely match the source byte-for-byte. They are
//! resolved with an edit-distance alignment: the needle is aligned against every substring
//! of a bounded region of the haystack, and the best position is accepted only when its
//! normalized similarity clears the configured threshold.

use tracing::{debug, warn};

use crate::config::ChunkerConfig;
use crate::tokenizer::floor_char_boundary;

const MAX_PROBE_HITS: usize = 16;
const MAX_REGIONS: usize = 32;
const REGION_PAD: usize = 64;
const AFTER_LOOKAHEAD: usize = 100;

/// A resolved anchor, in byte offsets relative to the searched text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorMatch {
    pub start: usize,
    pub end: usize,
    pub distance: usize,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct AnchorLocator {
    threshold: f64,
    search_span: usize,
    after_slack: usize,
    strict: bool,
}

impl AnchorLocator {
    pub fn new(threshold: f64, search_span: usize, after_slack: usize) -> Self {
        Self { threshold, search_span, after_slack, strict: false }
    }

    pub fn from_config(cfg: &ChunkerConfig) -> Self {
        Self::new(cfg.similarity_threshold, cfg.anchor_search_span, cfg.after_anchor_slack)
            .strict(cfg.strict_after_anchor)
    }

    /// When set, a cut whose after-anchor cannot be verified is dropped instead of kept.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Start offset of the best match of `needle` in `haystack`, if similar enough.
    pub fn locate(&self, needle: &str, haystack: &str) -> Option<usize> {
        self.find(needle, haystack).map(|m| m.start)
    }

    pub fn find(&self, needle: &str, haystack: &str) -> Option<AnchorMatch> {
        if needle.is_empty() || haystack.is_empty() {
            return None;
        }
        if let Some(p) = haystack.find(needle) {
            return Some(AnchorMatch { start: p, end: p + needle.len(), distance: 0, similarity: 1.0 });
        }

        let needle_chars: Vec<char> = needle.chars().collect();
        let mut best: Option<AnchorMatch> = None;
        for (lo, hi) in self.candidate_regions(needle, needle_chars.len(), haystack) {
            let Some(m) = align(&needle_chars, &haystack[lo..hi]) else { continue };
            let m = AnchorMatch { start: m.start + lo, end: m.end + lo, ..m };
            if best.is_none_or(|b| m.distance < b.distance) {
                best = Some(m);
            }
        }

        let best = best?;
        if best.similarity > self.threshold {
            debug!(position = best.start, distance = best.distance, similarity = best.similarity, "anchor matched");
            Some(best)
        } else {
            None
        }
    }

    /// Byte offset in `text` at which to cut, given the anchors around the cut.
    ///
    /// The cut sits right after the `before` match. `after` is then checked to start within
    /// the slack window; if it does not, the cut is still returned unless strict.
    pub fn locate_cut(&self, before: &str, after: &str, text: &str, search_start: usize) -> Option<usize> {
        let search_start = floor_char_boundary(text, search_start);
        let before = before.trim();
        if before.is_empty() {
            return None;
        }

        let Some(m) = self.find(before, &text[search_start..]) else {
            warn!(needle = %preview(before), "could not find tokens_before in text");
            return None;
        };
        let cut = search_start + m.end;

        let after = after.trim();
        if after.is_empty() {
            return Some(cut);
        }

        let lookahead = after.chars().count() + self.after_slack + AFTER_LOOKAHEAD;
        let region_end = text[cut..].char_indices().nth(lookahead).map(|(i, _)| cut + i).unwrap_or(text.len());
        let region = &text[cut..region_end];

        let verified = self
            .find(after, region)
            .is_some_and(|a| region[..a.start].chars().count() <= self.after_slack);
        if !verified {
            warn!(expected_pos = cut, strict = self.strict, "tokens_after not found at expected position");
            if self.strict {
                return None;
            }
        }
        Some(cut)
    }

    // Bounded byte ranges worth aligning against: neighbourhoods of exact probe hits,
    // or the head of the haystack when no probe occurs anywhere.
    fn candidate_regions(&self, needle: &str, needle_len: usize, haystack: &str) -> Vec<(usize, usize)> {
        let span = self.search_span.max(needle_len * 2);
        let reach = needle.len() + REGION_PAD;

        let mut regions: Vec<(usize, usize)> = Vec::new();
        for probe in probes(needle, needle_len) {
            // a probe that occurs everywhere says nothing about where the needle is
            if haystack.match_indices(probe).take(MAX_PROBE_HITS + 1).count() > MAX_PROBE_HITS {
                continue;
            }
            for (p, _) in haystack.match_indices(probe) {
                let lo = floor_char_boundary(haystack, p.saturating_sub(reach));
                let hi = ceil_char_boundary(haystack, (p + reach + probe.len()).min(lo + span * 4));
                regions.push((lo, hi));
            }
        }

        if regions.is_empty() {
            let head = haystack.char_indices().nth(span).map(|(i, _)| i).unwrap_or(haystack.len());
            return vec![(0, head)];
        }

        regions.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(regions.len());
        for (lo, hi) in regions {
            match merged.last_mut() {
                Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        merged.truncate(MAX_REGIONS);
        merged
    }
}

// Short exact substrings tiling the needle, plus its tail.
fn probes(needle: &str, needle_len: usize) -> Vec<&str> {
    if needle_len < 6 {
        return Vec::new();
    }
    let q = (needle_len / 6).clamp(6, 16);
    let offsets: Vec<usize> = needle.char_indices().map(|(i, _)| i).collect();
    let slice = |from: usize| -> &str {
        let start = offsets[from];
        let end = offsets.get(from + q).copied().unwrap_or(needle.len());
        &needle[start..end]
    };

    let mut starts: Vec<usize> = (0..=needle_len - q).step_by(q).collect();
    starts.push(needle_len - q);
    starts.dedup();
    starts
        .into_iter()
        .map(slice)
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// Minimum edit distance between `needle` and any substring of `hay`.
///
/// Semi-global alignment: the needle must be consumed entirely, the haystack may be
/// entered and left anywhere. Returns byte offsets into `hay`.
fn align(needle: &[char], hay: &str) -> Option<AnchorMatch> {
    let hay_idx: Vec<(usize, char)> = hay.char_indices().collect();
    let m = needle.len();
    let n = hay_idx.len();
    if m == 0 || n == 0 {
        return None;
    }

    // (distance, start column) per column; row 0 lets the match begin anywhere
    let mut prev: Vec<(usize, usize)> = (0..=n).map(|j| (0, j)).collect();
    let mut cur: Vec<(usize, usize)> = vec![(0, 0); n + 1];

    for (i, &nc) in needle.iter().enumerate() {
        cur[0] = (i + 1, 0);
        for j in 1..=n {
            let cost = usize::from(hay_idx[j - 1].1 != nc);
            let diag = (prev[j - 1].0 + cost, prev[j - 1].1);
            let up = (prev[j].0 + 1, prev[j].1);
            let left = (cur[j - 1].0 + 1, cur[j - 1].1);
            let mut best = diag;
            if up.0 < best.0 {
                best = up;
            }
            if left.0 < best.0 {
                best = left;
            }
            cur[j] = best;
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    // ties go to the match closest in length to the needle, then the leftmost
    let (end_col, &(distance, start_col)) = prev
        .iter()
        .enumerate()
        .skip(1)
        .min_by_key(|&(j, &(d, s))| (d, (j - s).abs_diff(m), j))?;

    let byte_at = |col: usize| hay_idx.get(col).map(|&(b, _)| b).unwrap_or(hay.len());
    let matched = end_col - start_col;
    let similarity = 1.0 - distance as f64 / m.max(matched) as f64;
    Some(AnchorMatch {
        start: byte_at(start_col),
        end: byte_at(end_col),
        distance,
        similarity,
    })
}

fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn preview(s: &str) -> String {
    s.chars().take(50).collect()
}

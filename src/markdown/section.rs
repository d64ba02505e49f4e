use regex::Regex;
use std::sync::LazyLock;

use crate::tokenizer::TokenEstimator;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})[ \t]+(\S.*)$").expect("heading pattern compiles")
});

/// A heading-delimited span of a document.
///
/// `start..body_end` is the section's own text (heading up to the next heading of any
/// level); these spans tile the document. `start..end` additionally covers every nested
/// subsection, i.e. it runs until the next heading of the same or a shallower level.
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    /// 1-6 for headings, 0 for text before the first heading.
    pub level: u8,
    pub title: &'a str,
    pub content: &'a str,
    pub start: usize,
    pub end: usize,
    pub body_end: usize,
    pub token_count: usize,
}

impl Section<'_> {
    pub fn is_heading(&self) -> bool {
        self.level > 0
    }
}

struct Heading<'a> {
    start: usize,
    level: u8,
    title: &'a str,
}

/// Split `text` into ordered sections. Headings inside fenced code blocks are ignored.
pub fn parse_sections<'a>(text: &'a str, tokens: &TokenEstimator) -> Vec<Section<'a>> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let headings = scan_headings(text);
    if headings.is_empty() {
        return vec![Section {
            level: 0,
            title: "",
            content: text,
            start: 0,
            end: text.len(),
            body_end: text.len(),
            token_count: tokens.estimate(text),
        }];
    }

    let mut sections = Vec::with_capacity(headings.len() + 1);
    if headings[0].start > 0 {
        let pre = &text[..headings[0].start];
        sections.push(Section {
            level: 0,
            title: "",
            content: pre,
            start: 0,
            end: pre.len(),
            body_end: pre.len(),
            token_count: tokens.estimate(pre),
        });
    }

    // subtree end = start of the next heading at the same or a shallower level
    let mut ends = vec![text.len(); headings.len()];
    let mut open: Vec<usize> = Vec::new();
    for (j, h) in headings.iter().enumerate() {
        while let Some(&i) = open.last() {
            if headings[i].level >= h.level {
                ends[i] = h.start;
                open.pop();
            } else {
                break;
            }
        }
        open.push(j);
    }

    for (i, h) in headings.iter().enumerate() {
        let body_end = headings.get(i + 1).map(|n| n.start).unwrap_or(text.len());
        let content = &text[h.start..ends[i]];
        sections.push(Section {
            level: h.level,
            title: h.title,
            content,
            start: h.start,
            end: ends[i],
            body_end,
            token_count: tokens.estimate(content),
        });
    }

    tracing::debug!(count = sections.len(), "parsed markdown sections");
    sections
}

fn scan_headings(text: &str) -> Vec<Heading<'_>> {
    let mut out = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut offset = 0usize;

    for raw in text.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);

        if let Some(marker) = fence_marker(line) {
            match fence {
                None => fence = Some(marker),
                Some((ch, len)) if marker.0 == ch && marker.1 >= len => fence = None,
                Some(_) => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len() as u8;
            let title = caps.get(2).map(|m| strip_closing_hashes(m.as_str())).unwrap_or("");
            out.push(Heading { start: line_start, level, title });
        }
    }
    out
}

// ``` or ~~~ (three or more), indented by at most three spaces
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let run = rest.chars().take_while(|&c| c == ch).count();
    (run >= 3).then_some((ch, run))
}

fn strip_closing_hashes(title: &str) -> &str {
    let t = title.trim_end();
    let without = t.trim_end_matches('#');
    if without.len() < t.len() && (without.is_empty() || without.ends_with([' ', '\t'])) {
        let stripped = without.trim_end();
        if !stripped.is_empty() {
            return stripped;
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::per_char;

    #[test]
    fn empty_document_has_no_sections() {
        let tok = per_char();
        assert!(parse_sections("", &tok).is_empty());
        assert!(parse_sections("  \n\n ", &tok).is_empty());
    }

    #[test]
    fn headerless_document_is_one_level_zero_section() {
        let tok = per_char();
        let text = "just some prose\nwith two lines";
        let sections = parse_sections(text, &tok);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].title, "");
        assert_eq!(sections[0].content, text);
        assert_eq!(sections[0].token_count, text.chars().count());
    }

    #[test]
    fn preamble_becomes_level_zero() {
        let tok = per_char();
        let text = "preamble\n# Title\nbody\n";
        let sections = parse_sections(text, &tok);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].content, "preamble\n");
        assert_eq!(sections[1].level, 1);
        assert_eq!(sections[1].title, "Title");
        assert_eq!(sections[1].content, "# Title\nbody\n");
    }

    #[test]
    fn own_bodies_tile_the_document() {
        let tok = per_char();
        let text = "intro\n# A\na\n## B\nb\n### C\nc\n## D\nd\n# E\ne";
        let sections = parse_sections(text, &tok);
        let mut cursor = 0;
        for s in &sections {
            assert_eq!(s.start, cursor);
            cursor = s.body_end;
        }
        assert_eq!(cursor, text.len());
    }

    #[test]
    fn content_spans_until_sibling_or_ancestor() {
        let tok = per_char();
        let text = "# A\na\n## B\nb\n### C\nc\n## D\nd\n# E\ne";
        let sections = parse_sections(text, &tok);
        let by_title = |t: &str| sections.iter().find(|s| s.title == t).unwrap().content;
        assert_eq!(by_title("A"), "# A\na\n## B\nb\n### C\nc\n## D\nd\n");
        assert_eq!(by_title("B"), "## B\nb\n### C\nc\n");
        assert_eq!(by_title("C"), "### C\nc\n");
        assert_eq!(by_title("D"), "## D\nd\n");
        assert_eq!(by_title("E"), "# E\ne");
    }

    #[test]
    fn hashes_need_whitespace_and_code_fences_are_skipped() {
        let tok = per_char();
        let text = "# Real\n#hashtag line\n```bash\n# not a heading\n```\n####### seven\n## Closed ##\n";
        let sections = parse_sections(text, &tok);
        let titles: Vec<_> = sections.iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Real", "Closed"]);
    }

    #[test]
    fn crlf_lines_are_recognised() {
        let tok = per_char();
        let text = "# One\r\nbody\r\n## Two\r\nmore\r\n";
        let sections = parse_sections(text, &tok);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "One");
        assert_eq!(sections[1].title, "Two");
        assert_eq!(sections[1].level, 2);
    }
}

//! Heading-driven decomposition: peel a section into its introduction and children until
//! every piece fits the budget or cannot be split structurally any further.

use tracing::debug;

use crate::markdown::{NodeId, SectionTree};
use crate::tokenizer::TokenEstimator;

/// A byte span of the document with the title it will carry as a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub start: usize,
    pub end: usize,
    pub title: String,
    pub header_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Fits the budget; becomes a chunk as is.
    Final(Piece),
    /// Still over budget with no headings left to split on.
    Oversized(Piece),
}

impl Fragment {
    pub fn piece(&self) -> &Piece {
        match self {
            Fragment::Final(p) | Fragment::Oversized(p) => p,
        }
    }

    pub fn is_oversized(&self) -> bool {
        matches!(self, Fragment::Oversized(_))
    }
}

/// Walk the tree depth-first and emit fragments in document order.
///
/// `doc_title` names fragments that have no heading of their own. Blank spans are skipped
/// and every emitted span is trimmed of surrounding whitespace.
pub fn decompose(
    tree: &SectionTree<'_>,
    text: &str,
    doc_title: &str,
    tokens: &TokenEstimator,
    budget: usize,
) -> Vec<Fragment> {
    let mut walker = Walker { tree, text, doc_title, tokens, budget, out: Vec::new() };
    for &root in tree.roots() {
        walker.visit(root);
    }
    let out = walker.out;
    debug!(
        fragments = out.len(),
        oversized = out.iter().filter(|f| f.is_oversized()).count(),
        "structural decomposition done"
    );
    out
}

struct Walker<'t, 'a> {
    tree: &'t SectionTree<'a>,
    text: &'t str,
    doc_title: &'t str,
    tokens: &'t TokenEstimator,
    budget: usize,
    out: Vec<Fragment>,
}

impl Walker<'_, '_> {
    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        let s = &node.section;
        let level = s.is_heading().then_some(s.level);
        let own_title = if s.title.is_empty() { self.doc_title } else { s.title };

        if s.token_count <= self.budget {
            self.push(s.start, s.end, own_title.to_string(), level, false);
            return;
        }

        let Some(&first) = node.children.first() else {
            self.push(s.start, s.end, own_title.to_string(), level, true);
            return;
        };

        let intro_end = tree.node(first).section.start;
        let title = if s.title.is_empty() {
            "Introduction".to_string()
        } else {
            format!("{} (Introduction)", s.title)
        };
        let oversized = !self.tokens.fits(&self.text[s.start..intro_end], self.budget);
        self.push(s.start, intro_end, title, level, oversized);

        for &child in &node.children {
            self.visit(child);
        }
    }

    fn push(&mut self, start: usize, end: usize, title: String, header_level: Option<u8>, oversized: bool) {
        let Some((start, end)) = trimmed_span(self.text, start, end) else { return };
        let piece = Piece { start, end, title, header_level };
        self.out.push(if oversized { Fragment::Oversized(piece) } else { Fragment::Final(piece) });
    }
}

/// Narrow `start..end` to its non-whitespace content. `None` when blank.
pub fn trimmed_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    Some((start + lead, start + lead + trimmed.len()))
}

use super::section::Section;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct SectionNode<'a> {
    pub section: Section<'a>,
    pub children: Vec<NodeId>,
}

/// Heading hierarchy stored as an arena; children are indices into `nodes`.
#[derive(Debug, Clone, Default)]
pub struct SectionTree<'a> {
    nodes: Vec<SectionNode<'a>>,
    roots: Vec<NodeId>,
}

impl<'a> SectionTree<'a> {
    /// Nest each heading under the nearest preceding open heading of a lower level.
    /// Level-0 sections are always roots.
    pub fn build(sections: Vec<Section<'a>>) -> Self {
        let mut tree = SectionTree {
            nodes: Vec::with_capacity(sections.len()),
            roots: Vec::new(),
        };
        let mut stack: Vec<(u8, NodeId)> = Vec::new();

        for section in sections {
            let level = section.level;
            let id = tree.nodes.len();
            tree.nodes.push(SectionNode { section, children: Vec::new() });

            if level == 0 {
                tree.roots.push(id);
                continue;
            }

            while stack.last().is_some_and(|&(open, _)| open >= level) {
                stack.pop();
            }
            match stack.last() {
                Some(&(_, parent)) => tree.nodes[parent].children.push(id),
                None => tree.roots.push(id),
            }
            stack.push((level, id));
        }
        tree
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &SectionNode<'a> {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, children in source order. Matches document order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    /// Indented outline with per-node token counts, used by `inspect`.
    pub fn outline(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            self.outline_into(root, 0, &mut lines);
        }
        lines
    }

    fn outline_into(&self, id: NodeId, depth: usize, lines: &mut Vec<String>) {
        let s = &self.nodes[id].section;
        let label = if s.is_heading() {
            format!("{} {}", "#".repeat(s.level as usize), s.title)
        } else {
            "(preamble)".to_string()
        };
        lines.push(format!("{}{} [{} tokens]", "  ".repeat(depth), label, s.token_count));
        for &child in &self.nodes[id].children {
            self.outline_into(child, depth + 1, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse_sections;
    use crate::tokenizer::per_char;

    fn titles(tree: &SectionTree<'_>, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree.node(id).section.title.to_string()).collect()
    }

    #[test]
    fn siblings_nest_under_parent_in_order() {
        let tok = per_char();
        let tree = SectionTree::build(parse_sections("# A\n## B\ntext\n## C\ntext", &tok));
        assert_eq!(titles(&tree, tree.roots()), vec!["A"]);
        let a = tree.roots()[0];
        assert_eq!(titles(&tree, &tree.node(a).children), vec!["B", "C"]);
    }

    #[test]
    fn skipped_levels_attach_to_nearest_open_ancestor() {
        let tok = per_char();
        let text = "# A\n### deep\n## mid\n#### deeper\n# Z\n";
        let tree = SectionTree::build(parse_sections(text, &tok));
        assert_eq!(titles(&tree, tree.roots()), vec!["A", "Z"]);
        let a = tree.roots()[0];
        assert_eq!(titles(&tree, &tree.node(a).children), vec!["deep", "mid"]);
        let mid = tree.node(a).children[1];
        assert_eq!(titles(&tree, &tree.node(mid).children), vec!["deeper"]);
    }

    #[test]
    fn leading_subheading_becomes_root() {
        let tok = per_char();
        let text = "pre\n## first\n# second\n";
        let tree = SectionTree::build(parse_sections(text, &tok));
        let levels: Vec<u8> = tree.roots().iter().map(|&id| tree.node(id).section.level).collect();
        assert_eq!(levels, vec![0, 2, 1]);
    }

    #[test]
    fn preorder_recovers_document_order() {
        let tok = per_char();
        let text = "intro\n# A\n## B\n### C\n## D\n# E\n## F\n";
        let tree = SectionTree::build(parse_sections(text, &tok));
        let starts: Vec<usize> = tree.preorder().iter().map(|&id| tree.node(id).section.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(starts.len(), tree.len());
    }

    #[test]
    fn outline_indents_children() {
        let tok = per_char();
        let tree = SectionTree::build(parse_sections("# A\nx\n## B\ny\n", &tok));
        let lines = tree.outline();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("# A ["));
        assert!(lines[1].starts_with("  ## B ["));
    }
}

use tracing::error;

use super::{BoundaryKind, Chunk, ChunkMethod, Document};
use crate::error::ChunkError;
use crate::tokenizer::TokenEstimator;

/// A chunk before numbering: a span of the document plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub start: usize,
    pub end: usize,
    pub title: String,
    pub header_level: Option<u8>,
    pub method: ChunkMethod,
    pub boundary: Option<BoundaryKind>,
}

/// Check that `drafts` tile `text` and turn them into numbered chunks.
pub fn assemble(doc: &Document, drafts: Vec<Draft>, tokens: &TokenEstimator) -> Result<Vec<Chunk>, ChunkError> {
    if let Err(detail) = check_coverage(&doc.text, &drafts) {
        error!(source = %doc.source, %detail, "chunks do not cover the document");
        return Err(ChunkError::Coverage { source: doc.source.clone(), detail });
    }

    let total = drafts.len();
    let chunks = drafts
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            let content = doc.text[d.start..d.end].to_string();
            Chunk {
                char_count: content.chars().count(),
                token_count: tokens.estimate(&content),
                content,
                title: d.title,
                chunk_index: i,
                total_chunks: total,
                source_file: doc.source.clone(),
                header_level: d.header_level,
                method: d.method,
                boundary: d.boundary,
                start: d.start,
                end: d.end,
                tokenizer: tokens.version().to_string(),
            }
        })
        .collect();
    Ok(chunks)
}

/// Spans must be in order, non-empty, non-overlapping, on char boundaries, and separated
/// only by whitespace.
pub fn check_coverage(text: &str, drafts: &[Draft]) -> Result<(), String> {
    let mut cursor = 0usize;
    for (i, d) in drafts.iter().enumerate() {
        if d.start >= d.end || d.end > text.len() {
            return Err(format!("chunk {i} has invalid span {}..{}", d.start, d.end));
        }
        if d.start < cursor {
            return Err(format!("chunk {i} starts at {} before the previous end {cursor}", d.start));
        }
        if !text.is_char_boundary(d.start) || !text.is_char_boundary(d.end) {
            return Err(format!("chunk {i} span {}..{} splits a character", d.start, d.end));
        }
        if !text[cursor..d.start].trim().is_empty() {
            return Err(format!("text between {cursor} and {} is not covered", d.start));
        }
        cursor = d.end;
    }
    if !text[cursor..].trim().is_empty() {
        return Err(format!("text after {cursor} is not covered"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::per_char;

    fn draft(start: usize, end: usize) -> Draft {
        Draft {
            start,
            end,
            title: format!("{start}"),
            header_level: None,
            method: ChunkMethod::Header,
            boundary: None,
        }
    }

    #[test]
    fn whitespace_gaps_are_allowed() {
        let text = "  one\n\ntwo  ";
        assert!(check_coverage(text, &[draft(2, 5), draft(7, 10)]).is_ok());
    }

    #[test]
    fn dropped_text_is_detected() {
        let text = "one two three";
        let err = check_coverage(text, &[draft(0, 3), draft(8, 13)]).unwrap_err();
        assert!(err.contains("not covered"));
        assert!(check_coverage(text, &[draft(0, 7)]).is_err());
    }

    #[test]
    fn overlap_and_bad_spans_are_detected() {
        let text = "one two three";
        assert!(check_coverage(text, &[draft(0, 7), draft(4, 13)]).is_err());
        assert!(check_coverage(text, &[draft(3, 3)]).is_err());
        assert!(check_coverage("é", &[draft(0, 1)]).is_err());
    }

    #[test]
    fn assemble_numbers_chunks_and_fills_metadata() {
        let doc = Document::new("notes.md", "alpha\n\nbeta gamma");
        let chunks = assemble(&doc, vec![draft(0, 5), draft(7, 17)], &per_char()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "beta gamma");
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].total_chunks, 2);
        assert_eq!(chunks[1].token_count, 10);
        assert_eq!(chunks[0].source_file, "notes.md");
        assert_eq!(chunks[0].tokenizer, "per-char");
    }

    #[test]
    fn assemble_rejects_gaps_with_document_identity() {
        let doc = Document::new("bad.md", "alpha beta");
        let err = assemble(&doc, vec![draft(0, 5)], &per_char()).unwrap_err();
        assert!(matches!(err, ChunkError::Coverage { ref source, .. } if source == "bad.md"));
    }
}

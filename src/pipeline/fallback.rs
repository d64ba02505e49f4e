use super::BoundaryKind;

const SENTENCE_ENDS: [&str; 3] = [". ", "! ", "? "];

/// Deterministic cut inside `window`, used when no oracle suggestion survives.
///
/// Prefers the last paragraph break, then the last line break, then the last sentence end,
/// each only when it lies more than `min_chars` characters into the window. Otherwise the
/// whole window is taken. The returned byte offset is the start of the next chunk.
pub fn boundary_cut(window: &str, min_chars: usize) -> (usize, BoundaryKind) {
    let Some(min_byte) = window.char_indices().nth(min_chars).map(|(i, _)| i) else {
        return (window.len(), BoundaryKind::Hard);
    };
    let past_min = |pos: &usize| *pos > min_byte;

    if let Some(pos) = window.rfind("\n\n").filter(past_min) {
        return (pos + 2, BoundaryKind::Paragraph);
    }
    if let Some(pos) = window.rfind('\n').filter(past_min) {
        return (pos + 1, BoundaryKind::Line);
    }
    let sentence = SENTENCE_ENDS
        .iter()
        .filter_map(|sep| window.rfind(sep).filter(past_min).map(|pos| pos + sep.len()))
        .max();
    if let Some(cut) = sentence {
        return (cut, BoundaryKind::Sentence);
    }
    (window.len(), BoundaryKind::Hard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "x".repeat(n)
    }

    #[test]
    fn prefers_last_paragraph_break() {
        let w = format!("{}\n\nsecond para\nline\n\nthird", filler(150));
        let (cut, kind) = boundary_cut(&w, 100);
        assert_eq!(kind, BoundaryKind::Paragraph);
        assert_eq!(&w[cut..], "third");
    }

    #[test]
    fn line_break_when_no_paragraph_break_past_minimum() {
        let w = format!("a\n\n{}\nlast line", filler(150));
        let (cut, kind) = boundary_cut(&w, 100);
        assert_eq!(kind, BoundaryKind::Line);
        assert_eq!(&w[cut..], "last line");
    }

    #[test]
    fn latest_sentence_end_wins() {
        let w = format!("{} First. Second! Third? tail", filler(150));
        let (cut, kind) = boundary_cut(&w, 100);
        assert_eq!(kind, BoundaryKind::Sentence);
        assert_eq!(&w[cut..], "tail");
    }

    #[test]
    fn boundaries_before_minimum_are_ignored() {
        let w = format!("short.\n\n{}", filler(300));
        let (cut, kind) = boundary_cut(&w, 100);
        assert_eq!(kind, BoundaryKind::Hard);
        assert_eq!(cut, w.len());
    }

    #[test]
    fn tiny_window_is_taken_whole() {
        let (cut, kind) = boundary_cut("tiny\n\nwindow", 100);
        assert_eq!((cut, kind), (12, BoundaryKind::Hard));
    }
}

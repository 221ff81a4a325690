//! Indexing and splitting helpers over token sequences.
use itertools::Itertools;

use crate::tokens::{Token, TokenKind};

/// Positional helpers shared by the statement and expression compilers.
pub trait TokenSlice {
    /// Index of the first token of the given kind.
    fn index_of(&self, kind: TokenKind) -> Option<usize>;

    /// Index of the last token of the given kind.
    fn rindex_of(&self, kind: TokenKind) -> Option<usize>;

    /// Splits on every occurrence of the given kind. A trailing
    /// separator yields a trailing empty segment.
    fn segments(&self, kind: TokenKind) -> Vec<&[Token]>;

    /// Space-joined quoted token texts, for diagnostics.
    fn display(&self) -> String;
}

impl TokenSlice for [Token] {
    fn index_of(&self, kind: TokenKind) -> Option<usize> {
        self.iter().position(|t| t.kind == kind)
    }

    fn rindex_of(&self, kind: TokenKind) -> Option<usize> {
        self.iter().rposition(|t| t.kind == kind)
    }

    fn segments(&self, kind: TokenKind) -> Vec<&[Token]> {
        self.split(|t| t.kind == kind).collect()
    }

    fn display(&self) -> String {
        self.iter().map(|t| format!("{}", t)).join(" ")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::scan;

    #[test]
    fn test_index_of() {
        let toks = scan("a + b; c", false).unwrap();
        assert_eq!(toks.index_of(TokenKind::Semicolon), Some(3));
        assert_eq!(toks.index_of(TokenKind::Func), None);
    }

    #[test]
    fn test_rindex_of() {
        let toks = scan("if a { } else if b { }", false).unwrap();
        assert_eq!(toks.rindex_of(TokenKind::If), Some(4));
        assert_eq!(toks.index_of(TokenKind::If), Some(0));
    }

    #[test]
    fn test_segments() {
        let toks = scan("a, b, c", false).unwrap();
        let segs = toks.segments(TokenKind::Comma);
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn test_segments_trailing_separator() {
        let toks = scan("a,", false).unwrap();
        let segs = toks.segments(TokenKind::Comma);
        assert_eq!(segs.len(), 2);
        assert!(segs[1].is_empty());
    }
}

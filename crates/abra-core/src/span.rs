//! Source location tracking for diagnostics.
//!
//! Provides [`Span`], a start/end range in line:column coordinates.

use std::fmt;

/// A range of source text.
///
/// Lines and columns are 1-indexed and byte-based. The end column is
/// exclusive, so a one-character token at `1:5` ends at `1:6`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start line.
    pub line: u32,
    /// Start column.
    pub col: u32,
    /// End line.
    pub end_line: u32,
    /// End column (exclusive).
    pub end_col: u32,
}

impl Span {
    /// Create a single-line span from a start position and a byte length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self {
            line,
            col,
            end_line: line,
            end_col: col + len,
        }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, 0)
    }

    /// Create a span from explicit start and end positions.
    #[inline]
    pub fn range(start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            line: start.0,
            col: start.1,
            end_line: end.0,
            end_col: end.1,
        }
    }

    /// Start position as `(line, col)`.
    #[inline]
    pub fn start(&self) -> (u32, u32) {
        (self.line, self.col)
    }

    /// End position as `(line, col)`.
    #[inline]
    pub fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    /// Whether this span covers no text.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }

    /// The smallest span covering both `self` and `other`.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        let start = self.start().min(other.start());
        let end = self.end().max(other.end());
        Span::range(start, end)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.line, self.col, self.end_line, self.end_col
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(1, 5, 10);
        assert_eq!(span.start(), (1, 5));
        assert_eq!(span.end(), (1, 15));
        assert!(!span.is_empty());
        assert!(Span::point(1, 5).is_empty());
    }

    #[test]
    fn span_display() {
        let span = Span::new(3, 15, 5);
        assert_eq!(format!("{}", span), "3:15");
        assert_eq!(format!("{:?}", span), "3:15-3:20");
    }

    #[test]
    fn span_merge_same_line() {
        let foo = Span::new(1, 5, 3);
        let bar = Span::new(1, 10, 3);
        let merged = foo.merge(bar);
        assert_eq!(merged.start(), (1, 5));
        assert_eq!(merged.end(), (1, 13));
    }

    #[test]
    fn span_merge_reverse_order() {
        let merged = Span::new(1, 10, 3).merge(Span::new(1, 5, 3));
        assert_eq!(merged.start(), (1, 5));
        assert_eq!(merged.end(), (1, 13));
    }

    #[test]
    fn span_merge_across_lines() {
        let merged = Span::new(1, 5, 10).merge(Span::new(3, 2, 4));
        assert_eq!(merged.start(), (1, 5));
        assert_eq!(merged.end(), (3, 6));
    }

    #[test]
    fn span_merge_with_point() {
        let merged = Span::new(1, 5, 10).merge(Span::point(1, 8));
        assert_eq!(merged, Span::new(1, 5, 10));
    }
}

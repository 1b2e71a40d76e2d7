//! Token types for the pattern language lexer.

/// A byte-offset span in the source text.
///
/// Ranges order by start offset, then end offset, which is the order the
/// highlight report is sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The exact source text of the token, quotes included for strings.
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// The span this token occupies in the source.
    pub fn range(&self) -> SourceRange {
        SourceRange::new(self.start, self.end)
    }

    /// Whether the token is a double-quoted string literal.
    pub fn is_quoted(&self) -> bool {
        self.text.starts_with('"')
    }

    /// The string literal contents with the surrounding quotes removed.
    ///
    /// An unterminated literal keeps everything after the opening quote.
    pub fn unquoted(&self) -> &str {
        let inner = self.text.strip_prefix('"').unwrap_or(&self.text);
        inner.strip_suffix('"').unwrap_or(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_order_by_start_then_end() {
        let mut ranges = vec![
            SourceRange::new(4, 9),
            SourceRange::new(0, 3),
            SourceRange::new(4, 6),
        ];
        ranges.sort();
        assert_eq!(
            ranges,
            vec![
                SourceRange::new(0, 3),
                SourceRange::new(4, 6),
                SourceRange::new(4, 9)
            ]
        );
    }

    #[test]
    fn unquoted_strips_both_quotes() {
        let tok = Token::new("\"bd\"", 0, 4);
        assert!(tok.is_quoted());
        assert_eq!(tok.unquoted(), "bd");
    }

    #[test]
    fn unquoted_handles_unterminated_literal() {
        let tok = Token::new("\"bd", 0, 3);
        assert_eq!(tok.unquoted(), "bd");
    }

    #[test]
    fn empty_string_literal() {
        let tok = Token::new("\"\"", 0, 2);
        assert_eq!(tok.unquoted(), "");
        assert_eq!(tok.range(), SourceRange::new(0, 2));
    }
}

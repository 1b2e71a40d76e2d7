//! Lexer for the pattern language.
//!
//! Converts source text into a stream of [`Token`]s carrying byte offsets.
//! Token classes are tried in priority order: quoted strings, `#` line
//! comments, single-character brackets, then maximal runs of anything that is
//! neither whitespace nor a bracket. Lexing never fails.

use super::token::Token;

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole source. Comments and whitespace are dropped.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }

            let ch = self.peek();
            if ch == '"' {
                if let Some(token) = self.lex_string() {
                    tokens.push(token);
                    continue;
                }
                // Unterminated: falls through to a word run.
            } else if ch == '#' {
                self.skip_comment();
                continue;
            } else if is_bracket(ch) {
                tokens.push(self.single_char());
                continue;
            }

            tokens.push(self.lex_word());
        }

        tokens
    }

    fn peek(&self) -> char {
        self.chars[self.pos].1
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.pos += 1;
        }
    }

    fn slice(&self, start: usize, end: usize) -> Token {
        Token::new(&self.source[start..end], start, end)
    }

    fn single_char(&mut self) -> Token {
        let start = self.offset();
        self.pos += 1;
        self.slice(start, self.offset())
    }

    /// A `"`-delimited literal, which may span lines. Returns `None` without
    /// consuming anything when the closing quote is missing.
    fn lex_string(&mut self) -> Option<Token> {
        let start = self.offset();
        let close = self.chars[self.pos + 1..]
            .iter()
            .position(|&(_, c)| c == '"')?;
        self.pos += close + 2;
        Some(self.slice(start, self.offset()))
    }

    fn lex_word(&mut self) -> Token {
        let start = self.offset();
        while !self.is_at_end() {
            let ch = self.peek();
            if ch.is_whitespace() || is_bracket(ch) {
                break;
            }
            self.pos += 1;
        }
        self.slice(start, self.offset())
    }
}

fn is_bracket(ch: char) -> bool {
    matches!(ch, '[' | ']' | '<' | '>' | '(' | ')')
}

/// Convenience wrapper: tokenize `source` in one call.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        tokenize(source).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn lex_numbers_and_words() {
        assert_eq!(texts("220 440 sine"), vec!["220", "440", "sine"]);
    }

    #[test]
    fn lex_records_byte_offsets() {
        let tokens = tokenize("220  sine");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 3));
        assert_eq!((tokens[1].start, tokens[1].end), (5, 9));
    }

    #[test]
    fn lex_brackets_split_words() {
        assert_eq!(
            texts("[1 2]<3>(4 5)"),
            vec!["[", "1", "2", "]", "<", "3", ">", "(", "4", "5", ")"]
        );
    }

    #[test]
    fn lex_string_keeps_quotes_and_spaces() {
        let tokens = tokenize("\"bass drum\" play");
        assert_eq!(tokens[0].text, "\"bass drum\"");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 11));
        assert_eq!(tokens[1].text, "play");
    }

    #[test]
    fn lex_string_with_brackets_inside() {
        assert_eq!(texts("\"a[b]\" x"), vec!["\"a[b]\"", "x"]);
    }

    #[test]
    fn lex_comment_is_dropped() {
        assert_eq!(texts("1 # a comment [ ]\n2"), vec!["1", "2"]);
    }

    #[test]
    fn lex_hash_inside_word_is_not_a_comment() {
        assert_eq!(texts("c#4 sine"), vec!["c#4", "sine"]);
    }

    #[test]
    fn lex_unterminated_string_becomes_word() {
        assert_eq!(texts("\"bd sine"), vec!["\"bd", "sine"]);
    }

    #[test]
    fn lex_multibyte_offsets_are_bytes() {
        let tokens = tokenize("é 1");
        assert_eq!(tokens[0].text, "é");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 2));
        assert_eq!((tokens[1].start, tokens[1].end), (3, 4));
    }

    #[test]
    fn lex_empty_and_whitespace_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \n\t ").is_empty());
    }

    #[test]
    fn lex_macro_definition() {
        assert_eq!(
            texts(": bass 55 110 ;"),
            vec![":", "bass", "55", "110", ";"]
        );
    }
}

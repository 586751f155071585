//! The Gravel Lexer
//!
//! Converts script text into an ordered [`Token`] sequence.  The lexer is modal:
//! string and char literals, `//` line comments, and `:` annotation regions each put
//! it into a mode with its own accumulation rules.  Outside those modes, characters
//! collect into a buffer that is flushed and classified (reserved word, number, or
//! name) on whitespace, on a recognized single-character token, or at end of input.
//! A buffer that fits none of those classes is a lex error, reported to the caller
//! rather than merely logged.

use crate::lex_err;
use crate::token::{Token, TokenKind};
use crate::types::{ErrorKind, Exception};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LexMode {
    Default,
    Str,
    Char,
    Comment,
    Annotation,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    origin: String,
    mode: LexMode,
    escape_next: bool,
    line: u32,
    col: u32,
    buffer: String,
    buf_line: u32,
    buf_col: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str, origin: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            origin: origin.into(),
            mode: LexMode::Default,
            escape_next: false,
            line: 1,
            col: 1,
            buffer: String::new(),
            buf_line: 1,
            buf_col: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    /// Appends a character to the pending buffer, recording the buffer's start
    /// position on the first character.
    fn buffer_push(&mut self, c: char, line: u32, col: u32) {
        if self.buffer.is_empty() {
            self.buf_line = line;
            self.buf_col = col;
        }
        self.buffer.push(c);
    }

    /// Flushes the pending buffer as a token of the given kind.  An empty buffer
    /// flushes to nothing.
    fn flush_as(&mut self, kind: TokenKind) {
        if self.buffer.is_empty() {
            return;
        }
        self.emit(kind);
    }

    /// Flushes the pending buffer unconditionally; a closing quote emits a token
    /// even for an empty literal.
    fn emit(&mut self, kind: TokenKind) {
        let token = Token::new(
            std::mem::take(&mut self.buffer),
            kind,
            self.buf_line,
            self.buf_col,
        );
        debug!(content = %token.content, kind = %token.kind, "pushed token");
        self.tokens.push(token);
    }

    /// Classifies and flushes the pending buffer: reserved word, number, or name.
    fn flush_classified(&mut self) -> Result<(), Exception> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let kind = self.classify()?;
        self.flush_as(kind);
        Ok(())
    }

    fn classify(&self) -> Result<TokenKind, Exception> {
        if let Some(kind) = TokenKind::lookup(&self.buffer) {
            return Ok(kind);
        }
        if is_number(&self.buffer) {
            return Ok(TokenKind::Number);
        }
        if self
            .buffer
            .chars()
            .all(|c| is_word_char(c) || c == '.')
        {
            return Ok(TokenKind::Name);
        }
        lex_err!(
            "{}:{}:{}: failed to recognize token: {}",
            self.origin,
            self.buf_line,
            self.buf_col,
            self.buffer
        )
    }

    fn in_quote(&self) -> bool {
        self.mode == LexMode::Str || self.mode == LexMode::Char
    }

    /// Matches `.` `,` `;` standing alone.  A `.` immediately followed by an
    /// alphanumeric character is left in the buffer so `a.b` lexes as one
    /// qualified name.
    fn match_single(&self, c: char) -> Option<TokenKind> {
        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => return None,
        };
        if c == '.' && self.peek().is_some_and(is_word_char) {
            return None;
        }
        Some(kind)
    }

    fn run(mut self) -> Result<Vec<Token>, Exception> {
        loop {
            // Annotations are skipped until the next `,` or `;` is peeked; the
            // terminator itself is never consumed here and lexes normally.
            if self.mode == LexMode::Annotation {
                match self.peek() {
                    Some(',') | Some(';') => self.mode = LexMode::Default,
                    Some(_) => {
                        self.consume();
                        continue;
                    }
                    None => break,
                }
            }

            let line = self.line;
            let col = self.col;
            let Some(c) = self.consume() else {
                break;
            };

            // Comments run to end of line.
            if self.mode == LexMode::Comment {
                if c == '\n' {
                    self.mode = LexMode::Default;
                }
                continue;
            }

            if !self.in_quote() {
                if c == '/' && self.peek() == Some('/') {
                    self.flush_classified()?;
                    self.mode = LexMode::Comment;
                    continue;
                }
                if c == ':' {
                    self.flush_classified()?;
                    self.mode = LexMode::Annotation;
                    continue;
                }
            }

            // A backslash arms the escape flag: the next character cannot close
            // the literal.
            if self.in_quote() && c == '\\' && !self.escape_next {
                self.escape_next = true;
                continue;
            }

            if c == '`' && !self.escape_next {
                match self.mode {
                    LexMode::Char => {
                        self.emit(TokenKind::Char);
                        self.mode = LexMode::Default;
                    }
                    LexMode::Str => self.buffer_push(c, line, col),
                    _ => {
                        self.flush_classified()?;
                        self.mode = LexMode::Char;
                        self.buf_line = line;
                        self.buf_col = col;
                    }
                }
                continue;
            }

            if (c == '"' || c == '\'') && !self.escape_next {
                match self.mode {
                    LexMode::Str => {
                        self.emit(TokenKind::Str);
                        self.mode = LexMode::Default;
                    }
                    LexMode::Char => self.buffer_push(c, line, col),
                    _ => {
                        self.flush_classified()?;
                        self.mode = LexMode::Str;
                        self.buf_line = line;
                        self.buf_col = col;
                    }
                }
                continue;
            }

            if self.in_quote() {
                self.buffer_push(c, line, col);
                self.escape_next = false;
                continue;
            }

            if let Some(kind) = self.match_single(c) {
                self.flush_classified()?;
                self.buffer_push(c, line, col);
                self.flush_as(kind);
                continue;
            }

            if c.is_whitespace() {
                self.flush_classified()?;
                continue;
            }

            self.buffer_push(c, line, col);
        }

        if self.in_quote() {
            return lex_err!(
                "{}:{}:{}: unterminated literal",
                self.origin,
                self.buf_line,
                self.buf_col
            );
        }
        self.flush_classified()?;

        Ok(self.tokens)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Digits with at most one `.` and at most one `-`.  Whether the digits parse as
/// a value is decided at variant construction, not here.
fn is_number(text: &str) -> bool {
    let mut seen_dot = false;
    let mut seen_minus = false;
    let mut seen_digit = false;
    for c in text.chars() {
        match c {
            '.' if !seen_dot => seen_dot = true,
            '-' if !seen_minus => seen_minus = true,
            _ if c.is_ascii_digit() => seen_digit = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Lexes script text into tokens.  `origin` names the source (a path, or something
/// like `<repl>`) for diagnostics.
pub fn lex_source(source: &str, origin: &str) -> Result<Vec<Token>, Exception> {
    debug!(origin, "lexing source");
    Lexer::new(source, origin).run()
}

/// Reads and lexes a script file.
pub fn lex_file(path: &Path) -> Result<Vec<Token>, Exception> {
    let source = fs::read_to_string(path).map_err(|e| {
        Exception::new(
            ErrorKind::Rejected,
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;
    lex_source(&source, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex_source(source, "<test>")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn contents(source: &str) -> Vec<String> {
        lex_source(source, "<test>")
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("set x, 5;"),
            vec![
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_qualified_name_is_one_token() {
        let toks = lex_source("call Math.Add, 1, 2;", "<test>").unwrap();
        assert_eq!(toks[1].kind, TokenKind::Name);
        assert_eq!(toks[1].content, "Math.Add");
    }

    #[test]
    fn test_standalone_dot() {
        // `.` not followed by an alphanumeric character is its own token.
        assert_eq!(
            kinds("a . ;"),
            vec![TokenKind::Name, TokenKind::Dot, TokenKind::Semicolon]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("5"), vec![TokenKind::Number]);
        assert_eq!(kinds("-5"), vec![TokenKind::Number]);
        assert_eq!(kinds("2.5"), vec![TokenKind::Number]);
        assert_eq!(contents("-12.5"), vec!["-12.5"]);
    }

    #[test]
    fn test_string_literals() {
        let toks = lex_source("set s, \"hello world\";", "<test>").unwrap();
        assert_eq!(toks[3].kind, TokenKind::Str);
        assert_eq!(toks[3].content, "hello world");

        let toks = lex_source("set s, 'single';", "<test>").unwrap();
        assert_eq!(toks[3].kind, TokenKind::Str);
        assert_eq!(toks[3].content, "single");
    }

    #[test]
    fn test_string_escape() {
        // The backslash exempts the quote from closing the literal and is not
        // itself kept.
        let toks = lex_source(r#"set s, "a\"b";"#, "<test>").unwrap();
        assert_eq!(toks[3].content, "a\"b");
    }

    #[test]
    fn test_char_literal() {
        let toks = lex_source("set c, `x`;", "<test>").unwrap();
        assert_eq!(toks[3].kind, TokenKind::Char);
        assert_eq!(toks[3].content, "x");
    }

    #[test]
    fn test_reserved_words_inside_strings() {
        let toks = lex_source("set s, \"set end func\";", "<test>").unwrap();
        assert_eq!(toks[3].kind, TokenKind::Str);
        assert_eq!(toks[3].content, "set end func");
    }

    #[test]
    fn test_comment_to_end_of_line() {
        assert_eq!(
            kinds("set x, 1; // trailing comment\nset y, 2;"),
            vec![
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_comment_inside_string_is_content() {
        let toks = lex_source("set s, \"http://x\";", "<test>").unwrap();
        assert_eq!(toks[3].content, "http://x");
    }

    #[test]
    fn test_annotation_skipped_until_comma() {
        // The annotation swallows everything up to (but not including) the
        // terminator, which still lexes normally.
        assert_eq!(
            kinds("set x : int, 5;"),
            vec![
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_annotation_skipped_until_semicolon() {
        assert_eq!(
            kinds("func F : returns nothing;"),
            vec![TokenKind::Func, TokenKind::Name, TokenKind::Semicolon]
        );
    }

    #[test]
    fn test_lex_error_reported() {
        let err = lex_source("set x, @@;", "<test>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert!(err.message().contains("@@"));
    }

    #[test]
    fn test_empty_string_literal() {
        let toks = lex_source("set s, \"\";", "<test>").unwrap();
        assert_eq!(toks[3].kind, TokenKind::Str);
        assert_eq!(toks[3].content, "");
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex_source("set s, \"abc", "<test>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_positions() {
        let toks = lex_source("set x, 5;\ncall F;", "<test>").unwrap();
        let call = toks.iter().find(|t| t.kind == TokenKind::Call).unwrap();
        assert_eq!(call.line, 2);
        assert_eq!(call.col, 1);
    }
}

//! Tokenizer for C#-flavoured source text
//!
//! Comments and whitespace are dropped; every token keeps the byte span it
//! was read from so that rewrites can be applied back onto the original text
//! without disturbing the surrounding trivia.

use crate::error::{Error, Result};
use serde::Serialize;

/// Byte range into a source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both spans
    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword (keywords are recognised by the parser)
    Ident(String),
    Int(u64),
    Real(f64),
    Char(char),
    Str(String),
    /// Interpolated string, kept opaque
    InterpolatedStr,
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(p) if *p == punct)
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(w) if w == word)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(w) => Some(w),
            _ => None,
        }
    }
}

// `>>` and `>>=` are deliberately absent: the parser joins adjacent `>` tokens
// so that nested generic argument lists close correctly.
const PUNCTUATORS: &[&str] = &[
    "??=", "<<=", "=>", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "<<", "??", "?.", "::", "+", "-", "*", "/", "%", "&", "|", "^", "!",
    "~", "=", "<", ">", "?", ":", ";", ",", ".", "(", ")", "{", "}", "[", "]", "#",
];

/// Convert a byte offset into a 1-based line and column
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(pos) => before[pos + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input, always ending with an `Eof` token
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.pos >= self.bytes.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.pos, self.pos),
                });
                return Ok(tokens);
            }
            tokens.push(self.next_token()?);
        }
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> Error {
        let (line, column) = line_col(self.source, offset);
        Error::parse(line, column, message)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        while let Some(c) = self.peek(0) {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'/' && self.peek(1) == Some(b'/') {
                while let Some(c) = self.peek(0) {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if c == b'/' && self.peek(1) == Some(b'*') {
                let start = self.pos;
                self.pos += 2;
                loop {
                    match self.peek(0) {
                        Some(b'*') if self.peek(1) == Some(b'/') => {
                            self.pos += 2;
                            break;
                        }
                        Some(_) => self.pos += 1,
                        None => return Err(self.error(start, "unterminated block comment")),
                    }
                }
            } else if c == b'#' && self.at_line_start() {
                // Preprocessor directives are ignored line-wise
                while let Some(c) = self.peek(0) {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn at_line_start(&self) -> bool {
        self.source[..self.pos]
            .chars()
            .rev()
            .take_while(|c| *c != '\n')
            .all(char::is_whitespace)
    }

    fn next_token(&mut self) -> Result<Token> {
        let start = self.pos;
        let c = self.bytes[self.pos];

        let kind = if c == b'@' && self.peek(1) == Some(b'"') {
            self.pos += 1;
            TokenKind::Str(self.verbatim_string(start)?)
        } else if c == b'$' && matches!(self.peek(1), Some(b'"') | Some(b'@')) {
            self.interpolated_string(start)?;
            TokenKind::InterpolatedStr
        } else if c == b'@' && self.peek(1).map_or(false, is_ident_start) {
            self.pos += 1;
            TokenKind::Ident(self.identifier())
        } else if is_ident_start(c) {
            TokenKind::Ident(self.identifier())
        } else if c.is_ascii_digit() || (c == b'.' && self.peek(1).map_or(false, |d| d.is_ascii_digit())) {
            self.number(start)?
        } else if c == b'\'' {
            TokenKind::Char(self.char_literal(start)?)
        } else if c == b'"' {
            TokenKind::Str(self.string_literal(start)?)
        } else {
            let rest = &self.source[self.pos..];
            match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
                Some(p) => {
                    self.pos += p.len();
                    TokenKind::Punct(p)
                }
                None => {
                    let ch = rest.chars().next().unwrap_or('?');
                    return Err(self.error(start, format!("unexpected character '{}'", ch)));
                }
            }
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek(0).map_or(false, is_ident_continue) {
            self.pos += 1;
        }
        // Non-ASCII identifier characters
        while let Some(ch) = self.source[self.pos..].chars().next() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += ch.len_utf8();
                while self.peek(0).map_or(false, is_ident_continue) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn number(&mut self, start: usize) -> Result<TokenKind> {
        let radix = match (self.peek(0), self.peek(1)) {
            (Some(b'0'), Some(b'x')) | (Some(b'0'), Some(b'X')) => 16,
            (Some(b'0'), Some(b'b')) | (Some(b'0'), Some(b'B')) => 2,
            _ => 10,
        };

        if radix != 10 {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .peek(0)
                .map_or(false, |c| c.is_ascii_hexdigit() || c == b'_')
            {
                self.pos += 1;
            }
            let digits: String = self.source[digits_start..self.pos]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            self.integer_suffix();
            return u64::from_str_radix(&digits, radix)
                .map(TokenKind::Int)
                .map_err(|_| self.error(start, format!("invalid integer literal '{}'", &self.source[start..self.pos])));
        }

        let mut is_real = false;
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || c == b'_' {
                self.pos += 1;
            } else if c == b'.' && !is_real && self.peek(1).map_or(false, |d| d.is_ascii_digit()) {
                is_real = true;
                self.pos += 1;
            } else if (c == b'e' || c == b'E')
                && (self.peek(1).map_or(false, |d| d.is_ascii_digit())
                    || (matches!(self.peek(1), Some(b'+') | Some(b'-'))
                        && self.peek(2).map_or(false, |d| d.is_ascii_digit())))
            {
                is_real = true;
                self.pos += 2;
            } else {
                break;
            }
        }
        let digits: String = self.source[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        if matches!(self.peek(0), Some(b'f') | Some(b'F') | Some(b'd') | Some(b'D') | Some(b'm') | Some(b'M')) {
            self.pos += 1;
            is_real = true;
        } else {
            self.integer_suffix();
        }

        if is_real {
            digits
                .parse::<f64>()
                .map(TokenKind::Real)
                .map_err(|_| self.error(start, format!("invalid real literal '{}'", digits)))
        } else {
            digits
                .parse::<u64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(start, format!("integer literal '{}' is out of range", digits)))
        }
    }

    fn integer_suffix(&mut self) {
        while matches!(self.peek(0), Some(b'u') | Some(b'U') | Some(b'l') | Some(b'L')) {
            self.pos += 1;
        }
    }

    fn escape(&mut self, literal_start: usize) -> Result<char> {
        // Positioned just after the backslash
        let c = self
            .peek(0)
            .ok_or_else(|| self.error(literal_start, "unterminated escape sequence"))?;
        self.pos += 1;
        let ch = match c {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'0' => '\0',
            b'a' => '\u{7}',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'v' => '\u{b}',
            b'\\' => '\\',
            b'\'' => '\'',
            b'"' => '"',
            b'u' | b'x' => {
                let digits_start = self.pos;
                while self.pos - digits_start < 4 &&self.peek(0).map_or(false, |d| d.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                let code = u32::from_str_radix(&self.source[digits_start..self.pos], 16)
                    .map_err(|_| self.error(literal_start, "invalid unicode escape"))?;
                char::from_u32(code).ok_or_else(|| self.error(literal_start, "invalid unicode escape"))?
            }
            _ => return Err(self.error(literal_start, format!("unknown escape sequence '\\{}'", c as char))),
        };
        Ok(ch)
    }

    fn char_literal(&mut self, start: usize) -> Result<char> {
        self.pos += 1;
        let ch = match self.source[self.pos..].chars().next() {
            Some('\\') => {
                self.pos += 1;
                self.escape(start)?
            }
            Some('\'') | Some('\n') | None => return Err(self.error(start, "empty or unterminated character literal")),
            Some(ch) => {
                self.pos += ch.len_utf8();
                ch
            }
        };
        if self.peek(0) != Some(b'\'') {
            return Err(self.error(start, "unterminated character literal"));
        }
        self.pos += 1;
        Ok(ch)
    }

    fn string_literal(&mut self, start: usize) -> Result<String> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.source[self.pos..].chars().next() {
                Some('"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('\\') => {
                    self.pos += 1;
                    value.push(self.escape(start)?);
                }
                Some('\n') | None => return Err(self.error(start, "unterminated string literal")),
                Some(ch) => {
                    self.pos += ch.len_utf8();
                    value.push(ch);
                }
            }
        }
    }

    fn verbatim_string(&mut self, start: usize) -> Result<String> {
        // Positioned on the opening quote
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.source[self.pos..].chars().next() {
                Some('"') if self.peek(1) == Some(b'"') => {
                    self.pos += 2;
                    value.push('"');
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(ch) => {
                    self.pos += ch.len_utf8();
                    value.push(ch);
                }
                None => return Err(self.error(start, "unterminated verbatim string literal")),
            }
        }
    }

    fn interpolated_string(&mut self, start: usize) -> Result<()> {
        self.pos += 1;
        let verbatim = self.peek(0) == Some(b'@');
        if verbatim {
            self.pos += 1;
        }
        self.pos += 1;
        let mut depth = 0usize;
        loop {
            let c = self
                .peek(0)
                .ok_or_else(|| self.error(start, "unterminated interpolated string"))?;
            match c {
                b'{' if self.peek(1) == Some(b'{') && depth == 0 => self.pos += 2,
                b'}' if self.peek(1) == Some(b'}') && depth == 0 => self.pos += 2,
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                }
                b'"' if depth > 0 => {
                    let nested = self.pos;
                    self.string_literal(nested)?;
                }
                b'"' if verbatim && self.peek(1) == Some(b'"') => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' if !verbatim => self.pos += 2,
                b'\n' if !verbatim && depth == 0 => {
                    return Err(self.error(start, "unterminated interpolated string"))
                }
                _ => self.pos += 1,
            }
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Tokenize source text
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_integer_literal_forms() {
        assert_eq!(
            kinds("42 0x1F 0b1010 1_000 7u 9UL"),
            vec![
                TokenKind::Int(42),
                TokenKind::Int(31),
                TokenKind::Int(10),
                TokenKind::Int(1000),
                TokenKind::Int(7),
                TokenKind::Int(9),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_char_and_string_literals() {
        assert_eq!(
            kinds(r#"'A' '\n' "x" @"a""b""#),
            vec![
                TokenKind::Char('A'),
                TokenKind::Char('\n'),
                TokenKind::Str("x".to_string()),
                TokenKind::Str("a\"b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped_and_spans_kept() {
        let tokens = tokenize("a /* c */ | // tail\n 2").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].kind, TokenKind::Punct("|"));
        assert_eq!(tokens[1].span, Span::new(10, 11));
        assert_eq!(tokens[2].span, Span::new(21, 22));
    }

    #[test]
    fn test_shift_right_is_split() {
        assert_eq!(
            kinds("a >> 2"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Punct(">"),
                TokenKind::Punct(">"),
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_position() {
        let err = tokenize("x = \"abc").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, column: 5, .. }));
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
        assert_eq!(line_col("ab", 0), (1, 1));
    }
}

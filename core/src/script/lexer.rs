//! Tokenizer for assertion scripts.
//!
//! Handles:
//! - identifiers and keywords (keywords are left to the parser)
//! - numeric literals (decimal, exponent, hex)
//! - single- and double-quoted strings with escapes
//! - regex literals, told apart from division by the preceding token
//! - `//` and `/* */` comments

use super::error::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,
    QuestionDot,
    Question,
    QuestionQuestion,
    Bang,
    BangEq,
    BangEqEq,
    Assign,
    EqEq,
    EqEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AmpAmp,
    PipePipe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    Regex { pattern: String, flags: String },
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

/// Words after which a `/` starts a regex rather than a division.
const REGEX_PRECEDING_WORDS: &[&str] = &["typeof", "in", "instanceof", "new", "throw", "return", "else", "void", "delete"];

const INVALID_TOKEN: &str = "Invalid or unexpected token";

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
    newline_pending: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            tokens: Vec::new(),
            newline_pending: false,
        }
    }

    /// Tokenize the whole source. The stream always ends with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        loop {
            self.skip_trivia()?;
            let Some(&(start, c)) = self.chars.peek() else {
                break;
            };
            let kind = self.scan(start, c)?;
            let end = self.pos();
            self.push(kind, Span { start, end });
        }
        let end = self.source.len();
        self.push(TokenKind::Eof, Span { start: end, end });
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token {
            kind,
            span,
            newline_before: std::mem::take(&mut self.newline_pending),
        });
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.source.len())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.newline_pending = true;
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_second() == Some('*') => {
                    let start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.eat('/') => break,
                            Some('\n') => self.newline_pending = true,
                            Some(_) => {}
                            None => return Err(SyntaxError::new(INVALID_TOKEN, start)),
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Punct(p)) => !matches!(p, Punct::RParen | Punct::RBracket | Punct::RBrace),
            Some(TokenKind::Ident(word)) => REGEX_PRECEDING_WORDS.contains(&word.as_str()),
            Some(_) => false,
        }
    }

    fn scan(&mut self, start: usize, c: char) -> Result<TokenKind, SyntaxError> {
        if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|n| n.is_ascii_digit())) {
            return self.scan_number(start);
        }
        if is_ident_start(c) {
            return Ok(self.scan_ident());
        }
        if c == '"' || c == '\'' {
            return self.scan_string(start, c);
        }
        if c == '/' && self.regex_allowed() {
            return self.scan_regex(start);
        }
        self.bump();
        let punct = match c {
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            ',' => Punct::Comma,
            ';' => Punct::Semicolon,
            ':' => Punct::Colon,
            '.' => Punct::Dot,
            '?' => {
                if self.peek() == Some('.') && !self.peek_second().is_some_and(|n| n.is_ascii_digit()) {
                    self.bump();
                    Punct::QuestionDot
                } else if self.eat('?') {
                    Punct::QuestionQuestion
                } else {
                    Punct::Question
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Punct::BangEqEq
                    } else {
                        Punct::BangEq
                    }
                } else {
                    Punct::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Punct::EqEqEq
                    } else {
                        Punct::EqEq
                    }
                } else {
                    Punct::Assign
                }
            }
            '<' => {
                if self.eat('=') {
                    Punct::LtEq
                } else {
                    Punct::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Punct::GtEq
                } else {
                    Punct::Gt
                }
            }
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '*' => Punct::Star,
            '/' => Punct::Slash,
            '%' => Punct::Percent,
            '&' if self.eat('&') => Punct::AmpAmp,
            '|' if self.eat('|') => Punct::PipePipe,
            _ => return Err(SyntaxError::new(INVALID_TOKEN, start)),
        };
        Ok(TokenKind::Punct(punct))
    }

    fn scan_ident(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_part(c) {
                break;
            }
            word.push(c);
            self.bump();
        }
        TokenKind::Ident(word)
    }

    fn scan_number(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let digits_start = self.pos();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.source[digits_start..self.pos()];
            let value = u64::from_str_radix(digits, 16).map_err(|_| SyntaxError::new(INVALID_TOKEN, start))?;
            return self.finish_number(start, value as f64);
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(SyntaxError::new(INVALID_TOKEN, start));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.source[start..self.pos()];
        let value = text.parse::<f64>().map_err(|_| SyntaxError::new(INVALID_TOKEN, start))?;
        self.finish_number(start, value)
    }

    fn finish_number(&mut self, start: usize, value: f64) -> Result<TokenKind, SyntaxError> {
        // `3in` or `1abc` is not a number followed by an identifier.
        if self.peek().is_some_and(is_ident_start) {
            return Err(SyntaxError::new(INVALID_TOKEN, start));
        }
        Ok(TokenKind::Number(value))
    }

    fn scan_string(&mut self, start: usize, quote: char) -> Result<TokenKind, SyntaxError> {
        self.bump();
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| SyntaxError::new(INVALID_TOKEN, start))?;
            match c {
                c if c == quote => return Ok(TokenKind::String(out)),
                '\n' => return Err(SyntaxError::new(INVALID_TOKEN, start)),
                '\\' => {
                    let escaped = self.bump().ok_or_else(|| SyntaxError::new(INVALID_TOKEN, start))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'v' => out.push('\u{b}'),
                        '0' => out.push('\0'),
                        'x' => out.push(self.scan_hex_escape(2, start)?),
                        'u' => out.push(self.scan_hex_escape(4, start)?),
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn scan_hex_escape(&mut self, len: usize, start: usize) -> Result<char, SyntaxError> {
        let mut code = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| SyntaxError::new(INVALID_TOKEN, start))?;
            code = code * 16 + digit;
        }
        Ok(char::from_u32(code).unwrap_or('\u{fffd}'))
    }

    fn scan_regex(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        const MISSING_SLASH: &str = "Invalid regular expression: missing /";
        self.bump();
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            let c = self.bump().ok_or_else(|| SyntaxError::new(MISSING_SLASH, start))?;
            match c {
                '\n' => return Err(SyntaxError::new(MISSING_SLASH, start)),
                '/' if !in_class => break,
                '[' => in_class = true,
                ']' => in_class = false,
                '\\' => {
                    pattern.push(c);
                    let next = self.bump().ok_or_else(|| SyntaxError::new(MISSING_SLASH, start))?;
                    pattern.push(next);
                    continue;
                }
                _ => {}
            }
            pattern.push(c);
        }
        let mut flags = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_part(c) {
                break;
            }
            flags.push(c);
            self.bump();
        }
        Ok(TokenKind::Regex { pattern, flags })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

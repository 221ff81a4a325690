//! Lexical analysis.
//!
//! Produces a flat token list. A bracketed, braced or parenthesized run
//! is folded into a single group token carrying the full delimited text;
//! [`Token::block`] exposes the enclosed text for lazy recursive
//! re-scanning by the compiler.
//!
//! Newlines perform Go-style semicolon insertion: a terminator is
//! synthesized when the previous token can end a statement.
use std::{error, fmt, str::CharIndices};

use itertools::{multipeek, MultiPeek};

use crate::tokens::{Span, Token, TokenKind};

pub type ScanResult<T> = Result<T, ScanError>;

/// Scans source text into a flat token list.
///
/// With `require_terminator`, a trailing semicolon is synthesized when
/// the text does not already end in one, so statement splitting always
/// finds its terminator.
pub fn scan(text: &str, require_terminator: bool) -> ScanResult<Vec<Token>> {
    let mut lexer = Lexer::new(text);
    let mut out: Vec<Token> = Vec::new();

    while let Some(raw) = lexer.next_raw()? {
        match raw {
            Raw::Newline(index) => {
                if out.last().map_or(false, |t| ends_statement(t.kind)) {
                    out.push(Token::new(TokenKind::Semicolon, Span::new(index, 1), ";"));
                }
            }
            Raw::Token(token) => out.push(token),
        }
    }

    if require_terminator && out.last().map_or(true, |t| t.kind != TokenKind::Semicolon) {
        out.push(Token::new(
            TokenKind::Semicolon,
            Span::new(text.len() as u32, 0),
            ";",
        ));
    }

    Ok(out)
}

/// A token can end a statement when a newline follows it.
#[rustfmt::skip]
fn ends_statement(kind: TokenKind) -> bool {
    use TokenKind as T;
    matches!(
        kind,
        T::Ident | T::Int | T::Str | T::Return
            | T::ParenBlock | T::BraceBlock | T::BracketBlock
    )
}

enum Raw {
    Newline(u32),
    Token(Token),
}

struct Lexer<'a> {
    src: &'a str,
    chars: MultiPeek<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: multipeek(src.char_indices()),
        }
    }

    #[rustfmt::skip]
    fn next_raw(&mut self) -> ScanResult<Option<Raw>> {
        use TokenKind as T;

        while let Some((start, next_char)) = self.chars.next() {
            let start = start as u32;

            let token = match next_char {
                ' ' | '\t' | '\r' => continue,
                '\n'              => return Ok(Some(Raw::Newline(start))),
                '+'               => self.simple(T::Add, start, "+"),
                '-'               => self.simple(T::Sub, start, "-"),
                '<'               => self.simple(T::Less, start, "<"),
                ','               => self.simple(T::Comma, start, ","),
                ';'               => self.simple(T::Semicolon, start, ";"),
                '='               => {
                    if self.peek_char() == Some('=') {
                        self.chars.next();
                        self.simple(T::Equal, start, "==")
                    } else {
                        self.simple(T::Assign, start, "=")
                    }
                }
                ':'               => {
                    if self.peek_char() == Some('=') {
                        self.chars.next();
                        self.simple(T::Define, start, ":=")
                    } else {
                        return Err(ScanError::UnknownCharacter(':', start));
                    }
                }
                '/'               => {
                    if self.peek_char() == Some('/') {
                        self.skip_comment();
                        continue;
                    }
                    return Err(ScanError::UnknownCharacter('/', start));
                }
                '('               => self.group(start, '(', ')', T::ParenBlock)?,
                '{'               => self.group(start, '{', '}', T::BraceBlock)?,
                '['               => self.group(start, '[', ']', T::BracketBlock)?,
                ')' | '}' | ']'   => return Err(ScanError::UnbalancedDelimiter(next_char, start)),
                '"'               => self.string(start)?,
                '0'..='9'         => self.number(start),
                '_' | 'a'..='z'
                    | 'A'..='Z'   => self.ident(start),
                other             => return Err(ScanError::UnknownCharacter(other, start)),
            };

            return Ok(Some(Raw::Token(token)));
        }

        Ok(None)
    }

    fn peek_char(&mut self) -> Option<char> {
        let next = self.chars.peek().map(|(_, c)| *c);
        self.chars.reset_peek();
        next
    }

    fn simple(&self, kind: TokenKind, start: u32, text: &str) -> Token {
        Token::new(kind, Span::new(start, text.len() as u32), text)
    }

    fn fragment(&self, start: u32, end: usize) -> Token {
        let text = &self.src[start as usize..end];
        let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Ident);
        Token::new(kind, Span::new(start, text.len() as u32), text)
    }

    fn ident(&mut self, start: u32) -> Token {
        let mut end = start as usize + 1;
        while let Some((i, c)) = self.chars.peek().copied() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.chars.next();
                end = i + c.len_utf8();
            } else {
                break;
            }
        }
        self.chars.reset_peek();
        self.fragment(start, end)
    }

    fn number(&mut self, start: u32) -> Token {
        let mut end = start as usize + 1;
        while let Some((i, c)) = self.chars.peek().copied() {
            if c.is_ascii_digit() {
                self.chars.next();
                end = i + 1;
            } else {
                break;
            }
        }
        self.chars.reset_peek();
        let text = &self.src[start as usize..end];
        Token::new(TokenKind::Int, Span::new(start, text.len() as u32), text)
    }

    fn string(&mut self, start: u32) -> ScanResult<Token> {
        while let Some((i, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                '"' => {
                    let text = &self.src[start as usize..i + 1];
                    return Ok(Token::new(
                        TokenKind::Str,
                        Span::new(start, text.len() as u32),
                        text,
                    ));
                }
                _ => {}
            }
        }
        Err(ScanError::UnterminatedString(start))
    }

    /// Consumes through the matching close delimiter, producing one
    /// group token carrying the full delimited text. String literals
    /// and comments inside the group are stepped over so their content
    /// cannot close the group early.
    fn group(&mut self, start: u32, open: char, close: char, kind: TokenKind) -> ScanResult<Token> {
        let mut depth = 1usize;
        while let Some((i, c)) = self.chars.next() {
            match c {
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        let text = &self.src[start as usize..i + 1];
                        return Ok(Token::new(kind, Span::new(start, text.len() as u32), text));
                    }
                }
                '"' => {
                    self.string(i as u32)?;
                }
                '/' => {
                    if self.peek_char() == Some('/') {
                        self.skip_comment();
                    }
                }
                _ => {}
            }
        }
        Err(ScanError::UnterminatedGroup(open, start))
    }

    /// Skips a `//` comment up to, but not including, the newline.
    fn skip_comment(&mut self) {
        while let Some((_, c)) = self.chars.peek().copied() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
        self.chars.reset_peek();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    UnknownCharacter(char, u32),
    UnbalancedDelimiter(char, u32),
    UnterminatedGroup(char, u32),
    UnterminatedString(u32),
}

impl error::Error for ScanError {}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownCharacter(c, pos) => {
                write!(f, "unknown character {:?} at offset {}", c, pos)
            }
            Self::UnbalancedDelimiter(c, pos) => {
                write!(f, "unbalanced {:?} at offset {}", c, pos)
            }
            Self::UnterminatedGroup(c, pos) => {
                write!(f, "unterminated {:?} group opened at offset {}", c, pos)
            }
            Self::UnterminatedString(pos) => {
                write!(f, "unterminated string literal at offset {}", pos)
            }
        }
    }
}

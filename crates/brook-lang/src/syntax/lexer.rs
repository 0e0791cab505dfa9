use crate::error::ErrorCode;
use crate::syntax::SyntaxError;
use crate::syntax::ast::Span;
use crate::syntax::token::{Token, TokenKind, keyword_or_ident};

const TAB_WIDTH: usize = 4;

// ─── Lines ───────────────────────────────────────────────────────────────────

/// A non-blank, non-comment source line with its indentation measured.
#[derive(Debug, Clone, Copy)]
pub struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub indent: usize,
    /// The full line as written, without the newline.
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    /// The line with its indentation removed.
    pub fn content(&self) -> &'a str {
        self.text.trim_start_matches([' ', '\t'])
    }
}

/// Split source into meaningful lines. Blank lines and lines holding only a
/// `//` comment carry no layout and are dropped.
pub fn split_lines(source: &str) -> Vec<SourceLine<'_>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, text)| {
            let text = text.strip_suffix('\r').unwrap_or(text);
            let content = text.trim_start_matches([' ', '\t']);
            if content.trim().is_empty() || content.starts_with("//") {
                return None;
            }
            let indent = text[..text.len() - content.len()]
                .chars()
                .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
                .sum();
            Some(SourceLine { number: i + 1, indent, text })
        })
        .collect()
}

// ─── Lexer ───────────────────────────────────────────────────────────────────

/// Tokenizes one declaration line. Everything after `=` is kept raw.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(line: &SourceLine<'a>) -> Self {
        Self { source: line.text.as_bytes(), pos: 0, line: line.number }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_at_end() || self.at_comment() {
                let col = self.column();
                tokens.push(Token::new(TokenKind::Eol, self.line, col, col));
                break;
            }

            let tok = self.next_token()?;
            let is_eq = tok.kind == TokenKind::Eq;
            tokens.push(tok);
            if is_eq {
                self.skip_whitespace();
                let raw = self.read_raw()?;
                tokens.push(raw);
            }
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let col = self.column();
        let ch = self.advance();

        let kind = match ch {
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'=' => TokenKind::Eq,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => keyword_or_ident(self.read_ident(ch)),
            other => {
                return Err(SyntaxError::new(
                    ErrorCode::L001,
                    Span::new(self.line, col, col + 1),
                    format!("unexpected character `{}`", other as char),
                ));
            }
        };

        Ok(Token::new(kind, self.line, col, self.column()))
    }

    /// Initializer text runs to the end of the line or a trailing comment.
    fn read_raw(&mut self) -> Result<Token, SyntaxError> {
        let col = self.column();
        let start = self.pos;
        let mut quote: Option<(u8, usize)> = None;

        while !self.is_at_end() {
            let ch = self.peek();
            match quote {
                Some((q, _)) => {
                    if ch == b'\\' {
                        self.advance();
                    } else if ch == q {
                        quote = None;
                    }
                }
                None => {
                    if ch == b'"' || ch == b'\'' {
                        quote = Some((ch, self.column()));
                    } else if self.at_comment() {
                        break;
                    }
                }
            }
            if !self.is_at_end() {
                self.advance();
            }
        }

        if let Some((_, open)) = quote {
            return Err(SyntaxError::new(
                ErrorCode::L002,
                Span::new(self.line, open, self.column()),
                "unterminated string literal",
            ));
        }

        let text = String::from_utf8_lossy(&self.source[start..self.pos]).trim_end().to_string();
        Ok(Token::new(TokenKind::Raw(text), self.line, col, self.column()))
    }

    // ─── Primitives ──────────────────────────────────────────────────────────

    fn advance(&mut self) -> u8 {
        let ch = self.source[self.pos];
        self.pos += 1;
        ch
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.source[self.pos] }
    }

    fn peek_next(&self) -> u8 {
        if self.pos + 1 >= self.source.len() { 0 } else { self.source[self.pos + 1] }
    }

    fn column(&self) -> usize { self.pos + 1 }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn at_comment(&self) -> bool {
        self.peek() == b'/' && self.peek_next() == b'/'
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\t' => { self.advance(); }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, first: u8) -> String {
        let mut s = String::from(first as char);
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            s.push(self.advance() as char);
        }
        s
    }
}

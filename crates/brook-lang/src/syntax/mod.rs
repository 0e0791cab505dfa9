//! Declaration-level syntax: one declaration per line, blocks by indentation.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

use crate::error::{Diagnostic, ErrorCode};
use ast::{FileSyntax, Span};

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub code: ErrorCode,
    pub span: Span,
    pub message: String,
}

impl SyntaxError {
    pub fn new(code: ErrorCode, span: Span, message: impl Into<String>) -> Self {
        Self { code, span, message: message.into() }
    }

    pub fn into_diagnostic(self, path: &str) -> Diagnostic {
        Diagnostic::new(self.code, path, &self.span, self.message)
    }
}

/// Parse one source file. All recoverable errors are reported together.
pub fn parse_file(path: &str, source: &str) -> Result<FileSyntax, Vec<Diagnostic>> {
    parser::Parser::new(source)
        .parse()
        .map_err(|errors| errors.into_iter().map(|e| e.into_diagnostic(path)).collect())
}

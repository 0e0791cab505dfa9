use std::ops::Range;

use thiserror::Error;

use crate::syntax::ast::Span;

/// Error codes prefixed by phase: L = lexer, P = parser, R = rely graph,
/// D = declaration merge, K = link, V = validity, G = generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Lexer
    L001, // unexpected character
    L002, // unterminated string literal

    // Parser
    P001, // unexpected token
    P002, // missing expected token
    P003, // visibility clash
    P004, // import after declarations
    P005, // unexpected indentation

    // Rely graph
    R001, // duplicate library name
    R002, // circular rely
    R003, // rely library not provided
    R004, // unresolvable rely graph
    R005, // unresolved cross-library type

    // Declaration merge
    D001, // duplicate declaration in space
    D002, // duplicate overload
    D003, // duplicate member
    D004, // visibility not allowed here
    D005, // duplicate parameter name
    D006, // member shares the class name

    // Link
    K001, // name not found
    K002, // equivocal name
    K003, // not a type
    K004, // space not found
    K005, // inaccessible

    // Validity
    V001, // invalid parent
    V002, // circular inheritance
    V003, // not an interface
    V004, // interface not implemented
    V005, // circular interface inheritance
    V006, // implementation does not match the interface
    V007, // member hides inherited member
    V008, // function does not match the delegate it initializes

    // Generation
    G001, // override return mismatch
    G002, // exported signature references non-exported type
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L001 => "L001",
            Self::L002 => "L002",
            Self::P001 => "P001",
            Self::P002 => "P002",
            Self::P003 => "P003",
            Self::P004 => "P004",
            Self::P005 => "P005",
            Self::R001 => "R001",
            Self::R002 => "R002",
            Self::R003 => "R003",
            Self::R004 => "R004",
            Self::R005 => "R005",
            Self::D001 => "D001",
            Self::D002 => "D002",
            Self::D003 => "D003",
            Self::D004 => "D004",
            Self::D005 => "D005",
            Self::D006 => "D006",
            Self::K001 => "K001",
            Self::K002 => "K002",
            Self::K003 => "K003",
            Self::K004 => "K004",
            Self::K005 => "K005",
            Self::V001 => "V001",
            Self::V002 => "V002",
            Self::V003 => "V003",
            Self::V004 => "V004",
            Self::V005 => "V005",
            Self::V006 => "V006",
            Self::V007 => "V007",
            Self::V008 => "V008",
            Self::G001 => "G001",
            Self::G002 => "G002",
        }
    }

    /// Stable numeric form: phase * 100 + ordinal.
    pub fn number(&self) -> u32 {
        let phase = match self.as_str().as_bytes()[0] {
            b'L' => 1,
            b'P' => 2,
            b'R' => 3,
            b'D' => 4,
            b'K' => 5,
            b'V' => 6,
            _    => 7,
        };
        let ordinal: u32 = self.as_str()[1..].parse().unwrap_or(0);
        phase * 100 + ordinal
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Diagnostic ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub path: String,
    pub line: usize,
    /// Character columns on `line`, end exclusive.
    pub range: Range<usize>,
    pub code: ErrorCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, path: impl Into<String>, span: &Span, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: span.line,
            range: span.start..span.end,
            code,
            message: message.into(),
        }
    }

    /// A diagnostic with no source position (rely graph problems).
    pub fn detached(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), line: 0, range: 0..0, code, message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}-{} [{}] {}",
            self.path, self.line, self.range.start, self.range.end, self.code, self.message
        )
    }
}

// ─── Sink ─────────────────────────────────────────────────────────────────────

/// Ordered diagnostics shared by every stage of one compile run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(code = %diagnostic.code, message = %diagnostic.message, "diagnostic");
        self.entries.push(diagnostic);
    }

    pub fn report(&mut self, code: ErrorCode, path: &str, span: &Span, message: impl Into<String>) {
        self.push(Diagnostic::new(code, path, span, message));
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> { self.entries.iter() }

    pub fn as_slice(&self) -> &[Diagnostic] { &self.entries }

    pub fn clear(&mut self) { self.entries.clear(); }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    /// Ends a stage: any recorded diagnostic halts the pipeline.
    pub fn checkpoint(&self, stage: &'static str) -> Result<(), CompileError> {
        if self.entries.is_empty() {
            Ok(())
        } else {
            tracing::debug!(stage, count = self.entries.len(), "stage produced diagnostics");
            Err(CompileError::Failed { stage, count: self.entries.len() })
        }
    }
}

// ─── Internal / pipeline errors ───────────────────────────────────────────────

/// Invariant violations inside the compiler itself. Never recoverable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InternalError {
    #[error("collection pool has {outstanding} containers checked out at release")]
    PoolImbalance { outstanding: usize },

    #[error("compile invoked while a compile is already running")]
    Reentrant,

    #[error("unexpected {what} `{value}`")]
    UnknownValue { what: &'static str, value: String },

    #[error("anchor {line} does not exist in `{path}` ({lines} lines)")]
    AnchorMismatch { path: String, line: usize, lines: usize },
}

/// Why a pipeline stage stopped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("{stage} failed with {count} diagnostics")]
    Failed { stage: &'static str, count: usize },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

//! Separately compiled dependencies ("rely libraries").
//!
//! A dependency arrives as a `ReferenceLibrary`, the exported surface of an
//! earlier compile. Building the rely set checks the graph (names, missing
//! dependencies, cycles) and then rehydrates each surface into a
//! `LibraryTable` numbered for this compilation.

pub mod graph;
pub mod library;
pub mod reference;

use thiserror::Error;

use crate::error::{Diagnostic, Diagnostics, ErrorCode};
use crate::types::TypeCode;

pub use graph::RelyGraph;
pub use library::RelyLibrary;
pub use reference::ReferenceLibrary;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelyError {
    #[error("library name `{name}` is used more than once")]
    Duplicate { name: String },

    #[error("circular rely: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("library `{library}` relies on `{dependency}`, which was not provided")]
    Missing { library: String, dependency: String },

    #[error("rely graph cannot be resolved; still pending: {}", .pending.join(", "))]
    Unresolvable { pending: Vec<String> },

    #[error("library `{library}` references {code:?} #{index} of `{target}`, which does not exist")]
    UnresolvedType { library: String, target: String, code: TypeCode, index: u32 },

    #[error("library `{library}` is malformed: {message}")]
    Malformed { library: String, message: String },
}

impl RelyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Duplicate { .. }      => ErrorCode::R001,
            Self::Cycle { .. }          => ErrorCode::R002,
            Self::Missing { .. }        => ErrorCode::R003,
            Self::Unresolvable { .. }   => ErrorCode::R004,
            Self::UnresolvedType { .. } => ErrorCode::R005,
            Self::Malformed { .. }      => ErrorCode::R005,
        }
    }

    /// Library the problem is reported against.
    pub fn library(&self) -> &str {
        match self {
            Self::Duplicate { name } => name,
            Self::Cycle { chain } => chain.first().map_or("", String::as_str),
            Self::Missing { library, .. }
            | Self::UnresolvedType { library, .. }
            | Self::Malformed { library, .. } => library,
            Self::Unresolvable { pending } => pending.first().map_or("", String::as_str),
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::detached(self.code(), self.library().to_string(), self.to_string())
    }
}

/// Build the rely set for a compile of `current`. Problems are reported to
/// `diagnostics`; the returned list is only complete when none were.
pub fn build(current: &str, references: &[ReferenceLibrary], diagnostics: &mut Diagnostics) -> Vec<RelyLibrary> {
    let (graph, mut errors) = RelyGraph::new(current, references);
    errors.extend(graph.missing());
    errors.extend(graph.cycles());

    if errors.is_empty() {
        match graph.instantiate() {
            Ok(libraries) => {
                tracing::debug!(count = libraries.len(), "rely graph built");
                return libraries;
            }
            Err(e) => errors = e,
        }
    }

    diagnostics.extend(errors.into_iter().map(RelyError::into_diagnostic));
    Vec::new()
}

pub mod error;
pub mod pool;
pub mod declaration;
pub mod types;
pub mod syntax;
pub mod table;
pub mod kernel;
pub mod compiling;
pub mod rely;
pub mod manager;
pub mod context;
pub mod builder;
pub mod library;

pub use builder::{Builder, CompileOptions, CompileState};
pub use compiling::SourceFile;
pub use declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
pub use error::{CompileError, Diagnostic, ErrorCode, InternalError};
pub use library::Library;
pub use rely::reference::ReferenceLibrary;
pub use types::{CompilingDefinition, CompilingType, TypeCode};

// ─── Public API ───────────────────────────────────────────────────────────────

/// Everything one compile run produced.
#[derive(Debug, Clone)]
pub struct Output {
    pub state: CompileState,
    pub diagnostics: Vec<Diagnostic>,
    pub library: Option<Library>,
    pub reference: Option<ReferenceLibrary>,
}

/// Compile `files` as library `name` against `relies` with default options.
pub fn compile(name: &str, files: Vec<SourceFile>, relies: Vec<ReferenceLibrary>) -> Output {
    let mut builder = Builder::new(name, files, relies);
    let state = builder.compile();
    Output {
        state,
        diagnostics: builder.diagnostics().to_vec(),
        library: builder.library().cloned(),
        reference: builder.reference().cloned(),
    }
}

//! The compile pipeline. Stages run in order and each one is gated: any
//! diagnostic it records stops the run before the next stage starts.
//!
//!   1. rely      rely graph from the supplied reference libraries
//!   2. parse     one namespace tree per file
//!   3. merge     per-file trees into one table with final identities
//!   4. link      names to types: imports, inherits, signatures
//!   5. check     overloads, inheritance and interface implementation
//!   6. export    reference surface for future dependents
//!   7. address   global addresses and member offsets
//!   8. generate  relocations, then the code generator

pub mod address;
pub mod check;
pub mod export;
pub mod generate;
pub mod link;
pub mod merge;
pub mod relocation;

use serde::{Deserialize, Serialize};

use crate::compiling::{CompilingLibrary, SourceFile};
use crate::error::{CompileError, Diagnostic, Diagnostics, InternalError};
use crate::library::Library;
use crate::manager::DeclarationManager;
use crate::pool::CollectionPool;
use crate::rely::{self, reference::ReferenceLibrary};
use crate::syntax::parse_file;
use generate::{CodeGenerator, GenerationUnit, NullGenerator};

// ─── State and options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileState {
    Unstart,
    Compiling,
    Completed,
    /// A stage recorded diagnostics.
    Failed,
    /// The compiler broke one of its own invariants.
    Accident,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Functions without an explicit trailing exit are not given one.
    pub ignore_implicit_exit: bool,
    pub generate_symbol_table: bool,
    pub generate_debug_table: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { ignore_implicit_exit: false, generate_symbol_table: true, generate_debug_table: false }
    }
}

impl CompileOptions {
    pub fn with_ignore_implicit_exit(mut self, on: bool) -> Self {
        self.ignore_implicit_exit = on;
        self
    }

    pub fn with_symbol_table(mut self, on: bool) -> Self {
        self.generate_symbol_table = on;
        self
    }

    pub fn with_debug_table(mut self, on: bool) -> Self {
        self.generate_debug_table = on;
        self
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Compiles one library from source files against previously compiled
/// reference libraries.
pub struct Builder {
    name: String,
    files: Vec<SourceFile>,
    references: Vec<ReferenceLibrary>,
    options: CompileOptions,
    generator: Box<dyn CodeGenerator>,
    pool: CollectionPool,
    state: CompileState,
    diagnostics: Diagnostics,
    compiled: Option<CompilingLibrary>,
    library: Option<Library>,
    reference: Option<ReferenceLibrary>,
}

impl Builder {
    pub fn new(name: impl Into<String>, files: Vec<SourceFile>, relies: Vec<ReferenceLibrary>) -> Self {
        Self {
            name: name.into(),
            files,
            references: relies,
            options: CompileOptions::default(),
            generator: Box::new(NullGenerator),
            pool: CollectionPool::new(),
            state: CompileState::Unstart,
            diagnostics: Diagnostics::new(),
            compiled: None,
            library: None,
            reference: None,
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_generator(mut self, generator: impl CodeGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    pub fn state(&self) -> CompileState { self.state }

    pub fn options(&self) -> &CompileOptions { &self.options }

    pub fn diagnostics(&self) -> &[Diagnostic] { self.diagnostics.as_slice() }

    /// The runtime artifact of the last completed compile.
    pub fn library(&self) -> Option<&Library> { self.library.as_ref() }

    /// The exported surface of the last completed compile.
    pub fn reference(&self) -> Option<&ReferenceLibrary> { self.reference.as_ref() }

    /// The linked symbol table of the last completed compile.
    pub fn compiled(&self) -> Option<&CompilingLibrary> { self.compiled.as_ref() }

    #[tracing::instrument(skip(self), fields(library = %self.name, files = self.files.len()))]
    pub fn compile(&mut self) -> CompileState {
        if self.state == CompileState::Compiling {
            tracing::error!(error = %InternalError::Reentrant, "compile aborted");
            self.state = CompileState::Accident;
            return self.state;
        }
        self.state = CompileState::Compiling;
        self.diagnostics.clear();
        self.compiled = None;
        self.library = None;
        self.reference = None;

        let result = self.run();
        // Pooled containers go back regardless of how the run ended.
        tracing::debug!(checkouts = self.pool.checkouts(), reuses = self.pool.reuses(), "releasing collection pool");
        let released = self.pool.clear().map_err(CompileError::from);

        self.state = match result.and(released) {
            Ok(()) => {
                tracing::info!("compile completed");
                CompileState::Completed
            }
            Err(CompileError::Failed { stage, count }) => {
                tracing::info!(stage, count, "compile failed");
                CompileState::Failed
            }
            Err(CompileError::Internal(error)) => {
                tracing::error!(%error, "internal compiler error");
                CompileState::Accident
            }
        };
        self.state
    }

    fn run(&mut self) -> Result<(), CompileError> {
        let diagnostics = &mut self.diagnostics;

        let relies = rely::build(&self.name, &self.references, diagnostics);
        diagnostics.checkpoint("rely")?;

        let mut parsed = Vec::with_capacity(self.files.len());
        for file in &self.files {
            match parse_file(&file.path, &file.text) {
                Ok(syntax) => parsed.push(syntax),
                Err(errors) => diagnostics.extend(errors),
            }
        }
        diagnostics.checkpoint("parse")?;

        let mut library = merge::merge(&self.name, &self.files, parsed, diagnostics);
        diagnostics.checkpoint("merge")?;

        link::link(&mut library, &relies, &self.pool, diagnostics);
        diagnostics.checkpoint("link")?;

        check::check(&library, &relies, &self.pool, diagnostics);
        diagnostics.checkpoint("check")?;

        let reference = export::export(&library, &relies, diagnostics);
        diagnostics.checkpoint("export")?;

        let layout = address::assign(&mut library.table);

        let artifact = {
            let manager = DeclarationManager::new(&self.pool, &library.table, &relies);
            let relocations = relocation::build(&library, &manager, diagnostics);
            diagnostics.checkpoint("relocation")?;

            let unit = GenerationUnit {
                library: &library,
                manager: &manager,
                relocations: &relocations,
                options: &self.options,
            };
            let generated = self.generator.generate(&unit, diagnostics);
            diagnostics.checkpoint("generate")?;
            Library::build(&unit, &relies, layout, generated)?
        };

        self.compiled = Some(library);
        self.library = Some(artifact);
        self.reference = Some(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_generate_only_symbols() {
        let options = CompileOptions::default();
        assert!(options.generate_symbol_table);
        assert!(!options.generate_debug_table);
        assert!(!options.ignore_implicit_exit);
        let options = options.with_debug_table(true).with_symbol_table(false);
        assert!(options.generate_debug_table);
        assert!(!options.generate_symbol_table);
    }

    #[test]
    fn builder_starts_unstarted() {
        let builder = Builder::new("Empty", Vec::new(), Vec::new());
        assert_eq!(builder.state(), CompileState::Unstart);
        assert!(builder.library().is_none());
    }

    #[test]
    fn empty_library_compiles() {
        let mut builder = Builder::new("Empty", Vec::new(), Vec::new());
        assert_eq!(builder.compile(), CompileState::Completed);
        assert!(builder.diagnostics().is_empty());
        assert_eq!(builder.reference().map(|r| r.name.as_str()), Some("Empty"));
    }

    #[test]
    fn recompiling_starts_from_scratch() {
        let files = vec![SourceFile::new("a.brook", "integer x\ninteger x\n")];
        let mut builder = Builder::new("Twice", files, Vec::new());
        assert_eq!(builder.compile(), CompileState::Failed);
        assert_eq!(builder.diagnostics().len(), 1);
        assert_eq!(builder.compile(), CompileState::Failed);
        assert_eq!(builder.diagnostics().len(), 1);
    }

    #[test]
    fn stuck_compiling_state_is_an_accident() {
        let mut builder = Builder::new("Stuck", Vec::new(), Vec::new());
        builder.state = CompileState::Compiling;
        assert_eq!(builder.compile(), CompileState::Accident);
    }

    #[derive(Default)]
    struct Counting {
        bodies: usize,
    }

    impl CodeGenerator for Counting {
        fn generate(&mut self, unit: &GenerationUnit<'_>, _diagnostics: &mut Diagnostics) -> generate::GeneratedCode {
            self.bodies = unit.bodies().len();
            generate::GeneratedCode { code: vec![0xAA; self.bodies], strings: Vec::new() }
        }
    }

    #[test]
    fn custom_generator_output_reaches_the_library() {
        let files = vec![SourceFile::new("a.brook", "Run()\n    Go()\nGo()\n    Run()\n")];
        let mut builder = Builder::new("Gen", files, Vec::new()).with_generator(Counting::default());
        assert_eq!(builder.compile(), CompileState::Completed);
        assert_eq!(builder.library().map(|l| l.code.len()), Some(2));
    }
}

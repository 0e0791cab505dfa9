//! The library under compilation: its table plus per-file state.

use crate::declaration::LibraryId;
use crate::syntax::ast::ImportDecl;
use crate::table::{Anchor, LibraryTable};

/// One input file, as handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self { path: path.into(), text: text.into() }
    }
}

/// A space in any library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceRef {
    pub library: LibraryId,
    pub space: u32,
}

impl SpaceRef {
    pub const fn new(library: LibraryId, space: u32) -> Self {
        Self { library, space }
    }
}

#[derive(Debug, Clone)]
pub struct CompilingFile {
    pub path: String,
    pub imports: Vec<ImportDecl>,
    /// Imported spaces, filled in by link.
    pub spaces: Vec<SpaceRef>,
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct CompilingLibrary {
    pub table: LibraryTable,
    pub files: Vec<CompilingFile>,
}

impl CompilingLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self { table: LibraryTable::new(name, LibraryId::Local), files: Vec::new() }
    }

    pub fn name(&self) -> &str { &self.table.name }

    pub fn path(&self, anchor: &Anchor) -> &str {
        self.files.get(anchor.file as usize).map_or("", |f| f.path.as_str())
    }

    pub fn imports(&self, anchor: &Anchor) -> &[SpaceRef] {
        self.files.get(anchor.file as usize).map_or(&[], |f| f.spaces.as_slice())
    }
}

//! Stage 8 (second half): the code-generation hook.
//!
//! Statement parsing and bytecode emission live outside this crate. A
//! generator receives the linked, read-only library together with the
//! relocations and options, and returns bytecode plus its string pool.

use rustc_hash::FxHashSet;

use crate::builder::CompileOptions;
use crate::builder::relocation::Relocation;
use crate::compiling::CompilingLibrary;
use crate::declaration::Declaration;
use crate::error::Diagnostics;
use crate::manager::DeclarationManager;
use crate::syntax::ast::Body;
use crate::table::Function;

/// Everything a generator may read.
pub struct GenerationUnit<'a> {
    pub library: &'a CompilingLibrary,
    pub manager: &'a DeclarationManager<'a>,
    pub relocations: &'a [Relocation],
    pub options: &'a CompileOptions,
}

impl<'a> GenerationUnit<'a> {
    /// Every function with a body, with the declaration naming it.
    pub fn bodies(&self) -> Vec<(Declaration, &'a Function, &'a Body)> {
        let table = &self.library.table;
        let mut out = Vec::new();
        for group in table.overload_groups() {
            let Some(functions) = table.overloads(group) else { continue };
            for (index, function) in functions.iter().enumerate() {
                let body = function.source.as_ref().and_then(|s| s.body.as_ref());
                let declaration = table.overload_declaration(group, index as u32);
                if let (Some(body), Some(declaration)) = (body, declaration) {
                    out.push((declaration, function, body));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: Vec<u8>,
    pub strings: Vec<String>,
}

pub trait CodeGenerator {
    fn generate(&mut self, unit: &GenerationUnit<'_>, diagnostics: &mut Diagnostics) -> GeneratedCode;
}

/// Emits no bytecode. String literals used as global initializers still go
/// into the pool, so the artifact stays meaningful for tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGenerator;

impl CodeGenerator for NullGenerator {
    fn generate(&mut self, unit: &GenerationUnit<'_>, _diagnostics: &mut Diagnostics) -> GeneratedCode {
        let mut seen = FxHashSet::default();
        let strings = unit
            .library
            .table
            .variables
            .iter()
            .filter_map(|v| v.initializer.as_deref().and_then(string_literal))
            .filter(|s| seen.insert(*s))
            .map(str::to_string)
            .collect();
        GeneratedCode { code: Vec::new(), strings }
    }
}

fn string_literal(text: &str) -> Option<&str> {
    text.trim().strip_prefix('"')?.strip_suffix('"')
}

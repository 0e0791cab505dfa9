//! The runtime artifact of a completed compile.
//!
//! Everything here is already resolved: types are `CompilingType`s in this
//! compile's numbering (`Rely(i)` is `dependencies[i]`), addresses and
//! offsets are final, and relocations say which function each dispatch slot
//! binds to.

use serde::{Deserialize, Serialize};

use crate::builder::address::Layout;
use crate::builder::generate::{GeneratedCode, GenerationUnit};
use crate::builder::relocation::Relocation;
use crate::declaration::{Declaration, Visibility};
use crate::error::InternalError;
use crate::rely::RelyLibrary;
use crate::table::{Function, Method, Parameter};
use crate::types::CompilingType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub dependencies: Vec<String>,
    pub code: Vec<u8>,
    pub strings: Vec<String>,
    pub layout: Layout,
    /// Functions that run off their end return without an explicit exit.
    pub implicit_exit: bool,
    pub definitions: Vec<DefinitionTable>,
    pub interfaces: Vec<InterfaceTable>,
    pub delegates: Vec<SignatureTable>,
    pub coroutines: Vec<SignatureTable>,
    pub variables: Vec<GlobalEntry>,
    pub methods: Vec<MethodTable>,
    pub natives: Vec<MethodTable>,
    pub relocations: Vec<Relocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<Symbol>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<DebugEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub visibility: Visibility,
    pub params: Vec<CompilingType>,
    pub returns: Vec<CompilingType>,
    pub has_body: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodTable {
    pub name: String,
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub ty: CompilingType,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionTable {
    pub name: String,
    pub parent: CompilingType,
    pub interfaces: Vec<CompilingType>,
    /// Bytes of this class's own fields; the parent's block comes first.
    pub size: u32,
    pub fields: Vec<FieldEntry>,
    pub methods: Vec<MethodTable>,
    pub constructors: Vec<FunctionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceTable {
    pub name: String,
    pub inherits: Vec<CompilingType>,
    pub methods: Vec<MethodTable>,
}

/// Delegate or coroutine signature. Coroutines have no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureTable {
    pub name: String,
    pub params: Vec<CompilingType>,
    pub returns: Vec<CompilingType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalEntry {
    pub name: String,
    pub constant: bool,
    pub ty: CompilingType,
    pub address: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub declaration: Declaration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEntry {
    pub function: String,
    pub declaration: Declaration,
    pub path: String,
    pub first_line: usize,
    pub last_line: usize,
}

// ─── Construction ─────────────────────────────────────────────────────────────

fn types(params: &[Parameter]) -> Vec<CompilingType> {
    params.iter().map(|p| p.ty).collect()
}

fn function_entry(function: &Function) -> FunctionEntry {
    FunctionEntry {
        visibility: function.visibility,
        params: types(&function.params),
        returns: function.returns.clone(),
        has_body: function.source.as_ref().is_some_and(|s| s.body.is_some()),
    }
}

fn method_table(method: &Method) -> MethodTable {
    MethodTable { name: method.name.clone(), functions: method.functions.iter().map(function_entry).collect() }
}

impl Library {
    pub fn build(
        unit: &GenerationUnit<'_>,
        relies: &[RelyLibrary],
        layout: Layout,
        generated: GeneratedCode,
    ) -> Result<Self, InternalError> {
        let table = &unit.library.table;
        let definitions = table
            .definitions
            .iter()
            .map(|d| DefinitionTable {
                name: d.name.clone(),
                parent: d.parent,
                interfaces: d.interfaces.clone(),
                size: d.size,
                fields: d
                    .variables
                    .iter()
                    .map(|v| FieldEntry { name: v.name.clone(), ty: v.ty, offset: v.offset })
                    .collect(),
                methods: d.methods.iter().map(method_table).collect(),
                constructors: d.constructors.iter().map(function_entry).collect(),
            })
            .collect();
        let interfaces = table
            .interfaces
            .iter()
            .map(|i| InterfaceTable {
                name: i.name.clone(),
                inherits: i.inherits.clone(),
                methods: i.methods.iter().map(method_table).collect(),
            })
            .collect();
        let delegates = table
            .delegates
            .iter()
            .map(|d| SignatureTable { name: d.name.clone(), params: types(&d.params), returns: d.returns.clone() })
            .collect();
        let coroutines = table
            .coroutines
            .iter()
            .map(|c| SignatureTable { name: c.name.clone(), params: Vec::new(), returns: c.returns.clone() })
            .collect();
        let variables = table
            .variables
            .iter()
            .map(|v| GlobalEntry { name: v.name.clone(), constant: v.constant, ty: v.ty, address: v.address })
            .collect();

        let symbols = unit.options.generate_symbol_table.then(|| symbols(unit));
        let debug = if unit.options.generate_debug_table { Some(debug_table(unit)?) } else { None };

        Ok(Self {
            name: table.name.clone(),
            dependencies: relies.iter().map(|r| r.name().to_string()).collect(),
            code: generated.code,
            strings: generated.strings,
            layout,
            implicit_exit: !unit.options.ignore_implicit_exit,
            definitions,
            interfaces,
            delegates,
            coroutines,
            variables,
            methods: table.methods.iter().map(method_table).collect(),
            natives: table.natives.iter().map(method_table).collect(),
            relocations: unit.relocations.to_vec(),
            symbols,
            debug,
        })
    }
}

/// Every named declaration, with functions listed once per overload.
/// Sorted by qualified name.
fn symbols(unit: &GenerationUnit<'_>) -> Vec<Symbol> {
    let table = &unit.library.table;
    let mut declarations: Vec<Declaration> = Vec::new();
    let plain = |d: &&Declaration| !d.kind.is_method();

    for space in &table.spaces {
        declarations.extend(space.declarations.values().filter(plain));
    }
    for definition in &table.definitions {
        declarations.extend(definition.members.values().filter(plain));
    }
    for group in table.overload_groups() {
        let count = table.overloads(group).map_or(0, <[Function]>::len);
        declarations.extend((0..count as u32).filter_map(|o| table.overload_declaration(group, o)));
    }

    let mut symbols: Vec<Symbol> = declarations
        .into_iter()
        .map(|declaration| Symbol { name: unit.manager.get_declaration_full_name(declaration), declaration })
        .collect();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));
    symbols
}

/// Source lines of every function body. A body or anchor outside its file
/// means the table no longer matches the text it was built from.
fn debug_table(unit: &GenerationUnit<'_>) -> Result<Vec<DebugEntry>, InternalError> {
    let library = unit.library;
    let mut entries = Vec::new();
    for (declaration, function, body) in unit.bodies() {
        let Some(source) = &function.source else { continue };
        let Some(file) = library.files.get(source.anchor.file as usize) else {
            return Err(InternalError::UnknownValue { what: "file index", value: source.anchor.file.to_string() });
        };
        let line = body.last_line.max(source.anchor.span.line);
        if line > file.lines || body.first_line > body.last_line {
            return Err(InternalError::AnchorMismatch { path: file.path.clone(), line, lines: file.lines });
        }
        entries.push(DebugEntry {
            function: unit.manager.get_declaration_full_name(declaration),
            declaration,
            path: file.path.clone(),
            first_line: body.first_line,
            last_line: body.last_line,
        });
    }
    entries.sort_by_key(|e| (e.path.clone(), e.first_line));
    Ok(entries)
}

//! Stage 4: resolve every name reference recorded by merge.
//!
//! Imports first, then inheritance lists (with cycles broken), then every
//! signature and variable type. Resolutions are collected against the
//! immutable table and written back afterwards.

use rustc_hash::FxHashSet;

use crate::compiling::{CompilingFile, CompilingLibrary, SpaceRef};
use crate::context::Context;
use crate::declaration::{Declaration, DeclarationKind, LibraryId};
use crate::error::{Diagnostics, ErrorCode};
use crate::manager::DeclarationManager;
use crate::pool::CollectionPool;
use crate::rely::RelyLibrary;
use crate::syntax::ast::TypeExpr;
use crate::table::{Anchor, FunctionSource, LibraryTable, ROOT_SPACE};
use crate::types::{CompilingType, TypeCode, kernel_index};

pub fn link(library: &mut CompilingLibrary, relies: &[RelyLibrary], pool: &CollectionPool, diagnostics: &mut Diagnostics) {
    resolve_imports(library, relies, pool, diagnostics);

    let inherits = resolve_inherits(library, relies, pool, diagnostics);
    inherits.apply(&mut library.table);
    break_class_cycles(library, diagnostics);
    break_interface_cycles(library, diagnostics);

    let signatures = resolve_signatures(library, relies, pool, diagnostics);
    tracing::debug!(
        functions = signatures.functions.len(),
        variables = signatures.members.len() + signatures.globals.len(),
        "linked"
    );
    signatures.apply(&mut library.table);
}

fn path_of<'f>(files: &'f [CompilingFile], anchor: &Anchor) -> &'f str {
    files.get(anchor.file as usize).map_or("", |f| f.path.as_str())
}

fn resolve_types(cx: &Context<'_>, exprs: &[TypeExpr], diagnostics: &mut Diagnostics) -> Vec<CompilingType> {
    exprs
        .iter()
        .map(|e| cx.find_type(e, diagnostics).unwrap_or(CompilingType::INVALID))
        .collect()
}

// ─── Imports ─────────────────────────────────────────────────────────────────

fn resolve_imports(library: &mut CompilingLibrary, relies: &[RelyLibrary], pool: &CollectionPool, diagnostics: &mut Diagnostics) {
    let mut resolved = Vec::with_capacity(library.files.len());
    {
        let manager = DeclarationManager::new(pool, &library.table, relies);
        for file in &library.files {
            let cx = Context::new(&manager, ROOT_SPACE, None, &[], &file.path);
            let mut spaces: Vec<SpaceRef> = Vec::new();
            for import in &file.imports {
                match cx.find_space(&import.path) {
                    Some(space) if !spaces.contains(&space) => spaces.push(space),
                    Some(_) => {}
                    None => diagnostics.report(
                        ErrorCode::K004,
                        &file.path,
                        &import.span,
                        format!("space `{}` not found", import.path.join(".")),
                    ),
                }
            }
            resolved.push(spaces);
        }
    }
    for (file, spaces) in library.files.iter_mut().zip(resolved) {
        file.spaces = spaces;
    }
}

// ─── Inheritance ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inherits {
    classes: Vec<(usize, CompilingType, Vec<CompilingType>)>,
    interfaces: Vec<(usize, Vec<CompilingType>)>,
}

impl Inherits {
    fn apply(self, table: &mut LibraryTable) {
        for (index, parent, interfaces) in self.classes {
            let d = &mut table.definitions[index];
            d.parent = parent;
            d.interfaces = interfaces;
        }
        for (index, inherits) in self.interfaces {
            table.interfaces[index].inherits = inherits;
        }
    }
}

/// Classes may derive from other classes or the root `handle`, never from
/// the kernel's value types or reference roots.
fn can_be_parent(ty: CompilingType) -> bool {
    !ty.is_array()
        && ty.definition.code == TypeCode::Handle
        && (ty.definition.library != LibraryId::Kernel || ty.definition.index == kernel_index::HANDLE)
}

fn is_interface(ty: CompilingType) -> bool {
    !ty.is_array() && ty.definition.code == TypeCode::Interface
}

fn resolve_inherits(
    library: &CompilingLibrary,
    relies: &[RelyLibrary],
    pool: &CollectionPool,
    diagnostics: &mut Diagnostics,
) -> Inherits {
    let manager = DeclarationManager::new(pool, &library.table, relies);
    let mut out = Inherits::default();

    for (index, d) in library.table.definitions.iter().enumerate() {
        let Some(source) = &d.source else { continue };
        let path = library.path(&source.anchor);
        let cx = Context::new(&manager, d.space, None, library.imports(&source.anchor), path);
        let mut parent = CompilingType::HANDLE;
        let mut interfaces = Vec::new();

        for (position, expr) in source.inherits.iter().enumerate() {
            let Some(ty) = cx.find_type(expr, diagnostics) else { continue };
            if is_interface(ty) {
                if !interfaces.contains(&ty) {
                    interfaces.push(ty);
                }
            } else if position == 0 && can_be_parent(ty) {
                parent = ty;
            } else if position == 0 {
                diagnostics.report(
                    ErrorCode::V001,
                    path,
                    &expr.span,
                    format!("`{expr}` cannot be the parent of `{}`; expected a class or interface", d.name),
                );
            } else {
                diagnostics.report(
                    ErrorCode::V003,
                    path,
                    &expr.span,
                    format!("`{expr}` is not an interface; only the first entry may name a parent class"),
                );
            }
        }
        out.classes.push((index, parent, interfaces));
    }

    for (index, i) in library.table.interfaces.iter().enumerate() {
        let Some(source) = &i.source else { continue };
        let path = library.path(&source.anchor);
        let cx = Context::new(&manager, i.space, None, library.imports(&source.anchor), path);
        let mut inherits = Vec::new();
        for expr in &source.inherits {
            let Some(ty) = cx.find_type(expr, diagnostics) else { continue };
            if is_interface(ty) {
                if !inherits.contains(&ty) {
                    inherits.push(ty);
                }
            } else {
                diagnostics.report(
                    ErrorCode::V003,
                    path,
                    &expr.span,
                    format!("interface `{}` can only inherit interfaces; `{expr}` is not one", i.name),
                );
            }
        }
        out.interfaces.push((index, inherits));
    }
    out
}

/// A class reaching itself through its parents gets `handle` as parent, which
/// breaks the cycle for every other member too.
fn break_class_cycles(library: &mut CompilingLibrary, diagnostics: &mut Diagnostics) {
    let files = &library.files;
    let table = &mut library.table;

    for start in 0..table.definitions.len() {
        let mut chain = vec![start];
        let mut current = table.definitions[start].parent.definition;
        while current.library == LibraryId::Local && current.code == TypeCode::Handle {
            let next = current.index as usize;
            if next == start {
                let mut names: Vec<&str> = chain.iter().map(|&i| table.definitions[i].name.as_str()).collect();
                names.push(&table.definitions[start].name);
                let message = format!("circular inheritance: {}", names.join(" -> "));
                if let Some(source) = &table.definitions[start].source {
                    diagnostics.report(ErrorCode::V002, path_of(files, &source.anchor), &source.anchor.span, message);
                }
                table.definitions[start].parent = CompilingType::HANDLE;
                break;
            }
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = table.definitions[next].parent.definition;
        }
    }
}

/// Local interfaces reachable from `from` through base interfaces, as the
/// path that reaches `to`.
fn interface_path(table: &LibraryTable, from: usize, to: usize) -> Option<Vec<usize>> {
    fn visit(table: &LibraryTable, at: usize, to: usize, seen: &mut FxHashSet<usize>, path: &mut Vec<usize>) -> bool {
        path.push(at);
        if at == to {
            return true;
        }
        if seen.insert(at) {
            for inherit in &table.interfaces[at].inherits {
                let d = inherit.definition;
                if d.library == LibraryId::Local && d.code == TypeCode::Interface
                    && visit(table, d.index as usize, to, seen, path)
                {
                    return true;
                }
            }
        }
        path.pop();
        false
    }
    let mut path = Vec::new();
    visit(table, from, to, &mut FxHashSet::default(), &mut path).then_some(path)
}

/// Remove each base-interface edge that closes a cycle.
fn break_interface_cycles(library: &mut CompilingLibrary, diagnostics: &mut Diagnostics) {
    let files = &library.files;
    let table = &mut library.table;

    for index in 0..table.interfaces.len() {
        let mut edge = 0;
        while edge < table.interfaces[index].inherits.len() {
            let target = table.interfaces[index].inherits[edge].definition;
            let cycle = if target.library == LibraryId::Local {
                interface_path(table, target.index as usize, index)
            } else {
                None
            };
            let Some(path) = cycle else {
                edge += 1;
                continue;
            };
            let mut names = vec![table.interfaces[index].name.as_str()];
            names.extend(path.iter().map(|&i| table.interfaces[i].name.as_str()));
            let message = format!("circular interface inheritance: {}", names.join(" -> "));
            if let Some(source) = &table.interfaces[index].source {
                diagnostics.report(ErrorCode::V005, path_of(files, &source.anchor), &source.anchor.span, message);
            }
            table.interfaces[index].inherits.remove(edge);
        }
    }
}

// ─── Signatures and variables ────────────────────────────────────────────────

#[derive(Default)]
struct Signatures {
    functions: Vec<(Declaration, Vec<CompilingType>, Vec<CompilingType>)>,
    /// (definition, variable, type)
    members: Vec<(usize, usize, CompilingType)>,
    globals: Vec<(usize, CompilingType)>,
}

impl Signatures {
    fn apply(self, table: &mut LibraryTable) {
        for (declaration, params, returns) in self.functions {
            let Some(signature) = table.signature_mut(declaration) else { continue };
            if let Some(slots) = signature.params {
                for (slot, ty) in slots.iter_mut().zip(params) {
                    slot.ty = ty;
                }
            }
            *signature.returns = returns;
        }
        for (definition, variable, ty) in self.members {
            table.definitions[definition].variables[variable].ty = ty;
        }
        for (index, ty) in self.globals {
            table.variables[index].ty = ty;
        }
    }
}

struct SignatureResolver<'l, 'd> {
    library: &'l CompilingLibrary,
    manager: DeclarationManager<'l>,
    diagnostics: &'d mut Diagnostics,
    out: Signatures,
}

impl SignatureResolver<'_, '_> {
    fn function(&mut self, declaration: Declaration, space: u32, source: &FunctionSource) {
        let cx = Context::new(
            &self.manager,
            space,
            None,
            self.library.imports(&source.anchor),
            self.library.path(&source.anchor),
        );
        let params = resolve_types(&cx, &source.params, self.diagnostics);
        let returns = resolve_types(&cx, &source.returns, self.diagnostics);
        self.out.functions.push((declaration, params, returns));
    }

    fn variable(&mut self, space: u32, anchor: &Anchor, expr: &TypeExpr) -> CompilingType {
        let cx = Context::new(&self.manager, space, None, self.library.imports(anchor), self.library.path(anchor));
        cx.find_type(expr, self.diagnostics).unwrap_or(CompilingType::INVALID)
    }

    fn run(mut self) -> Signatures {
        let library = self.library;
        let table = &library.table;
        let local = |visibility, kind| Declaration::new(LibraryId::Local, visibility, kind);

        for (d_index, d) in table.definitions.iter().enumerate() {
            let definition = d_index as u32;
            for (v_index, v) in d.variables.iter().enumerate() {
                let Some(source) = &v.source else { continue };
                let ty = self.variable(d.space, &source.anchor, &source.ty);
                self.out.members.push((d_index, v_index, ty));
            }
            for (m_index, m) in d.methods.iter().enumerate() {
                for (overload, f) in m.functions.iter().enumerate() {
                    let Some(source) = &f.source else { continue };
                    let kind = DeclarationKind::MemberFunction {
                        definition,
                        method: m_index as u32,
                        overload: overload as u32,
                    };
                    self.function(local(f.visibility, kind), d.space, source);
                }
            }
            for (overload, f) in d.constructors.iter().enumerate() {
                let Some(source) = &f.source else { continue };
                let kind = DeclarationKind::Constructor { definition, overload: overload as u32 };
                self.function(local(f.visibility, kind), d.space, source);
            }
        }

        for (i_index, i) in table.interfaces.iter().enumerate() {
            for (m_index, m) in i.methods.iter().enumerate() {
                for (overload, f) in m.functions.iter().enumerate() {
                    let Some(source) = &f.source else { continue };
                    let kind = DeclarationKind::InterfaceFunction {
                        interface: i_index as u32,
                        method: m_index as u32,
                        overload: overload as u32,
                    };
                    self.function(local(f.visibility, kind), i.space, source);
                }
            }
        }

        for (groups, native) in [(&table.methods, false), (&table.natives, true)] {
            for (m_index, m) in groups.iter().enumerate() {
                for (overload, f) in m.functions.iter().enumerate() {
                    let Some(source) = &f.source else { continue };
                    let (method, overload) = (m_index as u32, overload as u32);
                    let kind = if native {
                        DeclarationKind::NativeFunction { method, overload }
                    } else {
                        DeclarationKind::GlobalFunction { method, overload }
                    };
                    self.function(local(f.visibility, kind), m.space, source);
                }
            }
        }

        for (index, d) in table.delegates.iter().enumerate() {
            let Some(source) = &d.source else { continue };
            self.function(local(d.visibility, DeclarationKind::Delegate { index: index as u32 }), d.space, source);
        }
        for (index, c) in table.coroutines.iter().enumerate() {
            let Some(source) = &c.source else { continue };
            self.function(local(c.visibility, DeclarationKind::Coroutine { index: index as u32 }), c.space, source);
        }

        for (index, v) in table.variables.iter().enumerate() {
            let Some(source) = &v.source else { continue };
            let ty = self.variable(v.space, &source.anchor, &source.ty);
            self.out.globals.push((index, ty));
        }

        self.out
    }
}

fn resolve_signatures(
    library: &CompilingLibrary,
    relies: &[RelyLibrary],
    pool: &CollectionPool,
    diagnostics: &mut Diagnostics,
) -> Signatures {
    SignatureResolver {
        library,
        manager: DeclarationManager::new(pool, &library.table, relies),
        diagnostics,
        out: Signatures::default(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::merge::merge;
    use crate::compiling::SourceFile;
    use crate::syntax::parse_file;

    fn link_sources(sources: &[&str]) -> (CompilingLibrary, Vec<ErrorCode>) {
        let files: Vec<SourceFile> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| SourceFile::new(format!("f{i}.brook"), *s))
            .collect();
        let parsed = files.iter().map(|f| parse_file(&f.path, &f.text).expect("parse failed")).collect();
        let mut diagnostics = Diagnostics::new();
        let mut library = merge("Test", &files, parsed, &mut diagnostics);
        assert!(diagnostics.is_empty(), "merge failed: {:?}", diagnostics.as_slice());
        link(&mut library, &[], &CollectionPool::new(), &mut diagnostics);
        let codes = diagnostics.iter().map(|d| d.code).collect();
        (library, codes)
    }

    fn def(library: &CompilingLibrary, name: &str) -> usize {
        library.table.definitions.iter().position(|d| d.name == name).expect(name)
    }

    #[test]
    fn parent_and_interfaces_resolve() {
        let (lib, codes) = link_sources(&["interface Shape\nclass Base\nclass Square : Base, Shape\n"]);
        assert!(codes.is_empty(), "{codes:?}");
        let square = &lib.table.definitions[def(&lib, "Square")];
        assert_eq!(square.parent.definition.index, def(&lib, "Base") as u32);
        assert_eq!(square.interfaces.len(), 1);
        assert_eq!(lib.table.definitions[def(&lib, "Base")].parent, CompilingType::HANDLE);
    }

    #[test]
    fn interface_first_is_not_a_parent() {
        let (lib, codes) = link_sources(&["interface Shape\nclass Square : Shape\n"]);
        assert!(codes.is_empty());
        let square = &lib.table.definitions[0];
        assert_eq!(square.parent, CompilingType::HANDLE);
        assert_eq!(square.interfaces.len(), 1);
    }

    #[test]
    fn value_type_parent_is_v001() {
        let (_, codes) = link_sources(&["class Bad : integer\n"]);
        assert_eq!(codes, vec![ErrorCode::V001]);
        let (_, codes) = link_sources(&["class Bad : array\n"]);
        assert_eq!(codes, vec![ErrorCode::V001]);
    }

    #[test]
    fn class_after_first_position_is_v003() {
        let (_, codes) = link_sources(&["class A\nclass B\nclass C : A, B\n"]);
        assert_eq!(codes, vec![ErrorCode::V003]);
    }

    #[test]
    fn circular_inheritance_is_reported_once_and_broken() {
        let (lib, codes) = link_sources(&["class A : C\nclass B : A\nclass C : B\n"]);
        assert_eq!(codes, vec![ErrorCode::V002]);
        assert_eq!(lib.table.definitions[0].parent, CompilingType::HANDLE);
    }

    #[test]
    fn circular_interfaces_lose_the_closing_edge() {
        let (lib, codes) = link_sources(&["interface I : J\ninterface J : I\n"]);
        assert_eq!(codes, vec![ErrorCode::V005]);
        assert!(lib.table.interfaces[0].inherits.is_empty());
        assert_eq!(lib.table.interfaces[1].inherits.len(), 1);
    }

    #[test]
    fn signatures_and_variables_get_types() {
        let (lib, codes) = link_sources(&[
            "space Geo\n    public class Shape\n        real[] corners\n        real, real Size(integer i)\n    Shape Make(real r)\n",
        ]);
        assert!(codes.is_empty(), "{codes:?}");
        let shape = &lib.table.definitions[0];
        assert_eq!(shape.variables[0].ty, CompilingType::REAL.definition.with_dimension(1));
        let size = &shape.methods[0].functions[0];
        assert_eq!(size.params[0].ty, CompilingType::INTEGER);
        assert_eq!(size.returns, vec![CompilingType::REAL, CompilingType::REAL]);
        let make = &lib.table.methods[0].functions[0];
        assert_eq!(make.returns[0].definition.library, LibraryId::Local);
    }

    #[test]
    fn imports_make_spaces_visible() {
        let (_, codes) = link_sources(&["space Geo\n    public class Shape\n", "import Geo\nShape s\n"]);
        assert!(codes.is_empty(), "{codes:?}");
        let (_, codes) = link_sources(&["space Geo\n    public class Shape\n", "Shape s\n"]);
        assert_eq!(codes, vec![ErrorCode::K001]);
    }

    #[test]
    fn unknown_import_is_k004() {
        let (_, codes) = link_sources(&["import Nowhere.Near\ninteger x\n"]);
        assert_eq!(codes, vec![ErrorCode::K004]);
    }

    #[test]
    fn every_unresolved_reference_is_reported() {
        let (_, codes) = link_sources(&["Missing f(Absent a, integer b)\nGhost g\n"]);
        assert_eq!(codes, vec![ErrorCode::K001, ErrorCode::K001, ErrorCode::K001]);
    }
}

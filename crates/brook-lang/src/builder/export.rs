//! Stage 6: the reference surface that dependents compile against.
//!
//! Public namespace-level declarations are exported, and of their members
//! only the public and protected ones. Every space is kept so space indices
//! stay stable. Local types are renumbered into export order; an exported
//! signature that mentions a type which is not exported cannot be rebuilt by
//! a dependent and is reported (G002).

use crate::compiling::CompilingLibrary;
use crate::declaration::{LibraryId, Visibility};
use crate::error::{Diagnostics, ErrorCode};
use crate::rely::RelyLibrary;
use crate::rely::reference::*;
use crate::table::{Anchor, Function, Method, Parameter};
use crate::types::{CompilingDefinition, CompilingType, TypeCode};

pub fn export(library: &CompilingLibrary, relies: &[RelyLibrary], diagnostics: &mut Diagnostics) -> ReferenceLibrary {
    let table = &library.table;
    let mut exporter = Exporter {
        library,
        diagnostics,
        definitions: numbering(table.definitions.iter().map(|d| d.visibility == Visibility::Public)),
        interfaces: numbering(table.interfaces.iter().map(|i| i.visibility == Visibility::Public)),
        delegates: numbering(table.delegates.iter().map(|d| d.visibility == Visibility::Public)),
        coroutines: numbering(table.coroutines.iter().map(|c| c.visibility == Visibility::Public)),
    };
    let mut reference = exporter.run();
    reference.dependencies = relies.iter().map(|r| r.name().to_string()).collect();

    tracing::debug!(
        definitions = reference.definitions.len(),
        interfaces = reference.interfaces.len(),
        methods = reference.methods.len(),
        "reference surface exported"
    );
    reference
}

/// Export index of each local type, or `None` for one that stays private.
fn numbering(public: impl Iterator<Item = bool>) -> Vec<Option<u32>> {
    let mut next = 0;
    public
        .map(|p| {
            let index = p.then_some(next);
            next += u32::from(p);
            index
        })
        .collect()
}

struct Exporter<'l, 'd> {
    library: &'l CompilingLibrary,
    diagnostics: &'d mut Diagnostics,
    definitions: Vec<Option<u32>>,
    interfaces: Vec<Option<u32>>,
    delegates: Vec<Option<u32>>,
    coroutines: Vec<Option<u32>>,
}

/// What an exported type reference is written for, for diagnostics.
struct User<'u> {
    name: &'u str,
    anchor: Option<&'u Anchor>,
}

impl Exporter<'_, '_> {
    fn local_name(&self, definition: CompilingDefinition) -> String {
        let table = &self.library.table;
        match table.type_name(definition) {
            Some((name, space)) => {
                let mut parts = table.space_path(space);
                parts.push(name);
                parts.join(".")
            }
            None => "<invalid>".to_string(),
        }
    }

    fn ty(&mut self, ty: CompilingType, user: &User<'_>) -> ReferenceType {
        let d = ty.definition;
        let library = match d.library {
            LibraryId::Kernel => ReferenceLibraryId::Kernel,
            LibraryId::Rely(index) => ReferenceLibraryId::Dependency(index),
            LibraryId::Local => {
                let numbering = match d.code {
                    TypeCode::Struct | TypeCode::Handle => &self.definitions,
                    TypeCode::Interface => &self.interfaces,
                    TypeCode::Delegate  => &self.delegates,
                    TypeCode::Coroutine => &self.coroutines,
                    TypeCode::Invalid   => return ReferenceType::INVALID,
                };
                if let Some(index) = numbering.get(d.index as usize).copied().flatten() {
                    return ReferenceType { library: ReferenceLibraryId::Own, code: d.code, index, dimension: ty.dimension };
                }
                let message = format!(
                    "`{}` is exported but refers to `{}`, which is not public",
                    user.name,
                    self.local_name(d)
                );
                if let Some(anchor) = user.anchor {
                    self.diagnostics.report(ErrorCode::G002, self.library.path(anchor), &anchor.span, message);
                }
                return ReferenceType::INVALID;
            }
        };
        ReferenceType { library, code: d.code, index: d.index, dimension: ty.dimension }
    }

    fn types(&mut self, types: &[CompilingType], user: &User<'_>) -> Vec<ReferenceType> {
        types.iter().map(|t| self.ty(*t, user)).collect()
    }

    fn params(&mut self, params: &[Parameter], user: &User<'_>) -> Vec<ReferenceParameter> {
        params
            .iter()
            .map(|p| ReferenceParameter { name: p.name.clone(), ty: self.ty(p.ty, user) })
            .collect()
    }

    fn function(&mut self, function: &Function, name: &str) -> ReferenceFunction {
        let user = User { name, anchor: function.source.as_ref().map(|s| &s.anchor) };
        ReferenceFunction {
            visibility: function.visibility,
            params: self.params(&function.params, &user),
            returns: self.types(&function.returns, &user),
        }
    }

    /// The group with only the functions `keep` accepts; `None` if none remain.
    fn method(&mut self, method: &Method, owner: Option<&str>, keep: impl Fn(&Function) -> bool) -> Option<ReferenceMethod> {
        let name = match owner {
            Some(owner) => format!("{owner}.{}", method.name),
            None => method.name.clone(),
        };
        let functions: Vec<ReferenceFunction> = method
            .functions
            .iter()
            .filter(|f| keep(*f))
            .map(|f| self.function(f, &name))
            .collect();
        (!functions.is_empty()).then(|| ReferenceMethod { name: method.name.clone(), space: method.space, functions })
    }

    fn run(&mut self) -> ReferenceLibrary {
        let library = self.library;
        let table = &library.table;
        let mut out = ReferenceLibrary::new(&table.name);
        let exported_member = |f: &Function| f.visibility.is_exported_member();
        let public = |f: &Function| f.visibility == Visibility::Public;

        for space in table.spaces.iter().skip(1) {
            out.spaces.push(ReferenceSpace { name: space.name.clone(), parent: space.parent });
        }

        for d in table.definitions.iter().filter(|d| d.visibility == Visibility::Public) {
            let user = User { name: &d.name, anchor: d.source.as_ref().map(|s| &s.anchor) };
            let parent = self.ty(d.parent, &user);
            let interfaces = self.types(&d.interfaces, &user);
            let mut variables = Vec::new();
            for v in d.variables.iter().filter(|v| v.visibility.is_exported_member()) {
                let name = format!("{}.{}", d.name, v.name);
                let user = User { name: &name, anchor: v.source.as_ref().map(|s| &s.anchor) };
                variables.push(ReferenceMemberVariable {
                    name: v.name.clone(),
                    visibility: v.visibility,
                    ty: self.ty(v.ty, &user),
                });
            }
            let methods = d
                .methods
                .iter()
                .filter_map(|m| self.method(m, Some(&d.name), exported_member))
                .collect();
            let constructors = d
                .constructors
                .iter()
                .filter(|f| exported_member(*f))
                .map(|f| self.function(f, &d.name))
                .collect();
            out.definitions.push(ReferenceDefinition {
                name: d.name.clone(),
                space: d.space,
                parent,
                interfaces,
                variables,
                methods,
                constructors,
            });
        }

        for i in table.interfaces.iter().filter(|i| i.visibility == Visibility::Public) {
            let user = User { name: &i.name, anchor: i.source.as_ref().map(|s| &s.anchor) };
            let inherits = self.types(&i.inherits, &user);
            let methods = i.methods.iter().filter_map(|m| self.method(m, Some(&i.name), |_| true)).collect();
            out.interfaces.push(ReferenceInterface { name: i.name.clone(), space: i.space, inherits, methods });
        }

        for d in table.delegates.iter().filter(|d| d.visibility == Visibility::Public) {
            let user = User { name: &d.name, anchor: d.source.as_ref().map(|s| &s.anchor) };
            out.delegates.push(ReferenceDelegate {
                name: d.name.clone(),
                space: d.space,
                params: self.params(&d.params, &user),
                returns: self.types(&d.returns, &user),
            });
        }

        for c in table.coroutines.iter().filter(|c| c.visibility == Visibility::Public) {
            let user = User { name: &c.name, anchor: c.source.as_ref().map(|s| &s.anchor) };
            out.coroutines.push(ReferenceCoroutine {
                name: c.name.clone(),
                space: c.space,
                returns: self.types(&c.returns, &user),
            });
        }

        for v in table.variables.iter().filter(|v| v.visibility == Visibility::Public) {
            let user = User { name: &v.name, anchor: v.source.as_ref().map(|s| &s.anchor) };
            out.variables.push(ReferenceVariable {
                name: v.name.clone(),
                space: v.space,
                constant: v.constant,
                ty: self.ty(v.ty, &user),
            });
        }

        out.methods = table.methods.iter().filter_map(|m| self.method(m, None, public)).collect();
        out.natives = table.natives.iter().filter_map(|m| self.method(m, None, public)).collect();
        out
    }
}

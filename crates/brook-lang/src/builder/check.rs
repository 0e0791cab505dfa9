//! Stage 5: validity checks on the linked table.

use rustc_hash::FxHashSet;

use crate::compiling::CompilingLibrary;
use crate::context::Context;
use crate::declaration::{Declaration, LibraryId, Visibility};
use crate::error::{Diagnostics, ErrorCode};
use crate::manager::DeclarationManager;
use crate::pool::CollectionPool;
use crate::rely::RelyLibrary;
use crate::table::{Anchor, Function};
use crate::types::{CompilingDefinition, CompilingType};

pub fn check(library: &CompilingLibrary, relies: &[RelyLibrary], pool: &CollectionPool, diagnostics: &mut Diagnostics) {
    let mut checker = Checker {
        library,
        manager: DeclarationManager::new(pool, &library.table, relies),
        diagnostics,
    };
    checker.duplicate_overloads();
    checker.hidden_variables();
    checker.interface_implementations();
    checker.delegate_bindings();
}

struct Checker<'l, 'd> {
    library: &'l CompilingLibrary,
    manager: DeclarationManager<'l>,
    diagnostics: &'d mut Diagnostics,
}

impl<'l> Checker<'l, '_> {
    fn report(&mut self, code: ErrorCode, anchor: &Anchor, message: String) {
        let path = self.library.path(anchor);
        self.diagnostics.report(code, path, &anchor.span, message);
    }

    fn returns(&self, returns: &[CompilingType]) -> String {
        let names: Vec<String> = returns.iter().map(|t| self.manager.type_full_name(*t)).collect();
        format!("({})", names.join(", "))
    }

    // ─── Overloads ───────────────────────────────────────────────────────────

    /// D002: two overloads of one group with identical parameter types.
    fn duplicate_overloads(&mut self) {
        let library = self.library;
        let table = &library.table;
        for group in table.overload_groups() {
            let Some(functions) = table.overloads(group) else { continue };
            for (index, function) in functions.iter().enumerate().skip(1) {
                if !functions[..index].iter().any(|f| f.same_params(function)) {
                    continue;
                }
                let Some(source) = &function.source else { continue };
                let name = table
                    .overload_declaration(group, index as u32)
                    .map(|d| self.manager.get_declaration_full_name(d))
                    .unwrap_or_default();
                self.report(
                    ErrorCode::D002,
                    &source.anchor,
                    format!("`{name}` is already declared with the same parameter types"),
                );
            }
        }
    }

    // ─── Member variables ────────────────────────────────────────────────────

    /// V007: a member variable may not reuse the name of an inherited one.
    fn hidden_variables(&mut self) {
        let library = self.library;
        let table = &library.table;
        for (index, definition) in table.definitions.iter().enumerate() {
            let owner = CompilingDefinition::new(LibraryId::Local, definition.code, index as u32);
            for variable in &definition.variables {
                let Some(source) = &variable.source else { continue };
                let Some(ancestor) = self.inherited_variable(owner, &variable.name) else { continue };
                let ancestor = self.manager.type_full_name(CompilingType::scalar(ancestor));
                self.report(
                    ErrorCode::V007,
                    &source.anchor,
                    format!("`{}.{}` hides the variable inherited from `{ancestor}`", definition.name, variable.name),
                );
            }
        }
    }

    fn inherited_variable(&self, owner: CompilingDefinition, name: &str) -> Option<CompilingDefinition> {
        let mut seen = self.manager.pool().take::<FxHashSet<CompilingDefinition>>();
        let mut current = self.manager.get_parent(owner).definition;
        while current.is_valid() && seen.insert(current) {
            let found = self
                .manager
                .try_get_definition(current)
                .is_some_and(|d| d.variables.iter().any(|v| v.name == name));
            if found {
                return Some(current);
            }
            current = self.manager.get_parent(current).definition;
        }
        None
    }

    // ─── Interfaces ──────────────────────────────────────────────────────────

    /// V004 / V006: every function of every implemented interface needs a
    /// non-private implementation somewhere in the class chain, matched by
    /// name and exact parameter types, returning exactly what the interface
    /// declares.
    fn interface_implementations(&mut self) {
        let library = self.library;
        let table = &library.table;
        for (index, definition) in table.definitions.iter().enumerate() {
            let Some(source) = &definition.source else { continue };
            let owner = CompilingDefinition::new(LibraryId::Local, definition.code, index as u32);

            for interface in self.manager.interface_closure(owner) {
                let Some(declared) = self.manager.try_get_interface(interface) else { continue };
                for method in &declared.methods {
                    for (overload, required) in method.functions.iter().enumerate() {
                        let required_name = declared
                            .members
                            .get(&method.name)
                            .and_then(|group| group.overload(overload as u32))
                            .map(|d| self.manager.get_declaration_full_name(d))
                            .unwrap_or_else(|| method.name.clone());

                        match find_implementation(&self.manager, owner, &method.name, required) {
                            None => self.report(
                                ErrorCode::V004,
                                &source.anchor,
                                format!("`{}` does not implement `{required_name}`", definition.name),
                            ),
                            Some((_, found)) if found.returns != required.returns => {
                                let anchor = found.source.as_ref().map_or(&source.anchor, |s| &s.anchor);
                                let message = format!(
                                    "implementation of `{required_name}` in `{}` returns {} but {} is required",
                                    definition.name,
                                    self.returns(&found.returns),
                                    self.returns(&required.returns),
                                );
                                self.report(ErrorCode::V006, anchor, message);
                            }
                            Some((_, found)) if found.visibility == Visibility::Private => {
                                let anchor = found.source.as_ref().map_or(&source.anchor, |s| &s.anchor);
                                let message = format!(
                                    "implementation of `{required_name}` in `{}` is private",
                                    definition.name,
                                );
                                self.report(ErrorCode::V006, anchor, message);
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        }
    }

    // ─── Delegates ───────────────────────────────────────────────────────────

    /// V008: a delegate-typed global initialized with a function name binds
    /// the accessible overload with exactly the delegate's signature.
    fn delegate_bindings(&mut self) {
        let library = self.library;
        for variable in &library.table.variables {
            let Some(source) = &variable.source else { continue };
            if variable.ty.is_array() {
                continue;
            }
            let Some(delegate) = self.manager.try_get_delegate(variable.ty.definition) else { continue };
            let Some(path) = variable.initializer.as_deref().and_then(function_path) else { continue };

            let cx = Context::new(
                &self.manager,
                variable.space,
                None,
                library.imports(&source.anchor),
                library.path(&source.anchor),
            );
            let found = cx.find_path(&path, &source.anchor.span, self.diagnostics);
            let Some(group) = found.filter(|d| d.kind.is_method()) else { continue };

            let params: Vec<CompilingType> = delegate.params.iter().map(|p| p.ty).collect();
            let bound = self.manager.try_get_function_where(
                group,
                &params,
                Some(delegate.returns.as_slice()),
                |d| cx.is_accessible(d),
            );
            if bound.is_none() {
                let message = format!(
                    "no overload of `{}` matches delegate `{}`",
                    path.join("."),
                    self.manager.type_full_name(variable.ty),
                );
                self.report(ErrorCode::V008, &source.anchor, message);
            }
        }
    }
}

/// A dotted identifier path, the only initializer shape bound at this stage.
fn function_path(initializer: &str) -> Option<Vec<String>> {
    let is_ident = |s: &str| {
        s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && s.chars().all(|c| c.is_alphanumeric() || c == '_')
            && !matches!(s, "null" | "true" | "false")
    };
    let path: Vec<String> = initializer.trim().split('.').map(str::to_string).collect();
    path.iter().all(|s| is_ident(s.as_str())).then_some(path)
}

/// The first function named `name` with exactly `required`'s parameter types,
/// searching `owner` and then each ancestor.
pub(crate) fn find_implementation<'a>(
    manager: &DeclarationManager<'a>,
    owner: CompilingDefinition,
    name: &str,
    required: &Function,
) -> Option<(Declaration, &'a Function)> {
    let mut seen = manager.pool().take::<FxHashSet<CompilingDefinition>>();
    let mut current = owner;
    while current.is_valid() && seen.insert(current) {
        let group = manager.find_member(current, name).filter(|d| d.kind.is_method());
        if let Some(group) = group {
            let functions = manager.overloads(group).unwrap_or_default();
            if let Some(index) = functions.iter().position(|f| f.same_params(required)) {
                let function = &functions[index];
                let declaration = group
                    .overload(index as u32)
                    .map(|d| Declaration { visibility: function.visibility, ..d });
                if let Some(declaration) = declaration {
                    return Some((declaration, function));
                }
            }
        }
        current = manager.get_parent(current).definition;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::link::link;
    use crate::builder::merge::merge;
    use crate::compiling::SourceFile;
    use crate::syntax::parse_file;

    fn check_source(src: &str) -> Vec<ErrorCode> {
        let files = vec![SourceFile::new("t.brook", src)];
        let parsed = vec![parse_file("t.brook", src).expect("parse failed")];
        let pool = CollectionPool::new();
        let mut diagnostics = Diagnostics::new();
        let mut library = merge("Test", &files, parsed, &mut diagnostics);
        link(&mut library, &[], &pool, &mut diagnostics);
        assert!(diagnostics.is_empty(), "link failed: {:?}", diagnostics.as_slice());
        check(&library, &[], &pool, &mut diagnostics);
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn same_parameter_types_is_d002_even_with_other_names() {
        assert_eq!(check_source("f(integer a)\nf(integer b)\nf(real a)\n"), vec![ErrorCode::D002]);
        assert_eq!(check_source("class Box\n    Box(integer a)\n    Box(integer b)\n"), vec![ErrorCode::D002]);
    }

    #[test]
    fn returns_alone_do_not_distinguish_overloads() {
        assert_eq!(check_source("integer f()\nreal f()\n"), vec![ErrorCode::D002]);
    }

    #[test]
    fn implemented_interface_passes() {
        let src = "interface Shape\n    real Area()\nclass Square : Shape\n    public real Area()\n";
        assert!(check_source(src).is_empty());
    }

    #[test]
    fn implementation_may_come_from_a_parent() {
        let src = "interface Shape\n    real Area()\nclass Base\n    public real Area()\nclass Square : Base, Shape\n";
        assert!(check_source(src).is_empty());
    }

    #[test]
    fn missing_implementation_is_v004() {
        let src = "interface Shape\n    real Area()\nclass Square : Shape\n    public real Area(integer scale)\n";
        assert_eq!(check_source(src), vec![ErrorCode::V004]);
    }

    #[test]
    fn base_interface_functions_are_required_too() {
        let src = "interface Named\n    string Name()\ninterface Shape : Named\n    real Area()\nclass Square : Shape\n    public real Area()\n";
        assert_eq!(check_source(src), vec![ErrorCode::V004]);
    }

    #[test]
    fn wrong_return_is_v006() {
        let src = "interface Shape\n    real Area()\nclass Square : Shape\n    public integer Area()\n";
        assert_eq!(check_source(src), vec![ErrorCode::V006]);
    }

    #[test]
    fn private_implementation_is_v006() {
        let src = "interface Shape\n    real Area()\nclass Square : Shape\n    real Area()\n";
        assert_eq!(check_source(src), vec![ErrorCode::V006]);
        let src = "interface Shape\n    real Area()\nclass Square : Shape\n    protected real Area()\n";
        assert!(check_source(src).is_empty());
    }

    #[test]
    fn delegate_initializer_binds_an_exact_overload() {
        let src = "\
delegate real Op(real a, real b)
real Add(real a, real b)
real Add(integer a, integer b)
real Neg(real a)
integer Sub(real a, real b)
Op plus = Add
Op minus = Neg
Op diff = Sub
Op none = null
";
        assert_eq!(check_source(src), vec![ErrorCode::V008, ErrorCode::V008]);
    }

    #[test]
    fn hiding_an_inherited_variable_is_v007() {
        let src = "class Animal\n    protected integer age\nclass Dog : Animal\n    integer age\n";
        assert_eq!(check_source(src), vec![ErrorCode::V007]);
        let src = "class Animal\n    protected integer age\nclass Dog : Animal\n    integer Age\n";
        assert!(check_source(src).is_empty());
    }
}

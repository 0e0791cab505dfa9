//! Stage 8 (first half): dispatch relocations.
//!
//! Each local class gets one entry per inherited function it overrides and
//! one per interface function it implements. The runtime patches its
//! dispatch tables from these.

use serde::{Deserialize, Serialize};

use crate::builder::check::find_implementation;
use crate::compiling::CompilingLibrary;
use crate::declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
use crate::error::{Diagnostics, ErrorCode};
use crate::manager::DeclarationManager;
use crate::table::Function;
use crate::types::{CompilingDefinition, CompilingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// The class whose dispatch table receives the entry.
    pub definition: CompilingDefinition,
    /// What calls are written against: an ancestor's member function or an
    /// interface function.
    pub base: Declaration,
    pub implementation: Declaration,
}

pub fn build(
    library: &CompilingLibrary,
    manager: &DeclarationManager<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<Relocation> {
    let mut relocations = Vec::new();
    for (index, definition) in library.table.definitions.iter().enumerate() {
        let owner = CompilingDefinition::new(LibraryId::Local, definition.code, index as u32);

        // ── overrides ──
        for (m, method) in definition.methods.iter().enumerate() {
            for (o, function) in method.functions.iter().enumerate() {
                let implementation = Declaration::new(
                    LibraryId::Local,
                    function.visibility,
                    DeclarationKind::MemberFunction { definition: index as u32, method: m as u32, overload: o as u32 },
                );
                overrides(library, manager, diagnostics, owner, &method.name, function, implementation, &mut relocations);
            }
        }

        // ── interfaces ──
        for interface in manager.interface_closure(owner) {
            let Some(declared) = manager.try_get_interface(interface) else { continue };
            for method in &declared.methods {
                let Some(group) = declared.members.get(&method.name) else { continue };
                for (o, required) in method.functions.iter().enumerate() {
                    let Some(base) = group.overload(o as u32) else { continue };
                    let Some((implementation, found)) = find_implementation(manager, owner, &method.name, required)
                    else {
                        continue;
                    };
                    // Mismatched returns were already reported by the checks.
                    if found.returns == required.returns {
                        relocations.push(Relocation { definition: owner, base, implementation });
                    }
                }
            }
        }
    }
    tracing::debug!(count = relocations.len(), "relocations built");
    relocations
}

/// Walks every ancestor holding a same-named group and binds the non-private
/// overload with exactly this signature. Same parameters with other returns
/// is G001.
#[allow(clippy::too_many_arguments)]
fn overrides(
    library: &CompilingLibrary,
    manager: &DeclarationManager<'_>,
    diagnostics: &mut Diagnostics,
    owner: CompilingDefinition,
    name: &str,
    function: &Function,
    implementation: Declaration,
    relocations: &mut Vec<Relocation>,
) {
    let params: Vec<CompilingType> = function.param_types().collect();
    let overridable = |d: Declaration| d.visibility != Visibility::Private;
    let mut above = owner;
    while let Some(group) = manager.get_override_method(above, name) {
        let Some(base_owner) = manager.owner_type(group) else { break };

        match manager.try_get_function_where(group, &params, Some(function.returns.as_slice()), overridable) {
            Some(found) => relocations.push(Relocation { definition: owner, base: found.declaration, implementation }),
            None => {
                let functions = manager.overloads(group).unwrap_or_default();
                let clash = functions
                    .iter()
                    .enumerate()
                    .find(|(_, base)| base.visibility != Visibility::Private && base.same_params(function));
                if let (Some((o, base_function)), Some(source)) = (clash, &function.source) {
                    let base = group
                        .overload(o as u32)
                        .map(|b| manager.get_declaration_full_name(b))
                        .unwrap_or_default();
                    let message = format!(
                        "`{}` overrides `{base}` but returns {} instead of {}",
                        manager.get_declaration_full_name(implementation),
                        returns(manager, &function.returns),
                        returns(manager, &base_function.returns),
                    );
                    diagnostics.report(ErrorCode::G001, library.path(&source.anchor), &source.anchor.span, message);
                }
            }
        }
        if base_owner == above {
            break;
        }
        above = base_owner;
    }
}

fn returns(manager: &DeclarationManager<'_>, types: &[CompilingType]) -> String {
    let names: Vec<String> = types.iter().map(|t| manager.type_full_name(*t)).collect();
    format!("({})", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::link::link;
    use crate::builder::merge::merge;
    use crate::compiling::SourceFile;
    use crate::pool::CollectionPool;
    use crate::syntax::parse_file;

    fn relocate(src: &str) -> (Vec<Relocation>, Vec<ErrorCode>) {
        let files = vec![SourceFile::new("t.brook", src)];
        let parsed = vec![parse_file("t.brook", src).expect("parse failed")];
        let pool = CollectionPool::new();
        let mut diagnostics = Diagnostics::new();
        let mut library = merge("Disp", &files, parsed, &mut diagnostics);
        link(&mut library, &[], &pool, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.as_slice());
        let manager = DeclarationManager::new(&pool, &library.table, &[]);
        let relocations = build(&library, &manager, &mut diagnostics);
        (relocations, diagnostics.iter().map(|d| d.code).collect())
    }

    fn member(definition: u32, method: u32, overload: u32) -> DeclarationKind {
        DeclarationKind::MemberFunction { definition, method, overload }
    }

    #[test]
    fn override_of_parent_function() {
        let (r, codes) = relocate("class Animal\n    public string Speak()\nclass Dog : Animal\n    public string Speak()\n");
        assert!(codes.is_empty());
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].definition.index, 1);
        assert_eq!(r[0].base.kind, member(0, 0, 0));
        assert_eq!(r[0].implementation.kind, member(1, 0, 0));
    }

    #[test]
    fn overrides_reach_every_ancestor() {
        let src = "class A\n    public f(integer x)\nclass B : A\n    public f(integer x)\nclass C : B\n    public f(integer x)\n";
        let (r, _) = relocate(src);
        let from_c: Vec<DeclarationKind> = r.iter().filter(|r| r.definition.index == 2).map(|r| r.base.kind).collect();
        assert_eq!(from_c, vec![member(1, 0, 0), member(0, 0, 0)]);
    }

    #[test]
    fn different_parameters_do_not_override() {
        let (r, codes) = relocate("class A\n    public f(integer x)\nclass B : A\n    public f(real x)\n");
        assert!(r.is_empty());
        assert!(codes.is_empty());
    }

    #[test]
    fn private_functions_are_not_overridden() {
        let (r, _) = relocate("class A\n    f()\nclass B : A\n    public f()\n");
        assert!(r.is_empty());
    }

    #[test]
    fn only_visible_overloads_of_a_mixed_group_are_overridden() {
        let src = "class A\n    f()\n    public f(integer x)\nclass B : A\n    public f()\n    public f(integer x)\n";
        let (r, codes) = relocate(src);
        assert!(codes.is_empty(), "{codes:?}");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].base.kind, member(0, 0, 1));
        assert_eq!(r[0].base.visibility, Visibility::Public);
        assert_eq!(r[0].implementation.kind, member(1, 0, 1));
    }

    #[test]
    fn changed_return_is_g001() {
        let (r, codes) = relocate("class A\n    public integer f()\nclass B : A\n    public real f()\n");
        assert!(r.is_empty());
        assert_eq!(codes, vec![ErrorCode::G001]);
    }

    #[test]
    fn interface_functions_are_relocated_to_their_implementation() {
        let src = "interface Shape\n    real Area()\nclass Base\n    public real Area()\nclass Square : Base, Shape\n";
        let (r, _) = relocate(src);
        let square: Vec<&Relocation> = r.iter().filter(|r| r.definition.index == 1).collect();
        assert_eq!(square.len(), 1);
        assert_eq!(
            square[0].base.kind,
            DeclarationKind::InterfaceFunction { interface: 0, method: 0, overload: 0 }
        );
        assert_eq!(square[0].implementation.kind, member(0, 0, 0));
    }
}

//! Scoped name resolution.
//!
//! A `Context` is a lexical position: the space being compiled, the type
//! whose members are in scope (if any) and the file's imported spaces.
//! Bare names resolve in three steps, stopping at the first that succeeds:
//!
//! 1. members of the enclosing type and its ancestors;
//! 2. declarations of the current space, then each enclosing space;
//! 3. the kernel root, every imported space and the root space of every
//!    rely library, collecting all matches.
//!
//! Only step 3 can be equivocal. Every candidate is reported, and the first
//! is still returned so later stages do not cascade into "not found".

use crate::compiling::SpaceRef;
use crate::declaration::{Declaration, LibraryId, Visibility};
use crate::error::{Diagnostics, ErrorCode};
use crate::kernel;
use crate::manager::DeclarationManager;
use crate::syntax::ast::{Span, TypeExpr};
use crate::table::ROOT_SPACE;
use crate::types::{CompilingDefinition, CompilingType, TypeCode};

pub struct Context<'a> {
    manager: &'a DeclarationManager<'a>,
    space: u32,
    definition: Option<CompilingDefinition>,
    imports: &'a [SpaceRef],
    path: &'a str,
}

impl<'a> Context<'a> {
    pub fn new(
        manager: &'a DeclarationManager<'a>,
        space: u32,
        definition: Option<CompilingDefinition>,
        imports: &'a [SpaceRef],
        path: &'a str,
    ) -> Self {
        Self { manager, space, definition, imports, path }
    }

    // ─── Accessibility ───────────────────────────────────────────────────────

    /// Whether code at this position may refer to `declaration`. A method
    /// group is accessible when any one of its overloads is.
    pub fn is_accessible(&self, declaration: Declaration) -> bool {
        if !declaration.kind.is_method() {
            return self.is_visible(declaration);
        }
        let Some(functions) = self.manager.overloads(declaration) else { return false };
        functions.iter().enumerate().any(|(index, function)| {
            declaration
                .overload(index as u32)
                .is_some_and(|d| self.is_visible(Declaration { visibility: function.visibility, ..d }))
        })
    }

    fn is_visible(&self, declaration: Declaration) -> bool {
        let Some(table) = self.manager.table(declaration.library) else { return false };
        let local = declaration.library == LibraryId::Local;
        let owner = table.owner_type(declaration);
        let declaring_space = match owner {
            Some(o) => table.type_name(o).map(|(_, space)| space),
            None => table.declaration_space(declaration),
        };

        match declaration.visibility {
            Visibility::Public => true,
            Visibility::Internal => local,
            Visibility::Space => {
                local && declaring_space.is_some_and(|s| table.space_contains(s, self.space))
            }
            Visibility::Protected => match (owner, self.definition) {
                (Some(owner), Some(current)) => self.manager.is_subtype(owner, current),
                _ => false,
            },
            Visibility::Private => match owner {
                Some(owner) => self.definition == Some(owner),
                None => local && declaring_space == Some(self.space),
            },
        }
    }

    // ─── Bare names ──────────────────────────────────────────────────────────

    /// The enclosing type followed by everything it inherits from.
    fn type_chain(&self) -> Vec<CompilingDefinition> {
        let Some(owner) = self.definition else { return Vec::new() };
        let mut chain = Vec::new();
        match owner.code {
            TypeCode::Interface => {
                chain.extend(self.manager.interface_closure(owner));
                chain.push(CompilingDefinition::INTERFACE);
                chain.push(CompilingDefinition::HANDLE);
            }
            _ => {
                let mut current = owner;
                while current.is_valid() && !chain.contains(&current) {
                    chain.push(current);
                    current = self.manager.get_parent(current).definition;
                }
            }
        }
        chain
    }

    pub fn find_declaration(&self, name: &str, span: &Span, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        let mut hidden = None;

        for owner in self.type_chain() {
            if let Some(found) = self.manager.find_member(owner, name) {
                if self.is_accessible(found) {
                    return Some(found);
                }
                hidden.get_or_insert(found);
            }
        }

        let local = self.manager.local();
        let mut space = Some(self.space);
        while let Some(index) = space {
            if let Some(found) = local.lookup(index, name) {
                if self.is_accessible(found) {
                    return Some(found);
                }
                hidden.get_or_insert(found);
            }
            space = local.space(index).and_then(|s| s.parent);
        }

        let mut candidates = self.manager.pool().take::<Vec<Declaration>>();
        let rely_roots = self.manager.relies().iter().map(|rely| SpaceRef::new(rely.id(), ROOT_SPACE));
        let roots = std::iter::once(SpaceRef::new(LibraryId::Kernel, ROOT_SPACE))
            .chain(self.imports.iter().copied())
            .chain(rely_roots);
        for root in roots {
            let found = self.manager.table(root.library).and_then(|t| t.lookup(root.space, name));
            if let Some(found) = found {
                if !candidates.contains(&found) {
                    candidates.push(found);
                }
            }
        }

        let mut accessible = self.manager.pool().take::<Vec<Declaration>>();
        accessible.extend(candidates.iter().copied().filter(|d| self.is_accessible(*d)));
        match accessible.len() {
            0 => {
                match hidden.or_else(|| candidates.first().copied()) {
                    Some(found) => diagnostics.report(
                        ErrorCode::K005,
                        self.path,
                        span,
                        format!(
                            "`{}` is {} and not accessible here",
                            self.manager.get_declaration_full_name(found),
                            found.visibility
                        ),
                    ),
                    None => diagnostics.report(ErrorCode::K001, self.path, span, format!("`{name}` not found")),
                }
                None
            }
            1 => Some(accessible[0]),
            _ => {
                tracing::warn!(name, candidates = accessible.len(), "equivocal name, using the first match");
                for candidate in accessible.iter() {
                    diagnostics.report(
                        ErrorCode::K002,
                        self.path,
                        span,
                        format!(
                            "`{name}` is equivocal; candidate `{}`",
                            self.manager.get_declaration_full_name(*candidate)
                        ),
                    );
                }
                Some(accessible[0])
            }
        }
    }

    // ─── Spaces and dotted paths ─────────────────────────────────────────────

    fn find_space_head(&self, name: &str) -> Option<SpaceRef> {
        let local = self.manager.local();
        let mut space = Some(self.space);
        while let Some(index) = space {
            if let Some(child) = local.child_space(index, name) {
                return Some(SpaceRef::new(LibraryId::Local, child));
            }
            space = local.space(index).and_then(|s| s.parent);
        }

        for import in self.imports {
            let child = self.manager.table(import.library).and_then(|t| t.child_space(import.space, name));
            if let Some(child) = child {
                return Some(SpaceRef::new(import.library, child));
            }
        }

        if name == kernel::NAME {
            return Some(SpaceRef::new(LibraryId::Kernel, ROOT_SPACE));
        }
        if let Some(table) = self.manager.rely_by_name(name) {
            return Some(SpaceRef::new(table.library, ROOT_SPACE));
        }
        self.manager.relies().iter().find_map(|rely| {
            rely.table
                .child_space(ROOT_SPACE, name)
                .map(|child| SpaceRef::new(rely.id(), child))
        })
    }

    /// Resolve a dotted space path such as an import.
    pub fn find_space(&self, path: &[String]) -> Option<SpaceRef> {
        let (head, rest) = path.split_first()?;
        let mut current = self.find_space_head(head)?;
        for segment in rest {
            let table = self.manager.table(current.library)?;
            current = SpaceRef::new(current.library, table.child_space(current.space, segment)?);
        }
        Some(current)
    }

    /// `A.B.Name`: every segment but the last is a space; the last is looked up
    /// in that space only.
    pub fn find_path(&self, path: &[String], span: &Span, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        let Some((name, spaces)) = path.split_last() else { return None };
        if spaces.is_empty() {
            return self.find_declaration(name, span, diagnostics);
        }

        let Some(space) = self.find_space(spaces) else {
            diagnostics.report(
                ErrorCode::K004,
                self.path,
                span,
                format!("space `{}` not found", spaces.join(".")),
            );
            return None;
        };

        let found = self.manager.table(space.library).and_then(|t| t.lookup(space.space, name));
        match found {
            Some(found) if self.is_accessible(found) => Some(found),
            Some(found) => {
                diagnostics.report(
                    ErrorCode::K005,
                    self.path,
                    span,
                    format!(
                        "`{}` is {} and not accessible here",
                        self.manager.get_declaration_full_name(found),
                        found.visibility
                    ),
                );
                None
            }
            None => {
                diagnostics.report(ErrorCode::K001, self.path, span, format!("`{}` not found", path.join(".")));
                None
            }
        }
    }

    // ─── Types ───────────────────────────────────────────────────────────────

    pub fn find_type(&self, expr: &TypeExpr, diagnostics: &mut Diagnostics) -> Option<CompilingType> {
        let declaration = self.find_path(&expr.path, &expr.span, diagnostics)?;
        match self.manager.declared_type(declaration) {
            Some(definition) => Some(definition.with_dimension(expr.dimension)),
            None => {
                diagnostics.report(
                    ErrorCode::K003,
                    self.path,
                    &expr.span,
                    format!("`{}` is a {}, not a type", expr.path.join("."), declaration.kind.describe()),
                );
                None
            }
        }
    }
}

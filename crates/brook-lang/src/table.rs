//! Structural symbol tables, one shape for every library origin.
//!
//! The kernel registry, each rely library and the library under compilation
//! all use `LibraryTable`. Tables are flat arrays addressed by the indices a
//! `Declaration` carries; spaces form a tree by parent index, never by
//! owning reference. Entries of the library under compilation additionally
//! carry a `source` with the unresolved syntax that link fills in.

use rustc_hash::FxHashMap;

use crate::declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
use crate::syntax::ast::{Body, Span, TypeExpr};
use crate::types::{CompilingDefinition, CompilingType, TypeCode};

pub const ROOT_SPACE: u32 = 0;

// ─── Source anchors ───────────────────────────────────────────────────────────

/// Where a declaration was written: file index into the compiling library's
/// file list, plus the span of its name.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub file: u32,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeSource {
    pub anchor: Anchor,
    pub inherits: Vec<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct FunctionSource {
    pub anchor: Anchor,
    pub params: Vec<TypeExpr>,
    pub returns: Vec<TypeExpr>,
    pub body: Option<Body>,
}

#[derive(Debug, Clone)]
pub struct VariableSource {
    pub anchor: Anchor,
    pub ty: TypeExpr,
}

// ─── Entries ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Space {
    pub name: String,
    pub parent: Option<u32>,
    pub children: FxHashMap<String, u32>,
    pub declarations: FxHashMap<String, Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: CompilingType,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub visibility: Visibility,
    pub params: Vec<Parameter>,
    pub returns: Vec<CompilingType>,
    pub source: Option<FunctionSource>,
}

impl Function {
    pub fn new(visibility: Visibility, params: Vec<Parameter>, returns: Vec<CompilingType>) -> Self {
        Self { visibility, params, returns, source: None }
    }

    pub fn param_types(&self) -> impl Iterator<Item = CompilingType> + '_ {
        self.params.iter().map(|p| p.ty)
    }

    pub fn same_params(&self, other: &Function) -> bool {
        self.params.len() == other.params.len() && self.param_types().eq(other.param_types())
    }

    pub fn same_params_as(&self, types: &[CompilingType]) -> bool {
        self.params.len() == types.len() && self.param_types().eq(types.iter().copied())
    }
}

/// A named overload group.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    /// Declaring space; for member and interface methods, the owner's space.
    pub space: u32,
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone)]
pub struct MemberVariable {
    pub name: String,
    pub visibility: Visibility,
    pub ty: CompilingType,
    /// Byte offset inside the definition's own field block.
    pub offset: u32,
    pub source: Option<VariableSource>,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub space: u32,
    pub visibility: Visibility,
    pub code: TypeCode,
    /// `INVALID` for value types and the root handle.
    pub parent: CompilingType,
    pub interfaces: Vec<CompilingType>,
    pub variables: Vec<MemberVariable>,
    pub methods: Vec<Method>,
    pub constructors: Vec<Function>,
    /// Variables and method groups by name.
    pub members: FxHashMap<String, Declaration>,
    /// Size of the definition's own field block.
    pub size: u32,
    pub source: Option<TypeSource>,
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub space: u32,
    pub visibility: Visibility,
    pub inherits: Vec<CompilingType>,
    pub methods: Vec<Method>,
    pub members: FxHashMap<String, Declaration>,
    pub source: Option<TypeSource>,
}

#[derive(Debug, Clone)]
pub struct Delegate {
    pub name: String,
    pub space: u32,
    pub visibility: Visibility,
    pub params: Vec<Parameter>,
    pub returns: Vec<CompilingType>,
    pub source: Option<FunctionSource>,
}

#[derive(Debug, Clone)]
pub struct Coroutine {
    pub name: String,
    pub space: u32,
    pub visibility: Visibility,
    pub returns: Vec<CompilingType>,
    pub source: Option<FunctionSource>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub space: u32,
    pub visibility: Visibility,
    pub constant: bool,
    pub ty: CompilingType,
    pub initializer: Option<String>,
    /// Byte address inside the constant or data region.
    pub address: u32,
    pub source: Option<VariableSource>,
}

// ─── Table ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LibraryTable {
    pub name: String,
    pub library: LibraryId,
    pub spaces: Vec<Space>,
    pub definitions: Vec<Definition>,
    pub interfaces: Vec<Interface>,
    pub delegates: Vec<Delegate>,
    pub coroutines: Vec<Coroutine>,
    pub variables: Vec<Variable>,
    pub methods: Vec<Method>,
    pub natives: Vec<Method>,
}

/// Mutable view of one signature, for link to write resolved types into.
pub struct SignatureMut<'t> {
    /// `None` for coroutines, which take no parameters.
    pub params: Option<&'t mut Vec<Parameter>>,
    pub returns: &'t mut Vec<CompilingType>,
}

impl LibraryTable {
    pub fn new(name: impl Into<String>, library: LibraryId) -> Self {
        Self {
            name: name.into(),
            library,
            spaces: vec![Space::default()],
            definitions: Vec::new(),
            interfaces: Vec::new(),
            delegates: Vec::new(),
            coroutines: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            natives: Vec::new(),
        }
    }

    // ── Spaces ────────────────────────────────────────────────────────────────

    pub fn space(&self, index: u32) -> Option<&Space> {
        self.spaces.get(index as usize)
    }

    pub fn child_space(&self, space: u32, name: &str) -> Option<u32> {
        self.space(space)?.children.get(name).copied()
    }

    /// Child space `name` of `parent`, created on first use.
    pub fn ensure_space(&mut self, parent: u32, name: &str) -> u32 {
        if let Some(existing) = self.child_space(parent, name) {
            return existing;
        }
        let index = self.spaces.len() as u32;
        self.spaces.push(Space { name: name.to_string(), parent: Some(parent), ..Space::default() });
        self.spaces[parent as usize].children.insert(name.to_string(), index);
        index
    }

    /// Whether `inner` is `outer` or nested anywhere below it.
    pub fn space_contains(&self, outer: u32, inner: u32) -> bool {
        let mut current = Some(inner);
        while let Some(index) = current {
            if index == outer {
                return true;
            }
            current = self.space(index).and_then(|s| s.parent);
        }
        false
    }

    /// Names from the root down to `space`, root excluded.
    pub fn space_path(&self, space: u32) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(space);
        while let Some(index) = current {
            let Some(s) = self.space(index) else { break };
            if s.parent.is_some() {
                names.push(s.name.as_str());
            }
            current = s.parent;
        }
        names.reverse();
        names
    }

    pub fn lookup(&self, space: u32, name: &str) -> Option<Declaration> {
        self.space(space)?.declarations.get(name).copied()
    }

    // ── Types ─────────────────────────────────────────────────────────────────

    pub fn definition(&self, index: u32) -> Option<&Definition> {
        self.definitions.get(index as usize)
    }

    pub fn interface(&self, index: u32) -> Option<&Interface> {
        self.interfaces.get(index as usize)
    }

    /// The type a type-declaring declaration names, if it names one.
    pub fn declared_type(&self, declaration: Declaration) -> Option<CompilingDefinition> {
        let (code, index) = match declaration.kind {
            DeclarationKind::Definition { index } => (self.definition(index)?.code, index),
            DeclarationKind::Interface { index }  => (TypeCode::Interface, index),
            DeclarationKind::Delegate { index }   => (TypeCode::Delegate, index),
            DeclarationKind::Coroutine { index }  => (TypeCode::Coroutine, index),
            _ => return None,
        };
        Some(CompilingDefinition::new(self.library, code, index))
    }

    /// Name and declaring space of a type.
    pub fn type_name(&self, definition: CompilingDefinition) -> Option<(&str, u32)> {
        let index = definition.index as usize;
        match definition.code {
            TypeCode::Struct | TypeCode::Handle => self.definitions.get(index).map(|d| (d.name.as_str(), d.space)),
            TypeCode::Interface => self.interfaces.get(index).map(|i| (i.name.as_str(), i.space)),
            TypeCode::Delegate  => self.delegates.get(index).map(|d| (d.name.as_str(), d.space)),
            TypeCode::Coroutine => self.coroutines.get(index).map(|c| (c.name.as_str(), c.space)),
            TypeCode::Invalid   => None,
        }
    }

    // ── Methods & functions ───────────────────────────────────────────────────

    /// The overload group a method declaration (or one of its functions) refers to.
    pub fn method(&self, declaration: Declaration) -> Option<&Method> {
        use DeclarationKind::*;
        match declaration.method_group().kind {
            MemberMethod { definition, method } => self.definition(definition)?.methods.get(method as usize),
            InterfaceMethod { interface, method } => self.interface(interface)?.methods.get(method as usize),
            GlobalMethod { method } => self.methods.get(method as usize),
            NativeMethod { method } => self.natives.get(method as usize),
            _ => None,
        }
    }

    /// Every function of a method group or the constructor group of a definition.
    pub fn overloads(&self, declaration: Declaration) -> Option<&[Function]> {
        match declaration.kind {
            DeclarationKind::Definition { index } => Some(&self.definition(index)?.constructors),
            DeclarationKind::Constructor { definition, .. } => Some(&self.definition(definition)?.constructors),
            _ => self.method(declaration).map(|m| m.functions.as_slice()),
        }
    }

    pub fn function(&self, declaration: Declaration) -> Option<&Function> {
        use DeclarationKind::*;
        let overload = match declaration.kind {
            MemberFunction { overload, .. }
            | InterfaceFunction { overload, .. }
            | GlobalFunction { overload, .. }
            | NativeFunction { overload, .. }
            | Constructor { overload, .. } => overload,
            _ => return None,
        };
        self.overloads(declaration)?.get(overload as usize)
    }

    /// Every overload group of the table: member, interface, global and native
    /// methods, plus one `Definition` per type standing for its constructors.
    pub fn overload_groups(&self) -> Vec<Declaration> {
        use DeclarationKind::*;
        let lib = self.library;
        let mut groups = Vec::new();
        for (d, definition) in self.definitions.iter().enumerate() {
            let d = d as u32;
            for (m, method) in definition.methods.iter().enumerate() {
                let visibility = method.functions.first().map_or(definition.visibility, |f| f.visibility);
                groups.push(Declaration::new(lib, visibility, MemberMethod { definition: d, method: m as u32 }));
            }
            if !definition.constructors.is_empty() {
                groups.push(Declaration::new(lib, definition.visibility, Definition { index: d }));
            }
        }
        for (i, interface) in self.interfaces.iter().enumerate() {
            for m in 0..interface.methods.len() {
                let kind = InterfaceMethod { interface: i as u32, method: m as u32 };
                groups.push(Declaration::new(lib, Visibility::Public, kind));
            }
        }
        for (m, method) in self.methods.iter().enumerate() {
            let visibility = method.functions.first().map_or(Visibility::Public, |f| f.visibility);
            groups.push(Declaration::new(lib, visibility, GlobalMethod { method: m as u32 }));
        }
        for (m, method) in self.natives.iter().enumerate() {
            let visibility = method.functions.first().map_or(Visibility::Public, |f| f.visibility);
            groups.push(Declaration::new(lib, visibility, NativeMethod { method: m as u32 }));
        }
        groups
    }

    /// One function of an overload group, carrying the function's own visibility.
    pub fn overload_declaration(&self, group: Declaration, overload: u32) -> Option<Declaration> {
        let kind = match group.kind {
            DeclarationKind::Definition { index } => DeclarationKind::Constructor { definition: index, overload },
            _ => group.overload(overload)?.kind,
        };
        let visibility = self.overloads(group)?.get(overload as usize)?.visibility;
        Some(Declaration::new(group.library, visibility, kind))
    }

    /// Parameter and return slots of anything with a signature.
    pub fn signature_mut(&mut self, declaration: Declaration) -> Option<SignatureMut<'_>> {
        use DeclarationKind::*;
        let function = match declaration.kind {
            MemberFunction { definition, method, overload } => self
                .definitions.get_mut(definition as usize)?
                .methods.get_mut(method as usize)?
                .functions.get_mut(overload as usize)?,
            InterfaceFunction { interface, method, overload } => self
                .interfaces.get_mut(interface as usize)?
                .methods.get_mut(method as usize)?
                .functions.get_mut(overload as usize)?,
            GlobalFunction { method, overload } => {
                self.methods.get_mut(method as usize)?.functions.get_mut(overload as usize)?
            }
            NativeFunction { method, overload } => {
                self.natives.get_mut(method as usize)?.functions.get_mut(overload as usize)?
            }
            Constructor { definition, overload } => {
                self.definitions.get_mut(definition as usize)?.constructors.get_mut(overload as usize)?
            }
            Delegate { index } => {
                let d = self.delegates.get_mut(index as usize)?;
                return Some(SignatureMut { params: Some(&mut d.params), returns: &mut d.returns });
            }
            Coroutine { index } => {
                let c = self.coroutines.get_mut(index as usize)?;
                return Some(SignatureMut { params: None, returns: &mut c.returns });
            }
            _ => return None,
        };
        Some(SignatureMut { params: Some(&mut function.params), returns: &mut function.returns })
    }

    // ── Names ─────────────────────────────────────────────────────────────────

    /// Simple name of any named declaration.
    pub fn declaration_name(&self, declaration: Declaration) -> Option<&str> {
        use DeclarationKind::*;
        match declaration.kind {
            Definition { index } => self.definition(index).map(|d| d.name.as_str()),
            MemberVariable { definition, index } => {
                self.definition(definition)?.variables.get(index as usize).map(|v| v.name.as_str())
            }
            Constructor { definition, .. } => self.definition(definition).map(|d| d.name.as_str()),
            Delegate { index } => self.delegates.get(index as usize).map(|d| d.name.as_str()),
            Coroutine { index } => self.coroutines.get(index as usize).map(|c| c.name.as_str()),
            Interface { index } => self.interface(index).map(|i| i.name.as_str()),
            GlobalVariable { index } => self.variables.get(index as usize).map(|v| v.name.as_str()),
            MemberMethod { .. } | MemberFunction { .. } | InterfaceMethod { .. } | InterfaceFunction { .. }
            | GlobalMethod { .. } | GlobalFunction { .. } | NativeMethod { .. } | NativeFunction { .. } => {
                self.method(declaration).map(|m| m.name.as_str())
            }
            Invalid | Lambda { .. } | Local { .. } => None,
        }
    }

    /// The type that owns a member-level declaration.
    pub fn owner_type(&self, declaration: Declaration) -> Option<CompilingDefinition> {
        use DeclarationKind::*;
        match declaration.kind {
            MemberVariable { definition, .. }
            | MemberMethod { definition, .. }
            | MemberFunction { definition, .. }
            | Constructor { definition, .. } => {
                let code = self.definition(definition)?.code;
                Some(CompilingDefinition::new(self.library, code, definition))
            }
            InterfaceMethod { interface, .. } | InterfaceFunction { interface, .. } => {
                Some(CompilingDefinition::new(self.library, TypeCode::Interface, interface))
            }
            _ => None,
        }
    }

    /// Declaring space of a namespace-level declaration.
    pub fn declaration_space(&self, declaration: Declaration) -> Option<u32> {
        use DeclarationKind::*;
        match declaration.kind {
            Definition { index } => self.definition(index).map(|d| d.space),
            Interface { index } => self.interface(index).map(|i| i.space),
            Delegate { index } => self.delegates.get(index as usize).map(|d| d.space),
            Coroutine { index } => self.coroutines.get(index as usize).map(|c| c.space),
            GlobalVariable { index } => self.variables.get(index as usize).map(|v| v.space),
            GlobalMethod { .. } | GlobalFunction { .. } | NativeMethod { .. } | NativeFunction { .. } => {
                self.method(declaration).map(|m| m.space)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LibraryTable {
        LibraryTable::new("Geo", LibraryId::Local)
    }

    #[test]
    fn spaces_are_created_once_and_nest() {
        let mut t = table();
        let a = t.ensure_space(ROOT_SPACE, "A");
        let b = t.ensure_space(a, "B");
        assert_eq!(t.ensure_space(ROOT_SPACE, "A"), a);
        assert_eq!(t.spaces.len(), 3);
        assert!(t.space_contains(a, b));
        assert!(t.space_contains(ROOT_SPACE, b));
        assert!(!t.space_contains(b, a));
        assert_eq!(t.space_path(b), vec!["A", "B"]);
        assert!(t.space_path(ROOT_SPACE).is_empty());
    }

    #[test]
    fn method_lookup_through_function_declarations() {
        let mut t = table();
        t.methods.push(Method {
            name: "Area".into(),
            space: ROOT_SPACE,
            functions: vec![
                Function::new(Visibility::Public, vec![], vec![CompilingType::REAL]),
                Function::new(Visibility::Space, vec![Parameter { name: "s".into(), ty: CompilingType::REAL }], vec![]),
            ],
        });
        let group = Declaration::new(LibraryId::Local, Visibility::Public, DeclarationKind::GlobalMethod { method: 0 });
        let second = group.overload(1).expect("overload");
        assert_eq!(t.overloads(group).map(|f| f.len()), Some(2));
        assert_eq!(t.function(second).map(|f| f.params.len()), Some(1));
        assert_eq!(t.declaration_name(second), Some("Area"));
        assert_eq!(t.declaration_space(second), Some(ROOT_SPACE));
    }

    #[test]
    fn coroutine_signatures_have_no_params() {
        let mut t = table();
        t.coroutines.push(Coroutine {
            name: "Tick".into(),
            space: ROOT_SPACE,
            visibility: Visibility::Public,
            returns: vec![CompilingType::INVALID],
            source: None,
        });
        let decl = Declaration::new(LibraryId::Local, Visibility::Public, DeclarationKind::Coroutine { index: 0 });
        let sig = t.signature_mut(decl).expect("signature");
        assert!(sig.params.is_none());
        sig.returns[0] = CompilingType::INTEGER;
        assert_eq!(t.coroutines[0].returns[0], CompilingType::INTEGER);
        assert_eq!(t.declared_type(decl).map(|d| d.code), Some(TypeCode::Coroutine));
    }
}

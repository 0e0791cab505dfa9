//! Rehydrating a reference surface into a read-only `LibraryTable`.

use rustc_hash::FxHashMap;

use crate::declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
use crate::kernel;
use crate::rely::RelyError;
use crate::rely::reference::*;
use crate::table::{
    Coroutine, Definition, Delegate, Function, Interface, LibraryTable, MemberVariable, Method, Parameter,
    Space, Variable,
};
use crate::types::{CompilingDefinition, CompilingType, TypeCode};

/// A dependency, index-remapped into the numbering of this compilation.
#[derive(Debug, Clone)]
pub struct RelyLibrary {
    pub table: LibraryTable,
    /// Libraries this one was compiled against, in this compilation's numbering.
    pub dependencies: Vec<LibraryId>,
}

impl RelyLibrary {
    pub fn name(&self) -> &str { &self.table.name }

    pub fn id(&self) -> LibraryId { self.table.library }
}

fn table_type_count(table: &LibraryTable, code: TypeCode) -> usize {
    match code {
        TypeCode::Struct | TypeCode::Handle => table.definitions.len(),
        TypeCode::Interface => table.interfaces.len(),
        TypeCode::Delegate  => table.delegates.len(),
        TypeCode::Coroutine => table.coroutines.len(),
        TypeCode::Invalid   => 0,
    }
}

// ─── Type map ─────────────────────────────────────────────────────────────────

/// Translates one reference library's type references into this compilation.
pub(crate) struct TypeMap<'r> {
    pub reference: &'r ReferenceLibrary,
    pub own: LibraryId,
    /// One entry per `reference.dependencies`, `None` if it could not be matched.
    pub dependencies: Vec<Option<(LibraryId, &'r LibraryTable)>>,
}

impl TypeMap<'_> {
    fn unresolved(&self, ty: ReferenceType, target: String) -> RelyError {
        RelyError::UnresolvedType {
            library: self.reference.name.clone(),
            target,
            code: ty.code,
            index: ty.index,
        }
    }

    pub fn remap(&self, ty: ReferenceType) -> Result<CompilingType, RelyError> {
        if ty.code == TypeCode::Invalid {
            return Ok(CompilingType::INVALID);
        }
        let (library, available) = match ty.library {
            ReferenceLibraryId::Kernel => {
                let count = match ty.code {
                    TypeCode::Struct | TypeCode::Handle => kernel::table().definitions.len(),
                    _ => 0,
                };
                (LibraryId::Kernel, count)
            }
            ReferenceLibraryId::Own => (self.own, self.reference.type_count(ty.code)),
            ReferenceLibraryId::Dependency(d) => match self.dependencies.get(d as usize).copied().flatten() {
                Some((id, table)) => (id, table_type_count(table, ty.code)),
                None => {
                    let target = self
                        .reference
                        .dependencies
                        .get(d as usize)
                        .cloned()
                        .unwrap_or_else(|| format!("dependency #{d}"));
                    return Err(self.unresolved(ty, target));
                }
            },
        };
        if ty.index as usize >= available {
            let target = match library {
                LibraryId::Kernel => kernel::NAME.to_string(),
                _ => self.reference.name.clone(),
            };
            return Err(self.unresolved(ty, target));
        }
        Ok(CompilingDefinition::new(library, ty.code, ty.index).with_dimension(ty.dimension))
    }

    fn types(&self, types: &[ReferenceType]) -> Result<Vec<CompilingType>, RelyError> {
        types.iter().map(|t| self.remap(*t)).collect()
    }

    fn params(&self, params: &[ReferenceParameter]) -> Result<Vec<Parameter>, RelyError> {
        params
            .iter()
            .map(|p| Ok(Parameter { name: p.name.clone(), ty: self.remap(p.ty)? }))
            .collect()
    }

    fn function(&self, function: &ReferenceFunction) -> Result<Function, RelyError> {
        Ok(Function::new(function.visibility, self.params(&function.params)?, self.types(&function.returns)?))
    }

    fn method(&self, method: &ReferenceMethod) -> Result<Method, RelyError> {
        Ok(Method {
            name: method.name.clone(),
            space: method.space,
            functions: method.functions.iter().map(|f| self.function(f)).collect::<Result<_, _>>()?,
        })
    }
}

/// Group visibility: the widest of its overloads.
fn group_visibility(method: &Method) -> Visibility {
    method
        .functions
        .iter()
        .map(|f| f.visibility)
        .reduce(Visibility::widest)
        .unwrap_or(Visibility::Public)
}

// ─── Instantiation ────────────────────────────────────────────────────────────

pub(crate) fn instantiate(map: &TypeMap<'_>) -> Result<RelyLibrary, RelyError> {
    let reference = map.reference;
    let id = map.own;
    let mut t = LibraryTable::new(&reference.name, id);

    let malformed = |message: String| RelyError::Malformed { library: reference.name.clone(), message };

    for space in reference.spaces.iter().skip(1) {
        t.spaces.push(Space { name: space.name.clone(), parent: space.parent, ..Space::default() });
    }
    for index in 1..t.spaces.len() {
        let name = t.spaces[index].name.clone();
        let parent = t.spaces[index].parent.ok_or_else(|| malformed(format!("space `{name}` has no parent")))?;
        let Some(parent_space) = t.spaces.get_mut(parent as usize) else {
            return Err(malformed(format!("space `{name}` has unknown parent {parent}")));
        };
        parent_space.children.insert(name, index as u32);
    }

    let declare = |t: &mut LibraryTable, space: u32, name: &str, kind: DeclarationKind| {
        match t.spaces.get_mut(space as usize) {
            Some(s) => {
                s.declarations.insert(name.to_string(), Declaration::new(id, Visibility::Public, kind));
                Ok(())
            }
            None => Err(malformed(format!("`{name}` is declared in unknown space {space}"))),
        }
    };

    for (index, d) in reference.definitions.iter().enumerate() {
        let index = index as u32;
        let mut members = FxHashMap::default();
        let mut variables = Vec::with_capacity(d.variables.len());
        for (i, v) in d.variables.iter().enumerate() {
            let kind = DeclarationKind::MemberVariable { definition: index, index: i as u32 };
            members.insert(v.name.clone(), Declaration::new(id, v.visibility, kind));
            variables.push(MemberVariable {
                name: v.name.clone(),
                visibility: v.visibility,
                ty: map.remap(v.ty)?,
                offset: 0,
                source: None,
            });
        }
        let mut methods = Vec::with_capacity(d.methods.len());
        for (i, m) in d.methods.iter().enumerate() {
            let method = map.method(m)?;
            let kind = DeclarationKind::MemberMethod { definition: index, method: i as u32 };
            members.insert(m.name.clone(), Declaration::new(id, group_visibility(&method), kind));
            methods.push(method);
        }
        t.definitions.push(Definition {
            name: d.name.clone(),
            space: d.space,
            visibility: Visibility::Public,
            code: TypeCode::Handle,
            parent: map.remap(d.parent)?,
            interfaces: map.types(&d.interfaces)?,
            variables,
            methods,
            constructors: d.constructors.iter().map(|f| map.function(f)).collect::<Result<_, _>>()?,
            members,
            size: 0,
            source: None,
        });
        declare(&mut t, d.space, &d.name, DeclarationKind::Definition { index })?;
    }

    for (index, i) in reference.interfaces.iter().enumerate() {
        let index = index as u32;
        let mut members = FxHashMap::default();
        let mut methods = Vec::with_capacity(i.methods.len());
        for (m_index, m) in i.methods.iter().enumerate() {
            let kind = DeclarationKind::InterfaceMethod { interface: index, method: m_index as u32 };
            members.insert(m.name.clone(), Declaration::new(id, Visibility::Public, kind));
            methods.push(map.method(m)?);
        }
        t.interfaces.push(Interface {
            name: i.name.clone(),
            space: i.space,
            visibility: Visibility::Public,
            inherits: map.types(&i.inherits)?,
            methods,
            members,
            source: None,
        });
        declare(&mut t, i.space, &i.name, DeclarationKind::Interface { index })?;
    }

    for (index, d) in reference.delegates.iter().enumerate() {
        t.delegates.push(Delegate {
            name: d.name.clone(),
            space: d.space,
            visibility: Visibility::Public,
            params: map.params(&d.params)?,
            returns: map.types(&d.returns)?,
            source: None,
        });
        declare(&mut t, d.space, &d.name, DeclarationKind::Delegate { index: index as u32 })?;
    }

    for (index, c) in reference.coroutines.iter().enumerate() {
        t.coroutines.push(Coroutine {
            name: c.name.clone(),
            space: c.space,
            visibility: Visibility::Public,
            returns: map.types(&c.returns)?,
            source: None,
        });
        declare(&mut t, c.space, &c.name, DeclarationKind::Coroutine { index: index as u32 })?;
    }

    for (index, v) in reference.variables.iter().enumerate() {
        t.variables.push(Variable {
            name: v.name.clone(),
            space: v.space,
            visibility: Visibility::Public,
            constant: v.constant,
            ty: map.remap(v.ty)?,
            initializer: None,
            address: 0,
            source: None,
        });
        declare(&mut t, v.space, &v.name, DeclarationKind::GlobalVariable { index: index as u32 })?;
    }

    for (index, m) in reference.methods.iter().enumerate() {
        t.methods.push(map.method(m)?);
        declare(&mut t, m.space, &m.name, DeclarationKind::GlobalMethod { method: index as u32 })?;
    }

    for (index, m) in reference.natives.iter().enumerate() {
        t.natives.push(map.method(m)?);
        declare(&mut t, m.space, &m.name, DeclarationKind::NativeMethod { method: index as u32 })?;
    }

    let dependencies = map.dependencies.iter().flatten().map(|(id, _)| *id).collect();
    Ok(RelyLibrary { table: t, dependencies })
}

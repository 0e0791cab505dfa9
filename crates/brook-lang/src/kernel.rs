//! Kernel registry: built-in types, functions and constants, visible
//! everywhere without an import.
//!
//! Built once on first use and read-only afterwards. The kernel behaves like
//! a zeroth rely library: same table shape, `LibraryId::Kernel`, everything
//! public and declared in the root space.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
use crate::table::{Definition, Function, LibraryTable, Method, MemberVariable, Parameter, ROOT_SPACE, Variable};
use crate::types::{CompilingType, TypeCode, kernel_index};

pub const NAME: &str = "kernel";

static KERNEL: LazyLock<LibraryTable> = LazyLock::new(build);

pub fn table() -> &'static LibraryTable {
    &KERNEL
}

// ─── Types ────────────────────────────────────────────────────────────────────

/// Kernel types in index order. `null` is last and has no source name.
const TYPES: [(&str, TypeCode); 16] = [
    ("bool",      TypeCode::Struct),
    ("byte",      TypeCode::Struct),
    ("char",      TypeCode::Struct),
    ("integer",   TypeCode::Struct),
    ("real",      TypeCode::Struct),
    ("real2",     TypeCode::Struct),
    ("real3",     TypeCode::Struct),
    ("real4",     TypeCode::Struct),
    ("string",    TypeCode::Struct),
    ("entity",    TypeCode::Struct),
    ("handle",    TypeCode::Handle),
    ("interface", TypeCode::Handle),
    ("delegate",  TypeCode::Handle),
    ("coroutine", TypeCode::Handle),
    ("array",     TypeCode::Handle),
    ("null",      TypeCode::Handle),
];

// ─── Construction ─────────────────────────────────────────────────────────────

const B: CompilingType = CompilingType::BOOL;
const I: CompilingType = CompilingType::INTEGER;
const R: CompilingType = CompilingType::REAL;
const R2: CompilingType = CompilingType::REAL2;
const R3: CompilingType = CompilingType::REAL3;
const R4: CompilingType = CompilingType::REAL4;
const S: CompilingType = CompilingType::STRING;

fn build() -> LibraryTable {
    let mut t = LibraryTable::new(NAME, LibraryId::Kernel);

    for (index, (name, code)) in TYPES.iter().enumerate() {
        let index = index as u32;
        let parent = if *code == TypeCode::Handle && index != kernel_index::HANDLE {
            CompilingType::HANDLE
        } else {
            CompilingType::INVALID
        };
        t.definitions.push(Definition {
            name: name.to_string(),
            space: ROOT_SPACE,
            visibility: Visibility::Public,
            code: *code,
            parent,
            interfaces: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            members: FxHashMap::default(),
            size: 0,
            source: None,
        });
        if index != kernel_index::NULL {
            declare(&mut t, name, DeclarationKind::Definition { index });
        }
    }

    // Vector components
    for (ty, components) in [
        (kernel_index::REAL2, "xy"),
        (kernel_index::REAL3, "xyz"),
        (kernel_index::REAL4, "xyzw"),
    ] {
        for c in components.chars() {
            member_variable(&mut t, ty, &c.to_string(), R);
        }
    }

    member(&mut t, kernel_index::STRING, "GetLength", &[], &[I]);
    member(&mut t, kernel_index::HANDLE, "GetHashCode", &[], &[I]);
    member(&mut t, kernel_index::HANDLE, "ToString", &[], &[S]);
    member(&mut t, kernel_index::ARRAY, "GetLength", &[], &[I]);
    member(&mut t, kernel_index::COROUTINE, "Start", &[], &[]);
    member(&mut t, kernel_index::COROUTINE, "Abort", &[], &[]);
    member(&mut t, kernel_index::COROUTINE, "IsRunning", &[], &[B]);

    // Scalar math
    global(&mut t, "Abs", &[I], &[I]);
    global(&mut t, "Abs", &[R], &[R]);
    global(&mut t, "Sign", &[I], &[I]);
    global(&mut t, "Sign", &[R], &[I]);
    global(&mut t, "Max", &[I, I], &[I]);
    global(&mut t, "Max", &[R, R], &[R]);
    global(&mut t, "Min", &[I, I], &[I]);
    global(&mut t, "Min", &[R, R], &[R]);
    global(&mut t, "Clamp", &[I, I, I], &[I]);
    global(&mut t, "Clamp", &[R, R, R], &[R]);
    global(&mut t, "Clamp01", &[R], &[R]);
    global(&mut t, "Lerp", &[R, R, R], &[R]);
    global(&mut t, "Sqrt", &[R], &[R]);
    global(&mut t, "Sin", &[R], &[R]);
    global(&mut t, "Cos", &[R], &[R]);
    global(&mut t, "Tan", &[R], &[R]);
    global(&mut t, "Asin", &[R], &[R]);
    global(&mut t, "Acos", &[R], &[R]);
    global(&mut t, "Atan", &[R], &[R]);
    global(&mut t, "Atan2", &[R, R], &[R]);
    global(&mut t, "Exp", &[R], &[R]);
    global(&mut t, "Ln", &[R], &[R]);
    global(&mut t, "Log", &[R, R], &[R]);
    global(&mut t, "Pow", &[R, R], &[R]);
    global(&mut t, "Floor", &[R], &[I]);
    global(&mut t, "Ceil", &[R], &[I]);
    global(&mut t, "Round", &[R], &[I]);

    // Vector math
    global(&mut t, "Dot", &[R2, R2], &[R]);
    global(&mut t, "Dot", &[R3, R3], &[R]);
    global(&mut t, "Dot", &[R4, R4], &[R]);
    global(&mut t, "Cross", &[R3, R3], &[R3]);
    global(&mut t, "Length", &[R2], &[R]);
    global(&mut t, "Length", &[R3], &[R]);
    global(&mut t, "Length", &[R4], &[R]);
    global(&mut t, "Normalize", &[R2], &[R2]);
    global(&mut t, "Normalize", &[R3], &[R3]);
    global(&mut t, "Normalize", &[R4], &[R4]);
    global(&mut t, "Angle", &[R2, R2], &[R]);

    // Runtime helpers
    global(&mut t, "Collect", &[], &[]);
    global(&mut t, "HeapTotalMemory", &[], &[I]);
    global(&mut t, "CountHandle", &[], &[I]);
    global(&mut t, "GetRandomInt", &[], &[I]);
    global(&mut t, "GetRandomReal", &[], &[R]);
    global(&mut t, "SetRandomSeed", &[I], &[]);
    global(&mut t, "Print", &[S], &[]);

    constant(&mut t, "PI", "3.14159265358979323846");
    constant(&mut t, "E", "2.71828182845904523536");

    t
}

fn declare(t: &mut LibraryTable, name: &str, kind: DeclarationKind) {
    t.spaces[ROOT_SPACE as usize]
        .declarations
        .insert(name.to_string(), Declaration::new(LibraryId::Kernel, Visibility::Public, kind));
}

fn params(types: &[CompilingType]) -> Vec<Parameter> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| Parameter { name: format!("arg{i}"), ty: *ty })
        .collect()
}

fn global(t: &mut LibraryTable, name: &str, args: &[CompilingType], returns: &[CompilingType]) {
    let function = Function::new(Visibility::Public, params(args), returns.to_vec());
    if let Some(index) = t.methods.iter().position(|m| m.name == name) {
        t.methods[index].functions.push(function);
        return;
    }
    let method = t.methods.len() as u32;
    t.methods.push(Method { name: name.to_string(), space: ROOT_SPACE, functions: vec![function] });
    declare(t, name, DeclarationKind::GlobalMethod { method });
}

fn member(t: &mut LibraryTable, ty: u32, name: &str, args: &[CompilingType], returns: &[CompilingType]) {
    let definition = &mut t.definitions[ty as usize];
    let method = definition.methods.len() as u32;
    definition.methods.push(Method {
        name: name.to_string(),
        space: ROOT_SPACE,
        functions: vec![Function::new(Visibility::Public, params(args), returns.to_vec())],
    });
    definition.members.insert(
        name.to_string(),
        Declaration::new(LibraryId::Kernel, Visibility::Public, DeclarationKind::MemberMethod { definition: ty, method }),
    );
}

fn member_variable(t: &mut LibraryTable, ty: u32, name: &str, var_ty: CompilingType) {
    let definition = &mut t.definitions[ty as usize];
    let index = definition.variables.len() as u32;
    definition.variables.push(MemberVariable {
        name: name.to_string(),
        visibility: Visibility::Public,
        ty: var_ty,
        offset: definition.size,
        source: None,
    });
    definition.size += var_ty.slot_size();
    definition.members.insert(
        name.to_string(),
        Declaration::new(LibraryId::Kernel, Visibility::Public, DeclarationKind::MemberVariable { definition: ty, index }),
    );
}

fn constant(t: &mut LibraryTable, name: &str, value: &str) {
    let index = t.variables.len() as u32;
    t.variables.push(Variable {
        name: name.to_string(),
        space: ROOT_SPACE,
        visibility: Visibility::Public,
        constant: true,
        ty: R,
        initializer: Some(value.to_string()),
        address: 0,
        source: None,
    });
    declare(t, name, DeclarationKind::GlobalVariable { index });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nameable_type_is_declared_in_root() {
        let t = table();
        for (index, (name, _)) in TYPES.iter().enumerate().take(kernel_index::NULL as usize) {
            let decl = t.lookup(ROOT_SPACE, name).expect(name);
            assert_eq!(decl.kind, DeclarationKind::Definition { index: index as u32 });
        }
        assert!(t.lookup(ROOT_SPACE, "null").is_none());
    }

    #[test]
    fn reference_roots_derive_from_handle() {
        let t = table();
        assert_eq!(t.definitions[kernel_index::HANDLE as usize].parent, CompilingType::INVALID);
        for index in [kernel_index::INTERFACE, kernel_index::DELEGATE, kernel_index::COROUTINE, kernel_index::ARRAY] {
            assert_eq!(t.definitions[index as usize].parent, CompilingType::HANDLE);
        }
        assert_eq!(t.definitions[kernel_index::INTEGER as usize].parent, CompilingType::INVALID);
    }

    #[test]
    fn forty_five_builtin_functions() {
        let total: usize = table().methods.iter().map(|m| m.functions.len()).sum();
        assert_eq!(total, 45);
    }

    #[test]
    fn vector_components_are_laid_out() {
        let real3 = &table().definitions[kernel_index::REAL3 as usize];
        assert_eq!(real3.variables.iter().map(|v| v.offset).collect::<Vec<_>>(), vec![0, 8, 16]);
        assert_eq!(real3.size, 24);
        assert!(real3.members.contains_key("z"));
    }
}

//! The exported surface of a compiled library, as handed to dependents.
//!
//! Everything is flat and index-addressed. Type references name their
//! library relative to the exporter: the kernel, the exporter itself, or a
//! position in the exporter's `dependencies` list.

use serde::{Deserialize, Serialize};

use crate::declaration::Visibility;
use crate::types::TypeCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceLibraryId {
    Kernel,
    Own,
    /// Position in `ReferenceLibrary::dependencies`.
    Dependency(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceType {
    pub library: ReferenceLibraryId,
    pub code: TypeCode,
    pub index: u32,
    pub dimension: u32,
}

impl ReferenceType {
    pub const INVALID: Self = Self {
        library: ReferenceLibraryId::Kernel,
        code: TypeCode::Invalid,
        index: 0,
        dimension: 0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpace {
    pub name: String,
    pub parent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceParameter {
    pub name: String,
    pub ty: ReferenceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFunction {
    pub visibility: Visibility,
    pub params: Vec<ReferenceParameter>,
    pub returns: Vec<ReferenceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMethod {
    pub name: String,
    pub space: u32,
    pub functions: Vec<ReferenceFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMemberVariable {
    pub name: String,
    pub visibility: Visibility,
    pub ty: ReferenceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub name: String,
    pub space: u32,
    pub parent: ReferenceType,
    pub interfaces: Vec<ReferenceType>,
    pub variables: Vec<ReferenceMemberVariable>,
    pub methods: Vec<ReferenceMethod>,
    pub constructors: Vec<ReferenceFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInterface {
    pub name: String,
    pub space: u32,
    pub inherits: Vec<ReferenceType>,
    pub methods: Vec<ReferenceMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDelegate {
    pub name: String,
    pub space: u32,
    pub params: Vec<ReferenceParameter>,
    pub returns: Vec<ReferenceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCoroutine {
    pub name: String,
    pub space: u32,
    pub returns: Vec<ReferenceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVariable {
    pub name: String,
    pub space: u32,
    pub constant: bool,
    pub ty: ReferenceType,
}

/// Exported surface of one library. Namespace-level entries are all public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub name: String,
    pub dependencies: Vec<String>,
    /// Index 0 is the root space.
    pub spaces: Vec<ReferenceSpace>,
    pub definitions: Vec<ReferenceDefinition>,
    pub interfaces: Vec<ReferenceInterface>,
    pub delegates: Vec<ReferenceDelegate>,
    pub coroutines: Vec<ReferenceCoroutine>,
    pub variables: Vec<ReferenceVariable>,
    pub methods: Vec<ReferenceMethod>,
    pub natives: Vec<ReferenceMethod>,
}

impl ReferenceLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            spaces: vec![ReferenceSpace { name: String::new(), parent: None }],
            definitions: Vec::new(),
            interfaces: Vec::new(),
            delegates: Vec::new(),
            coroutines: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            natives: Vec::new(),
        }
    }

    /// Number of exported types with the given code.
    pub fn type_count(&self, code: TypeCode) -> usize {
        match code {
            TypeCode::Handle    => self.definitions.len(),
            TypeCode::Interface => self.interfaces.len(),
            TypeCode::Delegate  => self.delegates.len(),
            TypeCode::Coroutine => self.coroutines.len(),
            TypeCode::Struct | TypeCode::Invalid => 0,
        }
    }
}

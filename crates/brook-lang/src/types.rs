//! Resolved type references.
//!
//! A `CompilingDefinition` names a type inside a specific library; a
//! `CompilingType` adds the array dimension. Kernel types live at fixed
//! indices of the kernel library (see `kernel`).

use serde::{Deserialize, Serialize};

use crate::declaration::LibraryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Invalid,
    /// Kernel value types: bool, integer, real, string, ...
    Struct,
    /// Classes, plus the kernel reference roots (handle, array, ...).
    Handle,
    Interface,
    Delegate,
    Coroutine,
}

// ─── Kernel type indices ──────────────────────────────────────────────────────

pub mod kernel_index {
    pub const BOOL: u32 = 0;
    pub const BYTE: u32 = 1;
    pub const CHAR: u32 = 2;
    pub const INTEGER: u32 = 3;
    pub const REAL: u32 = 4;
    pub const REAL2: u32 = 5;
    pub const REAL3: u32 = 6;
    pub const REAL4: u32 = 7;
    pub const STRING: u32 = 8;
    pub const ENTITY: u32 = 9;
    pub const HANDLE: u32 = 10;
    pub const INTERFACE: u32 = 11;
    pub const DELEGATE: u32 = 12;
    pub const COROUTINE: u32 = 13;
    pub const ARRAY: u32 = 14;
    /// Type of the `null` literal; not nameable from source.
    pub const NULL: u32 = 15;
}

// ─── Definition ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilingDefinition {
    pub library: LibraryId,
    pub code: TypeCode,
    pub index: u32,
}

impl CompilingDefinition {
    pub const INVALID: Self = Self { library: LibraryId::Kernel, code: TypeCode::Invalid, index: 0 };

    pub const BOOL: Self = Self::kernel(TypeCode::Struct, kernel_index::BOOL);
    pub const BYTE: Self = Self::kernel(TypeCode::Struct, kernel_index::BYTE);
    pub const CHAR: Self = Self::kernel(TypeCode::Struct, kernel_index::CHAR);
    pub const INTEGER: Self = Self::kernel(TypeCode::Struct, kernel_index::INTEGER);
    pub const REAL: Self = Self::kernel(TypeCode::Struct, kernel_index::REAL);
    pub const REAL2: Self = Self::kernel(TypeCode::Struct, kernel_index::REAL2);
    pub const REAL3: Self = Self::kernel(TypeCode::Struct, kernel_index::REAL3);
    pub const REAL4: Self = Self::kernel(TypeCode::Struct, kernel_index::REAL4);
    pub const STRING: Self = Self::kernel(TypeCode::Struct, kernel_index::STRING);
    pub const ENTITY: Self = Self::kernel(TypeCode::Struct, kernel_index::ENTITY);
    pub const HANDLE: Self = Self::kernel(TypeCode::Handle, kernel_index::HANDLE);
    pub const INTERFACE: Self = Self::kernel(TypeCode::Handle, kernel_index::INTERFACE);
    pub const DELEGATE: Self = Self::kernel(TypeCode::Handle, kernel_index::DELEGATE);
    pub const COROUTINE: Self = Self::kernel(TypeCode::Handle, kernel_index::COROUTINE);
    pub const ARRAY: Self = Self::kernel(TypeCode::Handle, kernel_index::ARRAY);
    pub const NULL: Self = Self::kernel(TypeCode::Handle, kernel_index::NULL);

    pub const fn new(library: LibraryId, code: TypeCode, index: u32) -> Self {
        Self { library, code, index }
    }

    pub const fn kernel(code: TypeCode, index: u32) -> Self {
        Self { library: LibraryId::Kernel, code, index }
    }

    pub fn is_valid(&self) -> bool { self.code != TypeCode::Invalid }

    pub fn with_dimension(self, dimension: u32) -> CompilingType {
        CompilingType { definition: self, dimension }
    }
}

// ─── Type ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilingType {
    pub definition: CompilingDefinition,
    /// 0 = scalar.
    pub dimension: u32,
}

impl CompilingType {
    pub const INVALID: Self = Self::scalar(CompilingDefinition::INVALID);
    pub const BOOL: Self = Self::scalar(CompilingDefinition::BOOL);
    pub const BYTE: Self = Self::scalar(CompilingDefinition::BYTE);
    pub const CHAR: Self = Self::scalar(CompilingDefinition::CHAR);
    pub const INTEGER: Self = Self::scalar(CompilingDefinition::INTEGER);
    pub const REAL: Self = Self::scalar(CompilingDefinition::REAL);
    pub const REAL2: Self = Self::scalar(CompilingDefinition::REAL2);
    pub const REAL3: Self = Self::scalar(CompilingDefinition::REAL3);
    pub const REAL4: Self = Self::scalar(CompilingDefinition::REAL4);
    pub const STRING: Self = Self::scalar(CompilingDefinition::STRING);
    pub const ENTITY: Self = Self::scalar(CompilingDefinition::ENTITY);
    pub const HANDLE: Self = Self::scalar(CompilingDefinition::HANDLE);
    pub const INTERFACE: Self = Self::scalar(CompilingDefinition::INTERFACE);
    pub const DELEGATE: Self = Self::scalar(CompilingDefinition::DELEGATE);
    pub const COROUTINE: Self = Self::scalar(CompilingDefinition::COROUTINE);
    pub const ARRAY: Self = Self::scalar(CompilingDefinition::ARRAY);
    pub const NULL: Self = Self::scalar(CompilingDefinition::NULL);

    pub const fn scalar(definition: CompilingDefinition) -> Self {
        Self { definition, dimension: 0 }
    }

    pub fn is_valid(&self) -> bool { self.definition.is_valid() }

    pub fn is_array(&self) -> bool { self.dimension > 0 }

    /// Reference kinds carry nullability; value kinds do not.
    pub fn is_reference(&self) -> bool {
        self.dimension > 0
            || matches!(
                self.definition.code,
                TypeCode::Handle | TypeCode::Interface | TypeCode::Delegate | TypeCode::Coroutine
            )
    }

    /// Storage size in bytes of a slot holding this type.
    pub fn slot_size(&self) -> u32 {
        if self.is_reference() {
            return 4;
        }
        if self.definition.library != LibraryId::Kernel {
            return 4;
        }
        match self.definition.index {
            kernel_index::BOOL | kernel_index::BYTE => 1,
            kernel_index::CHAR                      => 2,
            kernel_index::INTEGER | kernel_index::REAL => 8,
            kernel_index::REAL2                     => 16,
            kernel_index::REAL3                     => 24,
            kernel_index::REAL4                     => 32,
            _                                       => 4,
        }
    }
}

impl Default for CompilingType {
    fn default() -> Self { Self::INVALID }
}

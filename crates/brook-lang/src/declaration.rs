//! Declarations: compact, copyable identities for every named entity.
//!
//! A `Declaration` says *what* a symbol is and *where* it lives: the library
//! it came from, its visibility, and a kind-specific set of indices into that
//! library's tables. It carries no names and no types; the
//! `DeclarationManager` turns it into facts.

use serde::{Deserialize, Serialize};

// ─── Library identity ─────────────────────────────────────────────────────────

/// Library of origin, in the numbering of the current compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LibraryId {
    Kernel,
    /// The library being compiled.
    Local,
    /// Position in the ordered rely list handed to the builder.
    Rely(u32),
}

// ─── Visibility ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Internal,
    Space,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Public    => "public",
            Self::Internal  => "internal",
            Self::Space     => "space",
            Self::Protected => "protected",
            Self::Private   => "private",
        }
    }

    fn breadth(self) -> u8 {
        match self {
            Self::Public    => 4,
            Self::Internal  => 3,
            Self::Space     => 2,
            Self::Protected => 1,
            Self::Private   => 0,
        }
    }

    /// The wider of the two. A method group carries the widest visibility of
    /// its overloads; access is still decided per overload.
    pub fn widest(self, other: Self) -> Self {
        if other.breadth() > self.breadth() { other } else { self }
    }

    /// Whether dependents of the library may ever see a member with this visibility.
    pub fn is_exported_member(self) -> bool {
        matches!(self, Self::Public | Self::Protected)
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

// ─── Kind ─────────────────────────────────────────────────────────────────────

/// One variant per declaration kind, each carrying only its own indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclarationKind {
    Invalid,
    Definition { index: u32 },
    MemberVariable { definition: u32, index: u32 },
    MemberMethod { definition: u32, method: u32 },
    MemberFunction { definition: u32, method: u32, overload: u32 },
    Constructor { definition: u32, overload: u32 },
    Delegate { index: u32 },
    Coroutine { index: u32 },
    Interface { index: u32 },
    InterfaceMethod { interface: u32, method: u32 },
    InterfaceFunction { interface: u32, method: u32, overload: u32 },
    GlobalVariable { index: u32 },
    GlobalMethod { method: u32 },
    GlobalFunction { method: u32, overload: u32 },
    NativeMethod { method: u32 },
    NativeFunction { method: u32, overload: u32 },
    Lambda { index: u32 },
    Local { index: u32 },
}

impl DeclarationKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Invalid                 => "invalid",
            Self::Definition { .. }       => "class",
            Self::MemberVariable { .. }   => "member variable",
            Self::MemberMethod { .. }     => "member method",
            Self::MemberFunction { .. }   => "member function",
            Self::Constructor { .. }      => "constructor",
            Self::Delegate { .. }         => "delegate",
            Self::Coroutine { .. }        => "coroutine",
            Self::Interface { .. }        => "interface",
            Self::InterfaceMethod { .. }  => "interface method",
            Self::InterfaceFunction { .. } => "interface function",
            Self::GlobalVariable { .. }   => "variable",
            Self::GlobalMethod { .. }     => "method",
            Self::GlobalFunction { .. }   => "function",
            Self::NativeMethod { .. }     => "native method",
            Self::NativeFunction { .. }   => "native function",
            Self::Lambda { .. }           => "lambda",
            Self::Local { .. }            => "local",
        }
    }

    /// Method groups: the kinds overload resolution starts from.
    pub fn is_method(&self) -> bool {
        matches!(
            self,
            Self::MemberMethod { .. } | Self::InterfaceMethod { .. }
                | Self::GlobalMethod { .. } | Self::NativeMethod { .. }
        )
    }
}

// ─── Declaration ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Declaration {
    pub library: LibraryId,
    pub visibility: Visibility,
    pub kind: DeclarationKind,
}

impl Declaration {
    /// "No declaration."
    pub const INVALID: Self = Self {
        library: LibraryId::Kernel,
        visibility: Visibility::Private,
        kind: DeclarationKind::Invalid,
    };

    pub const fn new(library: LibraryId, visibility: Visibility, kind: DeclarationKind) -> Self {
        Self { library, visibility, kind }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, DeclarationKind::Invalid)
    }

    /// The owning method group of a function declaration, or the group itself.
    pub fn method_group(&self) -> Declaration {
        use DeclarationKind::*;
        let kind = match self.kind {
            MemberFunction { definition, method, .. } => MemberMethod { definition, method },
            InterfaceFunction { interface, method, .. } => InterfaceMethod { interface, method },
            GlobalFunction { method, .. } => GlobalMethod { method },
            NativeFunction { method, .. } => NativeMethod { method },
            other => other,
        };
        Declaration { kind, ..*self }
    }

    /// Select one overload of a method group.
    pub fn overload(&self, overload: u32) -> Option<Declaration> {
        use DeclarationKind::*;
        let kind = match self.kind {
            MemberMethod { definition, method } => MemberFunction { definition, method, overload },
            InterfaceMethod { interface, method } => InterfaceFunction { interface, method, overload },
            GlobalMethod { method } => GlobalFunction { method, overload },
            NativeMethod { method } => NativeFunction { method, overload },
            _ => return None,
        };
        Some(Declaration { kind, ..*self })
    }
}

impl Default for Declaration {
    fn default() -> Self { Self::INVALID }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_not_valid() {
        assert!(!Declaration::INVALID.is_valid());
        assert!(Declaration::new(LibraryId::Local, Visibility::Public, DeclarationKind::Definition { index: 0 }).is_valid());
    }

    #[test]
    fn overload_and_group_round_trip() {
        let group = Declaration::new(LibraryId::Rely(2), Visibility::Public, DeclarationKind::GlobalMethod { method: 4 });
        let f = group.overload(1).expect("method groups have overloads");
        assert_eq!(f.kind, DeclarationKind::GlobalFunction { method: 4, overload: 1 });
        assert_eq!(f.method_group(), group);
    }

    #[test]
    fn non_methods_have_no_overloads() {
        let var = Declaration::new(LibraryId::Local, Visibility::Space, DeclarationKind::GlobalVariable { index: 0 });
        assert!(var.overload(0).is_none());
        assert_eq!(var.method_group(), var);
    }

    #[test]
    fn widest_visibility_prefers_public() {
        assert_eq!(Visibility::Private.widest(Visibility::Public), Visibility::Public);
        assert_eq!(Visibility::Internal.widest(Visibility::Protected), Visibility::Internal);
        assert_eq!(Visibility::Private.widest(Visibility::Private), Visibility::Private);
    }

    #[test]
    fn structural_equality_includes_library() {
        let a = Declaration::new(LibraryId::Rely(0), Visibility::Public, DeclarationKind::Interface { index: 3 });
        let b = Declaration::new(LibraryId::Rely(1), Visibility::Public, DeclarationKind::Interface { index: 3 });
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}

//! Declaration manager: the single facade over kernel, local and rely tables.
//!
//! Every question about a `Declaration` or a `CompilingType` goes through
//! here, whatever library it came from: structural lookups, subtype tests,
//! overload costs and diagnostic names.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::declaration::{Declaration, DeclarationKind, LibraryId};
use crate::kernel;
use crate::pool::CollectionPool;
use crate::rely::RelyLibrary;
use crate::table::{Definition, Delegate, Function, Interface, LibraryTable, ROOT_SPACE};
use crate::types::{CompilingDefinition, CompilingType, TypeCode};

/// Overload costs of the implicit numeric widenings. Any structural match is
/// cheaper than a widening, and narrower widenings are cheaper than wider ones.
pub mod measure {
    pub const INTEGER_TO_REAL: u32 = 0xff;
    pub const REAL2_TO_REAL3: u32 = 0xff;
    pub const REAL3_TO_REAL4: u32 = 0xff;
    pub const REAL2_TO_REAL4: u32 = 0x1ff;
}

const WIDENINGS: [(CompilingDefinition, CompilingDefinition, u32); 4] = [
    (CompilingDefinition::INTEGER, CompilingDefinition::REAL, measure::INTEGER_TO_REAL),
    (CompilingDefinition::REAL2, CompilingDefinition::REAL3, measure::REAL2_TO_REAL3),
    (CompilingDefinition::REAL3, CompilingDefinition::REAL4, measure::REAL3_TO_REAL4),
    (CompilingDefinition::REAL2, CompilingDefinition::REAL4, measure::REAL2_TO_REAL4),
];

/// The overload chosen by resolution and its total cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMatch {
    pub declaration: Declaration,
    pub measure: u32,
}

pub struct DeclarationManager<'a> {
    pool: &'a CollectionPool,
    local: &'a LibraryTable,
    relies: &'a [RelyLibrary],
}

impl<'a> DeclarationManager<'a> {
    pub fn new(pool: &'a CollectionPool, local: &'a LibraryTable, relies: &'a [RelyLibrary]) -> Self {
        Self { pool, local, relies }
    }

    pub fn pool(&self) -> &'a CollectionPool { self.pool }

    pub fn local(&self) -> &'a LibraryTable { self.local }

    pub fn relies(&self) -> &'a [RelyLibrary] { self.relies }

    pub fn table(&self, library: LibraryId) -> Option<&'a LibraryTable> {
        match library {
            LibraryId::Kernel => Some(kernel::table()),
            LibraryId::Local => Some(self.local),
            LibraryId::Rely(index) => self.relies.get(index as usize).map(|r| &r.table),
        }
    }

    pub fn rely_by_name(&self, name: &str) -> Option<&'a LibraryTable> {
        self.relies.iter().map(|r| &r.table).find(|t| t.name == name)
    }

    // ─── Structure ───────────────────────────────────────────────────────────

    /// Immediate base of a type. Interface, delegate and coroutine types report
    /// their kernel root, which in turn reports `handle`.
    pub fn get_parent(&self, definition: CompilingDefinition) -> CompilingType {
        match definition.code {
            TypeCode::Invalid => CompilingType::INVALID,
            TypeCode::Struct | TypeCode::Handle => {
                self.try_get_definition(definition).map_or(CompilingType::INVALID, |d| d.parent)
            }
            TypeCode::Interface => CompilingType::INTERFACE,
            TypeCode::Delegate  => CompilingType::DELEGATE,
            TypeCode::Coroutine => CompilingType::COROUTINE,
        }
    }

    pub fn try_get_definition(&self, definition: CompilingDefinition) -> Option<&'a Definition> {
        match definition.code {
            TypeCode::Struct | TypeCode::Handle => self.table(definition.library)?.definition(definition.index),
            _ => None,
        }
    }

    pub fn try_get_interface(&self, definition: CompilingDefinition) -> Option<&'a Interface> {
        match definition.code {
            TypeCode::Interface => self.table(definition.library)?.interface(definition.index),
            _ => None,
        }
    }

    pub fn try_get_delegate(&self, definition: CompilingDefinition) -> Option<&'a Delegate> {
        match definition.code {
            TypeCode::Delegate => self.table(definition.library)?.delegates.get(definition.index as usize),
            _ => None,
        }
    }

    /// The type named by a type declaration.
    pub fn declared_type(&self, declaration: Declaration) -> Option<CompilingDefinition> {
        self.table(declaration.library)?.declared_type(declaration)
    }

    /// A type's own member table entry, no inheritance.
    pub fn find_member(&self, owner: CompilingDefinition, name: &str) -> Option<Declaration> {
        if let Some(d) = self.try_get_definition(owner) {
            return d.members.get(name).copied();
        }
        self.try_get_interface(owner)?.members.get(name).copied()
    }

    pub fn overloads(&self, declaration: Declaration) -> Option<&'a [Function]> {
        self.table(declaration.library)?.overloads(declaration)
    }

    pub fn function(&self, declaration: Declaration) -> Option<&'a Function> {
        self.table(declaration.library)?.function(declaration)
    }

    pub fn owner_type(&self, declaration: Declaration) -> Option<CompilingDefinition> {
        self.table(declaration.library)?.owner_type(declaration)
    }

    // ─── Inheritance ─────────────────────────────────────────────────────────

    /// Subtype test: `Some(depth)` if a `sub` value may be used where `base` is
    /// expected, with the number of hops between them.
    pub fn try_get_inherit(&self, base: CompilingType, sub: CompilingType) -> Option<u32> {
        if !base.is_valid() || !sub.is_valid() {
            return None;
        }
        if base == sub {
            return Some(0);
        }

        // Arrays of any element type promote to `array`, then `handle`.
        if sub.is_array() {
            return match base {
                CompilingType::ARRAY  => Some(1),
                CompilingType::HANDLE => Some(2),
                _ => None,
            };
        }
        if base.is_array() {
            return None;
        }

        let (b, s) = (base.definition, sub.definition);
        match s.code {
            TypeCode::Invalid | TypeCode::Struct => None,
            TypeCode::Interface if b.code == TypeCode::Interface => self.interface_depth(b, s),
            TypeCode::Interface | TypeCode::Delegate | TypeCode::Coroutine => {
                if b == self.get_parent(s).definition {
                    Some(1)
                } else if b == CompilingDefinition::HANDLE {
                    Some(2)
                } else {
                    None
                }
            }
            TypeCode::Handle => self.class_depth(b, s),
        }
    }

    pub fn is_subtype(&self, base: CompilingDefinition, sub: CompilingDefinition) -> bool {
        self.try_get_inherit(CompilingType::scalar(base), CompilingType::scalar(sub)).is_some()
    }

    /// Walk the parent chain of a handle type, checking implemented interfaces
    /// at every hop when `base` is an interface.
    fn class_depth(&self, base: CompilingDefinition, sub: CompilingDefinition) -> Option<u32> {
        let mut seen = self.pool.take::<FxHashSet<CompilingDefinition>>();
        let mut current = sub;
        let mut depth = 0;
        while current.is_valid() && seen.insert(current) {
            if current == base {
                return Some(depth);
            }
            if base.code == TypeCode::Interface {
                let found = self
                    .try_get_definition(current)
                    .and_then(|d| self.implements_depth(&d.interfaces, base));
                if let Some(d) = found {
                    return Some(depth + d);
                }
            }
            current = self.get_parent(current).definition;
            depth += 1;
        }
        None
    }

    /// Shortest path from a list of directly implemented interfaces to `base`,
    /// counting the implementation hop itself.
    fn implements_depth(&self, interfaces: &[CompilingType], base: CompilingDefinition) -> Option<u32> {
        interfaces
            .iter()
            .filter(|i| !i.is_array())
            .filter_map(|i| self.interface_depth(base, i.definition))
            .min()
            .map(|d| d + 1)
    }

    /// Breadth-first search over base interfaces. Interfaces form a DAG, so a
    /// visited set keeps shared bases from being expanded twice.
    fn interface_depth(&self, base: CompilingDefinition, sub: CompilingDefinition) -> Option<u32> {
        let mut queue = self.pool.take::<VecDeque<(CompilingDefinition, u32)>>();
        let mut seen = self.pool.take::<FxHashSet<CompilingDefinition>>();
        queue.push_back((sub, 0));
        while let Some((current, depth)) = queue.pop_front() {
            if current == base {
                return Some(depth);
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(interface) = self.try_get_interface(current) {
                for inherit in &interface.inherits {
                    if !inherit.is_array() && inherit.definition.code == TypeCode::Interface {
                        queue.push_back((inherit.definition, depth + 1));
                    }
                }
            }
        }
        None
    }

    /// Every interface `definition` implements, directly or through base
    /// interfaces, in breadth-first order. For an interface, includes itself.
    pub fn interface_closure(&self, definition: CompilingDefinition) -> Vec<CompilingDefinition> {
        let mut queue = self.pool.take::<VecDeque<CompilingDefinition>>();
        let mut seen = self.pool.take::<FxHashSet<CompilingDefinition>>();
        let mut closure = Vec::new();

        if definition.code == TypeCode::Interface {
            queue.push_back(definition);
        } else if let Some(d) = self.try_get_definition(definition) {
            queue.extend(d.interfaces.iter().filter(|i| !i.is_array()).map(|i| i.definition));
        }

        while let Some(current) = queue.pop_front() {
            if current.code != TypeCode::Interface || !seen.insert(current) {
                continue;
            }
            closure.push(current);
            if let Some(interface) = self.try_get_interface(current) {
                queue.extend(interface.inherits.iter().filter(|i| !i.is_array()).map(|i| i.definition));
            }
        }
        closure
    }

    // ─── Measure ─────────────────────────────────────────────────────────────

    /// Cost of passing a `sub` where a `base` is expected, `None` if impossible.
    pub fn try_get_measure(&self, base: CompilingType, sub: CompilingType) -> Option<u32> {
        if base == sub && base.is_valid() {
            return Some(0);
        }
        if sub == CompilingType::NULL {
            return base.is_reference().then_some(0);
        }
        if !base.is_array() && !sub.is_array() {
            let widening = WIDENINGS
                .iter()
                .find(|(from, to, _)| *from == sub.definition && *to == base.definition);
            if let Some((_, _, cost)) = widening {
                return Some(*cost);
            }
        }
        self.try_get_inherit(base, sub)
    }

    // ─── Overloads ───────────────────────────────────────────────────────────

    /// Overload resolution over a method group.
    ///
    /// Without `returns`, the candidate with the lowest summed parameter measure
    /// wins; on equal cost the first declared overload is kept. With `returns`,
    /// only an exact parameter and return match is accepted.
    pub fn try_get_function(
        &self,
        method: Declaration,
        params: &[CompilingType],
        returns: Option<&[CompilingType]>,
    ) -> Option<FunctionMatch> {
        self.try_get_function_where(method, params, returns, |_| true)
    }

    /// `try_get_function` over the overloads `accept` admits. Each candidate is
    /// offered with its own visibility, not the group's.
    pub fn try_get_function_where(
        &self,
        method: Declaration,
        params: &[CompilingType],
        returns: Option<&[CompilingType]>,
        accept: impl Fn(Declaration) -> bool,
    ) -> Option<FunctionMatch> {
        let group = method.method_group();
        if !group.kind.is_method() {
            return None;
        }
        let functions = self.overloads(group)?;
        let found = self.select(functions, params, returns, |overload, function| {
            group
                .overload(overload)
                .map(|d| Declaration { visibility: function.visibility, ..d })
                .filter(|d| accept(*d))
        });
        tracing::trace!(
            method = %self.get_declaration_full_name(group),
            found = ?found.map(|m| m.declaration.kind),
            "overload resolution"
        );
        found
    }

    pub fn try_get_constructor(
        &self,
        definition: CompilingDefinition,
        params: &[CompilingType],
    ) -> Option<FunctionMatch> {
        let functions = &self.try_get_definition(definition)?.constructors;
        self.select(functions, params, None, |overload, function| {
            Some(Declaration::new(
                definition.library,
                function.visibility,
                DeclarationKind::Constructor { definition: definition.index, overload },
            ))
        })
    }

    fn select(
        &self,
        functions: &[Function],
        params: &[CompilingType],
        returns: Option<&[CompilingType]>,
        declare: impl Fn(u32, &Function) -> Option<Declaration>,
    ) -> Option<FunctionMatch> {
        let mut best: Option<FunctionMatch> = None;
        for (index, function) in functions.iter().enumerate() {
            if function.params.len() != params.len() {
                continue;
            }
            if let Some(returns) = returns {
                if function.same_params_as(params) && function.returns.as_slice() == returns {
                    if let Some(declaration) = declare(index as u32, function) {
                        return Some(FunctionMatch { declaration, measure: 0 });
                    }
                }
                continue;
            }

            let mut total: u32 = 0;
            let mut applicable = true;
            for (expected, actual) in function.param_types().zip(params) {
                match self.try_get_measure(expected, *actual) {
                    Some(m) => total = total.saturating_add(m),
                    None => {
                        applicable = false;
                        break;
                    }
                }
            }
            if applicable && best.is_none_or(|b| total < b.measure) {
                if let Some(declaration) = declare(index as u32, function) {
                    best = Some(FunctionMatch { declaration, measure: total });
                }
            }
        }
        best
    }

    /// The nearest same-named method above `owner`: through the parent chain
    /// for handle types, through base interfaces for interfaces.
    pub fn get_override_method(&self, owner: CompilingDefinition, name: &str) -> Option<Declaration> {
        match owner.code {
            TypeCode::Interface => {
                let mut queue = self.pool.take::<VecDeque<CompilingDefinition>>();
                let mut seen = self.pool.take::<FxHashSet<CompilingDefinition>>();
                queue.extend(self.try_get_interface(owner)?.inherits.iter().map(|i| i.definition));
                while let Some(current) = queue.pop_front() {
                    if !seen.insert(current) {
                        continue;
                    }
                    let Some(interface) = self.try_get_interface(current) else { continue };
                    if let Some(found) = interface.members.get(name).filter(|d| d.kind.is_method()) {
                        return Some(*found);
                    }
                    queue.extend(interface.inherits.iter().map(|i| i.definition));
                }
                None
            }
            TypeCode::Handle => {
                let mut seen = self.pool.take::<FxHashSet<CompilingDefinition>>();
                let mut current = self.get_parent(owner).definition;
                while current.is_valid() && seen.insert(current) {
                    let found = self
                        .try_get_definition(current)
                        .and_then(|d| d.members.get(name))
                        .filter(|d| d.kind.is_method());
                    if let Some(found) = found {
                        return Some(*found);
                    }
                    current = self.get_parent(current).definition;
                }
                None
            }
            _ => None,
        }
    }

    // ─── Names ───────────────────────────────────────────────────────────────

    fn qualified(table: &LibraryTable, space: u32, tail: &[&str]) -> String {
        let mut parts = vec![table.name.as_str()];
        parts.extend(table.space_path(space));
        parts.extend_from_slice(tail);
        parts.join(".")
    }

    /// `integer[]` for kernel types, `Library.Space.Name` for everything else.
    pub fn type_full_name(&self, ty: CompilingType) -> String {
        let found = self
            .table(ty.definition.library)
            .and_then(|t| t.type_name(ty.definition).map(|named| (t, named)));
        let mut name = match found {
            Some((t, (name, _))) if t.library == LibraryId::Kernel => name.to_string(),
            Some((t, (name, space))) => Self::qualified(t, space, &[name]),
            None => "<invalid>".to_string(),
        };
        for _ in 0..ty.dimension {
            name.push_str("[]");
        }
        name
    }

    /// Fully qualified display name of any declaration, with the parameter list
    /// for functions. Presentation only.
    pub fn get_declaration_full_name(&self, declaration: Declaration) -> String {
        let Some(table) = self.table(declaration.library) else { return "<invalid>".to_string() };
        let Some(name) = table.declaration_name(declaration) else {
            return format!("<{}>", declaration.kind.describe());
        };

        let mut full = match table.owner_type(declaration).and_then(|o| table.type_name(o)) {
            Some((owner, space)) => Self::qualified(table, space, &[owner, name]),
            None => Self::qualified(table, table.declaration_space(declaration).unwrap_or(ROOT_SPACE), &[name]),
        };
        if let Some(function) = table.function(declaration) {
            let params: Vec<String> = function.param_types().map(|t| self.type_full_name(t)).collect();
            full.push('(');
            full.push_str(&params.join(", "));
            full.push(')');
        }
        full
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::*;
    use crate::declaration::Visibility;
    use crate::table::{Method, Parameter};

    // ── Fixture ───────────────────────────────────────────────────────────────
    //
    //   interface Named
    //   interface Shape : Named
    //   class Base : Shape
    //   class Mid : Base
    //   class Leaf : Mid
    //   space Util: class Stray
    //   f(integer), f(real), g(real, real)

    fn class(table: &mut LibraryTable, name: &str, parent: CompilingType, interfaces: Vec<CompilingType>) -> CompilingType {
        let index = table.definitions.len() as u32;
        table.definitions.push(Definition {
            name: name.into(),
            space: ROOT_SPACE,
            visibility: Visibility::Public,
            code: TypeCode::Handle,
            parent,
            interfaces,
            variables: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            members: FxHashMap::default(),
            size: 0,
            source: None,
        });
        CompilingType::scalar(CompilingDefinition::new(LibraryId::Local, TypeCode::Handle, index))
    }

    fn interface(table: &mut LibraryTable, name: &str, inherits: Vec<CompilingType>) -> CompilingType {
        let index = table.interfaces.len() as u32;
        table.interfaces.push(Interface {
            name: name.into(),
            space: ROOT_SPACE,
            visibility: Visibility::Public,
            inherits,
            methods: Vec::new(),
            members: FxHashMap::default(),
            source: None,
        });
        CompilingType::scalar(CompilingDefinition::new(LibraryId::Local, TypeCode::Interface, index))
    }

    fn global(table: &mut LibraryTable, name: &str, params: &[CompilingType]) -> Declaration {
        let function = Function::new(
            Visibility::Public,
            params.iter().map(|t| Parameter { name: "v".into(), ty: *t }).collect(),
            vec![],
        );
        if let Some(index) = table.methods.iter().position(|m| m.name == name) {
            table.methods[index].functions.push(function);
            return Declaration::new(LibraryId::Local, Visibility::Public, DeclarationKind::GlobalMethod { method: index as u32 });
        }
        let method = table.methods.len() as u32;
        table.methods.push(Method { name: name.into(), space: ROOT_SPACE, functions: vec![function] });
        Declaration::new(LibraryId::Local, Visibility::Public, DeclarationKind::GlobalMethod { method })
    }

    struct Fixture {
        table: LibraryTable,
        named: CompilingType,
        shape: CompilingType,
        base: CompilingType,
        mid: CompilingType,
        leaf: CompilingType,
        stray: CompilingType,
    }

    fn fixture() -> Fixture {
        let mut table = LibraryTable::new("Geo", LibraryId::Local);
        let named = interface(&mut table, "Named", vec![]);
        let shape = interface(&mut table, "Shape", vec![named]);
        let base = class(&mut table, "Base", CompilingType::HANDLE, vec![shape]);
        let mid = class(&mut table, "Mid", base, vec![]);
        let leaf = class(&mut table, "Leaf", mid, vec![]);
        let util = table.ensure_space(ROOT_SPACE, "Util");
        let stray = class(&mut table, "Stray", CompilingType::HANDLE, vec![]);
        table.definitions[stray.definition.index as usize].space = util;
        Fixture { table, named, shape, base, mid, leaf, stray }
    }

    // ── Inheritance ───────────────────────────────────────────────────────────

    #[test]
    fn inherit_depth_counts_parent_hops() {
        let f = fixture();
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert_eq!(m.try_get_inherit(f.leaf, f.leaf), Some(0));
        assert_eq!(m.try_get_inherit(f.mid, f.leaf), Some(1));
        assert_eq!(m.try_get_inherit(f.base, f.leaf), Some(2));
        assert_eq!(m.try_get_inherit(CompilingType::HANDLE, f.leaf), Some(3));
        assert_eq!(m.try_get_inherit(f.leaf, f.base), None);
        assert_eq!(m.try_get_inherit(f.stray, f.leaf), None);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn inherit_through_implemented_interfaces() {
        let f = fixture();
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert_eq!(m.try_get_inherit(f.shape, f.base), Some(1));
        assert_eq!(m.try_get_inherit(f.named, f.base), Some(2));
        // Two parent hops, then Shape, then Named.
        assert_eq!(m.try_get_inherit(f.named, f.leaf), Some(4));
        assert_eq!(m.try_get_inherit(f.named, f.shape), Some(1));
        assert_eq!(m.try_get_inherit(f.shape, f.named), None);
    }

    #[test]
    fn kernel_promotions() {
        let f = fixture();
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        let shapes = f.leaf.definition.with_dimension(2);
        assert_eq!(m.try_get_inherit(CompilingType::ARRAY, shapes), Some(1));
        assert_eq!(m.try_get_inherit(CompilingType::HANDLE, shapes), Some(2));
        assert_eq!(m.try_get_inherit(f.leaf.definition.with_dimension(1), shapes), None);
        assert_eq!(m.try_get_inherit(CompilingType::INTERFACE, f.shape), Some(1));
        assert_eq!(m.try_get_inherit(CompilingType::HANDLE, f.shape), Some(2));
        assert_eq!(m.try_get_inherit(CompilingType::INTERFACE, f.leaf), None);
        assert_eq!(m.get_parent(CompilingDefinition::ARRAY), CompilingType::HANDLE);
        assert_eq!(m.get_parent(CompilingDefinition::HANDLE), CompilingType::INVALID);
    }

    // ── Measure ───────────────────────────────────────────────────────────────

    #[test]
    fn widening_costs_are_ordered() {
        let f = fixture();
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert_eq!(m.try_get_measure(CompilingType::REAL, CompilingType::INTEGER), Some(0xff));
        assert_eq!(m.try_get_measure(CompilingType::REAL3, CompilingType::REAL2), Some(0xff));
        assert_eq!(m.try_get_measure(CompilingType::REAL4, CompilingType::REAL2), Some(0x1ff));
        assert_eq!(m.try_get_measure(CompilingType::INTEGER, CompilingType::REAL), None);
        let structural = m.try_get_measure(CompilingType::HANDLE, f.leaf).expect("leaf is a handle");
        assert!(structural < measure::INTEGER_TO_REAL);
    }

    #[test]
    fn null_fits_every_reference() {
        let f = fixture();
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert_eq!(m.try_get_measure(f.leaf, CompilingType::NULL), Some(0));
        assert_eq!(m.try_get_measure(f.shape, CompilingType::NULL), Some(0));
        assert_eq!(m.try_get_measure(CompilingType::REAL.definition.with_dimension(1), CompilingType::NULL), Some(0));
        assert_eq!(m.try_get_measure(CompilingType::INTEGER, CompilingType::NULL), None);
    }

    // ── Overloads ─────────────────────────────────────────────────────────────

    #[test]
    fn exact_overload_beats_widening() {
        let mut f = fixture();
        global(&mut f.table, "f", &[CompilingType::REAL]);
        let group = global(&mut f.table, "f", &[CompilingType::INTEGER]);
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);

        let hit = m.try_get_function(group, &[CompilingType::INTEGER], None).expect("f(integer)");
        assert_eq!(hit.declaration.kind, DeclarationKind::GlobalFunction { method: 0, overload: 1 });
        assert_eq!(hit.measure, 0);

        let hit = m.try_get_function(group, &[CompilingType::REAL], None).expect("f(real)");
        assert_eq!(hit.declaration.kind, DeclarationKind::GlobalFunction { method: 0, overload: 0 });
        assert!(m.try_get_function(group, &[CompilingType::STRING], None).is_none());
    }

    #[test]
    fn ties_keep_the_first_declared_overload() {
        let mut f = fixture();
        let (mid, base) = (f.mid, f.base);
        global(&mut f.table, "g", &[mid, base]);
        let group = global(&mut f.table, "g", &[base, mid]);
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        for _ in 0..3 {
            let hit = m.try_get_function(group, &[f.mid, f.mid], None).expect("both apply");
            assert_eq!(hit.declaration.kind, DeclarationKind::GlobalFunction { method: 0, overload: 0 });
            assert_eq!(hit.measure, 1);
        }
    }

    #[test]
    fn expected_returns_require_exact_match() {
        let mut f = fixture();
        let group = global(&mut f.table, "h", &[CompilingType::REAL]);
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert!(m.try_get_function(group, &[CompilingType::INTEGER], Some(&[])).is_none());
        assert!(m.try_get_function(group, &[CompilingType::REAL], Some(&[])).is_some());
        assert!(m.try_get_function(group, &[CompilingType::REAL], Some(&[CompilingType::REAL])).is_none());
    }

    #[test]
    fn override_lookup_starts_above_the_owner() {
        let mut f = fixture();
        let base = f.base.definition.index as usize;
        f.table.definitions[base].methods.push(Method { name: "Area".into(), space: ROOT_SPACE, functions: vec![] });
        let decl = Declaration::new(
            LibraryId::Local,
            Visibility::Public,
            DeclarationKind::MemberMethod { definition: base as u32, method: 0 },
        );
        f.table.definitions[base].members.insert("Area".into(), decl);
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        assert_eq!(m.get_override_method(f.leaf.definition, "Area"), Some(decl));
        assert_eq!(m.get_override_method(f.base.definition, "Area"), None);
        assert_eq!(m.get_override_method(f.leaf.definition, "ToString").map(|d| d.library), Some(LibraryId::Kernel));
    }

    // ── Names ─────────────────────────────────────────────────────────────────

    #[test]
    fn full_names() {
        let mut f = fixture();
        let group = global(&mut f.table, "f", &[CompilingType::INTEGER, f.stray]);
        let pool = CollectionPool::new();
        let m = DeclarationManager::new(&pool, &f.table, &[]);
        let func = group.overload(0).expect("overload");
        assert_eq!(m.get_declaration_full_name(func), "Geo.f(integer, Geo.Util.Stray)");
        assert_eq!(m.type_full_name(CompilingType::REAL.definition.with_dimension(2)), "real[][]");
        let sqrt = kernel::table().lookup(ROOT_SPACE, "Sqrt").and_then(|d| d.overload(0)).expect("Sqrt");
        assert_eq!(m.get_declaration_full_name(sqrt), "kernel.Sqrt(real)");
    }
}

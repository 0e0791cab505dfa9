//! Overload resolution and inheritance distance over compiled libraries.

use brook_lang::builder::CompileState;
use brook_lang::compiling::CompilingLibrary;
use brook_lang::manager::{DeclarationManager, measure};
use brook_lang::pool::CollectionPool;
use brook_lang::table::ROOT_SPACE;
use brook_lang::{Builder, CompilingType, Declaration, DeclarationKind, SourceFile};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn compiled(src: &str) -> CompilingLibrary {
    let mut builder = Builder::new("Ovl", vec![SourceFile::new("ovl.brook", src)], Vec::new());
    assert_eq!(builder.compile(), CompileState::Completed, "{:#?}", builder.diagnostics());
    builder.compiled().cloned().expect("compiled")
}

fn global(library: &CompilingLibrary, name: &str) -> Declaration {
    library.table.lookup(ROOT_SPACE, name).expect("declared")
}

fn class(library: &CompilingLibrary, manager: &DeclarationManager<'_>, name: &str) -> CompilingType {
    let declaration = global(library, name);
    CompilingType::scalar(manager.declared_type(declaration).expect("a type"))
}

fn chosen(kind: DeclarationKind) -> u32 {
    match kind {
        DeclarationKind::GlobalFunction { overload, .. } => overload,
        other => panic!("expected a global function, got {other:?}"),
    }
}

// ─── Scenario: integer argument ──────────────────────────────────────────────

#[test]
fn integer_argument_prefers_integer_overload() {
    let library = compiled("f(real x)\nf(integer x)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let f = global(&library, "f");

    let found = manager.try_get_function(f, &[CompilingType::INTEGER], None).expect("resolved");
    assert_eq!(chosen(found.declaration.kind), 1);
    assert_eq!(found.measure, 0);

    let found = manager.try_get_function(f, &[CompilingType::REAL], None).expect("resolved");
    assert_eq!(chosen(found.declaration.kind), 0);
}

#[test]
fn widening_is_used_when_nothing_matches_exactly() {
    let library = compiled("f(real x)\nf(string x)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let found = manager
        .try_get_function(global(&library, "f"), &[CompilingType::INTEGER], None)
        .expect("resolved");
    assert_eq!(chosen(found.declaration.kind), 0);
    assert_eq!(found.measure, measure::INTEGER_TO_REAL);
}

#[test]
fn no_candidate_accepts_the_arguments() {
    let library = compiled("f(integer x)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    assert!(manager.try_get_function(global(&library, "f"), &[CompilingType::STRING], None).is_none());
    assert!(manager.try_get_function(global(&library, "f"), &[], None).is_none());
}

#[test]
fn resolution_is_deterministic() {
    let library = compiled("class A\nclass B : A\nf(A x, B y)\nf(B x, A y)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let b = class(&library, &manager, "B");
    let first = manager.try_get_function(global(&library, "f"), &[b, b], None).expect("resolved");
    for _ in 0..10 {
        let again = manager.try_get_function(global(&library, "f"), &[b, b], None).expect("resolved");
        assert_eq!(again, first);
    }
    // Both cost one hop; the first declared wins.
    assert_eq!(chosen(first.declaration.kind), 0);
}

#[test]
fn expected_returns_demand_an_exact_signature() {
    let library = compiled("integer f(integer x)\nreal f(real x)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let f = global(&library, "f");
    let found = manager
        .try_get_function(f, &[CompilingType::REAL], Some(&[CompilingType::REAL]))
        .expect("exact match");
    assert_eq!(chosen(found.declaration.kind), 1);
    assert!(manager.try_get_function(f, &[CompilingType::INTEGER], Some(&[CompilingType::REAL])).is_none());
}

// ─── Inheritance distance ────────────────────────────────────────────────────

#[test]
fn inherit_distance_counts_hops() {
    let library = compiled("class A\nclass B : A\nclass C : B\nclass D : C\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let [a, b, c, d] = ["A", "B", "C", "D"].map(|n| class(&library, &manager, n));

    assert_eq!(manager.try_get_inherit(a, a), Some(0));
    assert_eq!(manager.try_get_inherit(a, b), Some(1));
    assert_eq!(manager.try_get_inherit(a, c), Some(2));
    assert_eq!(manager.try_get_inherit(a, d), Some(3));
    assert_eq!(manager.try_get_inherit(d, a), None);
    assert!(manager.try_get_inherit(CompilingType::HANDLE, d).is_some());
}

#[test]
fn structural_cost_stays_below_numeric_widening() {
    let src = (0..30)
        .map(|i| if i == 0 { "class T0\n".to_string() } else { format!("class T{i} : T{}\n", i - 1) })
        .collect::<String>();
    let library = compiled(&src);
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let root = class(&library, &manager, "T0");
    let leaf = class(&library, &manager, "T29");
    let cost = manager.try_get_measure(root, leaf).expect("subtype");
    assert_eq!(cost, 29);
    assert!(cost < measure::INTEGER_TO_REAL);
}

#[test]
fn constructors_resolve_like_functions() {
    let library = compiled("class Box\n    public Box(integer size)\n    public Box(real size)\n");
    let pool = CollectionPool::new();
    let manager = DeclarationManager::new(&pool, &library.table, &[]);
    let boxed = class(&library, &manager, "Box");
    let found = manager.try_get_constructor(boxed.definition, &[CompilingType::REAL]).expect("constructor");
    assert_eq!(found.declaration.kind, DeclarationKind::Constructor { definition: 0, overload: 1 });
}

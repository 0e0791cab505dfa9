//! Pipeline tests through the public `Builder` API.
//!
//! Each test compiles source text and checks the final state plus the error
//! codes the run reported.

use brook_lang::{Builder, CompileOptions, CompileState, Diagnostic, ErrorCode, ReferenceLibrary, SourceFile};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn files(sources: &[&str]) -> Vec<SourceFile> {
    sources
        .iter()
        .enumerate()
        .map(|(i, src)| SourceFile::new(format!("file{i}.brook"), *src))
        .collect()
}

fn build(name: &str, sources: &[&str], relies: Vec<ReferenceLibrary>) -> Builder {
    let mut builder = Builder::new(name, files(sources), relies);
    builder.compile();
    builder
}

fn ok(name: &str, sources: &[&str], relies: Vec<ReferenceLibrary>) -> ReferenceLibrary {
    let builder = build(name, sources, relies);
    assert_eq!(
        builder.state(),
        CompileState::Completed,
        "expected compile to succeed, got: {:#?}",
        builder.diagnostics()
    );
    builder.reference().cloned().expect("completed compile has a reference")
}

fn err(name: &str, sources: &[&str], relies: Vec<ReferenceLibrary>) -> Vec<Diagnostic> {
    let builder = build(name, sources, relies);
    assert_eq!(builder.state(), CompileState::Failed, "expected compile to fail but it succeeded");
    assert!(builder.library().is_none());
    builder.diagnostics().to_vec()
}

fn has(errs: &[Diagnostic], code: ErrorCode) -> bool {
    errs.iter().any(|e| e.code == code)
}

fn has_msg(errs: &[Diagnostic], s: &str) -> bool {
    errs.iter().any(|e| e.message.contains(s))
}

const SHAPES: &str = "public interface Shape\n    real Area()\n";

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn consumer_implements_interface_from_rely() {
    let base = ok("Base", &[SHAPES], vec![]);
    let consumer = ok(
        "Consumer",
        &["import Base\npublic class Square : Shape\n    public real side\n    public real Area()\n        return side * side\n"],
        vec![base],
    );
    assert_eq!(consumer.dependencies, vec!["Base".to_string()]);
    assert_eq!(consumer.definitions[0].name, "Square");
}

#[test]
fn consumer_missing_implementation_fails() {
    let base = ok("Base", &[SHAPES], vec![]);
    let errs = err("Consumer", &["import Base\nclass Square : Shape\n    public real side\n"], vec![base]);
    assert!(has(&errs, ErrorCode::V004));
    assert!(has_msg(&errs, "Base.Shape.Area()"));
}

#[test]
fn private_member_does_not_implement_interface() {
    let base = ok("Base", &[SHAPES], vec![]);
    let errs = err("Consumer", &["import Base\npublic class Sq : Shape\n    real Area()\n"], vec![base]);
    assert!(has(&errs, ErrorCode::V006));
    assert!(has_msg(&errs, "is private"));
}

#[test]
fn qualified_rely_names_need_no_import() {
    let base = ok("Base", &[SHAPES], vec![]);
    ok("Consumer", &["class Square : Base.Shape\n    public real Area()\n"], vec![base]);
}

#[test]
fn mutual_rely_fails_before_parsing() {
    let mut l2 = ReferenceLibrary::new("L2");
    l2.dependencies = vec!["L1".to_string()];
    // The source is not even valid; the rely stage stops the run first.
    let errs = err("L1", &["class\n"], vec![l2]);
    assert_eq!(errs.len(), 1);
    assert!(has(&errs, ErrorCode::R002));
    assert!(has_msg(&errs, "L1 -> L2 -> L1"));
}

// ─── Stage gating ────────────────────────────────────────────────────────────

#[test]
fn parse_errors_stop_before_merge() {
    let errs = err("Lib", &["integer x\ninteger x\nclass\n"], vec![]);
    assert!(has(&errs, ErrorCode::P002) || has(&errs, ErrorCode::P001));
    assert!(!has(&errs, ErrorCode::D001));
}

#[test]
fn parse_errors_are_collected_from_every_file() {
    let errs = err("Lib", &["class\n", "integer\n"], vec![]);
    let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"file0.brook"));
    assert!(paths.contains(&"file1.brook"));
}

#[test]
fn merge_errors_stop_before_link() {
    let errs = err("Lib", &["integer x\nreal x\nMissing y\n"], vec![]);
    assert!(has(&errs, ErrorCode::D001));
    assert!(!has(&errs, ErrorCode::K001));
}

#[test]
fn every_unresolved_name_is_reported() {
    let errs = err("Lib", &["Ghost a\nPhantom b\nclass C : Spirit\n"], vec![]);
    assert_eq!(errs.iter().filter(|e| e.code == ErrorCode::K001).count(), 3);
}

#[test]
fn duplicate_across_files_reports_once() {
    let errs = err("Lib", &["class Point\n", "class Point\n"], vec![]);
    assert_eq!(errs.len(), 1);
    assert!(has(&errs, ErrorCode::D001));
    assert_eq!(errs[0].path, "file1.brook");
}

#[test]
fn override_with_other_return_is_g001() {
    let errs = err(
        "Lib",
        &["class Animal\n    public string Speak()\nclass Dog : Animal\n    public integer Speak()\n"],
        vec![],
    );
    assert!(has(&errs, ErrorCode::G001));
}

#[test]
fn exported_signature_with_private_type_is_g002() {
    let errs = err("Lib", &["class Token\npublic Token Issue()\n"], vec![]);
    assert!(has(&errs, ErrorCode::G002));
    assert!(has_msg(&errs, "`Token`"));
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

#[test]
fn spaces_and_multiple_files_merge() {
    let reference = ok(
        "Geo",
        &[
            "space Shapes\n    public class Circle\n        public real radius\n",
            "import Shapes\nspace Shapes\n    public class Ring : Circle\n        public real inner\n",
        ],
        vec![],
    );
    let names: Vec<&str> = reference.definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Circle", "Ring"]);
    assert_eq!(reference.spaces.len(), 2);
}

#[test]
fn library_carries_relocations_and_addresses() {
    let src = "\
public interface Shape
    real Area()
public class Square : Shape
    public real side
    public real Area()
public class Cube : Square
    public real depth
    public real Area()
const integer Sides = 4
real scale
";
    let mut builder = Builder::new("Geo", files(&[src]), vec![]);
    assert_eq!(builder.compile(), CompileState::Completed, "{:#?}", builder.diagnostics());
    let library = builder.library().expect("library");
    // Square binds Shape.Area; Cube overrides Square.Area.
    assert_eq!(library.relocations.len(), 2);
    assert_eq!(library.layout.constant_size, 8);
    assert_eq!(library.layout.data_size, 8);
    assert_eq!(library.definitions[1].fields[0].offset, 0);
}

#[test]
fn options_reach_the_artifact() {
    let options = CompileOptions::default().with_debug_table(true).with_ignore_implicit_exit(true);
    let mut builder =
        Builder::new("Lib", files(&["public Main()\n    Print(\"hi\")\n"]), vec![]).with_options(options);
    assert_eq!(builder.compile(), CompileState::Completed);
    let library = builder.library().expect("library");
    assert!(!library.implicit_exit);
    assert_eq!(library.debug.as_ref().map(Vec::len), Some(1));
    assert!(library.symbols.is_some());
}

#[test]
fn convenience_compile_matches_builder() {
    let output = brook_lang::compile("Lib", files(&["public integer answer = 42\n"]), vec![]);
    assert_eq!(output.state, CompileState::Completed);
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.reference.map(|r| r.variables.len()), Some(1));
}

#[test]
fn diagnostics_render_with_position() {
    let errs = err("Lib", &["integer a\nGhost b\n"], vec![]);
    assert!(errs[0].to_string().starts_with("file0.brook:2:"));
    assert!(errs[0].to_string().contains("[K001]"));
}

//! Stage 3: merge the per-file namespace trees into one table.
//!
//! Every declaration gets its definitive identity here. Types are left
//! `INVALID`; link fills them from the recorded source. A name that is
//! already taken in its scope is reported and the newcomer skipped, so the
//! table stays consistent for later stages.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiling::{CompilingFile, CompilingLibrary, SourceFile};
use crate::declaration::{Declaration, DeclarationKind, LibraryId, Visibility};
use crate::error::{Diagnostics, ErrorCode};
use crate::syntax::ast::*;
use crate::table::{
    Anchor, Coroutine, Definition, Delegate, Function, FunctionSource, Interface, LibraryTable, MemberVariable,
    Method, Parameter, ROOT_SPACE, TypeSource, Variable, VariableSource,
};
use crate::types::{CompilingType, TypeCode};

pub fn merge(
    name: &str,
    files: &[SourceFile],
    parsed: Vec<FileSyntax>,
    diagnostics: &mut Diagnostics,
) -> CompilingLibrary {
    let mut library = CompilingLibrary::new(name);

    for (index, (file, syntax)) in files.iter().zip(parsed).enumerate() {
        let FileSyntax { imports, root } = syntax;
        library.files.push(CompilingFile {
            path: file.path.clone(),
            imports,
            spaces: Vec::new(),
            lines: file.text.lines().count(),
        });
        let mut merger = Merger {
            table: &mut library.table,
            diagnostics: &mut *diagnostics,
            file: index as u32,
            path: &file.path,
        };
        merger.space_items(ROOT_SPACE, root.items);
    }

    let t = &library.table;
    tracing::debug!(
        spaces = t.spaces.len(),
        definitions = t.definitions.len(),
        interfaces = t.interfaces.len(),
        methods = t.methods.len(),
        variables = t.variables.len(),
        "merged"
    );
    library
}

struct Merger<'m> {
    table: &'m mut LibraryTable,
    diagnostics: &'m mut Diagnostics,
    file: u32,
    path: &'m str,
}

impl Merger<'_> {
    fn anchor(&self, span: &Span) -> Anchor {
        Anchor { file: self.file, span: span.clone() }
    }

    fn report(&mut self, code: ErrorCode, span: &Span, message: String) {
        self.diagnostics.report(code, self.path, span, message);
    }

    fn scope_name(&self, space: u32) -> String {
        let path = self.table.space_path(space);
        if path.is_empty() {
            format!("library `{}`", self.table.name)
        } else {
            format!("space `{}`", path.join("."))
        }
    }

    /// Whether `name` is still free in `space`; reports D001 if not.
    fn claim(&mut self, space: u32, name: &str, span: &Span) -> bool {
        let taken = match self.table.lookup(space, name) {
            Some(existing) => Some(existing.kind.describe()),
            None => self.table.child_space(space, name).map(|_| "space"),
        };
        match taken {
            Some(kind) => {
                let scope = self.scope_name(space);
                self.report(ErrorCode::D001, span, format!("`{name}` is already declared as a {kind} in {scope}"));
                false
            }
            None => true,
        }
    }

    fn declare(&mut self, space: u32, name: &str, visibility: Visibility, kind: DeclarationKind) {
        self.table.spaces[space as usize]
            .declarations
            .insert(name.to_string(), Declaration::new(LibraryId::Local, visibility, kind));
    }

    fn namespace_visibility(&mut self, visibility: Option<Visibility>, span: &Span) -> Visibility {
        match visibility {
            None => Visibility::Space,
            Some(Visibility::Protected) => {
                self.report(ErrorCode::D004, span, "`protected` is not allowed at namespace level".into());
                Visibility::Space
            }
            Some(v) => v,
        }
    }

    // ─── Signatures ──────────────────────────────────────────────────────────

    fn params(&mut self, params: &[ParamDecl]) -> Vec<Parameter> {
        let mut seen = FxHashSet::default();
        for p in params {
            if let Some(name) = &p.name {
                if !seen.insert(name.as_str()) {
                    self.report(ErrorCode::D005, &p.span, format!("parameter `{name}` is declared twice"));
                }
            }
        }
        params
            .iter()
            .enumerate()
            .map(|(i, p)| Parameter {
                name: p.name.clone().unwrap_or_else(|| format!("arg{i}")),
                ty: CompilingType::INVALID,
            })
            .collect()
    }

    fn source(&self, span: &Span, params: Vec<ParamDecl>, returns: Vec<TypeExpr>, body: Option<Body>) -> FunctionSource {
        FunctionSource {
            anchor: self.anchor(span),
            params: params.into_iter().map(|p| p.ty).collect(),
            returns,
            body,
        }
    }

    fn function(&mut self, decl: FunctionDecl, visibility: Visibility) -> Function {
        let params = self.params(&decl.params);
        let returns = vec![CompilingType::INVALID; decl.returns.len()];
        let source = self.source(&decl.span, decl.params, decl.returns, decl.body);
        Function { visibility, params, returns, source: Some(source) }
    }

    // ─── Namespace level ─────────────────────────────────────────────────────

    fn space_items(&mut self, space: u32, items: Vec<Item>) {
        for item in items {
            match item {
                Item::Space(s)     => self.space(space, s),
                Item::Class(c)     => self.class(space, c),
                Item::Interface(i) => self.interface(space, i),
                Item::Delegate(d)  => self.delegate(space, d),
                Item::Coroutine(c) => self.coroutine(space, c),
                Item::Variable(v)  => self.variable(space, v),
                Item::Function(f)  => self.global(space, f, false),
                Item::Native(f)    => self.global(space, f, true),
            }
        }
    }

    fn space(&mut self, parent: u32, decl: SpaceDecl) {
        // Spaces reopen freely; only a declaration of the same name blocks one.
        if let Some(existing) = self.table.lookup(parent, &decl.name) {
            let scope = self.scope_name(parent);
            self.report(
                ErrorCode::D001,
                &decl.span,
                format!("`{}` is already declared as a {} in {scope}", decl.name, existing.kind.describe()),
            );
            return;
        }
        let child = self.table.ensure_space(parent, &decl.name);
        self.space_items(child, decl.items);
    }

    fn global(&mut self, space: u32, decl: FunctionDecl, native: bool) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        let group = match self.table.lookup(space, &decl.name).map(|d| d.kind) {
            Some(DeclarationKind::GlobalMethod { method }) if !native => Some(method),
            Some(DeclarationKind::NativeMethod { method }) if native => Some(method),
            _ => None,
        };
        if group.is_none() && !self.claim(space, &decl.name, &decl.span) {
            return;
        }

        let name = decl.name.clone();
        let function = self.function(decl, visibility);
        let list = if native { &mut self.table.natives } else { &mut self.table.methods };
        match group {
            Some(method) => {
                list[method as usize].functions.push(function);
                if let Some(d) = self.table.spaces[space as usize].declarations.get_mut(&name) {
                    d.visibility = d.visibility.widest(visibility);
                }
            }
            None => {
                let method = list.len() as u32;
                list.push(Method { name: name.clone(), space, functions: vec![function] });
                let kind = if native {
                    DeclarationKind::NativeMethod { method }
                } else {
                    DeclarationKind::GlobalMethod { method }
                };
                self.declare(space, &name, visibility, kind);
            }
        }
    }

    fn variable(&mut self, space: u32, decl: VariableDecl) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        if !self.claim(space, &decl.name, &decl.span) {
            return;
        }
        let index = self.table.variables.len() as u32;
        let anchor = self.anchor(&decl.span);
        self.table.variables.push(Variable {
            name: decl.name.clone(),
            space,
            visibility,
            constant: decl.constant,
            ty: CompilingType::INVALID,
            initializer: decl.initializer,
            address: 0,
            source: Some(VariableSource { anchor, ty: decl.ty }),
        });
        self.declare(space, &decl.name, visibility, DeclarationKind::GlobalVariable { index });
    }

    fn delegate(&mut self, space: u32, decl: DelegateDecl) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        if !self.claim(space, &decl.name, &decl.span) {
            return;
        }
        let index = self.table.delegates.len() as u32;
        let params = self.params(&decl.params);
        let returns = vec![CompilingType::INVALID; decl.returns.len()];
        let source = self.source(&decl.span, decl.params, decl.returns, None);
        self.table.delegates.push(Delegate {
            name: decl.name.clone(),
            space,
            visibility,
            params,
            returns,
            source: Some(source),
        });
        self.declare(space, &decl.name, visibility, DeclarationKind::Delegate { index });
    }

    fn coroutine(&mut self, space: u32, decl: CoroutineDecl) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        if !self.claim(space, &decl.name, &decl.span) {
            return;
        }
        let index = self.table.coroutines.len() as u32;
        let returns = vec![CompilingType::INVALID; decl.returns.len()];
        let source = self.source(&decl.span, Vec::new(), decl.returns, None);
        self.table.coroutines.push(Coroutine {
            name: decl.name.clone(),
            space,
            visibility,
            returns,
            source: Some(source),
        });
        self.declare(space, &decl.name, visibility, DeclarationKind::Coroutine { index });
    }

    // ─── Types with members ──────────────────────────────────────────────────

    fn class(&mut self, space: u32, decl: ClassDecl) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        if !self.claim(space, &decl.name, &decl.span) {
            return;
        }
        let index = self.table.definitions.len() as u32;
        let mut members: FxHashMap<String, Declaration> = FxHashMap::default();
        let mut variables = Vec::new();
        let mut methods: Vec<Method> = Vec::new();

        for v in decl.variables {
            if members.contains_key(&v.name) {
                self.report(ErrorCode::D003, &v.span, format!("`{}` is already a member of `{}`", v.name, decl.name));
                continue;
            }
            let member_visibility = v.visibility.unwrap_or(Visibility::Private);
            let kind = DeclarationKind::MemberVariable { definition: index, index: variables.len() as u32 };
            members.insert(v.name.clone(), Declaration::new(LibraryId::Local, member_visibility, kind));
            variables.push(MemberVariable {
                name: v.name,
                visibility: member_visibility,
                ty: CompilingType::INVALID,
                offset: 0,
                source: Some(VariableSource { anchor: self.anchor(&v.span), ty: v.ty }),
            });
        }

        for f in decl.functions {
            if f.name == decl.name {
                self.report(
                    ErrorCode::D006,
                    &f.span,
                    format!("member function `{}` has the name of its class; constructors have no return types", f.name),
                );
                continue;
            }
            let member_visibility = f.visibility.unwrap_or(Visibility::Private);
            match members.get(&f.name).map(|d| d.kind) {
                Some(DeclarationKind::MemberMethod { method, .. }) => {
                    if let Some(group) = members.get_mut(&f.name) {
                        group.visibility = group.visibility.widest(member_visibility);
                    }
                    let function = self.function(f, member_visibility);
                    methods[method as usize].functions.push(function);
                }
                Some(_) => {
                    self.report(ErrorCode::D003, &f.span, format!("`{}` is already a member of `{}`", f.name, decl.name));
                }
                None => {
                    let method = methods.len() as u32;
                    let kind = DeclarationKind::MemberMethod { definition: index, method };
                    members.insert(f.name.clone(), Declaration::new(LibraryId::Local, member_visibility, kind));
                    let name = f.name.clone();
                    let function = self.function(f, member_visibility);
                    methods.push(Method { name, space, functions: vec![function] });
                }
            }
        }

        let constructors = decl
            .constructors
            .into_iter()
            .map(|c| {
                let member_visibility = c.visibility.unwrap_or(Visibility::Private);
                self.function(c, member_visibility)
            })
            .collect();

        let anchor = self.anchor(&decl.span);
        self.table.definitions.push(Definition {
            name: decl.name.clone(),
            space,
            visibility,
            code: TypeCode::Handle,
            // Link replaces this with the declared parent, if any.
            parent: CompilingType::HANDLE,
            interfaces: Vec::new(),
            variables,
            methods,
            constructors,
            members,
            size: 0,
            source: Some(TypeSource { anchor, inherits: decl.inherits }),
        });
        self.declare(space, &decl.name, visibility, DeclarationKind::Definition { index });
    }

    fn interface(&mut self, space: u32, decl: InterfaceDecl) {
        let visibility = self.namespace_visibility(decl.visibility, &decl.span);
        if !self.claim(space, &decl.name, &decl.span) {
            return;
        }
        let index = self.table.interfaces.len() as u32;
        let mut members: FxHashMap<String, Declaration> = FxHashMap::default();
        let mut methods: Vec<Method> = Vec::new();

        for f in decl.functions {
            if let Some(v) = f.visibility.filter(|v| *v != Visibility::Public) {
                self.report(
                    ErrorCode::D004,
                    &f.span,
                    format!("interface functions are always public; `{v}` is not allowed on `{}`", f.name),
                );
            }
            match members.get(&f.name).map(|d| d.kind) {
                Some(DeclarationKind::InterfaceMethod { method, .. }) => {
                    let function = self.function(f, Visibility::Public);
                    methods[method as usize].functions.push(function);
                }
                _ => {
                    let method = methods.len() as u32;
                    let kind = DeclarationKind::InterfaceMethod { interface: index, method };
                    members.insert(f.name.clone(), Declaration::new(LibraryId::Local, Visibility::Public, kind));
                    let name = f.name.clone();
                    let function = self.function(f, Visibility::Public);
                    methods.push(Method { name, space, functions: vec![function] });
                }
            }
        }

        let anchor = self.anchor(&decl.span);
        self.table.interfaces.push(Interface {
            name: decl.name.clone(),
            space,
            visibility,
            inherits: Vec::new(),
            methods,
            members,
            source: Some(TypeSource { anchor, inherits: decl.inherits }),
        });
        self.declare(space, &decl.name, visibility, DeclarationKind::Interface { index });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    fn merge_sources(sources: &[&str]) -> (CompilingLibrary, Diagnostics) {
        let files: Vec<SourceFile> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| SourceFile::new(format!("f{i}.brook"), *s))
            .collect();
        let parsed = files
            .iter()
            .map(|f| parse_file(&f.path, &f.text).expect("parse failed"))
            .collect();
        let mut diagnostics = Diagnostics::new();
        let library = merge("Test", &files, parsed, &mut diagnostics);
        (library, diagnostics)
    }

    fn codes(d: &Diagnostics) -> Vec<ErrorCode> {
        d.iter().map(|x| x.code).collect()
    }

    #[test]
    fn one_diagnostic_per_duplicate_and_first_wins() {
        let (lib, d) = merge_sources(&["integer x\nreal x\nstring x\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D001, ErrorCode::D001]);
        assert_eq!(lib.table.variables.len(), 1);
        assert_eq!(lib.table.variables[0].source.as_ref().map(|s| s.ty.path[0].as_str()), Some("integer"));
    }

    #[test]
    fn functions_overload_across_files() {
        let (lib, d) = merge_sources(&["space Geo\n    f(integer a)\n", "space Geo\n    f(real a)\n"]);
        assert!(d.is_empty());
        assert_eq!(lib.table.spaces.len(), 2);
        assert_eq!(lib.table.methods.len(), 1);
        assert_eq!(lib.table.methods[0].functions.len(), 2);
        assert_eq!(lib.files.len(), 2);
    }

    #[test]
    fn function_and_variable_share_no_name() {
        let (_, d) = merge_sources(&["integer f\nf()\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D001]);
    }

    #[test]
    fn space_and_declaration_clash_both_ways() {
        let (_, d) = merge_sources(&["space A\n    integer x\ninteger A\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D001]);
        let (_, d) = merge_sources(&["integer A\nspace A\n    integer x\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D001]);
    }

    #[test]
    fn natives_live_in_their_own_table() {
        let (lib, d) = merge_sources(&["native real Now()\nnative real Now(integer a)\n"]);
        assert!(d.is_empty());
        assert!(lib.table.methods.is_empty());
        assert_eq!(lib.table.natives[0].functions.len(), 2);
        let decl = lib.table.lookup(ROOT_SPACE, "Now").expect("declared");
        assert_eq!(decl.kind, DeclarationKind::NativeMethod { method: 0 });
    }

    #[test]
    fn default_visibility_depends_on_scope() {
        let (lib, d) = merge_sources(&["class Box\n    integer size\n    integer Get()\n"]);
        assert!(d.is_empty());
        assert_eq!(lib.table.lookup(ROOT_SPACE, "Box").map(|x| x.visibility), Some(Visibility::Space));
        let def = &lib.table.definitions[0];
        assert_eq!(def.members["size"].visibility, Visibility::Private);
        assert_eq!(def.members["Get"].visibility, Visibility::Private);
    }

    #[test]
    fn group_takes_the_widest_overload_visibility() {
        let (lib, d) = merge_sources(&["class A\n    integer f()\n    public integer f(integer a)\n"]);
        assert!(d.is_empty());
        let def = &lib.table.definitions[0];
        assert_eq!(def.members["f"].visibility, Visibility::Public);
        assert_eq!(def.methods[0].functions[0].visibility, Visibility::Private);

        let (lib, d) = merge_sources(&["f(integer a)\npublic f(real a)\n"]);
        assert!(d.is_empty());
        assert_eq!(lib.table.lookup(ROOT_SPACE, "f").map(|x| x.visibility), Some(Visibility::Public));
    }

    #[test]
    fn duplicate_member_is_d003() {
        let (lib, d) = merge_sources(&["class Box\n    integer size\n    real size\n    size()\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D003, ErrorCode::D003]);
        assert_eq!(lib.table.definitions[0].variables.len(), 1);
    }

    #[test]
    fn member_function_named_after_class_is_d006() {
        let (lib, d) = merge_sources(&["class Box\n    Box(integer a)\n    integer Box()\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D006]);
        assert_eq!(lib.table.definitions[0].constructors.len(), 1);
        assert!(lib.table.definitions[0].methods.is_empty());
    }

    #[test]
    fn namespace_protected_and_private_interface_functions_are_d004() {
        let (_, d) = merge_sources(&["protected integer x\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D004]);
        let (lib, d) = merge_sources(&["interface Shape\n    private real Area()\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D004]);
        assert_eq!(lib.table.interfaces[0].members["Area"].visibility, Visibility::Public);
    }

    #[test]
    fn duplicate_parameter_names_are_d005() {
        let (_, d) = merge_sources(&["f(integer a, real a)\n"]);
        assert_eq!(codes(&d), vec![ErrorCode::D005]);
        let (_, d) = merge_sources(&["f(integer, real)\n"]);
        assert!(d.is_empty());
    }

    #[test]
    fn sources_are_recorded_for_link() {
        let (lib, _) = merge_sources(&["\n\nclass Square : Base, Shape\n    real Area()\n        return 1\n"]);
        let def = &lib.table.definitions[0];
        let source = def.source.as_ref().expect("source");
        assert_eq!(source.anchor.span.line, 3);
        assert_eq!(source.inherits.len(), 2);
        let area = &def.methods[0].functions[0];
        assert_eq!(area.returns, vec![CompilingType::INVALID]);
        assert!(area.source.as_ref().and_then(|s| s.body.as_ref()).is_some());
    }
}

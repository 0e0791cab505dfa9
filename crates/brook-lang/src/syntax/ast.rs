use crate::declaration::Visibility;

/// Source location attached to every node for error reporting.
/// `start..end` are character columns on `line` (1-based, end exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, start: usize, end: usize) -> Self {
        Self { line, start, end }
    }
}

// ─── Top level ───────────────────────────────────────────────────────────────

/// One parsed file: its imports and the namespace tree it declares.
/// The root space is unnamed; it merges into the library root.
#[derive(Debug, Clone)]
pub struct FileSyntax {
    pub imports: Vec<ImportDecl>,
    pub root: SpaceDecl,
}

/// `import Base.Geometry`
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: Vec<String>,
    pub span: Span,
}

/// `space Name` and its indented block.
#[derive(Debug, Clone, Default)]
pub struct SpaceDecl {
    pub name: String,
    pub span: Span,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Space(SpaceDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Delegate(DelegateDecl),
    Coroutine(CoroutineDecl),
    Variable(VariableDecl),
    Function(FunctionDecl),
    Native(FunctionDecl),
}

// ─── Types ───────────────────────────────────────────────────────────────────

/// An unresolved type reference: `integer`, `Geo.Shape`, `real[][]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub path: Vec<String>,
    pub dimension: u32,
    pub span: Span,
}

impl TypeExpr {
    pub fn is_simple_name(&self) -> bool {
        self.path.len() == 1 && self.dimension == 0
    }

    /// Textual equality, ignoring position.
    pub fn same_text(&self, other: &TypeExpr) -> bool {
        self.path == other.path && self.dimension == other.dimension
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        for _ in 0..self.dimension {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

// ─── Declarations ────────────────────────────────────────────────────────────

/// `class Square : Base, Shape` with members in its block.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub visibility: Option<Visibility>,
    pub name: String,
    pub span: Span,
    pub inherits: Vec<TypeExpr>,
    pub variables: Vec<VariableDecl>,
    pub functions: Vec<FunctionDecl>,
    pub constructors: Vec<FunctionDecl>,
}

/// `interface Shape : Named` with signature-only functions.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub visibility: Option<Visibility>,
    pub name: String,
    pub span: Span,
    pub inherits: Vec<TypeExpr>,
    pub functions: Vec<FunctionDecl>,
}

/// `delegate real Op(real, real)`
#[derive(Debug, Clone)]
pub struct DelegateDecl {
    pub visibility: Option<Visibility>,
    pub name: String,
    pub span: Span,
    pub params: Vec<ParamDecl>,
    pub returns: Vec<TypeExpr>,
}

/// `coroutine integer, real Ticker`
#[derive(Debug, Clone)]
pub struct CoroutineDecl {
    pub visibility: Option<Visibility>,
    pub name: String,
    pub span: Span,
    pub returns: Vec<TypeExpr>,
}

/// `const real PI = 3.14` or a member variable `integer count`.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub visibility: Option<Visibility>,
    pub constant: bool,
    pub name: String,
    pub span: Span,
    pub ty: TypeExpr,
    /// Raw initializer text after `=`.
    pub initializer: Option<String>,
}

/// Any function-shaped declaration: global, member, interface, native, constructor.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub visibility: Option<Visibility>,
    pub name: String,
    pub span: Span,
    pub params: Vec<ParamDecl>,
    pub returns: Vec<TypeExpr>,
    pub body: Option<Body>,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Raw body text, handed to the code generator untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub first_line: usize,
    pub last_line: usize,
    pub text: String,
}

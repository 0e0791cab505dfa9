use crate::declaration::Visibility;
use crate::error::ErrorCode;
use crate::syntax::SyntaxError;
use crate::syntax::ast::*;
use crate::syntax::lexer::{Lexer, SourceLine, split_lines};
use crate::syntax::token::{Token, TokenKind};

/// Declaration skeleton parser.
///
/// Works line by line: each declaration occupies one line, and a deeper
/// indented block below it holds its members (spaces, classes, interfaces)
/// or its raw body (functions). Bodies are never tokenized.
pub struct Parser<'a> {
    lines: Vec<SourceLine<'a>>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { lines: split_lines(source), pos: 0, errors: Vec::new() }
    }

    pub fn parse(mut self) -> Result<FileSyntax, Vec<SyntaxError>> {
        let mut imports = Vec::new();
        let mut root = SpaceDecl::default();
        self.parse_space_items(0, &mut root.items, Some(&mut imports));

        if self.errors.is_empty() {
            Ok(FileSyntax { imports, root })
        } else {
            Err(self.errors)
        }
    }

    // ─── Spaces ──────────────────────────────────────────────────────────────

    fn parse_space_items(
        &mut self,
        indent: usize,
        items: &mut Vec<Item>,
        mut imports: Option<&mut Vec<ImportDecl>>,
    ) {
        while let Some(line) = self.peek_line() {
            if line.indent < indent {
                break;
            }
            self.pos += 1;
            if line.indent > indent {
                self.unexpected_indent(&line);
                continue;
            }

            let Some(mut cur) = self.lex(&line) else { continue };

            if cur.check(&TokenKind::Import) {
                match imports.as_deref_mut() {
                    Some(list) if items.is_empty() => match parse_import(&mut cur) {
                        Ok(i) => list.push(i),
                        Err(e) => self.errors.push(e),
                    },
                    _ => self.errors.push(SyntaxError::new(
                        ErrorCode::P004,
                        cur.span(),
                        "imports must appear at the top of the file, before any declaration",
                    )),
                }
                self.skip_children(line.indent);
                continue;
            }

            match self.parse_space_item(&line, cur) {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.skip_children(line.indent);
                }
            }
        }
    }

    fn parse_space_item(&mut self, line: &SourceLine<'a>, mut cur: Cursor) -> Result<Item, SyntaxError> {
        // `space Name` alone opens a namespace; otherwise `space` is a visibility.
        if cur.is_space_header() {
            cur.advance();
            let (name, span) = cur.expect_ident()?;
            let mut space = SpaceDecl { name, span, items: Vec::new() };
            if let Some(child) = self.child_indent(line.indent) {
                self.parse_space_items(child, &mut space.items, None);
            }
            return Ok(Item::Space(space));
        }

        let visibility = self.parse_visibility(&mut cur);

        match cur.peek_kind() {
            TokenKind::Class => self.parse_class(line, visibility, cur).map(Item::Class),
            TokenKind::Interface => self.parse_interface(line, visibility, cur).map(Item::Interface),
            TokenKind::Delegate => {
                cur.advance();
                let head = parse_head(&mut cur)?;
                self.no_children(line);
                match head {
                    Head::Function { returns, name, span, params } => {
                        Ok(Item::Delegate(DelegateDecl { visibility, name, span, params, returns }))
                    }
                    Head::Variable { span, .. } => Err(SyntaxError::new(
                        ErrorCode::P002, span, "expected `(` after delegate name",
                    )),
                }
            }
            TokenKind::Coroutine => {
                cur.advance();
                let mut returns = Vec::new();
                while !matches!(cur.peek_kind(), TokenKind::Ident(_)) || cur.peek_is_type_continuation() {
                    returns.push(parse_type(&mut cur)?);
                    if !cur.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                let (name, span) = cur.expect_ident()?;
                cur.expect(&TokenKind::Eol)?;
                self.no_children(line);
                Ok(Item::Coroutine(CoroutineDecl { visibility, name, span, returns }))
            }
            TokenKind::Native => {
                cur.advance();
                let head = parse_head(&mut cur)?;
                self.no_children(line);
                match head {
                    Head::Function { returns, name, span, params } => Ok(Item::Native(FunctionDecl {
                        visibility, name, span, params, returns, body: None,
                    })),
                    Head::Variable { span, .. } => Err(SyntaxError::new(
                        ErrorCode::P002, span, "expected `(` after native name",
                    )),
                }
            }
            TokenKind::Const => {
                cur.advance();
                match parse_head(&mut cur)? {
                    Head::Variable { ty, name, span, initializer } => {
                        self.no_children(line);
                        Ok(Item::Variable(VariableDecl { visibility, constant: true, name, span, ty, initializer }))
                    }
                    Head::Function { span, .. } => Err(SyntaxError::new(
                        ErrorCode::P001, span, "`const` applies to variables only",
                    )),
                }
            }
            _ => match parse_head(&mut cur)? {
                Head::Function { returns, name, span, params } => {
                    let body = self.take_body(line.indent);
                    Ok(Item::Function(FunctionDecl { visibility, name, span, params, returns, body }))
                }
                Head::Variable { ty, name, span, initializer } => {
                    self.no_children(line);
                    Ok(Item::Variable(VariableDecl { visibility, constant: false, name, span, ty, initializer }))
                }
            },
        }
    }

    // ─── Classes ─────────────────────────────────────────────────────────────

    fn parse_class(
        &mut self,
        line: &SourceLine<'a>,
        visibility: Option<Visibility>,
        mut cur: Cursor,
    ) -> Result<ClassDecl, SyntaxError> {
        cur.expect(&TokenKind::Class)?;
        let (name, span) = cur.expect_ident()?;
        let inherits = parse_inherits(&mut cur)?;
        cur.expect(&TokenKind::Eol)?;

        let mut class = ClassDecl {
            visibility,
            name,
            span,
            inherits,
            variables: Vec::new(),
            functions: Vec::new(),
            constructors: Vec::new(),
        };

        let Some(indent) = self.child_indent(line.indent) else { return Ok(class) };
        while let Some(member) = self.peek_line() {
            if member.indent < indent {
                break;
            }
            self.pos += 1;
            if member.indent > indent {
                self.unexpected_indent(&member);
                continue;
            }
            let Some(mut mcur) = self.lex(&member) else { continue };
            let member_visibility = self.parse_visibility(&mut mcur);

            if !is_head_start(mcur.peek_kind()) {
                self.errors.push(SyntaxError::new(
                    ErrorCode::P001,
                    mcur.span(),
                    format!("unexpected {} in class `{}`", mcur.peek_kind().describe(), class.name),
                ));
                self.skip_children(member.indent);
                continue;
            }

            match parse_head(&mut mcur) {
                Ok(Head::Function { returns, name, span, params }) => {
                    let body = self.take_body(member.indent);
                    let f = FunctionDecl { visibility: member_visibility, name, span, params, returns, body };
                    if f.name == class.name && f.returns.is_empty() {
                        class.constructors.push(f);
                    } else {
                        class.functions.push(f);
                    }
                }
                Ok(Head::Variable { ty, name, span, initializer }) => {
                    self.no_children(&member);
                    class.variables.push(VariableDecl {
                        visibility: member_visibility,
                        constant: false,
                        name,
                        span,
                        ty,
                        initializer,
                    });
                }
                Err(e) => {
                    self.errors.push(e);
                    self.skip_children(member.indent);
                }
            }
        }
        Ok(class)
    }

    // ─── Interfaces ──────────────────────────────────────────────────────────

    fn parse_interface(
        &mut self,
        line: &SourceLine<'a>,
        visibility: Option<Visibility>,
        mut cur: Cursor,
    ) -> Result<InterfaceDecl, SyntaxError> {
        cur.expect(&TokenKind::Interface)?;
        let (name, span) = cur.expect_ident()?;
        let inherits = parse_inherits(&mut cur)?;
        cur.expect(&TokenKind::Eol)?;

        let mut interface = InterfaceDecl { visibility, name, span, inherits, functions: Vec::new() };

        let Some(indent) = self.child_indent(line.indent) else { return Ok(interface) };
        while let Some(member) = self.peek_line() {
            if member.indent < indent {
                break;
            }
            self.pos += 1;
            if member.indent > indent {
                self.unexpected_indent(&member);
                continue;
            }
            let Some(mut mcur) = self.lex(&member) else { continue };
            let member_visibility = self.parse_visibility(&mut mcur);
            match parse_head(&mut mcur) {
                Ok(Head::Function { returns, name, span, params }) => {
                    self.no_children(&member);
                    interface.functions.push(FunctionDecl {
                        visibility: member_visibility, name, span, params, returns, body: None,
                    });
                }
                Ok(Head::Variable { span, .. }) => {
                    self.errors.push(SyntaxError::new(
                        ErrorCode::P001, span, "interfaces declare functions only",
                    ));
                    self.skip_children(member.indent);
                }
                Err(e) => {
                    self.errors.push(e);
                    self.skip_children(member.indent);
                }
            }
        }
        Ok(interface)
    }

    // ─── Visibility ──────────────────────────────────────────────────────────

    /// Zero or one visibility keyword; extra keywords are a clash (first wins).
    fn parse_visibility(&mut self, cur: &mut Cursor) -> Option<Visibility> {
        let mut visibility = None;
        while cur.peek_kind().is_visibility() {
            let tok = cur.advance();
            let v = match tok.kind {
                TokenKind::Public    => Visibility::Public,
                TokenKind::Internal  => Visibility::Internal,
                TokenKind::Space     => Visibility::Space,
                TokenKind::Protected => Visibility::Protected,
                _                    => Visibility::Private,
            };
            match visibility {
                None => visibility = Some(v),
                Some(first) => self.errors.push(SyntaxError::new(
                    ErrorCode::P003,
                    Span::new(tok.line, tok.column, tok.end),
                    format!("visibility clash: `{v}` after `{first}`"),
                )),
            }
        }
        visibility
    }

    // ─── Layout helpers ──────────────────────────────────────────────────────

    fn peek_line(&self) -> Option<SourceLine<'a>> {
        self.lines.get(self.pos).copied()
    }

    fn lex(&mut self, line: &SourceLine<'a>) -> Option<Cursor> {
        match Lexer::new(line).tokenize() {
            Ok(tokens) => Some(Cursor::new(tokens)),
            Err(e) => {
                self.errors.push(e);
                self.skip_children(line.indent);
                None
            }
        }
    }

    /// Indentation of the block opened under a line at `parent`, if any.
    fn child_indent(&self, parent: usize) -> Option<usize> {
        self.peek_line().filter(|l| l.indent > parent).map(|l| l.indent)
    }

    fn skip_children(&mut self, parent: usize) {
        while self.peek_line().is_some_and(|l| l.indent > parent) {
            self.pos += 1;
        }
    }

    fn take_body(&mut self, parent: usize) -> Option<Body> {
        let start = self.pos;
        self.skip_children(parent);
        let lines = &self.lines[start..self.pos];
        let (first, last) = (lines.first()?, lines.last()?);
        let text = lines.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");
        Some(Body { first_line: first.number, last_line: last.number, text })
    }

    /// Declarations without a block must not be followed by deeper lines.
    fn no_children(&mut self, line: &SourceLine<'a>) {
        if let Some(child) = self.peek_line().filter(|l| l.indent > line.indent) {
            self.unexpected_indent(&child);
            self.skip_children(line.indent);
        }
    }

    fn unexpected_indent(&mut self, line: &SourceLine<'a>) {
        let width = line.content().chars().count();
        self.errors.push(SyntaxError::new(
            ErrorCode::P005,
            Span::new(line.number, line.indent + 1, line.indent + 1 + width),
            "unexpected indentation",
        ));
        self.skip_children(line.indent);
    }
}

// ─── Line grammar ────────────────────────────────────────────────────────────

/// A function-or-variable declaration head.
enum Head {
    Function { returns: Vec<TypeExpr>, name: String, span: Span, params: Vec<ParamDecl> },
    Variable { ty: TypeExpr, name: String, span: Span, initializer: Option<String> },
}

fn is_head_start(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident(_) | TokenKind::Interface | TokenKind::Delegate | TokenKind::Coroutine
    )
}

fn parse_import(cur: &mut Cursor) -> Result<ImportDecl, SyntaxError> {
    let span = cur.span();
    cur.expect(&TokenKind::Import)?;
    let mut path = vec![cur.expect_ident()?.0];
    while cur.matches(&TokenKind::Dot) {
        path.push(cur.expect_ident()?.0);
    }
    cur.expect(&TokenKind::Eol)?;
    Ok(ImportDecl { path, span })
}

/// `R1, R2 Name(params)`, `Name(params)` or `Type name [= init]`.
fn parse_head(cur: &mut Cursor) -> Result<Head, SyntaxError> {
    let mut types = vec![parse_type(cur)?];
    while cur.matches(&TokenKind::Comma) {
        types.push(parse_type(cur)?);
    }

    let head = if cur.check(&TokenKind::LParen) {
        // No return types: what we parsed as a type is the name.
        let Some(name_expr) = types.pop() else {
            return Err(SyntaxError::new(ErrorCode::P002, cur.span(), "expected a name"));
        };
        if !name_expr.is_simple_name() {
            let message = format!("`{name_expr}` is not a valid function name");
            return Err(SyntaxError::new(ErrorCode::P001, name_expr.span, message));
        }
        let params = parse_params(cur)?;
        Head::Function { returns: types, name: name_expr.path[0].clone(), span: name_expr.span, params }
    } else {
        let (name, span) = cur.expect_ident()?;
        if cur.check(&TokenKind::LParen) {
            let params = parse_params(cur)?;
            Head::Function { returns: types, name, span, params }
        } else {
            if types.len() != 1 {
                return Err(SyntaxError::new(ErrorCode::P001, span, "a variable has exactly one type"));
            }
            let initializer = if cur.matches(&TokenKind::Eq) {
                match cur.advance().kind {
                    TokenKind::Raw(text) if !text.is_empty() => Some(text),
                    _ => return Err(SyntaxError::new(ErrorCode::P002, span, "expected an initializer after `=`")),
                }
            } else {
                None
            };
            Head::Variable { ty: types.remove(0), name, span, initializer }
        }
    };

    cur.expect(&TokenKind::Eol)?;
    Ok(head)
}

fn parse_params(cur: &mut Cursor) -> Result<Vec<ParamDecl>, SyntaxError> {
    cur.expect(&TokenKind::LParen)?;
    let mut params = Vec::new();
    while !cur.check(&TokenKind::RParen) && !cur.check(&TokenKind::Eol) {
        let ty = parse_type(cur)?;
        let (name, span) = match cur.peek_kind() {
            TokenKind::Ident(_) => {
                let (n, s) = cur.expect_ident()?;
                (Some(n), s)
            }
            _ => (None, ty.span.clone()),
        };
        params.push(ParamDecl { name, ty, span });
        if !cur.matches(&TokenKind::Comma) {
            break;
        }
    }
    cur.expect(&TokenKind::RParen)?;
    Ok(params)
}

fn parse_inherits(cur: &mut Cursor) -> Result<Vec<TypeExpr>, SyntaxError> {
    let mut inherits = Vec::new();
    if cur.matches(&TokenKind::Colon) {
        inherits.push(parse_type(cur)?);
        while cur.matches(&TokenKind::Comma) {
            inherits.push(parse_type(cur)?);
        }
    }
    Ok(inherits)
}

/// `Name(.Name)*([])*`. Kernel type names that double as keywords are accepted.
fn parse_type(cur: &mut Cursor) -> Result<TypeExpr, SyntaxError> {
    let first = cur.advance();
    let mut span = Span::new(first.line, first.column, first.end);
    let head = match first.kind {
        TokenKind::Ident(s)  => s,
        TokenKind::Interface => "interface".into(),
        TokenKind::Delegate  => "delegate".into(),
        TokenKind::Coroutine => "coroutine".into(),
        other => {
            return Err(SyntaxError::new(
                ErrorCode::P001,
                span,
                format!("expected a type, found {}", other.describe()),
            ));
        }
    };

    let mut path = vec![head];
    while cur.check(&TokenKind::Dot) {
        cur.advance();
        let (segment, s) = cur.expect_ident()?;
        span.end = s.end;
        path.push(segment);
    }
    let mut dimension = 0;
    while cur.check(&TokenKind::LBracket) {
        cur.advance();
        let close = cur.expect(&TokenKind::RBracket)?;
        span.end = close.end;
        dimension += 1;
    }
    Ok(TypeExpr { path, dimension, span })
}

// ─── Token cursor ────────────────────────────────────────────────────────────

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        // Tokenized lines always end with `Eol`, which is never consumed past.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                ErrorCode::P002,
                self.span(),
                format!("expected {}, found {}", kind.describe(), self.peek_kind().describe()),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), SyntaxError> {
        let span = self.span();
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            other => Err(SyntaxError::new(
                ErrorCode::P002,
                span,
                format!("expected a name, found {}", other.describe()),
            )),
        }
    }

    fn span(&self) -> Span {
        let t = self.current();
        Span::new(t.line, t.column, t.end)
    }

    /// `space Name` on a line of its own.
    fn is_space_header(&self) -> bool {
        self.tokens.len() == 3
            && self.tokens[0].kind == TokenKind::Space
            && matches!(self.tokens[1].kind, TokenKind::Ident(_))
    }

    /// In `coroutine A.B[] Name`, an identifier followed by `.`, `[` or `,`
    /// is still part of the return type list.
    fn peek_is_type_continuation(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.kind),
            Some(TokenKind::Dot | TokenKind::LBracket | TokenKind::Comma | TokenKind::Ident(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> FileSyntax {
        Parser::new(src).parse().expect("parse failed")
    }

    fn parse_err(src: &str) -> Vec<SyntaxError> {
        match Parser::new(src).parse() {
            Ok(_) => panic!("expected parse to fail"),
            Err(e) => e,
        }
    }

    fn has_code(errors: &[SyntaxError], code: ErrorCode) -> bool {
        errors.iter().any(|e| e.code == code)
    }

    // ── imports & spaces ──────────────────────────────────────────────────────

    #[test]
    fn imports_and_nested_spaces() {
        let f = parse("import Base.Geometry\nimport Util\nspace A\n    space B\n        integer x\n");
        assert_eq!(f.imports.len(), 2);
        assert_eq!(f.imports[0].path, vec!["Base", "Geometry"]);
        match &f.root.items[0] {
            Item::Space(a) => {
                assert_eq!(a.name, "A");
                match &a.items[0] {
                    Item::Space(b) => assert_eq!(b.items.len(), 1),
                    _ => panic!("expected space B"),
                }
            }
            _ => panic!("expected space A"),
        }
    }

    #[test]
    fn import_after_declaration_is_p004() {
        let errs = parse_err("integer x\nimport Base\n");
        assert!(has_code(&errs, ErrorCode::P004));
    }

    #[test]
    fn space_keyword_as_visibility() {
        let f = parse("space integer counter = 0\n");
        match &f.root.items[0] {
            Item::Variable(v) => {
                assert_eq!(v.visibility, Some(Visibility::Space));
                assert_eq!(v.initializer.as_deref(), Some("0"));
            }
            _ => panic!("expected variable"),
        }
    }

    // ── classes ───────────────────────────────────────────────────────────────

    #[test]
    fn class_with_members_constructor_and_bodies() {
        let src = "\
public class Square : Base, Shape
    private real side
    public Square(real side)
        this.side = side
    public real Area()
        return side * side
    integer, real Pair()
        return 1, 2.0
";
        let f = parse(src);
        let Item::Class(c) = &f.root.items[0] else { panic!("expected class") };
        assert_eq!(c.name, "Square");
        assert_eq!(c.inherits.len(), 2);
        assert_eq!(c.variables.len(), 1);
        assert_eq!(c.constructors.len(), 1);
        assert_eq!(c.functions.len(), 2);
        assert_eq!(c.functions[1].returns.len(), 2);
        let body = c.functions[0].body.as_ref().expect("body");
        assert_eq!(body.first_line, 6);
        assert!(body.text.contains("side * side"));
    }

    #[test]
    fn multiple_visibilities_clash() {
        let errs = parse_err("public private class A\n");
        assert!(has_code(&errs, ErrorCode::P003));
    }

    #[test]
    fn nested_class_is_rejected() {
        let errs = parse_err("class A\n    class B\n");
        assert!(has_code(&errs, ErrorCode::P001));
    }

    // ── interfaces, delegates, coroutines, natives ────────────────────────────

    #[test]
    fn interface_signatures() {
        let f = parse("public interface Shape : Named\n    real Area()\n    Scale(real)\n");
        let Item::Interface(i) = &f.root.items[0] else { panic!("expected interface") };
        assert_eq!(i.inherits[0].path, vec!["Named"]);
        assert_eq!(i.functions.len(), 2);
        assert!(i.functions[1].returns.is_empty());
        assert!(i.functions[1].params[0].name.is_none());
    }

    #[test]
    fn interface_body_is_unexpected_indent() {
        let errs = parse_err("interface Shape\n    real Area()\n        return 1\n");
        assert!(has_code(&errs, ErrorCode::P005));
    }

    #[test]
    fn delegate_coroutine_native() {
        let f = parse("delegate real Op(real a, real b)\ncoroutine integer, real Ticker\nnative real Sqrt2(real)\n");
        assert!(matches!(&f.root.items[0], Item::Delegate(d) if d.params.len() == 2));
        assert!(matches!(&f.root.items[1], Item::Coroutine(c) if c.returns.len() == 2 && c.name == "Ticker"));
        assert!(matches!(&f.root.items[2], Item::Native(n) if n.body.is_none()));
    }

    #[test]
    fn keyword_kernel_types_in_type_position() {
        let f = parse("Register(delegate callback, interface target)\n    pass\n");
        let Item::Function(func) = &f.root.items[0] else { panic!("expected function") };
        assert_eq!(func.params[0].ty.path, vec!["delegate"]);
        assert_eq!(func.params[1].ty.path, vec!["interface"]);
    }

    #[test]
    fn array_and_dotted_types() {
        let f = parse("Geo.Shape[][] shapes\n");
        let Item::Variable(v) = &f.root.items[0] else { panic!("expected variable") };
        assert_eq!(v.ty.path, vec!["Geo", "Shape"]);
        assert_eq!(v.ty.dimension, 2);
    }

    #[test]
    fn dotted_function_name_is_p001() {
        let errs = parse_err("Geo.Make(real r)\n");
        assert!(has_code(&errs, ErrorCode::P001));
        assert!(errs.iter().any(|e| e.message.contains("`Geo.Make` is not a valid function name")));
    }

    // ── recovery ──────────────────────────────────────────────────────────────

    #[test]
    fn recovery_continues_after_bad_line() {
        let errs = parse_err("class\ninteger x\nreal (\n");
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn stray_indent_at_top_level() {
        let errs = parse_err("integer x\n        real y\n");
        assert!(has_code(&errs, ErrorCode::P005));
    }
}

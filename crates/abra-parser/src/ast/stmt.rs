//! Statement and declaration AST nodes.

use crate::ast::expr::Expr;
use crate::ast::types::TypeExpr;
use crate::ast::Ident;
use abra_core::Span;

/// A statement. Declarations are statements so they may appear in blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    /// An expression evaluated for its value or effect.
    Expr(&'ast Expr<'ast>),
    /// `val x = 1`, `var y: Int? = None`
    Binding(&'ast BindingDecl<'ast>),
    /// `func f(a: Int): Int = a + 1`
    Func(&'ast FuncDecl<'ast>),
    /// `type Person { name: String }`
    Type(&'ast TypeDecl<'ast>),
    /// `enum Color { Red Green }`
    Enum(&'ast EnumDecl<'ast>),
    /// `import a, b from "./module"`
    Import(&'ast ImportDecl<'ast>),
    /// `export func ...`
    Export(&'ast ExportDecl<'ast>),
    /// `while cond { ... }`
    While(&'ast WhileStmt<'ast>),
    /// `for item, index in items { ... }`
    For(&'ast ForStmt<'ast>),
    /// `break`
    Break(Span),
    /// `continue`
    Continue(Span),
    /// `_ = expr`
    Discard(&'ast DiscardStmt<'ast>),
}

impl<'ast> Stmt<'ast> {
    /// Get the source location span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::Binding(d) => d.span,
            Stmt::Func(d) => d.span,
            Stmt::Type(d) => d.span,
            Stmt::Enum(d) => d.span,
            Stmt::Import(d) => d.span,
            Stmt::Export(d) => d.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) => *span,
            Stmt::Discard(s) => s.span,
        }
    }
}

/// `val`/`var` binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingDecl<'ast> {
    pub mutable: bool,
    pub name: Ident<'ast>,
    pub ty: Option<TypeExpr<'ast>>,
    pub init: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

/// A function, method or lambda parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'ast> {
    pub name: Ident<'ast>,
    pub ty: Option<TypeExpr<'ast>>,
    pub default: Option<&'ast Expr<'ast>>,
    /// The `self` receiver of an instance method.
    pub is_self: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuncDecl<'ast> {
    pub name: Ident<'ast>,
    pub type_params: &'ast [Ident<'ast>],
    pub params: &'ast [Param<'ast>],
    pub return_type: Option<TypeExpr<'ast>>,
    pub body: &'ast Expr<'ast>,
    /// No return annotation was written; the body's type is the return type.
    pub inferred_return: bool,
    pub span: Span,
}

impl FuncDecl<'_> {
    /// Whether the first parameter is `self`.
    pub fn has_self(&self) -> bool {
        self.params.first().is_some_and(|p| p.is_self)
    }
}

/// A field of a `type` declaration or a data variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDecl<'ast> {
    pub name: Ident<'ast>,
    pub ty: TypeExpr<'ast>,
    pub default: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDecl<'ast> {
    pub name: Ident<'ast>,
    pub type_params: &'ast [Ident<'ast>],
    pub fields: &'ast [FieldDecl<'ast>],
    pub methods: &'ast [FuncDecl<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnumDecl<'ast> {
    pub name: Ident<'ast>,
    pub variants: &'ast [VariantDecl<'ast>],
    pub methods: &'ast [FuncDecl<'ast>],
    pub span: Span,
}

/// `Red` (unit variant) or `RGB(red: Int, green: Int, blue: Int)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantDecl<'ast> {
    pub name: Ident<'ast>,
    pub fields: Option<&'ast [FieldDecl<'ast>]>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportDecl<'ast> {
    pub names: &'ast [Ident<'ast>],
    pub path: &'ast str,
    pub path_span: Span,
    pub span: Span,
}

/// `export` applied to a binding, function, type or enum declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportDecl<'ast> {
    pub decl: Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhileStmt<'ast> {
    pub condition: &'ast Expr<'ast>,
    pub binding: Option<Ident<'ast>>,
    pub body: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForStmt<'ast> {
    pub item: Ident<'ast>,
    pub index: Option<Ident<'ast>>,
    pub iterable: &'ast Expr<'ast>,
    pub body: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscardStmt<'ast> {
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

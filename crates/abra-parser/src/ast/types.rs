//! Type annotations as written in source.

use crate::ast::Ident;
use abra_core::Span;

/// A type annotation: `Int`, `Node<T>`, `String[]`, `Int?`, `(Int) => Bool`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeExpr<'ast> {
    pub kind: TypeExprKind<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeExprKind<'ast> {
    /// A builtin, declared or generic type name, with optional type arguments.
    Named {
        name: Ident<'ast>,
        args: &'ast [TypeExpr<'ast>],
    },
    /// `T[]`
    Array(&'ast TypeExpr<'ast>),
    /// `T?`
    Option(&'ast TypeExpr<'ast>),
    /// `(A, B) => R`
    Function {
        params: &'ast [TypeExpr<'ast>],
        ret: &'ast TypeExpr<'ast>,
    },
}

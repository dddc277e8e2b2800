//! Expression AST nodes for Abra.
//!
//! Abra is expression-oriented: blocks and `if` are expressions, and a
//! block's value is its final expression statement.
//!
//! # Expression Precedence
//!
//! The parser uses Pratt parsing with the following precedence levels:
//! 1. Assignment (=, +=, -=, *=, /=) - right associative
//! 2. Logical OR (||)
//! 3. Logical AND (&&)
//! 4. Equality (==, !=)
//! 5. Relational (<, <=, >, >=)
//! 6. Coalescing (?:) - right associative
//! 7. Additive (+, -)
//! 8. Multiplicative (*, /, %)
//! 9. Prefix unary (-, !)
//! 10. Postfix (call, index, `.`, `?.`)

use crate::ast::stmt::Stmt;
use crate::ast::types::TypeExpr;
use crate::ast::{AssignOp, BinaryOp, Ident, Param, UnaryOp};
use abra_core::Span;

/// An expression node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    /// `42`, `1.5`, `"text"`, `true`, `None`
    Literal(LiteralExpr<'ast>),
    /// `"Hello, $name"`
    Interpolation(&'ast InterpolationExpr<'ast>),
    /// `[1, 2, 3]`
    Array(&'ast ArrayExpr<'ast>),
    /// `x`, `self`, `range`, `Node<Int>`
    Ident(IdentExpr<'ast>),
    /// `a + b`, `a ?: b`
    Binary(&'ast BinaryExpr<'ast>),
    /// `-a`, `!a`
    Unary(&'ast UnaryExpr<'ast>),
    /// `a = b`, `a += b`
    Assign(&'ast AssignExpr<'ast>),
    /// `f(a, b: 1)`
    Call(&'ast CallExpr<'ast>),
    /// `a[i]`
    Index(&'ast IndexExpr<'ast>),
    /// `a.b`, `a?.b`
    Member(&'ast MemberExpr<'ast>),
    /// `(a, b) => a + b`
    Lambda(&'ast LambdaExpr<'ast>),
    /// `{ stmt; stmt; tail }`
    Block(&'ast BlockExpr<'ast>),
    /// `if cond a else b`, `if opt |x| a`
    If(&'ast IfExpr<'ast>),
    /// `(expr)`
    Paren(&'ast ParenExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    /// Get the source location span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(e) => e.span,
            Self::Interpolation(e) => e.span,
            Self::Array(e) => e.span,
            Self::Ident(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Assign(e) => e.span,
            Self::Call(e) => e.span,
            Self::Index(e) => e.span,
            Self::Member(e) => e.span,
            Self::Lambda(e) => e.span,
            Self::Block(e) => e.span,
            Self::If(e) => e.span,
            Self::Paren(e) => e.span,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Expr<'ast> {
        match self {
            Self::Paren(p) => p.expr.unparenthesized(),
            other => other,
        }
    }

    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        match self.unparenthesized() {
            Self::Ident(ident) => ident.type_args.is_empty() && ident.ident.name != "self",
            Self::Member(member) => !member.optional,
            Self::Index(_) => true,
            _ => false,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    pub kind: LiteralKind<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralKind<'ast> {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Already unescaped.
    String(&'ast str),
    None,
}

/// A string with interpolated expressions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationExpr<'ast> {
    pub parts: &'ast [InterpolationPart<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpolationPart<'ast> {
    Text(&'ast str),
    Expr(&'ast Expr<'ast>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayExpr<'ast> {
    pub elements: &'ast [&'ast Expr<'ast>],
    pub span: Span,
}

/// A name reference, optionally with explicit type arguments (`Node<Int>`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentExpr<'ast> {
    pub ident: Ident<'ast>,
    pub type_args: &'ast [TypeExpr<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    pub left: &'ast Expr<'ast>,
    pub op: BinaryOp,
    pub right: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    pub op: UnaryOp,
    pub operand: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignExpr<'ast> {
    pub target: &'ast Expr<'ast>,
    pub op: AssignOp,
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    pub callee: &'ast Expr<'ast>,
    pub args: &'ast [Argument<'ast>],
    pub span: Span,
}

/// A call argument, positional (`f(1)`) or named (`f(x: 1)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Argument<'ast> {
    pub name: Option<Ident<'ast>>,
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexExpr<'ast> {
    pub object: &'ast Expr<'ast>,
    pub index: &'ast Expr<'ast>,
    pub span: Span,
}

/// Member access; `optional` is true for `?.`.
///
/// `type_args` holds explicit type arguments of a method call such as
/// `list.map<Int>(f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberExpr<'ast> {
    pub object: &'ast Expr<'ast>,
    pub member: Ident<'ast>,
    pub type_args: &'ast [TypeExpr<'ast>],
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaExpr<'ast> {
    pub params: &'ast [Param<'ast>],
    pub body: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockExpr<'ast> {
    pub stmts: &'ast [Stmt<'ast>],
    pub span: Span,
}

impl<'ast> BlockExpr<'ast> {
    /// The final expression statement, which is the block's value.
    pub fn tail(&self) -> Option<&'ast Expr<'ast>> {
        match self.stmts.last() {
            Some(Stmt::Expr(expr)) => Some(expr),
            _ => None,
        }
    }

    /// The statements before the tail expression.
    pub fn leading(&self) -> &'ast [Stmt<'ast>] {
        match self.tail() {
            Some(_) => &self.stmts[..self.stmts.len() - 1],
            None => self.stmts,
        }
    }
}

/// `if cond then else`, where `binding` is the `|x|` of a conditional binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfExpr<'ast> {
    pub condition: &'ast Expr<'ast>,
    pub binding: Option<Ident<'ast>>,
    pub then_branch: &'ast Expr<'ast>,
    pub else_branch: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParenExpr<'ast> {
    pub expr: &'ast Expr<'ast>,
    pub span: Span,
}

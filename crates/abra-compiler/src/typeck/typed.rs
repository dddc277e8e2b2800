//! The typed AST produced by the type checker.
//!
//! Unlike the parser's arena AST, the typed tree is owned and carries a
//! resolved [`Type`] on every expression. Names are already resolved to
//! storage locations and call targets, and operators to the opcode that
//! implements them, so code generation is a direct walk.

use abra_core::{Span, Type, TypeId};
use bitflags::bitflags;

use super::prelude::Builtin;
use crate::bytecode::OpCode;

/// A checked module, ready for code generation.
#[derive(Debug, Clone)]
pub struct TypedModule {
    pub name: String,
    /// All functions; index 0 is the module initializer.
    pub functions: Vec<TypedFunction>,
    /// Names of the module globals, by slot.
    pub globals: Vec<String>,
    /// Symbols other modules may link against.
    pub exports: Vec<(String, ExportTarget)>,
    /// References to other modules' symbols, by extern index.
    pub externs: Vec<ExternRef>,
    /// Types declared by this module.
    pub types: Vec<TypeId>,
    /// Modules this module imports from.
    pub dependencies: Vec<String>,
}

/// What an export symbol refers to inside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Global(u16),
    Function(u32),
}

/// A symbol of another module referenced by this one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternRef {
    pub module: String,
    pub symbol: String,
}

bitflags! {
    /// Properties of a compiled function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionFlags: u8 {
        /// The module initializer.
        const MAIN = 1 << 0;
        /// Declared inside another function; captures its environment.
        const NESTED = 1 << 1;
        /// Takes a receiver as parameter 0.
        const METHOD = 1 << 2;
        /// Synthesized constructor of a type or data variant.
        const CONSTRUCTOR = 1 << 3;
        /// Declared `Unit` return: the body value is dropped.
        const DISCARDS_RESULT = 1 << 4;
    }
}

/// A checked function.
#[derive(Debug, Clone)]
pub struct TypedFunction {
    pub name: String,
    pub params: Vec<TypedParam>,
    pub body: FunctionBody,
    /// Number of frame slots, parameters included.
    pub local_count: u16,
    pub flags: FunctionFlags,
    pub span: Span,
}

impl TypedFunction {
    /// Number of parameters, receiver included.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A function parameter and its default, if any.
#[derive(Debug, Clone)]
pub struct TypedParam {
    pub name: String,
    pub slot: u16,
    pub default: Option<TExpr>,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Not checked yet; replaced before the module is finished.
    Pending,
    Expr(TExpr),
    /// Constructor of a struct type: the parameters become the fields.
    Construct { type_id: TypeId },
    /// Constructor of a data variant.
    Variant { type_id: TypeId, variant: u16 },
}

/// A checked expression.
#[derive(Debug, Clone)]
pub struct TExpr {
    pub kind: TExprKind,
    pub ty: Type,
    pub span: Span,
}

impl TExpr {
    pub fn new(kind: TExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn unit(span: Span) -> Self {
        Self::new(TExprKind::Unit, Type::Unit, span)
    }
}

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    /// A frame slot `depth` functions out (0 is the current frame).
    Local { depth: u8, slot: u16 },
    Global(u16),
    /// Another module's export.
    External(u32),
}

#[derive(Debug, Clone)]
pub enum TExprKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None,
    Unit,
    /// Pieces are stringified and concatenated.
    Interpolation(Vec<TExpr>),
    Array(Vec<TExpr>),
    Var(VarRef),
    /// A top-level function of this module used as a value.
    Function(u32),
    /// A lambda; creates a closure.
    Lambda(u32),
    Binary {
        op: OpCode,
        left: Box<TExpr>,
        right: Box<TExpr>,
    },
    And(Box<TExpr>, Box<TExpr>),
    Or(Box<TExpr>, Box<TExpr>),
    Coalesce(Box<TExpr>, Box<TExpr>),
    Unary {
        op: OpCode,
        operand: Box<TExpr>,
    },
    Assign {
        target: AssignTarget,
        /// Compound operator applied to the current value.
        op: Option<OpCode>,
        value: Box<TExpr>,
    },
    Call(Box<TCall>),
    Index {
        object: Box<TExpr>,
        index: Box<TExpr>,
    },
    Field {
        object: Box<TExpr>,
        index: u16,
        optional: bool,
    },
    Block(TBlock),
    If {
        cond: Box<TCond>,
        then_branch: Box<TExpr>,
        else_branch: Option<Box<TExpr>>,
    },
    /// A unit enum variant.
    Variant { type_id: TypeId, variant: u16 },
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Var(VarRef),
    Field { object: Box<TExpr>, index: u16 },
    Index { object: Box<TExpr>, index: Box<TExpr> },
}

#[derive(Debug, Clone)]
pub struct TCall {
    pub callee: Callee,
    /// Receiver passed as argument 0 (methods and builtin members).
    pub receiver: Option<TExpr>,
    /// `?.` call: skipped when the receiver is None.
    pub optional: bool,
    /// Arguments in parameter order.
    pub args: Vec<TArg>,
}

#[derive(Debug, Clone)]
pub enum Callee {
    /// A function of this module.
    Direct(u32),
    /// A function of another module, by extern index.
    Extern(u32),
    Builtin(Builtin),
    /// Any function value. With `optional`, this is a `?.` field access
    /// whose object is evaluated and tested first.
    Value(Box<TExpr>),
}

#[derive(Debug, Clone)]
pub enum TArg {
    Value(TExpr),
    /// Left to the callee's default.
    Omitted,
}

#[derive(Debug, Clone)]
pub enum TCond {
    Bool(TExpr),
    /// `if opt |name|`: the unwrapped value is stored in `slot`.
    Bind { value: TExpr, slot: u16 },
}

#[derive(Debug, Clone)]
pub struct TBlock {
    pub stmts: Vec<TStmt>,
    /// The value of the block; `Unit` when absent.
    pub tail: Option<Box<TExpr>>,
}

#[derive(Debug, Clone)]
pub enum TStmt {
    /// Evaluated and discarded.
    Expr(TExpr),
    Let {
        target: VarRef,
        /// `None` for `var x: T?` without initializer.
        value: Option<TExpr>,
    },
    /// A nested function stored as a closure in `slot`.
    Func { slot: u16, fid: u32 },
    While {
        cond: TCond,
        body: TExpr,
    },
    For {
        iterable: TExpr,
        /// Hidden slots holding the array and the position.
        array_slot: u16,
        cursor_slot: u16,
        item_slot: u16,
        index_slot: Option<u16>,
        body: TExpr,
    },
    Break,
    Continue,
}

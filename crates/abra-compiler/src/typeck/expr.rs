//! Expression checking.
//!
//! Every expression is checked bottom-up. An `expected` type flows down
//! where the context knows one (annotations, parameters, branches); it only
//! guides literals that cannot type themselves (`None`, `[]`, lambdas) and
//! is never a substitute for the acceptance check done by the caller.

use abra_core::{Span, Type, TypecheckError, TypecheckErrorKind};
use abra_parser::ast::{
    ArrayExpr, AssignExpr, BinaryExpr, BinaryOp, Expr, Ident, IdentExpr, IfExpr, IndexExpr,
    InterpolationPart, LambdaExpr, LiteralKind, MAX_NESTING_DEPTH, MemberExpr, UnaryExpr, UnaryOp,
};

use super::{
    AssignTarget, BuiltinMember, Callee, FunctionBody, FunctionFlags, FunctionSig, LocalKind, Mode,
    Resolved, Result, TCall, TCond, TExpr, TExprKind, TypeChecker, TypedFunction, TypedParam,
    VarRef,
};
use crate::bytecode::OpCode;

impl TypeChecker<'_> {
    /// Check an expression whose value is used.
    pub(super) fn check_expr(&mut self, expr: &Expr<'_>, expected: Option<&Type>) -> Result<TExpr> {
        if self.expr_depth >= MAX_NESTING_DEPTH {
            return Err(TypecheckError::new(
                TypecheckErrorKind::NestingTooDeep,
                expr.span(),
                format!("Expression nests more than {MAX_NESTING_DEPTH} levels deep"),
            ));
        }
        self.expr_depth += 1;
        let result = self.check_expr_kind(expr, expected);
        self.expr_depth -= 1;
        result
    }

    fn check_expr_kind(&mut self, expr: &Expr<'_>, expected: Option<&Type>) -> Result<TExpr> {
        match expr {
            Expr::Literal(lit) => Ok(check_literal(&lit.kind, expected, lit.span)),
            Expr::Interpolation(interp) => {
                let mut parts = Vec::with_capacity(interp.parts.len());
                for part in interp.parts {
                    parts.push(match part {
                        InterpolationPart::Text(text) => {
                            TExpr::new(TExprKind::Str((*text).to_string()), Type::String, interp.span)
                        }
                        InterpolationPart::Expr(inner) => self.check_expr(inner, None)?,
                    });
                }
                Ok(TExpr::new(TExprKind::Interpolation(parts), Type::String, interp.span))
            }
            Expr::Array(array) => self.check_array(array, expected),
            Expr::Ident(ident) => self.check_ident(ident),
            Expr::Binary(binary) => self.check_binary(binary),
            Expr::Unary(unary) => self.check_unary(unary),
            Expr::Assign(assign) => self.check_assign(assign),
            Expr::Call(call) => self.check_call(call, expected),
            Expr::Index(index) => self.check_index(index),
            Expr::Member(member) => self.check_member(member),
            Expr::Lambda(lambda) => self.check_lambda(lambda, expected),
            Expr::Block(block) => self.check_block(block, Mode::Value, expected),
            Expr::If(if_expr) => self.check_if(if_expr, Mode::Value, expected),
            Expr::Paren(paren) => self.check_expr(paren.expr, expected),
        }
    }

    /// Check `expr` and require its type to be accepted by `expected`.
    pub(super) fn check_against(&mut self, expr: &Expr<'_>, expected: &Type) -> Result<TExpr> {
        let value = self.check_expr(expr, Some(expected))?;
        if !expected.accepts(&value.ty) {
            return Err(TypecheckError::mismatch(value_span(expr), expected, &value.ty));
        }
        Ok(value)
    }

    fn check_array(&mut self, array: &ArrayExpr<'_>, expected: Option<&Type>) -> Result<TExpr> {
        let expected_element = expected
            .map(strip_option)
            .and_then(Type::array_element)
            .filter(|t| !t.has_unknown())
            .cloned();

        let mut elements = Vec::with_capacity(array.elements.len());
        let mut element_ty: Option<Type> = None;
        for element in array.elements {
            let value = self.check_expr(element, expected_element.as_ref())?;
            element_ty = Some(match element_ty {
                None => value.ty.clone(),
                Some(acc) => acc.unify(&value.ty).ok_or_else(|| {
                    TypecheckError::new(
                        TypecheckErrorKind::TypeMismatch,
                        element.span(),
                        format!("Array elements must share a type: expected {acc}, found {}", value.ty),
                    )
                })?,
            });
            elements.push(value);
        }

        // A declared element type wins when it accepts every element, so
        // `val a: Int?[] = [1, 2]` is an `Int?[]`.
        let element_ty = match expected_element {
            Some(declared) if elements.iter().all(|e| declared.accepts(&e.ty)) => declared,
            _ => element_ty.unwrap_or(Type::Unknown),
        };
        Ok(TExpr::new(
            TExprKind::Array(elements),
            Type::array(element_ty),
            array.span,
        ))
    }

    fn check_ident(&mut self, ident: &IdentExpr<'_>) -> Result<TExpr> {
        if !ident.type_args.is_empty() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::InvalidOperator,
                ident.span,
                "Type arguments are only allowed on calls",
            ));
        }
        let span = ident.span;
        match self.resolve_name(&ident.ident)? {
            Resolved::Var { var, ty, .. } => Ok(TExpr::new(TExprKind::Var(var), ty, span)),
            Resolved::Function { fid, local } => {
                self.reference_function(fid, span)?;
                let ty = self.function_type(fid, span)?;
                let kind = match local {
                    Some(var) => TExprKind::Var(var),
                    None => TExprKind::Function(fid),
                };
                Ok(TExpr::new(kind, ty, span))
            }
            Resolved::ExternFunction { index, sig } => {
                let ty = sig
                    .to_type()
                    .ok_or_else(|| super::missing_return_type(ident.ident.name, span))?;
                Ok(TExpr::new(TExprKind::Var(VarRef::External(index)), ty, span))
            }
            Resolved::Type(_) => Err(TypecheckError::new(
                TypecheckErrorKind::NotAValue,
                span,
                format!("'{}' is a type, not a value", ident.ident.name),
            )),
            Resolved::Builtin(..) => Err(TypecheckError::new(
                TypecheckErrorKind::NotAValue,
                span,
                format!("Builtin '{}' must be called", ident.ident.name),
            )),
        }
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    fn check_binary(&mut self, binary: &BinaryExpr<'_>) -> Result<TExpr> {
        let span = binary.span;
        match binary.op {
            BinaryOp::And | BinaryOp::Or => {
                let left = self.check_bool_operand(binary.left, binary.op)?;
                let right = self.check_bool_operand(binary.right, binary.op)?;
                let kind = if binary.op == BinaryOp::And {
                    TExprKind::And(Box::new(left), Box::new(right))
                } else {
                    TExprKind::Or(Box::new(left), Box::new(right))
                };
                Ok(TExpr::new(kind, Type::Bool, span))
            }
            BinaryOp::Coalesce => {
                let left = self.check_expr(binary.left, None)?;
                let Some(inner) = left.ty.option_inner().cloned() else {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::NotOptional,
                        binary.left.span(),
                        format!("Left side of '?:' must be an optional value, found {}", left.ty),
                    ));
                };
                let (right, ty) = if inner.has_unknown() {
                    let right = self.check_expr(binary.right, None)?;
                    let ty = right.ty.clone();
                    (right, ty)
                } else {
                    (self.check_against(binary.right, &inner)?, inner)
                };
                Ok(TExpr::new(
                    TExprKind::Coalesce(Box::new(left), Box::new(right)),
                    ty,
                    span,
                ))
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let left = self.check_expr(binary.left, None)?;
                let right = self.check_expr(binary.right, Some(&left.ty))?;
                if !left.ty.accepts(&right.ty) && !right.ty.accepts(&left.ty) {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::TypeMismatch,
                        span,
                        format!("Cannot compare {} with {}", left.ty, right.ty),
                    ));
                }
                let op = if binary.op == BinaryOp::Equal {
                    OpCode::Eq
                } else {
                    OpCode::Neq
                };
                Ok(binary_expr(op, left, right, Type::Bool, span))
            }
            op => {
                let left = self.check_expr(binary.left, None)?;
                let right = self.check_expr(binary.right, None)?;
                let (opcode, ty) = operator(op, &left.ty, &right.ty).ok_or_else(|| {
                    TypecheckError::new(
                        TypecheckErrorKind::InvalidOperator,
                        span,
                        format!(
                            "Operator '{}' cannot be applied to {} and {}",
                            op, left.ty, right.ty
                        ),
                    )
                })?;
                Ok(binary_expr(opcode, left, right, ty, span))
            }
        }
    }

    fn check_bool_operand(&mut self, expr: &Expr<'_>, op: BinaryOp) -> Result<TExpr> {
        let value = self.check_expr(expr, Some(&Type::Bool))?;
        if value.ty != Type::Bool {
            return Err(TypecheckError::new(
                TypecheckErrorKind::InvalidOperator,
                expr.span(),
                format!("Operator '{op}' requires Bool operands, found {}", value.ty),
            ));
        }
        Ok(value)
    }

    fn check_unary(&mut self, unary: &UnaryExpr<'_>) -> Result<TExpr> {
        let operand = self.check_expr(unary.operand, None)?;
        let op = match (unary.op, &operand.ty) {
            (UnaryOp::Neg, Type::Int) => OpCode::NegInt,
            (UnaryOp::Neg, Type::Float) => OpCode::NegFloat,
            (UnaryOp::Not, Type::Bool) => OpCode::Not,
            (op, ty) => {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidOperator,
                    unary.span,
                    format!("Operator '{op}' cannot be applied to {ty}"),
                ));
            }
        };
        let ty = operand.ty.clone();
        Ok(TExpr::new(
            TExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            unary.span,
        ))
    }

    // ==========================================================================
    // Assignment
    // ==========================================================================

    fn check_assign(&mut self, assign: &AssignExpr<'_>) -> Result<TExpr> {
        let target_expr = assign.target.unparenthesized();
        let (target, target_ty) = match target_expr {
            Expr::Ident(ident) => self.assign_target_var(ident)?,
            Expr::Member(member) => self.assign_target_field(member)?,
            Expr::Index(index) => {
                let object = self.check_expr(index.object, None)?;
                let element = self.indexed_element(&object.ty, index.object.span())?;
                let position = self.check_against(index.index, &Type::Int)?;
                (
                    AssignTarget::Index {
                        object: Box::new(object),
                        index: Box::new(position),
                    },
                    element,
                )
            }
            other => {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidOperator,
                    other.span(),
                    "Invalid assignment target",
                ));
            }
        };

        let (op, value) = match assign.op.binary_op() {
            None => (None, self.check_against(assign.value, &target_ty)?),
            Some(binary) => {
                let value = self.check_expr(assign.value, Some(&target_ty))?;
                let op = operator(binary, &target_ty, &value.ty)
                    .filter(|(_, result)| target_ty.accepts(result))
                    .map(|(op, _)| op)
                    .ok_or_else(|| {
                        TypecheckError::new(
                            TypecheckErrorKind::InvalidOperator,
                            assign.span,
                            format!(
                                "Operator '{}' cannot be applied to {} and {}",
                                assign.op, target_ty, value.ty
                            ),
                        )
                    })?;
                (Some(op), value)
            }
        };

        // A compound update of a missing element does nothing and yields None.
        let ty = match (&target, op) {
            (AssignTarget::Index { .. }, Some(_)) => Type::option(target_ty),
            _ => target_ty,
        };
        Ok(TExpr::new(
            TExprKind::Assign {
                target,
                op,
                value: Box::new(value),
            },
            ty,
            assign.span,
        ))
    }

    fn assign_target_var(&mut self, ident: &IdentExpr<'_>) -> Result<(AssignTarget, Type)> {
        let name = ident.ident.name;
        let reason = match self.resolve_name(&ident.ident)? {
            Resolved::Var {
                var: VarRef::External(_),
                ..
            } => format!("'{name}' is imported from another module"),
            Resolved::Var { var, ty, kind } => match kind {
                LocalKind::Var => return Ok((AssignTarget::Var(var), ty)),
                LocalKind::Param => format!("'{name}' is a parameter"),
                _ => format!("'{name}' is declared with val"),
            },
            Resolved::Function { .. } | Resolved::ExternFunction { .. } => {
                format!("'{name}' is a function")
            }
            Resolved::Type(_) => format!("'{name}' is a type"),
            Resolved::Builtin(..) => format!("'{name}' is a builtin"),
        };
        Err(TypecheckError::new(
            TypecheckErrorKind::ImmutableAssignment,
            ident.span,
            format!("Cannot assign to '{name}': {reason}"),
        ))
    }

    fn assign_target_field(&mut self, member: &MemberExpr<'_>) -> Result<(AssignTarget, Type)> {
        if member.optional {
            return Err(TypecheckError::new(
                TypecheckErrorKind::InvalidOperator,
                member.span,
                "Cannot assign through '?.'; unwrap the value first",
            ));
        }
        let object = self.check_expr(member.object, None)?;
        let receiver = self.member_receiver(&object.ty, member)?;
        let name = member.member.name;
        if let Type::Named(named) = &receiver {
            let info = self.type_info(named.id, member.span)?;
            if let Some((index, field)) = info.field(name) {
                let ty = field.ty.substitute(&info.bindings(&named.args));
                return Ok((
                    AssignTarget::Field {
                        object: Box::new(object),
                        index: index as u16,
                    },
                    ty,
                ));
            }
            if info.method(name).is_some() {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::ImmutableAssignment,
                    member.member.span,
                    format!("Cannot assign to '{name}': it is a method"),
                ));
            }
        } else if self.prelude.member(&receiver, name).is_some() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::ImmutableAssignment,
                member.member.span,
                format!("Cannot assign to '{name}': it is a builtin member"),
            ));
        }
        Err(unknown_member(&receiver, name, member.member.span))
    }

    // ==========================================================================
    // Access
    // ==========================================================================

    fn check_index(&mut self, index: &IndexExpr<'_>) -> Result<TExpr> {
        let object = self.check_expr(index.object, None)?;
        let element = self.indexed_element(&object.ty, index.object.span())?;
        let position = self.check_against(index.index, &Type::Int)?;
        Ok(TExpr::new(
            TExprKind::Index {
                object: Box::new(object),
                index: Box::new(position),
            },
            Type::option(element),
            index.span,
        ))
    }

    fn indexed_element(&self, ty: &Type, span: Span) -> Result<Type> {
        match ty {
            Type::Array(element) => Ok((**element).clone()),
            Type::Option(_) => Err(TypecheckError::new(
                TypecheckErrorKind::OptionalAccess,
                span,
                format!("Cannot index a value of optional type {ty}; unwrap it first"),
            )),
            _ => Err(TypecheckError::new(
                TypecheckErrorKind::InvalidOperator,
                span,
                format!("Cannot index a value of type {ty}"),
            )),
        }
    }

    /// The type members are looked up on, honoring `?.`.
    pub(super) fn member_receiver(&self, ty: &Type, member: &MemberExpr<'_>) -> Result<Type> {
        match (member.optional, ty.option_inner()) {
            (true, Some(inner)) => Ok(inner.clone()),
            (true, None) => Err(TypecheckError::new(
                TypecheckErrorKind::NotOptional,
                member.span,
                format!("'?.' requires an optional value, found {ty}"),
            )),
            (false, Some(_)) => Err(TypecheckError::new(
                TypecheckErrorKind::OptionalAccess,
                member.span,
                format!(
                    "Cannot access '{}' on optional type {ty}; use '?.'",
                    member.member.name
                ),
            )),
            (false, None) => Ok(ty.clone()),
        }
    }

    /// A member used as a value: a field, a builtin property, a unit enum
    /// variant, or a constructor or static method of a type.
    fn check_member(&mut self, member: &MemberExpr<'_>) -> Result<TExpr> {
        let name = member.member.name;
        let span = member.span;

        if let Expr::Ident(object) = member.object.unparenthesized()
            && object.type_args.is_empty()
            && let Some(id) = self.type_named(object.ident.name)
        {
            let info = self.type_info(id, object.span)?.clone();
            if let Some((index, variant)) = info.variant(name) {
                return match variant.ctor {
                    None => Ok(TExpr::new(
                        TExprKind::Variant {
                            type_id: id,
                            variant: index as u16,
                        },
                        info.self_type(),
                        span,
                    )),
                    Some(ctor) => {
                        let ty = info.variant_sig(variant).to_type().unwrap_or(Type::Unknown);
                        let symbol = format!("{}.{}", info.name, variant.name);
                        Ok(self.function_value(&info.module, ctor, &symbol, ty, span))
                    }
                };
            }
            if let Some(method) = info.method(name).filter(|m| !m.has_self) {
                let ty = self
                    .method_sig(&info, method, member.member.span)?
                    .to_type()
                    .ok_or_else(|| super::missing_return_type(&method.name, span))?;
                let symbol = format!("{}.{}", info.name, method.name);
                return Ok(self.function_value(&info.module, method.fid, &symbol, ty, span));
            }
            return Err(TypecheckError::new(
                TypecheckErrorKind::UnknownMember,
                member.member.span,
                format!("Type '{}' has no variant or static method '{name}'", info.name),
            ));
        }

        let object = self.check_expr(member.object, None)?;
        let receiver = self.member_receiver(&object.ty, member)?;
        let wrap = |ty: Type| if member.optional { Type::option(ty) } else { ty };

        if let Type::Named(named) = &receiver {
            let info = self.type_info(named.id, span)?;
            if let Some((index, field)) = info.field(name) {
                let ty = field.ty.substitute(&info.bindings(&named.args));
                return Ok(TExpr::new(
                    TExprKind::Field {
                        object: Box::new(object),
                        index: index as u16,
                        optional: member.optional,
                    },
                    wrap(ty),
                    span,
                ));
            }
            if info.method(name).is_some() {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::NotAValue,
                    member.member.span,
                    format!("Method '{name}' must be called"),
                ));
            }
        }

        match self.prelude.member(&receiver, name) {
            Some(BuiltinMember::Property { builtin, ty }) => {
                let call = TCall {
                    callee: Callee::Builtin(builtin),
                    receiver: Some(object),
                    optional: member.optional,
                    args: Vec::new(),
                };
                Ok(TExpr::new(TExprKind::Call(Box::new(call)), wrap(ty), span))
            }
            Some(BuiltinMember::Method { .. }) => Err(TypecheckError::new(
                TypecheckErrorKind::NotAValue,
                member.member.span,
                format!("Builtin method '{name}' must be called"),
            )),
            None => Err(unknown_member(&receiver, name, member.member.span)),
        }
    }

    fn function_value(&mut self, module: &str, fid: u32, symbol: &str, ty: Type, span: Span) -> TExpr {
        let kind = match self.member_callee(module, fid, symbol) {
            Callee::Extern(index) => TExprKind::Var(VarRef::External(index)),
            _ => TExprKind::Function(fid),
        };
        TExpr::new(kind, ty, span)
    }

    // ==========================================================================
    // Conditionals
    // ==========================================================================

    /// Check an `if`. In statement mode the branches are statements and the
    /// `if` has type `Unit`.
    pub(super) fn check_if(
        &mut self,
        if_expr: &IfExpr<'_>,
        mode: Mode,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        let cond = self.check_condition(if_expr.condition, if_expr.binding.as_ref())?;
        let then_branch = self.check_branch(if_expr.then_branch, mode, expected);
        if if_expr.binding.is_some() {
            self.scope.pop_scope();
        }
        let then_branch = then_branch?;
        let else_branch = if_expr
            .else_branch
            .map(|branch| self.check_branch(branch, mode, expected))
            .transpose()?;

        let ty = match (mode, &else_branch) {
            (Mode::Statement, _) => Type::Unit,
            (Mode::Value, Some(other)) => then_branch.ty.unify(&other.ty).ok_or_else(|| {
                TypecheckError::new(
                    TypecheckErrorKind::TypeMismatch,
                    other.span,
                    format!(
                        "Branches of 'if' have incompatible types {} and {}",
                        then_branch.ty, other.ty
                    ),
                )
            })?,
            (Mode::Value, None) if then_branch.ty.is_unit() => Type::Unit,
            (Mode::Value, None) => Type::option(then_branch.ty.clone()),
        };

        Ok(TExpr::new(
            TExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            ty,
            if_expr.span,
        ))
    }

    fn check_branch(&mut self, branch: &Expr<'_>, mode: Mode, expected: Option<&Type>) -> Result<TExpr> {
        match mode {
            Mode::Value => self.check_expr(branch, expected),
            Mode::Statement => self.check_stmt_expr(branch),
        }
    }

    /// Check an `if`/`while` condition. With a `|name|` binding a scope
    /// holding the unwrapped value is pushed; the caller pops it.
    pub(super) fn check_condition(
        &mut self,
        condition: &Expr<'_>,
        binding: Option<&Ident<'_>>,
    ) -> Result<TCond> {
        let Some(name) = binding else {
            let value = self.check_expr(condition, Some(&Type::Bool))?;
            if value.ty != Type::Bool {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::TypeMismatch,
                    condition.span(),
                    format!("Condition must be Bool, found {}", value.ty),
                ));
            }
            return Ok(TCond::Bool(value));
        };

        let value = self.check_expr(condition, None)?;
        let Some(inner) = value.ty.option_inner().cloned() else {
            return Err(TypecheckError::new(
                TypecheckErrorKind::NotOptional,
                condition.span(),
                format!("Conditional binding requires an optional value, found {}", value.ty),
            ));
        };
        if inner.has_unknown() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::CannotInfer,
                condition.span(),
                format!("Cannot infer the type of '{}'", name.name),
            ));
        }
        self.scope.push_scope();
        let slot = self.scope.declare(name.name, inner, LocalKind::Val, name.span)?;
        Ok(TCond::Bind { value, slot })
    }

    // ==========================================================================
    // Lambdas
    // ==========================================================================

    fn check_lambda(&mut self, lambda: &LambdaExpr<'_>, expected: Option<&Type>) -> Result<TExpr> {
        let expected_fn = match expected.map(strip_option) {
            Some(Type::Function(f)) => Some(f.clone()),
            _ => None,
        };

        let params = self.param_sigs(lambda.params.iter(), |this, i| {
            expected_fn
                .as_ref()
                .and_then(|f| f.params.get(i))
                .map(|p| p.ty.clone())
                .filter(|ty| this.is_resolved(ty) && !ty.has_unknown())
        })?;
        let expected_ret = expected_fn
            .as_ref()
            .map(|f| (*f.ret).clone())
            .filter(|ret| !ret.is_unit() && self.is_resolved(ret));

        let sig = FunctionSig {
            type_params: Vec::new(),
            params,
            ret: None,
        };
        let fid = self.alloc_function("<lambda>", sig.clone(), FunctionFlags::NESTED, lambda.span);

        let saved = self.enter_function(true);
        let result = self.check_lambda_body(lambda, &sig, expected_ret.as_ref());
        let local_count = self.scope.frame_size();
        self.exit_function(saved);
        let (params, body) = result?;

        if body.ty.has_unknown() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::CannotInfer,
                value_span(lambda.body),
                format!("Cannot infer the return type of this lambda from {}", body.ty),
            ));
        }

        let entry = &mut self.functions[fid as usize];
        entry.sig.ret = Some(body.ty.clone());
        let ty = entry.sig.to_type().unwrap_or(Type::Unknown);
        entry.function = TypedFunction {
            name: "<lambda>".to_string(),
            params,
            body: FunctionBody::Expr(body),
            local_count,
            flags: FunctionFlags::NESTED,
            span: lambda.span,
        };
        Ok(TExpr::new(TExprKind::Lambda(fid), ty, lambda.span))
    }

    fn check_lambda_body(
        &mut self,
        lambda: &LambdaExpr<'_>,
        sig: &FunctionSig,
        expected_ret: Option<&Type>,
    ) -> Result<(Vec<TypedParam>, TExpr)> {
        let params = self.declare_params(lambda.params.iter(), sig)?;
        let body = self.check_expr(lambda.body, expected_ret)?;
        Ok((params, body))
    }
}

fn check_literal(kind: &LiteralKind<'_>, expected: Option<&Type>, span: Span) -> TExpr {
    let (kind, ty) = match kind {
        LiteralKind::Int(v) => (TExprKind::Int(*v), Type::Int),
        LiteralKind::Float(v) => (TExprKind::Float(*v), Type::Float),
        LiteralKind::Bool(v) => (TExprKind::Bool(*v), Type::Bool),
        LiteralKind::String(s) => (TExprKind::Str((*s).to_string()), Type::String),
        LiteralKind::None => {
            let ty = match expected {
                Some(ty @ Type::Option(_)) => ty.clone(),
                _ => Type::option(Type::Unknown),
            };
            (TExprKind::None, ty)
        }
    };
    TExpr::new(kind, ty, span)
}

/// The opcode and result type of an arithmetic or ordering operator.
pub(super) fn operator(op: BinaryOp, left: &Type, right: &Type) -> Option<(OpCode, Type)> {
    use BinaryOp::*;
    let result = match (op, left, right) {
        (Add, Type::String, _) => (OpCode::Concat, Type::String),
        (Add, Type::Int, Type::Int) => (OpCode::AddInt, Type::Int),
        (Sub, Type::Int, Type::Int) => (OpCode::SubInt, Type::Int),
        (Mul, Type::Int, Type::Int) => (OpCode::MulInt, Type::Int),
        (Div, Type::Int, Type::Int) => (OpCode::DivInt, Type::Int),
        (Mod, Type::Int, Type::Int) => (OpCode::ModInt, Type::Int),
        (Add, Type::Float, Type::Float) => (OpCode::AddFloat, Type::Float),
        (Sub, Type::Float, Type::Float) => (OpCode::SubFloat, Type::Float),
        (Mul, Type::Float, Type::Float) => (OpCode::MulFloat, Type::Float),
        (Div, Type::Float, Type::Float) => (OpCode::DivFloat, Type::Float),
        (Mod, Type::Float, Type::Float) => (OpCode::ModFloat, Type::Float),
        (Less, Type::Int, Type::Int) => (OpCode::LtInt, Type::Bool),
        (LessEqual, Type::Int, Type::Int) => (OpCode::LeInt, Type::Bool),
        (Greater, Type::Int, Type::Int) => (OpCode::GtInt, Type::Bool),
        (GreaterEqual, Type::Int, Type::Int) => (OpCode::GeInt, Type::Bool),
        (Less, Type::Float, Type::Float) => (OpCode::LtFloat, Type::Bool),
        (LessEqual, Type::Float, Type::Float) => (OpCode::LeFloat, Type::Bool),
        (Greater, Type::Float, Type::Float) => (OpCode::GtFloat, Type::Bool),
        (GreaterEqual, Type::Float, Type::Float) => (OpCode::GeFloat, Type::Bool),
        _ => return None,
    };
    Some(result)
}

fn binary_expr(op: OpCode, left: TExpr, right: TExpr, ty: Type, span: Span) -> TExpr {
    TExpr::new(
        TExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        ty,
        span,
    )
}

/// `T` for `T?`, otherwise the type itself.
pub(super) fn strip_option(ty: &Type) -> &Type {
    ty.option_inner().unwrap_or(ty)
}

/// The span of the expression producing a value: the tail of a block.
pub(super) fn value_span(expr: &Expr<'_>) -> Span {
    match expr {
        Expr::Block(block) => block.tail().map_or(block.span, value_span),
        Expr::Paren(paren) => value_span(paren.expr),
        other => other.span(),
    }
}

pub(super) fn unknown_member(receiver: &Type, name: &str, span: Span) -> TypecheckError {
    TypecheckError::new(
        TypecheckErrorKind::UnknownMember,
        span,
        format!("Type {receiver} has no member '{name}'"),
    )
}

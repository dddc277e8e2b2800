//! Call checking.
//!
//! Calls to declarations (functions, methods, constructors, variants and
//! builtins) go through [`TypeChecker::check_args`], which maps named or
//! positional arguments onto parameters and infers type arguments. Calls to
//! arbitrary function values take positional arguments only.
//!
//! Type arguments are inferred in this order: explicit `<...>` arguments,
//! then non-lambda arguments, then the expected type of the call, then
//! lambda arguments, which are checked against the partially substituted
//! parameter types so they can take their parameter types from them.

use abra_core::{FunctionType, Type, TypeId, TypecheckError, TypecheckErrorKind};
use abra_parser::ast::{Argument, CallExpr, Expr, IdentExpr, MemberExpr, TypeExpr};
use rustc_hash::FxHashMap;

use super::expr::{strip_option, unknown_member};
use super::{
    BuiltinMember, Callee, FunctionSig, Resolved, Result, TArg, TCall, TExpr, TExprKind,
    TypeChecker, TypeKind, generics, missing_return_type,
};

impl TypeChecker<'_> {
    pub(super) fn check_call(&mut self, call: &CallExpr<'_>, expected: Option<&Type>) -> Result<TExpr> {
        match call.callee.unparenthesized() {
            Expr::Ident(ident) => self.check_named_call(ident, call, expected),
            Expr::Member(member) => self.check_member_call(member, call, expected),
            other => {
                let callee = self.check_expr(other, None)?;
                self.check_value_call(callee, call)
            }
        }
    }

    fn check_named_call(
        &mut self,
        ident: &IdentExpr<'_>,
        call: &CallExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        let name = ident.ident.name;
        let (callee, sig) = match self.resolve_name(&ident.ident)? {
            Resolved::Builtin(builtin, sig) => (Callee::Builtin(builtin), sig),
            Resolved::Function { fid, local } => {
                self.reference_function(fid, ident.span)?;
                let sig = self.functions[fid as usize].sig.clone();
                let callee = match local {
                    None => Callee::Direct(fid),
                    Some(var) => {
                        let ty = self.function_type(fid, ident.span)?;
                        Callee::Value(Box::new(TExpr::new(TExprKind::Var(var), ty, ident.span)))
                    }
                };
                (callee, sig)
            }
            Resolved::ExternFunction { index, sig } => (Callee::Extern(index), sig),
            Resolved::Type(id) => return self.check_constructor_call(id, ident, call, expected),
            Resolved::Var { var, ty, .. } => {
                reject_type_args(ident.type_args, name)?;
                let callee = TExpr::new(TExprKind::Var(var), ty, ident.span);
                return self.check_value_call(callee, call);
            }
        };

        let (args, ret) =
            self.check_args(name, &sig, FxHashMap::default(), ident.type_args, call, expected)?;
        Ok(call_expr(callee, None, false, args, ret, call))
    }

    fn check_constructor_call(
        &mut self,
        id: TypeId,
        ident: &IdentExpr<'_>,
        call: &CallExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        let info = self.type_info(id, ident.span)?.clone();
        let TypeKind::Struct { ctor, .. } = info.kind else {
            return Err(TypecheckError::new(
                TypecheckErrorKind::NotCallable,
                ident.span,
                format!(
                    "Enum '{}' cannot be constructed directly; use one of its variants",
                    info.name
                ),
            ));
        };
        let sig = info.ctor_sig();
        let (args, ret) = self.check_args(
            &info.name,
            &sig,
            FxHashMap::default(),
            ident.type_args,
            call,
            expected,
        )?;
        let callee = self.member_callee(&info.module, ctor, &info.name);
        Ok(call_expr(callee, None, false, args, ret, call))
    }

    fn check_member_call(
        &mut self,
        member: &MemberExpr<'_>,
        call: &CallExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        if let Expr::Ident(object) = member.object.unparenthesized()
            && object.type_args.is_empty()
            && let Some(id) = self.type_named(object.ident.name)
        {
            return self.check_static_call(id, member, call, expected);
        }

        let receiver = self.check_expr(member.object, None)?;
        let receiver_ty = self.member_receiver(&receiver.ty, member)?;
        let name = member.member.name;
        let expected = if member.optional {
            expected.map(strip_option)
        } else {
            expected
        };

        if let Type::Named(named) = &receiver_ty {
            let info = self.type_info(named.id, member.span)?.clone();
            if let Some(method) = info.method(name) {
                if !method.has_self {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::UnknownMember,
                        member.member.span,
                        format!(
                            "'{name}' is a static method; call it as {}.{name}()",
                            info.name
                        ),
                    ));
                }
                let bindings = info.bindings(&named.args);
                let symbol = format!("{}.{}", info.name, method.name);
                let sig = self.method_sig(&info, method, member.member.span)?;
                let (args, ret) =
                    self.check_args(&symbol, &sig, bindings, member.type_args, call, expected)?;
                let callee = self.member_callee(&info.module, method.fid, &symbol);
                return Ok(call_expr(callee, Some(receiver), member.optional, args, ret, call));
            }
            if let Some((index, field)) = info.field(name) {
                let field_ty = field.ty.substitute(&info.bindings(&named.args));
                let Type::Function(fn_ty) = &field_ty else {
                    return Err(not_callable(&field_ty, member.span));
                };
                reject_type_args(member.type_args, name)?;
                let (args, ret) = self.check_value_args(fn_ty, call)?;
                let field_value = TExpr::new(
                    TExprKind::Field {
                        object: Box::new(receiver),
                        index: index as u16,
                        optional: member.optional,
                    },
                    field_ty.clone(),
                    member.span,
                );
                let callee = Callee::Value(Box::new(field_value));
                return Ok(call_expr(callee, None, member.optional, args, ret, call));
            }
            return Err(unknown_member(&receiver_ty, name, member.member.span));
        }

        match self.prelude.member(&receiver_ty, name) {
            Some(BuiltinMember::Method { builtin, sig }) => {
                let (args, ret) =
                    self.check_args(name, &sig, FxHashMap::default(), member.type_args, call, expected)?;
                Ok(call_expr(
                    Callee::Builtin(builtin),
                    Some(receiver),
                    member.optional,
                    args,
                    ret,
                    call,
                ))
            }
            Some(BuiltinMember::Property { ty, .. }) => Err(not_callable(&ty, member.span)),
            None => Err(unknown_member(&receiver_ty, name, member.member.span)),
        }
    }

    /// `Type.member(...)`: a data variant or a static method.
    fn check_static_call(
        &mut self,
        id: TypeId,
        member: &MemberExpr<'_>,
        call: &CallExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        let info = self.type_info(id, member.span)?.clone();
        let name = member.member.name;
        let symbol = format!("{}.{}", info.name, name);

        if let Some((_, variant)) = info.variant(name) {
            let Some(ctor) = variant.ctor else {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::NotCallable,
                    member.span,
                    format!("Variant '{symbol}' has no fields and cannot be called"),
                ));
            };
            let sig = info.variant_sig(variant);
            let (args, ret) =
                self.check_args(&symbol, &sig, FxHashMap::default(), member.type_args, call, expected)?;
            let callee = self.member_callee(&info.module, ctor, &symbol);
            return Ok(call_expr(callee, None, false, args, ret, call));
        }

        match info.method(name) {
            Some(method) if !method.has_self => {
                let mut sig = self.method_sig(&info, method, member.member.span)?;
                let mut type_params = info.type_params.clone();
                type_params.extend(sig.type_params);
                sig.type_params = type_params;
                let (args, ret) = self.check_args(
                    &symbol,
                    &sig,
                    FxHashMap::default(),
                    member.type_args,
                    call,
                    expected,
                )?;
                let callee = self.member_callee(&info.module, method.fid, &symbol);
                Ok(call_expr(callee, None, false, args, ret, call))
            }
            Some(_) => Err(TypecheckError::new(
                TypecheckErrorKind::UnknownMember,
                member.member.span,
                format!("'{symbol}' is an instance method and must be called on a value"),
            )),
            None => Err(TypecheckError::new(
                TypecheckErrorKind::UnknownMember,
                member.member.span,
                format!("Type '{}' has no variant or static method '{name}'", info.name),
            )),
        }
    }

    fn check_value_call(&mut self, callee: TExpr, call: &CallExpr<'_>) -> Result<TExpr> {
        let Type::Function(fn_ty) = &callee.ty else {
            return Err(not_callable(&callee.ty, call.callee.span()));
        };
        let fn_ty = fn_ty.clone();
        let (args, ret) = self.check_value_args(&fn_ty, call)?;
        Ok(call_expr(Callee::Value(Box::new(callee)), None, false, args, ret, call))
    }

    /// Positional arguments of a call through a function value.
    fn check_value_args(&mut self, fn_ty: &FunctionType, call: &CallExpr<'_>) -> Result<(Vec<TArg>, Type)> {
        if let Some(named) = call.args.iter().find(|a| a.name.is_some()) {
            return Err(TypecheckError::new(
                TypecheckErrorKind::InvalidArgument,
                named.span,
                "Named arguments are only allowed when calling a declared function",
            ));
        }
        let required = fn_ty.required_params();
        let total = fn_ty.params.len();
        if call.args.len() < required || call.args.len() > total {
            return Err(argument_count(required, total, call.args.len(), call));
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (arg, param) in call.args.iter().zip(&fn_ty.params) {
            args.push(TArg::Value(self.check_against(arg.value, &param.ty)?));
        }
        Ok((args, (*fn_ty.ret).clone()))
    }

    /// Map the arguments of a call onto the parameters of `sig`, inferring
    /// the signature's type parameters.
    ///
    /// `bindings` holds type parameters already fixed by the receiver type.
    /// Returns the arguments in parameter order and the return type.
    fn check_args(
        &mut self,
        name: &str,
        sig: &FunctionSig,
        mut bindings: FxHashMap<String, Type>,
        type_args: &[TypeExpr<'_>],
        call: &CallExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<(Vec<TArg>, Type)> {
        let Some(ret) = &sig.ret else {
            return Err(missing_return_type(name, call.callee.span()));
        };
        let own = &sig.type_params;

        if !type_args.is_empty() {
            if type_args.len() != own.len() {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::TypeMismatch,
                    call.callee.span(),
                    format!(
                        "'{name}' expects {} type arguments, found {}",
                        own.len(),
                        type_args.len()
                    ),
                ));
            }
            for (param, arg) in own.iter().zip(type_args) {
                let ty = self.resolve_type(arg)?;
                bindings.insert(param.clone(), ty);
            }
        }

        let slots = map_arguments(name, sig, call)?;

        // Non-lambda arguments bind type parameters first.
        let mut values: Vec<Option<TExpr>> = vec![None; slots.len()];
        for (i, slot) in slots.iter().enumerate() {
            let Some(arg) = slot else { continue };
            if is_lambda(arg.value) {
                continue;
            }
            let pattern = sig.params[i].ty.substitute(&bindings);
            let hint = self.is_resolved(&pattern).then_some(&pattern);
            let value = self.check_expr(arg.value, hint)?;
            generics::bind(&pattern, &value.ty, own, &mut bindings);
            values[i] = Some(value);
        }

        if let Some(expected) = expected {
            generics::bind(&ret.substitute(&bindings), expected, own, &mut bindings);
        }

        for (i, slot) in slots.iter().enumerate() {
            let Some(arg) = slot else { continue };
            if values[i].is_some() {
                continue;
            }
            let pattern = sig.params[i].ty.substitute(&bindings);
            let value = self.check_expr(arg.value, Some(&pattern))?;
            generics::bind(&pattern, &value.ty, own, &mut bindings);
            values[i] = Some(value);
        }

        if let Some(unbound) = own.iter().find(|p| !bindings.contains_key(*p)) {
            return Err(TypecheckError::new(
                TypecheckErrorKind::CannotInfer,
                call.span,
                format!("Cannot infer type parameter '{unbound}' of '{name}'"),
            ));
        }

        let mut args = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Some(value) => {
                    let param_ty = sig.params[i].ty.substitute(&bindings);
                    if !param_ty.accepts(&value.ty) {
                        let span = slots[i].map_or(value.span, |arg| arg.value.span());
                        return Err(TypecheckError::mismatch(span, param_ty, &value.ty));
                    }
                    args.push(TArg::Value(value));
                }
                None => args.push(TArg::Omitted),
            }
        }
        Ok((args, ret.substitute(&bindings)))
    }
}

/// Assign each argument to a parameter slot.
fn map_arguments<'c, 'ast>(
    name: &str,
    sig: &FunctionSig,
    call: &'c CallExpr<'ast>,
) -> Result<Vec<Option<&'c Argument<'ast>>>> {
    let params = &sig.params;
    let named = call.args.iter().filter(|a| a.name.is_some()).count();
    if named > 0 && named < call.args.len() {
        return Err(TypecheckError::new(
            TypecheckErrorKind::MixedArguments,
            call.span,
            "Cannot mix named and positional arguments",
        ));
    }

    let mut slots: Vec<Option<&Argument<'ast>>> = vec![None; params.len()];
    if named > 0 {
        for arg in call.args {
            let Some(arg_name) = arg.name else { continue };
            let index = sig.param_index(arg_name.name).ok_or_else(|| {
                TypecheckError::new(
                    TypecheckErrorKind::InvalidArgument,
                    arg_name.span,
                    format!("'{name}' has no parameter named '{}'", arg_name.name),
                )
            })?;
            if slots[index].is_some() {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidArgument,
                    arg_name.span,
                    format!("Argument '{}' is given more than once", arg_name.name),
                ));
            }
            slots[index] = Some(arg);
        }
    } else {
        if call.args.len() > params.len() {
            let required = params.iter().filter(|p| !p.has_default).count();
            return Err(argument_count(required, params.len(), call.args.len(), call));
        }
        for (slot, arg) in slots.iter_mut().zip(call.args) {
            *slot = Some(arg);
        }
    }

    if let Some((param, _)) = params
        .iter()
        .zip(&slots)
        .find(|(p, slot)| slot.is_none() && !p.has_default)
    {
        return Err(TypecheckError::new(
            TypecheckErrorKind::ArgumentCount,
            call.span,
            format!("Missing argument '{}' in call to '{name}'", param.name),
        ));
    }
    Ok(slots)
}

fn call_expr(
    callee: Callee,
    receiver: Option<TExpr>,
    optional: bool,
    args: Vec<TArg>,
    ret: Type,
    call: &CallExpr<'_>,
) -> TExpr {
    let ty = match (optional, ret) {
        (false, ret) => ret,
        (true, Type::Unit) => Type::Unit,
        (true, ret) => Type::option(ret),
    };
    let tcall = TCall {
        callee,
        receiver,
        optional,
        args,
    };
    TExpr::new(TExprKind::Call(Box::new(tcall)), ty, call.span)
}

fn is_lambda(expr: &Expr<'_>) -> bool {
    matches!(expr.unparenthesized(), Expr::Lambda(_))
}

fn reject_type_args(type_args: &[TypeExpr<'_>], name: &str) -> Result<()> {
    match type_args.first() {
        Some(first) => Err(TypecheckError::new(
            TypecheckErrorKind::InvalidOperator,
            first.span,
            format!("'{name}' does not take type arguments"),
        )),
        None => Ok(()),
    }
}

fn not_callable(ty: &Type, span: abra_core::Span) -> TypecheckError {
    TypecheckError::new(
        TypecheckErrorKind::NotCallable,
        span,
        format!("A value of type {ty} is not callable"),
    )
}

fn argument_count(required: usize, total: usize, found: usize, call: &CallExpr<'_>) -> TypecheckError {
    let expected = if required == total {
        format!("{total}")
    } else {
        format!("{required} to {total}")
    };
    TypecheckError::new(
        TypecheckErrorKind::ArgumentCount,
        call.span,
        format!("Expected {expected} arguments, found {found}"),
    )
}

//! Statement, block and function body checking.

use abra_core::{Span, Type, TypeId, TypecheckError, TypecheckErrorKind};
use abra_parser::ast::{
    BindingDecl, BlockExpr, EnumDecl, Expr, FieldDecl, ForStmt, FuncDecl, Param, Stmt, TypeDecl,
    WhileStmt,
};

use super::expr::value_span;
use super::{
    DeferredBody, ExportTarget, ExportedSymbol, FieldInfo, FunctionBody, FunctionFlags,
    FunctionSig, GlobalSymbol, LocalKind, LocalScope, Mode, Result, TBlock, TExpr, TExprKind, TStmt,
    TypeChecker, TypeInfo, TypeKind, TypedParam, VarRef,
};

impl TypeChecker<'_> {
    // ==========================================================================
    // Module level
    // ==========================================================================

    /// Check the top-level statements. The final expression statement is the
    /// value of the module.
    pub(super) fn check_top_level(&mut self, items: &[Stmt<'_>]) -> Result<TExpr> {
        let span = items
            .first()
            .zip(items.last())
            .map_or(Span::default(), |(first, last)| first.span().merge(last.span()));
        let (leading, tail) = match items.split_last() {
            Some((Stmt::Expr(tail), leading)) => (leading, Some(*tail)),
            _ => (items, None),
        };

        let mut stmts = Vec::new();
        for item in leading {
            if let Some(stmt) = self.check_item(item)? {
                stmts.push(stmt);
            }
        }
        let tail = tail.map(|expr| self.check_expr(expr, None)).transpose()?;
        let ty = tail.as_ref().map_or(Type::Unit, |t| t.ty.clone());
        Ok(TExpr::new(
            TExprKind::Block(TBlock {
                stmts,
                tail: tail.map(Box::new),
            }),
            ty,
            span,
        ))
    }

    fn check_item(&mut self, item: &Stmt<'_>) -> Result<Option<TStmt>> {
        match item {
            Stmt::Import(_) => Ok(None),
            Stmt::Export(export) => match &export.decl {
                Stmt::Binding(decl) => self.check_binding(decl, true, true).map(Some),
                other => self.check_item(other),
            },
            Stmt::Binding(decl) => self.check_binding(decl, true, false).map(Some),
            Stmt::Func(decl) => {
                let fid = self.hoisted_fid(decl)?;
                self.check_function(fid, decl, None, false)?;
                Ok(None)
            }
            Stmt::Type(decl) => {
                self.check_type_decl(decl)?;
                Ok(None)
            }
            Stmt::Enum(decl) => {
                self.check_enum_decl(decl)?;
                Ok(None)
            }
            other => self.check_stmt(other),
        }
    }

    // ==========================================================================
    // Blocks
    // ==========================================================================

    /// Check a block. In value mode its last expression statement is its
    /// value; in statement mode every statement is a statement.
    pub(super) fn check_block(
        &mut self,
        block: &BlockExpr<'_>,
        mode: Mode,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        self.scope.push_scope();
        let result = self.check_block_body(block, mode, expected);
        self.scope.pop_scope();
        result
    }

    fn check_block_body(
        &mut self,
        block: &BlockExpr<'_>,
        mode: Mode,
        expected: Option<&Type>,
    ) -> Result<TExpr> {
        let mut stmts = self.hoist_block(block.stmts)?;
        let (leading, tail) = match mode {
            Mode::Value => (block.leading(), block.tail()),
            Mode::Statement => (block.stmts, None),
        };
        for stmt in leading {
            if let Some(stmt) = self.check_stmt(stmt)? {
                stmts.push(stmt);
            }
        }
        let tail = tail.map(|expr| self.check_expr(expr, expected)).transpose()?;
        let ty = tail.as_ref().map_or(Type::Unit, |t| t.ty.clone());
        Ok(TExpr::new(
            TExprKind::Block(TBlock {
                stmts,
                tail: tail.map(Box::new),
            }),
            ty,
            block.span,
        ))
    }

    /// Declare the nested functions of a block so they can be called before
    /// their declaration, and reject declarations that are top-level only.
    fn hoist_block(&mut self, stmts: &[Stmt<'_>]) -> Result<Vec<TStmt>> {
        let mut hoisted = Vec::new();
        for stmt in stmts {
            let what = match stmt {
                Stmt::Func(decl) => {
                    let sig = self.hoist_signature(decl, false)?;
                    let fid =
                        self.alloc_function(decl.name.name, sig, FunctionFlags::NESTED, decl.span);
                    let slot = self.scope.declare(
                        decl.name.name,
                        Type::Unknown,
                        LocalKind::Function(fid),
                        decl.name.span,
                    )?;
                    self.hoisted.insert(decl.span, fid);
                    hoisted.push(TStmt::Func { slot, fid });
                    continue;
                }
                Stmt::Type(_) => "Types",
                Stmt::Enum(_) => "Enums",
                Stmt::Import(_) => "Imports",
                Stmt::Export(_) => "Exports",
                _ => continue,
            };
            return Err(TypecheckError::new(
                TypecheckErrorKind::InvalidDeclaration,
                stmt.span(),
                format!("{what} are only allowed at the top level of a module"),
            ));
        }
        Ok(hoisted)
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    pub(super) fn check_stmt(&mut self, stmt: &Stmt<'_>) -> Result<Option<TStmt>> {
        match stmt {
            Stmt::Expr(expr) => Ok(Some(TStmt::Expr(self.check_stmt_expr(expr)?))),
            Stmt::Binding(decl) => self.check_binding(decl, false, false).map(Some),
            Stmt::Func(decl) => {
                let fid = self.hoisted_fid(decl)?;
                self.check_function(fid, decl, None, true)?;
                Ok(None)
            }
            Stmt::While(stmt) => self.check_while(stmt).map(Some),
            Stmt::For(stmt) => self.check_for(stmt).map(Some),
            Stmt::Break(span) => self.loop_control(*span, "break").map(|()| Some(TStmt::Break)),
            Stmt::Continue(span) => self
                .loop_control(*span, "continue")
                .map(|()| Some(TStmt::Continue)),
            Stmt::Discard(discard) => {
                let value = self.check_expr(discard.value, None)?;
                Ok(Some(TStmt::Expr(value)))
            }
            Stmt::Type(_) | Stmt::Enum(_) | Stmt::Import(_) | Stmt::Export(_) => {
                Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidDeclaration,
                    stmt.span(),
                    "Declarations of this kind are only allowed at the top level of a module",
                ))
            }
        }
    }

    /// Check an expression in statement position: its value must be `Unit`
    /// unless it is an assignment.
    pub(super) fn check_stmt_expr(&mut self, expr: &Expr<'_>) -> Result<TExpr> {
        match expr {
            Expr::If(if_expr) => self.check_if(if_expr, Mode::Statement, None),
            Expr::Block(block) => self.check_block(block, Mode::Statement, None),
            Expr::Assign(_) => self.check_expr(expr, None),
            _ => {
                let value = self.check_expr(expr, None)?;
                if !value.ty.is_unit() {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::UnusedValue,
                        expr.span(),
                        format!(
                            "Unused value of type {}; use it or discard it with `_ = ...`",
                            value.ty
                        ),
                    ));
                }
                Ok(value)
            }
        }
    }

    fn loop_control(&self, span: Span, keyword: &str) -> Result<()> {
        if self.scope.in_loop() {
            Ok(())
        } else {
            Err(TypecheckError::new(
                TypecheckErrorKind::InvalidLoopControl,
                span,
                format!("'{keyword}' outside of a loop"),
            ))
        }
    }

    fn check_binding(
        &mut self,
        decl: &BindingDecl<'_>,
        top_level: bool,
        exported: bool,
    ) -> Result<TStmt> {
        let name = decl.name.name;
        let declared = decl
            .ty
            .as_ref()
            .map(|ty| self.resolve_type(ty))
            .transpose()?;

        let (ty, value) = match (decl.init, declared) {
            (Some(init), Some(declared)) => {
                let value = self.check_against(init, &declared)?;
                (declared, Some(value))
            }
            (Some(init), None) => {
                let value = self.check_expr(init, None)?;
                if value.ty.has_unknown() {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::CannotInfer,
                        init.span(),
                        format!(
                            "Cannot infer the type of '{name}' from {}; add a type annotation",
                            value.ty
                        ),
                    ));
                }
                (value.ty.clone(), Some(value))
            }
            (None, _) if !decl.mutable => {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidDeclaration,
                    decl.span,
                    format!("'val {name}' requires an initializer"),
                ));
            }
            (None, Some(declared)) if declared.is_option() => (declared, None),
            (None, _) => {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidDeclaration,
                    decl.span,
                    format!("'var {name}' without an initializer must have an optional type"),
                ));
            }
        };

        let kind = if decl.mutable {
            LocalKind::Var
        } else {
            LocalKind::Val
        };
        let target = if top_level {
            let slot = u16::try_from(self.global_names.len()).map_err(|_| {
                TypecheckError::new(
                    TypecheckErrorKind::InvalidDeclaration,
                    decl.span,
                    "Too many module-level variables",
                )
            })?;
            self.declare_global(
                &decl.name,
                GlobalSymbol::Var {
                    slot,
                    ty: ty.clone(),
                    mutable: decl.mutable,
                },
            )?;
            self.global_names.push(name.to_string());
            if exported {
                self.exports
                    .push((name.to_string(), ExportTarget::Global(slot)));
                self.interface
                    .exports
                    .insert(name.to_string(), ExportedSymbol::Value(ty));
            }
            VarRef::Global(slot)
        } else {
            let slot = self.scope.declare(name, ty, kind, decl.name.span)?;
            VarRef::Local { depth: 0, slot }
        };
        Ok(TStmt::Let { target, value })
    }

    fn check_while(&mut self, stmt: &WhileStmt<'_>) -> Result<TStmt> {
        let cond = self.check_condition(stmt.condition, stmt.binding.as_ref())?;
        self.scope.enter_loop();
        let body = self.check_stmt_expr(stmt.body);
        self.scope.exit_loop();
        if stmt.binding.is_some() {
            self.scope.pop_scope();
        }
        Ok(TStmt::While { cond, body: body? })
    }

    fn check_for(&mut self, stmt: &ForStmt<'_>) -> Result<TStmt> {
        let iterable = self.check_expr(stmt.iterable, None)?;
        let Some(element) = iterable.ty.array_element().cloned() else {
            return Err(TypecheckError::new(
                TypecheckErrorKind::TypeMismatch,
                stmt.iterable.span(),
                format!("Cannot iterate over a value of type {}", iterable.ty),
            ));
        };
        if element.has_unknown() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::CannotInfer,
                stmt.iterable.span(),
                "Cannot infer the element type of an empty array",
            ));
        }

        self.scope.push_scope();
        let result = self.check_for_body(stmt, iterable, element);
        self.scope.pop_scope();
        result
    }

    fn check_for_body(&mut self, stmt: &ForStmt<'_>, iterable: TExpr, element: Type) -> Result<TStmt> {
        let array_slot = self.scope.allocate_hidden(stmt.span)?;
        let cursor_slot = self.scope.allocate_hidden(stmt.span)?;
        let item_slot = self
            .scope
            .declare(stmt.item.name, element, LocalKind::Val, stmt.item.span)?;
        let index_slot = stmt
            .index
            .map(|index| {
                self.scope
                    .declare(index.name, Type::Int, LocalKind::Val, index.span)
            })
            .transpose()?;

        self.scope.enter_loop();
        let body = self.check_stmt_expr(stmt.body);
        self.scope.exit_loop();

        Ok(TStmt::For {
            iterable,
            array_slot,
            cursor_slot,
            item_slot,
            index_slot,
            body: body?,
        })
    }

    // ==========================================================================
    // Functions
    // ==========================================================================

    fn hoisted_fid(&self, decl: &FuncDecl<'_>) -> Result<u32> {
        self.hoisted.get(&decl.span).copied().ok_or_else(|| {
            TypecheckError::new(
                TypecheckErrorKind::InvalidDeclaration,
                decl.span,
                format!("Function '{}' was not declared in this scope", decl.name.name),
            )
        })
    }

    /// Start checking a function body. Nested functions see the enclosing
    /// locals; top-level functions and methods only see module names.
    pub(super) fn enter_function(&mut self, nested: bool) -> Option<LocalScope> {
        if nested {
            let outer = std::mem::take(&mut self.scope);
            self.scope = LocalScope::nested(outer);
            None
        } else {
            Some(std::mem::replace(&mut self.scope, LocalScope::new()))
        }
    }

    pub(super) fn exit_function(&mut self, saved: Option<LocalScope>) {
        self.scope = match saved {
            Some(scope) => scope,
            None => self.scope.take_parent().unwrap_or_default(),
        };
    }

    /// Declare parameters in slots `0..n` (after the receiver), then check
    /// their defaults.
    pub(super) fn declare_params<'p, 'ast: 'p>(
        &mut self,
        params: impl Iterator<Item = &'p Param<'ast>>,
        sig: &FunctionSig,
    ) -> Result<Vec<TypedParam>> {
        let params: Vec<&Param<'_>> = params.collect();
        let mut typed = Vec::with_capacity(params.len());
        for (param, param_sig) in params.iter().zip(&sig.params) {
            let slot = self.scope.declare(
                param.name.name,
                param_sig.ty.clone(),
                LocalKind::Param,
                param.name.span,
            )?;
            typed.push(TypedParam {
                name: param.name.name.to_string(),
                slot,
                default: None,
            });
        }
        for ((param, param_sig), typed) in params.iter().zip(&sig.params).zip(typed.iter_mut()) {
            if let Some(default) = param.default {
                typed.default = Some(self.check_against(default, &param_sig.ty)?);
            }
        }
        Ok(typed)
    }

    /// Check the body of a declared function, method or nested function.
    ///
    /// A body already checked because of an earlier forward reference is
    /// left alone.
    fn check_function(
        &mut self,
        fid: u32,
        decl: &FuncDecl<'_>,
        receiver: Option<Type>,
        nested: bool,
    ) -> Result<()> {
        if !matches!(self.functions[fid as usize].function.body, FunctionBody::Pending) {
            return Ok(());
        }
        let sig = self.functions[fid as usize].sig.clone();
        let saved = self.enter_function(nested);
        self.checking.push(fid);
        let result = self.with_type_params(decl.type_params, |this| {
            this.check_function_body(decl, &sig, receiver)
        });
        self.checking.pop();
        let local_count = self.scope.frame_size();
        self.exit_function(saved);
        let (params, body, ret, discards) = result?;

        if let Some(owner) = self.bodies.get(&fid).and_then(|deferred| deferred.owner)
            && let Some(info) = self.registry.get_mut(owner)
            && let Some(method) = info.methods.iter_mut().find(|m| m.fid == fid)
        {
            method.sig.ret = Some(ret.clone());
        }

        let entry = &mut self.functions[fid as usize];
        entry.sig.ret = Some(ret);
        entry.function.params = params;
        entry.function.body = FunctionBody::Expr(body);
        entry.function.local_count = local_count;
        if discards {
            entry.function.flags |= FunctionFlags::DISCARDS_RESULT;
        }
        Ok(())
    }

    /// Check a module-level function or method out of source order, with
    /// only the type parameters of its declaration in scope.
    pub(super) fn check_deferred(&mut self, fid: u32, body: DeferredBody<'_>) -> Result<()> {
        let (outer, receiver) = match body.owner {
            Some(owner) => {
                let info = self.type_info(owner, body.decl.span)?;
                let receiver = body.decl.has_self().then(|| info.self_type());
                (info.type_params.clone(), receiver)
            }
            None => (Vec::new(), None),
        };
        let saved = std::mem::replace(&mut self.type_params, outer);
        let result = self.check_function(fid, body.decl, receiver, false);
        self.type_params = saved;
        result
    }

    fn check_function_body(
        &mut self,
        decl: &FuncDecl<'_>,
        sig: &FunctionSig,
        receiver: Option<Type>,
    ) -> Result<(Vec<TypedParam>, TExpr, Type, bool)> {
        let mut params = Vec::with_capacity(decl.params.len());
        if let Some(receiver) = receiver {
            let span = decl.params.first().map_or(decl.span, |p| p.span);
            let slot = self.scope.declare("self", receiver, LocalKind::Param, span)?;
            params.push(TypedParam {
                name: "self".to_string(),
                slot,
                default: None,
            });
        }
        params.extend(self.declare_params(decl.params.iter().filter(|p| !p.is_self), sig)?);

        match (&sig.ret, decl.return_type.is_some()) {
            (Some(Type::Unit), true) => {
                let body = self.check_expr(decl.body, None)?;
                Ok((params, body, Type::Unit, true))
            }
            (Some(ret), _) => {
                let body = self.check_expr(decl.body, Some(ret))?;
                if !ret.accepts(&body.ty) {
                    return Err(TypecheckError::mismatch(value_span(decl.body), ret, &body.ty));
                }
                Ok((params, body, ret.clone(), false))
            }
            (None, _) => {
                let body = self.check_expr(decl.body, None)?;
                if body.ty.has_unknown() {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::CannotInfer,
                        decl.name.span,
                        format!(
                            "Cannot infer the return type of '{}' from {}; add a return type annotation",
                            decl.name.name, body.ty
                        ),
                    ));
                }
                let ret = body.ty.clone();
                Ok((params, body, ret, false))
            }
        }
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    fn check_type_decl(&mut self, decl: &TypeDecl<'_>) -> Result<()> {
        let id = TypeId::of(&self.module, decl.name.name);
        let info = self.type_info(id, decl.name.span)?.clone();
        let TypeKind::Struct { fields, ctor } = &info.kind else {
            return Ok(());
        };

        self.with_type_params(decl.type_params, |this| {
            this.check_constructor(*ctor, decl.fields, fields, FunctionBody::Construct { type_id: id })?;
            this.check_methods(decl.methods, &info)
        })
    }

    fn check_enum_decl(&mut self, decl: &EnumDecl<'_>) -> Result<()> {
        let id = TypeId::of(&self.module, decl.name.name);
        let info = self.type_info(id, decl.name.span)?.clone();
        let TypeKind::Enum { variants } = &info.kind else {
            return Ok(());
        };

        for (index, (variant, variant_decl)) in variants.iter().zip(decl.variants).enumerate() {
            if let (Some(ctor), Some(fields), Some(field_decls)) =
                (variant.ctor, &variant.fields, variant_decl.fields)
            {
                self.check_constructor(
                    ctor,
                    field_decls,
                    fields,
                    FunctionBody::Variant {
                        type_id: id,
                        variant: index as u16,
                    },
                )?;
            }
        }
        self.check_methods(decl.methods, &info)
    }

    fn check_methods(&mut self, decls: &[FuncDecl<'_>], info: &TypeInfo) -> Result<()> {
        for decl in decls {
            let Some(method) = info.method(decl.name.name) else {
                continue;
            };
            let receiver = method.has_self.then(|| info.self_type());
            self.check_function(method.fid, decl, receiver, false)?;
        }
        Ok(())
    }

    /// A synthesized constructor: one parameter per field, with the field
    /// defaults as parameter defaults.
    fn check_constructor(
        &mut self,
        fid: u32,
        decls: &[FieldDecl<'_>],
        fields: &[FieldInfo],
        body: FunctionBody,
    ) -> Result<()> {
        let saved = self.enter_function(false);
        let result = self.check_constructor_params(decls, fields);
        let local_count = self.scope.frame_size();
        self.exit_function(saved);
        let params = result?;

        let function = &mut self.functions[fid as usize].function;
        function.params = params;
        function.body = body;
        function.local_count = local_count;
        Ok(())
    }

    fn check_constructor_params(
        &mut self,
        decls: &[FieldDecl<'_>],
        fields: &[FieldInfo],
    ) -> Result<Vec<TypedParam>> {
        let mut params = Vec::with_capacity(fields.len());
        for decl in decls {
            params.push(TypedParam {
                name: decl.name.name.to_string(),
                slot: self.scope.allocate_hidden(decl.span)?,
                default: None,
            });
        }
        for ((decl, field), param) in decls.iter().zip(fields).zip(params.iter_mut()) {
            if let Some(default) = decl.default {
                param.default = Some(self.check_against(default, &field.ty)?);
            }
        }
        Ok(params)
    }
}

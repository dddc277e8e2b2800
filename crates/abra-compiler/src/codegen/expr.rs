//! Expression lowering.

use abra_core::{CompileError, Type};

use super::{FunctionCompiler, Result, arg_count, count_u16, extern_index, function_id};
use crate::bytecode::OpCode;
use crate::emit::JumpLabel;
use crate::typeck::{AssignTarget, Callee, TArg, TBlock, TCall, TCond, TExpr, TExprKind};

impl FunctionCompiler<'_> {
    pub(super) fn expr(&mut self, expr: &TExpr) -> Result<()> {
        self.emitter.set_line(expr.span.line);
        match &expr.kind {
            TExprKind::Int(value) => self.emitter.emit_int(*value)?,
            TExprKind::Float(value) => self.emitter.emit_float(*value)?,
            TExprKind::Str(value) => self.emitter.emit_string(value)?,
            TExprKind::Bool(value) => self.emitter.emit_bool(*value),
            TExprKind::None => self.emitter.emit_none(),
            TExprKind::Unit => self.emitter.emit_unit(),
            TExprKind::Interpolation(parts) => {
                for part in parts {
                    self.expr(part)?;
                }
                self.emitter.emit_interpolate(count_u16(parts.len())?);
            }
            TExprKind::Array(elements) => {
                for element in elements {
                    self.expr(element)?;
                }
                self.emitter.emit_make_array(count_u16(elements.len())?);
            }
            TExprKind::Var(var) => self.load(*var)?,
            TExprKind::Function(fid) | TExprKind::Lambda(fid) => {
                self.emitter.emit_make_closure(function_id(*fid)?);
            }
            TExprKind::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emitter.set_line(expr.span.line);
                self.emitter.emit(*op);
            }
            TExprKind::And(left, right) => self.short_circuit(left, right, OpCode::JumpIfFalseKeep)?,
            TExprKind::Or(left, right) => self.short_circuit(left, right, OpCode::JumpIfTrueKeep)?,
            TExprKind::Coalesce(left, right) => {
                self.short_circuit(left, right, OpCode::JumpIfSomeKeep)?;
            }
            TExprKind::Unary { op, operand } => {
                self.expr(operand)?;
                self.emitter.emit(*op);
            }
            TExprKind::Assign { target, op, value } => self.assign(target, *op, value)?,
            TExprKind::Call(call) => self.call(call, &expr.ty)?,
            TExprKind::Index { object, index } => {
                self.expr(object)?;
                self.expr(index)?;
                self.emitter.emit(OpCode::Index);
            }
            TExprKind::Field {
                object,
                index,
                optional,
            } => {
                self.expr(object)?;
                if *optional {
                    self.jump_over(OpCode::JumpIfNoneKeep, |this| {
                        this.emitter.emit_get_field(*index);
                        Ok(())
                    })?;
                } else {
                    self.emitter.emit_get_field(*index);
                }
            }
            TExprKind::Block(block) => self.block(block)?,
            TExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_expr(cond, then_branch, else_branch.as_deref(), &expr.ty)?,
            TExprKind::Variant { type_id, variant } => {
                self.emitter.emit_make_variant(*type_id, *variant, 0)?;
            }
        }
        Ok(())
    }

    /// `left` stays as the result when `jump` is taken; otherwise it is
    /// replaced by `right`.
    fn short_circuit(&mut self, left: &TExpr, right: &TExpr, jump: OpCode) -> Result<()> {
        self.expr(left)?;
        self.jump_over(jump, |this| {
            this.emitter.emit_pop();
            this.expr(right)
        })
    }

    pub(super) fn block(&mut self, block: &TBlock) -> Result<()> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        match &block.tail {
            Some(tail) => self.expr(tail),
            None => {
                self.emitter.emit_unit();
                Ok(())
            }
        }
    }

    /// Emit a condition. Returns the jump taken when it fails; for a binding
    /// the failed path still holds the `None` that was tested.
    pub(super) fn condition(&mut self, cond: &TCond) -> Result<JumpLabel> {
        match cond {
            TCond::Bool(value) => {
                self.expr(value)?;
                Ok(self.emitter.emit_jump(OpCode::JumpIfFalse))
            }
            TCond::Bind { value, slot } => {
                self.expr(value)?;
                let failed = self.emitter.emit_jump(OpCode::JumpIfNoneKeep);
                self.emitter.emit_set_local(*slot);
                Ok(failed)
            }
        }
    }

    fn if_expr(
        &mut self,
        cond: &TCond,
        then_branch: &TExpr,
        else_branch: Option<&TExpr>,
        ty: &Type,
    ) -> Result<()> {
        let failed = self.condition(cond)?;
        self.expr_as(then_branch, ty)?;
        let end = self.emitter.emit_jump(OpCode::Jump);

        self.emitter.patch_jump(failed)?;
        if matches!(cond, TCond::Bind { .. }) {
            self.emitter.emit_pop();
        }
        match else_branch {
            Some(branch) => self.expr_as(branch, ty)?,
            None if ty.is_unit() => self.emitter.emit_unit(),
            None => self.emitter.emit_none(),
        }
        self.emitter.patch_jump(end)
    }

    fn assign(&mut self, target: &AssignTarget, op: Option<OpCode>, value: &TExpr) -> Result<()> {
        match target {
            AssignTarget::Var(var) => {
                if let Some(op) = op {
                    self.load(*var)?;
                    self.expr(value)?;
                    self.emitter.emit(op);
                } else {
                    self.expr(value)?;
                }
                self.emitter.emit_dup();
                self.store(*var)
            }
            AssignTarget::Field { object, index } => {
                self.expr(object)?;
                if let Some(op) = op {
                    self.emitter.emit_dup();
                    self.emitter.emit_get_field(*index);
                    self.expr(value)?;
                    self.emitter.emit(op);
                } else {
                    self.expr(value)?;
                }
                self.emitter.emit_set_field(*index);
                Ok(())
            }
            AssignTarget::Index { object, index } => {
                self.expr(object)?;
                self.expr(index)?;
                let Some(op) = op else {
                    self.expr(value)?;
                    self.emitter.emit(OpCode::SetIndex);
                    return Ok(());
                };

                self.emitter.emit(OpCode::Dup2);
                self.emitter.emit(OpCode::Index);
                let absent = self.emitter.emit_jump(OpCode::JumpIfNoneKeep);
                self.expr(value)?;
                self.emitter.emit(op);
                self.emitter.emit(OpCode::SetIndex);
                let end = self.emitter.emit_jump(OpCode::Jump);

                // Drop the missing element, the index and the array.
                self.emitter.patch_jump(absent)?;
                self.emitter.emit_pop();
                self.emitter.emit_pop();
                self.emitter.emit_pop();
                self.emitter.emit_none();
                self.emitter.patch_jump(end)
            }
        }
    }

    fn call(&mut self, call: &TCall, ty: &Type) -> Result<()> {
        // The callee value or the receiver goes below the arguments. A `?.`
        // call skips everything after it when it is None.
        let absent = match (&call.callee, &call.receiver) {
            (Callee::Value(callee), _) if call.optional => {
                let TExprKind::Field { object, index, .. } = &callee.kind else {
                    return Err(CompileError::Internal(
                        "optional call through a value that is not a field".to_string(),
                    ));
                };
                self.expr(object)?;
                let absent = self.emitter.emit_jump(OpCode::JumpIfNoneKeep);
                self.emitter.emit_get_field(*index);
                Some(absent)
            }
            (Callee::Value(callee), _) => {
                self.expr(callee)?;
                None
            }
            (_, Some(receiver)) => {
                self.expr(receiver)?;
                call.optional
                    .then(|| self.emitter.emit_jump(OpCode::JumpIfNoneKeep))
            }
            (_, None) => None,
        };

        for arg in &call.args {
            match arg {
                TArg::Value(value) => self.expr(value)?,
                TArg::Omitted => self.emitter.emit(OpCode::PushUnset),
            }
        }

        let argc = arg_count(call.args.len() + usize::from(call.receiver.is_some()))?;
        match &call.callee {
            Callee::Direct(fid) => self.emitter.emit_call(function_id(*fid)?, argc),
            Callee::Extern(index) => self.emitter.emit_call_external(extern_index(*index)?, argc),
            Callee::Builtin(builtin) => self.emitter.emit_call_builtin((*builtin).into(), argc),
            Callee::Value(_) => self.emitter.emit_call_value(argc),
        }

        if let Some(absent) = absent {
            let end = self.emitter.emit_jump(OpCode::Jump);
            self.emitter.patch_jump(absent)?;
            if ty.is_unit() {
                self.emitter.emit_pop();
                self.emitter.emit_unit();
            }
            self.emitter.patch_jump(end)?;
        }
        Ok(())
    }
}


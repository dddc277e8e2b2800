//! Statement lowering.

use super::{FunctionCompiler, Result, function_id};
use crate::bytecode::OpCode;
use crate::typeck::{TCond, TExpr, TStmt};

impl FunctionCompiler<'_> {
    pub(super) fn stmt(&mut self, stmt: &TStmt) -> Result<()> {
        match stmt {
            TStmt::Expr(expr) => {
                self.expr(expr)?;
                self.emitter.emit_pop();
            }
            TStmt::Let { target, value } => {
                match value {
                    Some(value) => self.expr(value)?,
                    None => self.emitter.emit_none(),
                }
                self.store(*target)?;
            }
            TStmt::Func { slot, fid } => {
                self.emitter.emit_make_closure(function_id(*fid)?);
                self.emitter.emit_set_local(*slot);
            }
            TStmt::While { cond, body } => self.while_loop(cond, body)?,
            TStmt::For {
                iterable,
                array_slot,
                cursor_slot,
                item_slot,
                index_slot,
                body,
            } => {
                self.expr(iterable)?;
                self.emitter.emit_set_local(*array_slot);
                self.emitter.emit_int(0)?;
                self.emitter.emit_set_local(*cursor_slot);
                self.for_loop(*array_slot, *cursor_slot, *item_slot, *index_slot, body)?;
            }
            TStmt::Break => self.emitter.emit_break()?,
            TStmt::Continue => self.emitter.emit_continue()?,
        }
        Ok(())
    }

    fn while_loop(&mut self, cond: &TCond, body: &TExpr) -> Result<()> {
        let start = self.emitter.current_offset();
        let exit = self.condition(cond)?;

        self.emitter.enter_loop(Some(start));
        self.expr(body)?;
        self.emitter.emit_pop();
        self.emitter.emit_loop(start)?;

        self.emitter.patch_jump(exit)?;
        if matches!(cond, TCond::Bind { .. }) {
            self.emitter.emit_pop();
        }
        self.emitter.exit_loop()
    }

    /// The array and a zero cursor are already stored in their slots.
    fn for_loop(
        &mut self,
        array: u16,
        cursor: u16,
        item: u16,
        index: Option<u16>,
        body: &TExpr,
    ) -> Result<()> {
        let start = self.emitter.current_offset();
        self.emitter.emit_get_local(cursor);
        self.emitter.emit_get_local(array);
        self.emitter.emit(OpCode::ArrayLen);
        self.emitter.emit(OpCode::LtInt);
        let exit = self.emitter.emit_jump(OpCode::JumpIfFalse);

        self.emitter.emit_get_local(array);
        self.emitter.emit_get_local(cursor);
        self.emitter.emit(OpCode::Index);
        self.emitter.emit_set_local(item);
        if let Some(index) = index {
            self.emitter.emit_get_local(cursor);
            self.emitter.emit_set_local(index);
        }

        self.emitter.enter_loop(None);
        self.expr(body)?;
        self.emitter.emit_pop();

        self.emitter.bind_continues()?;
        self.emitter.emit_get_local(cursor);
        self.emitter.emit_int(1)?;
        self.emitter.emit(OpCode::AddInt);
        self.emitter.emit_set_local(cursor);
        self.emitter.emit_loop(start)?;

        self.emitter.patch_jump(exit)?;
        self.emitter.exit_loop()
    }
}

//! Bytecode emitter for the Abra compiler.
//!
//! The [`BytecodeEmitter`] provides a high-level API for generating bytecode,
//! handling constants, jumps, and loop control flow.
//!
//! # Example
//!
//! ```
//! use abra_compiler::bytecode::{ConstantPool, OpCode};
//! use abra_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//!
//! emitter.set_line(1);
//! emitter.emit_int(42).unwrap();
//! emitter.emit_int(10).unwrap();
//! emitter.emit(OpCode::AddInt);
//!
//! let chunk = emitter.finish();
//! assert_eq!(chunk.opcodes(), vec![OpCode::Constant, OpCode::Constant, OpCode::AddInt]);
//! ```

mod jumps;

use abra_core::{CompileError, TypeId};

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
pub use jumps::ContinueTarget;
use jumps::JumpManager;

/// Emits bytecode instructions.
///
/// Uses a shared module-level constant pool for deduplication across functions.
/// Each `BytecodeEmitter` produces bytecode for a single function.
pub struct BytecodeEmitter<'pool> {
    /// The bytecode chunk being built (per-function)
    chunk: BytecodeChunk,

    /// Shared module-level constant pool (deduplicated)
    constants: &'pool mut ConstantPool,

    /// Jump management for control flow
    jumps: JumpManager,

    /// Current source line for debug info
    current_line: u32,
}

impl<'pool> BytecodeEmitter<'pool> {
    /// Create a new bytecode emitter.
    ///
    /// # Arguments
    /// * `constants` - The shared module-level constant pool
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            jumps: JumpManager::new(),
            current_line: 1,
        }
    }

    /// Set current source line for debug info.
    ///
    /// All subsequent instructions will be associated with this line number.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    /// Get current source line.
    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Emit a single opcode with no operands.
    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    /// Emit opcode with 8-bit operand.
    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    /// Emit opcode with 16-bit operand.
    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    /// Write a trailing 8-bit operand for the previous instruction.
    pub fn emit_operand_byte(&mut self, byte: u8) {
        self.chunk.write_byte(byte, self.current_line);
    }

    /// Write a trailing 16-bit operand for the previous instruction.
    pub fn emit_operand_u16(&mut self, value: u16) {
        self.chunk.write_u16(value, self.current_line);
    }

    /// Add a constant to the shared pool, checking the operand range.
    pub fn add_constant(&mut self, constant: Constant) -> Result<u16, CompileError> {
        let index = self.constants.add(constant);
        u16::try_from(index).map_err(|_| CompileError::TooManyConstants {
            module: String::new(),
        })
    }

    /// Emit a constant load instruction.
    ///
    /// Constants are added to the shared module pool (deduplicated).
    pub fn emit_constant(&mut self, constant: Constant) -> Result<(), CompileError> {
        let index = self.add_constant(constant)?;
        self.emit_u16(OpCode::Constant, index);
        Ok(())
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Emit an integer constant.
    pub fn emit_int(&mut self, value: i64) -> Result<(), CompileError> {
        self.emit_constant(Constant::Int(value))
    }

    /// Emit a float constant.
    pub fn emit_float(&mut self, value: f64) -> Result<(), CompileError> {
        self.emit_constant(Constant::Float(value))
    }

    /// Emit a string constant.
    pub fn emit_string(&mut self, value: &str) -> Result<(), CompileError> {
        self.emit_constant(Constant::Str(value.to_string()))
    }

    /// Emit boolean.
    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    /// Emit the absent value.
    pub fn emit_none(&mut self) {
        self.emit(OpCode::PushNone);
    }

    /// Emit the unit value.
    pub fn emit_unit(&mut self) {
        self.emit(OpCode::PushUnit);
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    /// Emit get local variable.
    pub fn emit_get_local(&mut self, slot: u16) {
        self.emit_u16(OpCode::GetLocal, slot);
    }

    /// Emit set local variable.
    pub fn emit_set_local(&mut self, slot: u16) {
        self.emit_u16(OpCode::SetLocal, slot);
    }

    /// Emit access to a variable `depth` functions out.
    pub fn emit_get_upvalue(&mut self, depth: u8, slot: u16) {
        self.emit_byte(OpCode::GetUpvalue, depth);
        self.chunk.write_u16(slot, self.current_line);
    }

    /// Emit store to a variable `depth` functions out.
    pub fn emit_set_upvalue(&mut self, depth: u8, slot: u16) {
        self.emit_byte(OpCode::SetUpvalue, depth);
        self.chunk.write_u16(slot, self.current_line);
    }

    /// Emit get module global.
    pub fn emit_get_global(&mut self, slot: u16) {
        self.emit_u16(OpCode::GetGlobal, slot);
    }

    /// Emit set module global.
    pub fn emit_set_global(&mut self, slot: u16) {
        self.emit_u16(OpCode::SetGlobal, slot);
    }

    /// Emit load of another module's export.
    pub fn emit_get_external(&mut self, index: u16) {
        self.emit_u16(OpCode::GetExternal, index);
    }

    // ==========================================================================
    // Function Calls
    // ==========================================================================

    /// Emit a direct call to a function of this module.
    pub fn emit_call(&mut self, function: u16, arg_count: u8) {
        self.emit_u16(OpCode::Call, function);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    /// Emit a call to a function exported by another module.
    pub fn emit_call_external(&mut self, index: u16, arg_count: u8) {
        self.emit_u16(OpCode::CallExternal, index);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    /// Emit a call through a closure value.
    pub fn emit_call_value(&mut self, arg_count: u8) {
        self.emit_byte(OpCode::CallValue, arg_count);
    }

    /// Emit a builtin call.
    pub fn emit_call_builtin(&mut self, builtin: u8, arg_count: u8) {
        self.emit_byte(OpCode::CallBuiltin, builtin);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    /// Emit closure creation.
    pub fn emit_make_closure(&mut self, function: u16) {
        self.emit_u16(OpCode::MakeClosure, function);
    }

    /// Emit return with value.
    pub fn emit_return(&mut self) {
        self.emit(OpCode::Return);
    }

    // ==========================================================================
    // Jumps and Control Flow
    // ==========================================================================

    /// Emit a forward jump (target unknown).
    ///
    /// Returns a label that must be patched later with [`patch_jump`](Self::patch_jump).
    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        JumpLabel(self.chunk.emit_jump(op, self.current_line))
    }

    /// Emit the default-argument guard for a parameter slot.
    pub fn emit_jump_if_arg_present(&mut self, slot: u16) -> JumpLabel {
        self.emit_u16(OpCode::JumpIfArgPresent, slot);
        let offset = self.chunk.current_offset();
        self.chunk.write_u16(0xFFFF, self.current_line); // Placeholder
        JumpLabel(offset)
    }

    /// Patch a forward jump to the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) -> Result<(), CompileError> {
        self.chunk.patch_jump(label.0)
    }

    /// Emit a backward jump (for loops).
    ///
    /// # Arguments
    /// * `target` - The bytecode offset to jump back to
    pub fn emit_loop(&mut self, target: usize) -> Result<(), CompileError> {
        self.chunk.emit_loop(target, self.current_line)
    }

    /// Get current bytecode offset.
    ///
    /// Used to mark loop targets before emitting loop body.
    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Loop Control (Break/Continue)
    // ==========================================================================

    /// Enter a loop context.
    ///
    /// Call this at the start of a loop, before emitting the loop body.
    /// Pass `None` when continue statements jump forward, then call
    /// [`bind_continues`](Self::bind_continues) at the continue point.
    pub fn enter_loop(&mut self, continue_target: Option<usize>) {
        self.jumps.enter_loop(continue_target);
    }

    /// Patch pending forward continue jumps to the current position.
    pub fn bind_continues(&mut self) -> Result<(), CompileError> {
        for label in self.jumps.take_continues() {
            self.patch_jump(label)?;
        }
        Ok(())
    }

    /// Exit a loop context.
    ///
    /// Patches all break jumps to the current position.
    /// Call this after the loop body and any backward jump.
    pub fn exit_loop(&mut self) -> Result<(), CompileError> {
        for label in self.jumps.exit_loop() {
            self.patch_jump(label)?;
        }
        Ok(())
    }

    /// Emit a break statement.
    pub fn emit_break(&mut self) -> Result<(), BreakError> {
        if !self.jumps.in_loop() {
            return Err(BreakError::NotInLoop);
        }
        let label = self.emit_jump(OpCode::Jump);
        self.jumps.add_break(label);
        Ok(())
    }

    /// Emit a continue statement.
    pub fn emit_continue(&mut self) -> Result<(), BreakError> {
        match self.jumps.continue_target()? {
            ContinueTarget::Backward(target) => self
                .emit_loop(target)
                .map_err(|_| BreakError::TooFar),
            ContinueTarget::Forward => {
                let label = self.emit_jump(OpCode::Jump);
                self.jumps.add_continue(label);
                Ok(())
            }
        }
    }

    /// Check if currently inside a loop.
    pub fn in_loop(&self) -> bool {
        self.jumps.in_loop()
    }

    // ==========================================================================
    // Arrays and Objects
    // ==========================================================================

    /// Emit array construction from the top `count` values.
    pub fn emit_make_array(&mut self, count: u16) {
        self.emit_u16(OpCode::MakeArray, count);
    }

    /// Emit instance construction from the top `field_count` values.
    pub fn emit_make_instance(&mut self, type_id: TypeId, field_count: u8) -> Result<(), CompileError> {
        let index = self.add_constant(Constant::Type(type_id))?;
        self.emit_u16(OpCode::MakeInstance, index);
        self.chunk.write_byte(field_count, self.current_line);
        Ok(())
    }

    /// Emit enum variant construction from the top `field_count` values.
    pub fn emit_make_variant(
        &mut self,
        type_id: TypeId,
        variant: u16,
        field_count: u8,
    ) -> Result<(), CompileError> {
        let index = self.add_constant(Constant::Type(type_id))?;
        self.emit_u16(OpCode::MakeVariant, index);
        self.chunk.write_u16(variant, self.current_line);
        self.chunk.write_byte(field_count, self.current_line);
        Ok(())
    }

    /// Emit field access.
    pub fn emit_get_field(&mut self, field_index: u16) {
        self.emit_u16(OpCode::GetField, field_index);
    }

    /// Emit field assignment.
    pub fn emit_set_field(&mut self, field_index: u16) {
        self.emit_u16(OpCode::SetField, field_index);
    }

    /// Emit string interpolation of the top `count` values.
    pub fn emit_interpolate(&mut self, count: u16) {
        self.emit_u16(OpCode::Interpolate, count);
    }

    // ==========================================================================
    // Stack Operations
    // ==========================================================================

    /// Emit pop (discard top of stack).
    pub fn emit_pop(&mut self) {
        self.emit(OpCode::Pop);
    }

    /// Emit duplicate top of stack.
    pub fn emit_dup(&mut self) {
        self.emit(OpCode::Dup);
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finish and return the bytecode chunk.
    pub fn finish(self) -> BytecodeChunk {
        self.chunk
    }

    /// Get current chunk size (for debugging).
    pub fn code_size(&self) -> usize {
        self.chunk.len()
    }
}

/// A label for a forward jump that needs patching.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel(pub(crate) usize);

impl JumpLabel {
    /// Get the bytecode offset this label points to.
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// Error from break/continue statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakError {
    /// Break or continue used outside of a loop.
    NotInLoop,
    /// The loop body is too large for a backward jump.
    TooFar,
}

impl std::fmt::Display for BreakError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakError::NotInLoop => write!(f, "loop control statement not inside a loop"),
            BreakError::TooFar => write!(f, "loop body too large"),
        }
    }
}

impl std::error::Error for BreakError {}

impl From<BreakError> for CompileError {
    fn from(error: BreakError) -> Self {
        CompileError::Internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_basic_opcodes() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);

        emitter.emit_unit();
        emitter.emit_pop();
        emitter.emit_return();

        emitter
            .finish()
            .assert_opcodes(&[OpCode::PushUnit, OpCode::Pop, OpCode::Return]);
    }

    #[test]
    fn constants_are_shared_and_deduplicated() {
        let mut constants = ConstantPool::new();
        {
            let mut first = BytecodeEmitter::new(&mut constants);
            first.emit_int(7).unwrap();
            first.emit_string("hi").unwrap();
        }
        {
            let mut second = BytecodeEmitter::new(&mut constants);
            second.emit_int(7).unwrap();
        }
        assert_eq!(constants.len(), 2);
    }

    #[test]
    fn line_tracking() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);

        emitter.set_line(1);
        emitter.emit_unit();
        emitter.set_line(5);
        emitter.emit_pop();

        let chunk = emitter.finish();
        assert_eq!(chunk.line_at(0), Some(1));
        assert_eq!(chunk.line_at(1), Some(5));
    }

    #[test]
    fn forward_jump() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);

        emitter.emit_bool(true);
        let label = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit_unit();
        emitter.emit_pop();
        emitter.patch_jump(label).unwrap();

        let chunk = emitter.finish();
        assert_eq!(chunk.read_u16(label.offset()), Some(2));
    }

    #[test]
    fn while_loop_with_break_and_continue() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);

        let start = emitter.current_offset();
        emitter.enter_loop(Some(start));
        emitter.emit_bool(true);
        let exit = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit_continue().unwrap();
        emitter.emit_break().unwrap();
        emitter.emit_loop(start).unwrap();
        emitter.patch_jump(exit).unwrap();
        emitter.exit_loop().unwrap();

        emitter.finish().assert_opcodes(&[
            OpCode::PushTrue,
            OpCode::JumpIfFalse,
            OpCode::Loop,
            OpCode::Jump,
            OpCode::Loop,
        ]);
    }

    #[test]
    fn forward_continue_is_bound_later() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);

        emitter.enter_loop(None);
        emitter.emit_continue().unwrap();
        let label_offset = 1;
        emitter.emit_unit();
        emitter.bind_continues().unwrap();
        emitter.exit_loop().unwrap();

        let chunk = emitter.finish();
        assert_eq!(chunk.read_op(0), Some(OpCode::Jump));
        assert_eq!(chunk.read_u16(label_offset), Some(1));
    }

    #[test]
    fn break_outside_loop() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        assert_eq!(emitter.emit_break(), Err(BreakError::NotInLoop));
        assert_eq!(emitter.emit_continue(), Err(BreakError::NotInLoop));
    }

    #[test]
    fn operand_layouts() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_get_upvalue(2, 300);
        emitter.emit_call(4, 3);
        emitter
            .emit_make_variant(TypeId::of("main", "Color"), 1, 0)
            .unwrap();

        let chunk = emitter.finish();
        assert_eq!(chunk.read_byte(1), Some(2));
        assert_eq!(chunk.read_u16(2), Some(300));
        assert_eq!(chunk.read_u16(5), Some(4));
        assert_eq!(chunk.read_byte(7), Some(3));
        assert_eq!(chunk.read_u16(11), Some(1));
        assert_eq!(chunk.len(), 14);
    }
}

//! Bytecode chunk for compiled functions.
//!
//! A `BytecodeChunk` contains the compiled bytecode for a single function,
//! along with line number information for debugging. A module's function
//! chunks are concatenated into one chunk by the code generator.

use abra_core::CompileError;

use super::OpCode;

/// A chunk of compiled bytecode.
///
/// Constants are stored at module level in a `ConstantPool`, not per-function.
/// This allows deduplication of constants across functions.
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    /// The bytecode instructions.
    code: Vec<u8>,
    /// Line numbers for debugging (parallel to code).
    /// Each entry corresponds to a byte in `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    /// Create a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bytecode chunk with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
            lines: Vec::with_capacity(capacity),
        }
    }

    /// Write an opcode.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    /// Write a byte operand.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        self.code.push((value >> 8) as u8);
        self.lines.push(line);
        self.code.push(value as u8);
        self.lines.push(line);
    }

    /// Append another chunk, returning the offset it starts at.
    pub fn append(&mut self, other: &BytecodeChunk) -> usize {
        let start = self.code.len();
        self.code.extend_from_slice(&other.code);
        self.lines.extend_from_slice(&other.lines);
        start
    }

    /// Get current code offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a jump instruction and return the offset to patch later.
    ///
    /// The jump offset is initialized to 0xFFFF as a placeholder.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_u16(0xFFFF, line); // Placeholder
        offset
    }

    /// Patch the u16 operand at `offset` to jump to the current position.
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), CompileError> {
        let jump_distance = self.code.len() - offset - 2;
        if jump_distance > u16::MAX as usize {
            return Err(CompileError::JumpTooFar { offset: jump_distance });
        }
        self.code[offset] = (jump_distance >> 8) as u8;
        self.code[offset + 1] = jump_distance as u8;
        Ok(())
    }

    /// Emit a loop instruction that jumps back to the given offset.
    pub fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), CompileError> {
        self.write_op(OpCode::Loop, line);

        // +2 for the operand bytes we're about to write
        let offset = self.code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            return Err(CompileError::JumpTooFar { offset });
        }
        self.write_u16(offset as u16, line);
        Ok(())
    }

    /// Get the bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Get the line numbers.
    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    /// Get the line number for a given offset.
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    /// Get the length of the bytecode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Read a byte at the given offset.
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        if offset + 1 < self.code.len() {
            Some(((self.code[offset] as u16) << 8) | (self.code[offset + 1] as u16))
        } else {
            None
        }
    }

    /// Read an opcode at the given offset.
    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Extract the opcodes in `range`, skipping operands.
    ///
    /// This is useful for testing bytecode sequences without worrying about
    /// specific operand values or instruction offsets.
    pub fn opcodes_in(&self, range: std::ops::Range<usize>) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = range.start;

        while offset < range.end.min(self.code.len()) {
            if let Some(op) = self.read_op(offset) {
                ops.push(op);
                offset += 1 + op.operand_size();
            } else {
                // Invalid opcode, skip one byte
                offset += 1;
            }
        }

        ops
    }

    /// Extract all opcodes from the chunk, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.opcodes_in(0..self.code.len())
    }

    /// Check if this chunk contains exactly the given opcode sequence.
    ///
    /// This ignores operand values, only checking the opcodes themselves.
    /// Panics with a descriptive message if the sequences don't match.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Check if this chunk contains the given opcodes (in order, but not necessarily contiguous).
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();

        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }

        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty() {
        let chunk = BytecodeChunk::new();
        assert!(chunk.is_empty());
        assert_eq!(chunk.len(), 0);
    }

    #[test]
    fn write_op_and_operand() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_u16(0x1234, 1);

        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.read_op(0), Some(OpCode::Constant));
        assert_eq!(chunk.read_u16(1), Some(0x1234));
        assert_eq!(chunk.line_at(2), Some(1));
    }

    #[test]
    fn emit_and_patch_jump() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushTrue, 1);

        let jump_offset = chunk.emit_jump(OpCode::JumpIfFalse, 2);
        chunk.write_op(OpCode::PushUnit, 3);
        chunk.write_op(OpCode::Pop, 3);
        chunk.patch_jump(jump_offset).unwrap();

        // The jump should skip over PushUnit and Pop (2 bytes)
        assert_eq!(chunk.read_u16(jump_offset), Some(2));
    }

    #[test]
    fn emit_loop() {
        let mut chunk = BytecodeChunk::new();

        let loop_start = chunk.current_offset();
        chunk.write_op(OpCode::PushUnit, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.emit_loop(loop_start, 2).unwrap();

        assert_eq!(chunk.len(), 5);
        assert_eq!(chunk.read_op(2), Some(OpCode::Loop));
        // Jump back over the body (2) and the loop instruction itself (3)
        assert_eq!(chunk.read_u16(3), Some(5));
    }

    #[test]
    fn jump_too_far_is_an_error() {
        let mut chunk = BytecodeChunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..=u16::MAX as usize {
            chunk.write_op(OpCode::Pop, 1);
        }
        assert!(matches!(chunk.patch_jump(jump), Err(CompileError::JumpTooFar { .. })));
    }

    #[test]
    fn append_returns_start_offset() {
        let mut module = BytecodeChunk::new();
        module.write_op(OpCode::Return, 1);

        let mut function = BytecodeChunk::new();
        function.write_op(OpCode::PushUnit, 4);
        function.write_op(OpCode::Return, 4);

        assert_eq!(module.append(&function), 1);
        assert_eq!(module.len(), 3);
        assert_eq!(module.line_at(1), Some(4));
    }

    #[test]
    fn opcodes_skip_operands() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Call, 1);
        chunk.write_u16(3, 1);
        chunk.write_byte(2, 1);
        chunk.write_op(OpCode::GetLocal, 1);
        chunk.write_u16(0, 1);
        chunk.write_op(OpCode::Return, 1);

        chunk.assert_opcodes(&[OpCode::Call, OpCode::GetLocal, OpCode::Return]);
        assert_eq!(chunk.opcodes_in(4..chunk.len()), vec![OpCode::GetLocal, OpCode::Return]);
    }

    #[test]
    #[should_panic(expected = "Missing opcodes")]
    fn assert_contains_opcodes_failure() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushTrue, 1);
        chunk.assert_contains_opcodes(&[OpCode::PushTrue, OpCode::SubInt]);
    }
}

//! Bytecode operation codes.
//!
//! This module defines the instruction set for the Abra VM.
//! Each opcode is a single byte, with operands following inline
//! (multi-byte operands are big-endian).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// The VM is a stack-based machine. Most operations pop operands
/// from the current frame's stack and push results back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool.
    /// Operand: u16 constant index
    Constant = 0,
    /// Push the absent value.
    PushNone,
    /// Push the unit value.
    PushUnit,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push the marker for an omitted argument.
    PushUnset,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Pop top of stack.
    Pop,
    /// Duplicate top of stack.
    Dup,
    /// Duplicate the top two stack values, keeping their order.
    Dup2,

    // =========================================================================
    // Variables
    // =========================================================================
    /// Load local variable.
    /// Operand: u16 slot
    GetLocal,
    /// Pop and store to local variable.
    /// Operand: u16 slot
    SetLocal,
    /// Load a variable of an enclosing function.
    /// Operands: u8 depth, u16 slot
    GetUpvalue,
    /// Pop and store to a variable of an enclosing function.
    /// Operands: u8 depth, u16 slot
    SetUpvalue,
    /// Load module global.
    /// Operand: u16 global slot
    GetGlobal,
    /// Pop and store to module global.
    /// Operand: u16 global slot
    SetGlobal,
    /// Load a symbol exported by another module.
    /// Operand: u16 extern index
    GetExternal,
    /// Skip a default-argument initializer when the argument was supplied.
    /// Operands: u16 slot, u16 forward offset
    JumpIfArgPresent,

    // =========================================================================
    // Arithmetic (Int, wrapping)
    // =========================================================================
    AddInt,
    SubInt,
    MulInt,
    /// Traps on a zero divisor.
    DivInt,
    /// Traps on a zero divisor.
    ModInt,
    NegInt,

    // =========================================================================
    // Arithmetic (Float, IEEE)
    // =========================================================================
    AddFloat,
    SubFloat,
    MulFloat,
    DivFloat,
    ModFloat,
    NegFloat,

    /// Concatenate a string with the stringified top of stack.
    Concat,

    // =========================================================================
    // Comparisons (produce Bool)
    // =========================================================================
    /// Structural equality.
    Eq,
    /// Structural inequality.
    Neq,
    LtInt,
    LeInt,
    GtInt,
    GeInt,
    LtFloat,
    LeFloat,
    GtFloat,
    GeFloat,
    /// Logical NOT.
    Not,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional forward jump.
    /// Operand: u16 offset
    Jump,
    /// Pop; jump if false.
    /// Operand: u16 offset
    JumpIfFalse,
    /// Jump if top of stack is false, leaving it in place.
    /// Operand: u16 offset
    JumpIfFalseKeep,
    /// Jump if top of stack is true, leaving it in place.
    /// Operand: u16 offset
    JumpIfTrueKeep,
    /// Pop; jump if the value was None.
    /// Operand: u16 offset
    JumpIfNone,
    /// Jump if top of stack is None, leaving it in place.
    /// Operand: u16 offset
    JumpIfNoneKeep,
    /// Jump if top of stack is present, leaving it in place.
    /// Operand: u16 offset
    JumpIfSomeKeep,
    /// Backward jump.
    /// Operand: u16 offset
    Loop,

    // =========================================================================
    // Functions
    // =========================================================================
    /// Call a function of the current module.
    /// Operands: u16 function id, u8 argument count
    Call,
    /// Call a function exported by another module.
    /// Operands: u16 extern index, u8 argument count
    CallExternal,
    /// Call the closure below the arguments.
    /// Operand: u8 argument count
    CallValue,
    /// Call a builtin.
    /// Operands: u8 builtin id, u8 argument count
    CallBuiltin,
    /// Return top of stack to the caller.
    Return,
    /// Create a closure over the current environment.
    /// Operand: u16 function id
    MakeClosure,

    // =========================================================================
    // Arrays
    // =========================================================================
    /// Pop N values into a new array.
    /// Operand: u16 count
    MakeArray,
    /// Pop index and array; push the element or None.
    Index,
    /// Pop value, index and array; store when the index is in range.
    /// Pushes the value back.
    SetIndex,
    /// Pop an array; push its length.
    ArrayLen,

    // =========================================================================
    // Objects
    // =========================================================================
    /// Pop N field values into a new instance.
    /// Operands: u16 type constant, u8 field count
    MakeInstance,
    /// Pop an instance; push one of its fields.
    /// Operand: u16 field index
    GetField,
    /// Pop value and instance; store the field and push the value back.
    /// Operand: u16 field index
    SetField,
    /// Pop N payload values into a new enum variant.
    /// Operands: u16 type constant, u16 variant index, u8 field count
    MakeVariant,
    /// Pop N values; push their concatenated string forms.
    /// Operand: u16 count
    Interpolate,
}

impl OpCode {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Get the size of operands for this opcode in bytes.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::CallValue => 1,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetExternal
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfFalseKeep
            | OpCode::JumpIfTrueKeep
            | OpCode::JumpIfNone
            | OpCode::JumpIfNoneKeep
            | OpCode::JumpIfSomeKeep
            | OpCode::Loop
            | OpCode::CallBuiltin
            | OpCode::MakeClosure
            | OpCode::MakeArray
            | OpCode::GetField
            | OpCode::SetField
            | OpCode::Interpolate => 2,

            OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::Call
            | OpCode::CallExternal
            | OpCode::MakeInstance => 3,

            OpCode::JumpIfArgPresent => 4,

            OpCode::MakeVariant => 5,

            _ => 0,
        }
    }

    /// Whether this opcode's first u16 operand is a forward jump offset.
    pub fn is_forward_jump(&self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::JumpIfFalseKeep
                | OpCode::JumpIfTrueKeep
                | OpCode::JumpIfNone
                | OpCode::JumpIfNoneKeep
                | OpCode::JumpIfSomeKeep
        )
    }

    /// Get the mnemonic for this opcode.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::PushNone => "PUSH_NONE",
            OpCode::PushUnit => "PUSH_UNIT",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushUnset => "PUSH_UNSET",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Dup2 => "DUP2",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetUpvalue => "GET_UPVALUE",
            OpCode::SetUpvalue => "SET_UPVALUE",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::GetExternal => "GET_EXTERNAL",
            OpCode::JumpIfArgPresent => "JUMP_IF_ARG_PRESENT",
            OpCode::AddInt => "ADD_INT",
            OpCode::SubInt => "SUB_INT",
            OpCode::MulInt => "MUL_INT",
            OpCode::DivInt => "DIV_INT",
            OpCode::ModInt => "MOD_INT",
            OpCode::NegInt => "NEG_INT",
            OpCode::AddFloat => "ADD_FLOAT",
            OpCode::SubFloat => "SUB_FLOAT",
            OpCode::MulFloat => "MUL_FLOAT",
            OpCode::DivFloat => "DIV_FLOAT",
            OpCode::ModFloat => "MOD_FLOAT",
            OpCode::NegFloat => "NEG_FLOAT",
            OpCode::Concat => "CONCAT",
            OpCode::Eq => "EQ",
            OpCode::Neq => "NEQ",
            OpCode::LtInt => "LT_INT",
            OpCode::LeInt => "LE_INT",
            OpCode::GtInt => "GT_INT",
            OpCode::GeInt => "GE_INT",
            OpCode::LtFloat => "LT_FLOAT",
            OpCode::LeFloat => "LE_FLOAT",
            OpCode::GtFloat => "GT_FLOAT",
            OpCode::GeFloat => "GE_FLOAT",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfFalseKeep => "JUMP_IF_FALSE_KEEP",
            OpCode::JumpIfTrueKeep => "JUMP_IF_TRUE_KEEP",
            OpCode::JumpIfNone => "JUMP_IF_NONE",
            OpCode::JumpIfNoneKeep => "JUMP_IF_NONE_KEEP",
            OpCode::JumpIfSomeKeep => "JUMP_IF_SOME_KEEP",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::CallExternal => "CALL_EXTERNAL",
            OpCode::CallValue => "CALL_VALUE",
            OpCode::CallBuiltin => "CALL_BUILTIN",
            OpCode::Return => "RETURN",
            OpCode::MakeClosure => "MAKE_CLOSURE",
            OpCode::MakeArray => "MAKE_ARRAY",
            OpCode::Index => "INDEX",
            OpCode::SetIndex => "SET_INDEX",
            OpCode::ArrayLen => "ARRAY_LEN",
            OpCode::MakeInstance => "MAKE_INSTANCE",
            OpCode::GetField => "GET_FIELD",
            OpCode::SetField => "SET_FIELD",
            OpCode::MakeVariant => "MAKE_VARIANT",
            OpCode::Interpolate => "INTERPOLATE",
        }
    }
}

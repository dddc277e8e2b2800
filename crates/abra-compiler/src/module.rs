//! Compiled modules.
//!
//! A [`ModuleChunk`] is the output of code generation for one module: the
//! concatenated bytecode of all its functions, the shared constant pool and
//! the tables the linker and the VM need to find functions, globals and
//! cross-module references.

use rustc_hash::FxHashMap;

use crate::bytecode::{BytecodeChunk, ConstantPool};
use crate::typeck::{ExportTarget, ExternRef, FunctionFlags};

/// Function table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    /// Entry offset into the module's code.
    pub offset: usize,
    /// Number of parameters, receiver included.
    pub arity: u8,
    /// Number of frame slots, parameters included.
    pub local_count: u16,
    pub flags: FunctionFlags,
    /// Source line of the declaration.
    pub line: u32,
}

impl FunctionInfo {
    /// Whether closures over this function keep the defining environment.
    pub fn captures(&self) -> bool {
        self.flags.contains(FunctionFlags::NESTED)
    }
}

/// A compiled module.
#[derive(Debug, Clone, Default)]
pub struct ModuleChunk {
    pub name: String,
    pub code: BytecodeChunk,
    pub constants: ConstantPool,
    /// Function 0 is the module initializer.
    pub functions: Vec<FunctionInfo>,
    /// Global slot names.
    pub globals: Vec<String>,
    pub exports: FxHashMap<String, ExportTarget>,
    /// Unresolved references, by extern index.
    pub externs: Vec<ExternRef>,
    /// Modules this module imports from.
    pub dependencies: Vec<String>,
}

impl ModuleChunk {
    pub fn function(&self, id: u32) -> Option<&FunctionInfo> {
        self.functions.get(id as usize)
    }

    pub fn export(&self, symbol: &str) -> Option<ExportTarget> {
        self.exports.get(symbol).copied()
    }

    /// The function whose entry offset is `offset`.
    pub fn function_at(&self, offset: usize) -> Option<(u32, &FunctionInfo)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.offset == offset)
            .map(|(id, f)| (id as u32, f))
    }

    /// End offset (exclusive) of function `id`.
    pub fn function_end(&self, id: u32) -> usize {
        self.functions
            .get(id as usize + 1)
            .map_or(self.code.len(), |next| next.offset)
    }
}

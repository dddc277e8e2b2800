//! Abra Compiler
//!
//! Type checking, bytecode generation and linking for Abra programs.
//!
//! ## Pipeline
//!
//! - **Type checking**: each module is checked against the interfaces of the
//!   modules it imports, producing a typed tree
//! - **Code generation**: the typed tree of a module becomes a [`ModuleChunk`]
//! - **Linking**: chunks are joined into a [`Program`] with every
//!   cross-module reference resolved
//!
//! ## Modules
//!
//! - [`bytecode`]: Bytecode types (OpCode, BytecodeChunk, ConstantPool)
//! - [`codegen`]: Typed tree to bytecode
//! - [`disasm`]: Bytecode listings
//! - [`emit`]: High-level bytecode emitter
//! - [`link`]: Extern resolution and the linked [`Program`]
//! - [`module`]: Compiled module layout
//! - [`session`]: Import loading and dependency ordering
//! - [`typeck`]: The static type checker

pub mod bytecode;
pub mod codegen;
pub mod disasm;
pub mod emit;
pub mod link;
pub mod module;
pub mod session;
pub mod typeck;

pub use codegen::compile_module;
pub use disasm::{disassemble_module, disassemble_program};
pub use emit::{BreakError, BytecodeEmitter, JumpLabel};
pub use link::{LinkTarget, Program, TypeMeta, VariantMeta, link};
pub use module::{FunctionInfo, ModuleChunk};
pub use session::{CheckedProgram, ENTRY_MODULE, ModuleResolver, check_program, compile_program};
pub use typeck::{Builtin, Prelude, TypeRegistry, TypedModule, check_module};

// Re-export the error types from core for convenience
pub use abra_core::{CompileError, TypecheckError};

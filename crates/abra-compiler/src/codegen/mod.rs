//! Bytecode generation from the typed AST.
//!
//! Every function of a [`TypedModule`] is compiled into its own
//! [`BytecodeChunk`] by a single depth-first walk; the chunks are then
//! concatenated into the module's code and the function table records where
//! each one starts. All functions share the module constant pool.
//!
//! Stack discipline: every expression leaves exactly one value on the
//! operand stack and every statement leaves none.
//!
//! Default arguments are filled in by the callee: a call passes the `Unset`
//! marker for an omitted argument and the function prologue evaluates the
//! default when its slot still holds the marker.

mod expr;
mod stmt;

use abra_core::{CompileError, Type};

use crate::bytecode::{BytecodeChunk, ConstantPool, OpCode};
use crate::emit::BytecodeEmitter;
use crate::module::{FunctionInfo, ModuleChunk};
use crate::typeck::{FunctionBody, FunctionFlags, TExpr, TypedFunction, TypedModule, VarRef};

type Result<T> = std::result::Result<T, CompileError>;

/// Compile a checked module.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_module(module: &TypedModule) -> Result<ModuleChunk> {
    let mut constants = ConstantPool::new();
    let mut code = BytecodeChunk::new();
    let mut functions = Vec::with_capacity(module.functions.len());

    for function in &module.functions {
        let chunk = FunctionCompiler::new(&mut constants)
            .compile(function)
            .map_err(|error| in_module(error, &module.name))?;
        let offset = code.append(&chunk);
        functions.push(FunctionInfo {
            name: function.name.clone(),
            offset,
            arity: arg_count(function.arity())?,
            local_count: function.local_count,
            flags: function.flags,
            line: function.span.line,
        });
    }

    log::debug!(
        "compiled module '{}': {} functions, {} bytes, {} constants",
        module.name,
        functions.len(),
        code.len(),
        constants.len()
    );

    Ok(ModuleChunk {
        name: module.name.clone(),
        code,
        constants,
        functions,
        globals: module.globals.clone(),
        exports: module.exports.iter().cloned().collect(),
        externs: module.externs.clone(),
        dependencies: module.dependencies.clone(),
    })
}

fn in_module(error: CompileError, name: &str) -> CompileError {
    match error {
        CompileError::TooManyConstants { .. } => CompileError::TooManyConstants {
            module: name.to_string(),
        },
        other => other,
    }
}

/// Compiles a single function body.
struct FunctionCompiler<'pool> {
    emitter: BytecodeEmitter<'pool>,
}

impl<'pool> FunctionCompiler<'pool> {
    fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            emitter: BytecodeEmitter::new(constants),
        }
    }

    fn compile(mut self, function: &TypedFunction) -> Result<BytecodeChunk> {
        log::trace!("compiling function '{}'", function.name);
        self.emitter.set_line(function.span.line);

        for param in &function.params {
            if let Some(default) = &param.default {
                let supplied = self.emitter.emit_jump_if_arg_present(param.slot);
                self.expr(default)?;
                self.emitter.emit_set_local(param.slot);
                self.emitter.patch_jump(supplied)?;
            }
        }

        match &function.body {
            FunctionBody::Expr(body) => {
                self.expr(body)?;
                if function.flags.contains(FunctionFlags::DISCARDS_RESULT) {
                    self.to_unit(&body.ty);
                }
            }
            FunctionBody::Construct { type_id } => {
                let count = self.load_params(function)?;
                self.emitter.emit_make_instance(*type_id, count)?;
            }
            FunctionBody::Variant { type_id, variant } => {
                let count = self.load_params(function)?;
                self.emitter.emit_make_variant(*type_id, *variant, count)?;
            }
            FunctionBody::Pending => {
                return Err(CompileError::Internal(format!(
                    "function '{}' has no checked body",
                    function.name
                )));
            }
        }
        self.emitter.emit_return();
        Ok(self.emitter.finish())
    }

    fn load_params(&mut self, function: &TypedFunction) -> Result<u8> {
        for param in &function.params {
            self.emitter.emit_get_local(param.slot);
        }
        arg_count(function.params.len())
    }

    /// Replace the value on top of the stack with `Unit` unless it already
    /// is one.
    fn to_unit(&mut self, ty: &Type) {
        if !ty.is_unit() {
            self.emitter.emit_pop();
            self.emitter.emit_unit();
        }
    }

    /// Emit an expression whose value is used as `ty`.
    fn expr_as(&mut self, expr: &TExpr, ty: &Type) -> Result<()> {
        self.expr(expr)?;
        if ty.is_unit() {
            self.to_unit(&expr.ty);
        }
        Ok(())
    }

    fn load(&mut self, var: VarRef) -> Result<()> {
        match var {
            VarRef::Local { depth: 0, slot } => self.emitter.emit_get_local(slot),
            VarRef::Local { depth, slot } => self.emitter.emit_get_upvalue(depth, slot),
            VarRef::Global(slot) => self.emitter.emit_get_global(slot),
            VarRef::External(index) => self.emitter.emit_get_external(extern_index(index)?),
        }
        Ok(())
    }

    fn store(&mut self, var: VarRef) -> Result<()> {
        match var {
            VarRef::Local { depth: 0, slot } => self.emitter.emit_set_local(slot),
            VarRef::Local { depth, slot } => self.emitter.emit_set_upvalue(depth, slot),
            VarRef::Global(slot) => self.emitter.emit_set_global(slot),
            VarRef::External(_) => {
                return Err(CompileError::Internal(
                    "assignment to an imported symbol".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn jump_over(&mut self, op: OpCode, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let label = self.emitter.emit_jump(op);
        f(self)?;
        self.emitter.patch_jump(label)
    }
}

fn arg_count(count: usize) -> Result<u8> {
    u8::try_from(count).map_err(|_| CompileError::TooManyArguments { count })
}

fn function_id(fid: u32) -> Result<u16> {
    u16::try_from(fid)
        .map_err(|_| CompileError::Internal(format!("function id {fid} out of range")))
}

fn extern_index(index: u32) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| CompileError::Internal(format!("extern index {index} out of range")))
}

fn count_u16(count: usize) -> Result<u16> {
    u16::try_from(count)
        .map_err(|_| CompileError::Internal(format!("{count} operands do not fit an instruction")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeck::{Prelude, TypeRegistry, check_module};
    use abra_parser::Parser;
    use bumpalo::Bump;
    use rustc_hash::FxHashMap;

    fn compile(source: &str) -> ModuleChunk {
        let arena = Bump::new();
        let script = Parser::parse(source, &arena).expect("source should parse");
        let (typed, _) = check_module(
            "main",
            &script,
            &Prelude::standard(),
            &mut TypeRegistry::new(),
            &FxHashMap::default(),
        )
        .unwrap_or_else(|e| panic!("typecheck failed: {e}"));
        compile_module(&typed).expect("module compiles")
    }

    fn ops(module: &ModuleChunk, id: u32) -> Vec<OpCode> {
        let start = module.functions[id as usize].offset;
        module.code.opcodes_in(start..module.function_end(id))
    }

    fn function<'m>(module: &'m ModuleChunk, name: &str) -> (u32, &'m FunctionInfo) {
        module
            .functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(id, f)| (id as u32, f))
            .unwrap_or_else(|| panic!("no function named {name}"))
    }

    #[test]
    fn globals_and_arithmetic() {
        let module = compile("val x = 1\nx + 2");
        assert_eq!(module.globals, vec!["x".to_string()]);
        assert_eq!(
            ops(&module, 0),
            vec![
                OpCode::Constant,
                OpCode::SetGlobal,
                OpCode::GetGlobal,
                OpCode::Constant,
                OpCode::AddInt,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn constants_are_shared_across_functions() {
        let module = compile("func a(): Int = 7\nfunc b(): Int = 7\na() + b()");
        let sevens = module
            .constants
            .constants()
            .iter()
            .filter(|c| **c == crate::bytecode::Constant::Int(7))
            .count();
        assert_eq!(sevens, 1);
        assert_eq!(module.functions.len(), 3);
        assert_eq!(module.functions[0].offset, 0);
        assert!(module.functions[1].offset > 0);
    }

    #[test]
    fn default_parameters_compile_to_a_prologue() {
        let module = compile("func f(a: Int, b = 2): Int = a + b\nf(1)");
        let (fid, info) = function(&module, "f");
        assert_eq!(info.arity, 2);
        assert_eq!(
            ops(&module, fid),
            vec![
                OpCode::JumpIfArgPresent,
                OpCode::Constant,
                OpCode::SetLocal,
                OpCode::GetLocal,
                OpCode::GetLocal,
                OpCode::AddInt,
                OpCode::Return,
            ]
        );
        module.code.assert_contains_opcodes(&[OpCode::PushUnset, OpCode::Call]);
    }

    #[test]
    fn unit_functions_discard_their_body_value() {
        let module = compile("var n = 0\nfunc bump(): Unit {\n  n += 1\n}\nbump()");
        let (fid, _) = function(&module, "bump");
        let ops = ops(&module, fid);
        assert_eq!(&ops[ops.len() - 3..], &[OpCode::Pop, OpCode::PushUnit, OpCode::Return]);
    }

    #[test]
    fn coalescing_and_optional_access() {
        let module = compile("[1, 2][5] ?: 0");
        module.code.assert_contains_opcodes(&[
            OpCode::MakeArray,
            OpCode::Index,
            OpCode::JumpIfSomeKeep,
            OpCode::Pop,
            OpCode::Constant,
        ]);

        let module = compile(
            "type P {\n  x: Int\n}\nval p: P? = P(x: 1)\np?.x",
        );
        module
            .code
            .assert_contains_opcodes(&[OpCode::GetGlobal, OpCode::JumpIfNoneKeep, OpCode::GetField]);
    }

    #[test]
    fn loops_patch_breaks() {
        let module = compile(
            "var i = 0\nwhile i < 10 {\n  if i == 5 { break }\n  i += 1\n}\nfor x in [1] {\n  continue\n}",
        );
        module.code.assert_contains_opcodes(&[
            OpCode::LtInt,
            OpCode::JumpIfFalse,
            OpCode::Jump,
            OpCode::Loop,
            OpCode::ArrayLen,
            OpCode::JumpIfFalse,
            OpCode::Index,
            OpCode::Jump,
            OpCode::AddInt,
            OpCode::Loop,
        ]);
    }

    #[test]
    fn types_and_variants() {
        let module = compile(
            "type P {\n  x: Int = 0\n}\nenum E {\n  A\n  B(v: Int)\n}\nval e = E.B(v: 1)\nP().x",
        );
        let (ctor, _) = function(&module, "P");
        assert_eq!(
            ops(&module, ctor),
            vec![
                OpCode::JumpIfArgPresent,
                OpCode::Constant,
                OpCode::SetLocal,
                OpCode::GetLocal,
                OpCode::MakeInstance,
                OpCode::Return,
            ]
        );
        let (variant, _) = function(&module, "E.B");
        assert_eq!(
            ops(&module, variant),
            vec![OpCode::GetLocal, OpCode::MakeVariant, OpCode::Return]
        );
        assert!(module.export("P").is_some());
        assert!(module.export("E.B").is_some());
    }

    #[test]
    fn closures_capture_enclosing_frames() {
        let module = compile(
            "func counter(): () => Int {\n  var n = 0\n  () => {\n    n += 1\n    n\n  }\n}\ncounter()()",
        );
        let (lambda, info) = function(&module, "<lambda>");
        assert!(info.captures());
        module.code.assert_contains_opcodes(&[OpCode::MakeClosure, OpCode::Return]);
        assert!(ops(&module, lambda).contains(&OpCode::GetUpvalue));
        assert!(ops(&module, lambda).contains(&OpCode::SetUpvalue));
        assert!(ops(&module, 0).contains(&OpCode::CallValue));
    }
}

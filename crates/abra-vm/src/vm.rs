//! The bytecode interpreter.
//!
//! A [`Vm`] executes a linked [`Program`]: it runs every module initializer
//! in dependency order and returns the value of the entry module's last
//! expression. All frames share one operand stack; a frame's locals live in
//! a reference-counted [`Env`] so closures can outlive the call that
//! created them.
//!
//! A VM runs once. Afterwards it is either `Halted` or, when execution
//! failed, `SuspendedOnError` with its frames unwound; running it again is
//! an error.

use std::cell::RefCell;
use std::rc::Rc;

use abra_compiler::bytecode::{Constant, OpCode};
use abra_compiler::typeck::ExportTarget;
use abra_compiler::{Builtin, FunctionInfo, ModuleChunk, Program, TypeMeta};
use abra_core::{RuntimeError, TypeId};
use rustc_hash::FxHashMap;

use crate::builtins;
use crate::config::VmConfig;
use crate::env::{Env, Frame};
use crate::value::{Closure, Instance, Value, Variant};

type Result<T> = std::result::Result<T, RuntimeError>;

/// Lifecycle of a [`Vm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted,
    SuspendedOnError,
}

pub struct Vm<'a> {
    program: &'a Program,
    config: VmConfig,
    output: &'a mut dyn FnMut(&str),
    state: VmState,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    /// Global slots, per module.
    globals: Vec<Vec<Value>>,
    types: FxHashMap<TypeId, Rc<TypeMeta>>,
}

impl<'a> Vm<'a> {
    /// Create a VM for `program`. `output` receives every line `println`
    /// writes.
    pub fn new(program: &'a Program, config: VmConfig, output: &'a mut dyn FnMut(&str)) -> Self {
        let globals = program
            .modules
            .iter()
            .map(|m| vec![Value::Unit; m.globals.len()])
            .collect();
        let types = program
            .types
            .iter()
            .map(|(id, meta)| (*id, Rc::new(meta.clone())))
            .collect();
        Self {
            program,
            config,
            output,
            state: VmState::Ready,
            stack: Vec::with_capacity(config.initial_stack_capacity),
            frames: Vec::new(),
            globals,
            types,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Run the program to completion.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&mut self) -> Result<Value> {
        if self.state != VmState::Ready {
            return Err(RuntimeError::VmNotReusable);
        }
        self.state = VmState::Running;
        log::debug!("vm start: {} modules", self.program.modules.len());

        let result = self.run_initializers();
        match &result {
            Ok(_) => {
                self.state = VmState::Halted;
                log::debug!("vm halted");
            }
            Err(error) => {
                self.frames.clear();
                self.stack.clear();
                self.state = VmState::SuspendedOnError;
                log::debug!("vm stopped on error: {error}");
            }
        }
        result
    }

    fn run_initializers(&mut self) -> Result<Value> {
        let mut result = Value::Unit;
        for module in 0..self.program.modules.len() {
            self.call_function(module, 0, 0, None)?;
            let value = self.execute()?;
            if module == self.program.entry {
                result = value;
            }
        }
        Ok(result)
    }

    // ==========================================================================
    // Dispatch
    // ==========================================================================

    /// Run until the outermost frame returns.
    fn execute(&mut self) -> Result<Value> {
        loop {
            let op = self.read_op()?;
            match op {
                OpCode::Constant => {
                    let index = self.read_u16()?;
                    let value = match self.module()?.constants.get(u32::from(index)) {
                        Some(Constant::Int(i)) => Value::Int(*i),
                        Some(Constant::Float(x)) => Value::Float(*x),
                        Some(Constant::Str(s)) => Value::string(s.as_str()),
                        other => {
                            return Err(RuntimeError::trap(format!(
                                "constant {index} is not a value: {other:?}"
                            )));
                        }
                    };
                    self.stack.push(value);
                }
                OpCode::PushNone => self.stack.push(Value::None),
                OpCode::PushUnit => self.stack.push(Value::Unit),
                OpCode::PushTrue => self.stack.push(Value::Bool(true)),
                OpCode::PushFalse => self.stack.push(Value::Bool(false)),
                OpCode::PushUnset => self.stack.push(Value::Unset),

                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::Dup => {
                    let top = self.peek()?.clone();
                    self.stack.push(top);
                }
                OpCode::Dup2 => {
                    let len = self.stack.len();
                    if len < 2 {
                        return Err(stack_underflow());
                    }
                    self.stack.extend_from_within(len - 2..);
                }

                OpCode::GetLocal => {
                    let slot = self.read_u16()?;
                    let value = self.env()?.get(slot).ok_or_else(|| bad_slot(slot))?;
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_u16()?;
                    let value = self.pop()?;
                    if !self.env()?.set(slot, value) {
                        return Err(bad_slot(slot));
                    }
                }
                OpCode::GetUpvalue => {
                    let depth = self.read_byte()?;
                    let slot = self.read_u16()?;
                    let env = self.env()?;
                    let value = env
                        .ancestor(depth)
                        .and_then(|e| e.get(slot))
                        .ok_or_else(|| bad_slot(slot))?;
                    self.stack.push(value);
                }
                OpCode::SetUpvalue => {
                    let depth = self.read_byte()?;
                    let slot = self.read_u16()?;
                    let value = self.pop()?;
                    let env = self.env()?;
                    if !env.ancestor(depth).is_some_and(|e| e.set(slot, value)) {
                        return Err(bad_slot(slot));
                    }
                }
                OpCode::GetGlobal => {
                    let slot = self.read_u16()?;
                    let module = self.frame()?.module;
                    let value = self.global(module, slot)?.clone();
                    self.stack.push(value);
                }
                OpCode::SetGlobal => {
                    let slot = self.read_u16()?;
                    let value = self.pop()?;
                    let module = self.frame()?.module;
                    *self.global_mut(module, slot)? = value;
                }
                OpCode::GetExternal => {
                    let index = self.read_u16()?;
                    let value = match self.link(index)? {
                        (module, ExportTarget::Global(slot)) => self.global(module, slot)?.clone(),
                        (module, ExportTarget::Function(function)) => {
                            self.closure(module, function, None)?
                        }
                    };
                    self.stack.push(value);
                }
                OpCode::JumpIfArgPresent => {
                    let slot = self.read_u16()?;
                    let offset = self.read_u16()?;
                    let value = self.env()?.get(slot).ok_or_else(|| bad_slot(slot))?;
                    if !value.is_unset() {
                        self.jump_forward(offset)?;
                    }
                }

                OpCode::AddInt => self.int_op(i64::wrapping_add)?,
                OpCode::SubInt => self.int_op(i64::wrapping_sub)?,
                OpCode::MulInt => self.int_op(i64::wrapping_mul)?,
                OpCode::DivInt => {
                    self.check_divisor()?;
                    self.int_op(i64::wrapping_div)?;
                }
                OpCode::ModInt => {
                    self.check_divisor()?;
                    self.int_op(i64::wrapping_rem)?;
                }
                OpCode::NegInt => match self.pop()? {
                    Value::Int(i) => self.stack.push(Value::Int(i.wrapping_neg())),
                    other => return Err(type_trap("Int", &other)),
                },
                OpCode::AddFloat => self.float_op(|a, b| a + b)?,
                OpCode::SubFloat => self.float_op(|a, b| a - b)?,
                OpCode::MulFloat => self.float_op(|a, b| a * b)?,
                OpCode::DivFloat => self.float_op(|a, b| a / b)?,
                OpCode::ModFloat => self.float_op(|a, b| a % b)?,
                OpCode::NegFloat => match self.pop()? {
                    Value::Float(x) => self.stack.push(Value::Float(-x)),
                    other => return Err(type_trap("Float", &other)),
                },
                OpCode::Concat => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let Value::Str(left) = left else {
                        return Err(type_trap("String", &left));
                    };
                    self.stack.push(Value::string(format!("{left}{right}")));
                }

                OpCode::Eq => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(Value::Bool(left == right));
                }
                OpCode::Neq => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(Value::Bool(left != right));
                }
                OpCode::LtInt => self.int_cmp(|a, b| a < b)?,
                OpCode::LeInt => self.int_cmp(|a, b| a <= b)?,
                OpCode::GtInt => self.int_cmp(|a, b| a > b)?,
                OpCode::GeInt => self.int_cmp(|a, b| a >= b)?,
                OpCode::LtFloat => self.float_cmp(|a, b| a < b)?,
                OpCode::LeFloat => self.float_cmp(|a, b| a <= b)?,
                OpCode::GtFloat => self.float_cmp(|a, b| a > b)?,
                OpCode::GeFloat => self.float_cmp(|a, b| a >= b)?,
                OpCode::Not => {
                    let value = self.pop()?;
                    let b = value.as_bool().ok_or_else(|| type_trap("Bool", &value))?;
                    self.stack.push(Value::Bool(!b));
                }

                OpCode::Jump => {
                    let offset = self.read_u16()?;
                    self.jump_forward(offset)?;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()?;
                    let value = self.pop()?;
                    if !value.as_bool().ok_or_else(|| type_trap("Bool", &value))? {
                        self.jump_forward(offset)?;
                    }
                }
                OpCode::JumpIfFalseKeep | OpCode::JumpIfTrueKeep => {
                    let offset = self.read_u16()?;
                    let value = self.peek()?;
                    let b = value.as_bool().ok_or_else(|| type_trap("Bool", value))?;
                    if b == (op == OpCode::JumpIfTrueKeep) {
                        self.jump_forward(offset)?;
                    }
                }
                OpCode::JumpIfNone => {
                    let offset = self.read_u16()?;
                    if self.pop()?.is_none() {
                        self.jump_forward(offset)?;
                    }
                }
                OpCode::JumpIfNoneKeep | OpCode::JumpIfSomeKeep => {
                    let offset = self.read_u16()?;
                    if self.peek()?.is_none() == (op == OpCode::JumpIfNoneKeep) {
                        self.jump_forward(offset)?;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()?;
                    let frame = self.frame_mut()?;
                    frame.ip = frame
                        .ip
                        .checked_sub(offset as usize)
                        .ok_or_else(|| RuntimeError::trap("loop target before code start"))?;
                }

                OpCode::Call => {
                    let function = self.read_u16()?;
                    let argc = self.read_byte()?;
                    let module = self.frame()?.module;
                    self.call_function(module, u32::from(function), argc as usize, None)?;
                }
                OpCode::CallExternal => {
                    let index = self.read_u16()?;
                    let argc = self.read_byte()? as usize;
                    match self.link(index)? {
                        (module, ExportTarget::Function(function)) => {
                            self.call_function(module, function, argc, None)?;
                        }
                        (module, ExportTarget::Global(slot)) => {
                            let callee = self.global(module, slot)?.clone();
                            self.call_value(callee, argc)?;
                        }
                    }
                }
                OpCode::CallValue => {
                    let argc = self.read_byte()? as usize;
                    let position = self
                        .stack
                        .len()
                        .checked_sub(argc + 1)
                        .ok_or_else(stack_underflow)?;
                    let callee = self.stack.remove(position);
                    self.call_value(callee, argc)?;
                }
                OpCode::CallBuiltin => {
                    let id = self.read_byte()?;
                    let argc = self.read_byte()? as usize;
                    let builtin = Builtin::from_u8(id)
                        .ok_or_else(|| RuntimeError::trap(format!("unknown builtin {id}")))?;
                    let args = self.pop_n(argc)?;
                    let result = builtins::call(builtin, &args, &mut *self.output)?;
                    self.stack.push(result);
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().ok_or_else(no_frame)?;
                    log::trace!("return from {}#{}", frame.module, frame.function);
                    self.stack.truncate(frame.base);
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.stack.push(result);
                }
                OpCode::MakeClosure => {
                    let function = self.read_u16()?;
                    let frame = self.frame()?;
                    let (module, env) = (frame.module, frame.env.clone());
                    let captures = self.function_info(module, u32::from(function))?.captures();
                    let closure = self.closure(module, u32::from(function), captures.then_some(env))?;
                    self.stack.push(closure);
                }

                OpCode::MakeArray => {
                    let count = self.read_u16()? as usize;
                    let items = self.pop_n(count)?;
                    self.stack.push(Value::array(items));
                }
                OpCode::Index => {
                    let index = self.pop()?;
                    let array = self.pop()?;
                    let (Value::Array(items), Value::Int(i)) = (&array, &index) else {
                        return Err(type_trap("Array", &array));
                    };
                    let element = usize::try_from(*i)
                        .ok()
                        .and_then(|i| items.borrow().get(i).cloned())
                        .unwrap_or(Value::None);
                    self.stack.push(element);
                }
                OpCode::SetIndex => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let array = self.pop()?;
                    let (Value::Array(items), Value::Int(i)) = (&array, &index) else {
                        return Err(type_trap("Array", &array));
                    };
                    // Out-of-range stores are dropped.
                    if let Ok(i) = usize::try_from(*i) {
                        if let Some(slot) = items.borrow_mut().get_mut(i) {
                            *slot = value.clone();
                        }
                    }
                    self.stack.push(value);
                }
                OpCode::ArrayLen => match self.pop()? {
                    Value::Array(items) => {
                        let len = items.borrow().len() as i64;
                        self.stack.push(Value::Int(len));
                    }
                    other => return Err(type_trap("Array", &other)),
                },

                OpCode::MakeInstance => {
                    let constant = self.read_u16()?;
                    let count = self.read_byte()? as usize;
                    let (type_id, meta) = self.type_constant(constant)?;
                    let fields = self.pop_n(count)?;
                    self.stack.push(Value::Instance(Rc::new(Instance {
                        type_id,
                        meta,
                        fields: RefCell::new(fields),
                    })));
                }
                OpCode::MakeVariant => {
                    let constant = self.read_u16()?;
                    let variant = self.read_u16()?;
                    let count = self.read_byte()? as usize;
                    let (type_id, meta) = self.type_constant(constant)?;
                    let payload = self.pop_n(count)?;
                    self.stack.push(Value::Variant(Rc::new(Variant {
                        type_id,
                        meta,
                        variant,
                        payload: RefCell::new(payload),
                    })));
                }
                OpCode::GetField => {
                    let index = self.read_u16()? as usize;
                    let object = self.pop()?;
                    let value = match &object {
                        Value::Instance(instance) => instance.fields.borrow().get(index).cloned(),
                        Value::Variant(variant) => variant.payload.borrow().get(index).cloned(),
                        _ => None,
                    };
                    self.stack.push(value.ok_or_else(|| field_trap(index, &object))?);
                }
                OpCode::SetField => {
                    let index = self.read_u16()? as usize;
                    let value = self.pop()?;
                    let object = self.pop()?;
                    let stored = match &object {
                        Value::Instance(instance) => instance
                            .fields
                            .borrow_mut()
                            .get_mut(index)
                            .map(|slot| *slot = value.clone())
                            .is_some(),
                        _ => false,
                    };
                    if !stored {
                        return Err(field_trap(index, &object));
                    }
                    self.stack.push(value);
                }
                OpCode::Interpolate => {
                    let count = self.read_u16()? as usize;
                    let parts = self.pop_n(count)?;
                    let text: String = parts.iter().map(ToString::to_string).collect();
                    self.stack.push(Value::string(text));
                }
            }
        }
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Enter `function` of `module`, taking its arguments from the top of the
    /// stack.
    fn call_function(
        &mut self,
        module: usize,
        function: u32,
        argc: usize,
        parent: Option<Rc<Env>>,
    ) -> Result<()> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                depth: self.config.max_call_depth,
            });
        }
        let info = self.function_info(module, function)?;
        let (offset, arity, local_count) = (info.offset, info.arity as usize, info.local_count as usize);
        log::trace!("call {}#{} '{}' with {} args", module, function, info.name, argc);

        let mut slots = self.pop_n(argc)?;
        // Function values may be called with more arguments than they take.
        slots.truncate(arity);
        slots.resize(arity, Value::Unset);
        slots.resize(local_count.max(arity), Value::Unit);

        self.frames.push(Frame {
            module,
            function,
            ip: offset,
            env: Rc::new(Env::new(slots, parent)),
            base: self.stack.len(),
        });
        Ok(())
    }

    fn call_value(&mut self, callee: Value, argc: usize) -> Result<()> {
        match callee {
            Value::Closure(closure) => {
                self.call_function(closure.module, closure.function, argc, closure.env.clone())
            }
            other => Err(type_trap("Function", &other)),
        }
    }

    fn closure(&self, module: usize, function: u32, env: Option<Rc<Env>>) -> Result<Value> {
        let info = self.function_info(module, function)?;
        Ok(Value::Closure(Rc::new(Closure {
            module,
            function,
            name: info.name.as_str().into(),
            env,
        })))
    }

    // ==========================================================================
    // Helpers
    // ==========================================================================

    fn frame(&self) -> Result<&Frame> {
        self.frames.last().ok_or_else(no_frame)
    }

    fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or_else(no_frame)
    }

    fn env(&self) -> Result<&Env> {
        Ok(&self.frame()?.env)
    }

    fn module(&self) -> Result<&'a ModuleChunk> {
        let program = self.program;
        let index = self.frame()?.module;
        program
            .modules
            .get(index)
            .ok_or_else(|| RuntimeError::trap(format!("unknown module {index}")))
    }

    fn function_info(&self, module: usize, function: u32) -> Result<&'a FunctionInfo> {
        let program = self.program;
        program
            .modules
            .get(module)
            .and_then(|m| m.function(function))
            .ok_or_else(|| RuntimeError::trap(format!("unknown function {module}#{function}")))
    }

    fn link(&self, index: u16) -> Result<(usize, ExportTarget)> {
        let module = self.frame()?.module;
        self.program
            .links
            .get(module)
            .and_then(|links| links.get(index as usize))
            .map(|link| (link.module, link.target))
            .ok_or_else(|| RuntimeError::trap(format!("unlinked extern {index}")))
    }

    fn global(&self, module: usize, slot: u16) -> Result<&Value> {
        self.globals
            .get(module)
            .and_then(|g| g.get(slot as usize))
            .ok_or_else(|| RuntimeError::trap(format!("unknown global {slot}")))
    }

    fn global_mut(&mut self, module: usize, slot: u16) -> Result<&mut Value> {
        self.globals
            .get_mut(module)
            .and_then(|g| g.get_mut(slot as usize))
            .ok_or_else(|| RuntimeError::trap(format!("unknown global {slot}")))
    }

    fn type_constant(&self, index: u16) -> Result<(TypeId, Rc<TypeMeta>)> {
        match self.module()?.constants.get(u32::from(index)) {
            Some(Constant::Type(id)) => self
                .types
                .get(id)
                .map(|meta| (*id, meta.clone()))
                .ok_or_else(|| RuntimeError::trap(format!("unknown type {id}"))),
            other => Err(RuntimeError::trap(format!(
                "constant {index} is not a type: {other:?}"
            ))),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let module = self.module()?;
        let frame = self.frame_mut()?;
        let byte = module
            .code
            .read_byte(frame.ip)
            .ok_or_else(|| RuntimeError::trap(format!("instruction pointer {} out of bounds", frame.ip)))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from(high) << 8 | u16::from(low))
    }

    fn read_op(&mut self) -> Result<OpCode> {
        let byte = self.read_byte()?;
        let op = OpCode::from_u8(byte)
            .ok_or_else(|| RuntimeError::trap(format!("invalid opcode {byte:#04x}")))?;
        log::trace!("{:?} (stack depth {})", op, self.stack.len());
        Ok(op)
    }

    fn jump_forward(&mut self, offset: u16) -> Result<()> {
        self.frame_mut()?.ip += offset as usize;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or_else(stack_underflow)
    }

    fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or_else(stack_underflow)
    }

    /// Pop the top `count` values, oldest first.
    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let start = self.stack.len().checked_sub(count).ok_or_else(stack_underflow)?;
        Ok(self.stack.split_off(start))
    }

    fn check_divisor(&self) -> Result<()> {
        match self.peek()? {
            Value::Int(0) => Err(RuntimeError::DivisionByZero),
            _ => Ok(()),
        }
    }

    fn int_operands(&mut self) -> Result<(i64, i64)> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
            (Value::Int(_), other) | (other, _) => Err(type_trap("Int", other)),
        }
    }

    fn float_operands(&mut self) -> Result<(f64, f64)> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Value::Float(a), Value::Float(b)) => Ok((*a, *b)),
            (Value::Float(_), other) | (other, _) => Err(type_trap("Float", other)),
        }
    }

    fn int_op(&mut self, op: fn(i64, i64) -> i64) -> Result<()> {
        let (a, b) = self.int_operands()?;
        self.stack.push(Value::Int(op(a, b)));
        Ok(())
    }

    fn float_op(&mut self, op: fn(f64, f64) -> f64) -> Result<()> {
        let (a, b) = self.float_operands()?;
        self.stack.push(Value::Float(op(a, b)));
        Ok(())
    }

    fn int_cmp(&mut self, op: fn(&i64, &i64) -> bool) -> Result<()> {
        let (a, b) = self.int_operands()?;
        self.stack.push(Value::Bool(op(&a, &b)));
        Ok(())
    }

    fn float_cmp(&mut self, op: fn(&f64, &f64) -> bool) -> Result<()> {
        let (a, b) = self.float_operands()?;
        self.stack.push(Value::Bool(op(&a, &b)));
        Ok(())
    }
}

fn stack_underflow() -> RuntimeError {
    RuntimeError::trap("operand stack underflow")
}

fn no_frame() -> RuntimeError {
    RuntimeError::trap("no active frame")
}

fn bad_slot(slot: u16) -> RuntimeError {
    RuntimeError::trap(format!("invalid local slot {slot}"))
}

fn type_trap(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::trap(format!("expected {expected}, found {}", found.type_name()))
}

fn field_trap(index: usize, object: &Value) -> RuntimeError {
    RuntimeError::trap(format!("no field {index} on {}", object.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use abra_compiler::{Prelude, check_program, compile_program};

    fn compile(source: &str) -> Program {
        let checked = check_program(source, None, &Prelude::standard())
            .unwrap_or_else(|e| panic!("program should check: {e}"));
        compile_program(&checked).expect("program compiles")
    }

    fn run_with(source: &str, config: VmConfig) -> (Result<Value>, Vec<String>) {
        let program = compile(source);
        let mut lines = Vec::new();
        let mut output = |line: &str| lines.push(line.to_string());
        let result = Vm::new(&program, config, &mut output).run();
        (result, lines)
    }

    fn eval(source: &str) -> Value {
        run_with(source, VmConfig::default())
            .0
            .unwrap_or_else(|e| panic!("program should run: {e}"))
    }

    fn display(source: &str) -> String {
        eval(source).to_string()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("7 / 2"), Value::Int(3));
        assert_eq!(eval("-7 % 3"), Value::Int(-1));
        assert_eq!(eval("1.5 + 2.0"), Value::Float(3.5));
        assert_eq!(eval("9223372036854775807 + 1"), Value::Int(i64::MIN));
        assert_eq!(eval("\"a\" + 1 + true"), Value::string("a1true"));
        assert_eq!(eval("1 < 2 && 2.0 >= 3.0"), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let (result, _) = run_with("val z = 0\n10 / z", VmConfig::default());
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
        let (result, _) = run_with("val z = 0\n10 % z", VmConfig::default());
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn fibonacci() {
        let source = "func fib(n: Int): Int {\n  if (n == 0) 0 else if (n == 1) 1 else fib(n - 2) + fib(n - 1)\n}\nfib(12)";
        assert_eq!(eval(source), Value::Int(144));
    }

    #[test]
    fn indexing_and_coalescing() {
        assert_eq!(eval("[1, 2, 3][10] ?: -1"), Value::Int(-1));
        assert_eq!(eval("[1, 2, 3][1] ?: -1"), Value::Int(2));
        assert_eq!(eval("[1, 2, 3][-1]"), Value::None);

        let source = "val a = [1, 2]\na[0] = 5\na[9] = 7\na[1] += 10\na[4] += 1\na";
        assert_eq!(display(source), "[5, 12]");
    }

    #[test]
    fn strings_and_interpolation() {
        assert_eq!(display("val n = \"World\"\n\"Hello, ${n}! ${1 + 1}\""), "Hello, World! 2");
        assert_eq!(eval("\"abc\".length"), Value::Int(3));
        assert_eq!(eval("\"abc\".toUpper()"), Value::string("ABC"));
    }

    #[test]
    fn loops() {
        let source = "var sum = 0\nfor x, i in [10, 20, 30] {\n  if i == 1 { continue }\n  sum += x\n}\nvar n = 0\nwhile true {\n  n += 1\n  if n == 5 { break }\n}\nsum + n";
        assert_eq!(eval(source), Value::Int(45));
    }

    #[test]
    fn unbraced_loop_control_in_if() {
        let source = "var i = 0\nvar odd = 0\nwhile true {\n  i += 1\n  if i > 5 break\n  if i % 2 == 0 continue\n  odd += i\n}\n[i, odd]";
        assert_eq!(display(source), "[6, 9]");
    }

    #[test]
    fn while_binding_loops_until_none() {
        let source = "val items = [1, 2, 3]\nvar i = 0\nvar total = 0\nwhile items[i] |item| {\n  total += item\n  i += 1\n}\ntotal";
        assert_eq!(eval(source), Value::Int(6));
    }

    #[test]
    fn println_goes_to_the_output() {
        let (result, lines) = run_with(
            "println(\"hi\")\nprintln([1, 2])\nprintln([1, 2][5])",
            VmConfig::default(),
        );
        assert_eq!(result, Ok(Value::Unit));
        assert_eq!(lines, vec!["hi", "[1, 2]", "None"]);
    }

    #[test]
    fn default_arguments() {
        let source = "func greet(name: String, greeting = \"Hello\"): String = greeting + \", \" + name\ngreet(\"a\") + \" \" + greet(\"b\", \"Hi\") + \" \" + greet(greeting: \"Yo\", name: \"c\")";
        assert_eq!(display(source), "Hello, a Hi, b Yo, c");
    }

    #[test]
    fn closures_share_their_environment() {
        let source = "func counter(): () => Int {\n  var n = 0\n  () => {\n    n += 1\n    n\n  }\n}\nval next = counter()\n_ = next()\n_ = next()\nnext()";
        assert_eq!(eval(source), Value::Int(3));

        let source = "func outer(): Int {\n  var x = 1\n  func bump(): Unit { x += 10 }\n  bump()\n  bump()\n  x\n}\nouter()";
        assert_eq!(eval(source), Value::Int(21));
    }

    #[test]
    fn types_methods_and_optional_access() {
        let source = "type Person {\n  name: String\n  age: Int = 0\n  func greet(self): String = \"I am \" + self.name\n}\nval p = Person(name: \"Ann\")\np.age += 30\nval q: Person? = None\n[p.greet(), q?.greet() ?: \"nobody\", \"${p}\"]";
        assert_eq!(
            display(source),
            "[\"I am Ann\", \"nobody\", \"Person(name: \"Ann\", age: 30)\"]"
        );
    }

    #[test]
    fn optional_call_on_none_skips_its_arguments() {
        let source = "type P {\n  x: Int\n  func m(self, v: Int): Int = v\n}\nfunc side(): Int {\n  println(\"side\")\n  1\n}\nval p: P? = None\np?.m(side())";
        let (result, lines) = run_with(source, VmConfig::default());
        assert_eq!(result, Ok(Value::None));
        assert!(lines.is_empty(), "arguments were evaluated: {lines:?}");

        let present = source.replace("val p: P? = None", "val p: P? = P(x: 1)");
        let (result, lines) = run_with(&present, VmConfig::default());
        assert_eq!(result, Ok(Value::Int(1)));
        assert_eq!(lines, vec!["side"]);
    }

    #[test]
    fn enums() {
        let source = "enum Color {\n  Red\n  RGB(r: Int, g: Int, b: Int)\n}\n[Color.Red, Color.RGB(r: 1, g: 2, b: 3)]";
        assert_eq!(display(source), "[Color.Red, Color.RGB(r: 1, g: 2, b: 3)]");
        assert_eq!(eval("enum E {\n  A\n  B\n}\nE.A == E.A"), Value::Bool(true));
    }

    #[test]
    fn deep_recursion_overflows() {
        let source = "func down(n: Int): Int = if n == 0 { 0 } else { down(n - 1) }\ndown(100)";
        let (result, _) = run_with(source, VmConfig::default().with_max_call_depth(50));
        assert_eq!(result, Err(RuntimeError::StackOverflow { depth: 50 }));

        let (result, _) = run_with(source, VmConfig::default());
        assert_eq!(result, Ok(Value::Int(0)));
    }

    #[test]
    fn a_vm_runs_once() {
        let program = compile("1");
        let mut output = |_: &str| {};
        let mut vm = Vm::new(&program, VmConfig::default(), &mut output);
        assert_eq!(vm.state(), VmState::Ready);
        assert_eq!(vm.run(), Ok(Value::Int(1)));
        assert_eq!(vm.state(), VmState::Halted);
        assert_eq!(vm.run(), Err(RuntimeError::VmNotReusable));

        let program = compile("val z = 0\n1 / z");
        let mut output = |_: &str| {};
        let mut vm = Vm::new(&program, VmConfig::default(), &mut output);
        assert!(vm.run().is_err());
        assert_eq!(vm.state(), VmState::SuspendedOnError);
        assert_eq!(vm.run(), Err(RuntimeError::VmNotReusable));
    }

    #[test]
    fn modules_initialize_in_dependency_order() {
        let files = |name: &str| match name {
            "./lib" => Some(
                "println(\"lib\")\nexport val base = 40\nexport func add(a: Int, b = 2): Int = a + b".to_string(),
            ),
            _ => None,
        };
        let checked = check_program(
            "import base, add from \"./lib\"\nprintln(\"main\")\nadd(base)",
            Some(&files),
            &Prelude::standard(),
        )
        .expect("program checks");
        let program = compile_program(&checked).expect("program compiles");
        let mut lines = Vec::new();
        let mut output = |line: &str| lines.push(line.to_string());
        let result = Vm::new(&program, VmConfig::default(), &mut output).run();
        assert_eq!(result, Ok(Value::Int(42)));
        assert_eq!(lines, vec!["lib", "main"]);
    }
}

//! Human-readable bytecode listings.

use std::fmt::Write;

use crate::bytecode::OpCode;
use crate::link::Program;
use crate::module::ModuleChunk;
use crate::typeck::Builtin;

/// Render every module of a program, in dependency order.
pub fn disassemble_program(program: &Program) -> String {
    let mut out = String::new();
    for (i, module) in program.modules.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        disassemble_module(module, &mut out);
    }
    out
}

/// Render one module: header, constant pool and each function's code.
pub fn disassemble_module(module: &ModuleChunk, out: &mut String) {
    let _ = writeln!(out, "== module {} ==", module.name);

    if !module.constants.is_empty() {
        let _ = writeln!(out, "constants:");
        for (i, constant) in module.constants.constants().iter().enumerate() {
            let _ = writeln!(out, "  {i:4}: {constant}");
        }
    }

    if !module.globals.is_empty() {
        let _ = writeln!(out, "globals: {}", module.globals.join(", "));
    }

    for (id, function) in module.functions.iter().enumerate() {
        let id = id as u32;
        let _ = writeln!(
            out,
            "fn {id} {} (arity {}, locals {}, line {}):",
            function.name, function.arity, function.local_count, function.line
        );
        let mut offset = function.offset;
        let end = module.function_end(id);
        let mut last_line = None;
        while offset < end {
            offset = instruction(module, offset, &mut last_line, out);
        }
    }
}

/// Render the instruction at `offset` and return the next offset.
fn instruction(
    module: &ModuleChunk,
    offset: usize,
    last_line: &mut Option<u32>,
    out: &mut String,
) -> usize {
    let code = &module.code;
    let line = code.line_at(offset);
    let _ = write!(out, "  {offset:04} ");
    if line.is_some() && line == *last_line {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{:4} ", line.unwrap_or(0));
    }
    *last_line = line;

    let Some(op) = code.read_op(offset) else {
        let _ = writeln!(out, "<invalid {:#04x}>", code.read_byte(offset).unwrap_or(0));
        return offset + 1;
    };
    let next = offset + 1 + op.operand_size();
    let at = offset + 1;
    let u8_at = |pos: usize| code.read_byte(pos).unwrap_or(0);
    let u16_at = |pos: usize| code.read_u16(pos).unwrap_or(0);

    let _ = write!(out, "{:<20}", op.name());
    let _ = match op {
        OpCode::Constant => {
            let index = u16_at(at);
            write!(out, " {index} ({})", constant_text(module, index))
        }
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::MakeArray
        | OpCode::GetField
        | OpCode::SetField
        | OpCode::Interpolate => write!(out, " {}", u16_at(at)),
        OpCode::GetGlobal | OpCode::SetGlobal => {
            let slot = u16_at(at);
            let name = module.globals.get(slot as usize).map_or("?", String::as_str);
            write!(out, " {slot} ({name})")
        }
        OpCode::GetExternal => {
            let index = u16_at(at);
            write!(out, " {index} ({})", extern_text(module, index))
        }
        OpCode::GetUpvalue | OpCode::SetUpvalue => {
            write!(out, " depth {} slot {}", u8_at(at), u16_at(at + 1))
        }
        OpCode::JumpIfArgPresent => {
            let target = next + u16_at(at + 2) as usize;
            write!(out, " slot {} -> {target:04}", u16_at(at))
        }
        OpCode::Loop => {
            let target = next.saturating_sub(u16_at(at) as usize);
            write!(out, " -> {target:04}")
        }
        op if op.is_forward_jump() => write!(out, " -> {:04}", next + u16_at(at) as usize),
        OpCode::Call => {
            let id = u16_at(at);
            let name = module
                .function(u32::from(id))
                .map_or("?", |f| f.name.as_str());
            write!(out, " {id} ({name}) args {}", u8_at(at + 2))
        }
        OpCode::CallExternal => {
            let index = u16_at(at);
            write!(out, " {index} ({}) args {}", extern_text(module, index), u8_at(at + 2))
        }
        OpCode::CallValue => write!(out, " args {}", u8_at(at)),
        OpCode::CallBuiltin => {
            let name = Builtin::from_u8(u8_at(at)).map_or("?", |b| b.name());
            write!(out, " {name} args {}", u8_at(at + 1))
        }
        OpCode::MakeClosure => {
            let id = u16_at(at);
            let name = module
                .function(u32::from(id))
                .map_or("?", |f| f.name.as_str());
            write!(out, " {id} ({name})")
        }
        OpCode::MakeInstance => {
            let index = u16_at(at);
            write!(out, " {} fields {}", constant_text(module, index), u8_at(at + 2))
        }
        OpCode::MakeVariant => {
            let index = u16_at(at);
            write!(
                out,
                " {} variant {} fields {}",
                constant_text(module, index),
                u16_at(at + 2),
                u8_at(at + 4)
            )
        }
        _ => Ok(()),
    };
    // No trailing padding after operand-free mnemonics.
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
    next
}

fn constant_text(module: &ModuleChunk, index: u16) -> String {
    module
        .constants
        .get(u32::from(index))
        .map_or_else(|| "?".to_string(), ToString::to_string)
}

fn extern_text(module: &ModuleChunk, index: u16) -> String {
    module
        .externs
        .get(index as usize)
        .map_or_else(|| "?".to_string(), |e| format!("{}.{}", e.module, e.symbol))
}

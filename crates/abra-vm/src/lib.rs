//! Abra Virtual Machine
//!
//! A stack-based interpreter for linked Abra programs.
//!
//! ```ignore
//! use abra_vm::{Vm, VmConfig};
//!
//! let mut output = |line: &str| println!("{line}");
//! let mut vm = Vm::new(&program, VmConfig::default(), &mut output);
//! let value = vm.run()?;
//! ```

mod builtins;
mod config;
mod env;
mod value;
mod vm;

pub use config::VmConfig;
pub use env::Env;
pub use value::{Closure, Instance, Value, Variant};
pub use vm::{Vm, VmState};

pub use abra_core::RuntimeError;

//! Call frames and their environments.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// The local slots of one function activation.
///
/// Environments are reference counted so closures created in a frame keep
/// its slots alive after it returns. `parent` is the environment the called
/// closure captured; upvalue accesses walk this chain.
#[derive(Debug)]
pub struct Env {
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new(slots: Vec<Value>, parent: Option<Rc<Env>>) -> Self {
        Self {
            slots: RefCell::new(slots),
            parent,
        }
    }

    pub fn get(&self, slot: u16) -> Option<Value> {
        self.slots.borrow().get(slot as usize).cloned()
    }

    /// Store into `slot`; false when the slot does not exist.
    pub fn set(&self, slot: u16, value: Value) -> bool {
        match self.slots.borrow_mut().get_mut(slot as usize) {
            Some(target) => {
                *target = value;
                true
            }
            None => false,
        }
    }

    /// The environment `depth` levels up the capture chain.
    pub fn ancestor(&self, depth: u8) -> Option<&Env> {
        let mut env = self;
        for _ in 0..depth {
            env = env.parent.as_deref()?;
        }
        Some(env)
    }
}

/// An active call.
#[derive(Debug)]
pub struct Frame {
    pub module: usize,
    pub function: u32,
    pub ip: usize,
    pub env: Rc<Env>,
    /// Operand stack height when the frame was entered.
    pub base: usize,
}

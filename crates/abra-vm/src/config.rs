//! VM limits.

/// Execution limits of a [`Vm`](crate::Vm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Deepest allowed call nesting; one more call is a stack overflow.
    pub max_call_depth: usize,
    /// Operand stack slots reserved up front.
    pub initial_stack_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            initial_stack_capacity: 1024,
        }
    }
}

impl VmConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

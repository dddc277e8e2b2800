//! Jump management for control flow.
//!
//! This module tracks loop contexts for break/continue statements. A loop's
//! continue target is either known when the loop starts (`while`, which
//! re-tests its condition) or only known once the body has been emitted
//! (`for`, which continues at its index increment).

use super::JumpLabel;

/// Manages jump targets for control flow.
///
/// Tracks a stack of loop contexts to support nested loops with
/// proper break/continue handling.
#[derive(Debug, Default)]
pub struct JumpManager {
    /// Stack of loop contexts (innermost last)
    loops: Vec<LoopContext>,
}

/// Context for a single loop.
#[derive(Debug)]
struct LoopContext {
    /// Backward target for continue statements, when already known
    continue_target: Option<usize>,
    /// Pending forward continue jumps
    continue_labels: Vec<JumpLabel>,
    /// Pending break jumps to patch when loop exits
    break_labels: Vec<JumpLabel>,
}

/// Where a `continue` in the innermost loop should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueTarget {
    /// Jump back to a known offset.
    Backward(usize),
    /// Jump forward to a target patched later.
    Forward,
}

impl JumpManager {
    /// Create a new jump manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new loop context.
    ///
    /// # Arguments
    /// * `continue_target` - The offset continue statements jump back to, or
    ///   `None` when continue jumps forward
    pub fn enter_loop(&mut self, continue_target: Option<usize>) {
        self.loops.push(LoopContext {
            continue_target,
            continue_labels: Vec::new(),
            break_labels: Vec::new(),
        });
    }

    /// Exit the current loop context.
    ///
    /// Returns the break labels that need to be patched to jump past the loop.
    pub fn exit_loop(&mut self) -> Vec<JumpLabel> {
        self.loops
            .pop()
            .map(|ctx| ctx.break_labels)
            .unwrap_or_default()
    }

    /// Take the pending forward continue jumps of the innermost loop.
    pub fn take_continues(&mut self) -> Vec<JumpLabel> {
        self.loops
            .last_mut()
            .map(|ctx| std::mem::take(&mut ctx.continue_labels))
            .unwrap_or_default()
    }

    /// Check if we're currently inside a loop.
    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    /// Add a break label to be patched when the loop exits.
    pub fn add_break(&mut self, label: JumpLabel) {
        if let Some(ctx) = self.loops.last_mut() {
            ctx.break_labels.push(label);
        }
    }

    /// Add a forward continue label.
    pub fn add_continue(&mut self, label: JumpLabel) {
        if let Some(ctx) = self.loops.last_mut() {
            ctx.continue_labels.push(label);
        }
    }

    /// Get the continue target for the current loop.
    ///
    /// Returns an error if not inside a loop.
    pub fn continue_target(&self) -> Result<ContinueTarget, super::BreakError> {
        self.loops
            .last()
            .map(|ctx| match ctx.continue_target {
                Some(offset) => ContinueTarget::Backward(offset),
                None => ContinueTarget::Forward,
            })
            .ok_or(super::BreakError::NotInLoop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_not_in_loop() {
        let manager = JumpManager::new();
        assert!(!manager.in_loop());
    }

    #[test]
    fn nested_loops() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Some(10));
        manager.enter_loop(None);

        assert_eq!(manager.continue_target(), Ok(ContinueTarget::Forward));

        manager.exit_loop();
        assert!(manager.in_loop());
        assert_eq!(manager.continue_target(), Ok(ContinueTarget::Backward(10)));

        manager.exit_loop();
        assert!(!manager.in_loop());
    }

    #[test]
    fn exit_loop_returns_breaks() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Some(10));
        manager.add_break(JumpLabel(100));
        manager.add_break(JumpLabel(110));

        let breaks = manager.exit_loop();
        assert_eq!(breaks.len(), 2);
        assert_eq!(breaks[0].0, 100);
        assert_eq!(breaks[1].0, 110);
    }

    #[test]
    fn forward_continues_are_taken_once() {
        let mut manager = JumpManager::new();
        manager.enter_loop(None);
        manager.add_continue(JumpLabel(7));

        assert_eq!(manager.take_continues().len(), 1);
        assert!(manager.take_continues().is_empty());
    }

    #[test]
    fn continue_target_error_outside_loop() {
        let manager = JumpManager::new();
        assert!(manager.continue_target().is_err());
        let mut manager = manager;
        assert!(manager.exit_loop().is_empty());
    }
}

//! Local scope management for function checking.
//!
//! This module provides `LocalScope` for tracking local variables while a
//! function body is checked. It handles:
//! - Variable declaration with frame slot allocation
//! - Nested block scopes (if/while/for bodies)
//! - Variable shadowing with proper restoration on scope exit
//! - Lookups through enclosing functions for closures
//!
//! Module-level names (globals, functions, types) live in the checker, not
//! here.

use abra_core::{Span, Type, TypecheckError, TypecheckErrorKind};
use rustc_hash::FxHashMap;

// ============================================================================
// Types
// ============================================================================

/// How a local name was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Val,
    Var,
    Param,
    /// A nested function, stored as a closure.
    Function(u32),
}

/// Information about a local variable.
#[derive(Debug, Clone)]
pub struct LocalVar {
    /// Variable name
    pub name: String,
    /// Variable type (unused for functions, whose signature is in the function table)
    pub ty: Type,
    /// Frame slot index
    pub slot: u16,
    /// Scope depth where declared
    pub depth: u32,
    pub kind: LocalKind,
    /// Source location of declaration
    pub span: Span,
}

impl LocalVar {
    pub fn is_mutable(&self) -> bool {
        self.kind == LocalKind::Var
    }
}

/// Result of variable lookup.
#[derive(Debug, Clone)]
pub enum VarLookup {
    /// Variable of the function being checked
    Local(LocalVar),
    /// Variable of an enclosing function, `depth` frames out
    Captured { depth: u8, var: LocalVar },
}

// ============================================================================
// LocalScope
// ============================================================================

/// Local scope for a function being checked.
///
/// Slots are never reused: closures keep their defining environment alive,
/// so a slot must keep its meaning for the whole call.
#[derive(Debug, Default)]
pub struct LocalScope {
    /// Variables by name in current scope chain
    variables: FxHashMap<String, LocalVar>,

    /// Current scope depth (0 = function scope)
    scope_depth: u32,

    /// Stack of shadowed variables (shadowing_depth, name, old_var)
    shadowed: Vec<(u32, String, LocalVar)>,

    /// Next available frame slot
    next_slot: u16,

    /// Number of enclosing loops within this function
    loop_depth: u32,

    /// Enclosing function (for nested functions and lambdas)
    parent: Option<Box<LocalScope>>,
}

impl LocalScope {
    /// Create a new local scope for a function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope for a function nested in `parent`.
    pub fn nested(parent: LocalScope) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            ..Self::default()
        }
    }

    // ==========================================================================
    // Scope Management
    // ==========================================================================

    /// Enter a new scope (block, if body, loop body, etc.).
    pub fn push_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Exit the current scope, removing variables declared in it.
    pub fn pop_scope(&mut self) {
        let depth = self.scope_depth;
        self.variables.retain(|_, var| var.depth < depth);

        // Restore any shadowed variables from this depth
        while let Some((shadowing_depth, _, _)) = self.shadowed.last() {
            if *shadowing_depth != depth {
                break;
            }
            if let Some((_, name, var)) = self.shadowed.pop() {
                self.variables.insert(name, var);
            }
        }

        self.scope_depth = depth.saturating_sub(1);
    }

    /// Get current scope depth.
    pub fn depth(&self) -> u32 {
        self.scope_depth
    }

    pub fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    /// Whether `break`/`continue` are allowed here.
    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    // ==========================================================================
    // Variable Declaration
    // ==========================================================================

    /// Declare a new local variable.
    ///
    /// Returns the slot number, or error if already declared at same depth.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        kind: LocalKind,
        span: Span,
    ) -> Result<u16, TypecheckError> {
        if let Some(existing) = self.variables.get(name) {
            if existing.depth == self.scope_depth {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::DuplicateDeclaration,
                    span,
                    format!("Duplicate declaration of '{name}'"),
                ));
            }
            self.shadowed
                .push((self.scope_depth, name.to_string(), existing.clone()));
        }

        let slot = self.allocate_slot(span)?;
        let var = LocalVar {
            name: name.to_string(),
            ty,
            slot,
            depth: self.scope_depth,
            kind,
            span,
        };
        self.variables.insert(name.to_string(), var);
        Ok(slot)
    }

    /// Allocate a slot that no name refers to.
    pub fn allocate_hidden(&mut self, span: Span) -> Result<u16, TypecheckError> {
        self.allocate_slot(span)
    }

    fn allocate_slot(&mut self, span: Span) -> Result<u16, TypecheckError> {
        let slot = self.next_slot;
        self.next_slot = slot.checked_add(1).ok_or_else(|| {
            TypecheckError::new(
                TypecheckErrorKind::InvalidDeclaration,
                span,
                "Too many local variables in one function",
            )
        })?;
        Ok(slot)
    }

    // ==========================================================================
    // Variable Lookup
    // ==========================================================================

    /// Look up a variable in this function only.
    pub fn get(&self, name: &str) -> Option<&LocalVar> {
        self.variables.get(name)
    }

    /// Look up a variable, walking out through enclosing functions.
    pub fn lookup(&self, name: &str) -> Option<VarLookup> {
        if let Some(var) = self.variables.get(name) {
            return Some(VarLookup::Local(var.clone()));
        }

        let mut depth: u8 = 0;
        let mut scope = self.parent.as_deref();
        while let Some(current) = scope {
            depth = depth.saturating_add(1);
            if let Some(var) = current.variables.get(name) {
                return Some(VarLookup::Captured {
                    depth,
                    var: var.clone(),
                });
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Check if a name is declared in the current scope (not parent scopes).
    pub fn is_declared_in_current_scope(&self, name: &str) -> bool {
        self.variables
            .get(name)
            .is_some_and(|v| v.depth == self.scope_depth)
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    /// Number of frame slots the function needs.
    pub fn frame_size(&self) -> u16 {
        self.next_slot
    }

    /// Take the parent scope (for returning from nested function checking).
    pub fn take_parent(&mut self) -> Option<LocalScope> {
        self.parent.take().map(|b| *b)
    }
}

// ============================================================================
// Tests
// ============================================================================

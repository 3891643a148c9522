// src/core/lifecycle.rs

//! The master's lifecycle state machine.
//!
//! Transitions only move forward (`Stopped -> Initialized -> Running`) and are
//! driven by a single control task. Calling a lifecycle step out of order is a
//! bug in the embedding process, so the guarded transitions panic instead of
//! returning an error.

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum LifecycleState {
    Stopped,
    Initialized,
    Running,
}

/// A single-writer cell holding the current `LifecycleState`.
#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LifecycleState::Stopped),
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Panics unless the current state is `required`.
    pub fn require(&self, required: LifecycleState, operation: &str) {
        let current = self.current();
        assert_eq!(
            current, required,
            "{operation} requires lifecycle state {required}, but the master is {current}"
        );
    }

    /// Moves from `from` to `to`, panicking if the current state is not `from`.
    pub fn advance(&self, from: LifecycleState, to: LifecycleState) {
        let mut state = self.state.write();
        assert_eq!(
            *state, from,
            "illegal lifecycle transition {} -> {to}: expected to be {from}",
            *state
        );
        *state = to;
    }

    /// Unconditionally returns to `Stopped`, yielding the previous state.
    pub fn stop(&self) -> LifecycleState {
        std::mem::replace(&mut *self.state.write(), LifecycleState::Stopped)
    }
}

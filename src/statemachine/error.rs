//! Statemachine error types
//!
//! All of these are configuration faults: a table that references a state it
//! does not declare, or a machine whose lock is held far longer than any
//! transition should take.

use std::time::Duration;

use thiserror::Error;

/// Error type for statemachine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    /// Initial state id missing from the table
    #[error("statemachine {machine}: initial state {state} not found in states")]
    InitialStateNotFound {
        /// Machine name
        machine: String,
        /// Requested initial state id
        state: String,
    },

    /// Two states share an id
    #[error("statemachine {machine}: state {state} declared twice")]
    DuplicateState {
        /// Machine name
        machine: String,
        /// Duplicated state id
        state: String,
    },

    /// A transition targets a state missing from the table
    #[error("statemachine {machine}: next state {state} not found")]
    UnknownState {
        /// Machine name
        machine: String,
        /// Missing target state id
        state: String,
    },

    /// The machine lock could not be taken in time
    #[error("statemachine {machine}: failed to lock within {timeout:?}")]
    LockTimeout {
        /// Machine name
        machine: String,
        /// Configured lock timeout
        timeout: Duration,
    },
}

impl StateMachineError {
    /// Whether retrying the same wakeup can never succeed
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StateMachineError::LockTimeout { .. })
    }
}

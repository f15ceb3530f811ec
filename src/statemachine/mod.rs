//! Transition-table scheduler
//!
//! A `Statemachine` holds a fixed table of states. Each state lists its
//! transitions in evaluation order; each transition is a handler returning
//! `Stay` or `Advance` and the state it leads to. Nothing happens until
//! somebody calls `wakeup()`, typically a `Driver` woken by the data layer.
//!
//! ```text
//!   wakeup() ──► lock ──► current.transitions[0] ──► Stay
//!                          current.transitions[1] ──► Advance ──► commit
//!                                                                 │
//!          waiters ◄── notify ◄── unlock ◄── change callback ◄────┘
//! ```
//!
//! A transition targeting its own state is the state's body: it runs on every
//! wakeup and never counts as a state change.

pub mod config;
pub mod driver;
pub mod error;
pub mod machine;
pub mod state;

pub use config::MachineConfig;
pub use driver::{spawn_driver, Driver, WakeSignal};
pub use error::StateMachineError;
pub use machine::{ChangeCallback, Statemachine, LOOP_COUNT_RESTART};
pub use state::{State, StateId, Transition, TransitionStatus};

//! States and transitions of a transition table
//!
//! A table is a plain `Vec<State<T, X>>`. `T` is the state id and `X` the
//! context value the machine hands to every transition handler by reference.
//!
//! ```
//! use acquire_rs::statemachine::{State, Transition, TransitionStatus};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Link { Down, Up }
//!
//! let table: Vec<State<Link, ()>> = vec![
//!     State::new("down", Link::Down, vec![
//!         Transition::new(Link::Up, |_: &()| TransitionStatus::Advance),
//!     ]),
//!     State::new("up", Link::Up, vec![]),
//! ];
//! assert_eq!(table[0].transitions().len(), 1);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Outcome of a transition handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    /// Keep evaluating; this transition does not fire
    Stay,
    /// Move to the transition's target state
    Advance,
}

impl TransitionStatus {
    /// `Advance` when `condition` holds, `Stay` otherwise
    pub fn advance_if(condition: bool) -> Self {
        if condition {
            TransitionStatus::Advance
        } else {
            TransitionStatus::Stay
        }
    }
}

/// Identifier of a state
pub trait StateId: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> StateId for T where T: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

type Handler<X> = Arc<dyn Fn(&X) -> TransitionStatus + Send + Sync>;

/// One edge of the table: a handler and the state it leads to
pub struct Transition<T, X> {
    target: T,
    handler: Handler<X>,
}

impl<T: StateId, X> Transition<T, X> {
    /// Create a transition to `target` guarded by `handler`
    pub fn new<F>(target: T, handler: F) -> Self
    where
        F: Fn(&X) -> TransitionStatus + Send + Sync + 'static,
    {
        Self {
            target,
            handler: Arc::new(handler),
        }
    }

    /// Target state id
    pub fn target(&self) -> T {
        self.target
    }

    /// Run the handler against the machine context
    pub fn evaluate(&self, context: &X) -> TransitionStatus {
        (self.handler)(context)
    }
}

impl<T: Clone, X> Clone for Transition<T, X> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T: fmt::Debug, X> fmt::Debug for Transition<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// A named state and its ordered transitions
///
/// Transitions are evaluated in declaration order. Placing the state's own
/// body first (a transition targeting the state itself) makes it run on
/// every wakeup, while the transitions after it can still preempt it.
pub struct State<T, X> {
    name: String,
    id: T,
    transitions: Vec<Transition<T, X>>,
}

impl<T: StateId, X> State<T, X> {
    /// Create a state
    pub fn new(name: impl Into<String>, id: T, transitions: Vec<Transition<T, X>>) -> Self {
        Self {
            name: name.into(),
            id,
            transitions,
        }
    }

    /// State name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State id
    pub fn id(&self) -> T {
        self.id
    }

    /// Transitions in evaluation order
    pub fn transitions(&self) -> &[Transition<T, X>] {
        &self.transitions
    }
}

impl<T: Clone, X> Clone for State<T, X> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            id: self.id.clone(),
            transitions: self.transitions.clone(),
        }
    }
}

impl<T: fmt::Debug, X> fmt::Debug for State<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("transitions", &self.transitions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn test_advance_if() {
        assert_eq!(TransitionStatus::advance_if(true), TransitionStatus::Advance);
        assert_eq!(TransitionStatus::advance_if(false), TransitionStatus::Stay);
    }

    #[test]
    fn test_transition_reads_context() {
        let transition = Transition::new(2u8, |flag: &AtomicBool| {
            TransitionStatus::advance_if(flag.load(Ordering::SeqCst))
        });
        let flag = AtomicBool::new(false);

        assert_eq!(transition.evaluate(&flag), TransitionStatus::Stay);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(transition.evaluate(&flag), TransitionStatus::Advance);
        assert_eq!(transition.target(), 2);
    }

    #[test]
    fn test_state_keeps_declared_order() {
        let state: State<u8, ()> = State::new(
            "connecting",
            1,
            vec![
                Transition::new(1, |_: &()| TransitionStatus::Stay),
                Transition::new(0, |_: &()| TransitionStatus::Stay),
                Transition::new(2, |_: &()| TransitionStatus::Stay),
            ],
        );

        let targets: Vec<u8> = state.transitions().iter().map(Transition::target).collect();
        assert_eq!(targets, vec![1, 0, 2]);
        assert_eq!(state.name(), "connecting");
        assert_eq!(state.clone().id(), 1);
    }
}

//! Transition-table statemachine
//!
//! The machine is advanced by external `wakeup()` calls. Each wakeup runs the
//! current state's transitions in order under the instance lock; the first
//! one that reports `Advance` towards another state wins.
//!
//! # Caller contract
//!
//! Transition handlers and the change callback run with the lock held. They
//! must not call `wakeup()`: the lock is not re-entrant, so such a call gives
//! up with `LockTimeout` after the configured delay. Calling `reinit()` from
//! a handler is fine; it is deferred until the running wakeup returns.
//! Observers (`curr_state`, `prev_state`, `loop_count`, `current`) never
//! take the lock and may be called from anywhere.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use super::config::MachineConfig;
use super::error::StateMachineError;
use super::state::{State, StateId, TransitionStatus};

/// Value the loop counter restarts from instead of overflowing
pub const LOOP_COUNT_RESTART: u64 = 100;

/// Callback invoked with `(previous, current)` after every state change
pub type ChangeCallback<T, X> = Arc<dyn Fn(&State<T, X>, &State<T, X>) + Send + Sync>;

/// Indices of the current and previous states in the table
#[derive(Debug, Clone, Copy)]
struct Cursor {
    curr: usize,
    prev: usize,
}

impl Cursor {
    fn pack(self) -> u64 {
        ((self.curr as u64) << 32) | (self.prev as u64 & 0xFFFF_FFFF)
    }

    fn unpack(packed: u64) -> Self {
        Self {
            curr: (packed >> 32) as usize,
            prev: (packed & 0xFFFF_FFFF) as usize,
        }
    }
}

/// Concurrent transition-table statemachine
///
/// `T` identifies states, `X` is a context value shared by every transition
/// handler (flags, handles to the data layer, ...).
pub struct Statemachine<T, X = ()> {
    name: String,
    states: Vec<State<T, X>>,
    index: HashMap<T, usize>,
    initial: usize,
    context: X,

    /// Guards transition evaluation and the current/previous pointers
    cursor: Mutex<Cursor>,
    /// Signalled after every wakeup and reinit
    changed: Condvar,
    /// Lock-free mirror of `cursor` for observers
    phase: AtomicU64,

    loop_count: AtomicU64,
    enabled: AtomicBool,
    reinit_requested: AtomicBool,
    trace: AtomicBool,
    on_change: RwLock<Option<ChangeCallback<T, X>>>,
    config: MachineConfig,
}

impl<T: StateId, X> Statemachine<T, X> {
    /// Build a machine from its table, starting in `initial`
    pub fn new(
        name: impl Into<String>,
        states: Vec<State<T, X>>,
        initial: T,
        context: X,
    ) -> Result<Self, StateMachineError> {
        Self::with_config(name, states, initial, context, MachineConfig::default())
    }

    /// Build a machine with custom configuration
    pub fn with_config(
        name: impl Into<String>,
        states: Vec<State<T, X>>,
        initial: T,
        context: X,
        config: MachineConfig,
    ) -> Result<Self, StateMachineError> {
        let name = name.into();

        let mut index = HashMap::with_capacity(states.len());
        for (i, state) in states.iter().enumerate() {
            if index.insert(state.id(), i).is_some() {
                return Err(StateMachineError::DuplicateState {
                    machine: name,
                    state: format!("{:?}", state.id()),
                });
            }
        }

        let initial = match index.get(&initial) {
            Some(i) => *i,
            None => {
                return Err(StateMachineError::InitialStateNotFound {
                    machine: name,
                    state: format!("{:?}", initial),
                })
            }
        };

        let cursor = Cursor {
            curr: initial,
            prev: initial,
        };

        tracing::debug!(
            machine = %name,
            states = states.len(),
            initial = states[initial].name(),
            "Statemachine created"
        );

        Ok(Self {
            trace: AtomicBool::new(config.trace),
            name,
            states,
            index,
            initial,
            context,
            cursor: Mutex::new(cursor),
            changed: Condvar::new(),
            phase: AtomicU64::new(cursor.pack()),
            loop_count: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            reinit_requested: AtomicBool::new(false),
            on_change: RwLock::new(None),
            config,
        })
    }

    /// Register the change callback at construction time
    pub fn with_change_callback<F>(self, callback: F) -> Self
    where
        F: Fn(&State<T, X>, &State<T, X>) + Send + Sync + 'static,
    {
        self.set_change_callback(callback);
        self
    }

    /// Set (or replace) the callback run after every state change
    ///
    /// A panic inside the callback is caught and logged; the state change it
    /// reports stays committed.
    pub fn set_change_callback<F>(&self, callback: F)
    where
        F: Fn(&State<T, X>, &State<T, X>) + Send + Sync + 'static,
    {
        *self.on_change.write() = Some(Arc::new(callback));
    }

    /// Remove the change callback
    pub fn clear_change_callback(&self) {
        self.on_change.write().take();
    }

    /// Run one evaluation pass of the current state's transitions
    ///
    /// Does nothing while the machine is disabled. Fails if a firing
    /// transition targets a state missing from the table, or if the lock
    /// cannot be taken within the configured timeout.
    pub fn wakeup(&self) -> Result<(), StateMachineError> {
        if !self.is_enabled() {
            return Ok(());
        }

        self.bump_loop_count();

        let outcome = {
            let mut cursor = self.cursor.try_lock_for(self.config.lock_timeout).ok_or_else(|| {
                StateMachineError::LockTimeout {
                    machine: self.name.clone(),
                    timeout: self.config.lock_timeout,
                }
            })?;

            self.evaluate(&mut cursor)
        };

        self.changed.notify_all();

        // Also on error: a reinit requested by a handler must not be stranded
        fence(Ordering::SeqCst);
        if self.reinit_requested.load(Ordering::SeqCst) {
            tracing::info!(machine = %self.name, "Applying deferred reinit");
            self.reinit();
        }

        outcome
    }

    /// Run the current state's transitions; the caller holds the lock
    fn evaluate(&self, cursor: &mut Cursor) -> Result<(), StateMachineError> {
        let current = &self.states[cursor.curr];

        for transition in current.transitions() {
            if transition.evaluate(&self.context) != TransitionStatus::Advance
                || transition.target() == current.id()
            {
                continue;
            }

            let Some(next) = self.index.get(&transition.target()).copied() else {
                tracing::error!(
                    machine = %self.name,
                    from = current.name(),
                    target = ?transition.target(),
                    "Next state not found"
                );
                return Err(StateMachineError::UnknownState {
                    machine: self.name.clone(),
                    state: format!("{:?}", transition.target()),
                });
            };

            self.commit(cursor, next);
            break;
        }

        Ok(())
    }

    /// Go back to the initial state
    ///
    /// Never blocks. The request is recorded first; if the lock is busy (a
    /// wakeup is running) false is returned and the holder applies it after
    /// releasing the lock. Every path that applies a reinit re-checks the
    /// request once the lock is released, so a request cannot fall between a
    /// failed attempt and the holder's check. A request made while only a
    /// `wait`/`wait_for` caller holds the lock stays pending until the next
    /// wakeup.
    pub fn reinit(&self) -> bool {
        self.reinit_requested.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let mut applied = false;
        while self.reinit_requested.load(Ordering::SeqCst) {
            let Some(mut cursor) = self.cursor.try_lock() else {
                break;
            };

            if self.reinit_requested.swap(false, Ordering::SeqCst) {
                self.commit(&mut cursor, self.initial);
                applied = true;
            }
            drop(cursor);

            self.changed.notify_all();
            fence(Ordering::SeqCst);
        }

        if !applied {
            tracing::info!(machine = %self.name, "Unable to reinit now, deferred");
        }
        applied
    }

    /// Whether a deferred reinit is waiting for the next wakeup
    pub fn reinit_pending(&self) -> bool {
        self.reinit_requested.load(Ordering::SeqCst)
    }

    /// Resume transition evaluation
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Suspend transition evaluation; the current state is kept
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Whether wakeups evaluate transitions
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Log state changes at `info` (true) or `debug` (false)
    pub fn set_trace(&self, enabled: bool) {
        self.trace.store(enabled, Ordering::Relaxed);
    }

    /// Block until the current state is `id`
    ///
    /// Disabling the machine does not release a waiter.
    pub fn wait(&self, id: T) {
        let mut cursor = self.cursor.lock();
        self.changed
            .wait_while(&mut cursor, |c| self.states[c.curr].id() != id);
    }

    /// Block until the current state is `id` or `timeout` elapses
    ///
    /// Returns whether the state was reached. A timeout too large to be
    /// represented as a deadline waits without limit, like `wait`.
    pub fn wait_for(&self, id: T, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait(id);
            return true;
        };

        let Some(mut cursor) = self.cursor.try_lock_until(deadline) else {
            return self.curr_state() == id;
        };

        self.changed
            .wait_while_until(&mut cursor, |c| self.states[c.curr].id() != id, deadline);

        self.states[cursor.curr].id() == id
    }

    /// Current state id
    pub fn curr_state(&self) -> T {
        self.current().id()
    }

    /// Previous state id
    pub fn prev_state(&self) -> T {
        self.previous().id()
    }

    /// Current state
    pub fn current(&self) -> &State<T, X> {
        &self.states[self.snapshot().curr]
    }

    /// Previous state
    pub fn previous(&self) -> &State<T, X> {
        &self.states[self.snapshot().prev]
    }

    /// Number of wakeups since the current state was entered
    pub fn loop_count(&self) -> u64 {
        self.loop_count.load(Ordering::Relaxed)
    }

    /// Machine name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context shared by the transition handlers
    pub fn context(&self) -> &X {
        &self.context
    }

    /// Look a state up by id
    pub fn state(&self, id: T) -> Option<&State<T, X>> {
        self.index.get(&id).map(|i| &self.states[*i])
    }

    /// Every state, in table order
    pub fn states(&self) -> &[State<T, X>] {
        &self.states
    }

    /// Get the configuration
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    fn snapshot(&self) -> Cursor {
        Cursor::unpack(self.phase.load(Ordering::Acquire))
    }

    fn bump_loop_count(&self) {
        // fetch_update only fails when the closure returns None
        let _ = self
            .loop_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(if n >= u64::MAX - 1 {
                    LOOP_COUNT_RESTART
                } else {
                    n + 1
                })
            });
    }

    /// Move to `next`; the caller holds the lock
    fn commit(&self, cursor: &mut Cursor, next: usize) {
        cursor.prev = cursor.curr;
        cursor.curr = next;
        self.loop_count.store(0, Ordering::Relaxed);
        self.phase.store(cursor.pack(), Ordering::Release);

        let prev = &self.states[cursor.prev];
        let curr = &self.states[cursor.curr];

        if self.trace.load(Ordering::Relaxed) {
            tracing::info!(machine = %self.name, from = prev.name(), to = curr.name(), "State changed");
        } else {
            tracing::debug!(machine = %self.name, from = prev.name(), to = curr.name(), "State changed");
        }

        let callback = self.on_change.read().clone();
        if let Some(callback) = callback {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(prev, curr))).is_err() {
                tracing::error!(
                    machine = %self.name,
                    from = prev.name(),
                    to = curr.name(),
                    "Error during transition callback"
                );
            }
        }
    }
}

impl<T: StateId, X> fmt::Debug for Statemachine<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statemachine")
            .field("name", &self.name)
            .field("current", &self.curr_state())
            .field("previous", &self.prev_state())
            .field("loop_count", &self.loop_count())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

//! Driving loops
//!
//! A statemachine only moves when `wakeup()` is called. These helpers call it
//! periodically and whenever the data layer reports new data, either from a
//! dedicated thread (`Driver`) or from a tokio task (`spawn_driver`).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use super::machine::Statemachine;
use super::state::StateId;
use crate::data::DataHooks;

/// Latching wake-up flag shared between producers and a driving thread
///
/// Install it as the handler hooks so that every push and every eof wakes
/// the loop early. Notifications that arrive while the loop is busy are kept
/// and consumed by the next wait.
#[derive(Debug, Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake the waiter
    pub fn notify(&self) {
        *self.pending.lock() = true;
        self.cond.notify_one();
    }

    /// Wait for a notification for at most `timeout`
    ///
    /// Returns true if woken by a notification, false on timeout. The flag is
    /// cleared either way.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if !*pending {
            self.cond.wait_for(&mut pending, timeout);
        }
        std::mem::take(&mut *pending)
    }
}

impl<C> DataHooks<C> for WakeSignal {
    fn data_pushed(&self, _channel: &C) {
        self.notify();
    }

    fn eof(&self, _channel: &C) {
        self.notify();
    }
}

/// Thread calling `wakeup()` every period or on signal
///
/// Stops when `stop()` is called, when it is dropped, or when a wakeup fails
/// with a fatal error.
#[derive(Debug)]
pub struct Driver {
    name: String,
    stop: Arc<AtomicBool>,
    signal: Arc<WakeSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Driver {
    /// Start driving `machine` with a fresh signal
    pub fn spawn<T, X>(machine: Arc<Statemachine<T, X>>, period: Duration) -> io::Result<Self>
    where
        T: StateId,
        X: Send + Sync + 'static,
    {
        Self::spawn_with_signal(machine, Arc::new(WakeSignal::new()), period)
    }

    /// Start driving `machine`, woken early by `signal`
    pub fn spawn_with_signal<T, X>(
        machine: Arc<Statemachine<T, X>>,
        signal: Arc<WakeSignal>,
        period: Duration,
    ) -> io::Result<Self>
    where
        T: StateId,
        X: Send + Sync + 'static,
    {
        let name = machine.name().to_string();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new().name(format!("sm-{}", name)).spawn({
            let stop = Arc::clone(&stop);
            let signal = Arc::clone(&signal);
            move || run(&machine, &signal, &stop, period)
        })?;

        tracing::debug!(machine = %name, period = ?period, "Driver started");

        Ok(Self {
            name,
            stop,
            signal,
            handle: Some(handle),
        })
    }

    /// Signal waking this driver
    pub fn signal(&self) -> &Arc<WakeSignal> {
        &self.signal
    }

    /// Whether the driving thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        self.signal.notify();

        if handle.join().is_err() {
            tracing::error!(machine = %self.name, "Driver thread panicked");
        } else {
            tracing::debug!(machine = %self.name, "Driver stopped");
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: StateId, X>(
    machine: &Statemachine<T, X>,
    signal: &WakeSignal,
    stop: &AtomicBool,
    period: Duration,
) {
    while !stop.load(Ordering::Acquire) {
        if let Err(e) = machine.wakeup() {
            if e.is_fatal() {
                tracing::error!(machine = %machine.name(), error = %e, "Driving loop stopped");
                return;
            }
            tracing::warn!(machine = %machine.name(), error = %e, "Wakeup failed");
        }
        signal.wait_timeout(period);
    }
}

/// Drive `machine` from a tokio task
///
/// Wakes on every tick of `period` and on every `notify`. Wakeups run on the
/// blocking pool since transition handlers may block. Pair it with a
/// `Handler` built with the same `Arc<Notify>` as hooks.
pub fn spawn_driver<T, X>(
    machine: Arc<Statemachine<T, X>>,
    notify: Arc<Notify>,
    period: Duration,
) -> tokio::task::JoinHandle<()>
where
    T: StateId,
    X: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = notify.notified() => {}
            }

            let sm = Arc::clone(&machine);
            match tokio::task::spawn_blocking(move || sm.wakeup()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_fatal() => {
                    tracing::error!(machine = %machine.name(), error = %e, "Driving task stopped");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(machine = %machine.name(), error = %e, "Wakeup failed");
                }
                Err(e) => {
                    tracing::error!(machine = %machine.name(), error = %e, "Wakeup panicked");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::data::Handler;
    use crate::statemachine::{State, Transition, TransitionStatus};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Link {
        Waiting,
        Receiving,
    }

    type Shared = Arc<Handler<&'static str>>;

    /// Waiting advances as soon as the consumer's queue has data
    fn link_machine(handler: Shared) -> Arc<Statemachine<Link, Shared>> {
        let key = handler.register_consumer();
        handler.subscribe(&"us", key).unwrap();

        let states = vec![
            State::new(
                "waiting",
                Link::Waiting,
                vec![Transition::new(Link::Receiving, move |h: &Shared| {
                    TransitionStatus::advance_if(h.queue_len(&"us", key).unwrap_or(0) > 0)
                })],
            ),
            State::new("receiving", Link::Receiving, vec![]),
        ];

        Arc::new(Statemachine::new("link", states, Link::Waiting, handler).unwrap())
    }

    #[test]
    fn test_signal_latches() {
        let signal = WakeSignal::new();

        signal.notify();
        assert!(signal.wait_timeout(Duration::from_millis(1)));
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_signal_as_hooks() {
        let signal = WakeSignal::new();

        DataHooks::<&str>::data_pushed(&signal, &"us");
        assert!(signal.wait_timeout(Duration::ZERO));

        DataHooks::<&str>::eof(&signal, &"us");
        assert!(signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_driver_wakes_on_push() {
        let signal = Arc::new(WakeSignal::new());
        let handler: Arc<Handler<&'static str>> =
            Arc::new(Handler::with_hooks(Default::default(), signal.clone()));
        handler.add_channel_default("us").unwrap();

        let machine = link_machine(handler.clone());
        // A long period: only the push signal can advance the machine in time
        let driver =
            Driver::spawn_with_signal(machine.clone(), signal, Duration::from_secs(30)).unwrap();

        let start = Instant::now();
        handler.push(&"us", vec![1u8, 2, 3]).unwrap();

        assert!(machine.wait_for(Link::Receiving, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(5));

        assert!(driver.is_running());
        driver.stop();
    }

    #[test]
    fn test_driver_stops_on_fatal_error() {
        let states = vec![State::new(
            "orphan",
            1u8,
            vec![Transition::new(9u8, |_: &()| TransitionStatus::Advance)],
        )];
        let machine = Arc::new(Statemachine::new("orphan", states, 1u8, ()).unwrap());
        let driver = Driver::spawn(machine, Duration::from_millis(5)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!driver.is_running());
    }

    #[tokio::test]
    async fn test_spawn_driver_wakes_on_notify() {
        let notify = Arc::new(Notify::new());
        let handler: Arc<Handler<&'static str>> =
            Arc::new(Handler::with_hooks(Default::default(), notify.clone()));
        tokio_test::assert_ok!(handler.add_channel_default("us"));

        let machine = link_machine(handler.clone());
        let task = spawn_driver(machine.clone(), notify, Duration::from_secs(30));

        // Let the first immediate tick go through
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(machine.curr_state(), Link::Waiting);

        tokio_test::assert_ok!(handler.push(&"us", vec![0u8; 4]));

        let reached = {
            let machine = machine.clone();
            tokio::task::spawn_blocking(move || {
                machine.wait_for(Link::Receiving, Duration::from_secs(5))
            })
            .await
            .unwrap()
        };
        assert!(reached);

        task.abort();
    }
}

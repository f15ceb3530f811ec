//! Application hooks
//!
//! The handler calls `data_pushed` synchronously, on the producer's thread,
//! after every accepted push. It never calls `eof` itself: that hook is for
//! application logic reporting the end of acquisition (see
//! [`Producer::finish`](super::Producer::finish)).

/// Callbacks supplied by the surrounding pipeline
///
/// Both methods default to doing nothing. Implementations run on producer
/// threads and must not block.
pub trait DataHooks<C>: Send + Sync {
    /// A buffer was accepted on `channel`
    fn data_pushed(&self, channel: &C) {
        let _ = channel;
    }

    /// Upstream acquisition on `channel` has ended
    fn eof(&self, channel: &C) {
        let _ = channel;
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<C> DataHooks<C> for NoHooks {}

impl<C> DataHooks<C> for tokio::sync::Notify {
    fn data_pushed(&self, _channel: &C) {
        self.notify_one();
    }

    fn eof(&self, _channel: &C) {
        self.notify_one();
    }
}

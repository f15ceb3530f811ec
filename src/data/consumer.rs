//! Consumer handle

use std::sync::Arc;
use std::time::Duration;

use super::buffer::{Buffer, ConsumerKey};
use super::error::DataError;
use super::handler::{ChannelId, ChunkStatus, Handler};

/// Reads one private queue per channel out of a handler
///
/// Creating a consumer registers a fresh key; dropping it unregisters the key
/// and releases whatever was still queued for it. A consumer is enrolled in
/// the channels added or reinitialized after its creation, or explicitly
/// through [`subscribe`](Self::subscribe).
pub struct Consumer<C: ChannelId> {
    key: ConsumerKey,
    handler: Arc<Handler<C>>,
}

impl<C: ChannelId> Consumer<C> {
    /// Register a new consumer on `handler`
    pub fn new(handler: Arc<Handler<C>>) -> Self {
        let key = handler.register_consumer();
        Self { key, handler }
    }

    /// This consumer's key
    pub fn key(&self) -> ConsumerKey {
        self.key
    }

    /// Enroll in `channel` now instead of waiting for its next reinit
    pub fn subscribe(&self, channel: &C) -> Result<(), DataError> {
        self.handler.subscribe(channel, self.key).inspect_err(|e| {
            tracing::error!(consumer = %self.key, channel = %channel, error = %e, "Consumer failed to subscribe");
        })
    }

    /// Pop the oldest buffer, blocking until one arrives
    pub fn pop(&self, channel: &C) -> Result<Buffer, DataError> {
        self.handler.pop(channel, self.key).inspect_err(|e| {
            tracing::error!(consumer = %self.key, channel = %channel, error = %e, "Consumer failed to pop elt");
        })
    }

    /// Pop the oldest buffer, waiting at most `timeout`
    pub fn pop_timeout(&self, channel: &C, timeout: Duration) -> Result<Option<Buffer>, DataError> {
        self.handler
            .pop_timeout(channel, self.key, timeout)
            .inspect_err(|e| {
                tracing::error!(consumer = %self.key, channel = %channel, error = %e, "Consumer failed to pop elt");
            })
    }

    /// Pop the oldest buffer if there is one
    pub fn try_pop(&self, channel: &C) -> Result<Option<Buffer>, DataError> {
        self.handler.try_pop(channel, self.key).inspect_err(|e| {
            tracing::error!(consumer = %self.key, channel = %channel, error = %e, "Consumer failed to pop elt");
        })
    }

    /// Pop exactly `n` buffers without blocking
    pub fn pop_chunk(&self, channel: &C, n: usize) -> Result<ChunkStatus, DataError> {
        self.handler.pop_chunk(channel, self.key, n).inspect_err(|e| {
            tracing::error!(consumer = %self.key, channel = %channel, error = %e, "Consumer failed to pop chunk");
        })
    }

    /// Number of buffers waiting in this consumer's queue
    pub fn queue_len(&self, channel: &C) -> Result<usize, DataError> {
        self.handler.queue_len(channel, self.key)
    }

    /// The handler this consumer reads from
    pub fn handler(&self) -> &Arc<Handler<C>> {
        &self.handler
    }
}

impl<C: ChannelId> Drop for Consumer<C> {
    fn drop(&mut self) {
        self.handler.unregister_consumer(self.key);
    }
}

impl<C: ChannelId> std::fmt::Debug for Consumer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").field("key", &self.key).finish()
    }
}

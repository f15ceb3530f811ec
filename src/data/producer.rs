//! Producer handle

use std::sync::Arc;

use bytes::Bytes;

use super::error::DataError;
use super::handler::{ChannelId, Handler};

/// Pushes acquired samples into a handler
///
/// Holds no state of its own; clones share the same handler.
#[derive(Clone)]
pub struct Producer<C: ChannelId> {
    handler: Arc<Handler<C>>,
}

impl<C: ChannelId> Producer<C> {
    /// Create a producer bound to `handler`
    pub fn new(handler: Arc<Handler<C>>) -> Self {
        Self { handler }
    }

    /// Push one sample or frame to every consumer of `channel`
    pub fn push(&self, channel: &C, data: impl Into<Bytes>) -> Result<usize, DataError> {
        self.handler.push(channel, data).inspect_err(|e| {
            tracing::error!(channel = %channel, error = %e, "Producer failed to push data");
        })
    }

    /// Mark `channel` as ended without notifying the application
    pub fn set_eof(&self, channel: &C) -> Result<(), DataError> {
        self.handler.set_eof(channel).inspect_err(|e| {
            tracing::error!(channel = %channel, error = %e, "Producer failed to set eof");
        })
    }

    /// End acquisition on `channel`
    ///
    /// Sets the channel's eof flag, then runs the `eof` hook.
    pub fn finish(&self, channel: &C) -> Result<(), DataError> {
        self.set_eof(channel)?;
        self.handler.hooks().eof(channel);
        tracing::info!(channel = %channel, "Acquisition finished");
        Ok(())
    }

    /// The handler this producer pushes into
    pub fn handler(&self) -> &Arc<Handler<C>> {
        &self.handler
    }
}

//! Distribution layer error types
//!
//! Every variant is a wiring or sizing fault reported at the call site.
//! Not-ready conditions (empty queue, short chunk) are return values instead.

use thiserror::Error;

use super::buffer::ConsumerKey;

/// Error type for distribution handler operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// Channel was never added
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Consumer has no queue in this channel
    #[error("consumer {key} has no queue in channel {channel}")]
    UnknownConsumer {
        /// Channel name
        channel: String,
        /// Consumer key
        key: ConsumerKey,
    },

    /// Consumer key is not (or no longer) registered
    #[error("consumer {0} is not registered")]
    ConsumerNotRegistered(ConsumerKey),

    /// Channel added twice
    #[error("channel already exists: {0}")]
    ChannelExists(String),

    /// Payload length differs from the channel's fixed element size
    #[error("invalid element size on channel {channel}: expected {expected} bytes, got {actual}")]
    InvalidSize {
        /// Channel name
        channel: String,
        /// Configured element size
        expected: usize,
        /// Pushed payload length
        actual: usize,
    },

    /// Channel configured with a zero capacity
    #[error("channel {0} needs a non-zero capacity")]
    InvalidCapacity(String),
}

impl DataError {
    /// Whether the error comes from a missing channel or consumer
    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            DataError::UnknownChannel(_)
                | DataError::UnknownConsumer { .. }
                | DataError::ConsumerNotRegistered(_)
        )
    }
}

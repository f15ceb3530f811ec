//! Distribution handler implementation
//!
//! The handler owns every channel and fans pushed buffers out to the
//! per-consumer queues of that channel.
//!
//! # Locking
//!
//! Locks are per channel. The channel map sits behind a `RwLock` that is only
//! written when a channel is added; each channel has its own `Mutex` and a
//! `Condvar` signalled after every accepted push. Registered consumer keys
//! sit behind a separate `Mutex`. When more than one is needed they are taken
//! in the order consumers, channel map, channel.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};

use super::buffer::{Buffer, ConsumerKey};
use super::channel::Channel;
use super::config::{ChannelConfig, HandlerConfig};
use super::error::DataError;
use super::hooks::{DataHooks, NoHooks};
use super::stats::ChannelStats;

/// Keys are unique for the whole process, across handlers
static NEXT_CONSUMER_KEY: AtomicU64 = AtomicU64::new(1);

/// Identifier of a channel (a name or an enumerated tag)
pub trait ChannelId: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

impl<T> ChannelId for T where T: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

/// Result of a non-blocking chunk pop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Exactly the requested number of buffers, oldest first
    Ready(Vec<Buffer>),
    /// Fewer buffers than requested are queued; nothing was removed
    NotEnoughData,
    /// Fewer buffers than requested are queued and the stream has ended.
    /// Reported once, then the channel's eof flag is cleared.
    Eof,
}

impl ChunkStatus {
    /// Take the buffers out of a `Ready` status
    pub fn into_ready(self) -> Option<Vec<Buffer>> {
        match self {
            ChunkStatus::Ready(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Whether the status carries data
    pub fn is_ready(&self) -> bool {
        matches!(self, ChunkStatus::Ready(_))
    }
}

/// A channel and the condition variable its blocked consumers wait on
struct ChannelSlot {
    channel: Mutex<Channel>,
    available: Condvar,
}

impl ChannelSlot {
    fn new(channel: Channel) -> Self {
        Self {
            channel: Mutex::new(channel),
            available: Condvar::new(),
        }
    }
}

/// Multi-channel, multi-consumer broadcast queue
///
/// Producers never block: a consumer that falls behind by more than the
/// channel capacity loses the newest elements, not the oldest.
pub struct Handler<C> {
    /// Map of channel id to channel state
    channels: RwLock<HashMap<C, Arc<ChannelSlot>>>,

    /// Registered consumer keys
    consumers: Mutex<BTreeSet<ConsumerKey>>,

    /// Application callbacks
    hooks: Arc<dyn DataHooks<C>>,

    /// Configuration
    config: HandlerConfig,
}

impl<C: ChannelId> Handler<C> {
    /// Create a handler with default configuration and no hooks
    pub fn new() -> Self {
        Self::with_config(HandlerConfig::default())
    }

    /// Create a handler with custom configuration
    pub fn with_config(config: HandlerConfig) -> Self {
        Self::with_hooks(config, Arc::new(NoHooks))
    }

    /// Create a handler calling `hooks` after every accepted push
    pub fn with_hooks(config: HandlerConfig, hooks: Arc<dyn DataHooks<C>>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            consumers: Mutex::new(BTreeSet::new()),
            hooks,
            config,
        }
    }

    /// Get the handler configuration
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Get the application hooks
    pub fn hooks(&self) -> &Arc<dyn DataHooks<C>> {
        &self.hooks
    }

    /// Add a channel
    ///
    /// Every consumer registered so far gets an empty queue in it.
    pub fn add_channel(&self, name: C, config: ChannelConfig) -> Result<(), DataError> {
        check_capacity(&name, &config)?;

        let consumers = self.consumers.lock();
        let mut channels = self.channels.write();

        if channels.contains_key(&name) {
            return Err(DataError::ChannelExists(name.to_string()));
        }

        let channel = Channel::new(config, consumers.iter().copied());
        channels.insert(name.clone(), Arc::new(ChannelSlot::new(channel)));

        tracing::info!(
            channel = %name,
            element_size = config.element_size,
            capacity = config.capacity,
            consumers = consumers.len(),
            "Channel added"
        );

        Ok(())
    }

    /// Add a variable-size channel using the handler's default capacity
    pub fn add_channel_default(&self, name: C) -> Result<(), DataError> {
        let config = self.config.channel();
        self.add_channel(name, config)
    }

    /// Reinitialize a channel under a new configuration
    ///
    /// Drops the backlog of every queue, clears the eof flag and re-subscribes
    /// every registered consumer with an empty queue.
    pub fn reinit_channel(&self, name: &C, config: ChannelConfig) -> Result<(), DataError> {
        check_capacity(name, &config)?;

        let consumers = self.consumers.lock();
        let slot = self.slot(name)?;

        slot.channel.lock().reinit(config, consumers.iter().copied());
        // Blocked poppers re-check their queue
        slot.available.notify_all();

        tracing::info!(
            channel = %name,
            element_size = config.element_size,
            capacity = config.capacity,
            consumers = consumers.len(),
            "Channel reinitialized"
        );

        Ok(())
    }

    /// Register a new consumer and return its key
    ///
    /// The key is enrolled by the next `add_channel`/`reinit_channel` of each
    /// channel, or immediately with `subscribe`. Existing channels are not
    /// touched.
    pub fn register_consumer(&self) -> ConsumerKey {
        let key = ConsumerKey(NEXT_CONSUMER_KEY.fetch_add(1, Ordering::Relaxed));
        let mut consumers = self.consumers.lock();
        consumers.insert(key);

        tracing::debug!(consumer = %key, consumers = consumers.len(), "Consumer registered");

        key
    }

    /// Forget a consumer and drop its queue in every channel
    ///
    /// Returns false if the key was not registered.
    pub fn unregister_consumer(&self, key: ConsumerKey) -> bool {
        let mut consumers = self.consumers.lock();
        if !consumers.remove(&key) {
            return false;
        }

        let channels = self.channels.read();
        for slot in channels.values() {
            if slot.channel.lock().remove(key) {
                // A blocked pop for this key must fail instead of waiting forever
                slot.available.notify_all();
            }
        }

        tracing::debug!(consumer = %key, consumers = consumers.len(), "Consumer unregistered");

        true
    }

    /// Enroll a registered consumer into one channel right away
    pub fn subscribe(&self, name: &C, key: ConsumerKey) -> Result<(), DataError> {
        let consumers = self.consumers.lock();
        if !consumers.contains(&key) {
            return Err(DataError::ConsumerNotRegistered(key));
        }

        let slot = self.slot(name)?;
        slot.channel.lock().enroll(key);

        tracing::debug!(channel = %name, consumer = %key, "Consumer subscribed");

        Ok(())
    }

    /// Push a buffer to every consumer of a channel
    ///
    /// Returns the number of queues that accepted it. A full queue drops the
    /// new element with a warning and does not fail the push. On a
    /// fixed-size channel a payload of the wrong length is rejected as a
    /// whole. The `data_pushed` hook runs once, after the fan-out.
    pub fn push(&self, name: &C, data: impl Into<Bytes>) -> Result<usize, DataError> {
        let slot = self.slot(name)?;
        let buffer = Buffer::new(data);

        let (delivery, capacity) = {
            let mut channel = slot.channel.lock();

            if !channel.accepts_len(buffer.len()) {
                channel.record_rejected();
                let expected = channel.config().element_size;
                drop(channel);

                tracing::warn!(
                    channel = %name,
                    expected = expected,
                    actual = buffer.len(),
                    "Invalid element size, push rejected"
                );

                return Err(DataError::InvalidSize {
                    channel: name.to_string(),
                    expected,
                    actual: buffer.len(),
                });
            }

            (channel.fan_out(&buffer), channel.config().capacity)
        };

        for key in &delivery.dropped {
            tracing::warn!(
                channel = %name,
                consumer = %key,
                capacity = capacity,
                "Queue full, discarding data"
            );
        }

        slot.available.notify_all();
        self.hooks.data_pushed(name);

        Ok(delivery.delivered)
    }

    /// Pop the oldest buffer of a consumer, blocking until one is available
    ///
    /// There is no timeout and no cancellation: a consumer thread that must
    /// stop needs its own way out (a sentinel buffer, or `pop_timeout` with a
    /// stop flag).
    pub fn pop(&self, name: &C, key: ConsumerKey) -> Result<Buffer, DataError> {
        let slot = self.slot(name)?;
        let mut channel = slot.channel.lock();

        loop {
            let queue = channel
                .queue_mut(key)
                .ok_or_else(|| unknown_consumer(name, key))?;
            if let Some(buffer) = queue.pop() {
                return Ok(buffer);
            }
            slot.available.wait(&mut channel);
        }
    }

    /// Pop the oldest buffer of a consumer, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` if nothing arrived in time. A timeout too large to
    /// be represented as a deadline blocks like `pop`.
    pub fn pop_timeout(
        &self,
        name: &C,
        key: ConsumerKey,
        timeout: Duration,
    ) -> Result<Option<Buffer>, DataError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.pop(name, key).map(Some);
        };
        let slot = self.slot(name)?;
        let mut channel = slot.channel.lock();

        loop {
            let queue = channel
                .queue_mut(key)
                .ok_or_else(|| unknown_consumer(name, key))?;
            if let Some(buffer) = queue.pop() {
                return Ok(Some(buffer));
            }
            if slot.available.wait_until(&mut channel, deadline).timed_out() {
                let queue = channel
                    .queue_mut(key)
                    .ok_or_else(|| unknown_consumer(name, key))?;
                return Ok(queue.pop());
            }
        }
    }

    /// Pop the oldest buffer of a consumer if there is one
    pub fn try_pop(&self, name: &C, key: ConsumerKey) -> Result<Option<Buffer>, DataError> {
        let slot = self.slot(name)?;
        let mut channel = slot.channel.lock();
        let queue = channel
            .queue_mut(key)
            .ok_or_else(|| unknown_consumer(name, key))?;

        Ok(queue.pop())
    }

    /// Pop exactly `n` buffers of a consumer without blocking
    ///
    /// Either removes the `n` oldest buffers or leaves the queue untouched.
    /// When fewer than `n` are queued and the channel's eof flag is set, the
    /// flag is consumed and `Eof` is returned; later calls report
    /// `NotEnoughData` until eof is set again.
    pub fn pop_chunk(&self, name: &C, key: ConsumerKey, n: usize) -> Result<ChunkStatus, DataError> {
        let slot = self.slot(name)?;
        let mut channel = slot.channel.lock();
        let queue = channel
            .queue_mut(key)
            .ok_or_else(|| unknown_consumer(name, key))?;

        if let Some(chunk) = queue.pop_chunk(n) {
            return Ok(ChunkStatus::Ready(chunk));
        }

        if channel.take_eof() {
            tracing::debug!(channel = %name, consumer = %key, "End of stream reported");
            return Ok(ChunkStatus::Eof);
        }

        Ok(ChunkStatus::NotEnoughData)
    }

    /// Set the sticky end-of-stream flag of a channel
    pub fn set_eof(&self, name: &C) -> Result<(), DataError> {
        self.slot(name)?.channel.lock().set_eof(true);
        tracing::debug!(channel = %name, "End of stream set");
        Ok(())
    }

    /// Clear the end-of-stream flag of a channel
    pub fn reset_eof(&self, name: &C) -> Result<(), DataError> {
        self.slot(name)?.channel.lock().set_eof(false);
        Ok(())
    }

    /// Read the end-of-stream flag without consuming it
    pub fn is_eof(&self, name: &C) -> Result<bool, DataError> {
        Ok(self.slot(name)?.channel.lock().eof())
    }

    /// Number of buffers queued for a consumer
    pub fn queue_len(&self, name: &C, key: ConsumerKey) -> Result<usize, DataError> {
        self.slot(name)?
            .channel
            .lock()
            .queue_len(key)
            .ok_or_else(|| unknown_consumer(name, key))
    }

    /// Check if a channel exists
    pub fn has_channel(&self, name: &C) -> bool {
        self.channels.read().contains_key(name)
    }

    /// Get total number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Ids of all channels
    pub fn channel_ids(&self) -> Vec<C> {
        self.channels.read().keys().cloned().collect()
    }

    /// Number of registered consumers
    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Check if a consumer key is registered
    pub fn is_registered(&self, key: ConsumerKey) -> bool {
        self.consumers.lock().contains(&key)
    }

    /// Get channel statistics
    pub fn channel_stats(&self, name: &C) -> Option<ChannelStats> {
        let slot = self.channels.read().get(name).cloned()?;
        let stats = slot.channel.lock().stats();
        Some(stats)
    }

    fn slot(&self, name: &C) -> Result<Arc<ChannelSlot>, DataError> {
        self.channels
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::UnknownChannel(name.to_string()))
    }
}

impl<C: ChannelId> Default for Handler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ChannelId> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("channels", &self.channel_count())
            .field("consumers", &self.consumer_count())
            .field("config", &self.config)
            .finish()
    }
}

fn check_capacity<C: ChannelId>(name: &C, config: &ChannelConfig) -> Result<(), DataError> {
    if config.capacity == 0 {
        return Err(DataError::InvalidCapacity(name.to_string()));
    }
    Ok(())
}

fn unknown_consumer<C: ChannelId>(name: &C, key: ConsumerKey) -> DataError {
    DataError::UnknownConsumer {
        channel: name.to_string(),
        key,
    }
}

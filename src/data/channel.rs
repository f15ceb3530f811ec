//! Per-channel state
//!
//! A channel owns one queue per enrolled consumer, its configuration, the
//! sticky end-of-stream flag and a few counters. It is always accessed
//! through the channel lock held by the handler.

use std::collections::BTreeMap;
use std::time::Instant;

use super::buffer::{Buffer, ConsumerKey};
use super::config::ChannelConfig;
use super::queue::ChannelQueue;
use super::stats::{ChannelStats, QueueStats};

/// Outcome of a fan-out
#[derive(Debug, Default)]
pub(super) struct Delivery {
    /// Queues that accepted the buffer
    pub delivered: usize,
    /// Consumers whose queue was full
    pub dropped: Vec<ConsumerKey>,
}

/// State of a single channel
#[derive(Debug)]
pub struct Channel {
    /// Size and capacity, fixed until the next reinit
    config: ChannelConfig,

    /// One queue per enrolled consumer
    queues: BTreeMap<ConsumerKey, ChannelQueue>,

    /// Sticky end-of-stream flag
    eof: bool,

    /// Accepted pushes since the last (re)init
    pushed: u64,

    /// Per-queue drops caused by a full queue
    dropped: u64,

    /// Pushes refused because of a size mismatch
    rejected: u64,

    /// When the channel was last (re)initialized
    initialized_at: Instant,
}

impl Channel {
    /// Create a channel enrolling every given consumer
    pub(super) fn new(config: ChannelConfig, keys: impl IntoIterator<Item = ConsumerKey>) -> Self {
        let queues = keys
            .into_iter()
            .map(|key| (key, ChannelQueue::new(config.capacity)))
            .collect();

        Self {
            config,
            queues,
            eof: false,
            pushed: 0,
            dropped: 0,
            rejected: 0,
            initialized_at: Instant::now(),
        }
    }

    /// Replace every queue with an empty one under a new configuration
    pub(super) fn reinit(&mut self, config: ChannelConfig, keys: impl IntoIterator<Item = ConsumerKey>) {
        *self = Self::new(config, keys);
    }

    /// Current configuration
    pub fn config(&self) -> ChannelConfig {
        self.config
    }

    /// Add an empty queue for `key` if it has none
    pub(super) fn enroll(&mut self, key: ConsumerKey) {
        let capacity = self.config.capacity;
        self.queues
            .entry(key)
            .or_insert_with(|| ChannelQueue::new(capacity));
    }

    /// Remove the queue of `key`, releasing the buffers it held
    pub(super) fn remove(&mut self, key: ConsumerKey) -> bool {
        self.queues.remove(&key).is_some()
    }

    /// Whether `key` has a queue in this channel
    pub fn is_enrolled(&self, key: ConsumerKey) -> bool {
        self.queues.contains_key(&key)
    }

    /// Check a payload length against the fixed element size
    pub(super) fn accepts_len(&self, len: usize) -> bool {
        !self.config.is_fixed_size() || len == self.config.element_size
    }

    /// Count a push refused for its size
    pub(super) fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Enqueue a reference to `buffer` in every queue that has room
    pub(super) fn fan_out(&mut self, buffer: &Buffer) -> Delivery {
        let mut delivery = Delivery::default();

        for (key, queue) in self.queues.iter_mut() {
            if queue.push(buffer.clone()) {
                delivery.delivered += 1;
            } else {
                delivery.dropped.push(*key);
            }
        }

        self.pushed += 1;
        self.dropped += delivery.dropped.len() as u64;
        delivery
    }

    /// Queue of `key`
    pub(super) fn queue_mut(&mut self, key: ConsumerKey) -> Option<&mut ChannelQueue> {
        self.queues.get_mut(&key)
    }

    /// Number of elements buffered for `key`
    pub fn queue_len(&self, key: ConsumerKey) -> Option<usize> {
        self.queues.get(&key).map(ChannelQueue::len)
    }

    /// Whether the end-of-stream flag is set
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Set or clear the end-of-stream flag
    pub(super) fn set_eof(&mut self, eof: bool) {
        self.eof = eof;
    }

    /// Report and clear the end-of-stream flag
    pub(super) fn take_eof(&mut self) -> bool {
        std::mem::take(&mut self.eof)
    }

    /// Number of enrolled consumers
    pub fn consumer_count(&self) -> usize {
        self.queues.len()
    }

    /// Snapshot the channel statistics
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            element_size: self.config.element_size,
            capacity: self.config.capacity,
            eof: self.eof,
            pushed: self.pushed,
            dropped: self.dropped,
            rejected: self.rejected,
            uptime: self.initialized_at.elapsed(),
            queues: self
                .queues
                .iter()
                .map(|(key, queue)| QueueStats {
                    key: *key,
                    len: queue.len(),
                    size_bytes: queue.size_bytes(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: u64) -> Vec<ConsumerKey> {
        (1..=n).map(ConsumerKey).collect()
    }

    #[test]
    fn test_new_enrolls_all_keys() {
        let channel = Channel::new(ChannelConfig::variable(), keys(3));

        assert_eq!(channel.consumer_count(), 3);
        assert!(channel.is_enrolled(ConsumerKey(2)));
        assert!(!channel.eof());
    }

    #[test]
    fn test_fan_out_counts_drops() {
        let mut channel = Channel::new(ChannelConfig::variable().capacity(1), keys(2));
        let buf = Buffer::new(vec![1u8]);

        let first = channel.fan_out(&buf);
        assert_eq!(first.delivered, 2);
        assert!(first.dropped.is_empty());

        let second = channel.fan_out(&buf);
        assert_eq!(second.delivered, 0);
        assert_eq!(second.dropped, keys(2));

        let stats = channel.stats();
        assert_eq!(stats.pushed, 2);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_accepts_len() {
        let fixed = Channel::new(ChannelConfig::fixed(4), keys(1));
        assert!(fixed.accepts_len(4));
        assert!(!fixed.accepts_len(3));

        let variable = Channel::new(ChannelConfig::variable(), keys(1));
        assert!(variable.accepts_len(0));
        assert!(variable.accepts_len(1000));
    }

    #[test]
    fn test_reinit_clears_backlog_and_eof() {
        let mut channel = Channel::new(ChannelConfig::variable(), keys(2));
        channel.fan_out(&Buffer::new(vec![1u8]));
        channel.set_eof(true);

        channel.reinit(ChannelConfig::fixed(8).capacity(5), keys(2));

        assert!(!channel.eof());
        assert_eq!(channel.queue_len(ConsumerKey(1)), Some(0));
        assert_eq!(channel.config(), ChannelConfig::fixed(8).capacity(5));
        assert_eq!(channel.stats().pushed, 0);
    }

    #[test]
    fn test_take_eof_clears() {
        let mut channel = Channel::new(ChannelConfig::variable(), keys(1));
        channel.set_eof(true);

        assert!(channel.take_eof());
        assert!(!channel.take_eof());
    }

    #[test]
    fn test_enroll_and_remove() {
        let mut channel = Channel::new(ChannelConfig::variable(), keys(1));
        channel.fan_out(&Buffer::new(vec![1u8]));

        channel.enroll(ConsumerKey(1));
        assert_eq!(channel.queue_len(ConsumerKey(1)), Some(1));

        channel.enroll(ConsumerKey(9));
        assert_eq!(channel.queue_len(ConsumerKey(9)), Some(0));

        assert!(channel.remove(ConsumerKey(9)));
        assert!(!channel.remove(ConsumerKey(9)));
        assert_eq!(channel.consumer_count(), 1);
    }
}

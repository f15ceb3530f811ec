//! Channel statistics

use std::time::Duration;

use super::buffer::ConsumerKey;

/// Occupancy of one consumer queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Consumer owning the queue
    pub key: ConsumerKey,
    /// Buffered elements
    pub len: usize,
    /// Buffered payload bytes
    pub size_bytes: usize,
}

/// Statistics for a channel since its last (re)initialization
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Expected element size (0 = variable)
    pub element_size: usize,
    /// Per-consumer capacity
    pub capacity: usize,
    /// End-of-stream flag
    pub eof: bool,
    /// Accepted pushes
    pub pushed: u64,
    /// Elements dropped by full queues (counted per queue)
    pub dropped: u64,
    /// Pushes rejected for their size
    pub rejected: u64,
    /// Time since the channel was (re)initialized
    pub uptime: Duration,
    /// Per-consumer occupancy
    pub queues: Vec<QueueStats>,
}

impl ChannelStats {
    /// Number of enrolled consumers
    pub fn consumer_count(&self) -> usize {
        self.queues.len()
    }

    /// Elements buffered across all queues
    pub fn queued(&self) -> usize {
        self.queues.iter().map(|q| q.len).sum()
    }

    /// Deepest queue, the consumer furthest behind
    pub fn max_depth(&self) -> usize {
        self.queues.iter().map(|q| q.len).max().unwrap_or(0)
    }

    /// Accepted push rate in elements per second
    pub fn push_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.pushed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(depths: &[usize]) -> ChannelStats {
        ChannelStats {
            element_size: 0,
            capacity: 100,
            eof: false,
            pushed: 50,
            dropped: 0,
            rejected: 0,
            uptime: Duration::from_secs(10),
            queues: depths
                .iter()
                .enumerate()
                .map(|(i, len)| QueueStats {
                    key: ConsumerKey(i as u64),
                    len: *len,
                    size_bytes: len * 4,
                })
                .collect(),
        }
    }

    #[test]
    fn test_aggregates() {
        let stats = stats(&[3, 10, 0]);

        assert_eq!(stats.consumer_count(), 3);
        assert_eq!(stats.queued(), 13);
        assert_eq!(stats.max_depth(), 10);
        assert_eq!(stats.push_rate(), 5.0);
    }

    #[test]
    fn test_empty_channel() {
        let mut stats = stats(&[]);
        stats.uptime = Duration::ZERO;

        assert_eq!(stats.max_depth(), 0);
        assert_eq!(stats.push_rate(), 0.0);
    }
}

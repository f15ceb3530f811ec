//! Bounded per-consumer FIFO
//!
//! One queue exists for every (channel, consumer) pair. When the queue is
//! full the *new* element is refused: the oldest data is what the consumer
//! still needs to see in order.

use std::collections::VecDeque;

use super::buffer::Buffer;

/// FIFO of shared buffers for one consumer of one channel
#[derive(Debug)]
pub struct ChannelQueue {
    /// Maximum number of buffered elements
    capacity: usize,
    /// Buffered elements, oldest first
    items: VecDeque<Buffer>,
}

impl ChannelQueue {
    /// Create an empty queue holding at most `capacity` elements
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::new(),
        }
    }

    /// Append a buffer
    ///
    /// Returns false (and drops the reference) if the queue is full.
    pub fn push(&mut self, buffer: Buffer) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push_back(buffer);
        true
    }

    /// Remove the oldest buffer
    pub fn pop(&mut self) -> Option<Buffer> {
        self.items.pop_front()
    }

    /// Remove exactly `n` oldest buffers, or nothing at all
    pub fn pop_chunk(&mut self, n: usize) -> Option<Vec<Buffer>> {
        if self.items.len() < n {
            return None;
        }
        Some(self.items.drain(..n).collect())
    }

    /// Number of buffered elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether another push would be refused
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Maximum number of elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total payload bytes referenced by this queue
    pub fn size_bytes(&self) -> usize {
        self.items.iter().map(Buffer::len).sum()
    }

    /// Drop every buffered element
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

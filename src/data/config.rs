//! Distribution handler configuration

/// Default per-consumer queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Handler-wide configuration options
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Capacity used by `add_channel_default`
    pub default_capacity: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl HandlerConfig {
    /// Set the default per-consumer capacity
    pub fn default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Channel configuration built from the handler defaults
    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig::default().capacity(self.default_capacity)
    }
}

/// Per-channel configuration, fixed until the channel is reinitialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Expected payload size in bytes (0 = variable length)
    pub element_size: usize,

    /// Maximum number of buffers held per consumer queue
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            element_size: 0,
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ChannelConfig {
    /// Channel carrying payloads of exactly `element_size` bytes
    pub fn fixed(element_size: usize) -> Self {
        Self {
            element_size,
            ..Default::default()
        }
    }

    /// Channel carrying payloads of any length
    pub fn variable() -> Self {
        Self::default()
    }

    /// Set the expected element size
    pub fn element_size(mut self, size: usize) -> Self {
        self.element_size = size;
        self
    }

    /// Set the per-consumer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Whether pushes are validated against a fixed size
    pub fn is_fixed_size(&self) -> bool {
        self.element_size != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HandlerConfig::default();
        assert_eq!(config.default_capacity, DEFAULT_QUEUE_CAPACITY);

        let channel = ChannelConfig::default();
        assert_eq!(channel.element_size, 0);
        assert_eq!(channel.capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(!channel.is_fixed_size());
    }

    #[test]
    fn test_fixed_channel() {
        let channel = ChannelConfig::fixed(10).capacity(100);

        assert!(channel.is_fixed_size());
        assert_eq!(channel.element_size, 10);
        assert_eq!(channel.capacity, 100);
    }

    #[test]
    fn test_channel_from_handler_defaults() {
        let config = HandlerConfig::default().default_capacity(42);
        let channel = config.channel();

        assert_eq!(channel.capacity, 42);
        assert_eq!(channel, ChannelConfig::variable().capacity(42));
    }

    #[test]
    fn test_builder_chaining() {
        let channel = ChannelConfig::variable().element_size(4).capacity(8);

        assert_eq!(channel, ChannelConfig { element_size: 4, capacity: 8 });
    }
}

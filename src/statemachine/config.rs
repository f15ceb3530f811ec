//! Statemachine configuration

use std::time::Duration;

/// Statemachine configuration options
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// How long `wakeup` waits for the machine lock before failing
    pub lock_timeout: Duration,

    /// Log every state change at `info` instead of `debug`
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(1000),
            trace: false,
        }
    }
}

impl MachineConfig {
    /// Set the lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Enable or disable transition tracing
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();

        assert_eq!(config.lock_timeout, Duration::from_secs(1));
        assert!(!config.trace);
    }

    #[test]
    fn test_builder_chaining() {
        let config = MachineConfig::default()
            .lock_timeout(Duration::from_millis(50))
            .trace(true);

        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert!(config.trace);
    }
}

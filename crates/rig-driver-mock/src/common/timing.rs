//! Timing configuration for realistic mode.
//!
//! Bus-like delays applied when a mock runs in [`super::MockMode::Realistic`].

/// Per-instrument delay configuration, milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Delay per bus command.
    pub command_delay_ms: u64,
    /// Delay per discovery handshake.
    pub discovery_delay_ms: u64,
}

impl TimingConfig {
    /// Timing for a DC source.
    pub fn source() -> Self {
        Self {
            command_delay_ms: 5,
            discovery_delay_ms: 20,
        }
    }

    /// Timing for a signal generator.
    pub fn generator() -> Self {
        Self {
            command_delay_ms: 3,
            discovery_delay_ms: 20,
        }
    }

    /// Timing for a spectrum analyzer.
    pub fn analyzer() -> Self {
        Self {
            command_delay_ms: 8,
            discovery_delay_ms: 30,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: 0,
            discovery_delay_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        let t = TimingConfig::default();
        assert_eq!(t.command_delay_ms, 0);
        assert_eq!(t.discovery_delay_ms, 0);
    }

    #[test]
    fn analyzer_is_slowest() {
        assert!(TimingConfig::analyzer().command_delay_ms > TimingConfig::generator().command_delay_ms);
    }
}

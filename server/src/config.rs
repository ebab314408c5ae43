//! Host configuration
//!
//! Capacity and freshness are not negotiated over the wire. They are fixed
//! when the host starts and every participant plays by them.

use shared::CodeAlphabet;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 4;
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_COMMAND_RESEND_TICKS: u32 = 30;
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_GAMEPLAY_SCENE: &str = "Gameplay";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    #[error("freshness window must be greater than zero")]
    ZeroFreshnessWindow,
    #[error("tick rate must be greater than zero")]
    ZeroTickRate,
    #[error("client timeout must be greater than zero")]
    ZeroClientTimeout,
    #[error("gameplay scene name must not be empty")]
    EmptySceneName,
}

/// Startup options for one hosted session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Maximum simultaneous participants
    pub capacity: usize,
    /// Samples at least this old are left out of aggregation
    pub freshness_window: Duration,
    /// Start the session as soon as the lobby fills up
    pub auto_start_when_full: bool,
    pub code_alphabet: CodeAlphabet,
    /// Physics steps per second
    pub tick_rate: u32,
    /// Re-send the unchanged command every this many ticks (0 disables)
    pub command_resend_ticks: u32,
    pub client_timeout: Duration,
    pub gameplay_scene: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            auto_start_when_full: false,
            code_alphabet: CodeAlphabet::Alphanumeric,
            tick_rate: DEFAULT_TICK_RATE,
            command_resend_ticks: DEFAULT_COMMAND_RESEND_TICKS,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            gameplay_scene: DEFAULT_GAMEPLAY_SCENE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.freshness_window.is_zero() {
            return Err(ConfigError::ZeroFreshnessWindow);
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.client_timeout.is_zero() {
            return Err(ConfigError::ZeroClientTimeout);
        }
        if self.gameplay_scene.trim().is_empty() {
            return Err(ConfigError::EmptySceneName);
        }
        Ok(())
    }

    /// Fixed physics step length derived from the tick rate
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.freshness_window, Duration::from_millis(100));
        assert!(!config.auto_start_when_full);
        assert_eq!(config.code_alphabet, CodeAlphabet::Alphanumeric);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SessionConfig {
            capacity: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        config.capacity = 2;
        config.freshness_window = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroFreshnessWindow));

        config.freshness_window = Duration::from_millis(50);
        config.tick_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickRate));

        config.tick_rate = 30;
        config.gameplay_scene = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptySceneName));
    }

    #[test]
    fn test_tick_duration() {
        let config = SessionConfig {
            tick_rate: 50,
            ..SessionConfig::default()
        };
        assert_eq!(config.tick_duration().as_millis(), 20);
    }
}

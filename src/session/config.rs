//! Session pool configuration

use super::ConnectionInfo;
use crate::{Error, Result};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default maximum number of live sessions
pub const DEFAULT_MAX_SIZE: usize = 10;

/// Default maximum number of idle sessions kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 10;

/// Default timeout for dialing a new session
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for waiting on a free pool slot
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time after which an idle session is shut down instead of reused
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for [`SessionPool`](super::SessionPool)
///
/// # Examples
///
/// ```
/// use docwire::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .max_size(4)
///     .acquire_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_size, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum live sessions (idle + in use)
    pub max_size: usize,
    /// Maximum idle sessions kept for reuse
    pub max_idle: usize,
    /// Timeout for dialing a new transport
    pub connect_timeout: Duration,
    /// Timeout for waiting on a free slot
    pub acquire_timeout: Duration,
    /// Idle sessions older than this are shut down on the next acquire
    pub idle_timeout: Duration,
}

impl PoolConfig {
    /// Create configuration with defaults
    pub fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_idle: DEFAULT_MAX_IDLE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Read pool settings from connection string parameters
    ///
    /// Recognized keys: `max_pool_size`, `max_idle`, `connect_timeout_ms`,
    /// `acquire_timeout_ms`, `idle_timeout_ms`. Missing keys keep defaults.
    pub fn from_connection_info(info: &ConnectionInfo) -> Result<Self> {
        let mut config = Self::new();

        if let Some(v) = info.param("max_pool_size") {
            config.max_size = parse_number("max_pool_size", v)? as usize;
        }
        if let Some(v) = info.param("max_idle") {
            config.max_idle = parse_number("max_idle", v)? as usize;
        }
        if let Some(v) = info.param("connect_timeout_ms") {
            config.connect_timeout = Duration::from_millis(parse_number("connect_timeout_ms", v)?);
        }
        if let Some(v) = info.param("acquire_timeout_ms") {
            config.acquire_timeout = Duration::from_millis(parse_number("acquire_timeout_ms", v)?);
        }
        if let Some(v) = info.param("idle_timeout_ms") {
            config.idle_timeout = Duration::from_millis(parse_number("idle_timeout_ms", v)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set maximum live sessions
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set maximum idle sessions
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set transport connect timeout
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Set pool slot acquire timeout
    pub fn acquire_timeout(mut self, duration: Duration) -> Self {
        self.acquire_timeout = duration;
        self
    }

    /// Set idle session lifetime
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Config("max_pool_size must be at least 1".into()));
        }
        if self.max_size > Semaphore::MAX_PERMITS {
            return Err(Error::Config(format!(
                "max_pool_size must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid {} '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.max_idle, DEFAULT_MAX_IDLE);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn test_pool_config_fluent() {
        let config = PoolConfig::new()
            .max_size(20)
            .max_idle(5)
            .connect_timeout(Duration::from_secs(1))
            .acquire_timeout(Duration::from_secs(2))
            .idle_timeout(Duration::from_secs(3));

        assert_eq!(config.max_size, 20);
        assert_eq!(config.max_idle, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.idle_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_from_connection_info() {
        let info = ConnectionInfo::parse(
            "docdb://localhost/app?max_pool_size=3&connect_timeout_ms=250&idle_timeout_ms=1000",
        )
        .unwrap();
        let config = PoolConfig::from_connection_info(&info).unwrap();

        assert_eq!(config.max_size, 3);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.idle_timeout, Duration::from_secs(1));
        assert_eq!(config.max_idle, DEFAULT_MAX_IDLE);
    }

    #[test]
    fn test_from_connection_info_invalid_number() {
        let info = ConnectionInfo::parse("docdb://localhost/app?max_idle=lots").unwrap();
        let err = PoolConfig::from_connection_info(&info).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_idle")));
    }

    #[test]
    fn test_zero_max_size_rejected() {
        assert!(PoolConfig::new().max_size(0).validate().is_err());
    }

    #[test]
    fn test_oversized_pool_rejected() {
        let info =
            ConnectionInfo::parse("docdb://localhost/app?max_pool_size=18446744073709551615")
                .unwrap();
        let err = PoolConfig::from_connection_info(&info).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_pool_size")));

        assert!(PoolConfig::new()
            .max_size(Semaphore::MAX_PERMITS)
            .validate()
            .is_ok());
    }
}

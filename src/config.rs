//! Connection settings, loadable from JSON.
//!
//! Every field has a default, so a partial document is valid:
//!
//! ```
//! use pollwire::ConnectionConfig;
//!
//! let config = ConnectionConfig::from_json_str(r#"{ "poll_timeout_ms": 250 }"#).unwrap();
//! assert_eq!(config.poll_timeout_ms, 250);
//! assert_eq!(config.port_range_start, 9000);
//! ```

use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PollwireError, Result};
use crate::transport::{DEFAULT_BIND_ADDRESS, MIN_PORT};

/// Default first port of the pool.
pub const DEFAULT_PORT_RANGE_START: u16 = 9000;

/// Default last port of the pool.
pub const DEFAULT_PORT_RANGE_END: u16 = 9100;

/// Default bound on every socket wait.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 10_000;

/// Settings for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Local address the listener binds to.
    pub bind_address: IpAddr,
    /// First port tried by `start()`.
    pub port_range_start: u16,
    /// Last port tried by `start()`, inclusive.
    pub port_range_end: u16,
    /// Bound on each accept/send/receive wait, in milliseconds.
    pub poll_timeout_ms: u64,
    /// When set, an idle `job()` pings the peer this often.
    pub liveness_interval_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject ranges that cannot yield a port.
    pub fn validate(&self) -> Result<()> {
        if self.port_range_start > self.port_range_end {
            return Err(PollwireError::BadInput(format!(
                "port range {}..={} is empty",
                self.port_range_start, self.port_range_end
            )));
        }
        if self.port_range_end < MIN_PORT {
            return Err(PollwireError::BadInput(format!(
                "port range ends below {}",
                MIN_PORT
            )));
        }
        Ok(())
    }

    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_range_start..=self.port_range_end
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn liveness_interval(&self) -> Option<Duration> {
        self.liveness_interval_ms.map(Duration::from_millis)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            port_range_start: DEFAULT_PORT_RANGE_START,
            port_range_end: DEFAULT_PORT_RANGE_END,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            liveness_interval_ms: None,
        }
    }
}

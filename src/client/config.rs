use std::time::Duration;

use super::session::Termination;
use super::target::ConnectionTarget;
use crate::FpmError;

pub const ENV_ADDRESS: &str = "RIPHT_FPM_ADDRESS";
pub const ENV_POOL_SIZE: &str = "RIPHT_FPM_POOL_SIZE";
pub const ENV_TIMEOUT_MS: &str = "RIPHT_FPM_TIMEOUT_MS";
pub const ENV_TERMINATION: &str = "RIPHT_FPM_TERMINATION";

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9000";

/// Flat client settings, loadable from the environment or JSON.
///
/// `pool_size` of `None` runs sessions on the calling thread; `Some(0)`
/// sizes the pool to the CPU count.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    pub address: String,
    pub pool_size: Option<usize>,
    pub io_timeout_ms: Option<u64>,
    pub termination: Termination,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            pool_size: None,
            io_timeout_ms: None,
            termination: Termination::default(),
        }
    }
}

impl ClientConfig {
    /// Reads `RIPHT_FPM_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, FpmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, FpmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(address) = get(ENV_ADDRESS) {
            config.address = address;
        }

        if let Some(size) = get(ENV_POOL_SIZE) {
            config.pool_size = Some(parse_number(ENV_POOL_SIZE, &size)?);
        }

        if let Some(ms) = get(ENV_TIMEOUT_MS) {
            config.io_timeout_ms = Some(parse_number(ENV_TIMEOUT_MS, &ms)?);
        }

        if let Some(termination) = get(ENV_TERMINATION) {
            config.termination = termination.parse()?;
        }

        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, FpmError> {
        serde_json::from_str(json)
            .map_err(|e| FpmError::config(format!("invalid client config: {}", e)))
    }

    pub fn target(&self) -> Result<ConnectionTarget, FpmError> {
        self.address.parse()
    }

    /// A zero timeout is treated as no timeout.
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, FpmError> {
    raw.parse()
        .map_err(|_| FpmError::config(format!("{} must be a number, got {:?}", key, raw)))
}

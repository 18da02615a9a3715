//! Link configuration.
//!
//! Every field has a default matching the deployed firmware. A TOML file may
//! override any subset:
//!
//! ```toml
//! channel = 6
//! controller_timeout_ms = 12000
//! permanent_pairing = true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{
    COMMAND_INTERVAL, CONSOLE_QUEUE_DEPTH, CONTROLLER_TIMEOUT, ConfigError, DEFAULT_CHANNEL,
    HEARTBEAT_INTERVAL, INBOUND_QUEUE_DEPTH, MONITOR_INTERVAL, PAIRING_INTERVAL,
    PEER_ADDRESS_KEY, ROBOT_TIMEOUT, Role, STORAGE_NAMESPACE,
};

/// Longest period or timeout accepted, so wrapping millisecond arithmetic
/// on a `u32` clock stays unambiguous.
pub const MAX_PERIOD_MS: u64 = (u32::MAX / 2) as u64;

fn default_channel() -> u8 {
    DEFAULT_CHANNEL
}

fn default_heartbeat_interval_ms() -> u64 {
    HEARTBEAT_INTERVAL.as_millis() as u64
}

fn default_controller_timeout_ms() -> u64 {
    CONTROLLER_TIMEOUT.as_millis() as u64
}

fn default_robot_timeout_ms() -> u64 {
    ROBOT_TIMEOUT.as_millis() as u64
}

fn default_pairing_interval_ms() -> u64 {
    PAIRING_INTERVAL.as_millis() as u64
}

fn default_monitor_interval_ms() -> u64 {
    MONITOR_INTERVAL.as_millis() as u64
}

fn default_command_interval_ms() -> u64 {
    COMMAND_INTERVAL.as_millis() as u64
}

fn default_inbound_queue_depth() -> usize {
    INBOUND_QUEUE_DEPTH
}

fn default_console_queue_depth() -> usize {
    CONSOLE_QUEUE_DEPTH
}

fn default_storage_namespace() -> String {
    STORAGE_NAMESPACE.to_owned()
}

fn default_peer_key() -> String {
    PEER_ADDRESS_KEY.to_owned()
}

/// Tunable link parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Radio channel.
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Controller heartbeat period.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Controller liveness timeout.
    #[serde(default = "default_controller_timeout_ms")]
    pub controller_timeout_ms: u64,
    /// Robot liveness timeout.
    #[serde(default = "default_robot_timeout_ms")]
    pub robot_timeout_ms: u64,
    /// Pairing broadcast period while unpaired.
    #[serde(default = "default_pairing_interval_ms")]
    pub pairing_interval_ms: u64,
    /// Liveness check period.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Command forwarding period.
    #[serde(default = "default_command_interval_ms")]
    pub command_interval_ms: u64,
    /// Inbound datagram queue depth.
    #[serde(default = "default_inbound_queue_depth")]
    pub inbound_queue_depth: usize,
    /// Console line queue depth.
    #[serde(default = "default_console_queue_depth")]
    pub console_queue_depth: usize,
    /// Storage namespace of the peer identity.
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,
    /// Storage key of the peer identity.
    #[serde(default = "default_peer_key")]
    pub peer_key: String,
    /// Controller only: never unpair on timeout; `'p'` forces re-pairing.
    #[serde(default)]
    pub permanent_pairing: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            controller_timeout_ms: default_controller_timeout_ms(),
            robot_timeout_ms: default_robot_timeout_ms(),
            pairing_interval_ms: default_pairing_interval_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            command_interval_ms: default_command_interval_ms(),
            inbound_queue_depth: default_inbound_queue_depth(),
            console_queue_depth: default_console_queue_depth(),
            storage_namespace: default_storage_namespace(),
            peer_key: default_peer_key(),
            permanent_pairing: false,
        }
    }
}

impl LinkConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded link config from {}", path.display());
        Ok(config)
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("controller_timeout_ms", self.controller_timeout_ms),
            ("robot_timeout_ms", self.robot_timeout_ms),
            ("pairing_interval_ms", self.pairing_interval_ms),
            ("monitor_interval_ms", self.monitor_interval_ms),
            ("command_interval_ms", self.command_interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
            if value > MAX_PERIOD_MS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not exceed {MAX_PERIOD_MS}"
                )));
            }
        }

        let depths = [
            ("inbound_queue_depth", self.inbound_queue_depth),
            ("console_queue_depth", self.console_queue_depth),
        ];
        for (name, value) in depths {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        // A timeout must survive at least two lost heartbeats.
        for role in [Role::Controller, Role::Robot] {
            let timeout = self.timeout_ms(role);
            if timeout <= 2 * self.heartbeat_interval_ms {
                return Err(ConfigError::Invalid(format!(
                    "{role} timeout {timeout} ms must exceed two heartbeat intervals ({} ms)",
                    2 * self.heartbeat_interval_ms
                )));
            }
        }

        if self.storage_namespace.is_empty() || self.peer_key.is_empty() {
            return Err(ConfigError::Invalid(
                "storage namespace and key must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Liveness timeout for a role, in milliseconds.
    pub fn timeout_ms(&self, role: Role) -> u64 {
        match role {
            Role::Controller => self.controller_timeout_ms,
            Role::Robot => self.robot_timeout_ms,
        }
    }

    /// Liveness timeout for a role.
    pub fn timeout(&self, role: Role) -> Duration {
        Duration::from_millis(self.timeout_ms(role))
    }

    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Pairing broadcast period.
    pub fn pairing_interval(&self) -> Duration {
        Duration::from_millis(self.pairing_interval_ms)
    }

    /// Liveness check period.
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Command forwarding period.
    pub fn command_interval(&self) -> Duration {
        Duration::from_millis(self.command_interval_ms)
    }
}

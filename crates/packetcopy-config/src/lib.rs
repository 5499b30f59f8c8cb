//! Configuration management system for PacketCopy
//!
//! Settings are layered: built-in defaults, then the first configuration file
//! found, then `PACKETCOPY__*` environment variables.
//!
//! # Examples
//!
//! ```rust
//! use packetcopy_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("packetcopy.yaml")
//!     .add_env_prefix("PACKETCOPY")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Packet size: {}", config.copy.packet_size);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use packetcopy_types::{BufferSize, FailurePolicy, PacketSize};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for PacketCopy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Packet copy configuration
    #[serde(default)]
    pub copy: CopyConfig,
    /// Throughput sampling configuration
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Packet copy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Packet size in bytes
    pub packet_size: PacketSize,
    /// Size of the reusable copy buffer in bytes
    pub buffer_size: BufferSize,
    /// Pre-extend destination files to the source size
    pub preallocate: bool,
    /// What to do when a packet copy fails
    pub failure_policy: FailurePolicy,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            packet_size: PacketSize::default(),
            buffer_size: BufferSize::default(),
            preallocate: true,
            failure_policy: FailurePolicy::StopBatch,
        }
    }
}

/// Throughput sampling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Bytes read per sample
    pub sample_size: usize,
    /// Samples per file
    pub sample_count: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size: 64 * 1024,
            sample_count: 3,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long `cancel` waits for the worker before abandoning it, in milliseconds
    pub cancel_grace_period_ms: u64,
}

impl EngineConfig {
    /// Grace period as a [`Duration`]
    pub fn cancel_grace_period(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_period_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancel_grace_period_ms: 5_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.copy.packet_size.get(), 64 * 1024);
        assert_eq!(config.copy.buffer_size.get(), 1024 * 1024);
        assert_eq!(config.copy.failure_policy, FailurePolicy::StopBatch);
        assert_eq!(config.sampling.sample_count, 3);
        assert_eq!(config.engine.cancel_grace_period(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("packet_size: 65536"));
        assert!(yaml.contains("failure_policy: stop_batch"));

        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("copy:\n  packet_size: 131072\n").unwrap();
        assert_eq!(parsed.copy.packet_size.get(), 128 * 1024);
        assert!(parsed.copy.preallocate);
        assert_eq!(parsed.sampling, SamplingConfig::default());
    }

    #[test]
    fn test_invalid_packet_size_rejected() {
        let parsed: Result<Config, _> = serde_yaml::from_str("copy:\n  packet_size: 1000\n");
        assert!(parsed.is_err());
    }
}

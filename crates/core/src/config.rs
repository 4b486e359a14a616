use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{backoff::Jitter, probe::DEFAULT_WINDOW_BLOCKS};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpstreamConfig {
    /// JSON-RPC endpoint of the node to probe
    pub rpc_url: String,

    /// Per-request timeout, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".into(),
            timeout_secs: Some(10),
        }
    }
}

/// Configuration for the Redb pending store.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RedbStorageConfig {
    pub path: PathBuf,
    /// Size (in MB) of memory allocated for caching.
    #[serde(default)]
    pub cache: Option<usize>,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/pending.redb"),
            cache: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Redb(RedbStorageConfig),
    /// In-memory backend (ephemeral, data lost on restart).
    #[serde(rename = "in_memory")]
    InMemory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Redb(RedbStorageConfig::default())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub multiplier: u32,
    pub max_attempts: u32,

    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    #[serde(default)]
    pub jitter: Jitter,

    #[serde(default = "default_delay_first_attempt")]
    pub delay_first_attempt: bool,
}

fn default_delay_first_attempt() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 10_000,
            multiplier: 2,
            max_attempts: 6,
            max_delay_ms: None,
            jitter: Jitter::None,
            delay_first_attempt: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MonitorConfig {
    /// Blocks after the baseline during which a missing receipt still counts
    /// as pending
    pub window_blocks: u64,

    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_blocks: DEFAULT_WINDOW_BLOCKS,
            sweep_interval_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NotifyConfig {
    /// Failure notifications are POSTed here as JSON when set
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Also log notifications through tracing
    #[serde(default = "default_log_notifications")]
    pub log: bool,
}

fn default_log_notifications() -> bool {
    true
}

#[serde_as]
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct LoggingConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub max_level: tracing::Level,

    #[serde(default)]
    pub include_tokio: bool,

    #[serde(default)]
    pub include_reqwest: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_level: tracing::Level::INFO,
            include_tokio: Default::default(),
            include_reqwest: Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RootConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

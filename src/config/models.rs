use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub api: ApiLimits,
}

/// Limits applied to `POST /zip` requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_max_members_per_request")]
    pub max_members_per_request: usize,
    /// Upper bound for each of `name`, `ext` and `alias`
    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_members_per_request: default_max_members_per_request(),
            max_name_bytes: default_max_name_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024) // 5 MB
}

fn default_max_members_per_request() -> usize {
    1000
}

fn default_max_name_bytes() -> usize {
    255
}

/// Filesystem locations. None of these are request-controlled.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root that member `name`s are resolved against
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Where `<id>.zip` archives are published and swept
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Directory for in-progress archives; system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            output_root: default_output_root(),
            temp_dir: None,
        }
    }
}

fn default_source_root() -> PathBuf {
    PathBuf::from("storage")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

/// Retention configuration for published archives
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_age")]
    pub max_age: HumanDuration,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: HumanDuration,
    /// Run one sweep right after startup instead of waiting a full interval
    #[serde(default)]
    pub sweep_on_startup: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            sweep_interval: default_sweep_interval(),
            sweep_on_startup: false,
        }
    }
}

fn default_max_age() -> HumanDuration {
    HumanDuration::from_secs(7 * 24 * 60 * 60)
}

fn default_sweep_interval() -> HumanDuration {
    HumanDuration::from_secs(24 * 60 * 60)
}

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: Option<SourceConfig>,
}

/// Settings for one driver invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Jobs allowed in flight before the launcher waits on a barrier.
    /// Zero or negative disables mid-run barriers entirely.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// IANA zone used to render run timestamps and snapshot dates.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Upper bound on collection jobs executing at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            time_zone: default_time_zone(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

fn default_batch_size() -> i64 {
    10
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    8
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Warehouse database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("harvester.db")
}

/// Source database probed by the SQLite collector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub path: PathBuf,
}

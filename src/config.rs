// src/config.rs

//! Manages node configuration: loading from TOML, resolving defaults, and
//! validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Socket-pool sizing for the admin client's connection pool.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SocketPoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_cached")]
    pub max_cached: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,
}

impl Default for SocketPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_cached: default_max_cached(),
            connect_timeout_ms: default_connect_timeout_ms(),
            socket_timeout_ms: default_socket_timeout_ms(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
        }
    }
}

fn default_max_connections() -> usize {
    8
}
fn default_max_cached() -> usize {
    8
}
fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_socket_timeout_ms() -> u64 {
    5_000
}
fn default_checkout_timeout_ms() -> u64 {
    5_000
}

/// Default `StoreDefinition` parameters used when bootstrapping a fresh
/// cluster's `stores.xml`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DefaultStoreConfig {
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
    #[serde(default = "default_reads_writes")]
    pub preferred_reads: u8,
    #[serde(default = "default_reads_writes")]
    pub required_reads: u8,
    #[serde(default = "default_reads_writes")]
    pub preferred_writes: u8,
    #[serde(default = "default_reads_writes")]
    pub required_writes: u8,
}

impl Default for DefaultStoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            replication_factor: default_replication_factor(),
            preferred_reads: default_reads_writes(),
            required_reads: default_reads_writes(),
            preferred_writes: default_reads_writes(),
            required_writes: default_reads_writes(),
        }
    }
}

fn default_store_name() -> String {
    "default".to_string()
}
fn default_replication_factor() -> u8 {
    1
}
fn default_reads_writes() -> u8 {
    1
}

fn default_num_partitions() -> u16 {
    256
}

fn default_admin_bind_addr() -> SocketAddr {
    "127.0.0.1:7890".parse().expect("valid default admin address")
}

fn default_home_dir() -> PathBuf {
    PathBuf::from("./ringdb-data")
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    node_id: u16,
    #[serde(default = "default_home_dir")]
    home_dir: PathBuf,
    #[serde(default = "default_admin_bind_addr")]
    admin_bind_addr: SocketAddr,
    #[serde(default = "default_num_partitions")]
    num_partitions: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    socket_pool: SocketPoolConfig,
    #[serde(default)]
    default_store: DefaultStoreConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub node_id: u16,
    pub home_dir: PathBuf,
    pub admin_bind_addr: SocketAddr,
    pub num_partitions: u16,
    pub log_level: String,
    pub socket_pool: SocketPoolConfig,
    pub default_store: DefaultStoreConfig,
}

impl Config {
    /// Reads and parses a TOML config file, then validates the result.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let raw: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        let config = Config {
            node_id: raw.node_id,
            home_dir: raw.home_dir,
            admin_bind_addr: raw.admin_bind_addr,
            num_partitions: raw.num_partitions,
            log_level: raw.log_level,
            socket_pool: raw.socket_pool,
            default_store: raw.default_store,
        };

        config.validate()?;
        Ok(config)
    }

    /// `metadata/` and `data/` live directly under `home_dir`.
    pub fn metadata_dir(&self) -> PathBuf {
        self.home_dir.join("metadata")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home_dir.join("data")
    }

    fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(anyhow!("num_partitions cannot be 0"));
        }
        if self.socket_pool.max_connections == 0 {
            return Err(anyhow!("socket_pool.max_connections cannot be 0"));
        }
        if self.socket_pool.max_cached == 0 {
            return Err(anyhow!("socket_pool.max_cached cannot be 0"));
        }
        if self.socket_pool.connect_timeout_ms == 0 {
            return Err(anyhow!("socket_pool.connect_timeout_ms cannot be 0"));
        }
        if self.socket_pool.socket_timeout_ms == 0 {
            return Err(anyhow!("socket_pool.socket_timeout_ms cannot be 0"));
        }
        if self.socket_pool.checkout_timeout_ms == 0 {
            return Err(anyhow!("socket_pool.checkout_timeout_ms cannot be 0"));
        }
        let ds = &self.default_store;
        if ds.replication_factor == 0 {
            return Err(anyhow!("default_store.replication_factor cannot be 0"));
        }
        if !(1 <= ds.required_reads
            && ds.required_reads <= ds.preferred_reads
            && ds.preferred_reads <= ds.replication_factor)
        {
            return Err(anyhow!(
                "default_store read bounds must satisfy 1 <= required <= preferred <= replication_factor"
            ));
        }
        if !(1 <= ds.required_writes
            && ds.required_writes <= ds.preferred_writes
            && ds.preferred_writes <= ds.replication_factor)
        {
            return Err(anyhow!(
                "default_store write bounds must satisfy 1 <= required <= preferred <= replication_factor"
            ));
        }
        Ok(())
    }
}

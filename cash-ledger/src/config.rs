//! Configuration for the settlement ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Pool configuration
    pub pool: PoolConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/cash-ledger"),
            service_name: "cash-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            pool: PoolConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Settlement pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Opening balance used when the server provisions an absent pool
    pub opening_balance: Decimal,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            opening_balance: Decimal::ZERO,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CASHRAIL_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(balance) = std::env::var("CASHRAIL_POOL_OPENING_BALANCE") {
            config.pool.opening_balance = balance.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CASHRAIL_POOL_OPENING_BALANCE: {}", e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "cash-ledger");
        assert_eq!(config.pool.opening_balance, Decimal::ZERO);
    }

    #[test]
    fn test_from_toml() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/var/lib/cashrail"
            service_name = "cash-ledger"
            service_version = "0.1.0"

            [pool]
            opening_balance = "100000.00"

            [rocksdb]
            write_buffer_size_mb = 128
            max_write_buffer_number = 4
            max_background_jobs = 2
            enable_statistics = false
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.opening_balance, Decimal::new(10000000, 2));
        assert_eq!(config.rocksdb.write_buffer_size_mb, 128);
    }
}

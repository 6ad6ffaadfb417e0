//! Service configuration.
//!
//! Loaded from `config.toml` (path from `--config`, else the platform config
//! directory). A missing file means defaults; CLI flags are applied on top.
//!
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 5000
//! realm = "Login required"
//!
//! [storage]
//! db_path = "credentials.db"
//! pool_size = 8
//!
//! [hashing]
//! rounds = 600000
//! workers = 4
//! ```

use crate::auth::gate::DEFAULT_REALM;
use crate::auth::hashing::{MAX_ROUNDS, RECOMMENDED_ROUNDS};
use crate::auth::store::DEFAULT_POOL_SIZE;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            realm: DEFAULT_REALM.into(),
            request_timeout_secs: 30,
            max_body_bytes: 65_536,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("credentials.db"),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashingConfig {
    /// PBKDF2 iteration count for new hashes.
    pub rounds: u32,
    /// Maximum concurrent hash computations.
    pub workers: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            rounds: RECOMMENDED_ROUNDS,
            workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
        }
    }
}

impl Config {
    /// Default config file location, e.g. `~/.config/credgate/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "credgate").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path (must exist) or the default location
    /// (may be absent).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hashing.rounds == 0 || self.hashing.rounds > MAX_ROUNDS {
            bail!("hashing.rounds must be between 1 and {MAX_ROUNDS}");
        }
        if self.hashing.workers == 0 {
            bail!("hashing.workers must be at least 1");
        }
        if self.storage.pool_size == 0 {
            bail!("storage.pool_size must be at least 1");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be at least 1");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be at least 1");
        }
        Ok(())
    }
}

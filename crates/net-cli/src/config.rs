//! Daemon configuration
//!
//! Settings come from an optional TOML file and `NETD_*` environment
//! variables, the latter taking precedence. Missing settings use defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netd_cluster::NotifyPolicy;
use netd_network_core::{default_node_specific_keys, DEFAULT_VAR_DIR};

/// Configuration file read when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netd/netd.toml";

/// Prefix of environment overrides, e.g. `NETD_NODE_NAME`
pub const ENV_PREFIX: &str = "NETD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Name of this cluster member
    pub node_name: String,
    /// Root of per-network state such as rendered interface files
    pub var_dir: PathBuf,
    /// Network store location, `<var_dir>/database` when unset
    pub store_path: Option<PathBuf>,
    /// Config keys that keep their per-node value on cluster updates
    pub node_specific_keys: Vec<String>,
    pub notify_policy: NotifyPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            var_dir: PathBuf::from(DEFAULT_VAR_DIR),
            store_path: None,
            node_specific_keys: default_node_specific_keys(),
            notify_policy: NotifyPolicy::default(),
        }
    }
}

fn default_node_name() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl DaemonConfig {
    /// Load from `path`, which must exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::load_from(path, true)
    }

    /// Load from the default location if present, then apply environment
    /// overrides.
    pub fn load_with_defaults() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), false)
    }

    fn load_from(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("node_specific_keys"),
            )
            .build()?;

        let config: DaemonConfig = settings.try_deserialize()?;
        config.validate()?;
        log::debug!("Loaded configuration for node {}", config.node_name);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Invalid("node_name must not be empty".to_string()));
        }
        if self.var_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("var_dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.var_dir.join("database"))
    }
}

//! CLI commands

pub mod edit;
pub mod show;

pub use edit::EditCommand;
pub use show::ShowCommand;

use anyhow::{bail, Result};
use clap::ValueEnum;

use netd_network_core::ConfigMap;

/// Output format of read commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parse `key=value` arguments into a config map. Later entries win.
pub fn parse_config_pairs(pairs: &[String]) -> Result<ConfigMap> {
    let mut config = ConfigMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid config entry '{}', expected key=value", pair);
        };

        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid config entry '{}', empty key", pair);
        }

        config.insert(key.to_string(), value.to_string());
    }

    Ok(config)
}

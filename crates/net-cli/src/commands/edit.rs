//! Network mutation commands

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use netd_network_core::{NetworkCreate, NetworkPut};

use super::parse_config_pairs;
use crate::context::CliContext;

pub struct EditCommand {
    context: Arc<CliContext>,
}

impl EditCommand {
    pub fn new(context: Arc<CliContext>) -> Self {
        Self { context }
    }

    pub async fn create(
        &self,
        name: &str,
        driver: &str,
        description: Option<String>,
        pairs: &[String],
    ) -> Result<String> {
        let request = NetworkCreate {
            name: name.to_string(),
            driver: driver.to_string(),
            description: description.unwrap_or_default(),
            config: parse_config_pairs(pairs)?,
        };

        self.context
            .registry
            .create(request)
            .await
            .with_context(|| format!("Failed to create network {}", name))?;

        info!("Network {} created on {}", name, self.context.config.node_name);
        Ok(format!("Network {} created", name))
    }

    /// Set and unset config keys, and optionally replace the description.
    /// With `target` the change stays on that member.
    pub async fn set(
        &self,
        name: &str,
        pairs: &[String],
        unset: &[String],
        description: Option<String>,
        target: Option<&str>,
    ) -> Result<String> {
        let network = self.context.registry.get(name).await?;
        let current = network.record();

        let mut config = current.config;
        config.extend(parse_config_pairs(pairs)?);
        for key in unset {
            config.remove(key);
        }

        let put = NetworkPut::new(description.unwrap_or(current.description), config);
        self.context
            .registry
            .update(name, put, target)
            .await
            .with_context(|| format!("Failed to update network {}", name))?;

        Ok(format!("Network {} updated", name))
    }

    pub async fn rename(&self, name: &str, new_name: &str) -> Result<String> {
        self.context
            .registry
            .rename(name, new_name)
            .await
            .with_context(|| format!("Failed to rename network {}", name))?;

        Ok(format!("Network {} renamed to {}", name, new_name))
    }

    pub async fn delete(&self, name: &str) -> Result<String> {
        self.context
            .registry
            .delete(name)
            .await
            .with_context(|| format!("Failed to delete network {}", name))?;

        Ok(format!("Network {} deleted", name))
    }
}

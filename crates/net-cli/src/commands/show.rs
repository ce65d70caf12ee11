//! Read-only network commands

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use netd_network_core::NetworkRecord;

use super::OutputFormat;
use crate::context::CliContext;

pub struct ShowCommand {
    context: Arc<CliContext>,
}

impl ShowCommand {
    pub fn new(context: Arc<CliContext>) -> Self {
        Self { context }
    }

    /// All networks of this node
    pub async fn list(&self, format: OutputFormat) -> Result<String> {
        let records: Vec<NetworkRecord> = self
            .context
            .registry
            .list()
            .await
            .iter()
            .map(|network| network.record())
            .collect();

        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&records)
                .with_context(|| "Failed to serialize networks to JSON"),
            OutputFormat::Text => {
                let mut out = String::new();
                writeln!(
                    out,
                    "{:<15} {:<10} {:<10} {}",
                    "Name", "Type", "Status", "Description"
                )?;
                write!(out, "{}", "-".repeat(60))?;
                for record in &records {
                    write!(
                        out,
                        "\n{:<15} {:<10} {:<10} {}",
                        record.name, record.driver, record.status, record.description
                    )?;
                }
                Ok(out)
            }
        }
    }

    /// One network with its full config
    pub async fn show(&self, name: &str, format: OutputFormat) -> Result<String> {
        let network = self.context.registry.get(name).await?;
        let record = network.record();

        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&record)
                .with_context(|| format!("Failed to serialize network {} to JSON", name)),
            OutputFormat::Text => {
                let mut out = String::new();
                writeln!(out, "name: {}", record.name)?;
                writeln!(out, "type: {}", record.driver)?;
                writeln!(out, "status: {}", record.status)?;
                writeln!(out, "description: {}", record.description)?;
                write!(out, "config:")?;
                for (key, value) in &record.config {
                    write!(out, "\n  {}: {}", key, value)?;
                }
                Ok(out)
            }
        }
    }

    /// Whether any instance or profile references the network
    pub async fn used(&self, name: &str, format: OutputFormat) -> Result<String> {
        let network = self.context.registry.get(name).await?;
        let used = network
            .is_used()
            .await
            .with_context(|| format!("Failed to check usage of network {}", name))?;

        match format {
            OutputFormat::Json => Ok(json!({ "name": name, "used": used }).to_string()),
            OutputFormat::Text => Ok(if used { "yes" } else { "no" }.to_string()),
        }
    }
}

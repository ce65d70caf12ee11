//! Network driver abstraction

use async_trait::async_trait;

use netd_shared_types::{ClusterHeartbeat, NetworkCreate, NetworkPut, NetworkRecord};

use crate::common::{ConfigDiff, MutationOrigin, NetworkCommon};
use crate::error::NetworkError;
use crate::validate::ValidationRules;
use crate::{ConfigMap, Result};

/// A network managed by one driver.
///
/// Drivers embed a [`NetworkCommon`] and supply their rules and lifecycle
/// hooks. The provided methods route the shared mutations through it.
#[async_trait]
pub trait Network: Send + Sync {
    fn common(&self) -> &NetworkCommon;

    /// Per-key rules for this driver's config.
    fn validation_rules(&self) -> ValidationRules;

    /// Cross-key checks run after the per-key rules passed.
    fn validate_driver(&self, _config: &ConfigMap) -> Result<()> {
        Ok(())
    }

    fn validate(&self, config: &ConfigMap) -> Result<()> {
        self.common().validate(config, self.validation_rules())?;
        self.validate_driver(config)
    }

    /// Fill in defaults on a create request before it is validated.
    fn fill_config(&self, _req: &mut NetworkCreate) -> Result<()> {
        Ok(())
    }

    /// Bring the network up on this node.
    async fn start(&self) -> Result<()>;

    /// Take the network down on this node.
    async fn stop(&self) -> Result<()>;

    /// React to a config change already applied in memory.
    async fn apply_changes(&self, _diff: &ConfigDiff) -> Result<()> {
        Ok(())
    }

    /// Validate and apply `put`.
    ///
    /// Nothing happens when `put` matches the current description and
    /// config. If anything after validation fails the previous values are
    /// applied again the same way, so members and store follow the rollback.
    /// The network stays locked from the comparison to the end of the
    /// rollback.
    async fn update(
        &self,
        put: NetworkPut,
        target_node: Option<&str>,
        origin: MutationOrigin,
    ) -> Result<()> {
        let common = self.common();
        let guard = common.lock_mutations().await;

        self.validate(&put.config)?;
        let diff = common.config_changed(&put);
        if !diff.changed {
            return Ok(());
        }

        let result = match common.update_locked(&guard, put, target_node, origin).await {
            Ok(()) => self.apply_changes(&diff).await,
            // Rejected before anything was applied.
            Err(err) if err.is_validation() || matches!(err, NetworkError::Deleted { .. }) => {
                return Err(err);
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            let log = common.log();
            log.warn(format_args!("Update failed, reverting: {}", err));
            if let Err(revert) = common
                .update_locked(&guard, diff.previous, target_node, origin)
                .await
            {
                log.error(format_args!("Failed to revert update: {}", revert));
            }
            return Err(err);
        }

        Ok(())
    }

    async fn rename(&self, new_name: &str, origin: MutationOrigin) -> Result<()> {
        self.common().rename(new_name, origin).await
    }

    async fn delete(&self, origin: MutationOrigin) -> Result<()> {
        self.common().delete(origin).await
    }

    async fn is_used(&self) -> Result<bool> {
        self.common().is_used().await
    }

    fn handle_heartbeat(&self, heartbeat: &ClusterHeartbeat) -> Result<()> {
        self.common().handle_heartbeat(heartbeat)
    }

    fn name(&self) -> String {
        self.common().name()
    }

    fn driver_kind(&self) -> String {
        self.common().driver()
    }

    fn record(&self) -> NetworkRecord {
        self.common().record()
    }
}

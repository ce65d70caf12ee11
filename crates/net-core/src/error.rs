//! Error types for network operations

use std::path::PathBuf;

use thiserror::Error;

use crate::dhcp::DhcpRangeError;

/// Main error type for network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to {operation} network {network:?} in the database: {source}")]
    Persistence {
        operation: &'static str,
        network: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to notify cluster members about network {network:?}: {source}")]
    Propagation {
        network: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to check usage of network {network:?}: {source}")]
    UsageQuery {
        network: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network {network:?} has been deleted")]
    Deleted { network: String },

    #[error("Network {network:?} not found")]
    NotFound { network: String },

    #[error("Network {network:?} already exists")]
    AlreadyExists { network: String },

    #[error("Network {network:?} is in use")]
    InUse { network: String },

    #[error("Unknown network type {driver:?}")]
    UnknownDriver { driver: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for network {network:?} option {key:?}: {reason}")]
    InvalidValue {
        network: String,
        key: String,
        reason: String,
    },

    #[error("Invalid option for network {network:?} option {key:?}")]
    UnknownKey { network: String, key: String },

    #[error("Network {network:?}: {reason}")]
    Driver { network: String, reason: String },

    #[error("Invalid DHCP ranges: {0}")]
    DhcpRange(#[from] DhcpRangeError),
}

impl NetworkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NetworkError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the request content rather than by a
    /// collaborator failing.
    pub fn is_validation(&self) -> bool {
        matches!(self, NetworkError::Validation(_))
    }
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NotifierError;

/// Which members a notification is sent to, and how offline members count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyPolicy {
    /// Every member must be online; nothing is sent otherwise.
    #[default]
    All,
    /// Only members currently online are notified.
    Alive,
    /// Every member is attempted; offline members count as failures.
    TryAll,
}

impl std::fmt::Display for NotifyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyPolicy::All => write!(f, "all"),
            NotifyPolicy::Alive => write!(f, "alive"),
            NotifyPolicy::TryAll => write!(f, "try-all"),
        }
    }
}

impl FromStr for NotifyPolicy {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Ok(NotifyPolicy::All),
            "alive" => Ok(NotifyPolicy::Alive),
            "try-all" => Ok(NotifyPolicy::TryAll),
            _ => Err(NotifierError::InvalidPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("all".parse::<NotifyPolicy>().unwrap(), NotifyPolicy::All);
        assert_eq!("Alive".parse::<NotifyPolicy>().unwrap(), NotifyPolicy::Alive);
        assert_eq!("try_all".parse::<NotifyPolicy>().unwrap(), NotifyPolicy::TryAll);
        assert!("some".parse::<NotifyPolicy>().is_err());
        assert_eq!(NotifyPolicy::TryAll.to_string(), "try-all");
    }
}

//! Network config validation
//!
//! Every driver contributes a set of per-key rules. The validator merges them
//! with the rules common to all drivers, runs each rule against the config and
//! rejects keys that no rule covers, except free-form `user.` keys.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{NetworkError, ValidationError};
use crate::ConfigMap;

/// Prefix of config keys that are never validated.
pub const USER_KEY_PREFIX: &str = "user.";

/// Rejection reason returned by a single rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RuleViolation(pub String);

impl RuleViolation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type RuleResult = Result<(), RuleViolation>;

/// A rule receives the config value for its key, or an empty string when the
/// key is absent.
pub type Rule = Arc<dyn Fn(&str) -> RuleResult + Send + Sync>;

pub fn is_user_key(key: &str) -> bool {
    key.starts_with(USER_KEY_PREFIX)
}

/// Rules keyed by config key.
#[derive(Clone, Default)]
pub struct ValidationRules {
    rules: BTreeMap<String, Rule>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any existing rule for the same key.
    pub fn with<F>(mut self, key: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&str) -> RuleResult + Send + Sync + 'static,
    {
        self.insert(key, rule);
        self
    }

    pub fn insert<F>(&mut self, key: impl Into<String>, rule: F)
    where
        F: Fn(&str) -> RuleResult + Send + Sync + 'static,
    {
        self.rules.insert(key.into(), Arc::new(rule));
    }

    /// Merge `other` into these rules. Rules from `other` win on collision.
    pub fn merge(mut self, other: ValidationRules) -> Self {
        self.rules.extend(other.rules);
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rules.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.rules.keys()).finish()
    }
}

/// Rules shared by every driver. There are none at the moment; drivers
/// contribute all of theirs.
pub fn common_rules() -> ValidationRules {
    ValidationRules::new()
}

/// Validates network configs against common and driver rules.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    common: ValidationRules,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::with_common_rules(common_rules())
    }

    fn with_common_rules(common: ValidationRules) -> Self {
        Self { common }
    }

    /// Validate `config` of network `network`.
    ///
    /// Rules run first, in key order, and the first rejection is returned.
    /// Unknown keys are only reported once every rule has passed.
    pub fn validate(
        &self,
        network: &str,
        config: &ConfigMap,
        driver_rules: ValidationRules,
    ) -> Result<(), NetworkError> {
        let rules = self.common.clone().merge(driver_rules);

        for (key, rule) in rules.iter() {
            let value = config.get(key).map(String::as_str).unwrap_or_default();
            rule(value).map_err(|violation| ValidationError::InvalidValue {
                network: network.to_string(),
                key: key.clone(),
                reason: violation.to_string(),
            })?;
        }

        if let Some(key) = config
            .keys()
            .find(|key| !rules.contains_key(key) && !is_user_key(key))
        {
            return Err(ValidationError::UnknownKey {
                network: network.to_string(),
                key: key.clone(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{is_bool, optional};

    fn config(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn rules() -> ValidationRules {
        ValidationRules::new()
            .with("ipv4.dhcp", optional(is_bool))
            .with("ipv6.dhcp", optional(is_bool))
    }

    #[test]
    fn test_valid_config_with_user_keys() {
        let validator = FieldValidator::new();
        let cfg = config(&[("ipv4.dhcp", "true"), ("user.owner", "ops team")]);
        assert!(validator.validate("lxdbr0", &cfg, rules()).is_ok());
    }

    #[test]
    fn test_absent_keys_are_checked_with_empty_value() {
        let validator = FieldValidator::new();
        let strict = ValidationRules::new().with("parent", |value: &str| {
            if value.is_empty() {
                Err(RuleViolation::new("required"))
            } else {
                Ok(())
            }
        });

        let err = validator
            .validate("macvlan0", &ConfigMap::new(), strict)
            .unwrap_err();
        assert!(err.to_string().contains("\"parent\""));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let validator = FieldValidator::new();
        let cfg = config(&[("ipv4.dhcp", "true"), ("ipv4.dchp", "true")]);

        match validator.validate("lxdbr0", &cfg, rules()) {
            Err(NetworkError::Validation(ValidationError::UnknownKey { network, key })) => {
                assert_eq!(network, "lxdbr0");
                assert_eq!(key, "ipv4.dchp");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rule_failure_wins_over_unknown_key() {
        let validator = FieldValidator::new();
        let cfg = config(&[("ipv4.dhcp", "maybe"), ("bogus", "1")]);

        match validator.validate("lxdbr0", &cfg, rules()) {
            Err(NetworkError::Validation(ValidationError::InvalidValue { key, .. })) => {
                assert_eq!(key, "ipv4.dhcp");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_driver_rules_override_common_rules() {
        let common = ValidationRules::new().with("mtu", |_: &str| {
            Err(RuleViolation::new("common rule should be replaced"))
        });
        let validator = FieldValidator::with_common_rules(common);
        let driver = ValidationRules::new().with("mtu", |_: &str| Ok(()));

        let cfg = config(&[("mtu", "1500")]);
        assert!(validator.validate("lxdbr0", &cfg, driver).is_ok());
    }

    #[test]
    fn test_error_message_names_network_and_key() {
        let validator = FieldValidator::new();
        let cfg = config(&[("ipv6.dhcp", "perhaps")]);
        let message = validator
            .validate("lxdbr0", &cfg, rules())
            .unwrap_err()
            .to_string();

        assert!(message.contains("\"lxdbr0\""));
        assert!(message.contains("\"ipv6.dhcp\""));
    }
}

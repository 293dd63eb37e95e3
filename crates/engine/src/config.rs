//! Engine configuration
//!
//! [`EngineConfig`] carries the policy flags of the propagation engine. The
//! configuration is fixed at engine construction and read-only afterwards;
//! the engine itself holds no other shared mutable state. It serializes
//! through serde so deployments can persist and reload manager settings.

use demarc_core::TIMEOUT_DEFAULT;
use serde::{Deserialize, Serialize};

/// When the engine activates synchronization for a transaction scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizationPolicy {
    /// Activate synchronization for every scope, including empty ones
    /// running without a physical transaction.
    #[default]
    Always,
    /// Activate synchronization only for scopes backed by a physical
    /// transaction.
    OnActualTransaction,
    /// Never activate synchronization.
    Never,
}

/// Policy flags for the propagation engine
///
/// Field defaults are the conservative ones: nesting disallowed, existing
/// transactions unvalidated, participation failures poison the outer
/// transaction, rollback-only surfaces at the outermost boundary, commit
/// failures are not followed by a rollback attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether `nested` propagation is permitted at all.
    pub nested_transaction_allowed: bool,
    /// Whether participation validates isolation and read-only compatibility
    /// against the existing transaction.
    pub validate_existing_transaction: bool,
    /// Whether a participating scope's rollback marks the whole existing
    /// transaction rollback-only.
    pub global_rollback_on_participation_failure: bool,
    /// Whether a global rollback-only marker raises `UnexpectedRollback` at
    /// the inner boundary that first observes it, instead of only at the
    /// outermost one.
    pub fail_early_on_global_rollback_only: bool,
    /// Whether a failed physical commit is followed by a rollback attempt.
    pub rollback_on_commit_failure: bool,
    /// When to activate synchronization for new scopes.
    pub synchronization: SynchronizationPolicy,
    /// Default timeout in seconds applied when a definition leaves the
    /// timeout at the infrastructure default; `-1` delegates to the resource
    /// manager.
    pub default_timeout_seconds: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            nested_transaction_allowed: false,
            validate_existing_transaction: false,
            global_rollback_on_participation_failure: true,
            fail_early_on_global_rollback_only: false,
            rollback_on_commit_failure: false,
            synchronization: SynchronizationPolicy::Always,
            default_timeout_seconds: TIMEOUT_DEFAULT,
        }
    }
}

impl EngineConfig {
    /// Permit `nested` propagation.
    pub fn with_nested_transaction_allowed(mut self, allowed: bool) -> Self {
        self.nested_transaction_allowed = allowed;
        self
    }

    /// Validate isolation and read-only compatibility on participation.
    pub fn with_validate_existing_transaction(mut self, validate: bool) -> Self {
        self.validate_existing_transaction = validate;
        self
    }

    /// Control whether participation failures poison the outer transaction.
    pub fn with_global_rollback_on_participation_failure(mut self, global: bool) -> Self {
        self.global_rollback_on_participation_failure = global;
        self
    }

    /// Raise `UnexpectedRollback` as soon as a global rollback-only marker is
    /// observed.
    pub fn with_fail_early_on_global_rollback_only(mut self, fail_early: bool) -> Self {
        self.fail_early_on_global_rollback_only = fail_early;
        self
    }

    /// Attempt a rollback when the physical commit fails.
    pub fn with_rollback_on_commit_failure(mut self, rollback: bool) -> Self {
        self.rollback_on_commit_failure = rollback;
        self
    }

    /// Set the synchronization activation policy.
    pub fn with_synchronization(mut self, policy: SynchronizationPolicy) -> Self {
        self.synchronization = policy;
        self
    }

    /// Set the default timeout in seconds.
    pub fn with_default_timeout_seconds(mut self, seconds: i32) -> Self {
        self.default_timeout_seconds = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let config = EngineConfig::default();
        assert!(!config.nested_transaction_allowed);
        assert!(!config.validate_existing_transaction);
        assert!(config.global_rollback_on_participation_failure);
        assert!(!config.fail_early_on_global_rollback_only);
        assert!(!config.rollback_on_commit_failure);
        assert_eq!(config.synchronization, SynchronizationPolicy::Always);
        assert_eq!(config.default_timeout_seconds, TIMEOUT_DEFAULT);
    }

    #[test]
    fn serde_round_trip_preserves_flags() {
        let config = EngineConfig::default()
            .with_nested_transaction_allowed(true)
            .with_validate_existing_transaction(true)
            .with_rollback_on_commit_failure(true)
            .with_synchronization(SynchronizationPolicy::OnActualTransaction)
            .with_default_timeout_seconds(45);

        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let back: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(back, EngineConfig::default());
    }
}

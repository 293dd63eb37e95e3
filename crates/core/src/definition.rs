//! Transaction definitions
//!
//! A [`TransactionDefinition`] is the immutable input to the engine: it names
//! the propagation mode, the requested isolation level, the timeout, the
//! read-only hint, and an optional diagnostic name. The engine reads it when
//! deciding whether to join, suspend, or begin a transaction; the resource
//! manager receives it when a physical transaction is actually begun.

use serde::{Deserialize, Serialize};

/// Timeout value meaning "use the infrastructure default".
pub const TIMEOUT_DEFAULT: i32 = -1;

/// Propagation mode requested by the caller
///
/// Decides how the engine behaves depending on whether the calling flow
/// already participates in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the current transaction; begin a new one if none exists.
    #[default]
    Required,
    /// Join the current transaction; run non-transactionally if none exists.
    Supports,
    /// Join the current transaction; fail if none exists.
    Mandatory,
    /// Begin a new transaction, suspending the current one if it exists.
    RequiresNew,
    /// Run non-transactionally, suspending the current transaction if it exists.
    NotSupported,
    /// Run non-transactionally; fail if a transaction exists.
    Never,
    /// Run in a nested transaction if a transaction exists; behave like
    /// `Required` otherwise.
    Nested,
}

impl Propagation {
    /// Canonical lowercase name, as used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "required",
            Propagation::Supports => "supports",
            Propagation::Mandatory => "mandatory",
            Propagation::RequiresNew => "requires_new",
            Propagation::NotSupported => "not_supported",
            Propagation::Never => "never",
            Propagation::Nested => "nested",
        }
    }
}

impl std::fmt::Display for Propagation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Isolation level requested for a transaction
///
/// `None` in a definition means "whatever the resource manager defaults to";
/// a concrete level is passed through to the resource manager and recorded as
/// the ambient isolation level for participation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads, non-repeatable reads and phantom reads may occur.
    ReadUncommitted,
    /// Dirty reads are prevented.
    ReadCommitted,
    /// Dirty reads and non-repeatable reads are prevented.
    RepeatableRead,
    /// Full serializable isolation.
    Serializable,
}

impl IsolationLevel {
    /// Canonical lowercase name, as used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied description of the transaction to obtain
///
/// Immutable once handed to the engine. The default definition is
/// `Required` propagation, resource-default isolation, infrastructure-default
/// timeout, read-write, unnamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDefinition {
    /// How to behave with respect to an existing transaction.
    pub propagation: Propagation,
    /// Requested isolation level, or `None` for the resource default.
    pub isolation: Option<IsolationLevel>,
    /// Timeout in seconds; [`TIMEOUT_DEFAULT`] means "infrastructure default".
    pub timeout_seconds: i32,
    /// Whether the transaction is declared read-only.
    pub read_only: bool,
    /// Optional name for diagnostics.
    pub name: Option<String>,
}

impl Default for TransactionDefinition {
    fn default() -> Self {
        TransactionDefinition {
            propagation: Propagation::default(),
            isolation: None,
            timeout_seconds: TIMEOUT_DEFAULT,
            read_only: false,
            name: None,
        }
    }
}

impl TransactionDefinition {
    /// Create a definition with the given propagation mode and defaults for
    /// everything else.
    pub fn with_propagation(propagation: Propagation) -> Self {
        TransactionDefinition {
            propagation,
            ..TransactionDefinition::default()
        }
    }

    /// Set the requested isolation level.
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// Set the timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: i32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Declare the transaction read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Attach a diagnostic name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

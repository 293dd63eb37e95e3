//! Core types and contracts for the demarc transaction runtime
//!
//! This crate defines the vocabulary shared by the binding registry and the
//! propagation engine:
//! - TransactionDefinition: propagation, isolation, timeout, read-only, name
//! - TransactionError: the error taxonomy for all runtime operations
//! - ResourceManager: the contract a concrete transactional resource fulfills
//! - TransactionSynchronization: the participant callback contract
//! - CompletionStatus: the outcome reported to after-completion callbacks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod definition;
pub mod error;
pub mod sync;
pub mod traits;

pub use definition::{IsolationLevel, Propagation, TransactionDefinition, TIMEOUT_DEFAULT};
pub use error::{Result, TransactionError};
pub use sync::{CompletionStatus, TransactionSynchronization};
pub use traits::ResourceManager;

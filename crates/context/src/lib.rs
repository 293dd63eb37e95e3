//! Per-flow transaction context for the demarc runtime
//!
//! This crate holds the state that cooperating transactional code shares
//! within one flow of execution:
//! - registry: resource bindings, registered synchronizations, and ambient
//!   transaction attributes, all thread-local
//! - dispatch: ordered fan-out of synchronization callbacks with the
//!   per-phase error policies
//!
//! The propagation engine initializes and tears this state down; resource
//! managers bind and look up their holders here while a transaction runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod registry;

pub use registry::{InheritedContext, ResourceHolder, ResourceKey};

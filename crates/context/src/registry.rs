//! Per-flow binding registry
//!
//! The registry is the rendezvous point between the propagation engine and
//! cooperating resource code. Everything in it is scoped to the current flow
//! (thread): a map from [`ResourceKey`] to an opaque resource holder, the
//! ordered list of registered synchronizations, and the ambient attributes of
//! the transaction the flow currently runs under (name, read-only flag,
//! isolation level, whether a physical transaction is active).
//!
//! Resource holders are owned by the resource-manager code that binds them;
//! the engine never looks inside. Synchronizations are invoked in
//! registration order by the dispatch module.
//!
//! Two flows never observe each other's registry contents. The one sanctioned
//! way to cross a flow boundary is [`inheritable_snapshot`]: bindings made
//! with [`bind_resource_inheritable`] and the ambient attributes are captured
//! into an [`InheritedContext`] that a spawned flow installs once; mutations
//! afterwards stay local to each flow.

use demarc_core::{IsolationLevel, Result, TransactionError, TransactionSynchronization};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque holder for a bound resource.
pub type ResourceHolder = Arc<dyn Any + Send + Sync>;

/// Identity under which a resource holder is bound, usually one per
/// connection factory or session factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Uuid);

impl ResourceKey {
    /// Mint a fresh key.
    pub fn new() -> Self {
        ResourceKey(Uuid::new_v4())
    }
}

impl Default for ResourceKey {
    fn default() -> Self {
        ResourceKey::new()
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct BoundResource {
    holder: ResourceHolder,
    inheritable: bool,
}

#[derive(Default)]
struct FlowContext {
    resources: HashMap<ResourceKey, BoundResource>,
    // None while synchronization is inactive; order is registration order.
    synchronizations: Option<Vec<Rc<dyn TransactionSynchronization>>>,
    current_name: Option<String>,
    current_read_only: bool,
    current_isolation: Option<IsolationLevel>,
    actual_transaction_active: bool,
}

thread_local! {
    static CONTEXT: RefCell<FlowContext> = RefCell::new(FlowContext::default());
}

/// Bind a resource holder under the given key for the current flow.
///
/// Fails with a usage error if the key is already bound.
pub fn bind_resource(key: ResourceKey, holder: ResourceHolder) -> Result<()> {
    bind(key, holder, false)
}

/// Bind a resource holder that spawned flows inherit through
/// [`inheritable_snapshot`].
pub fn bind_resource_inheritable(key: ResourceKey, holder: ResourceHolder) -> Result<()> {
    bind(key, holder, true)
}

fn bind(key: ResourceKey, holder: ResourceHolder, inheritable: bool) -> Result<()> {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        if context.resources.contains_key(&key) {
            return Err(TransactionError::usage(format!(
                "a resource is already bound for key {key}"
            )));
        }
        context
            .resources
            .insert(key, BoundResource { holder, inheritable });
        Ok(())
    })
}

/// Remove and return the resource bound under the given key.
///
/// Fails with a usage error if nothing is bound.
pub fn unbind_resource(key: ResourceKey) -> Result<ResourceHolder> {
    unbind_resource_if_bound(key).ok_or_else(|| {
        TransactionError::usage(format!("no resource bound for key {key}"))
    })
}

/// Remove and return the resource bound under the given key, if any.
pub fn unbind_resource_if_bound(key: ResourceKey) -> Option<ResourceHolder> {
    CONTEXT.with(|context| {
        context
            .borrow_mut()
            .resources
            .remove(&key)
            .map(|bound| bound.holder)
    })
}

/// Return the resource bound under the given key, if any.
pub fn resource(key: ResourceKey) -> Option<ResourceHolder> {
    CONTEXT.with(|context| {
        context
            .borrow()
            .resources
            .get(&key)
            .map(|bound| Arc::clone(&bound.holder))
    })
}

/// Whether a resource is bound under the given key.
pub fn has_resource(key: ResourceKey) -> bool {
    CONTEXT.with(|context| context.borrow().resources.contains_key(&key))
}

/// Activate synchronization for the current flow.
///
/// Fails with a usage error if synchronization is already active.
pub fn init_synchronization() -> Result<()> {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        if context.synchronizations.is_some() {
            return Err(TransactionError::usage(
                "cannot activate transaction synchronization: already active",
            ));
        }
        context.synchronizations = Some(Vec::new());
        Ok(())
    })
}

/// Whether synchronization is active for the current flow.
pub fn is_synchronization_active() -> bool {
    CONTEXT.with(|context| context.borrow().synchronizations.is_some())
}

/// Register a synchronization with the current flow.
///
/// Callbacks fire in registration order. Fails with a usage error if
/// synchronization is not active.
pub fn register_synchronization(
    synchronization: Rc<dyn TransactionSynchronization>,
) -> Result<()> {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        match context.synchronizations.as_mut() {
            Some(synchronizations) => {
                synchronizations.push(synchronization);
                Ok(())
            }
            None => Err(TransactionError::usage(
                "transaction synchronization is not active",
            )),
        }
    })
}

/// Snapshot of the registered synchronizations in registration order.
///
/// Empty when synchronization is not active. The snapshot is independent of
/// later registrations.
pub fn synchronizations() -> Vec<Rc<dyn TransactionSynchronization>> {
    CONTEXT.with(|context| {
        context
            .borrow()
            .synchronizations
            .as_ref()
            .cloned()
            .unwrap_or_default()
    })
}

/// Deactivate synchronization for the current flow, dropping any registered
/// synchronizations.
pub fn clear_synchronization() {
    CONTEXT.with(|context| {
        context.borrow_mut().synchronizations = None;
    });
}

/// Set the ambient transaction name.
pub fn set_current_name(name: Option<String>) {
    CONTEXT.with(|context| {
        context.borrow_mut().current_name = name;
    });
}

/// Ambient transaction name, if any.
pub fn current_name() -> Option<String> {
    CONTEXT.with(|context| context.borrow().current_name.clone())
}

/// Set the ambient read-only flag.
pub fn set_current_read_only(read_only: bool) {
    CONTEXT.with(|context| {
        context.borrow_mut().current_read_only = read_only;
    });
}

/// Ambient read-only flag.
pub fn is_current_read_only() -> bool {
    CONTEXT.with(|context| context.borrow().current_read_only)
}

/// Set the ambient isolation level.
pub fn set_current_isolation(isolation: Option<IsolationLevel>) {
    CONTEXT.with(|context| {
        context.borrow_mut().current_isolation = isolation;
    });
}

/// Ambient isolation level, if one was requested for the active transaction.
pub fn current_isolation() -> Option<IsolationLevel> {
    CONTEXT.with(|context| context.borrow().current_isolation)
}

/// Record whether a physical transaction is active for the current flow.
pub fn set_actual_transaction_active(active: bool) {
    CONTEXT.with(|context| {
        context.borrow_mut().actual_transaction_active = active;
    });
}

/// Whether a physical transaction is active for the current flow.
pub fn is_actual_transaction_active() -> bool {
    CONTEXT.with(|context| context.borrow().actual_transaction_active)
}

/// Reset synchronization state and ambient attributes for the current flow.
///
/// Bound resources are left alone: they belong to the resource-manager code
/// that bound them and are unbound by it.
pub fn clear() {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        context.synchronizations = None;
        context.current_name = None;
        context.current_read_only = false;
        context.current_isolation = None;
        context.actual_transaction_active = false;
    });
}

/// Snapshot of the inheritable part of the current flow's registry
///
/// Captures bindings made with [`bind_resource_inheritable`] and the ambient
/// attributes. Install it once in a spawned flow; the two flows then evolve
/// independently. Synchronizations are never inherited.
#[derive(Clone)]
pub struct InheritedContext {
    resources: Vec<(ResourceKey, ResourceHolder)>,
    name: Option<String>,
    read_only: bool,
    isolation: Option<IsolationLevel>,
    actual_transaction_active: bool,
}

/// Capture the inheritable bindings and ambient attributes of the current
/// flow for installation in a spawned flow.
pub fn inheritable_snapshot() -> InheritedContext {
    CONTEXT.with(|context| {
        let context = context.borrow();
        InheritedContext {
            resources: context
                .resources
                .iter()
                .filter(|(_, bound)| bound.inheritable)
                .map(|(key, bound)| (*key, Arc::clone(&bound.holder)))
                .collect(),
            name: context.current_name.clone(),
            read_only: context.current_read_only,
            isolation: context.current_isolation,
            actual_transaction_active: context.actual_transaction_active,
        }
    })
}

impl InheritedContext {
    /// Install the snapshot into the current flow's registry.
    pub fn install(self) {
        CONTEXT.with(|context| {
            let mut context = context.borrow_mut();
            for (key, holder) in self.resources {
                context.resources.insert(
                    key,
                    BoundResource {
                        holder,
                        inheritable: true,
                    },
                );
            }
            context.current_name = self.name;
            context.current_read_only = self.read_only;
            context.current_isolation = self.isolation;
            context.actual_transaction_active = self.actual_transaction_active;
        });
    }
}

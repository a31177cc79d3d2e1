//! Scopes: logical units of work with their own instance cache and
//! disposal tracking.
//!
//! A scope is created by [`Container::begin_scope`](crate::Container::begin_scope)
//! and becomes the ambient scope for the creating thread. Scopes nest:
//! ending one restores the previously active scope as current. A scope's
//! cache is owned by exactly one logical unit of work and is not meant for
//! cross-thread sharing without external synchronization.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// An object released when its owning scope (or the container, for
/// singletons) ends.
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> anyhow::Result<()>;
}

/// Type-erased shared instance as stored in caches.
pub(crate) type AnyInstance = Arc<dyn Any + Send + Sync>;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Arc<ScopeInner>>> = RefCell::new(Vec::new());
}

/// The cache is keyed by the registration's unique id, not the service
/// `TypeId`: registration ids are container-wide unique, so two containers
/// sharing one ambient scope on a thread can never serve each other's
/// instances.
#[derive(Default)]
pub(crate) struct ScopeInner {
    instances: Mutex<HashMap<u64, AnyInstance>>,
    disposables: Mutex<Vec<(&'static str, Arc<dyn Disposable>)>>,
}

impl ScopeInner {
    pub(crate) fn cached(&self, registration_id: u64) -> Option<AnyInstance> {
        self.instances.lock().get(&registration_id).cloned()
    }

    /// Caches `instance` unless a concurrent build got there first and
    /// returns whichever instance the scope ended up holding.
    pub(crate) fn insert(&self, registration_id: u64, instance: AnyInstance) -> AnyInstance {
        self.instances
            .lock()
            .entry(registration_id)
            .or_insert(instance)
            .clone()
    }

    pub(crate) fn track(&self, type_name: &'static str, disposable: Arc<dyn Disposable>) {
        self.disposables.lock().push((type_name, disposable));
    }

    fn dispose_all(&self) {
        let disposables = std::mem::take(&mut *self.disposables.lock());
        // Reverse creation order; a failing disposer must not prevent the
        // remaining instances from being released.
        for (type_name, disposable) in disposables.into_iter().rev() {
            if let Err(err) = disposable.dispose() {
                warn!("failed to dispose scoped instance of {type_name}: {err:#}");
            }
        }
        self.instances.lock().clear();
    }
}

/// A disposal-and-cache unit bound to one logical unit of work.
///
/// Ending the scope (explicitly via [`Scope::dispose`] or by dropping it)
/// disposes every tracked instance in reverse creation order, exactly once
/// each, evicts the cache and restores the parent scope as current.
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub(crate) fn begin() -> Self {
        let inner = Arc::new(ScopeInner::default());
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(Arc::clone(&inner)));
        debug!("scope started");
        Scope { inner }
    }

    /// The ambient scope of the calling thread, if any.
    pub(crate) fn current() -> Option<Arc<ScopeInner>> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Ends the scope. Equivalent to dropping it; provided for call sites
    /// where the disposal point should be explicit.
    pub fn dispose(self) {}

    /// Number of instances currently cached in this scope.
    pub fn cached_instances(&self) -> usize {
        self.inner.instances.lock().len()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Scopes normally end in LIFO order; searching from the back
            // keeps an out-of-order drop from detaching a sibling.
            if let Some(pos) = stack.iter().rposition(|s| Arc::ptr_eq(s, &self.inner)) {
                stack.remove(pos);
            }
        });
        self.inner.dispose_all();
        debug!("scope ended");
    }
}

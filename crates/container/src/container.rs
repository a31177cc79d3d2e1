//! The resolution engine.
//!
//! The registration table is an immutable snapshot behind a single swapped
//! reference: every mutation clones the table, applies the change and swaps
//! the `Arc`, so a resolution in flight always observes an internally
//! consistent point-in-time view. Readers capture the reference once per
//! operation and never block writers beyond the swap itself.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::ContainerOptions;
use crate::errors::ContainerError;
use crate::graph::DependencyGraph;
use crate::lifetime::Lifetime;
use crate::metrics::{ContainerMetrics, ContainerStats};
use crate::registration::{erase_factory, Binding, ProvidedRegistration, Registration, ServiceKey};
use crate::scope::{Disposable, Scope};

/// Hook consulted when a requested type has no registration. May synthesize
/// one on the fly (convention-based and open-ended bindings). Shared so the
/// container can invoke it without holding any of its own locks; a hook may
/// resolve further unregistered types inline.
pub type UnregisteredTypeHook =
    Arc<dyn Fn(&Container, ServiceKey) -> Option<ProvidedRegistration> + Send + Sync>;

/// Read-only metadata for one registration, consumed by diagnostics.
#[derive(Debug, Clone)]
pub struct RegistrationInfo {
    pub key: ServiceKey,
    pub lifetime: Lifetime,
    pub dependencies: Vec<ServiceKey>,
    pub tracked_for_disposal: bool,
    pub registered_at: Instant,
}

#[derive(Default, Clone)]
struct Snapshot {
    registrations: HashMap<TypeId, Arc<Registration>>,
    collections: HashMap<TypeId, Vec<Arc<Registration>>>,
}

/// The root owner of all registrations.
///
/// Registrations are accepted until the container produces its first
/// instance; from then on the container is locked and only the
/// unregistered-type hook may add implicit registrations (through the same
/// snapshot-replacement discipline). `get_instance` is safe for unbounded
/// concurrent callers, including the very first resolution of a singleton.
pub struct Container {
    snapshot: RwLock<Arc<Snapshot>>,
    options: ContainerOptions,
    metrics: ContainerMetrics,
    locked: AtomicBool,
    verified: AtomicBool,
    disposed: AtomicBool,
    disposables: Mutex<Vec<(&'static str, Arc<dyn Disposable>)>>,
    hook: RwLock<Option<UnregisteredTypeHook>>,
    hook_attempts: Mutex<HashSet<TypeId>>,
}

impl Container {
    pub fn new() -> Self {
        Self::build(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Result<Self, ContainerError> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: ContainerOptions) -> Self {
        debug!("container created ({})", options.describe());
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            options,
            metrics: ContainerMetrics::default(),
            locked: AtomicBool::new(false),
            verified: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            disposables: Mutex::new(Vec::new()),
            hook: RwLock::new(None),
            hook_attempts: Mutex::new(HashSet::new()),
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Whether the container has produced at least one instance.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Whether `verify()` has completed successfully.
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    //
    // Registration
    //

    /// Starts a fluent registration for `T` (transient unless changed).
    pub fn bind<T: Send + Sync + 'static>(&self) -> Binding<'_, T> {
        Binding::new(self)
    }

    /// Registers `T` with a factory and the given lifetime.
    pub fn register<T, F>(&self, lifetime: Lifetime, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind::<T>().lifetime(lifetime).to(factory)
    }

    /// Registers an externally constructed value as a singleton.
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        instance: T,
    ) -> Result<(), ContainerError> {
        self.bind::<T>().to_instance(instance)
    }

    pub(crate) fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<(), ContainerError> {
        let key = registration.key();
        let lifetime = registration.lifetime();
        let mut guard = self.snapshot.write();
        if self.locked.load(Ordering::Acquire) {
            return Err(ContainerError::Locked {
                type_name: key.type_name,
            });
        }
        if guard.registrations.contains_key(&key.type_id) {
            return Err(ContainerError::AlreadyRegistered {
                type_name: key.type_name,
            });
        }
        let mut next = (**guard).clone();
        next.registrations
            .insert(key.type_id, Arc::new(registration));
        *guard = Arc::new(next);
        drop(guard);

        if self.options.enable_metrics {
            self.metrics.record_registration();
        }
        debug!("registered {} with {} lifetime", key.type_name, lifetime);
        Ok(())
    }

    /// Appends one registration to the collection for `T`
    /// (multi-registration; resolved with [`Container::get_all_instances`]).
    pub fn append<T, F>(&self, lifetime: Lifetime, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<T>();
        let registration = Registration::new(
            key,
            lifetime,
            Vec::new(),
            erase_factory(factory),
            None,
        );
        let mut guard = self.snapshot.write();
        if self.locked.load(Ordering::Acquire) {
            return Err(ContainerError::Locked {
                type_name: key.type_name,
            });
        }
        let mut next = (**guard).clone();
        next.collections
            .entry(key.type_id)
            .or_default()
            .push(Arc::new(registration));
        *guard = Arc::new(next);
        drop(guard);

        if self.options.enable_metrics {
            self.metrics.record_registration();
        }
        debug!("appended {} to collection ({})", key.type_name, lifetime);
        Ok(())
    }

    /// Installs the hook consulted for unregistered types. The hook is
    /// invoked at most once per service type, under mutual exclusion.
    pub fn set_unregistered_type_hook<H>(&self, hook: H)
    where
        H: Fn(&Container, ServiceKey) -> Option<ProvidedRegistration> + Send + Sync + 'static,
    {
        *self.hook.write() = Some(Arc::new(hook));
    }

    //
    // Resolution
    //

    /// Resolves an instance of `T`, producing it (and its dependencies)
    /// on first use. The first successful call locks the container.
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let key = ServiceKey::of::<T>();
        let registration = match self.lookup_or_synthesize(key) {
            Ok(registration) => registration,
            Err(err) => {
                if self.options.enable_metrics {
                    self.metrics.record_resolution(false);
                }
                return Err(err);
            }
        };
        self.resolve_registration::<T>(&registration)
    }

    /// Like [`Container::get_instance`], returning `None` on any failure.
    pub fn try_get_instance<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.get_instance::<T>() {
            Ok(instance) => Some(instance),
            Err(err) => {
                debug!("failed to resolve {}: {err}", std::any::type_name::<T>());
                None
            }
        }
    }

    /// Resolves every registration appended to the collection for `T`, in
    /// append order. An absent collection yields an empty vec.
    pub fn get_all_instances<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        let key = ServiceKey::of::<T>();
        let snapshot = self.snapshot();
        let Some(registrations) = snapshot.collections.get(&key.type_id) else {
            return Ok(Vec::new());
        };
        let mut instances = Vec::with_capacity(registrations.len());
        for registration in registrations {
            instances.push(self.resolve_registration::<T>(registration)?);
        }
        Ok(instances)
    }

    pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
        self.snapshot()
            .registrations
            .contains_key(&TypeId::of::<T>())
    }

    /// Begins a new scope and makes it the calling thread's ambient scope.
    pub fn begin_scope(&self) -> Scope {
        Scope::begin()
    }

    /// Whether the calling thread has an ambient scope.
    pub fn has_active_scope(&self) -> bool {
        Scope::current().is_some()
    }

    fn resolve_registration<T: Send + Sync + 'static>(
        &self,
        registration: &Registration,
    ) -> Result<Arc<T>, ContainerError> {
        match registration.produce(self) {
            Ok(instance) => {
                self.locked.store(true, Ordering::Release);
                if self.options.enable_metrics {
                    self.metrics.record_resolution(true);
                }
                instance
                    .downcast::<T>()
                    .map_err(|_| ContainerError::TypeMismatch {
                        type_name: registration.key().type_name,
                    })
            }
            Err(err) => {
                if self.options.enable_metrics {
                    self.metrics.record_resolution(false);
                }
                Err(err)
            }
        }
    }

    fn lookup_or_synthesize(&self, key: ServiceKey) -> Result<Arc<Registration>, ContainerError> {
        if let Some(registration) = self.snapshot().registrations.get(&key.type_id) {
            return Ok(Arc::clone(registration));
        }

        let hook = match self.hook.read().as_ref() {
            Some(hook) => Arc::clone(hook),
            None => {
                return Err(ContainerError::NotRegistered {
                    type_name: key.type_name,
                })
            }
        };

        // The attempt is recorded under the lock (at most one caller per
        // service type ever reaches the hook), but the hook itself runs
        // with no container lock held: it may resolve further unregistered
        // types inline, re-entering this path.
        {
            let mut attempts = self.hook_attempts.lock();
            if let Some(registration) = self.snapshot().registrations.get(&key.type_id) {
                return Ok(Arc::clone(registration));
            }
            if !attempts.insert(key.type_id) {
                return Err(ContainerError::NotRegistered {
                    type_name: key.type_name,
                });
            }
        }
        debug!("consulting unregistered-type hook for {}", key.type_name);
        match (*hook)(self, key) {
            Some(provided) => {
                let registration = Arc::new(provided.into_registration());
                let mut guard = self.snapshot.write();
                let mut next = (**guard).clone();
                next.registrations
                    .insert(key.type_id, Arc::clone(&registration));
                *guard = Arc::new(next);
                debug!("hook provided a registration for {}", key.type_name);
                Ok(registration)
            }
            None => Err(ContainerError::NotRegistered {
                type_name: key.type_name,
            }),
        }
    }

    //
    // Verification
    //

    /// Eagerly validates and builds every registration, aggregating every
    /// configuration error instead of failing on the first.
    ///
    /// Phase one checks the declared dependency graph (missing dependencies,
    /// cycles); phase two, entered only with a clean graph, instantiates
    /// every registration inside a throwaway scope so scoped plans are
    /// exercised too. Success marks the container verified and locked.
    pub fn verify(&self) -> Result<(), ContainerError> {
        let snapshot = self.snapshot();
        info!(
            "verifying container with {} registration(s)",
            snapshot.registrations.len()
        );
        let mut errors = Vec::new();

        if self.options.enable_graph_validation {
            let mut graph = DependencyGraph::new();
            for registration in snapshot.registrations.values() {
                graph.add_node(registration.key(), registration.dependencies());
            }
            errors.extend(graph.missing_dependencies());
            errors.extend(graph.cycle_errors());
        }

        if errors.is_empty() {
            let mut registrations: Vec<&Arc<Registration>> =
                snapshot.registrations.values().collect();
            registrations.sort_by_key(|registration| registration.key().type_name);

            let scope = self.begin_scope();
            for registration in registrations {
                if let Err(err) = registration.produce(self) {
                    errors.push(err);
                }
            }
            scope.dispose();
        }

        if errors.is_empty() {
            self.locked.store(true, Ordering::Release);
            self.verified.store(true, Ordering::Release);
            info!("container verified");
            Ok(())
        } else {
            error!("container verification failed with {} error(s)", errors.len());
            Err(ContainerError::Verification { errors })
        }
    }

    //
    // Introspection
    //

    /// Read-only view of the registration snapshot, sorted by type name.
    pub fn registration_infos(&self) -> Vec<RegistrationInfo> {
        let snapshot = self.snapshot();
        let mut infos: Vec<RegistrationInfo> = snapshot
            .registrations
            .values()
            .map(|registration| RegistrationInfo {
                key: registration.key(),
                lifetime: registration.lifetime(),
                dependencies: registration.dependencies().to_vec(),
                tracked_for_disposal: registration.is_tracked(),
                registered_at: registration.registered_at(),
            })
            .collect();
        infos.sort_by_key(|info| info.key.type_name);
        infos
    }

    pub fn stats(&self) -> ContainerStats {
        let snapshot = self.snapshot();
        let cached_singletons = snapshot
            .registrations
            .values()
            .filter(|registration| registration.has_cached_singleton())
            .count();
        self.metrics
            .snapshot(snapshot.registrations.len(), cached_singletons)
    }

    //
    // Disposal
    //

    pub(crate) fn track_disposable(
        &self,
        type_name: &'static str,
        disposable: Arc<dyn Disposable>,
    ) {
        self.disposables.lock().push((type_name, disposable));
    }

    /// Disposes every container-owned (singleton) disposable instance, in
    /// reverse creation order. Idempotent; also runs on drop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let disposables = std::mem::take(&mut *self.disposables.lock());
        if !disposables.is_empty() {
            debug!("disposing {} container-owned instance(s)", disposables.len());
        }
        for (type_name, disposable) in disposables.into_iter().rev() {
            if let Err(err) = disposable.dispose() {
                warn!("failed to dispose singleton {type_name}: {err:#}");
            }
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ServiceA;
    struct ServiceB;

    #[test]
    fn test_registration_infos_sorted_and_complete() {
        let container = Container::new();
        container
            .bind::<ServiceB>()
            .singleton()
            .to(|_| Ok(ServiceB))
            .expect("register ServiceB");
        container
            .bind::<ServiceA>()
            .scoped()
            .depends_on::<ServiceB>()
            .to(|_| Ok(ServiceA))
            .expect("register ServiceA");

        let infos = container.registration_infos();
        assert_eq!(infos.len(), 2);
        assert!(infos[0].key.type_name <= infos[1].key.type_name);

        let service_a = infos
            .iter()
            .find(|info| info.key.type_name.contains("ServiceA"))
            .expect("ServiceA info");
        assert_eq!(service_a.lifetime, Lifetime::Scoped);
        assert_eq!(service_a.dependencies.len(), 1);
        assert!(!service_a.tracked_for_disposal);
    }

    #[test]
    fn test_stats_counts_cached_singletons() {
        let container = Container::new();
        container
            .register(Lifetime::Singleton, |_| Ok(ServiceA))
            .expect("register");

        assert_eq!(container.stats().cached_singletons, 0);
        let _instance = container.get_instance::<ServiceA>().expect("resolve");
        let stats = container.stats();
        assert_eq!(stats.cached_singletons, 1);
        assert_eq!(stats.total_resolutions, 1);
        assert_eq!(stats.registered_services, 1);
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        let container =
            Container::with_options(ContainerOptions::testing()).expect("valid options");
        container
            .register(Lifetime::Transient, |_| Ok(ServiceA))
            .expect("register");
        let _instance = container.get_instance::<ServiceA>().expect("resolve");

        let stats = container.stats();
        assert_eq!(stats.total_resolutions, 0);
        assert_eq!(stats.total_registrations, 0);
    }
}

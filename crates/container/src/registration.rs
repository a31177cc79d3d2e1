//! Registrations: one compiled production plan per service type, paired
//! with a lifetime policy.
//!
//! A registration is immutable once inserted into the container and safe for
//! concurrent reuse. Constructor discovery is declarative: the registrant
//! lists dependency types on the [`Binding`] builder, and the declared edges
//! feed verification and diagnostics.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::container::Container;
use crate::cycle_guard;
use crate::errors::ContainerError;
use crate::lifetime::Lifetime;
use crate::scope::{AnyInstance, Disposable, Scope};

/// Identifier for a service type: its `TypeId` plus a readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ServiceKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Type-erased factory as stored on a registration.
pub(crate) type Factory = Box<dyn Fn(&Container) -> anyhow::Result<AnyInstance> + Send + Sync>;

/// Recovers the `Disposable` view of a produced instance. Captured at
/// registration time, where the concrete type (and its `Disposable` impl)
/// is still known.
pub(crate) type DisposalCoercer =
    Box<dyn Fn(&AnyInstance) -> Option<Arc<dyn Disposable>> + Send + Sync>;

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn erase_factory<T, F>(factory: F) -> Factory
where
    T: Send + Sync + 'static,
    F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Box::new(move |container| {
        let instance = factory(container)?;
        Ok(Arc::new(instance) as AnyInstance)
    })
}

fn disposal_coercer<T>() -> DisposalCoercer
where
    T: Disposable + Send + Sync + 'static,
{
    Box::new(|instance: &AnyInstance| {
        instance
            .clone()
            .downcast::<T>()
            .ok()
            .map(|typed| typed as Arc<dyn Disposable>)
    })
}

/// A compiled binding of one service type to a production plan and a
/// [`Lifetime`].
pub(crate) struct Registration {
    id: u64,
    key: ServiceKey,
    lifetime: Lifetime,
    dependencies: Vec<ServiceKey>,
    factory: Factory,
    disposal: Option<DisposalCoercer>,
    singleton: OnceCell<AnyInstance>,
    registered_at: Instant,
}

impl Registration {
    pub(crate) fn new(
        key: ServiceKey,
        lifetime: Lifetime,
        dependencies: Vec<ServiceKey>,
        factory: Factory,
        disposal: Option<DisposalCoercer>,
    ) -> Self {
        Self {
            id: NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed),
            key,
            lifetime,
            dependencies,
            factory,
            disposal,
            singleton: OnceCell::new(),
            registered_at: Instant::now(),
        }
    }

    pub(crate) fn key(&self) -> ServiceKey {
        self.key
    }

    pub(crate) fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub(crate) fn dependencies(&self) -> &[ServiceKey] {
        &self.dependencies
    }

    pub(crate) fn is_tracked(&self) -> bool {
        self.disposal.is_some()
    }

    pub(crate) fn has_cached_singleton(&self) -> bool {
        self.singleton.get().is_some()
    }

    pub(crate) fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Produces an instance according to the lifetime policy.
    ///
    /// The cycle guard wraps the whole production, so a same-thread
    /// re-entry anywhere below this registration surfaces as a
    /// `CyclicDependency` instead of unbounded recursion.
    pub(crate) fn produce(&self, container: &Container) -> Result<AnyInstance, ContainerError> {
        let _guard = cycle_guard::enter(
            self.id,
            self.key.type_name,
            container.options().max_dependency_depth,
        )?;

        match self.lifetime {
            Lifetime::Transient => {
                let instance = self.invoke_factory(container)?;
                if let (Some(coerce), Some(scope)) = (self.disposal.as_ref(), Scope::current()) {
                    if let Some(disposable) = coerce(&instance) {
                        scope.track(self.key.type_name, disposable);
                    }
                }
                Ok(instance)
            }
            // One thread runs the factory; concurrent first-time callers
            // block until it finishes. A failed build leaves the cell empty,
            // so the next call retries.
            Lifetime::Singleton => self
                .singleton
                .get_or_try_init(|| {
                    let instance = self.invoke_factory(container)?;
                    if let Some(coerce) = self.disposal.as_ref() {
                        if let Some(disposable) = coerce(&instance) {
                            container.track_disposable(self.key.type_name, disposable);
                        }
                    }
                    debug!("cached singleton {}", self.key.type_name);
                    Ok(instance)
                })
                .cloned(),
            Lifetime::Scoped => {
                let scope = Scope::current().ok_or(ContainerError::NoActiveScope {
                    type_name: self.key.type_name,
                })?;
                if let Some(cached) = scope.cached(self.id) {
                    return Ok(cached);
                }
                // Build outside the cache lock: the factory may recursively
                // resolve other scoped services from the same scope.
                let instance = self.invoke_factory(container)?;
                let stored = scope.insert(self.id, instance);
                if let Some(coerce) = self.disposal.as_ref() {
                    if let Some(disposable) = coerce(&stored) {
                        scope.track(self.key.type_name, disposable);
                    }
                }
                Ok(stored)
            }
        }
    }

    fn invoke_factory(&self, container: &Container) -> Result<AnyInstance, ContainerError> {
        (self.factory)(container).map_err(|cause| {
            debug!("factory for {} failed: {cause:#}", self.key.type_name);
            ContainerError::Activation {
                type_name: self.key.type_name,
                cause,
            }
        })
    }
}

/// Fluent registration builder returned by
/// [`Container::bind`](crate::Container::bind).
///
/// Defaults to [`Lifetime::Transient`]; terminal methods ([`Binding::to`],
/// [`Binding::to_instance`]) insert the registration.
pub struct Binding<'c, T: Send + Sync + 'static> {
    container: &'c Container,
    lifetime: Lifetime,
    dependencies: Vec<ServiceKey>,
    disposal: Option<DisposalCoercer>,
    _marker: PhantomData<fn() -> T>,
}

impl<'c, T: Send + Sync + 'static> Binding<'c, T> {
    pub(crate) fn new(container: &'c Container) -> Self {
        Self {
            container,
            lifetime: Lifetime::Transient,
            dependencies: Vec::new(),
            disposal: None,
            _marker: PhantomData,
        }
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    /// Declares a dependency edge, consumed by `verify()` and diagnostics.
    pub fn depends_on<D: 'static>(mut self) -> Self {
        self.dependencies.push(ServiceKey::of::<D>());
        self
    }

    /// Inserts the registration with the given factory.
    pub fn to<F>(self, factory: F) -> Result<(), ContainerError>
    where
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.container.insert_registration(Registration::new(
            ServiceKey::of::<T>(),
            self.lifetime,
            self.dependencies,
            erase_factory(factory),
            self.disposal,
        ))
    }

    /// Registers an externally constructed value as a singleton.
    ///
    /// The instance is owned by its creator, so it is never tracked for
    /// disposal regardless of [`Binding::tracked`].
    pub fn to_instance(self, instance: T) -> Result<(), ContainerError> {
        let shared = Arc::new(instance);
        let factory: Factory = Box::new(move |_| Ok(Arc::clone(&shared) as AnyInstance));
        self.container.insert_registration(Registration::new(
            ServiceKey::of::<T>(),
            Lifetime::Singleton,
            self.dependencies,
            factory,
            None,
        ))
    }
}

impl<'c, T: Disposable + Send + Sync + 'static> Binding<'c, T> {
    /// Tracks produced instances for disposal: scoped and tracked transient
    /// instances are released with their scope, singletons with the
    /// container.
    pub fn tracked(mut self) -> Self {
        self.disposal = Some(disposal_coercer::<T>());
        self
    }
}

/// A registration synthesized by the unregistered-type hook.
///
/// Built with the concrete service type still in scope, then handed back to
/// the container type-erased.
pub struct ProvidedRegistration {
    key: ServiceKey,
    lifetime: Lifetime,
    dependencies: Vec<ServiceKey>,
    factory: Factory,
    disposal: Option<DisposalCoercer>,
}

impl ProvidedRegistration {
    pub fn new<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            key: ServiceKey::of::<T>(),
            lifetime,
            dependencies: Vec::new(),
            factory: erase_factory(factory),
            disposal: None,
        }
    }

    /// Like [`ProvidedRegistration::new`], with disposal tracking.
    pub fn new_tracked<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Disposable + Send + Sync + 'static,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            disposal: Some(disposal_coercer::<T>()),
            ..Self::new::<T, F>(lifetime, factory)
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ServiceKey>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub(crate) fn into_registration(self) -> Registration {
        Registration::new(
            self.key,
            self.lifetime,
            self.dependencies,
            self.factory,
            self.disposal,
        )
    }
}

//! Registration and resolution behavior of the container as a whole.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use container::{Container, ContainerError, Lifetime, ProvidedRegistration, ServiceKey};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug)]
struct Config {
    url: String,
}

struct Client {
    config: Arc<Config>,
}

struct Widget {
    serial: usize,
}

#[test]
fn test_transient_instances_are_distinct() {
    init_tracing();
    let container = Container::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_in_factory = Arc::clone(&counter);
    container
        .register(Lifetime::Transient, move |_| {
            Ok(Widget {
                serial: counter_in_factory.fetch_add(1, Ordering::SeqCst),
            })
        })
        .expect("register Widget");

    let first = container.get_instance::<Widget>().expect("first resolve");
    let second = container.get_instance::<Widget>().expect("second resolve");
    assert_ne!(first.serial, second.serial);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_singleton_is_shared_and_built_once() {
    let container = Container::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let builds_in_factory = Arc::clone(&builds);
    container
        .register(Lifetime::Singleton, move |_| {
            builds_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(Config {
                url: "localhost".into(),
            })
        })
        .expect("register Config");

    let first = container.get_instance::<Config>().expect("first resolve");
    let second = container.get_instance::<Config>().expect("second resolve");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_factories_resolve_their_dependencies() {
    let container = Container::new();
    container
        .bind::<Config>()
        .singleton()
        .to(|_| {
            Ok(Config {
                url: "db:5432".into(),
            })
        })
        .expect("register Config");
    container
        .bind::<Client>()
        .depends_on::<Config>()
        .to(|c| {
            Ok(Client {
                config: c.get_instance::<Config>()?,
            })
        })
        .expect("register Client");

    let client = container.get_instance::<Client>().expect("resolve Client");
    assert_eq!(client.config.url, "db:5432");
}

#[test]
fn test_unregistered_type_can_be_registered_after_failure() {
    let container = Container::new();
    let err = container
        .get_instance::<Config>()
        .expect_err("nothing registered");
    assert!(matches!(err, ContainerError::NotRegistered { .. }));

    // A failed lookup does not lock the container.
    assert!(!container.is_locked());
    container
        .register_instance(Config { url: "late".into() })
        .expect("registration still possible");
    let config = container.get_instance::<Config>().expect("resolve");
    assert_eq!(config.url, "late");
}

#[test]
fn test_container_locks_after_first_resolution() {
    let container = Container::new();
    container
        .register_instance(Config { url: "x".into() })
        .expect("register Config");
    let _ = container.get_instance::<Config>().expect("resolve");

    assert!(container.is_locked());
    let err = container
        .register(Lifetime::Transient, |_| Ok(Widget { serial: 0 }))
        .expect_err("locked container rejects registration");
    assert!(matches!(err, ContainerError::Locked { .. }));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let container = Container::new();
    container
        .register_instance(Config { url: "a".into() })
        .expect("first registration");
    let err = container
        .register_instance(Config { url: "b".into() })
        .expect_err("duplicate registration");
    assert!(matches!(err, ContainerError::AlreadyRegistered { .. }));

    // The original registration is untouched.
    let config = container.get_instance::<Config>().expect("resolve");
    assert_eq!(config.url, "a");
}

#[test]
fn test_registered_instance_is_returned_as_is() {
    let container = Container::new();
    container
        .register_instance(Config { url: "pre".into() })
        .expect("register instance");

    let first = container.get_instance::<Config>().expect("first");
    let second = container.get_instance::<Config>().expect("second");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_try_get_instance() {
    let container = Container::new();
    assert!(container.try_get_instance::<Config>().is_none());

    container
        .register_instance(Config { url: "y".into() })
        .expect("register");
    assert!(container.try_get_instance::<Config>().is_some());
}

#[test]
fn test_failed_factory_is_retried_on_next_resolution() {
    let container = Container::new();
    let healthy = Arc::new(AtomicBool::new(false));
    let healthy_in_factory = Arc::clone(&healthy);
    container
        .register(Lifetime::Singleton, move |_| {
            if healthy_in_factory.load(Ordering::SeqCst) {
                Ok(Config { url: "up".into() })
            } else {
                anyhow::bail!("backend unavailable")
            }
        })
        .expect("register");

    let err = container
        .get_instance::<Config>()
        .expect_err("first attempt fails");
    assert!(matches!(err, ContainerError::Activation { .. }));
    assert!(err.to_string().contains("backend unavailable"));

    healthy.store(true, Ordering::SeqCst);
    let config = container.get_instance::<Config>().expect("second attempt");
    assert_eq!(config.url, "up");

    let stats = container.stats();
    assert_eq!(stats.failed_resolutions, 1);
    assert_eq!(stats.total_resolutions, 2);
}

#[test]
fn test_collections_resolve_in_append_order() {
    let container = Container::new();
    for serial in 0..3 {
        container
            .append(Lifetime::Transient, move |_| Ok(Widget { serial }))
            .expect("append Widget");
    }

    let widgets = container
        .get_all_instances::<Widget>()
        .expect("resolve collection");
    let serials: Vec<usize> = widgets.iter().map(|w| w.serial).collect();
    assert_eq!(serials, vec![0, 1, 2]);

    // No collection registered for this type.
    let configs = container
        .get_all_instances::<Config>()
        .expect("empty collection");
    assert!(configs.is_empty());
}

#[test]
fn test_runtime_cycle_is_reported_with_chain() {
    #[derive(Debug)]
    struct Chicken;
    struct Egg;

    let container = Container::new();
    container
        .bind::<Chicken>()
        .to(|c| {
            let _egg = c.get_instance::<Egg>()?;
            Ok(Chicken)
        })
        .expect("register Chicken");
    container
        .bind::<Egg>()
        .to(|c| {
            let _chicken = c.get_instance::<Chicken>()?;
            Ok(Egg)
        })
        .expect("register Egg");

    let err = container
        .get_instance::<Chicken>()
        .expect_err("cycle must be detected");
    let rendered = err.to_string();
    assert!(rendered.contains("cyclic dependency"));
    assert!(rendered.contains("->"));
}

#[test]
fn test_hook_is_consulted_once_per_type() {
    struct Synthesized {
        marker: &'static str,
    }
    struct NeverProvided;

    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_hook = Arc::clone(&calls);
    container.set_unregistered_type_hook(move |_, key| {
        calls_in_hook.fetch_add(1, Ordering::SeqCst);
        if key == ServiceKey::of::<Synthesized>() {
            Some(ProvidedRegistration::new(Lifetime::Singleton, |_| {
                Ok(Synthesized { marker: "hooked" })
            }))
        } else {
            None
        }
    });

    let first = container
        .get_instance::<Synthesized>()
        .expect("hook provides the registration");
    assert_eq!(first.marker, "hooked");
    let second = container
        .get_instance::<Synthesized>()
        .expect("second resolution hits the registration");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A declined type fails every time but asks the hook only once.
    assert!(container.get_instance::<NeverProvided>().is_err());
    assert!(container.get_instance::<NeverProvided>().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_hook_may_resolve_further_unregistered_types() {
    struct Inner;
    struct Outer {
        inner: Arc<Inner>,
    }

    let container = Container::new();
    container.set_unregistered_type_hook(|c, key| {
        if key == ServiceKey::of::<Inner>() {
            Some(ProvidedRegistration::new(Lifetime::Singleton, |_| Ok(Inner)))
        } else if key == ServiceKey::of::<Outer>() {
            // Re-enters the unregistered-type path from inside the hook.
            let inner = c.get_instance::<Inner>().ok()?;
            Some(ProvidedRegistration::new(Lifetime::Singleton, move |_| {
                Ok(Outer {
                    inner: Arc::clone(&inner),
                })
            }))
        } else {
            None
        }
    });

    let outer = container
        .get_instance::<Outer>()
        .expect("hook chain resolves");
    let inner = container
        .get_instance::<Inner>()
        .expect("inner registered by the nested hook call");
    assert!(Arc::ptr_eq(&outer.inner, &inner));
}

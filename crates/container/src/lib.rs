//! A lifetime-aware service container.
//!
//! Services are registered against their concrete type with one of three
//! lifetimes ([`Lifetime::Transient`], [`Lifetime::Scoped`],
//! [`Lifetime::Singleton`]) and resolved lazily through
//! [`Container::get_instance`]. Scoped services live inside an ambient
//! per-thread [`Scope`] and are disposed with it in reverse creation order.
//! [`Container::verify`] eagerly exercises every registration and reports
//! all configuration errors at once.
//!
//! ```
//! use std::sync::Arc;
//! use container::Container;
//!
//! struct Config { url: String }
//! struct Client { config: Arc<Config> }
//!
//! let container = Container::new();
//! container
//!     .bind::<Config>()
//!     .singleton()
//!     .to(|_| Ok(Config { url: "localhost:5432".into() }))?;
//! container
//!     .bind::<Client>()
//!     .scoped()
//!     .depends_on::<Config>()
//!     .to(|c| Ok(Client { config: c.get_instance::<Config>()? }))?;
//! container.verify()?;
//!
//! let scope = container.begin_scope();
//! let client = container.get_instance::<Client>()?;
//! assert_eq!(client.config.url, "localhost:5432");
//! scope.dispose();
//! # Ok::<(), container::ContainerError>(())
//! ```

mod config;
mod container;
mod cycle_guard;
mod errors;
mod graph;
mod lifetime;
mod metrics;
mod registration;
mod scope;

pub use config::ContainerOptions;
pub use container::{Container, RegistrationInfo, UnregisteredTypeHook};
pub use errors::ContainerError;
pub use lifetime::Lifetime;
pub use metrics::ContainerStats;
pub use registration::{Binding, ProvidedRegistration, ServiceKey};
pub use scope::{Disposable, Scope};

//! Component lifetimes.

use std::fmt;

/// Caching and sharing policy for instances of a registration.
///
/// Variants are ordered by how long produced instances live:
/// `Transient < Scoped < Singleton`. The diagnostics layer relies on this
/// ordering to flag registrations that capture a shorter-lived dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// A new instance on every resolution, never cached.
    Transient,
    /// One instance per active scope, cached in that scope.
    Scoped,
    /// One instance for the whole container, cached for its lifetime.
    Singleton,
}

impl Lifetime {
    /// Whether instances of this lifetime are cached anywhere.
    pub fn caches_instances(&self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
        };
        f.write_str(name)
    }
}

//! Configuration analysis for a [`container::Container`].
//!
//! The analyzer inspects a verified container's registration metadata and
//! reports likely misconfigurations that are legal at registration time:
//! captive dependencies, disposal-tracked transients and oversized
//! dependency lists. It never constructs instances.
//!
//! ```
//! use container::Container;
//! use diagnostics::Analyzer;
//!
//! struct Cache;
//! struct Session;
//!
//! let container = Container::new();
//! container
//!     .bind::<Session>()
//!     .scoped()
//!     .to(|_| Ok(Session))?;
//! container
//!     .bind::<Cache>()
//!     .singleton()
//!     .depends_on::<Session>()
//!     .to(|c| {
//!         let _session = c.get_instance::<Session>()?;
//!         Ok(Cache)
//!     })?;
//! container.verify()?;
//!
//! let findings = Analyzer::new().analyze(&container)?;
//! assert_eq!(findings.len(), 1);
//! assert_eq!(findings[0].rule.id(), "captive-dependency");
//! # Ok::<(), container::ContainerError>(())
//! ```

mod findings;
mod rules;

use std::any::TypeId;
use std::collections::HashMap;

use tracing::{debug, info};

use container::{Container, ContainerError, RegistrationInfo};

pub use findings::{DiagnosticRule, Finding, Severity};

/// Default upper bound on declared dependencies per service.
pub const DEFAULT_DEPENDENCY_THRESHOLD: usize = 6;

/// Runs the diagnostic rules against a verified container.
pub struct Analyzer {
    dependency_threshold: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            dependency_threshold: DEFAULT_DEPENDENCY_THRESHOLD,
        }
    }

    /// Overrides the dependency-count threshold for
    /// [`DiagnosticRule::TooManyDependencies`].
    pub fn with_dependency_threshold(mut self, threshold: usize) -> Self {
        self.dependency_threshold = threshold;
        self
    }

    /// Analyzes the container's registrations.
    ///
    /// Requires a verified container: analysis of an unverified
    /// configuration would report findings about graphs that cannot even
    /// be built. Findings are sorted by descending severity, then by
    /// service type name.
    pub fn analyze(&self, container: &Container) -> Result<Vec<Finding>, ContainerError> {
        if !container.is_verified() {
            return Err(ContainerError::NotVerified);
        }

        let infos = container.registration_infos();
        let by_type: HashMap<TypeId, &RegistrationInfo> =
            infos.iter().map(|info| (info.key.type_id, info)).collect();
        debug!("analyzing {} registration(s)", infos.len());

        let mut findings = rules::captive_dependencies(&infos, &by_type);
        findings.extend(rules::disposable_transients(&infos));
        findings.extend(rules::too_many_dependencies(
            &infos,
            self.dependency_threshold,
        ));

        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.service.type_name.cmp(b.service.type_name))
        });
        info!(
            "analysis finished with {} finding(s) across {} registration(s)",
            findings.len(),
            infos.len()
        );
        Ok(findings)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

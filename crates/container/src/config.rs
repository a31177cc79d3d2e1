//! Container options.

use crate::errors::ContainerError;

/// Tunables for a [`Container`](crate::Container).
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Validate the declared dependency graph during `verify()`.
    pub enable_graph_validation: bool,
    /// Maintain resolution counters (see
    /// [`Container::stats`](crate::Container::stats)).
    pub enable_metrics: bool,
    /// Upper bound on the build recursion depth.
    pub max_dependency_depth: u32,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            enable_graph_validation: true,
            enable_metrics: true,
            max_dependency_depth: 32,
        }
    }
}

impl ContainerOptions {
    /// Production settings: everything on, conservative depth.
    pub fn production() -> Self {
        Self {
            max_dependency_depth: 24,
            ..Self::default()
        }
    }

    /// Settings for tests: no graph validation, no counters, shallow graphs.
    pub fn testing() -> Self {
        Self {
            enable_graph_validation: false,
            enable_metrics: false,
            max_dependency_depth: 16,
        }
    }

    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.max_dependency_depth == 0 {
            return Err(ContainerError::InvalidOptions {
                message: "max_dependency_depth must be greater than 0".to_string(),
            });
        }
        if self.max_dependency_depth > 256 {
            return Err(ContainerError::InvalidOptions {
                message: "max_dependency_depth must not exceed 256".to_string(),
            });
        }
        Ok(())
    }

    /// Human-readable summary, for startup logging.
    pub fn describe(&self) -> String {
        format!(
            "graph_validation={}, metrics={}, max_depth={}",
            self.enable_graph_validation, self.enable_metrics, self.max_dependency_depth
        )
    }
}

//! Error taxonomy for registration, resolution and verification.
//!
//! Every error carries the offending service type name; cycle errors also
//! carry the dependency chain that led to the re-entry, so root causes are
//! diagnosable without a debugger. Factory failures keep the underlying
//! `anyhow::Error` so user context chains survive the wrapping.

use thiserror::Error;

/// Errors produced by the container and its collaborators.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Duplicate registration; the container never overwrites silently.
    #[error("type {type_name} is already registered")]
    AlreadyRegistered { type_name: &'static str },

    /// Registration attempted after the container produced its first
    /// instance.
    #[error("container is locked after first resolution, cannot register {type_name}")]
    Locked { type_name: &'static str },

    #[error("no registration for type {type_name}")]
    NotRegistered { type_name: &'static str },

    /// The build of a registration was re-entered on the same thread.
    #[error("cyclic dependency detected while building {type_name}: {chain}")]
    CyclicDependency {
        type_name: &'static str,
        chain: String,
    },

    #[error("dependency chain of {type_name} exceeds maximum depth {max_depth}")]
    MaxDepthExceeded {
        type_name: &'static str,
        max_depth: u32,
    },

    #[error("cannot resolve scoped type {type_name}: no active scope on this thread")]
    NoActiveScope { type_name: &'static str },

    /// A registration factory failed. Never memoized: the next resolution
    /// retries construction.
    #[error("activation of {type_name} failed: {cause:#}")]
    Activation {
        type_name: &'static str,
        cause: anyhow::Error,
    },

    #[error("{dependent} depends on {dependency}, which is not registered")]
    MissingDependency {
        dependent: &'static str,
        dependency: &'static str,
    },

    /// Aggregate of every configuration error found by `verify()`.
    #[error("container verification failed with {} error(s)", .errors.len())]
    Verification { errors: Vec<ContainerError> },

    /// Diagnostic analysis requires a verified container.
    #[error("container has not been verified")]
    NotVerified,

    #[error("registration for {type_name} produced an instance of an unexpected type")]
    TypeMismatch { type_name: &'static str },

    #[error("invalid container options: {message}")]
    InvalidOptions { message: String },
}

impl ContainerError {
    /// The individual errors behind a [`ContainerError::Verification`],
    /// or a slice containing just `self` for any other variant.
    pub fn details(&self) -> &[ContainerError] {
        match self {
            ContainerError::Verification { errors } => errors,
            _ => std::slice::from_ref(self),
        }
    }
}

//! The individual analysis rules.
//!
//! Each rule inspects the registration metadata only; none of them resolve
//! instances. Lifetimes of declared dependencies are looked up in the same
//! snapshot, so an edge to an unregistered type is simply skipped here
//! (verification already rejects such graphs).

use std::any::TypeId;
use std::collections::HashMap;

use container::{Lifetime, RegistrationInfo};

use crate::findings::{DiagnosticRule, Finding};

/// A longer-lived service keeps every dependency alive for its own
/// lifetime, so a shorter-lived dependency is effectively promoted: a
/// scoped service captured by a singleton outlives every scope.
pub(crate) fn captive_dependencies(
    infos: &[RegistrationInfo],
    by_type: &HashMap<TypeId, &RegistrationInfo>,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for info in infos {
        for dependency in &info.dependencies {
            let Some(target) = by_type.get(&dependency.type_id) else {
                continue;
            };
            if target.lifetime < info.lifetime {
                findings.push(Finding::new(
                    DiagnosticRule::CaptiveDependency,
                    info.key,
                    format!(
                        "{} ({}) depends on {} ({}), which it will keep alive past its intended lifetime",
                        info.key.type_name, info.lifetime, target.key.type_name, target.lifetime
                    ),
                ));
            }
        }
    }
    findings
}

/// Transient instances are only released when an ambient scope tracks
/// them; a disposal-tracked transient resolved outside any scope leaks.
pub(crate) fn disposable_transients(infos: &[RegistrationInfo]) -> Vec<Finding> {
    infos
        .iter()
        .filter(|info| info.lifetime == Lifetime::Transient && info.tracked_for_disposal)
        .map(|info| {
            Finding::new(
                DiagnosticRule::DisposableTransient,
                info.key,
                format!(
                    "{} is transient and tracked for disposal; instances resolved outside a scope are never released",
                    info.key.type_name
                ),
            )
        })
        .collect()
}

pub(crate) fn too_many_dependencies(
    infos: &[RegistrationInfo],
    threshold: usize,
) -> Vec<Finding> {
    infos
        .iter()
        .filter(|info| info.dependencies.len() > threshold)
        .map(|info| {
            Finding::new(
                DiagnosticRule::TooManyDependencies,
                info.key,
                format!(
                    "{} declares {} dependencies (threshold {})",
                    info.key.type_name,
                    info.dependencies.len(),
                    threshold
                ),
            )
        })
        .collect()
}

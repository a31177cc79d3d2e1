//! Aggregate resolution counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters maintained by the container.
#[derive(Default)]
pub(crate) struct ContainerMetrics {
    total_registrations: AtomicU64,
    total_resolutions: AtomicU64,
    failed_resolutions: AtomicU64,
}

impl ContainerMetrics {
    pub(crate) fn record_registration(&self) {
        self.total_registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self, succeeded: bool) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed_resolutions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(
        &self,
        registered_services: usize,
        cached_singletons: usize,
    ) -> ContainerStats {
        ContainerStats {
            registered_services,
            cached_singletons,
            total_registrations: self.total_registrations.load(Ordering::Relaxed),
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            failed_resolutions: self.failed_resolutions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time container statistics, returned by
/// [`Container::stats`](crate::Container::stats).
#[derive(Debug, Clone)]
pub struct ContainerStats {
    pub registered_services: usize,
    pub cached_singletons: usize,
    pub total_registrations: u64,
    pub total_resolutions: u64,
    pub failed_resolutions: u64,
}

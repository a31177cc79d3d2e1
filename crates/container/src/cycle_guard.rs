//! Thread-local re-entrancy guard for registration builds.
//!
//! Dependency graphs are materialized by recursive descent through
//! registration factories. If a registration is re-entered on the calling
//! thread before its build completes, naive recursion would overflow the
//! stack; the guard turns the re-entry into a localized
//! [`CyclicDependency`](ContainerError::CyclicDependency) error carrying the
//! chain of in-flight types. The marker is per-thread on purpose: unrelated
//! builds on other threads must never trip each other's detector.

use std::cell::RefCell;

use crate::errors::ContainerError;

thread_local! {
    static BUILD_STACK: RefCell<Vec<(u64, &'static str)>> = RefCell::new(Vec::new());
}

/// Marker for one in-flight registration build on the current thread.
///
/// Dropping the guard removes the marker unconditionally, so the reset runs
/// on every exit path of the build, including unwinds.
#[derive(Debug)]
pub(crate) struct CycleGuard {
    id: u64,
}

/// Marks the registration as building on the current thread.
///
/// Fails if this registration is already building here (a cycle), or if the
/// build stack is deeper than `max_depth`.
pub(crate) fn enter(
    id: u64,
    type_name: &'static str,
    max_depth: u32,
) -> Result<CycleGuard, ContainerError> {
    BUILD_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.iter().any(|&(entered, _)| entered == id) {
            let chain = stack
                .iter()
                .map(|&(_, name)| name)
                .chain(std::iter::once(type_name))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ContainerError::CyclicDependency { type_name, chain });
        }
        if stack.len() as u32 >= max_depth {
            return Err(ContainerError::MaxDepthExceeded {
                type_name,
                max_depth,
            });
        }
        stack.push((id, type_name));
        Ok(CycleGuard { id })
    })
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        BUILD_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Guards drop in LIFO order, but search from the back anyway so
            // an out-of-order drop cannot evict someone else's marker.
            if let Some(pos) = stack.iter().rposition(|&(id, _)| id == self.id) {
                stack.remove(pos);
            }
        });
    }
}

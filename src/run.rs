use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::dependency::Dependency;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one top-level flow invocation.  Ids only ever increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);
impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scope of one top-level flow invocation.
///
/// A scope is created when a flow is entered from outside any other flow and handed down,
/// explicitly, to every flow context created while it runs.  Cached dependencies memoize their
/// results under the scope's [`RunId`] and register themselves with the scope, which drops those
/// results again when the top-level invocation finishes.  Should the invocation never finish (its
/// future was dropped), the results are dropped along with the last clone of the scope.
#[derive(Clone)]
pub struct RunScope(Arc<RunTracker>);
impl RunScope {
    pub(crate) fn begin() -> Self {
        Self(Arc::new(RunTracker {
            id: RunId(NEXT_RUN_ID.fetch_add(1, Relaxed)),
            cached: Mutex::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> RunId {
        self.0.id
    }

    /// Remembers a cached dependency that memoized something during this run.
    pub(crate) fn track(&self, dependency: &Dependency) {
        let mut cached = self.0.cached.lock();
        if !cached.iter().any(|tracked| tracked == dependency) {
            cached.push(dependency.clone());
        }
    }

    pub(crate) fn finish(&self) {
        self.0.invalidate();
    }
}
impl fmt::Debug for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RunScope").field(&self.0.id).finish()
    }
}

struct RunTracker {
    id: RunId,
    cached: Mutex<Vec<Dependency>>,
}
impl RunTracker {
    fn invalidate(&self) {
        let cached = std::mem::take(&mut *self.cached.lock());
        if cached.is_empty() {
            return;
        }
        let mut forgotten = 0;
        for dependency in cached.iter() {
            forgotten += dependency.invalidate(self.id);
        }
        trace!(
            run = %self.id,
            dependencies = cached.len(),
            results = forgotten,
            "invalidated cached results"
        );
    }
}
impl Drop for RunTracker {
    fn drop(&mut self) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let first = RunScope::begin();
        let second = RunScope::begin();
        assert!(second.id() > first.id());
        assert_eq!(first.clone().id(), first.id());
    }
}

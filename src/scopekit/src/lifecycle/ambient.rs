//! The "current fixture key" and "current test key" slots.
//!
//! Slots live in an [`AmbientContext`]. Inside [`LifecycleTracker::scope`]
//! the context is a task-local value which follows the future across
//! `.await` points, whichever worker thread polls it. Everywhere else each
//! thread has its own context.
//!
//! [`LifecycleTracker::scope`]: crate::lifecycle::LifecycleTracker::scope

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::key::ScopeKey;

tokio::task_local! {
    static CONTEXT: Arc<AmbientContext>;
}

thread_local! {
    static FALLBACK: Arc<AmbientContext> = Arc::new(AmbientContext::default());
}

#[derive(Debug, Default)]
pub(crate) struct AmbientContext {
    fixture: RwLock<Option<ScopeKey>>,
    test: RwLock<Option<ScopeKey>>,
}

impl AmbientContext {
    fn current() -> Arc<Self> {
        CONTEXT
            .try_with(Arc::clone)
            .unwrap_or_else(|_| FALLBACK.with(Arc::clone))
    }

    /// A new context starting from the values visible to the caller.
    fn fork() -> Arc<Self> {
        let current = Self::current();
        let fixture = current.fixture.read().clone();
        let test = current.test.read().clone();
        Arc::new(Self {
            fixture: RwLock::new(fixture),
            test: RwLock::new(test),
        })
    }
}

pub(crate) fn fixture_key() -> Option<ScopeKey> {
    AmbientContext::current().fixture.read().clone()
}

pub(crate) fn test_key() -> Option<ScopeKey> {
    AmbientContext::current().test.read().clone()
}

pub(crate) fn set_fixture_key(key: Option<ScopeKey>) {
    *AmbientContext::current().fixture.write() = key;
}

pub(crate) fn set_test_key(key: Option<ScopeKey>) {
    *AmbientContext::current().test.write() = key;
}

pub(crate) fn take_fixture_key() -> Option<ScopeKey> {
    AmbientContext::current().fixture.write().take()
}

pub(crate) fn take_test_key() -> Option<ScopeKey> {
    AmbientContext::current().test.write().take()
}

pub(crate) async fn scope<F>(future: F) -> F::Output
where
    F: Future,
{
    CONTEXT.scope(AmbientContext::fork(), future).await
}

pub(crate) fn sync_scope<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    CONTEXT.sync_scope(AmbientContext::fork(), f)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn key(key: &str) -> Option<ScopeKey> {
        Some(ScopeKey::new(key).unwrap())
    }

    #[test]
    fn ambient_slots_are_per_thread_outside_a_scope() {
        set_fixture_key(key("Fixture:A"));
        thread::spawn(|| assert_eq!(fixture_key(), None))
            .join()
            .expect("the thread should not `panic!()`");

        assert_eq!(take_fixture_key(), key("Fixture:A"));
        assert_eq!(fixture_key(), None);
    }

    #[test]
    fn sync_scope_inherits_and_isolates_values() {
        set_test_key(key("Fixture:A"));
        sync_scope(|| {
            assert_eq!(test_key(), key("Fixture:A"));
            set_test_key(key("Fixture:B"));
            assert_eq!(test_key(), key("Fixture:B"));
        });
        assert_eq!(take_test_key(), key("Fixture:A"));
    }
}

//! Automatic teardown of scopes as the test run moves through its phases.

pub(crate) mod ambient;
mod tracking;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::key::ScopeKey;
use crate::registry::{ScopeError, ScopeRegistry};
use crate::scope::ScopeLevel;

pub use tracking::ScopeTracking;

/// Remembers which scopes need teardown and which fixture and test keys are
/// current in the calling context.
///
/// The current keys are call-context local. Synchronous code sees one pair
/// of slots per thread. Asynchronous test bodies should run inside
/// [`LifecycleTracker::scope`] so the slots follow the body across `.await`
/// points; tasks spawned from inside the body start from an empty context
/// unless they establish their own scope.
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    registry: Arc<ScopeRegistry>,
}

impl LifecycleTracker {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    /// Tracks `key` for teardown by [`LifecycleTracker::cleanup_all`]. A key
    /// which is already tracked keeps its level.
    pub fn track_scope(&self, key: &ScopeKey, level: ScopeLevel) {
        let tracked = self.registry.tracking().track(key, level);
        if tracked != level {
            tracing::debug!(
                key = %key,
                tracked = %tracked,
                requested = %level,
                "scope already tracked",
            );
        }
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.registry.tracking().level(key).is_some()
    }

    /// The tracked keys and the level each is tracked at.
    pub fn tracked(&self) -> Vec<(ScopeKey, ScopeLevel)> {
        self.registry.tracking().snapshot()
    }

    pub fn set_current_fixture_key(&self, key: Option<ScopeKey>) {
        ambient::set_fixture_key(key);
    }

    pub fn set_current_test_key(&self, key: Option<ScopeKey>) {
        ambient::set_test_key(key);
    }

    pub fn current_fixture_key(&self) -> Option<ScopeKey> {
        ambient::fixture_key()
    }

    pub fn current_test_key(&self) -> Option<ScopeKey> {
        ambient::test_key()
    }

    /// Disposes the test child of the current test key and clears the slot.
    /// Does nothing when no test key is current.
    ///
    /// # Errors
    ///
    /// Returns the disposal error of the test child. The slot is cleared
    /// either way.
    pub fn auto_dispose_test_scope(&self) -> Result<(), ScopeError> {
        match ambient::take_test_key() {
            Some(key) => self.registry.dispose_test_scope(&key),
            None => Ok(()),
        }
    }

    /// Disposes everything of the current fixture key, stops tracking it and
    /// clears the slot. Does nothing when no fixture key is current.
    ///
    /// # Errors
    ///
    /// Returns the disposal error of the scope. The scope is untracked and
    /// the slot cleared either way.
    pub fn auto_dispose_fixture_scope(&self) -> Result<(), ScopeError> {
        let Some(key) = ambient::take_fixture_key() else {
            return Ok(());
        };
        let result = self.registry.dispose_all(&key);
        self.registry.tracking().untrack(&key);
        result
    }

    /// Disposes every tracked scope and stops tracking them.
    ///
    /// A scope failing to dispose, even by panicking, is logged and does not
    /// keep the remaining scopes from being disposed. Returns the number of
    /// scopes which failed.
    pub fn cleanup_all(&self) -> usize {
        let tracked = self.registry.tracking().drain();
        let total = tracked.len();
        let failed = tracked
            .into_iter()
            .filter(|(key, level)| {
                match panic::catch_unwind(AssertUnwindSafe(|| self.registry.dispose_all(key))) {
                    Ok(Ok(())) => false,
                    Ok(Err(err)) => {
                        tracing::warn!(
                            key = %key,
                            scope_level = %level,
                            error = %err,
                            "failed to clean up scope",
                        );
                        true
                    }
                    Err(_) => {
                        tracing::warn!(key = %key, scope_level = %level, "scope cleanup panicked");
                        true
                    }
                }
            })
            .count();

        tracing::debug!(total, failed, "cleaned up tracked scopes");
        failed
    }

    /// Runs `future` in a new ambient context which starts from the current
    /// fixture and test keys. Keys set inside stay inside.
    pub async fn scope<F>(&self, future: F) -> F::Output
    where
        F: Future,
    {
        ambient::scope(future).await
    }

    /// The synchronous counterpart of [`LifecycleTracker::scope`].
    pub fn sync_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        ambient::sync_scope(f)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::container::Dispose;
    use crate::registration::bind;

    use super::*;

    struct Exploding;

    impl Dispose for Exploding {
        fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            panic!("the disposer exploded")
        }
    }

    struct Refusing;

    impl Dispose for Refusing {
        fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("still referenced".into())
        }
    }

    fn tracker() -> LifecycleTracker {
        LifecycleTracker::new(Arc::new(ScopeRegistry::new()))
    }

    fn key(key: &str) -> ScopeKey {
        ScopeKey::new(key).unwrap()
    }

    #[test]
    fn lifecycle_tracker_track_scope_keeps_first_level() {
        let tracker = tracker();
        tracker.track_scope(&key("Fixture:A"), ScopeLevel::Fixture);
        tracker.track_scope(&key("Fixture:A"), ScopeLevel::Test);

        assert_eq!(tracker.tracked(), [(key("Fixture:A"), ScopeLevel::Fixture)]);
        assert!(tracker.is_tracked("Fixture:A"));
    }

    #[test]
    fn lifecycle_tracker_auto_dispose_does_nothing_without_current_key() {
        let tracker = tracker();
        tracker.auto_dispose_test_scope().unwrap();
        tracker.auto_dispose_fixture_scope().unwrap();
        assert_eq!(tracker.cleanup_all(), 0);
    }

    #[test]
    fn lifecycle_tracker_auto_dispose_follows_current_keys() {
        let tracker = tracker();
        let registry = Arc::clone(tracker.registry());
        registry.initialize("Fixture:A", ScopeLevel::Fixture, true).unwrap();
        registry.create_test_scope("Fixture:A", true).unwrap();
        assert_eq!(tracker.current_fixture_key(), Some(key("Fixture:A")));
        assert_eq!(tracker.current_test_key(), Some(key("Fixture:A")));

        tracker.auto_dispose_test_scope().unwrap();
        assert_eq!(tracker.current_test_key(), None);
        assert!(!registry.provider("Fixture:A").unwrap().is_child());

        tracker.auto_dispose_fixture_scope().unwrap();
        assert_eq!(tracker.current_fixture_key(), None);
        assert!(registry.provider("Fixture:A").is_none());
        assert!(!tracker.is_tracked("Fixture:A"));
    }

    #[test]
    fn lifecycle_tracker_cleanup_all_continues_after_failures() {
        let tracker = tracker();
        let registry = Arc::clone(tracker.registry());
        registry
            .register(
                "Fixture:A",
                bind::<Arc<Exploding>>().disposable().to_instance(Arc::new(Exploding)),
            )
            .unwrap();
        registry
            .register(
                "Fixture:B",
                bind::<Arc<Refusing>>().disposable().to_instance(Arc::new(Refusing)),
            )
            .unwrap();
        for name in ["Fixture:A", "Fixture:B", "Fixture:C"] {
            registry.initialize(name, ScopeLevel::Fixture, false).unwrap();
            tracker.track_scope(&key(name), ScopeLevel::Fixture);
        }

        assert_eq!(tracker.cleanup_all(), 2);
        assert!(tracker.tracked().is_empty());
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn lifecycle_tracker_sync_scope_isolates_keys() {
        let tracker = tracker();
        tracker.set_current_fixture_key(Some(key("Fixture:A")));
        tracker.sync_scope(|| {
            assert_eq!(tracker.current_fixture_key(), Some(key("Fixture:A")));
            tracker.set_current_fixture_key(Some(key("Fixture:B")));
        });
        assert_eq!(tracker.current_fixture_key(), Some(key("Fixture:A")));
        tracker.set_current_fixture_key(None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lifecycle_tracker_scope_keeps_keys_across_await_points() {
        let tracker = tracker();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    let inner = tracker.clone();
                    tracker
                        .scope(async move {
                            let key = key(&format!("Fixture:{i}"));
                            inner.set_current_test_key(Some(key.clone()));
                            for _ in 0..10 {
                                tokio::task::yield_now().await;
                                assert_eq!(inner.current_test_key(), Some(key.clone()));
                            }
                        })
                        .await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }
}

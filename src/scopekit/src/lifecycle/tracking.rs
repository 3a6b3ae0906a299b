use dashmap::DashMap;

use crate::key::ScopeKey;
use crate::scope::ScopeLevel;

/// The scope keys registered for automatic teardown, with the level each
/// was first tracked at.
#[derive(Debug, Default)]
pub struct ScopeTracking {
    scopes: DashMap<ScopeKey, ScopeLevel>,
}

impl ScopeTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `key` at `level` unless it is already tracked. Returns the level
    /// the key ends up tracked at.
    pub fn track(&self, key: &ScopeKey, level: ScopeLevel) -> ScopeLevel {
        *self.scopes.entry(key.clone()).or_insert(level)
    }

    pub fn untrack(&self, key: &str) -> Option<ScopeLevel> {
        self.scopes.remove(key).map(|(_, level)| level)
    }

    pub fn level(&self, key: &str) -> Option<ScopeLevel> {
        self.scopes.get(key).map(|level| *level)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn snapshot(&self) -> Vec<(ScopeKey, ScopeLevel)> {
        self.scopes
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Untracks every key, returning what was tracked.
    pub fn drain(&self) -> Vec<(ScopeKey, ScopeLevel)> {
        self.snapshot()
            .into_iter()
            .filter_map(|(key, _)| self.scopes.remove(&key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_tracking_track_keeps_first_level() {
        let tracking = ScopeTracking::new();
        let key = ScopeKey::new("Fixture:A").unwrap();

        assert_eq!(tracking.track(&key, ScopeLevel::Fixture), ScopeLevel::Fixture);
        assert_eq!(tracking.track(&key, ScopeLevel::Test), ScopeLevel::Fixture);
        assert_eq!(tracking.level("Fixture:A"), Some(ScopeLevel::Fixture));
        assert_eq!(tracking.snapshot().len(), 1);
    }

    #[test]
    fn scope_tracking_drain_empties_the_set() {
        let tracking = ScopeTracking::new();
        tracking.track(&ScopeKey::global(), ScopeLevel::Global);
        tracking.track(&ScopeKey::new("Fixture:B").unwrap(), ScopeLevel::Fixture);

        let mut drained: Vec<_> = tracking.drain().into_iter().map(|(key, _)| key).collect();
        drained.sort();
        assert_eq!(drained, ["Fixture:B", "Global"].map(|k| ScopeKey::new(k).unwrap()));
        assert!(tracking.is_empty());
        assert_eq!(tracking.untrack("Global"), None);
    }
}

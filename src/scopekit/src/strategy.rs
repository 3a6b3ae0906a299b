//! Deciding which scope key applies to the calling code.

use crate::key::ScopeKey;
use crate::lifecycle::ambient;

/// Supplies the scope key the calling code should resolve from.
///
/// Closures returning `Option<ScopeKey>` are strategies too.
#[cfg_attr(test, mockall::automock)]
pub trait KeyStrategy: Send + Sync {
    fn current_key(&self) -> Option<ScopeKey>;
}

impl<F> KeyStrategy for F
where
    F: Fn() -> Option<ScopeKey> + Send + Sync,
{
    fn current_key(&self) -> Option<ScopeKey> {
        self()
    }
}

/// The current test key, else the current fixture key, else the global key.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientKeyStrategy;

impl KeyStrategy for AmbientKeyStrategy {
    fn current_key(&self) -> Option<ScopeKey> {
        ambient::test_key()
            .or_else(ambient::fixture_key)
            .or_else(|| Some(ScopeKey::global()))
    }
}

/// Always the same key.
#[derive(Debug, Clone)]
pub struct FixedKeyStrategy(ScopeKey);

impl FixedKeyStrategy {
    pub fn new(key: ScopeKey) -> Self {
        Self(key)
    }
}

impl KeyStrategy for FixedKeyStrategy {
    fn current_key(&self) -> Option<ScopeKey> {
        Some(self.0.clone())
    }
}

use std::sync::{Arc, OnceLock};

use snafu::prelude::*;

use crate::container::{ResolutionProvider, SharedManaged};
use crate::key::ScopeKey;
use crate::lifecycle::LifecycleTracker;
use crate::module::Module;
use crate::registration::Registration;
use crate::registry::{NoCurrentKeySnafu, ScopeError, ScopeRegistry};
use crate::scope::ScopeLevel;
use crate::strategy::KeyStrategy;

/// One registry plus the tracker tearing its scopes down.
///
/// A test driver reports lifecycle events through the `*_started` and
/// `*_finished` hooks; test code registers and resolves through the other
/// methods. [`Scopes::global`] is the instance shared by the whole process,
/// while [`Scopes::new`] builds an independent one.
///
/// ```rust
/// # use std::sync::Arc;
/// # use scopekit::registration::bind;
/// # use scopekit::scope::ScopeLevel;
/// # use scopekit::Scopes;
/// let scopes = Scopes::new();
/// scopes
///     .register("Fixture:Orders", bind::<Arc<String>>().to_instance(Arc::new("db".into())))
///     .unwrap();
/// scopes.fixture_started("Fixture:Orders", ScopeLevel::Fixture).unwrap();
/// scopes.test_started("Fixture:Orders").unwrap();
///
/// let db: Arc<String> = scopes.resolve_required("Fixture:Orders").unwrap();
/// assert_eq!(db.as_str(), "db");
///
/// scopes.test_finished().unwrap();
/// scopes.fixture_finished().unwrap();
/// assert_eq!(scopes.run_finished(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Scopes {
    registry: Arc<ScopeRegistry>,
    tracker: LifecycleTracker,
}

impl Scopes {
    pub fn new() -> Self {
        let registry = Arc::new(ScopeRegistry::new());
        let tracker = LifecycleTracker::new(Arc::clone(&registry));
        Self { registry, tracker }
    }

    /// The process wide instance.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Scopes> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank.
    pub fn register(&self, key: &str, registration: Registration) -> Result<(), ScopeError> {
        self.registry.register(key, registration)
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank.
    pub fn register_test(&self, key: &str, registration: Registration) -> Result<(), ScopeError> {
        self.registry.register_test(key, registration)
    }

    /// # Errors
    ///
    /// See [`ScopeRegistry::install`].
    pub fn install<M: Module>(&self, key: &str, module: M) -> Result<(), ScopeError> {
        self.registry.install(key, module)
    }

    /// # Errors
    ///
    /// See [`ScopeRegistry::initialize`].
    pub fn initialize(
        &self,
        key: &str,
        level: ScopeLevel,
        auto_dispose: bool,
    ) -> Result<(), ScopeError> {
        self.registry.initialize(key, level, auto_dispose)
    }

    pub fn provider(&self, key: &str) -> Option<ResolutionProvider> {
        self.registry.provider(key)
    }

    /// # Errors
    ///
    /// See [`ScopeRegistry::resolve`].
    pub fn resolve<T: SharedManaged>(&self, key: &str) -> Result<Option<T>, ScopeError> {
        self.registry.resolve(key)
    }

    /// # Errors
    ///
    /// See [`ScopeRegistry::resolve_required`].
    pub fn resolve_required<T: SharedManaged>(&self, key: &str) -> Result<T, ScopeError> {
        self.registry.resolve_required(key)
    }

    /// Resolves a `T` from the scope `strategy` picks.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::NoCurrentKey`] if the strategy has no key, else
    /// whatever [`ScopeRegistry::resolve`] returns.
    pub fn resolve_current<T, K>(&self, strategy: &K) -> Result<Option<T>, ScopeError>
    where
        T: SharedManaged,
        K: KeyStrategy + ?Sized,
    {
        let key = strategy.current_key().context(NoCurrentKeySnafu)?;
        self.registry.resolve(&key)
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::NoCurrentKey`] if the strategy has no key, else
    /// whatever [`ScopeRegistry::resolve_required`] returns.
    pub fn resolve_current_required<T, K>(&self, strategy: &K) -> Result<T, ScopeError>
    where
        T: SharedManaged,
        K: KeyStrategy + ?Sized,
    {
        let key = strategy.current_key().context(NoCurrentKeySnafu)?;
        self.registry.resolve_required(&key)
    }

    /// A fixture or the global scope is beginning.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank.
    pub fn fixture_started(&self, key: &str, level: ScopeLevel) -> Result<(), ScopeError> {
        self.registry.initialize(key, level, true)
    }

    /// A test is beginning inside the fixture `key`.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::create_test_scope`].
    pub fn test_started(&self, key: &str) -> Result<(), ScopeError> {
        self.registry.create_test_scope(key, true)
    }

    /// # Errors
    ///
    /// See [`LifecycleTracker::auto_dispose_test_scope`].
    pub fn test_finished(&self) -> Result<(), ScopeError> {
        self.tracker.auto_dispose_test_scope()
    }

    /// # Errors
    ///
    /// See [`LifecycleTracker::auto_dispose_fixture_scope`].
    pub fn fixture_finished(&self) -> Result<(), ScopeError> {
        self.tracker.auto_dispose_fixture_scope()
    }

    /// The whole run ended. Returns the number of scopes which failed to
    /// dispose.
    pub fn run_finished(&self) -> usize {
        self.tracker.cleanup_all()
    }

    pub fn current_key(&self) -> ScopeKey {
        self.tracker
            .current_test_key()
            .or_else(|| self.tracker.current_fixture_key())
            .unwrap_or_else(ScopeKey::global)
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

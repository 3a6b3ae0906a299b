//! Scope keys mapped to their registrations and built providers.

use std::mem;

use dashmap::DashMap;
use snafu::prelude::*;

use crate::container::{DisposeError, ResolutionProvider, ResolveError, SharedManaged};
use crate::key::{BlankKeyError, ScopeKey};
use crate::lifecycle::{ambient, ScopeTracking};
use crate::module::Module;
use crate::registration::{Configurer, Registration, RegistrationError, RegistrationStore};
use crate::scope::ScopeLevel;

#[derive(Debug, Default)]
struct ScopeEntry {
    root: Option<ResolutionProvider>,
    test: Option<ResolutionProvider>,
    level: Option<ScopeLevel>,
}

/// Owns every registration and every provider, keyed by scope.
///
/// Each key has two registration stores. The root store feeds the provider
/// built by [`ScopeRegistry::initialize`]; the test store feeds the test
/// child layered on top of it, so a test can override what its fixture
/// registered without touching the fixture's singletons.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    roots: RegistrationStore,
    tests: RegistrationStore,
    scopes: DashMap<ScopeKey, ScopeEntry>,
    tracking: ScopeTracking,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tracking(&self) -> &ScopeTracking {
        &self.tracking
    }

    /// The store feeding the root provider of each key.
    pub fn store(&self) -> &RegistrationStore {
        &self.roots
    }

    /// The store feeding the test child of each key.
    pub fn test_store(&self) -> &RegistrationStore {
        &self.tests
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank.
    pub fn register(&self, key: &str, registration: Registration) -> Result<(), ScopeError> {
        self.roots
            .register(key, registration)
            .context(InvalidKeySnafu)?;
        Ok(())
    }

    /// Registers into the test store of `key`, which is only consulted when
    /// a test child is built.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank.
    pub fn register_test(&self, key: &str, registration: Registration) -> Result<(), ScopeError> {
        self.tests
            .register(key, registration)
            .context(InvalidKeySnafu)?;
        Ok(())
    }

    /// Runs `module` and registers everything it produced into the root
    /// store of `key`. Nothing is registered if the module reported an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank, or
    /// [`ScopeError::Registration`] with every error the module reported.
    pub fn install<M>(&self, key: &str, module: M) -> Result<(), ScopeError>
    where
        M: Module,
    {
        let key = ScopeKey::new(key).context(InvalidKeySnafu)?;
        let mut configurer = Configurer::new();
        module.setup(&mut configurer);
        let registrations = configurer
            .finish()
            .context(RegistrationSnafu { key: key.clone() })?;

        tracing::debug!(
            key = %key,
            module = module.name(),
            registrations = registrations.len(),
            "installed module",
        );
        for registration in registrations {
            self.roots
                .register(&key, registration)
                .context(InvalidKeySnafu)?;
        }
        Ok(())
    }

    /// Builds the root provider of `key` from a snapshot of its root store,
    /// replacing the previous root without disposing it.
    ///
    /// A test child built on the previous root is removed and disposed, and
    /// a [`ScopeLevel::Test`] request installs a fresh one on the new root.
    /// The first level recorded for a key sticks until
    /// [`ScopeRegistry::dispose_all`]. With `auto_dispose`, the key is
    /// tracked for teardown and becomes the current test or fixture key of
    /// the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank, or
    /// [`ScopeError::Dispose`] if disposing the stale test child failed. The
    /// new providers are installed either way.
    pub fn initialize(
        &self,
        key: &str,
        level: ScopeLevel,
        auto_dispose: bool,
    ) -> Result<(), ScopeError> {
        let key = ScopeKey::new(key).context(InvalidKeySnafu)?;
        let root = ResolutionProvider::build(self.roots.snapshot(&key));
        let test = level
            .is_test()
            .then(|| root.create_child(self.tests.snapshot(&key)));

        let (recorded, stale) = {
            let mut entry = self.scopes.entry(key.clone()).or_default();
            let recorded = *entry.level.get_or_insert(level);
            entry.root = Some(root);
            let stale = mem::replace(&mut entry.test, test);
            (recorded, stale)
        };

        if recorded != level {
            tracing::warn!(
                key = %key,
                recorded = %recorded,
                requested = %level,
                "scope level already recorded, keeping the first one",
            );
        }
        tracing::debug!(key = %key, scope_level = %level, auto_dispose, "initialized scope");

        if auto_dispose {
            self.tracking.track(&key, level);
            if level.is_test() {
                ambient::set_test_key(Some(key.clone()));
            } else {
                ambient::set_fixture_key(Some(key.clone()));
            }
        }

        match stale {
            Some(stale) => stale.dispose().context(DisposeSnafu { key }),
            None => Ok(()),
        }
    }

    /// Returns the test child of `key` if one is installed, else its root.
    pub fn provider(&self, key: &str) -> Option<ResolutionProvider> {
        self.scopes
            .get(key)
            .and_then(|entry| entry.test.clone().or_else(|| entry.root.clone()))
    }

    pub fn root_provider(&self, key: &str) -> Option<ResolutionProvider> {
        self.scopes.get(key).and_then(|entry| entry.root.clone())
    }

    /// Replaces the test child of `key` with a fresh one built from a
    /// snapshot of its test store, then disposes the previous child.
    ///
    /// The swap happens under the entry lock, so concurrent callers each
    /// dispose exactly the child they replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::RootNotInitialized`] if `key` has no root
    /// provider, or [`ScopeError::Dispose`] if disposing the previous child
    /// failed. The new child is installed either way.
    pub fn create_test_scope(&self, key: &str, auto_dispose: bool) -> Result<(), ScopeError> {
        let key = ScopeKey::new(key).context(InvalidKeySnafu)?;
        let previous = {
            let Some(mut entry) = self.scopes.get_mut(&key) else {
                return RootNotInitializedSnafu { key }.fail();
            };
            let Some(root) = entry.root.clone() else {
                return RootNotInitializedSnafu { key }.fail();
            };
            entry.test.replace(root.create_child(self.tests.snapshot(&key)))
        };
        tracing::debug!(key = %key, auto_dispose, "created test scope");

        if auto_dispose {
            self.tracking.track(&key, ScopeLevel::Test);
            ambient::set_test_key(Some(key.clone()));
        }

        match previous {
            Some(previous) => previous.dispose().context(DisposeSnafu { key }),
            None => Ok(()),
        }
    }

    /// Disposes and removes the test child of `key`. Does nothing for a
    /// blank key or a key without a child.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Dispose`] if a disposer failed. The child is
    /// removed either way.
    pub fn dispose_test_scope(&self, key: &str) -> Result<(), ScopeError> {
        let Ok(key) = ScopeKey::new(key) else {
            return Ok(());
        };
        let child = self
            .scopes
            .get_mut(&key)
            .and_then(|mut entry| entry.test.take());

        match child {
            Some(child) => {
                tracing::debug!(key = %key, "disposing test scope");
                child.dispose().context(DisposeSnafu { key })
            }
            None => Ok(()),
        }
    }

    /// Disposes the test child and the root of `key`, then forgets its
    /// registrations and recorded level. Does nothing for a blank key.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Dispose`] with the failures of both providers.
    /// Everything is removed before the error is returned.
    pub fn dispose_all(&self, key: &str) -> Result<(), ScopeError> {
        let Ok(key) = ScopeKey::new(key) else {
            return Ok(());
        };
        let entry = self.scopes.remove(&key).map(|(_, entry)| entry);
        self.roots.remove(&key);
        self.tests.remove(&key);

        let Some(entry) = entry else {
            return Ok(());
        };
        tracing::debug!(key = %key, "disposing scope");
        let results = [entry.test, entry.root]
            .into_iter()
            .flatten()
            .map(|provider| provider.dispose());
        DisposeError::merge(results).context(DisposeSnafu { key })
    }

    pub fn level(&self, key: &str) -> Option<ScopeLevel> {
        self.scopes.get(key).and_then(|entry| entry.level)
    }

    /// The keys which currently have providers.
    pub fn keys(&self) -> Vec<ScopeKey> {
        self.scopes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Resolves a `T` from the provider of `key`, reporting an unknown key
    /// or an unregistered service as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidKey`] if `key` is blank, or
    /// [`ScopeError::Resolve`] if the object could not be produced.
    pub fn resolve<T>(&self, key: &str) -> Result<Option<T>, ScopeError>
    where
        T: SharedManaged,
    {
        let key = ScopeKey::new(key).context(InvalidKeySnafu)?;
        match self.provider(&key) {
            Some(provider) => provider.resolve().context(ResolveSnafu { key }),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::NotInitialized`] if `key` has no provider, and
    /// [`ScopeError::Resolve`] if resolving fails, including when nothing is
    /// registered for `T`.
    pub fn resolve_required<T>(&self, key: &str) -> Result<T, ScopeError>
    where
        T: SharedManaged,
    {
        let key = ScopeKey::new(key).context(InvalidKeySnafu)?;
        let provider = self
            .provider(&key)
            .context(NotInitializedSnafu { key: key.clone() })?;
        provider.resolve_required().context(ResolveSnafu { key })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ScopeError {
    #[snafu(display("invalid scope key"))]
    #[non_exhaustive]
    InvalidKey { source: BlankKeyError },
    #[snafu(display("scope {key} has no provider, initialize it first"))]
    #[non_exhaustive]
    NotInitialized { key: ScopeKey },
    #[snafu(display("cannot create a test scope for {key} before its root provider is initialized"))]
    #[non_exhaustive]
    RootNotInitialized { key: ScopeKey },
    #[snafu(display("no scope key is current in this context"))]
    #[non_exhaustive]
    NoCurrentKey,
    #[snafu(display("could not resolve from scope {key}"))]
    #[non_exhaustive]
    Resolve { key: ScopeKey, source: ResolveError },
    #[snafu(display("could not configure scope {key}"))]
    #[non_exhaustive]
    Registration {
        key: ScopeKey,
        source: RegistrationError,
    },
    #[snafu(display("could not dispose scope {key}"))]
    #[non_exhaustive]
    Dispose { key: ScopeKey, source: DisposeError },
}

impl ScopeError {
    /// The key the failed operation was about, if it was a valid one.
    pub fn key(&self) -> Option<&ScopeKey> {
        match self {
            Self::InvalidKey { .. } | Self::NoCurrentKey => None,
            Self::NotInitialized { key }
            | Self::RootNotInitialized { key }
            | Self::Resolve { key, .. }
            | Self::Registration { key, .. }
            | Self::Dispose { key, .. } => Some(key),
        }
    }
}

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::core::ProviderCore;
use crate::container::{DisposeError, ResolveError, Resolver, SharedManaged, TypedResolver};
use crate::key::ServiceType;
use crate::registration::Registration;

/// A built container which resolves services from a snapshot of
/// registrations.
///
/// Handles are cheap to clone and all clones share one singleton cache. A
/// child provider created with [`ResolutionProvider::create_child`] resolves
/// its own registrations first and delegates everything else to its parent.
#[derive(Clone)]
pub struct ResolutionProvider {
    core: Arc<ProviderCore>,
}

impl ResolutionProvider {
    /// Builds a root provider. Later registrations for a service type
    /// replace earlier ones.
    pub fn build(registrations: impl IntoIterator<Item = Registration>) -> Self {
        let core = ProviderCore::new_root(registrations);
        tracing::debug!(services = core.services().count(), "built provider");
        Self {
            core: Arc::new(core),
        }
    }

    /// Builds a provider with its own registrations and singleton cache on
    /// top of `self`. Disposing the child never disposes `self`.
    ///
    /// Once `self` is disposed, the child keeps serving its own
    /// registrations, but every lookup it delegates to `self` fails with
    /// [`ResolveError::Disposed`].
    pub fn create_child(&self, registrations: impl IntoIterator<Item = Registration>) -> Self {
        let core = ProviderCore::new_child(Arc::clone(&self.core), registrations);
        tracing::debug!(services = core.services().count(), "built child provider");
        Self {
            core: Arc::new(core),
        }
    }

    /// Resolves a `T`, looking at this provider first and then at each
    /// parent in turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the object could not be constructed or the
    /// provider holding its registration was disposed.
    pub fn resolve<T>(&self) -> Result<Option<T>, ResolveError>
    where
        T: SharedManaged,
    {
        TypedResolver::resolve(self.core.as_ref())
    }

    /// # Errors
    ///
    /// Same as [`ResolutionProvider::resolve`], plus
    /// [`ResolveError::NotRegistered`] when nothing resolves to `T`.
    pub fn resolve_required<T>(&self) -> Result<T, ResolveError>
    where
        T: SharedManaged,
    {
        TypedResolver::resolve_required(self.core.as_ref())
    }

    /// Disposes every cached object of this provider which opted into
    /// disposal, newest first. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns every disposer failure together; a failing disposer does not
    /// stop the others.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        self.core.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn is_child(&self) -> bool {
        self.core.parent().is_some()
    }

    /// Returns true if both handles point at the same provider.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Resolver for ResolutionProvider {
    fn dyn_resolve(
        &self,
        service: ServiceType,
    ) -> Result<Option<Box<dyn SharedManaged>>, ResolveError> {
        self.core.dyn_resolve(service)
    }
}

impl Debug for ResolutionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ResolutionProvider")
            .field("child", &self.is_child())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::container::Dispose;
    use crate::registration::bind;
    use crate::scope::Lifetime;

    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            String::from("hello")
        }
    }

    struct French;

    impl Greeter for French {
        fn greet(&self) -> String {
            String::from("bonjour")
        }
    }

    struct Connection {
        closed: AtomicUsize,
    }

    impl Dispose for Connection {
        fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn greeter(lifetime: Lifetime, make: fn() -> Arc<dyn Greeter>) -> Registration {
        bind::<Arc<dyn Greeter>>()
            .to_factory(lifetime, move || Ok::<_, Infallible>(make()))
            .unwrap()
    }

    #[test]
    fn resolution_provider_resolve_returns_same_singleton() {
        let provider = ResolutionProvider::build([greeter(Lifetime::Singleton, || Arc::new(English))]);

        let first: Arc<dyn Greeter> = provider.resolve_required().unwrap();
        let second: Arc<dyn Greeter> = provider.resolve_required().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolution_provider_resolve_returns_fresh_transients() {
        let provider = ResolutionProvider::build([greeter(Lifetime::Transient, || Arc::new(English))]);

        let first: Arc<dyn Greeter> = provider.resolve_required().unwrap();
        let second: Arc<dyn Greeter> = provider.resolve_required().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolution_provider_resolve_uses_last_registration() {
        let provider = ResolutionProvider::build([
            greeter(Lifetime::Singleton, || Arc::new(English)),
            greeter(Lifetime::Singleton, || Arc::new(French)),
        ]);

        let greeter: Arc<dyn Greeter> = provider.resolve_required().unwrap();
        assert_eq!(greeter.greet(), "bonjour");
    }

    #[test]
    fn resolution_provider_child_shares_parent_singletons() {
        let root = ResolutionProvider::build([greeter(Lifetime::Singleton, || Arc::new(English))]);
        let child = root.create_child([]);
        assert!(child.is_child());
        assert!(!root.is_child());

        let from_child: Arc<dyn Greeter> = child.resolve_required().unwrap();
        let from_root: Arc<dyn Greeter> = root.resolve_required().unwrap();
        assert!(Arc::ptr_eq(&from_child, &from_root));
    }

    #[test]
    fn resolution_provider_child_registrations_are_isolated() {
        let root = ResolutionProvider::build([greeter(Lifetime::Singleton, || Arc::new(English))]);
        let child = root.create_child([greeter(Lifetime::Singleton, || Arc::new(French))]);

        let from_child: Arc<dyn Greeter> = child.resolve_required().unwrap();
        let from_root: Arc<dyn Greeter> = root.resolve_required().unwrap();
        assert!(!Arc::ptr_eq(&from_child, &from_root));
        assert_eq!(from_child.greet(), "bonjour");
        assert_eq!(from_root.greet(), "hello");
    }

    #[test]
    fn resolution_provider_dispose_is_idempotent() {
        let connection = Arc::new(Connection {
            closed: AtomicUsize::new(0),
        });
        let provider = ResolutionProvider::build([bind::<Arc<Connection>>()
            .disposable()
            .to_instance(Arc::clone(&connection))]);

        provider.dispose().unwrap();
        provider.clone().dispose().unwrap();
        assert_eq!(connection.closed.load(Ordering::SeqCst), 1);
        assert!(provider.is_disposed());
        assert!(matches!(
            provider.resolve::<Arc<Connection>>(),
            Err(ResolveError::Disposed { .. })
        ));
    }

    #[test]
    fn resolution_provider_child_dispose_leaves_parent_alive() {
        let root = ResolutionProvider::build([greeter(Lifetime::Singleton, || Arc::new(English))]);
        let child = root.create_child([]);
        let before: Arc<dyn Greeter> = child.resolve_required().unwrap();

        child.dispose().unwrap();
        let after: Arc<dyn Greeter> = root.resolve_required().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!root.is_disposed());
        assert!(root.ptr_eq(&root.clone()));
        assert!(!root.ptr_eq(&child));
    }

    #[test]
    fn resolution_provider_child_of_disposed_parent_keeps_own_registrations() {
        let root = ResolutionProvider::build([greeter(Lifetime::Singleton, || Arc::new(English))]);
        let child = root.create_child([bind::<Arc<u8>>().to_instance(Arc::new(1))]);
        root.dispose().unwrap();

        assert_eq!(*child.resolve_required::<Arc<u8>>().unwrap(), 1);
        assert!(matches!(
            child.resolve::<Arc<dyn Greeter>>(),
            Err(ResolveError::Disposed { .. })
        ));
    }

    #[test]
    fn resolution_provider_resolve_required_fails_when_not_registered() {
        let provider = ResolutionProvider::build([]);
        assert!(provider.resolve::<Arc<dyn Greeter>>().unwrap().is_none());
        assert!(matches!(
            provider.resolve_required::<Arc<dyn Greeter>>(),
            Err(ResolveError::NotRegistered { .. })
        ));
    }

    #[test]
    fn resolution_provider_resolve_reports_construction_failure() {
        let provider = ResolutionProvider::build([bind::<Arc<dyn Greeter>>()
            .to_factory(Lifetime::Singleton, || {
                Err::<Arc<dyn Greeter>, _>("no locale configured")
            })
            .unwrap()]);

        let Err(err) = provider.resolve::<Arc<dyn Greeter>>() else {
            panic!("construction should fail");
        };
        assert!(matches!(err, ResolveError::ObjectConstruction { .. }));
        assert_eq!(err.service(), ServiceType::of::<Arc<dyn Greeter>>());
    }
}

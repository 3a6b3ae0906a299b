//! Registrations: the rules describing how to build a service, and the
//! per-scope store that collects them until a provider is built.

mod configurer;
mod store;

use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::{Dispose, SharedManaged};
use crate::key::ServiceType;
use crate::provider::component::{Component, ComponentProvider};
use crate::provider::factory::{Factory, FactoryProvider, RawFactory, RawFactoryProvider};
use crate::provider::instance::InstanceProvider;
use crate::provider::Provider;
use crate::scope::Lifetime;
use crate::util::any::DowncastRef;
use crate::util::display::AggregatedDisplayer;

pub use configurer::Configurer;
pub use store::RegistrationStore;

pub(crate) type Disposer = fn(&dyn SharedManaged) -> Result<(), Box<dyn Error + Send + Sync>>;

/// What a registration produces within one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    /// An already-constructed object, shared like a singleton.
    Instance,
    /// One lazily constructed object per provider.
    Singleton,
    /// A fresh object on every resolve.
    Transient,
}

/// One rule for building a service, as collected by a [`RegistrationStore`].
///
/// Registrations are cheap to clone; building a provider clones the rules it
/// snapshots, not the objects they construct.
#[derive(Clone)]
pub struct Registration {
    service: ServiceType,
    kind: RegistrationKind,
    provider: Arc<dyn Provider>,
    disposer: Option<Disposer>,
}

impl Registration {
    pub fn service(&self) -> ServiceType {
        self.service
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }

    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub(crate) fn disposer(&self) -> Option<Disposer> {
        self.disposer
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Registration")
            .field("service", &self.service)
            .field("kind", &self.kind)
            .field("provider", &self.provider)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

/// Starts a registration for the service type `S`.
///
/// ```rust
/// # use std::sync::Arc;
/// # use scopekit::registration::bind;
/// # use scopekit::scope::Lifetime;
/// let registration = bind::<Arc<String>>()
///     .to_factory(Lifetime::Singleton, || Ok::<_, std::convert::Infallible>(Arc::new(String::new())))
///     .unwrap();
/// assert_eq!(registration.service().name(), std::any::type_name::<Arc<String>>());
/// ```
pub fn bind<S>() -> Binding<S>
where
    S: SharedManaged,
{
    Binding::new()
}

/// The service half of a registration, waiting for the way to build it.
pub struct Binding<S>
where
    S: SharedManaged,
{
    disposer: Option<Disposer>,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Binding<S>
where
    S: SharedManaged,
{
    fn new() -> Self {
        Self {
            disposer: None,
            _marker: PhantomData,
        }
    }

    /// Makes the owning provider call [`Dispose::dispose`] on every object it
    /// cached for this registration when the provider is disposed.
    pub fn disposable(mut self) -> Self
    where
        S: Dispose,
    {
        self.disposer = Some(dispose_as::<S>);
        self
    }

    /// Registers an already-constructed object.
    pub fn to_instance(self, instance: S) -> Registration
    where
        S: Clone,
    {
        self.finish(RegistrationKind::Instance, InstanceProvider::new(instance))
    }

    /// Maps the service type to the implementation `C`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnsupportedLifetime`] for
    /// [`Lifetime::Scoped`].
    pub fn to_component<C>(self, lifetime: Lifetime) -> Result<Registration, RegistrationError>
    where
        C: Component<Constructed = S>,
    {
        let kind = supported_kind::<S>(lifetime)?;
        Ok(self.finish(kind, ComponentProvider::<C>::new()))
    }

    /// Registers a [`Factory`] whose arguments are resolved by type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnsupportedLifetime`] for
    /// [`Lifetime::Scoped`].
    pub fn to_factory<F, D>(
        self,
        lifetime: Lifetime,
        factory: F,
    ) -> Result<Registration, RegistrationError>
    where
        F: Factory<D, Constructed = S>,
        D: Send + Sync + 'static,
    {
        let kind = supported_kind::<S>(lifetime)?;
        Ok(self.finish(kind, FactoryProvider::new(factory)))
    }

    /// Registers a [`RawFactory`] which receives the resolver itself.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnsupportedLifetime`] for
    /// [`Lifetime::Scoped`].
    pub fn to_raw_factory<F>(
        self,
        lifetime: Lifetime,
        factory: F,
    ) -> Result<Registration, RegistrationError>
    where
        F: RawFactory<Constructed = S>,
    {
        let kind = supported_kind::<S>(lifetime)?;
        Ok(self.finish(kind, RawFactoryProvider::new(factory)))
    }

    fn finish<P>(self, kind: RegistrationKind, provider: P) -> Registration
    where
        P: Provider,
    {
        Registration {
            service: ServiceType::of::<S>(),
            kind,
            provider: Arc::new(provider),
            disposer: self.disposer,
        }
    }
}

fn supported_kind<S>(lifetime: Lifetime) -> Result<RegistrationKind, RegistrationError>
where
    S: SharedManaged,
{
    match lifetime {
        Lifetime::Singleton => Ok(RegistrationKind::Singleton),
        Lifetime::Transient => Ok(RegistrationKind::Transient),
        Lifetime::Scoped => UnsupportedLifetimeSnafu {
            service: ServiceType::of::<S>(),
            lifetime,
        }
        .fail(),
    }
}

fn dispose_as<S>(object: &dyn SharedManaged) -> Result<(), Box<dyn Error + Send + Sync>>
where
    S: SharedManaged + Dispose,
{
    match object.downcast_ref::<S>() {
        Some(object) => object.dispose(),
        None => Ok(()),
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum RegistrationError {
    #[snafu(display(
        "{service} cannot be registered with the {lifetime} lifetime, only Singleton and Transient are supported"
    ))]
    #[non_exhaustive]
    UnsupportedLifetime {
        service: ServiceType,
        lifetime: Lifetime,
    },
    #[snafu(display("module {module} fails to setup the configuration"))]
    #[non_exhaustive]
    ModuleInner {
        module: &'static str,
        source: Box<dyn Error + Send + Sync>,
    },
    #[snafu(display("aggregated registration errors:\n{}", AggregatedDisplayer::new(errors.as_slice())))]
    Aggregated { errors: Vec<RegistrationError> },
}

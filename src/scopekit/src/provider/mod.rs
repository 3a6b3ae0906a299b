//! Construction primitives.
//!
//! A provider knows how to produce one object of one service type. Providers
//! never cache: deciding whether a produced object is shared is the job of
//! the [`ResolutionProvider`] that owns the registration.
//!
//! [`ResolutionProvider`]: crate::container::ResolutionProvider

pub mod component;
pub mod factory;
pub mod instance;

use std::fmt::Debug;

use crate::container::{ResolveError, Resolver, SharedManaged, TypedResolver};
use crate::key::ServiceType;

/// A type-erased factory which constructs objects of one service type.
///
/// Usually, you don't need to implement [`Provider`] manually, since this is
/// automatically done by [`TypedProvider`]'s blanket implementation.
pub trait Provider: Debug + Send + Sync + 'static {
    /// Provides a newly created type-erased object. Dependencies are fetched
    /// from `resolver`; `service` is the type being requested and is used to
    /// label construction errors.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved or the construction
    /// itself fails.
    fn dyn_provide(
        &self,
        resolver: &dyn Resolver,
        service: ServiceType,
    ) -> Result<Box<dyn SharedManaged>, ResolveError>;
}

/// A static variant of the [`Provider`] trait.
pub trait TypedProvider: Provider {
    type Output: SharedManaged;

    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved or the construction
    /// itself fails.
    fn provide<R>(&self, resolver: &R, service: ServiceType) -> Result<Self::Output, ResolveError>
    where
        R: TypedResolver + ?Sized;
}

impl<T: TypedProvider> Provider for T {
    fn dyn_provide(
        &self,
        resolver: &dyn Resolver,
        service: ServiceType,
    ) -> Result<Box<dyn SharedManaged>, ResolveError> {
        self.provide(resolver, service)
            .map(|obj| -> Box<dyn SharedManaged> { Box::new(obj) })
    }
}

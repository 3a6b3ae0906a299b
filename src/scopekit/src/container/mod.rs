mod core;
mod dispose;
mod handle;
mod provider_map;
mod resolver;

use std::error::Error;
use std::sync::Arc;

use crate::util::any::AsAny;

pub use dispose::{DisposalFailure, DisposeError};
pub use handle::ResolutionProvider;
pub use resolver::{ResolveError, Resolver, TypedResolver};

#[cfg(test)]
pub use resolver::MockResolver;

pub(crate) use provider_map::ProviderMap;

/// Anything a provider can hand out.
pub trait Managed: AsAny + Send + Sync + 'static {}

impl<T> Managed for T where T: AsAny + Send + Sync + 'static {}

/// A [`Managed`] object whose clones all point at the same instance, which is
/// what lets a provider cache it and hand the cached value out again.
///
/// Implemented for every `Arc<T>`, including `Arc<dyn Trait>`.
pub trait SharedManaged: Managed {
    fn dyn_clone(&self) -> Box<dyn SharedManaged>;
}

impl<T> SharedManaged for Arc<T>
where
    T: Send + Sync + ?Sized + 'static,
{
    fn dyn_clone(&self) -> Box<dyn SharedManaged> {
        Box::new(Arc::clone(self))
    }
}

/// A release/cleanup capability for objects cached by a provider.
///
/// A provider calls [`Dispose::dispose`] exactly once for every cached
/// object whose registration opted into disposal, when the provider itself is
/// disposed.
pub trait Dispose: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the object could not release its resources. The
    /// provider keeps disposing the remaining objects and reports every
    /// failure together.
    fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T> Dispose for Arc<T>
where
    T: Dispose + ?Sized,
{
    fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        (**self).dispose()
    }
}

mod arity;
mod raw_wrapper;
mod wrapper;

use std::error::Error;

use crate::container::{ResolveError, Resolver, SharedManaged};

pub use raw_wrapper::RawFactoryProvider;
pub use wrapper::FactoryProvider;

/// A closure whose arguments are each resolved by type before it is called.
///
/// Closures of `Fn(A1, A2, ...) -> Result<T, E> + Send + Sync + 'static`
/// where every `Ai: SharedManaged` are [`Factory`]s, up to eight arguments.
/// Every argument is resolved as required, so a missing dependency surfaces
/// as [`ResolveError::NotRegistered`].
pub trait Factory<D>
where
    Self: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    /// The successfully constructed object.
    type Constructed: SharedManaged;

    /// The error occurred in object construction after all dependencies are
    /// retrieved.
    type Error: Into<Box<dyn Error + Send + Sync>>;

    /// Resolves the dependencies and calls `self` with them.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved. A construction
    /// failure is returned as the inner [`Err`] wrapped in the outer [`Ok`].
    fn run(
        &self,
        resolver: &dyn Resolver,
    ) -> Result<Result<Self::Constructed, Self::Error>, ResolveError>;
}

/// A closure which receives the [`Resolver`] directly and resolves whatever
/// it needs by itself.
pub trait RawFactory
where
    Self: Fn(&dyn Resolver) -> Result<Result<Self::Constructed, Self::Error>, ResolveError>,
    Self: Send + Sync + 'static,
{
    type Constructed: SharedManaged;

    type Error: Into<Box<dyn Error + Send + Sync>>;
}

impl<F, T, E> RawFactory for F
where
    T: SharedManaged,
    E: Into<Box<dyn Error + Send + Sync>>,
    Self: Fn(&dyn Resolver) -> Result<Result<T, E>, ResolveError>,
    Self: Send + Sync + 'static,
{
    type Constructed = T;

    type Error = E;
}

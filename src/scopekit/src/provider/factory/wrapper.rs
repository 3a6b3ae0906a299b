use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::{ResolveError, SharedManaged, TypedResolver};
use crate::key::ServiceType;
use crate::provider::factory::Factory;
use crate::provider::TypedProvider;

/// A [`Provider`] which supplies objects from a [`Factory`].
///
/// # Examples
///
/// ```rust
/// # use std::convert::Infallible;
/// # use std::sync::Arc;
/// # use scopekit::provider::factory::FactoryProvider;
/// let factory = |port: Arc<u16>| Ok::<_, Infallible>(Arc::new(format!("localhost:{port}")));
/// let provider = FactoryProvider::new(factory);
/// ```
///
/// [`Provider`]: crate::provider::Provider
pub struct FactoryProvider<T, F, D>
where
    T: SharedManaged,
    F: Factory<D, Constructed = T>,
    D: Send + Sync + 'static,
{
    factory: F,
    _marker: PhantomData<fn() -> (T, D)>,
}

impl<T, F, D> FactoryProvider<T, F, D>
where
    T: SharedManaged,
    F: Factory<D, Constructed = T>,
    D: Send + Sync + 'static,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _marker: PhantomData,
        }
    }
}

impl<T, F, D> Debug for FactoryProvider<T, F, D>
where
    T: SharedManaged,
    F: Factory<D, Constructed = T>,
    D: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FactoryProvider<T, F, D>")
            .finish_non_exhaustive()
    }
}

impl<T, F, D> TypedProvider for FactoryProvider<T, F, D>
where
    T: SharedManaged,
    F: Factory<D, Constructed = T>,
    D: Send + Sync + 'static,
{
    type Output = T;

    fn provide<R>(&self, resolver: &R, service: ServiceType) -> Result<Self::Output, ResolveError>
    where
        R: TypedResolver + ?Sized,
    {
        match self.factory.run(resolver.upcast_dyn()) {
            Ok(Ok(obj)) => Ok(obj),
            Ok(Err(err)) => Err(ResolveError::ObjectConstruction {
                service,
                source: Arc::from(err.into()),
            }),
            Err(err) => Err(err),
        }
    }
}

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::{ResolveError, SharedManaged, TypedResolver};
use crate::key::ServiceType;
use crate::provider::factory::RawFactory;
use crate::provider::TypedProvider;

/// A [`Provider`] which hands the resolver straight to a [`RawFactory`].
///
/// [`Provider`]: crate::provider::Provider
pub struct RawFactoryProvider<T, F>
where
    T: SharedManaged,
    F: RawFactory<Constructed = T>,
{
    factory: F,
}

impl<T, F> RawFactoryProvider<T, F>
where
    T: SharedManaged,
    F: RawFactory<Constructed = T>,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<T, F> Debug for RawFactoryProvider<T, F>
where
    T: SharedManaged,
    F: RawFactory<Constructed = T>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RawFactoryProvider<T, F>")
            .finish_non_exhaustive()
    }
}

impl<T, F> TypedProvider for RawFactoryProvider<T, F>
where
    T: SharedManaged,
    F: RawFactory<Constructed = T>,
{
    type Output = T;

    fn provide<R>(&self, resolver: &R, service: ServiceType) -> Result<Self::Output, ResolveError>
    where
        R: TypedResolver + ?Sized,
    {
        match (self.factory)(resolver.upcast_dyn()) {
            Ok(Ok(obj)) => Ok(obj),
            Ok(Err(err)) => Err(ResolveError::ObjectConstruction {
                service,
                source: Arc::from(err.into()),
            }),
            Err(err) => Err(err),
        }
    }
}

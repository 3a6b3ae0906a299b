use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::{ResolveError, TypedResolver};
use crate::key::ServiceType;
use crate::provider::component::Component;
use crate::provider::TypedProvider;

pub struct ComponentProvider<C>
where
    C: Component,
{
    _marker: PhantomData<fn() -> C>,
}

impl<C> ComponentProvider<C>
where
    C: Component,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C> Debug for ComponentProvider<C>
where
    C: Component,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ComponentProvider<C>")
            .finish_non_exhaustive()
    }
}

impl<C> TypedProvider for ComponentProvider<C>
where
    C: Component,
{
    type Output = C::Constructed;

    fn provide<R>(&self, resolver: &R, service: ServiceType) -> Result<Self::Output, ResolveError>
    where
        R: TypedResolver + ?Sized,
    {
        match C::construct(resolver) {
            Ok(Ok(obj)) => Ok(obj.post_process()),
            Ok(Err(err)) => Err(ResolveError::ObjectConstruction {
                service,
                source: Arc::from(err.into()),
            }),
            Err(err) => Err(err),
        }
    }
}

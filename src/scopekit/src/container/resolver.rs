use std::error::Error;
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::SharedManaged;
use crate::key::ServiceType;
use crate::util::any::Downcast;

/// The object-safe lookup seam every provider implements and every
/// construction closure receives.
#[cfg_attr(test, mockall::automock)]
pub trait Resolver: Send + Sync {
    /// Looks `service` up innermost-first, returning `Ok(None)` when nothing
    /// is registered for it.
    ///
    /// # Errors
    ///
    /// Returns an error if a registration was found but the object could not
    /// be produced.
    fn dyn_resolve(
        &self,
        service: ServiceType,
    ) -> Result<Option<Box<dyn SharedManaged>>, ResolveError>;
}

pub trait TypedResolver: Resolver {
    /// Resolves a `T`, reporting absence as `Ok(None)`.
    fn resolve<T>(&self) -> Result<Option<T>, ResolveError>
    where
        T: SharedManaged,
    {
        match self.dyn_resolve(ServiceType::of::<T>())? {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(object) => Ok(Some(*object)),
                Err(_) => unreachable!("the object's type should be `T`"),
            },
            None => Ok(None),
        }
    }

    /// Resolves a `T`, treating absence as [`ResolveError::NotRegistered`].
    fn resolve_required<T>(&self) -> Result<T, ResolveError>
    where
        T: SharedManaged,
    {
        self.resolve()?.context(NotRegisteredSnafu {
            service: ServiceType::of::<T>(),
        })
    }

    fn upcast_dyn(&self) -> &dyn Resolver;
}

impl<T> TypedResolver for T
where
    T: Resolver,
{
    fn upcast_dyn(&self) -> &dyn Resolver {
        self
    }
}

impl TypedResolver for dyn Resolver + '_ {
    fn upcast_dyn(&self) -> &dyn Resolver {
        self
    }
}

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ResolveError {
    #[snafu(display("no registration resolves to {service}"))]
    #[non_exhaustive]
    NotRegistered { service: ServiceType },
    #[snafu(display("could not construct {service} which requested itself during its own construction"))]
    #[non_exhaustive]
    CyclicDependency { service: ServiceType },
    #[snafu(display("could not construct the object {service}"))]
    #[non_exhaustive]
    ObjectConstruction {
        service: ServiceType,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("could not resolve {service} from a disposed provider"))]
    #[non_exhaustive]
    Disposed { service: ServiceType },
}

impl ResolveError {
    /// The service whose resolution failed.
    pub fn service(&self) -> ServiceType {
        match self {
            Self::NotRegistered { service }
            | Self::CyclicDependency { service }
            | Self::ObjectConstruction { service, .. }
            | Self::Disposed { service } => *service,
        }
    }
}

mod wrapper;

use std::error::Error;

use crate::container::{ResolveError, SharedManaged, TypedResolver};

pub use wrapper::ComponentProvider;

/// A type with a dedicated constructor for dependency injection, which is
/// what a type-mapping registration builds.
///
/// Usually, you don't need to implement [`Component`] manually, because the
/// [`component`] macro generates it from the constructor marked with
/// `#[inject]`. Writing it by hand looks like this:
///
/// ```rust
/// # use std::sync::Arc;
/// # use std::convert::Infallible;
/// # use scopekit::container::{ResolveError, TypedResolver};
/// # use scopekit::provider::component::Component;
/// #
/// trait Clock: Send + Sync + 'static {}
///
/// struct FixedClock {
///     epoch: Arc<u64>,
/// }
///
/// impl Clock for FixedClock {}
///
/// impl Component for FixedClock {
///     type Constructed = Arc<dyn Clock>;
///
///     type Error = Infallible;
///
///     fn construct<R>(resolver: &R) -> Result<Result<Self, Self::Error>, ResolveError>
///     where
///         R: TypedResolver + ?Sized,
///     {
///         let epoch = resolver.resolve_required()?;
///         Ok(Ok(Self { epoch }))
///     }
///
///     fn post_process(self) -> Self::Constructed {
///         Arc::new(self)
///     }
/// }
/// ```
///
/// [`component`]: crate::component
pub trait Component: Send + Sync + Sized + 'static {
    /// The service type this component is registered under, such as
    /// `Arc<Self>` or `Arc<dyn Trait>`.
    type Constructed: SharedManaged;

    /// The error occurred in object construction after all dependencies are
    /// retrieved.
    type Error: Into<Box<dyn Error + Send + Sync>>;

    /// Resolves the dependencies and creates the object.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved. A construction
    /// failure is returned as the inner [`Err`] wrapped in the outer [`Ok`].
    fn construct<R>(resolver: &R) -> Result<Result<Self, Self::Error>, ResolveError>
    where
        R: TypedResolver + ?Sized;

    /// Converts `self` into the service type.
    fn post_process(self) -> Self::Constructed;
}

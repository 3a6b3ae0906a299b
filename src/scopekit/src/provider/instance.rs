use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::container::{ResolveError, SharedManaged, TypedResolver};
use crate::key::ServiceType;
use crate::provider::TypedProvider;

/// Hands out clones of one already-constructed object.
pub struct InstanceProvider<T>
where
    T: SharedManaged + Clone,
{
    instance: T,
}

impl<T> InstanceProvider<T>
where
    T: SharedManaged + Clone,
{
    pub fn new(instance: T) -> Self {
        Self { instance }
    }
}

impl<T> Debug for InstanceProvider<T>
where
    T: SharedManaged + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstanceProvider<T>").finish_non_exhaustive()
    }
}

impl<T> TypedProvider for InstanceProvider<T>
where
    T: SharedManaged + Clone,
{
    type Output = T;

    fn provide<R>(&self, _resolver: &R, _service: ServiceType) -> Result<Self::Output, ResolveError>
    where
        R: TypedResolver + ?Sized,
    {
        Ok(self.instance.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::container::MockResolver;

    use super::*;

    #[test]
    fn instance_provider_returns_the_same_instance() {
        let instance = Arc::new(String::from("db"));
        let provider = InstanceProvider::new(Arc::clone(&instance));
        let resolver = MockResolver::new();
        let service = ServiceType::of::<Arc<String>>();

        let first = provider.provide(&resolver, service).unwrap();
        let second = provider.provide(&resolver, service).unwrap();
        assert!(Arc::ptr_eq(&first, &instance));
        assert!(Arc::ptr_eq(&first, &second));
    }
}

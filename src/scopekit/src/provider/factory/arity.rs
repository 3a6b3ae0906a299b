use std::error::Error;

use crate::container::{ResolveError, Resolver, SharedManaged, TypedResolver};
use crate::provider::factory::Factory;

impl<F, T, E> Factory<()> for F
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: SharedManaged,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    type Constructed = T;

    type Error = E;

    fn run(
        &self,
        _resolver: &dyn Resolver,
    ) -> Result<Result<Self::Constructed, Self::Error>, ResolveError> {
        Ok(self())
    }
}

macro_rules! for_each_arity {
    ($implementation:ident) => {
        $implementation!(D1);
        $implementation!(D1, D2);
        $implementation!(D1, D2, D3);
        $implementation!(D1, D2, D3, D4);
        $implementation!(D1, D2, D3, D4, D5);
        $implementation!(D1, D2, D3, D4, D5, D6);
        $implementation!(D1, D2, D3, D4, D5, D6, D7);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8);
    };
}

macro_rules! impl_factory {
    ($($dep:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, T, E, $($dep,)*> Factory<($($dep,)*)> for F
        where
            F: Fn($($dep,)*) -> Result<T, E> + Send + Sync + 'static,
            T: SharedManaged,
            E: Into<Box<dyn Error + Send + Sync>>,
            $($dep: SharedManaged,)*
        {
            type Constructed = T;

            type Error = E;

            fn run(
                &self,
                resolver: &dyn Resolver,
            ) -> Result<Result<Self::Constructed, Self::Error>, ResolveError> {
                $(
                    let $dep = resolver.resolve_required::<$dep>()?;
                )*
                Ok(self($($dep,)*))
            }
        }
    };
}

for_each_arity!(impl_factory);

#![allow(clippy::new_without_default)]

pub mod container;
pub mod key;
pub mod lifecycle;
pub mod module;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod scope;
mod scopes;
pub mod strategy;
mod util;

pub use scopekit_derive::component;
pub use scopes::Scopes;

pub mod prelude {
    pub use crate::component;
    pub use crate::container::{
        Dispose, ResolutionProvider, ResolveError, Resolver, TypedResolver,
    };
    pub use crate::key::ScopeKey;
    pub use crate::lifecycle::LifecycleTracker;
    pub use crate::module::{Configuration, Module};
    pub use crate::registration::{bind, Configurer, Registration, RegistrationError};
    pub use crate::registry::{ScopeError, ScopeRegistry};
    pub use crate::scope::{Lifetime, ScopeLevel};
    pub use crate::strategy::{AmbientKeyStrategy, FixedKeyStrategy, KeyStrategy};
    pub use crate::Scopes;
}

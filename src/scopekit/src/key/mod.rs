mod scope_key;

use std::any::{self, TypeId};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};

use crate::container::Managed;

pub use scope_key::{BlankKeyError, ScopeKey};

/// Identifies a requested service by its Rust type.
///
/// Two service types are equal when they name the same [`TypeId`]. The type
/// name is kept only for messages.
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    pub fn of<T: Managed>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "`{}`", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn service_type_equality_follows_type_id() {
        assert_eq!(ServiceType::of::<Arc<i32>>(), ServiceType::of::<Arc<i32>>());
        assert_ne!(ServiceType::of::<Arc<i32>>(), ServiceType::of::<Arc<u32>>());
    }

    #[test]
    fn service_type_displays_type_name() {
        let service = ServiceType::of::<Arc<String>>();
        assert!(service.name().contains("String"));
        assert_eq!(service.to_string(), format!("`{}`", service.name()));
    }
}

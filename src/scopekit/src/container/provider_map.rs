use std::collections::HashMap;

use crate::key::ServiceType;
use crate::registration::{Registration, RegistrationKind};

/// The registrations a provider was built from, one per service type.
///
/// Later registrations for a service type replace earlier ones, so the map
/// always holds the last registration made. Service types keep the position
/// of their first registration.
#[derive(Debug, Default)]
pub struct ProviderMap {
    providers: HashMap<ServiceType, Registration>,
    order: Vec<ServiceType>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, registration: Registration) -> Option<Registration> {
        let service = registration.service();
        let replaced = self.providers.insert(service, registration);
        if replaced.is_none() {
            self.order.push(service);
        }
        replaced
    }

    pub fn get(&self, service: ServiceType) -> Option<&Registration> {
        self.providers.get(&service)
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.order.iter().copied()
    }

    /// The instance registrations, in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &Registration> + '_ {
        self.order
            .iter()
            .filter_map(|service| self.providers.get(service))
            .filter(|registration| registration.kind() == RegistrationKind::Instance)
    }
}

impl FromIterator<Registration> for ProviderMap {
    fn from_iter<I: IntoIterator<Item = Registration>>(iter: I) -> Self {
        let mut providers = Self::new();
        iter.into_iter().for_each(|registration| {
            providers.insert(registration);
        });
        providers
    }
}

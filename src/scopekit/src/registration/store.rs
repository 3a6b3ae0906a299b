use dashmap::DashMap;

use crate::key::{BlankKeyError, ScopeKey};
use crate::registration::Registration;

/// Ordered registrations per scope key.
///
/// Lists are append-only; every registration is kept even when it names a
/// service type that was registered before, and the provider built from the
/// list lets the last one win.
#[derive(Debug, Default)]
pub struct RegistrationStore {
    registrations: DashMap<ScopeKey, Vec<Registration>>,
}

impl RegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `registration` to the list of `key`, creating the list on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is blank.
    pub fn register(
        &self,
        key: impl AsRef<str>,
        registration: Registration,
    ) -> Result<ScopeKey, BlankKeyError> {
        let key = ScopeKey::new(key)?;
        self.registrations
            .entry(key.clone())
            .or_default()
            .push(registration);
        Ok(key)
    }

    /// Returns a copy of the registrations of `key` in registration order, or
    /// an empty list for an unknown key.
    pub fn snapshot(&self, key: &str) -> Vec<Registration> {
        self.registrations
            .get(key)
            .map(|registrations| registrations.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.registrations.get(key).map_or(0, |r| r.len())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registrations.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Vec<Registration>> {
        self.registrations.remove(key).map(|(_, registrations)| registrations)
    }
}

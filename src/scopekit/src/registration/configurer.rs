use std::error::Error;

use crate::registration::{Registration, RegistrationError};

/// Collects the registrations produced by a [`Module`], together with the
/// errors its modules reported.
///
/// [`Module`]: crate::module::Module
#[derive(Debug, Default)]
pub struct Configurer {
    registrations: Vec<Registration>,
    errors: Vec<RegistrationError>,
}

impl Configurer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    /// Registers the outcome of a fallible [`Binding`] call, recording the
    /// error instead of the registration when it failed.
    ///
    /// [`Binding`]: crate::registration::Binding
    pub fn try_register(&mut self, registration: Result<Registration, RegistrationError>) {
        match registration {
            Ok(registration) => self.register(registration),
            Err(err) => self.errors.push(err),
        }
    }

    pub fn report_module_error(&mut self, module: &'static str, err: Box<dyn Error + Send + Sync>) {
        self.errors.push(RegistrationError::ModuleInner {
            module,
            source: err,
        });
    }

    /// Returns the registrations in the order they were made, or every
    /// reported error if there was any.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Aggregated`] if any error was reported.
    pub fn finish(self) -> Result<Vec<Registration>, RegistrationError> {
        if self.errors.is_empty() {
            Ok(self.registrations)
        } else {
            Err(RegistrationError::Aggregated {
                errors: self.errors,
            })
        }
    }
}

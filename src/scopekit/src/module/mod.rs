//! Grouping registrations into reusable units.

use std::error::Error;

use crate::registration::Configurer;

/// A reusable set of registrations, installed into a scope key through
/// [`ScopeRegistry::install`].
///
/// [`ScopeRegistry::install`]: crate::registry::ScopeRegistry::install
pub trait Module: Send + Sync + 'static {
    /// Runs [`Module::configure`], reporting a failure under the module's
    /// name instead of returning it.
    fn setup(&self, configurer: &mut Configurer) {
        if let Err(err) = self.configure(configurer) {
            configurer.report_module_error(self.name(), err);
        }
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// # Errors
    ///
    /// Returns an error if the module can't describe its registrations.
    fn configure(&self, configurer: &mut Configurer) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Several modules installed as one, in the order they were added.
#[derive(Default)]
pub struct Configuration {
    modules: Vec<Box<dyn Module>>,
}

impl Configuration {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with<M: Module>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn compose(mut self, mut other: Configuration) -> Self {
        self.modules.append(&mut other.modules);
        self
    }
}

impl Module for Configuration {
    fn configure(&self, configurer: &mut Configurer) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.modules
            .iter()
            .for_each(|module| module.setup(configurer));
        Ok(())
    }
}

use std::error::Error;

use snafu::prelude::*;

use crate::key::ServiceType;
use crate::util::display::AggregatedDisplayer;

/// Every disposer failure of one disposal pass.
#[derive(Debug, Snafu)]
#[snafu(display("{} object(s) failed to dispose:\n{}", failures.len(), AggregatedDisplayer::new(failures.as_slice())))]
pub struct DisposeError {
    failures: Vec<DisposalFailure>,
}

impl DisposeError {
    pub(crate) fn new(failures: Vec<DisposalFailure>) -> Self {
        Self { failures }
    }

    /// Returns `Ok(())` for an empty list.
    pub(crate) fn check(failures: Vec<DisposalFailure>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::new(failures))
        }
    }

    /// Joins the failures of several disposal passes, keeping their order.
    pub(crate) fn merge(
        results: impl IntoIterator<Item = Result<(), Self>>,
    ) -> Result<(), Self> {
        let failures = results
            .into_iter()
            .filter_map(Result::err)
            .flat_map(|err| err.failures)
            .collect();
        Self::check(failures)
    }

    pub fn failures(&self) -> &[DisposalFailure] {
        &self.failures
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("disposing {service} failed: {source}"))]
pub struct DisposalFailure {
    service: ServiceType,
    source: Box<dyn Error + Send + Sync>,
}

impl DisposalFailure {
    pub(crate) fn new(service: ServiceType, source: Box<dyn Error + Send + Sync>) -> Self {
        Self { service, source }
    }

    pub fn service(&self) -> ServiceType {
        self.service
    }
}

use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::ops::Deref;
use std::sync::Arc;

use snafu::prelude::*;

/// An opaque name for one logical scope, such as a fixture or the process
/// wide global scope.
///
/// A key is never blank. Cloning is cheap, and equal keys denote the same
/// scope everywhere.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeKey(Arc<str>);

impl ScopeKey {
    /// The key of the process wide scope.
    pub const GLOBAL: &'static str = "Global";

    /// Creates a key, failing if `key` is empty or whitespace only.
    pub fn new(key: impl AsRef<str>) -> Result<Self, BlankKeyError> {
        let key = key.as_ref();
        ensure!(!key.trim().is_empty(), BlankKeySnafu { key });
        Ok(Self(Arc::from(key)))
    }

    pub fn global() -> Self {
        Self(Arc::from(Self::GLOBAL))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ScopeKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ScopeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ScopeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ScopeKey {
    type Error = BlankKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl Debug for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Debug::fmt(&*self.0, f)
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:?}", &*self.0)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("scope key {key:?} is empty or blank"))]
pub struct BlankKeyError {
    key: String,
}

impl BlankKeyError {
    pub fn key(&self) -> &str {
        &self.key
    }
}

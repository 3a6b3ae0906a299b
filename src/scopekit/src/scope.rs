use std::fmt::{Display, Formatter, Result as FmtResult};

/// The nesting tier a scope key lives on.
///
/// Levels are totally ordered by how long they live: [`ScopeLevel::Global`]
/// is the outermost tier and outlives every fixture, a
/// [`ScopeLevel::Fixture`] outlives each of its tests, and
/// [`ScopeLevel::Test`] is the innermost tier. The [`Ord`] implementation
/// follows that order, so `Test < Fixture < Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeLevel {
    Test = 1,
    Fixture = 2,
    Global = 3,
}

impl ScopeLevel {
    /// The longest-lived level.
    pub const OUTERMOST: Self = Self::Global;

    /// The shortest-lived level.
    pub const INNERMOST: Self = Self::Test;

    /// Returns true if `self` lives at least as long as `other`.
    pub fn outlives(self, other: Self) -> bool {
        self >= other
    }

    /// Returns true if `self` lives no longer than `other`.
    pub fn within(self, other: Self) -> bool {
        self <= other
    }

    /// Returns the shortest level which strictly outlives `self`.
    pub fn super_level(self) -> Option<Self> {
        match self {
            Self::Global => None,
            Self::Fixture => Some(Self::Global),
            Self::Test => Some(Self::Fixture),
        }
    }

    /// Returns the longest level which is strictly within `self`.
    pub fn sub_level(self) -> Option<Self> {
        match self {
            Self::Global => Some(Self::Fixture),
            Self::Fixture => Some(Self::Test),
            Self::Test => None,
        }
    }

    pub fn is_test(self) -> bool {
        self == Self::Test
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Fixture => "Fixture",
            Self::Test => "Test",
        }
    }
}

impl Display for ScopeLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// How many instances a registration produces within one provider.
///
/// Only [`Lifetime::Singleton`] and [`Lifetime::Transient`] can be
/// registered. [`Lifetime::Scoped`] is representable so that asking for it is
/// rejected when the registration is created instead of being silently
/// downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

impl Lifetime {
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Scoped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singleton => "Singleton",
            Self::Scoped => "Scoped",
            Self::Transient => "Transient",
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

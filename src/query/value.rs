//! The monitor output lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::formula::Query;

/// A monitor verdict.
///
/// `Stable(false)` is the lattice bottom, `Stable(true)` the top; every
/// unstable value sits between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryValue {
    /// The monitor has committed; no future trace can change the verdict.
    Stable(bool),
    /// The verdict depends on the remainder of the trace; the residual
    /// query must hold from the next step onward.
    Unstable(Query),
}

impl QueryValue {
    /// Lattice meet (conjunction).
    #[must_use]
    pub fn meet(self, other: Self) -> Self {
        match (self, other) {
            (Self::Stable(a), Self::Stable(b)) => Self::Stable(a && b),
            (Self::Stable(true), v) | (v, Self::Stable(true)) => v,
            (Self::Stable(false), _) | (_, Self::Stable(false)) => Self::Stable(false),
            (Self::Unstable(x), Self::Unstable(y)) => Self::Unstable(Query::and(vec![x, y])),
        }
    }

    /// Lattice join (disjunction).
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Stable(a), Self::Stable(b)) => Self::Stable(a || b),
            (Self::Stable(false), v) | (v, Self::Stable(false)) => v,
            (Self::Stable(true), _) | (_, Self::Stable(true)) => Self::Stable(true),
            (Self::Unstable(x), Self::Unstable(y)) => Self::Unstable(Query::or(vec![x, y])),
        }
    }

    /// Lattice complement.
    #[must_use]
    pub fn complement(self) -> Self {
        match self {
            Self::Stable(b) => Self::Stable(!b),
            Self::Unstable(q) => Self::Unstable(q.negated()),
        }
    }

    /// True for committed verdicts.
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Stable(_))
    }

    /// The committed verdict, if any.
    #[must_use]
    pub const fn as_stable(&self) -> Option<bool> {
        match self {
            Self::Stable(b) => Some(*b),
            Self::Unstable(_) => None,
        }
    }

    /// The residual query, if the verdict is still pending.
    #[must_use]
    pub const fn residual(&self) -> Option<&Query> {
        match self {
            Self::Unstable(q) => Some(q),
            Self::Stable(_) => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable(b) => write!(f, "stable({b})"),
            Self::Unstable(q) => write!(f, "unstable({q})"),
        }
    }
}

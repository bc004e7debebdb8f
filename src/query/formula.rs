//! LDLf query formulas over finite traces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::connective::Connective;
use super::path::Path;
use super::proposition::Proposition;

/// A linear-time dynamic logic formula over finite traces.
///
/// `Exists(path, q)` holds when some prefix matched by `path` ends in a
/// state where `q` holds; `All(path, q)` when all such prefixes do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Query {
    /// A proposition at the current position.
    Formula(Proposition),
    /// Trivially true.
    #[serde(rename = "tt")]
    TT,
    /// Trivially false.
    #[serde(rename = "ff")]
    FF,
    /// All operands hold.
    And(Connective<Query>),
    /// Some operand holds.
    Or(Connective<Query>),
    /// Some path prefix ends in a state satisfying the query.
    Exists(Path, Box<Query>),
    /// All path prefixes end in states satisfying the query.
    All(Path, Box<Query>),
}

impl Query {
    /// Lifts a proposition to a query.
    #[must_use]
    pub const fn formula(p: Proposition) -> Self {
        Self::Formula(p)
    }

    /// Conjunction smart constructor.
    ///
    /// Flattens nested conjunctions to keep hashing and caching stable.
    /// An empty operand list yields [`Query::TT`], a singleton the operand
    /// itself.
    #[must_use]
    pub fn and(operands: Vec<Self>) -> Self {
        Self::build(operands, true)
    }

    /// Disjunction smart constructor, dual to [`Query::and`].
    #[must_use]
    pub fn or(operands: Vec<Self>) -> Self {
        Self::build(operands, false)
    }

    fn build(operands: Vec<Self>, conj: bool) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for op in operands {
            match (conj, op) {
                (true, Self::And(c)) | (false, Self::Or(c)) => flat.extend(c.into_operands()),
                (_, other) => flat.push(other),
            }
        }

        let mut iter = flat.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => {
                if conj {
                    Self::TT
                } else {
                    Self::FF
                }
            }
            (Some(only), None) => only,
            (Some(first), Some(second)) => {
                let conn = Connective::new(first, second, iter.collect());
                if conj {
                    Self::And(conn)
                } else {
                    Self::Or(conn)
                }
            }
        }
    }

    /// `<path>query`.
    #[must_use]
    pub fn exists(path: Path, query: Self) -> Self {
        Self::Exists(path, Box::new(query))
    }

    /// `[path]query`.
    #[must_use]
    pub fn all(path: Path, query: Self) -> Self {
        Self::All(path, Box::new(query))
    }

    /// The trace has ended.
    #[must_use]
    pub fn end() -> Self {
        Self::all(Path::test(Self::formula(Proposition::True)), Self::FF)
    }

    /// The current step is the last one.
    #[must_use]
    pub fn last() -> Self {
        Self::all(Path::step(), Self::end())
    }

    /// `query` holds at the next step (which must exist).
    #[must_use]
    pub fn next(query: Self) -> Self {
        Self::exists(Path::step(), query)
    }

    /// `query` holds at some future position (diamond).
    #[must_use]
    pub fn eventually(query: Self) -> Self {
        Self::exists(Path::repeat(Path::step()), query)
    }

    /// `query` holds at every future position (box).
    #[must_use]
    pub fn always(query: Self) -> Self {
        Self::all(Path::repeat(Path::step()), query)
    }

    /// `hold` holds until `goal` does; `goal` must eventually hold.
    #[must_use]
    pub fn until(hold: Self, goal: Self) -> Self {
        Self::exists(
            Path::repeat(Path::sequence(vec![Path::test(hold), Path::step()])),
            goal,
        )
    }

    /// Size-linear, NNF-preserving negation by structural descent.
    ///
    /// `Exists` and `All` dualize; connectives swap; negation sinks to
    /// ground-fact literals.
    #[must_use]
    pub fn negated(&self) -> Self {
        match self {
            Self::Formula(p) => Self::Formula(p.negated()),
            Self::TT => Self::FF,
            Self::FF => Self::TT,
            Self::And(c) => Self::Or(c.map(Self::negated)),
            Self::Or(c) => Self::And(c.map(Self::negated)),
            Self::Exists(path, q) => Self::All(path.clone(), Box::new(q.negated())),
            Self::All(path, q) => Self::Exists(path.clone(), Box::new(q.negated())),
        }
    }

    /// Node count, used to bound solver work.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Formula(p) => 1 + p.size(),
            Self::TT | Self::FF => 1,
            Self::And(c) | Self::Or(c) => 1 + c.operands().map(Self::size).sum::<usize>(),
            Self::Exists(path, q) | Self::All(path, q) => 1 + path.size() + q.size(),
        }
    }

    /// Structural validation applied when a query is registered for
    /// monitoring.
    ///
    /// Rejects `Repeat` bodies that accept the empty word without being
    /// test-only: unwinding such a repeat never reduces path structure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Formula(_) | Self::TT | Self::FF => Ok(()),
            Self::And(c) | Self::Or(c) => c.operands().try_for_each(Self::validate),
            Self::Exists(path, q) | Self::All(path, q) => {
                validate_path(path)?;
                q.validate()
            }
        }
    }
}

fn validate_path(path: &Path) -> Result<(), ValidationError> {
    match path {
        Path::AssertFact(_) => Ok(()),
        Path::Test(q) => q.validate(),
        Path::Choice(c) | Path::Sequence(c) => c.operands().try_for_each(validate_path),
        Path::Repeat(body) => {
            if body.accepts_empty() && !body.test_only() {
                return Err(ValidationError::InvalidQuery {
                    reason: format!("repeat body {body} accepts the empty word but is not test-only"),
                });
            }
            validate_path(body)
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Formula(p) => write!(f, "{p}"),
            Self::TT => write!(f, "tt"),
            Self::FF => write!(f, "ff"),
            Self::And(c) => write_infix(f, c, " & "),
            Self::Or(c) => write_infix(f, c, " | "),
            Self::Exists(path, q) => write!(f, "<{path}>{q}"),
            Self::All(path, q) => write!(f, "[{path}]{q}"),
        }
    }
}

fn write_infix(f: &mut fmt::Formatter<'_>, c: &Connective<Query>, sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in c.operands().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{op}")?;
    }
    write!(f, ")")
}

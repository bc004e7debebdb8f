//! Propositional combinations of fact literals, evaluated at one position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fact::Fact;

use super::connective::Connective;

/// A finite propositional tree over fact literals.
///
/// Kept in negation normal form: negation appears only inside
/// [`Fact::Negated`] literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Proposition {
    /// Holds at every position.
    True,
    /// Holds at no position.
    False,
    /// A fact literal.
    Assert(Fact),
    /// All operands hold.
    Conjunction(Connective<Proposition>),
    /// Some operand holds.
    Disjunction(Connective<Proposition>),
}

impl Proposition {
    /// Asserts a positive fact literal.
    #[must_use]
    pub fn assert(fact: impl Into<Fact>) -> Self {
        Self::Assert(fact.into())
    }

    /// Conjunction smart constructor.
    ///
    /// Flattens nested conjunctions to keep hashing and caching stable.
    /// An empty operand list yields [`Proposition::True`], a singleton the
    /// operand itself.
    #[must_use]
    pub fn conjunction(operands: Vec<Self>) -> Self {
        Self::build(operands, true)
    }

    /// Disjunction smart constructor, dual to [`Proposition::conjunction`].
    #[must_use]
    pub fn disjunction(operands: Vec<Self>) -> Self {
        Self::build(operands, false)
    }

    fn build(operands: Vec<Self>, conj: bool) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for op in operands {
            match (conj, op) {
                (true, Self::Conjunction(c)) | (false, Self::Disjunction(c)) => {
                    flat.extend(c.into_operands());
                }
                (_, other) => flat.push(other),
            }
        }

        let mut iter = flat.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => {
                if conj {
                    Self::True
                } else {
                    Self::False
                }
            }
            (Some(only), None) => only,
            (Some(first), Some(second)) => {
                let conn = Connective::new(first, second, iter.collect());
                if conj {
                    Self::Conjunction(conn)
                } else {
                    Self::Disjunction(conn)
                }
            }
        }
    }

    /// Size-linear, NNF-preserving negation by structural descent.
    #[must_use]
    pub fn negated(&self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Assert(fact) => Self::Assert(fact.negated()),
            Self::Conjunction(c) => Self::Disjunction(c.map(Self::negated)),
            Self::Disjunction(c) => Self::Conjunction(c.map(Self::negated)),
        }
    }

    /// Node count, used to bound solver work.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::True | Self::False | Self::Assert(_) => 1,
            Self::Conjunction(c) | Self::Disjunction(c) => {
                1 + c.operands().map(Self::size).sum::<usize>()
            }
        }
    }
}

impl fmt::Display for Proposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Assert(fact) => write!(f, "{fact}"),
            Self::Conjunction(c) => write_infix(f, c, " & "),
            Self::Disjunction(c) => write_infix(f, c, " | "),
        }
    }
}

fn write_infix(
    f: &mut fmt::Formatter<'_>,
    c: &Connective<Proposition>,
    sep: &str,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in c.operands().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{op}")?;
    }
    write!(f, ")")
}

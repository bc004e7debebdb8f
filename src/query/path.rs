//! Regular path expressions over trace steps and inline tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::connective::Connective;
use super::formula::Query;
use super::proposition::Proposition;

/// A regular expression over propositions and tests.
///
/// [`Path::AssertFact`] consumes one trace step; [`Path::Test`] consumes
/// nothing and asserts a query at the current position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Path {
    /// One trace step where the proposition holds.
    AssertFact(Proposition),
    /// Zero-length step asserting a query holds now.
    Test(Box<Query>),
    /// Any of the alternatives.
    Choice(Connective<Path>),
    /// The alternatives in order.
    Sequence(Connective<Path>),
    /// Zero or more repetitions.
    Repeat(Box<Path>),
}

impl Path {
    /// The "any step" path: one step with no constraint.
    #[must_use]
    pub const fn step() -> Self {
        Self::AssertFact(Proposition::True)
    }

    /// A zero-length test of `query`.
    #[must_use]
    pub fn test(query: Query) -> Self {
        Self::Test(Box::new(query))
    }

    /// Choice smart constructor.
    ///
    /// Flattens nested choices. The empty choice is the impossible path
    /// `Test(FF)`; a singleton is the alternative itself.
    #[must_use]
    pub fn choice(alternatives: Vec<Self>) -> Self {
        Self::build(alternatives, false)
    }

    /// Sequence smart constructor.
    ///
    /// Flattens nested sequences. The empty sequence is the neutral
    /// zero-length path `Test(TT)`; a singleton is the segment itself.
    #[must_use]
    pub fn sequence(segments: Vec<Self>) -> Self {
        Self::build(segments, true)
    }

    fn build(operands: Vec<Self>, seq: bool) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for op in operands {
            match (seq, op) {
                (true, Self::Sequence(c)) | (false, Self::Choice(c)) => {
                    flat.extend(c.into_operands());
                }
                (_, other) => flat.push(other),
            }
        }

        let mut iter = flat.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => {
                if seq {
                    Self::test(Query::TT)
                } else {
                    Self::test(Query::FF)
                }
            }
            (Some(only), None) => only,
            (Some(first), Some(second)) => {
                let conn = Connective::new(first, second, iter.collect());
                if seq {
                    Self::Sequence(conn)
                } else {
                    Self::Choice(conn)
                }
            }
        }
    }

    /// Zero or more repetitions of `body`.
    #[must_use]
    pub fn repeat(body: Self) -> Self {
        Self::Repeat(Box::new(body))
    }

    /// True iff the path contains no step-consuming [`Path::AssertFact`].
    ///
    /// Test-only repeats collapse to a single fixed-point iteration during
    /// evaluation.
    #[must_use]
    pub fn test_only(&self) -> bool {
        match self {
            Self::AssertFact(_) => false,
            Self::Test(_) => true,
            Self::Choice(c) | Self::Sequence(c) => c.operands().all(Self::test_only),
            Self::Repeat(body) => body.test_only(),
        }
    }

    /// True iff the path can match the empty word.
    ///
    /// A `Repeat` body that accepts the empty word without being test-only
    /// would unwind forever; query validation rejects it.
    pub(crate) fn accepts_empty(&self) -> bool {
        match self {
            Self::AssertFact(_) => false,
            Self::Test(_) | Self::Repeat(_) => true,
            Self::Choice(c) => c.operands().any(Self::accepts_empty),
            Self::Sequence(c) => c.operands().all(Self::accepts_empty),
        }
    }

    /// Node count, used to bound solver work.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::AssertFact(p) => 1 + p.size(),
            Self::Test(q) => 1 + q.size(),
            Self::Choice(c) | Self::Sequence(c) => 1 + c.operands().map(Self::size).sum::<usize>(),
            Self::Repeat(body) => 1 + body.size(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssertFact(p) => write!(f, "{p}"),
            Self::Test(q) => write!(f, "{q}?"),
            Self::Choice(c) => write_infix(f, c, " + "),
            Self::Sequence(c) => write_infix(f, c, " ; "),
            Self::Repeat(body) => write!(f, "({body})*"),
        }
    }
}

fn write_infix(f: &mut fmt::Formatter<'_>, c: &Connective<Path>, sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in c.operands().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{op}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{GroundFact, Location};

    fn curl_step() -> Path {
        Path::AssertFact(Proposition::assert(GroundFact::gesture(
            "curl",
            0.8,
            Location::LeftWrist,
        )))
    }

    #[test]
    fn test_only_detects_step_consumption() {
        assert!(!Path::step().test_only());
        assert!(Path::test(Query::TT).test_only());
        assert!(Path::repeat(Path::test(Query::TT)).test_only());
        assert!(!Path::sequence(vec![Path::test(Query::TT), curl_step()]).test_only());
        assert!(Path::choice(vec![Path::test(Query::TT), Path::test(Query::FF)]).test_only());
    }

    #[test]
    fn accepts_empty_on_shapes() {
        assert!(!curl_step().accepts_empty());
        assert!(Path::test(Query::TT).accepts_empty());
        assert!(Path::repeat(curl_step()).accepts_empty());
        assert!(!Path::sequence(vec![Path::test(Query::TT), curl_step()]).accepts_empty());
        assert!(Path::choice(vec![Path::test(Query::TT), curl_step()]).accepts_empty());
    }

    #[test]
    fn smart_constructors_flatten_and_collapse() {
        let nested = Path::sequence(vec![
            Path::sequence(vec![Path::step(), Path::step()]),
            curl_step(),
        ]);
        let Path::Sequence(c) = &nested else {
            panic!("expected sequence, got {nested:?}");
        };
        assert_eq!(c.len(), 3);

        assert_eq!(Path::sequence(vec![]), Path::test(Query::TT));
        assert_eq!(Path::choice(vec![]), Path::test(Query::FF));
        assert_eq!(Path::choice(vec![curl_step()]), curl_step());
    }
}

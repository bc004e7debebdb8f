//! One-step semantic unwinding of LDLf queries.
//!
//! [`evaluate`] consumes a single trace position: given the current residual
//! query, the ground facts holding there, and whether the position is the
//! final one, it returns the new [`QueryValue`]. Paths are walked by direct
//! structural recursion; only residuals crossing a step boundary materialize
//! new queries.

use std::collections::HashSet;

use crate::fact::GroundFact;
use crate::query::{Path, Proposition, Query, QueryValue};

/// Evaluates a query at one trace position.
///
/// `last` indicates that no further position exists; step-consuming paths
/// then fail for `Exists` and hold vacuously for `All`.
#[must_use]
pub fn evaluate(query: &Query, facts: &HashSet<GroundFact>, last: bool) -> QueryValue {
    match query {
        Query::Formula(p) => QueryValue::Stable(eval_proposition(p, facts)),
        Query::TT => QueryValue::Stable(true),
        Query::FF => QueryValue::Stable(false),
        Query::And(c) => c.operands().fold(QueryValue::Stable(true), |acc, q| {
            acc.meet(evaluate(q, facts, last))
        }),
        Query::Or(c) => c.operands().fold(QueryValue::Stable(false), |acc, q| {
            acc.join(evaluate(q, facts, last))
        }),
        Query::Exists(path, q) => eval_exists(path, q, facts, last),
        Query::All(path, q) => eval_all(path, q, facts, last),
    }
}

/// Evaluates a proposition against the facts at the current position.
#[must_use]
pub fn eval_proposition(p: &Proposition, facts: &HashSet<GroundFact>) -> bool {
    match p {
        Proposition::True => true,
        Proposition::False => false,
        Proposition::Assert(fact) => fact.holds_in(facts),
        Proposition::Conjunction(c) => c.operands().all(|op| eval_proposition(op, facts)),
        Proposition::Disjunction(c) => c.operands().any(|op| eval_proposition(op, facts)),
    }
}

fn eval_exists(path: &Path, then: &Query, facts: &HashSet<GroundFact>, last: bool) -> QueryValue {
    match path {
        Path::AssertFact(p) => {
            if !last && eval_proposition(p, facts) {
                QueryValue::Unstable(then.clone())
            } else {
                QueryValue::Stable(false)
            }
        }
        Path::Test(q) => evaluate(q, facts, last).meet(evaluate(then, facts, last)),
        Path::Choice(c) => c.operands().fold(QueryValue::Stable(false), |acc, alt| {
            acc.join(eval_exists(alt, then, facts, last))
        }),
        Path::Sequence(c) => {
            let segments: Vec<&Path> = c.operands().collect();
            eval_exists_seq(&segments, then, facts, last)
        }
        Path::Repeat(body) => {
            if body.test_only() {
                // A test-only body consumes nothing; one fixed-point
                // iteration suffices.
                evaluate(then, facts, last)
            } else {
                let unrolled = Query::exists(Path::Repeat(body.clone()), then.clone());
                evaluate(then, facts, last).join(eval_exists(body, &unrolled, facts, last))
            }
        }
    }
}

fn eval_exists_seq(
    segments: &[&Path],
    then: &Query,
    facts: &HashSet<GroundFact>,
    last: bool,
) -> QueryValue {
    match segments {
        [] => evaluate(then, facts, last),
        [only] => eval_exists(only, then, facts, last),
        [head, tail @ ..] => {
            let cont = Query::exists(
                Path::sequence(tail.iter().map(|p| (*p).clone()).collect()),
                then.clone(),
            );
            eval_exists(head, &cont, facts, last)
        }
    }
}

fn eval_all(path: &Path, then: &Query, facts: &HashSet<GroundFact>, last: bool) -> QueryValue {
    match path {
        Path::AssertFact(p) => {
            if !last && eval_proposition(p, facts) {
                QueryValue::Unstable(then.clone())
            } else {
                QueryValue::Stable(true)
            }
        }
        Path::Test(q) => evaluate(&q.negated(), facts, last).join(evaluate(then, facts, last)),
        Path::Choice(c) => c.operands().fold(QueryValue::Stable(true), |acc, alt| {
            acc.meet(eval_all(alt, then, facts, last))
        }),
        Path::Sequence(c) => {
            let segments: Vec<&Path> = c.operands().collect();
            eval_all_seq(&segments, then, facts, last)
        }
        Path::Repeat(body) => {
            if body.test_only() {
                evaluate(then, facts, last)
            } else {
                let unrolled = Query::all(Path::Repeat(body.clone()), then.clone());
                evaluate(then, facts, last).meet(eval_all(body, &unrolled, facts, last))
            }
        }
    }
}

fn eval_all_seq(
    segments: &[&Path],
    then: &Query,
    facts: &HashSet<GroundFact>,
    last: bool,
) -> QueryValue {
    match segments {
        [] => evaluate(then, facts, last),
        [only] => eval_all(only, then, facts, last),
        [head, tail @ ..] => {
            let cont = Query::all(
                Path::sequence(tail.iter().map(|p| (*p).clone()).collect()),
                then.clone(),
            );
            eval_all(head, &cont, facts, last)
        }
    }
}

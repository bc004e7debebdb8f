//! Per-query monitor: residual state machine with solver-assisted collapse.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluator::evaluate;
use crate::fact::GroundFact;
use crate::query::{Query, QueryValue};
use crate::solver::SolverBackend;

use super::decision::{ClassifiedExercise, WatchedQuery};

/// Unique identifier for a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(Uuid);

impl MonitorId {
    /// Creates a new random monitor id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One executing instance of the evaluator for one watched query.
///
/// Holds the mutable residual state exclusively; the caller serializes
/// steps so at most one invocation is in flight per monitor. Once a stable
/// verdict latches, further events return it without evaluation.
pub(crate) struct QueryMonitor {
    id: MonitorId,
    watched: WatchedQuery,
    current: Query,
    stable: Option<QueryValue>,
}

impl QueryMonitor {
    pub fn new(watched: WatchedQuery) -> Self {
        let current = watched.query.clone();
        Self {
            id: MonitorId::new(),
            watched,
            current,
            stable: None,
        }
    }

    pub const fn id(&self) -> MonitorId {
        self.id
    }

    /// Applies the monitor's decision transform to a verdict.
    pub fn decide(&self, value: &QueryValue) -> Option<ClassifiedExercise> {
        (self.watched.decide)(value)
    }

    /// Consumes one trace position.
    ///
    /// The residual round-trips through the solver: a valid residual
    /// collapses to `Stable(true)`, an unsatisfiable one to
    /// `Stable(false)`, and otherwise the simplified residual replaces the
    /// monitor state while the pre-simplified formula is forwarded so
    /// repeated-match detection keys on a stable formula.
    pub async fn step(
        &mut self,
        facts: &HashSet<GroundFact>,
        last: bool,
        solver: &dyn SolverBackend,
    ) -> QueryValue {
        if let Some(stable) = &self.stable {
            return stable.clone();
        }

        match evaluate(&self.current, facts, last) {
            QueryValue::Stable(verdict) => {
                tracing::debug!(monitor = %self.id, verdict, "monitor stabilized");
                self.latch(verdict)
            }
            QueryValue::Unstable(next) => {
                let (valid, satisfiable, simplified) = tokio::join!(
                    solver.valid(&next),
                    solver.satisfiable(&next),
                    solver.simplify(&next),
                );

                // Failed verdicts degrade to "unknown": not valid, satisfiable.
                let valid = valid.unwrap_or_else(|e| {
                    tracing::warn!(monitor = %self.id, error = %e, "validity check failed");
                    false
                });
                let satisfiable = satisfiable.unwrap_or_else(|e| {
                    tracing::warn!(monitor = %self.id, error = %e, "satisfiability check failed");
                    true
                });

                if valid {
                    tracing::debug!(monitor = %self.id, "residual is valid");
                    self.latch(true)
                } else if satisfiable {
                    self.current = simplified.unwrap_or_else(|e| {
                        tracing::warn!(monitor = %self.id, error = %e, "simplification failed");
                        next.clone()
                    });
                    QueryValue::Unstable(next)
                } else {
                    tracing::debug!(monitor = %self.id, "residual is unsatisfiable");
                    self.latch(false)
                }
            }
        }
    }

    fn latch(&mut self, verdict: bool) -> QueryValue {
        let value = QueryValue::Stable(verdict);
        self.stable = Some(value.clone());
        value
    }
}

impl fmt::Debug for QueryMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMonitor")
            .field("id", &self.id)
            .field("query", &self.watched.query)
            .field("current", &self.current)
            .field("stable", &self.stable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::{MotionResult, SolverError};
    use crate::fact::Location;
    use crate::query::Proposition;
    use crate::solver::{ExhaustiveBackend, SolverStats};

    fn gesture(name: &str) -> GroundFact {
        GroundFact::gesture(name, 0.8, Location::LeftWrist)
    }

    fn holds(name: &str) -> Query {
        Query::formula(Proposition::assert(gesture(name)))
    }

    fn facts(names: &[&str]) -> HashSet<GroundFact> {
        names.iter().map(|n| gesture(n)).collect()
    }

    fn monitor(query: Query) -> QueryMonitor {
        QueryMonitor::new(WatchedQuery::new(query, Arc::new(|_| None)))
    }

    /// Backend whose every call fails, as after a solver crash.
    struct FailingBackend;

    #[async_trait]
    impl crate::solver::SolverBackend for FailingBackend {
        async fn valid(&self, _query: &Query) -> MotionResult<bool> {
            Err(SolverError::Timeout { duration_ms: 1 }.into())
        }

        async fn satisfiable(&self, _query: &Query) -> MotionResult<bool> {
            Err(SolverError::Timeout { duration_ms: 1 }.into())
        }

        async fn simplify(&self, _query: &Query) -> MotionResult<Query> {
            Err(SolverError::Timeout { duration_ms: 1 }.into())
        }

        fn statistics(&self) -> SolverStats {
            SolverStats::default()
        }
    }

    #[tokio::test]
    async fn eventually_stabilizes_and_latches() {
        let backend = ExhaustiveBackend::new();
        let mut m = monitor(Query::eventually(holds("curl")));

        let v1 = m.step(&facts(&[]), false, &backend).await;
        assert!(matches!(v1, QueryValue::Unstable(_)));

        let v2 = m.step(&facts(&["curl"]), false, &backend).await;
        assert_eq!(v2, QueryValue::Stable(true));

        // Latched: the fact disappearing changes nothing.
        let v3 = m.step(&facts(&[]), true, &backend).await;
        assert_eq!(v3, QueryValue::Stable(true));
    }

    #[tokio::test]
    async fn unsatisfiable_residual_collapses_to_false() {
        let backend = ExhaustiveBackend::new();
        // After one step the residual demands a fact and its absence.
        let contradiction = Query::and(vec![
            holds("a"),
            Query::formula(Proposition::assert(gesture("a")).negated()),
        ]);
        let mut m = monitor(Query::next(contradiction));

        let v = m.step(&facts(&[]), false, &backend).await;
        assert_eq!(v, QueryValue::Stable(false));
    }

    #[tokio::test]
    async fn valid_residual_collapses_to_true() {
        let backend = ExhaustiveBackend::new();
        let tautology = Query::or(vec![
            holds("a"),
            Query::formula(Proposition::assert(gesture("a")).negated()),
        ]);
        let mut m = monitor(Query::next(tautology));

        let v = m.step(&facts(&[]), false, &backend).await;
        assert_eq!(v, QueryValue::Stable(true));

        // The collapse latched; later events keep the verdict.
        let v = m.step(&facts(&[]), true, &backend).await;
        assert_eq!(v, QueryValue::Stable(true));
    }

    #[tokio::test]
    async fn solver_failure_degrades_to_unsimplified_residual() {
        let mut m = monitor(Query::eventually(holds("curl")));

        let v1 = m.step(&facts(&[]), false, &FailingBackend).await;
        let QueryValue::Unstable(residual) = v1 else {
            panic!("expected an unstable verdict under a failing solver");
        };
        assert_eq!(residual, Query::eventually(holds("curl")));

        // Evaluation continues and can still stabilize without the solver.
        let v2 = m.step(&facts(&["curl"]), true, &FailingBackend).await;
        assert_eq!(v2, QueryValue::Stable(true));
    }

    #[tokio::test]
    async fn forwarded_residual_is_pre_simplified() {
        let backend = ExhaustiveBackend::new();
        // The residual carries a redundant conjunct the simplifier removes.
        let redundant = Query::and(vec![holds("a"), holds("a"), Query::TT]);
        let mut m = monitor(Query::next(redundant.clone()));

        let v = m.step(&facts(&[]), false, &backend).await;
        // Forwarded: the formula as evaluated, before simplification.
        assert_eq!(v, QueryValue::Unstable(redundant));
        // Stored: the simplified replacement.
        assert_eq!(m.current, holds("a"));
    }
}

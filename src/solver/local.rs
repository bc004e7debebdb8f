//! Embedded decision procedure for the bounded fragment.
//!
//! Enumerates truth assignments over the trace atoms produced by the
//! bounded unrolling. Intended for embedded builds and tests; deployments
//! with larger queries use [`super::SmtProcessBackend`].

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{MotionResult, SolverError};
use crate::query::Query;

use super::encoder::{propositionalize, unroll_plan};
use super::simplify::normalize;
use super::{SolverBackend, SolverCounters, SolverStats, StructuralCache};

/// Default unrolling bound (maximum candidate trace length).
const DEFAULT_UNROLL_BOUND: usize = 8;

/// Default expansion node budget.
const DEFAULT_NODE_BUDGET: usize = 100_000;

/// Maximum distinct trace atoms before the enumeration gives up.
const DEFAULT_MAX_ATOMS: usize = 20;

/// In-process backend deciding queries by assignment enumeration.
#[derive(Debug)]
pub struct ExhaustiveBackend {
    unroll_bound: usize,
    node_budget: usize,
    max_atoms: usize,
    counters: SolverCounters,
    caches: Mutex<Caches>,
}

#[derive(Debug)]
struct Caches {
    valid: StructuralCache<bool>,
    satisfiable: StructuralCache<bool>,
    simplified: StructuralCache<Query>,
}

impl Default for ExhaustiveBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExhaustiveBackend {
    /// Creates a backend with default bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Creates a backend with the given cache capacity.
    #[must_use]
    pub fn with_capacity(cache_capacity: usize) -> Self {
        Self {
            unroll_bound: DEFAULT_UNROLL_BOUND,
            node_budget: DEFAULT_NODE_BUDGET,
            max_atoms: DEFAULT_MAX_ATOMS,
            counters: SolverCounters::default(),
            caches: Mutex::new(Caches {
                valid: StructuralCache::new(cache_capacity),
                satisfiable: StructuralCache::new(cache_capacity),
                simplified: StructuralCache::new(cache_capacity),
            }),
        }
    }

    /// Overrides the unrolling bound.
    #[must_use]
    pub fn with_unroll_bound(mut self, bound: usize) -> Self {
        self.unroll_bound = bound.max(1);
        self
    }

    /// Synchronous satisfiability check.
    pub fn check_satisfiable(&self, query: &Query) -> MotionResult<bool> {
        SolverCounters::bump(&self.counters.satisfiable_calls);

        if let Some(hit) = self.cached(|c| c.satisfiable.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return Ok(hit);
        }

        let sat = self.decide(query)?;
        self.cache(|c| c.satisfiable.insert(query.clone(), sat));
        Ok(sat)
    }

    /// Synchronous validity check.
    pub fn check_valid(&self, query: &Query) -> MotionResult<bool> {
        SolverCounters::bump(&self.counters.valid_calls);

        if let Some(hit) = self.cached(|c| c.valid.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return Ok(hit);
        }

        // A query is a tautology iff its negation has no model.
        let valid = !self.decide(&query.negated())?;
        self.cache(|c| c.valid.insert(query.clone(), valid));
        Ok(valid)
    }

    /// Synchronous simplification. Never fails: undecidable collapse checks
    /// leave the structurally normalized query as is.
    pub fn simplify_query(&self, query: &Query) -> Query {
        SolverCounters::bump(&self.counters.simplify_calls);

        if let Some(hit) = self.cached(|c| c.simplified.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return hit;
        }

        let normalized = normalize(query);
        let result = if matches!(normalized, Query::TT | Query::FF) {
            normalized
        } else if self.check_valid(&normalized).unwrap_or(false) {
            Query::TT
        } else if !self.check_satisfiable(&normalized).unwrap_or(true) {
            Query::FF
        } else {
            normalized
        };

        self.cache(|c| c.simplified.insert(query.clone(), result.clone()));
        result
    }

    fn decide(&self, query: &Query) -> MotionResult<bool> {
        let plan = unroll_plan(query, self.unroll_bound);
        let expansion = propositionalize(query, plan, self.node_budget).map_err(|_| {
            SolverCounters::bump(&self.counters.failures);
            SolverError::Unknown {
                bound: self.unroll_bound,
            }
        })?;

        let atoms = expansion.atoms.len();
        if atoms > self.max_atoms {
            SolverCounters::bump(&self.counters.failures);
            return Err(SolverError::Unknown {
                bound: self.unroll_bound,
            }
            .into());
        }

        for assignment in 0..(1u64 << atoms) {
            if expansion.term.eval(assignment) {
                return Ok(true);
            }
        }

        if plan.exact {
            Ok(false)
        } else {
            SolverCounters::bump(&self.counters.failures);
            Err(SolverError::Unknown {
                bound: self.unroll_bound,
            }
            .into())
        }
    }

    fn cached<T>(&self, f: impl FnOnce(&Caches) -> Option<T>) -> Option<T> {
        self.caches.lock().ok().and_then(|c| f(&c))
    }

    fn cache(&self, f: impl FnOnce(&mut Caches)) {
        if let Ok(mut c) = self.caches.lock() {
            f(&mut c);
        }
    }
}

#[async_trait]
impl SolverBackend for ExhaustiveBackend {
    async fn valid(&self, query: &Query) -> MotionResult<bool> {
        self.check_valid(query)
    }

    async fn satisfiable(&self, query: &Query) -> MotionResult<bool> {
        self.check_satisfiable(query)
    }

    async fn simplify(&self, query: &Query) -> MotionResult<Query> {
        Ok(self.simplify_query(query))
    }

    fn statistics(&self) -> SolverStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{Fact, GroundFact, Location};
    use crate::query::Proposition;

    fn holds(name: &str) -> Query {
        Query::formula(Proposition::assert(GroundFact::gesture(
            name,
            0.8,
            Location::Any,
        )))
    }

    fn absent(name: &str) -> Query {
        Query::formula(Proposition::Assert(Fact::Negated(GroundFact::gesture(
            name,
            0.8,
            Location::Any,
        ))))
    }

    #[test]
    fn excluded_middle_is_valid() {
        let backend = ExhaustiveBackend::new();
        let q = Query::or(vec![holds("a"), absent("a")]);
        assert!(backend.check_valid(&q).unwrap());
        assert!(backend.check_satisfiable(&q).unwrap());
    }

    #[test]
    fn contradiction_is_unsatisfiable() {
        let backend = ExhaustiveBackend::new();
        let q = Query::and(vec![holds("a"), absent("a")]);
        assert!(!backend.check_satisfiable(&q).unwrap());
        assert!(!backend.check_valid(&q).unwrap());
    }

    #[test]
    fn temporal_tautology_within_bound() {
        let backend = ExhaustiveBackend::new();
        let q = Query::next(holds("a"));
        let lem = Query::or(vec![q.negated(), q]);
        assert!(backend.check_valid(&lem).unwrap());
    }

    #[test]
    fn eventually_is_satisfiable() {
        let backend = ExhaustiveBackend::new();
        assert!(backend.check_satisfiable(&Query::eventually(holds("a"))).unwrap());
        assert!(!backend.check_valid(&Query::eventually(holds("a"))).unwrap());
    }

    #[test]
    fn unbounded_refutation_is_unknown() {
        let backend = ExhaustiveBackend::new();
        // Unsatisfiable, but only refutable beyond any finite unrolling.
        let q = Query::and(vec![Query::eventually(holds("a")), Query::always(absent("a"))]);
        let err = backend.check_satisfiable(&q).unwrap_err();
        assert!(err.is_unknown_verdict());
    }

    #[test]
    fn simplify_collapses_decided_queries() {
        let backend = ExhaustiveBackend::new();
        let valid = Query::or(vec![holds("a"), absent("a")]);
        assert_eq!(backend.simplify_query(&valid), Query::TT);

        let unsat = Query::and(vec![holds("a"), absent("a")]);
        assert_eq!(backend.simplify_query(&unsat), Query::FF);

        let open = Query::eventually(holds("a"));
        assert_eq!(backend.simplify_query(&open), open);
    }

    #[test]
    fn cache_hits_are_counted() {
        let backend = ExhaustiveBackend::new();
        let q = Query::or(vec![holds("a"), absent("a")]);
        backend.check_valid(&q).unwrap();
        backend.check_valid(&q).unwrap();
        let stats = backend.statistics();
        assert_eq!(stats.valid_calls, 2);
        assert!(stats.cache_hits >= 1);
    }
}

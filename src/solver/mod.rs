//! Solver backends for validity, satisfiability, and simplification of
//! residual queries.
//!
//! The evaluator unrolls `Repeat`/`Sequence` eagerly, so residual queries
//! grow. A backend able to detect validity or unsatisfiability collapses
//! unstable verdicts early, and simplification bounds monitor memory.
//!
//! Two implementations are provided: [`ExhaustiveBackend`] decides the
//! bounded fragment in-process and is the default for embedded builds and
//! tests; [`SmtProcessBackend`] delegates to an external SMT solver
//! subprocess.

mod encoder;
mod local;
mod process;
mod simplify;

pub use local::ExhaustiveBackend;
pub use process::{SmtProcessBackend, SolverConfig};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MotionResult;
use crate::query::Query;

/// Asynchronous verdict oracle shared by all monitors.
///
/// Implementations must be safe for concurrent calls. A backend that cannot
/// decide a query within its configured bound fails the call with
/// [`crate::error::SolverError::Unknown`]; callers treat any failed call as
/// "not valid, satisfiable".
#[async_trait]
pub trait SolverBackend: Send + Sync {
    /// True iff the query is a tautology in the embedded fragment.
    async fn valid(&self, query: &Query) -> MotionResult<bool>;

    /// True iff some finite trace satisfies the query.
    async fn satisfiable(&self, query: &Query) -> MotionResult<bool>;

    /// An equivalent, normalized query. The result remains in NNF and
    /// `q ⇔ simplify(q)` holds.
    async fn simplify(&self, query: &Query) -> MotionResult<Query>;

    /// Observability snapshot.
    fn statistics(&self) -> SolverStats;
}

/// Snapshot of backend activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverStats {
    /// Number of `valid` calls.
    pub valid_calls: u64,
    /// Number of `satisfiable` calls.
    pub satisfiable_calls: u64,
    /// Number of `simplify` calls.
    pub simplify_calls: u64,
    /// Calls answered from the structural cache.
    pub cache_hits: u64,
    /// Calls that failed (timeout, subprocess death, undecidable bound).
    pub failures: u64,
}

/// Internal atomic counters backing [`SolverStats`].
#[derive(Debug, Default)]
pub(crate) struct SolverCounters {
    pub valid_calls: AtomicU64,
    pub satisfiable_calls: AtomicU64,
    pub simplify_calls: AtomicU64,
    pub cache_hits: AtomicU64,
    pub failures: AtomicU64,
}

impl SolverCounters {
    pub fn snapshot(&self) -> SolverStats {
        SolverStats {
            valid_calls: self.valid_calls.load(Ordering::Relaxed),
            satisfiable_calls: self.satisfiable_calls.load(Ordering::Relaxed),
            simplify_calls: self.simplify_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Bounded cache keyed by structural query equality, evicting in insertion
/// order.
#[derive(Debug)]
pub(crate) struct StructuralCache<V> {
    capacity: usize,
    map: HashMap<Query, V>,
    order: VecDeque<Query>,
}

impl<V: Clone> StructuralCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &Query) -> Option<V> {
        self.map.get(key).cloned()
    }

    pub fn insert(&mut self, key: Query, value: V) {
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return;
        }
        while self.map.len() >= self.capacity {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&evicted);
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }
}

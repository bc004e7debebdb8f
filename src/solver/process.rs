//! External SMT solver backend.
//!
//! Encodes ground facts as nullary uninterpreted predicates and delegates
//! `check-sat` to a solver subprocess speaking SMT-LIB 2 on stdin/stdout
//! (z3 with `-in -smt2` by default). The backend owns the subprocess
//! lifecycle: it is spawned lazily, killed and respawned after a failure,
//! and guarded by a circuit breaker on repeated failures.

use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::{MotionResult, SolverError};
use crate::query::Query;

use super::encoder::{propositionalize, unroll_plan, BoolTerm, Expansion};
use super::simplify::normalize;
use super::{SolverBackend, SolverCounters, SolverStats, StructuralCache};

/// How long an open circuit rejects calls before allowing a probe.
const CIRCUIT_COOLDOWN: Duration = Duration::from_secs(5);

/// Configuration for [`SmtProcessBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver executable.
    pub solver_path: String,
    /// Arguments passed to the executable.
    pub solver_args: Vec<String>,
    /// Maximum candidate trace length for path unrolling.
    pub unroll_bound: usize,
    /// Per-call timeout in milliseconds.
    pub call_timeout_ms: u64,
    /// Structural cache capacity per verdict kind.
    pub cache_capacity: usize,
    /// Consecutive failures before the circuit breaker opens.
    pub failure_threshold: u32,
    /// Expansion node budget.
    pub node_budget: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_path: "z3".to_string(),
            solver_args: vec!["-in".to_string(), "-smt2".to_string()],
            unroll_bound: 8,
            call_timeout_ms: 2_000,
            cache_capacity: 1024,
            failure_threshold: 3,
            node_budget: 100_000,
        }
    }
}

impl SolverConfig {
    /// Parses a JSON configuration document; omitted fields take their
    /// defaults.
    pub fn from_json(json: &str) -> MotionResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::error::ValidationError::InvalidConfig {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Sat,
    Unsat,
    Unknown,
}

struct SolverSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SolverSession {
    async fn spawn(cfg: &SolverConfig) -> Result<Self, SolverError> {
        let mut child = Command::new(&cfg.solver_path)
            .args(&cfg.solver_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SolverError::Spawn {
                path: cfg.solver_path.clone(),
                message: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| SolverError::Spawn {
            path: cfg.solver_path.clone(),
            message: "no stdin handle".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| SolverError::Spawn {
            path: cfg.solver_path.clone(),
            message: "no stdout handle".to_string(),
        })?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        session
            .write(
                "(set-option :print-success false)\n(set-logic QF_UF)\n",
            )
            .await?;
        Ok(session)
    }

    async fn write(&mut self, script: &str) -> Result<(), SolverError> {
        self.stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| SolverError::Io {
                message: e.to_string(),
            })?;
        self.stdin.flush().await.map_err(|e| SolverError::Io {
            message: e.to_string(),
        })
    }

    async fn read_answer(&mut self) -> Result<String, SolverError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| SolverError::Io {
                message: e.to_string(),
            })?;
        if n == 0 {
            return Err(SolverError::Io {
                message: "solver closed stdout".to_string(),
            });
        }
        Ok(line.trim().to_string())
    }

    async fn shutdown(mut self) {
        let _ = self.child.kill().await;
    }
}

#[derive(Debug, Default)]
struct CircuitState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
struct Caches {
    valid: StructuralCache<bool>,
    satisfiable: StructuralCache<bool>,
    simplified: StructuralCache<Query>,
}

/// Backend delegating to an external SMT solver subprocess.
///
/// Safe for concurrent calls; commands are serialized onto the single
/// subprocess while encoding and caching happen outside the session lock.
pub struct SmtProcessBackend {
    cfg: SolverConfig,
    session: Mutex<Option<SolverSession>>,
    circuit: StdMutex<CircuitState>,
    caches: StdMutex<Caches>,
    counters: SolverCounters,
}

impl SmtProcessBackend {
    /// Creates a backend; the subprocess is spawned on first use.
    #[must_use]
    pub fn new(cfg: SolverConfig) -> Self {
        let capacity = cfg.cache_capacity;
        Self {
            cfg,
            session: Mutex::new(None),
            circuit: StdMutex::new(CircuitState::default()),
            caches: StdMutex::new(Caches {
                valid: StructuralCache::new(capacity),
                satisfiable: StructuralCache::new(capacity),
                simplified: StructuralCache::new(capacity),
            }),
            counters: SolverCounters::default(),
        }
    }

    fn check_circuit(&self) -> Result<(), SolverError> {
        let Ok(state) = self.circuit.lock() else {
            return Ok(());
        };
        if state.consecutive_failures < self.cfg.failure_threshold {
            return Ok(());
        }
        // Allow a probe once the cooldown has passed.
        let recent = state
            .last_failure
            .map(|at| at.elapsed() < CIRCUIT_COOLDOWN)
            .unwrap_or(false);
        if recent {
            Err(SolverError::CircuitOpen {
                failures: state.consecutive_failures,
            })
        } else {
            Ok(())
        }
    }

    fn record_failure(&self) {
        SolverCounters::bump(&self.counters.failures);
        if let Ok(mut state) = self.circuit.lock() {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.last_failure = Some(Instant::now());
        }
    }

    fn record_success(&self) {
        if let Ok(mut state) = self.circuit.lock() {
            state.consecutive_failures = 0;
            state.last_failure = None;
        }
    }

    async fn run_check(&self, script: String) -> Result<String, SolverError> {
        self.check_circuit()?;

        let mut guard = self.session.lock().await;
        if guard.is_none() {
            match SolverSession::spawn(&self.cfg).await {
                Ok(session) => *guard = Some(session),
                Err(e) => {
                    self.record_failure();
                    return Err(e);
                }
            }
        }
        let Some(session) = guard.as_mut() else {
            return Err(SolverError::Io {
                message: "solver session unavailable".to_string(),
            });
        };

        let timeout = Duration::from_millis(self.cfg.call_timeout_ms);
        let round_trip = tokio::time::timeout(timeout, async {
            session.write(&script).await?;
            session.read_answer().await
        })
        .await;

        match round_trip {
            Ok(Ok(answer)) => {
                self.record_success();
                Ok(answer)
            }
            Ok(Err(e)) => {
                if let Some(session) = guard.take() {
                    session.shutdown().await;
                }
                self.record_failure();
                Err(e)
            }
            Err(_) => {
                if let Some(session) = guard.take() {
                    session.shutdown().await;
                }
                self.record_failure();
                Err(SolverError::Timeout {
                    duration_ms: self.cfg.call_timeout_ms,
                })
            }
        }
    }

    async fn solve(&self, query: &Query) -> MotionResult<(Answer, bool)> {
        let plan = unroll_plan(query, self.cfg.unroll_bound);
        let expansion =
            propositionalize(query, plan, self.cfg.node_budget).map_err(|_| {
                SolverCounters::bump(&self.counters.failures);
                SolverError::Unknown {
                    bound: self.cfg.unroll_bound,
                }
            })?;

        let script = build_script(&expansion);
        let answer = self.run_check(script).await?;
        let answer = match answer.as_str() {
            "sat" => Answer::Sat,
            "unsat" => Answer::Unsat,
            "unknown" => Answer::Unknown,
            other => {
                self.record_failure();
                return Err(SolverError::UnexpectedOutput {
                    output: other.to_string(),
                }
                .into());
            }
        };
        Ok((answer, plan.exact))
    }

    fn unknown(&self) -> SolverError {
        SolverCounters::bump(&self.counters.failures);
        SolverError::Unknown {
            bound: self.cfg.unroll_bound,
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
impl SolverBackend for SmtProcessBackend {
    async fn valid(&self, query: &Query) -> MotionResult<bool> {
        SolverCounters::bump(&self.counters.valid_calls);

        if let Some(hit) = self.cached(|c| c.valid.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return Ok(hit);
        }

        // A query is a tautology iff its negation has no model.
        let (answer, exact) = self.solve(&query.negated()).await?;
        let valid = match answer {
            Answer::Sat => false,
            Answer::Unsat if exact => true,
            Answer::Unsat | Answer::Unknown => return Err(self.unknown().into()),
        };
        self.cache(|c| c.valid.insert(query.clone(), valid));
        Ok(valid)
    }

    async fn satisfiable(&self, query: &Query) -> MotionResult<bool> {
        SolverCounters::bump(&self.counters.satisfiable_calls);

        if let Some(hit) = self.cached(|c| c.satisfiable.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return Ok(hit);
        }

        let (answer, exact) = self.solve(query).await?;
        let sat = match answer {
            Answer::Sat => true,
            Answer::Unsat if exact => false,
            Answer::Unsat | Answer::Unknown => return Err(self.unknown().into()),
        };
        self.cache(|c| c.satisfiable.insert(query.clone(), sat));
        Ok(sat)
    }

    async fn simplify(&self, query: &Query) -> MotionResult<Query> {
        SolverCounters::bump(&self.counters.simplify_calls);

        if let Some(hit) = self.cached(|c| c.simplified.get(query)) {
            SolverCounters::bump(&self.counters.cache_hits);
            return Ok(hit);
        }

        let normalized = normalize(query);
        let result = if matches!(normalized, Query::TT | Query::FF) {
            normalized
        } else if self.valid(&normalized).await.unwrap_or(false) {
            Query::TT
        } else if !self.satisfiable(&normalized).await.unwrap_or(true) {
            Query::FF
        } else {
            normalized
        };

        self.cache(|c| c.simplified.insert(query.clone(), result.clone()));
        Ok(result)
    }

    fn statistics(&self) -> SolverStats {
        self.counters.snapshot()
    }
}

fn build_script(expansion: &Expansion) -> String {
    let mut script = String::from("(push 1)\n");
    for i in 0..expansion.atoms.len() {
        script.push_str(&format!("(declare-const a{i} Bool)\n"));
    }
    script.push_str("(assert ");
    write_term(&expansion.term, &mut script);
    script.push_str(")\n(check-sat)\n(pop 1)\n");
    script
}

fn write_term(term: &BoolTerm, out: &mut String) {
    match term {
        BoolTerm::True => out.push_str("true"),
        BoolTerm::False => out.push_str("false"),
        BoolTerm::Atom(i) => out.push_str(&format!("a{i}")),
        BoolTerm::NegAtom(i) => out.push_str(&format!("(not a{i})")),
        BoolTerm::And(ops) => {
            out.push_str("(and");
            for op in ops {
                out.push(' ');
                write_term(op, out);
            }
            out.push(')');
        }
        BoolTerm::Or(ops) => {
            out.push_str("(or");
            for op in ops {
                out.push(' ');
                write_term(op, out);
            }
            out.push(')');
        }
    }
}

//! Structural normalization of queries.
//!
//! Normalization is purely syntactic and semantics-preserving: constant
//! folding, same-kind flattening, duplicate-operand removal, and collapse
//! of modalities with trivial continuations. Backends layer solver-assisted
//! collapse to `TT`/`FF` on top.

use std::collections::HashSet;

use crate::query::{Path, Proposition, Query};

/// Returns an equivalent query in normal form. NNF is preserved.
pub(crate) fn normalize(query: &Query) -> Query {
    match query {
        Query::Formula(p) => match normalize_prop(p) {
            Proposition::True => Query::TT,
            Proposition::False => Query::FF,
            other => Query::Formula(other),
        },
        Query::TT => Query::TT,
        Query::FF => Query::FF,
        Query::And(c) => {
            let mut out = Vec::with_capacity(c.len());
            let mut seen = HashSet::new();
            for op in c.operands() {
                let n = normalize(op);
                match n {
                    Query::TT => {}
                    Query::FF => return Query::FF,
                    other => {
                        if seen.insert(other.clone()) {
                            out.push(other);
                        }
                    }
                }
            }
            Query::and(out)
        }
        Query::Or(c) => {
            let mut out = Vec::with_capacity(c.len());
            let mut seen = HashSet::new();
            for op in c.operands() {
                let n = normalize(op);
                match n {
                    Query::FF => {}
                    Query::TT => return Query::TT,
                    other => {
                        if seen.insert(other.clone()) {
                            out.push(other);
                        }
                    }
                }
            }
            Query::or(out)
        }
        Query::Exists(path, q) => {
            let n = normalize(q);
            // No prefix can end in an unsatisfiable state.
            if n == Query::FF {
                return Query::FF;
            }
            Query::exists(normalize_path(path), n)
        }
        Query::All(path, q) => {
            let n = normalize(q);
            if n == Query::TT {
                return Query::TT;
            }
            Query::all(normalize_path(path), n)
        }
    }
}

fn normalize_prop(p: &Proposition) -> Proposition {
    match p {
        Proposition::True => Proposition::True,
        Proposition::False => Proposition::False,
        Proposition::Assert(f) => Proposition::Assert(f.clone()),
        Proposition::Conjunction(c) => {
            let mut out = Vec::with_capacity(c.len());
            let mut seen = HashSet::new();
            for op in c.operands() {
                let n = normalize_prop(op);
                match n {
                    Proposition::True => {}
                    Proposition::False => return Proposition::False,
                    other => {
                        if seen.insert(other.clone()) {
                            out.push(other);
                        }
                    }
                }
            }
            Proposition::conjunction(out)
        }
        Proposition::Disjunction(c) => {
            let mut out = Vec::with_capacity(c.len());
            let mut seen = HashSet::new();
            for op in c.operands() {
                let n = normalize_prop(op);
                match n {
                    Proposition::False => {}
                    Proposition::True => return Proposition::True,
                    other => {
                        if seen.insert(other.clone()) {
                            out.push(other);
                        }
                    }
                }
            }
            Proposition::disjunction(out)
        }
    }
}

fn normalize_path(path: &Path) -> Path {
    match path {
        Path::AssertFact(p) => Path::AssertFact(normalize_prop(p)),
        Path::Test(q) => Path::test(normalize(q)),
        Path::Choice(c) => {
            let mut out = Vec::with_capacity(c.len());
            let mut seen = HashSet::new();
            for op in c.operands() {
                let n = normalize_path(op);
                if seen.insert(n.clone()) {
                    out.push(n);
                }
            }
            Path::choice(out)
        }
        Path::Sequence(c) => Path::sequence(c.operands().map(normalize_path).collect()),
        Path::Repeat(body) => match normalize_path(body) {
            // (p*)* matches exactly what p* does.
            Path::Repeat(inner) => Path::Repeat(inner),
            other => Path::repeat(other),
        },
    }
}

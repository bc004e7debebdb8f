//! Bounded propositionalization of queries into trace atoms.
//!
//! Every `(ground fact, trace position)` pair becomes one boolean atom.
//! Path modalities are unrolled over each candidate trace length; the
//! per-length expansions are disjoined. Expansion carries a node budget so
//! no query shape can run away.

use std::collections::HashMap;

use crate::fact::GroundFact;
use crate::query::{Path, Proposition, Query};

/// Propositional core over interned trace atoms, in NNF.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoolTerm {
    True,
    False,
    Atom(usize),
    NegAtom(usize),
    And(Vec<BoolTerm>),
    Or(Vec<BoolTerm>),
}

impl BoolTerm {
    /// Conjunction with constant collapse.
    pub fn and(operands: Vec<Self>) -> Self {
        let mut out = Vec::with_capacity(operands.len());
        for op in operands {
            match op {
                Self::True => {}
                Self::False => return Self::False,
                Self::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Self::True,
            1 => out.pop().unwrap_or(Self::True),
            _ => Self::And(out),
        }
    }

    /// Disjunction with constant collapse.
    pub fn or(operands: Vec<Self>) -> Self {
        let mut out = Vec::with_capacity(operands.len());
        for op in operands {
            match op {
                Self::False => {}
                Self::True => return Self::True,
                Self::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Self::False,
            1 => out.pop().unwrap_or(Self::False),
            _ => Self::Or(out),
        }
    }

    /// Evaluates the term under an assignment bitmask (atom `i` is bit `i`).
    pub fn eval(&self, assignment: u64) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Atom(i) => assignment & (1 << i) != 0,
            Self::NegAtom(i) => assignment & (1 << i) == 0,
            Self::And(ops) => ops.iter().all(|op| op.eval(assignment)),
            Self::Or(ops) => ops.iter().any(|op| op.eval(assignment)),
        }
    }
}

/// Interning table from `(fact, position)` to atom index.
#[derive(Debug, Default)]
pub(crate) struct AtomTable {
    index: HashMap<(GroundFact, usize), usize>,
}

impl AtomTable {
    fn intern(&mut self, fact: &GroundFact, position: usize) -> usize {
        let next = self.index.len();
        *self
            .index
            .entry((fact.clone(), position))
            .or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }
}

/// How far to unroll and whether an unsat answer is definitive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnrollPlan {
    /// Candidate trace lengths are `1..=max_len`.
    pub max_len: usize,
    /// True when every model of the query prunes to a checked length, so
    /// "no model found" means unsatisfiable rather than unknown.
    pub exact: bool,
}

/// Plans the unrolling for `query` under the configured bound.
pub(crate) fn unroll_plan(query: &Query, bound: usize) -> UnrollPlan {
    let bound = bound.max(1);
    match step_depth(query) {
        // A repeat-free query never constrains positions past its step
        // depth, so expansions for all longer lengths coincide at depth + 2.
        Some(depth) if depth.saturating_add(2) <= bound => UnrollPlan {
            max_len: depth + 2,
            exact: true,
        },
        _ => UnrollPlan {
            max_len: bound,
            exact: false,
        },
    }
}

/// Maximum trace positions a query can consume, `None` when a
/// step-consuming `Repeat` makes it unbounded.
pub(crate) fn step_depth(query: &Query) -> Option<usize> {
    match query {
        Query::Formula(_) | Query::TT | Query::FF => Some(0),
        Query::And(c) | Query::Or(c) => {
            let mut max = 0;
            for op in c.operands() {
                max = max.max(step_depth(op)?);
            }
            Some(max)
        }
        Query::Exists(path, q) | Query::All(path, q) => {
            path_depth(path)?.checked_add(step_depth(q)?)
        }
    }
}

fn path_depth(path: &Path) -> Option<usize> {
    match path {
        Path::AssertFact(_) => Some(1),
        Path::Test(q) => step_depth(q),
        Path::Choice(c) => {
            let mut max = 0;
            for op in c.operands() {
                max = max.max(path_depth(op)?);
            }
            Some(max)
        }
        Path::Sequence(c) => {
            let mut sum = 0usize;
            for op in c.operands() {
                sum = sum.checked_add(path_depth(op)?)?;
            }
            Some(sum)
        }
        // Test-only repeats collapse to their continuation.
        Path::Repeat(body) => {
            if body.test_only() {
                Some(0)
            } else {
                None
            }
        }
    }
}

/// The expansion outgrew its node budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BudgetExhausted;

/// The propositional core of a query together with its atom table.
#[derive(Debug)]
pub(crate) struct Expansion {
    pub term: BoolTerm,
    pub atoms: AtomTable,
}

/// Expands `query` over every candidate trace length in the plan.
pub(crate) fn propositionalize(
    query: &Query,
    plan: UnrollPlan,
    node_budget: usize,
) -> Result<Expansion, BudgetExhausted> {
    let mut ex = Expander {
        atoms: AtomTable::default(),
        fuel: node_budget,
    };
    let mut per_length = Vec::with_capacity(plan.max_len);
    for len in 1..=plan.max_len {
        per_length.push(ex.query(query, 0, len)?);
    }
    Ok(Expansion {
        term: BoolTerm::or(per_length),
        atoms: ex.atoms,
    })
}

struct Expander {
    atoms: AtomTable,
    fuel: usize,
}

impl Expander {
    fn spend(&mut self) -> Result<(), BudgetExhausted> {
        if self.fuel == 0 {
            return Err(BudgetExhausted);
        }
        self.fuel -= 1;
        Ok(())
    }

    fn query(&mut self, q: &Query, pos: usize, len: usize) -> Result<BoolTerm, BudgetExhausted> {
        self.spend()?;
        Ok(match q {
            Query::Formula(p) => self.prop(p, pos),
            Query::TT => BoolTerm::True,
            Query::FF => BoolTerm::False,
            Query::And(c) => {
                let ops = c
                    .operands()
                    .map(|op| self.query(op, pos, len))
                    .collect::<Result<Vec<_>, _>>()?;
                BoolTerm::and(ops)
            }
            Query::Or(c) => {
                let ops = c
                    .operands()
                    .map(|op| self.query(op, pos, len))
                    .collect::<Result<Vec<_>, _>>()?;
                BoolTerm::or(ops)
            }
            Query::Exists(path, then) => self.exists(path, then, pos, len)?,
            Query::All(path, then) => self.all(path, then, pos, len)?,
        })
    }

    fn prop(&mut self, p: &Proposition, pos: usize) -> BoolTerm {
        match p {
            Proposition::True => BoolTerm::True,
            Proposition::False => BoolTerm::False,
            Proposition::Assert(crate::fact::Fact::Holds(f)) => {
                BoolTerm::Atom(self.atoms.intern(f, pos))
            }
            Proposition::Assert(crate::fact::Fact::Negated(f)) => {
                BoolTerm::NegAtom(self.atoms.intern(f, pos))
            }
            Proposition::Conjunction(c) => {
                BoolTerm::and(c.operands().map(|op| self.prop(op, pos)).collect())
            }
            Proposition::Disjunction(c) => {
                BoolTerm::or(c.operands().map(|op| self.prop(op, pos)).collect())
            }
        }
    }

    fn exists(
        &mut self,
        path: &Path,
        then: &Query,
        pos: usize,
        len: usize,
    ) -> Result<BoolTerm, BudgetExhausted> {
        self.spend()?;
        Ok(match path {
            Path::AssertFact(p) => {
                if pos + 1 >= len {
                    BoolTerm::False
                } else {
                    let here = self.prop(p, pos);
                    let next = self.query(then, pos + 1, len)?;
                    BoolTerm::and(vec![here, next])
                }
            }
            Path::Test(q) => {
                let test = self.query(q, pos, len)?;
                let cont = self.query(then, pos, len)?;
                BoolTerm::and(vec![test, cont])
            }
            Path::Choice(c) => {
                let ops = c
                    .operands()
                    .map(|alt| self.exists(alt, then, pos, len))
                    .collect::<Result<Vec<_>, _>>()?;
                BoolTerm::or(ops)
            }
            Path::Sequence(c) => {
                let segments: Vec<&Path> = c.operands().collect();
                self.exists_seq(&segments, then, pos, len)?
            }
            Path::Repeat(body) => {
                if body.test_only() {
                    self.query(then, pos, len)?
                } else {
                    let stop = self.query(then, pos, len)?;
                    let unrolled = Query::exists(Path::Repeat(body.clone()), then.clone());
                    let go = self.exists(body, &unrolled, pos, len)?;
                    BoolTerm::or(vec![stop, go])
                }
            }
        })
    }

    fn exists_seq(
        &mut self,
        segments: &[&Path],
        then: &Query,
        pos: usize,
        len: usize,
    ) -> Result<BoolTerm, BudgetExhausted> {
        match segments {
            [] => self.query(then, pos, len),
            [only] => self.exists(only, then, pos, len),
            [head, tail @ ..] => {
                let cont = Query::exists(
                    Path::sequence(tail.iter().map(|p| (*p).clone()).collect()),
                    then.clone(),
                );
                self.exists(head, &cont, pos, len)
            }
        }
    }

    fn all(
        &mut self,
        path: &Path,
        then: &Query,
        pos: usize,
        len: usize,
    ) -> Result<BoolTerm, BudgetExhausted> {
        self.spend()?;
        Ok(match path {
            Path::AssertFact(p) => {
                if pos + 1 >= len {
                    BoolTerm::True
                } else {
                    let miss = self.prop(&p.negated(), pos);
                    let next = self.query(then, pos + 1, len)?;
                    BoolTerm::or(vec![miss, next])
                }
            }
            Path::Test(q) => {
                let miss = self.query(&q.negated(), pos, len)?;
                let cont = self.query(then, pos, len)?;
                BoolTerm::or(vec![miss, cont])
            }
            Path::Choice(c) => {
                let ops = c
                    .operands()
                    .map(|alt| self.all(alt, then, pos, len))
                    .collect::<Result<Vec<_>, _>>()?;
                BoolTerm::and(ops)
            }
            Path::Sequence(c) => {
                let segments: Vec<&Path> = c.operands().collect();
                self.all_seq(&segments, then, pos, len)?
            }
            Path::Repeat(body) => {
                if body.test_only() {
                    self.query(then, pos, len)?
                } else {
                    let stop = self.query(then, pos, len)?;
                    let unrolled = Query::all(Path::Repeat(body.clone()), then.clone());
                    let go = self.all(body, &unrolled, pos, len)?;
                    BoolTerm::and(vec![stop, go])
                }
            }
        })
    }

    fn all_seq(
        &mut self,
        segments: &[&Path],
        then: &Query,
        pos: usize,
        len: usize,
    ) -> Result<BoolTerm, BudgetExhausted> {
        match segments {
            [] => self.query(then, pos, len),
            [only] => self.all(only, then, pos, len),
            [head, tail @ ..] => {
                let cont = Query::all(
                    Path::sequence(tail.iter().map(|p| (*p).clone()).collect()),
                    then.clone(),
                );
                self.all(head, &cont, pos, len)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Location;
    use crate::query::Proposition;

    fn holds(name: &str) -> Query {
        Query::formula(Proposition::assert(GroundFact::gesture(
            name,
            0.8,
            Location::Any,
        )))
    }

    #[test]
    fn step_depth_of_shapes() {
        assert_eq!(step_depth(&Query::TT), Some(0));
        assert_eq!(step_depth(&holds("a")), Some(0));
        assert_eq!(step_depth(&Query::next(holds("a"))), Some(1));
        assert_eq!(step_depth(&Query::next(Query::next(Query::TT))), Some(2));
        assert_eq!(step_depth(&Query::last()), Some(1));
        assert_eq!(step_depth(&Query::eventually(holds("a"))), None);
        assert_eq!(step_depth(&Query::until(holds("a"), holds("b"))), None);
    }

    #[test]
    fn plan_is_exact_for_repeat_free_queries() {
        let plan = unroll_plan(&Query::next(Query::TT), 8);
        assert!(plan.exact);
        assert_eq!(plan.max_len, 3);

        let plan = unroll_plan(&Query::eventually(holds("a")), 8);
        assert!(!plan.exact);
        assert_eq!(plan.max_len, 8);
    }

    #[test]
    fn atoms_are_interned_per_position() {
        let q = Query::and(vec![holds("a"), Query::next(holds("a"))]);
        let plan = unroll_plan(&q, 8);
        let expansion = propositionalize(&q, plan, 10_000).unwrap();
        // Same fact at positions 0 and 1.
        assert_eq!(expansion.atoms.len(), 2);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let q = Query::eventually(holds("a"));
        let plan = unroll_plan(&q, 8);
        assert!(matches!(propositionalize(&q, plan, 3), Err(BudgetExhausted)));
    }

    #[test]
    fn eval_under_assignment() {
        let term = BoolTerm::and(vec![
            BoolTerm::Atom(0),
            BoolTerm::or(vec![BoolTerm::NegAtom(1), BoolTerm::Atom(2)]),
        ]);
        assert!(term.eval(0b001));
        assert!(term.eval(0b101));
        assert!(!term.eval(0b011));
        assert!(term.eval(0b111));
        assert!(!term.eval(0b000));
    }
}

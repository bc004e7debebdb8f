use proptest::prelude::*;

use motionql::{
    ExhaustiveBackend, Fact, GroundFact, Location, Path, Proposition, Query, QueryValue,
};

fn fact_strategy() -> impl Strategy<Value = GroundFact> {
    // Two predicate names keep the bounded solver's atom count small while
    // still exercising shared and disjoint literals.
    prop_oneof![Just("a"), Just("b")]
        .prop_map(|name| GroundFact::gesture(name, 0.8, Location::LeftWrist))
}

fn prop_strategy(depth: u32) -> BoxedStrategy<Proposition> {
    let literal = prop_oneof![
        Just(Proposition::True),
        Just(Proposition::False),
        fact_strategy().prop_map(|f| Proposition::Assert(Fact::Holds(f))),
        fact_strategy().prop_map(|f| Proposition::Assert(Fact::Negated(f))),
    ];
    if depth == 0 {
        literal.boxed()
    } else {
        let sub = prop_strategy(depth - 1);
        prop_oneof![
            literal,
            proptest::collection::vec(sub.clone(), 2..4).prop_map(Proposition::conjunction),
            proptest::collection::vec(sub, 2..4).prop_map(Proposition::disjunction),
        ]
        .boxed()
    }
}

/// Queries over the full language, including step-consuming repeats.
fn query_strategy(depth: u32) -> BoxedStrategy<Query> {
    query_strategy_impl(depth, true)
}

/// Repeat-free queries: every verdict on these is decided exactly by the
/// bounded backend.
fn bounded_query_strategy(depth: u32) -> BoxedStrategy<Query> {
    query_strategy_impl(depth, false)
}

fn query_strategy_impl(depth: u32, with_repeat: bool) -> BoxedStrategy<Query> {
    let leaf = prop_oneof![
        Just(Query::TT),
        Just(Query::FF),
        prop_strategy(1).prop_map(Query::formula),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        let sub = query_strategy_impl(depth - 1, with_repeat);
        let path = path_strategy_impl(depth - 1, with_repeat);
        prop_oneof![
            leaf,
            proptest::collection::vec(sub.clone(), 2..4).prop_map(Query::and),
            proptest::collection::vec(sub.clone(), 2..4).prop_map(Query::or),
            (path.clone(), sub.clone()).prop_map(|(p, q)| Query::exists(p, q)),
            (path, sub).prop_map(|(p, q)| Query::all(p, q)),
        ]
        .boxed()
    }
}

fn path_strategy_impl(depth: u32, with_repeat: bool) -> BoxedStrategy<Path> {
    let step = prop_strategy(1).prop_map(Path::AssertFact);
    if depth == 0 {
        step.boxed()
    } else {
        let sub = path_strategy_impl(depth - 1, with_repeat);
        let test = query_strategy_impl(depth - 1, with_repeat).prop_map(Path::test);
        let mut options = vec![
            step.boxed(),
            test.boxed(),
            proptest::collection::vec(sub.clone(), 2..3)
                .prop_map(Path::choice)
                .boxed(),
            proptest::collection::vec(sub.clone(), 2..3)
                .prop_map(Path::sequence)
                .boxed(),
        ];
        if with_repeat {
            // Step-consuming bodies only, so the repeat is well-formed.
            options.push(
                prop_strategy(1)
                    .prop_map(|p| Path::repeat(Path::AssertFact(p)))
                    .boxed(),
            );
        }
        proptest::strategy::Union::new(options).boxed()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Negation is involutive on the full language.
    #[test]
    fn double_negation_restores_the_query(q in query_strategy(3)) {
        prop_assert_eq!(q.negated().negated(), q);
    }

    // Negation maps every node one to one.
    #[test]
    fn negation_is_size_linear(q in query_strategy(3)) {
        prop_assert_eq!(q.negated().size(), q.size());
    }

    // Negation never introduces nested negation: it stays on literals.
    #[test]
    fn negation_preserves_nnf(p in prop_strategy(3)) {
        fn literal_only(p: &Proposition) -> bool {
            match p {
                Proposition::True | Proposition::False | Proposition::Assert(_) => true,
                Proposition::Conjunction(c) | Proposition::Disjunction(c) => {
                    c.operands().all(literal_only)
                }
            }
        }
        prop_assert!(literal_only(&p.negated()));
    }

    // Excluded middle is a tautology, and tautologies are satisfiable.
    #[test]
    fn excluded_middle_is_valid(q in bounded_query_strategy(2)) {
        let backend = ExhaustiveBackend::new();
        let lem = Query::or(vec![q.negated(), q]);
        prop_assert!(backend.check_valid(&lem).unwrap());
        prop_assert!(backend.check_satisfiable(&lem).unwrap());
    }

    // Simplification preserves semantics in both directions.
    #[test]
    fn simplification_is_an_equivalence(q in bounded_query_strategy(2)) {
        let backend = ExhaustiveBackend::new();
        let simplified = backend.simplify_query(&q);
        let forward = Query::or(vec![q.negated(), simplified.clone()]);
        let backward = Query::or(vec![q.clone(), simplified.negated()]);
        prop_assert!(backend.check_valid(&forward).unwrap());
        prop_assert!(backend.check_valid(&backward).unwrap());
    }

    // Conjunction elimination: (q1 & q2) -> q1.
    #[test]
    fn and_entails_left(q1 in bounded_query_strategy(2), q2 in bounded_query_strategy(2)) {
        let backend = ExhaustiveBackend::new();
        let both = Query::and(vec![q1.clone(), q2]);
        let entailment = Query::or(vec![both.negated(), q1]);
        prop_assert!(backend.check_valid(&entailment).unwrap());
    }

    // Disjunction introduction: q1 -> (q1 | q2).
    #[test]
    fn or_introduces_right(q1 in bounded_query_strategy(2), q2 in bounded_query_strategy(2)) {
        let backend = ExhaustiveBackend::new();
        let either = Query::or(vec![q1.clone(), q2]);
        let entailment = Query::or(vec![q1.negated(), either]);
        prop_assert!(backend.check_valid(&entailment).unwrap());
    }

    // Modus ponens: (q1 & (q1 -> q2)) -> q2.
    #[test]
    fn modus_ponens(q1 in bounded_query_strategy(2), q2 in bounded_query_strategy(2)) {
        let backend = ExhaustiveBackend::new();
        let implication = Query::or(vec![q1.negated(), q2.clone()]);
        let premise = Query::and(vec![q1, implication]);
        let entailment = Query::or(vec![premise.negated(), q2]);
        prop_assert!(backend.check_valid(&entailment).unwrap());
    }

    // Lattice laws on stable values.
    #[test]
    fn stable_lattice_laws(a in any::<bool>(), b in any::<bool>(), c in any::<bool>()) {
        let (va, vb, vc) = (
            QueryValue::Stable(a),
            QueryValue::Stable(b),
            QueryValue::Stable(c),
        );

        prop_assert_eq!(va.clone().meet(vb.clone()), vb.clone().meet(va.clone()));
        prop_assert_eq!(va.clone().join(vb.clone()), vb.clone().join(va.clone()));
        prop_assert_eq!(
            va.clone().meet(vb.clone()).meet(vc.clone()),
            va.clone().meet(vb.clone().meet(vc.clone()))
        );
        prop_assert_eq!(
            va.clone().join(vb.clone()).join(vc.clone()),
            va.clone().join(vb.clone().join(vc.clone()))
        );
        prop_assert_eq!(va.clone().meet(va.clone()), va.clone());
        prop_assert_eq!(va.clone().join(va.clone()), va);
    }

    // Complement is involutive on all query values.
    #[test]
    fn complement_is_involutive(q in query_strategy(3)) {
        let v = QueryValue::Unstable(q);
        prop_assert_eq!(v.clone().complement().complement(), v);

        let t = QueryValue::Stable(true);
        prop_assert_eq!(t.clone().complement().complement(), t);
    }
}

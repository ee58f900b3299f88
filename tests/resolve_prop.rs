use proptest::prelude::*;
use reasoner::key::Canonical;
use reasoner::unifier::Unifier;
use reasoner::{
    Answer, Atom, ConceptId, InferenceRule, MemoryGraph, Query, RolePlayer, RuleStore, Session,
    SymbolStore, Var,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const MAX_NODES: usize = 4;
const MAX_PERMUTATIONS: usize = 720;
const VAR_NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn vars(symbols: &SymbolStore) -> Vec<Var> {
    VAR_NAMES.iter().map(|n| Var::named(symbols, n)).collect()
}

fn link(symbols: &SymbolStore, x: Var, y: Var) -> Atom {
    Atom::relation(
        symbols.intern("link"),
        [
            RolePlayer::new(symbols.intern("from"), x),
            RolePlayer::new(symbols.intern("to"), y),
        ],
    )
}

fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..MAX_NODES, 0..MAX_NODES), 0..8)
}

/// Graph holding the given `link` edges over `MAX_NODES` nodes.
fn build_graph(edges: &[(usize, usize)]) -> (Arc<SymbolStore>, Arc<MemoryGraph>, Vec<ConceptId>) {
    let symbols = Arc::new(SymbolStore::new());
    let graph = Arc::new(MemoryGraph::new(Arc::clone(&symbols)));
    let nodes: Vec<ConceptId> = (0..MAX_NODES).map(|_| graph.insert_entity("node")).collect();
    for &(from, to) in edges {
        graph.insert_relation("link", &[("from", nodes[from]), ("to", nodes[to])]);
    }
    (symbols, graph, nodes)
}

fn transitive_rules(symbols: &SymbolStore) -> RuleStore {
    let (x, y, z) = (
        Var::named(symbols, "rx"),
        Var::named(symbols, "ry"),
        Var::named(symbols, "rz"),
    );
    let mut rules = RuleStore::new();
    rules.add(InferenceRule::new(
        "link-transitivity",
        Query::new([link(symbols, x, z), link(symbols, z, y)]),
        link(symbols, x, y),
    ));
    rules
}

/// Reachability by repeated squaring of the edge set.
fn closure(edges: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
    let mut reach: BTreeSet<(usize, usize)> = edges.iter().copied().collect();
    loop {
        let mut next = reach.clone();
        for &(a, b) in &reach {
            for &(c, d) in &reach {
                if b == c {
                    next.insert((a, d));
                }
            }
        }
        if next.len() == reach.len() {
            return reach;
        }
        reach = next;
    }
}

fn index_pairs(answers: &[Answer], x: Var, y: Var, nodes: &[ConceptId]) -> Vec<(usize, usize)> {
    let index = |c: Option<ConceptId>| c.and_then(|c| nodes.iter().position(|n| *n == c));
    answers
        .iter()
        .filter_map(|a| Some((index(a.get(x))?, index(a.get(y))?)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn bijective_unifier_round_trips(
        perm in Just((0..VAR_NAMES.len()).collect::<Vec<_>>()).prop_shuffle(),
        concepts in prop::collection::vec(0u64..100, VAR_NAMES.len()),
    ) {
        let symbols = SymbolStore::new();
        let vs = vars(&symbols);
        let unifier = Unifier::from_pairs(vs.iter().enumerate().map(|(i, &v)| (v, vs[perm[i]])));
        prop_assert!(unifier.is_bijective());

        let answer = Answer::from_pairs(
            vs.iter().zip(concepts.iter()).map(|(&v, &c)| (v, ConceptId::new(c))),
        )
        .unwrap();
        let moved = unifier.apply(&answer).unwrap();
        prop_assert_eq!(moved.len(), answer.len());
        prop_assert_eq!(unifier.inverse().apply(&moved), Some(answer));
    }

    #[test]
    fn keys_ignore_variable_names(
        players in prop::collection::vec(0..VAR_NAMES.len(), 1..4),
        perm in Just((0..VAR_NAMES.len()).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let symbols = SymbolStore::new();
        let vs = vars(&symbols);
        let relation = |pick: &dyn Fn(usize) -> Var| {
            Atom::relation(
                symbols.intern("group"),
                players.iter().map(|&p| RolePlayer::new(symbols.intern("member"), pick(p))),
            )
        };
        let original = relation(&|p| vs[p]);
        let renamed = relation(&|p| vs[perm[p]]);

        let left = Canonical::of(&original, &[], MAX_PERMUTATIONS);
        let right = Canonical::of(&renamed, &[], MAX_PERMUTATIONS);
        prop_assert_eq!(&left.key, &right.key);
        prop_assert!(left.unifier_to(&right).is_some());
    }

    #[test]
    fn neq_removes_exactly_the_loops(edges in edges_strategy()) {
        let (symbols, graph, nodes) = build_graph(&edges);
        let session = Session::new(graph, Arc::new(RuleStore::new()));
        let (x, y) = (Var::named(&symbols, "x"), Var::named(&symbols, "y"));

        let positive = session.resolve_all(&Query::new([link(&symbols, x, y)])).unwrap();
        let distinct = session
            .resolve_all(&Query::new([link(&symbols, x, y), Atom::neq(x, y)]))
            .unwrap();

        let expected: BTreeSet<_> = index_pairs(&positive, x, y, &nodes)
            .into_iter()
            .filter(|(a, b)| a != b)
            .collect();
        let found = index_pairs(&distinct, x, y, &nodes);
        prop_assert_eq!(found.len(), expected.len());
        prop_assert_eq!(found.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn transitivity_computes_the_closure_without_duplicates(edges in edges_strategy()) {
        let (symbols, graph, nodes) = build_graph(&edges);
        let rules = transitive_rules(&symbols);
        let session = Session::new(graph, Arc::new(rules));
        let (x, y) = (Var::named(&symbols, "x"), Var::named(&symbols, "y"));

        let answers = session.resolve_all(&Query::new([link(&symbols, x, y)])).unwrap();
        let found = index_pairs(&answers, x, y, &nodes);
        let unique: BTreeSet<_> = found.iter().copied().collect();
        prop_assert_eq!(unique.len(), found.len());
        prop_assert_eq!(unique, closure(&edges));
    }
}

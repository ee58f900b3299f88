use super::*;
use crate::atom::Atom;
use crate::concept::ConceptId;
use crate::error::{PlanError, ResolveError};
use crate::rule::RuleStore;
use crate::test_utils::{link, rel, setup, transitive_chain, var, Chain};

fn session(chain: &Chain) -> Session {
    Session::new(Arc::clone(&chain.graph), Arc::new(chain.rules.clone()))
        .with_symbols(Arc::clone(&chain.symbols))
}

// ========== VALIDATION ==========

#[test]
fn resolve_rejects_predicate_only_query() {
    let chain = transitive_chain(2);
    let x = var(&chain.symbols, "x");
    let query = Query::new([Atom::id(x, chain.nodes[0])]);
    let err = session(&chain).resolve(&query).err();
    assert_eq!(err, Some(ResolveError::Plan(PlanError::EmptyQuery)));
}

#[test]
fn resolve_names_unbound_neq_variable() {
    let chain = transitive_chain(2);
    let s = &chain.symbols;
    let (x, y, w) = (var(s, "x"), var(s, "y"), var(s, "w"));
    let query = Query::new([link(s, x, y), Atom::neq(y, w)]);
    let err = session(&chain).resolve_all(&query).unwrap_err();
    assert_eq!(err, ResolveError::Plan(PlanError::UnboundNeq("$w".into())));
    assert!(err.to_string().contains("$w"));
}

#[test]
fn plan_reports_both_levels() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y, z) = (var(s, "x"), var(s, "y"), var(s, "z"));
    let query = Query::new([link(s, x, y), link(s, y, z), Atom::id(x, chain.nodes[0])]);
    let plan = session(&chain).plan(&query).unwrap();
    assert_eq!(plan.atoms.plan()[0], link(s, x, y));
    assert_eq!(plan.queries.len(), 2);
    assert_eq!(
        plan.queries.queries()[0].substitution().get(x),
        Some(chain.nodes[0])
    );
}

// ========== ITERATION ==========

#[test]
fn answers_are_projected_onto_selection() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let query = Query::new([link(s, x, y)]).select([x]);
    let answers = session(&chain).resolve_all(&query).unwrap();
    // n0 reaches n1 and n2, n1 reaches n2
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a.len() == 1 && a.contains(x)));
}

#[test]
fn anonymous_variables_are_not_reported() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, anon) = (var(s, "x"), var(s, "_to"));
    let answers = session(&chain)
        .resolve_all(&Query::new([link(s, x, anon)]))
        .unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| !a.contains(anon)));
}

#[test]
fn iterator_is_lazy_and_fused() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let session = session(&chain);
    let mut iter = session.resolve(&Query::new([link(s, x, y)])).unwrap();
    assert_eq!(iter.query().len(), 1);
    assert_eq!(iter.iterations(), 1);

    let first = iter.next().unwrap().unwrap();
    assert!(first.contains(x) && first.contains(y));
    let rest: Vec<_> = iter.by_ref().collect();
    assert_eq!(rest.len(), 2);
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn answers_never_repeat_across_rounds() {
    let chain = transitive_chain(4);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let session = session(&chain);
    let mut iter = session.resolve(&Query::new([link(s, x, y)])).unwrap();
    let answers: Vec<Answer> = iter.by_ref().collect::<Result<_, _>>().unwrap();
    let unique: FxHashSet<_> = answers.iter().cloned().collect();
    assert_eq!(unique.len(), answers.len());
    assert_eq!(answers.len(), 6);
    assert!(iter.iterations() <= session.config().max_iterations);
}

#[test]
fn iteration_cap_bounds_rounds() {
    let chain = transitive_chain(4);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let config = ReasonerConfig {
        max_iterations: 1,
        ..ReasonerConfig::default()
    };
    let session = session(&chain).with_config(config);
    let mut iter = session.resolve(&Query::new([link(s, x, y)])).unwrap();
    while iter.next().is_some() {}
    assert_eq!(iter.iterations(), 1);
}

// ========== REITERATION ==========

#[test]
fn recursive_rules_require_reiteration() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let query = Query::new([link(s, x, y)]);
    let session = session(&chain);
    assert!(session.requires_reiteration(&query));

    let no_rounds = session.clone().with_config(ReasonerConfig {
        reiterate: false,
        ..ReasonerConfig::default()
    });
    assert!(!no_rounds.requires_reiteration(&query));
}

#[test]
fn non_recursive_rules_resolve_in_one_round() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    graph.insert_relation("edge", &[("from", a), ("to", b)]);
    let (ex, ey) = (var(&symbols, "ex"), var(&symbols, "ey"));
    let mut rules = RuleStore::new();
    rules.add(crate::rule::InferenceRule::new(
        "edge-to-link",
        Query::new([rel(&symbols, "edge", &[("from", ex), ("to", ey)])]),
        link(&symbols, ex, ey),
    ));
    let session = Session::new(graph, Arc::new(rules));
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let query = Query::new([link(&symbols, x, y)]);
    assert!(!session.requires_reiteration(&query));

    let mut iter = session.resolve(&query).unwrap();
    assert_eq!(iter.by_ref().count(), 1);
    assert_eq!(iter.iterations(), 1);
}

#[test]
fn complete_atomic_query_needs_no_reiteration() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let query = Query::new([link(s, x, y)]);
    let session = session(&chain);
    session.resolve_all(&query).unwrap();
    assert!(!session.requires_reiteration(&query));

    let bound = Query::new([link(s, x, y), Atom::id(x, chain.nodes[0])]);
    let answers = session.resolve_all(&bound).unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a.get(x) == Some(chain.nodes[0])));
}

// ========== SESSION ==========

#[test]
fn clones_share_the_cache() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let session = session(&chain);
    let copy = session.clone().with_fresh_metrics();
    copy.resolve_all(&Query::new([link(s, x, y)])).unwrap();
    assert!(!session.cache().is_empty());
    assert!(Arc::ptr_eq(&session.shared_cache(), &copy.shared_cache()));

    session.clear_cache();
    assert!(copy.cache().is_empty());
}

#[test]
fn debug_output_shows_config() {
    let chain = transitive_chain(2);
    let shown = format!("{:?}", session(&chain));
    assert!(shown.contains("Session"));
    assert!(shown.contains("max_iterations"));
}

#[test]
fn unknown_facts_give_no_answers() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y) = (var(s, "x"), var(s, "y"));
    let query = Query::new([link(s, x, y), Atom::id(x, ConceptId::new(9_999))]);
    assert!(session(&chain).resolve_all(&query).unwrap().is_empty());
}

use super::*;
use crate::atom::{Atom, Var};
use crate::concept::{Comparator, ConceptId, Value};
use crate::graph::JoinOrderOracle;
use crate::symbol::SymbolStore;
use crate::test_utils::{link, rel, setup, transitive_chain, var};

/// Oracle answering with a fixed preference, restricted to the atoms it is asked about.
struct FixedOrder(Vec<Atom>);

impl JoinOrderOracle for FixedOrder {
    fn estimate_join_order(&self, conjunction: &[Atom]) -> Vec<Atom> {
        self.0
            .iter()
            .filter(|a| conjunction.contains(a))
            .cloned()
            .collect()
    }
}

fn abc(symbols: &SymbolStore) -> (Atom, Atom, Atom, Var) {
    let (x, y, z) = (var(symbols, "x"), var(symbols, "y"), var(symbols, "z"));
    let a = rel(symbols, "a", &[("from", x), ("to", y)]);
    let b = rel(symbols, "b", &[("from", y), ("to", z)]);
    let c = Atom::isa(z, symbols.intern("c"));
    (a, b, c, z)
}

// ========== ATOM PLAN ==========

#[test]
fn grounded_atom_goes_first_against_the_oracle() {
    let (symbols, _) = setup();
    let (a, b, c, z) = abc(&symbols);
    let query = Query::new([a.clone(), b.clone(), c.clone(), Atom::id(z, ConceptId::new(7))]);
    let oracle = FixedOrder(vec![a.clone(), b.clone(), c.clone()]);

    let plan = ResolutionPlan::new(&query, &oracle, |_| false, true).unwrap();
    assert_eq!(plan.plan(), &[c, b, a]);
    assert!(plan.disconnections().is_empty());
}

#[test]
fn oracle_order_is_taken_when_it_starts_with_a_candidate() {
    let (symbols, _) = setup();
    let (a, b, _, _) = abc(&symbols);
    let query = Query::new([a.clone(), b.clone()]);
    let oracle = FixedOrder(vec![b.clone(), a.clone()]);

    let plan = ResolutionPlan::new(&query, &oracle, |_| false, true).unwrap();
    assert_eq!(plan.into_atoms(), vec![b, a]);
}

#[test]
fn atoms_the_oracle_omits_keep_query_order() {
    let (symbols, _) = setup();
    let (a, b, _, _) = abc(&symbols);
    let (u, v) = (var(&symbols, "u"), var(&symbols, "v"));
    let d = rel(&symbols, "d", &[("from", u), ("to", v)]);
    let query = Query::new([a.clone(), d.clone(), b.clone()]);
    let oracle = FixedOrder(vec![b.clone()]);

    let plan = ResolutionPlan::new(&query, &oracle, |_| false, false).unwrap();
    assert_eq!(plan.plan(), &[b, a, d]);
}

#[test]
fn value_predicates_raise_priority() {
    let (symbols, _) = setup();
    let (a, b, _, z) = abc(&symbols);
    let query = Query::new([
        a.clone(),
        b.clone(),
        Atom::value(z, Comparator::Eq, Value::Long(3)),
    ]);
    let plan = ResolutionPlan::new(&query, &FixedOrder(vec![]), |_| false, true).unwrap();
    assert_eq!(plan.plan(), &[b, a]);
}

#[test]
fn value_predicates_outrank_grounded_atoms() {
    let (symbols, _) = setup();
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let grounded = Atom::isa(x, symbols.intern("t"));
    let valued = Atom::isa(y, symbols.intern("u"));
    let query = Query::new([
        grounded.clone(),
        valued.clone(),
        Atom::id(x, ConceptId::new(7)),
        Atom::value(y, Comparator::Eq, Value::Long(3)),
    ]);

    let plan = ResolutionPlan::new(&query, &FixedOrder(vec![]), |_| false, false).unwrap();
    assert_eq!(plan.plan(), &[valued, grounded]);
}

#[test]
fn non_resolvable_atoms_break_ties() {
    let (symbols, _) = setup();
    let (a, b, _, _) = abc(&symbols);
    let query = Query::new([a.clone(), b.clone()]);
    let plan = ResolutionPlan::new(&query, &FixedOrder(vec![]), |atom| *atom == a, true).unwrap();
    assert_eq!(plan.plan(), &[b, a]);
}

#[test]
fn disconnected_atoms_are_reported() {
    let (symbols, _) = setup();
    let (a, _, _, _) = abc(&symbols);
    let (u, v) = (var(&symbols, "u"), var(&symbols, "v"));
    let d = rel(&symbols, "d", &[("from", u), ("to", v)]);
    let query = Query::new([a.clone(), d.clone()]);

    let plan = ResolutionPlan::new(&query, &FixedOrder(vec![]), |_| false, true).unwrap();
    assert_eq!(plan.plan(), &[a, d]);
    assert_eq!(plan.disconnections(), &[1]);
}

#[test]
fn plan_covers_every_selectable_atom() {
    let (symbols, _) = setup();
    let (a, b, c, z) = abc(&symbols);
    let query = Query::new([a, b, c, Atom::neq(z, z)]);
    let plan = ResolutionPlan::new(&query, &FixedOrder(vec![]), |_| false, true).unwrap();
    assert_eq!(plan.plan().len(), 3);
    assert!(query.selectable().all(|atom| plan.plan().contains(atom)));
}

#[test]
fn predicate_only_query_cannot_be_planned() {
    let (symbols, _) = setup();
    let x = var(&symbols, "x");
    let query = Query::new([Atom::id(x, ConceptId::new(1))]);
    assert_eq!(
        ResolutionPlan::new(&query, &FixedOrder(vec![]), |_| false, true),
        Err(PlanError::EmptyQuery)
    );
}

// ========== QUERY PLAN ==========

#[test]
fn non_resolvable_runs_form_one_fragment() {
    let (symbols, _) = setup();
    let (a, b, c, z) = abc(&symbols);
    let query = Query::new([a.clone(), b.clone(), c.clone(), Atom::id(z, ConceptId::new(7))]);
    let oracle = FixedOrder(vec![]);
    let resolvable = |atom: &Atom| *atom == a;

    let atoms = ResolutionPlan::new(&query, &oracle, resolvable, true).unwrap();
    let plan = ResolutionQueryPlan::new(&query, &atoms, resolvable);
    assert_eq!(plan.len(), 2);

    let first = &plan.queries()[0];
    assert!(!first.is_atomic());
    assert_eq!(first.selectable().count(), 2);
    assert_eq!(first.substitution().get(z), Some(ConceptId::new(7)));

    let second = &plan.queries()[1];
    assert!(second.is_atomic());
    assert_eq!(second.selectable().next(), Some(&a));
}

#[test]
fn bound_fragments_come_first() {
    let (symbols, _) = setup();
    let (a, b, _, _) = abc(&symbols);
    let x = var(&symbols, "x");
    let query = Query::new([a.clone(), b.clone(), Atom::id(x, ConceptId::new(2))]);
    // the oracle prefers b, but only a carries a binding
    let atoms = ResolutionPlan::new(&query, &FixedOrder(vec![b.clone(), a.clone()]), |_| true, true)
        .unwrap();
    assert_eq!(atoms.plan()[0], a, "bound atom wins locally");

    let plan = ResolutionQueryPlan::new(&query, &atoms, |_| true);
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.queries()[0].selectable().next(), Some(&a));
    assert!(!plan.queries()[0].substitution().is_empty());
}

#[test]
fn plan_query_respects_inference_switch() {
    let chain = transitive_chain(3);
    let s = &chain.symbols;
    let (x, y, z) = (var(s, "x"), var(s, "y"), var(s, "z"));
    let query = Query::new([link(s, x, y), link(s, y, z)]);

    let inferred = plan_query(&query, &*chain.graph, &chain.rules, &ReasonerConfig::default()).unwrap();
    assert_eq!(inferred.atoms.plan().len(), 2);
    assert_eq!(inferred.queries.len(), 2);
    assert!(inferred.queries.queries().iter().all(Query::is_atomic));

    let matched = plan_query(
        &query,
        &*chain.graph,
        &chain.rules,
        &ReasonerConfig::without_inference(),
    )
    .unwrap();
    assert_eq!(matched.queries.len(), 1);
    assert_eq!(matched.queries.into_queries()[0].selectable().count(), 2);
}

use super::*;
use crate::atom::{RolePlayer, Var};
use crate::concept::{Comparator, Value};
use crate::test_utils::{link, rel, setup, var};

fn collect(graph: &MemoryGraph, query: &Query) -> Vec<Answer> {
    graph
        .match_conjunction(query)
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// ========== SCHEMA ==========

#[test]
fn subtypes_are_transitive() {
    let (symbols, graph) = setup();
    let animal = graph.define_type("animal", None);
    let dog = graph.define_type("dog", Some("animal"));
    let puppy = graph.define_type("puppy", Some("dog"));
    assert!(graph.is_subtype(puppy, animal));
    assert!(graph.is_subtype(dog, dog));
    assert!(!graph.is_subtype(animal, dog));
    assert!(graph.is_subtype(symbols.intern("unknown"), symbols.intern("unknown")));
}

#[test]
fn role_hierarchy_lists_super_roles() {
    let (_, graph) = setup();
    let role = graph.define_type("role", None);
    let parent = graph.define_type("parent", Some("role"));
    let mother = graph.define_type("mother", Some("parent"));
    let mother_id = graph.schema_concept(mother).unwrap();
    let chain = graph.role_hierarchy(mother_id);
    assert_eq!(
        chain,
        vec![
            mother_id,
            graph.schema_concept(parent).unwrap(),
            graph.schema_concept(role).unwrap()
        ]
    );
    assert_eq!(graph.label_of(mother_id), Some(mother));
}

// ========== MATCHING ==========

#[test]
fn match_relation_binds_players() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    graph.insert_relation("link", &[("from", a), ("to", b)]);
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));

    let answers = collect(&graph, &Query::new([link(&symbols, x, y)]));
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].get(x), Some(a));
    assert_eq!(answers[0].get(y), Some(b));
}

#[test]
fn match_relation_through_subtype() {
    let (symbols, graph) = setup();
    graph.define_type("link", None);
    graph.define_type("road", Some("link"));
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    graph.insert_relation("road", &[("from", a), ("to", b)]);
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    assert_eq!(collect(&graph, &Query::new([link(&symbols, x, y)])).len(), 1);
}

#[test]
fn relation_variable_binds_the_fact() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    let fact = graph.insert_relation("link", &[("from", a), ("to", b)]);
    let (r, x, y) = (var(&symbols, "r"), var(&symbols, "x"), var(&symbols, "y"));
    let atom = Atom::relation_with_var(
        r,
        symbols.intern("link"),
        [
            RolePlayer::new(symbols.intern("from"), x),
            RolePlayer::new(symbols.intern("to"), y),
        ],
    );
    let answers = collect(&graph, &Query::new([atom]));
    assert_eq!(answers[0].get(r), Some(fact));
    assert_eq!(graph.type_of(fact), Some(symbols.intern("link")));
}

#[test]
fn role_variable_is_bound_to_the_role() {
    let (symbols, graph) = setup();
    let from = graph.define_type("from", None);
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    graph.insert_relation("link", &[("from", a), ("to", b)]);
    let (role, x) = (var(&symbols, "role"), var(&symbols, "x"));
    let atom = Atom::relation(symbols.intern("link"), [RolePlayer::with_role_var(role, x)]);

    let answers = collect(&graph, &Query::new([atom, Atom::id(x, a)]));
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].get(role), graph.schema_concept(from));
}

#[test]
fn conjunction_joins_on_shared_vars() {
    let (symbols, graph) = setup();
    let nodes: Vec<_> = (0..4).map(|_| graph.insert_entity("node")).collect();
    for w in nodes.windows(2) {
        graph.insert_relation("link", &[("from", w[0]), ("to", w[1])]);
    }
    let (x, y, z) = (var(&symbols, "x"), var(&symbols, "y"), var(&symbols, "z"));
    let two_hops = Query::new([link(&symbols, x, y), link(&symbols, y, z)]);
    assert_eq!(collect(&graph, &two_hops).len(), 2);
}

#[test]
fn predicates_filter_answers() {
    let (symbols, graph) = setup();
    let alice = graph.insert_entity("person");
    let bob = graph.insert_entity("person");
    let thirty = graph.insert_attribute("age", Value::Long(30));
    let forty = graph.insert_attribute("age", Value::Long(40));
    graph.insert_ownership(alice, thirty);
    graph.insert_ownership(bob, forty);
    let (p, age) = (var(&symbols, "p"), var(&symbols, "age"));
    let has_age = Atom::has(p, symbols.intern("age"), age);

    let older = Query::new([
        has_age.clone(),
        Atom::value(age, Comparator::Gt, Value::Long(35)),
    ]);
    let answers = collect(&graph, &older);
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].get(p), Some(bob));

    let pinned = Query::new([has_age, Atom::id(p, alice)]);
    assert_eq!(collect(&graph, &pinned)[0].get(age), Some(thirty));
}

#[test]
fn neq_predicate_is_checked() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    graph.insert_relation("link", &[("from", a), ("to", a)]);
    graph.insert_relation("link", &[("from", a), ("to", b)]);
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let query = Query::new([link(&symbols, x, y), Atom::neq(x, y)]);
    let answers = collect(&graph, &query);
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].get(y), Some(b));
}

#[test]
fn attributes_are_unique_per_value() {
    let (_, graph) = setup();
    let first = graph.insert_attribute("name", Value::Str("ada".into()));
    let second = graph.insert_attribute("name", Value::Str("ada".into()));
    assert_eq!(first, second);
    assert_eq!(graph.value_of(first), Some(Value::Str("ada".into())));
}

// ========== JOIN ORDER ==========

#[test]
fn oracle_starts_from_bound_atoms() {
    let (symbols, graph) = setup();
    let nodes: Vec<_> = (0..5).map(|_| graph.insert_entity("node")).collect();
    for w in nodes.windows(2) {
        graph.insert_relation("link", &[("from", w[0]), ("to", w[1])]);
    }
    let (x, y, z) = (var(&symbols, "x"), var(&symbols, "y"), var(&symbols, "z"));
    let first = link(&symbols, x, y);
    let second = link(&symbols, y, z);
    let order = graph.estimate_join_order(&[
        first.clone(),
        second.clone(),
        Atom::id(z, nodes[4]),
    ]);
    assert_eq!(order, vec![second, first]);
}

#[test]
fn oracle_skips_predicates() {
    let (symbols, graph) = setup();
    let x = var(&symbols, "x");
    let order = graph.estimate_join_order(&[Atom::isa(x, symbols.intern("node")), Atom::id(x, ConceptId::PLACEHOLDER)]);
    assert_eq!(order.len(), 1);
}

// ========== MATERIALISATION ==========

#[test]
fn materialize_relation_is_idempotent() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let atom = link(&symbols, x, y);
    let answer = Answer::from_pairs([(x, a), (y, b)]).unwrap();

    graph.materialize(&atom, &answer).unwrap();
    graph.materialize(&atom, &answer).unwrap();
    assert_eq!(graph.relation_count(), 1);
}

#[test]
fn materialize_binds_relation_variable() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let b = graph.insert_entity("node");
    let existing = graph.insert_relation("link", &[("from", a), ("to", b)]);
    let (r, x, y) = (var(&symbols, "r"), var(&symbols, "x"), var(&symbols, "y"));
    let atom = Atom::relation_with_var(
        r,
        symbols.intern("link"),
        [
            RolePlayer::new(symbols.intern("from"), x),
            RolePlayer::new(symbols.intern("to"), y),
        ],
    );
    let stored = graph
        .materialize(&atom, &Answer::from_pairs([(x, a), (y, b)]).unwrap())
        .unwrap();
    assert_eq!(stored.get(r), Some(existing));
    assert_eq!(graph.relation_count(), 1);
}

#[test]
fn materialize_requires_ground_atoms() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("node");
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let err = graph
        .materialize(&link(&symbols, x, y), &Answer::new().with(x, a).unwrap())
        .unwrap_err();
    assert_eq!(err, GraphError::NonGround("$y".into()));
}

#[test]
fn materialize_isa_and_has() {
    let (symbols, graph) = setup();
    let p = graph.insert_entity("person");
    let name = graph.insert_attribute("name", Value::Str("ada".into()));
    let (x, n) = (var(&symbols, "x"), var(&symbols, "n"));

    graph
        .materialize(&Atom::isa(x, symbols.intern("employee")), &Answer::new().with(x, p).unwrap())
        .unwrap();
    let employees = collect(&graph, &Query::new([Atom::isa(x, symbols.intern("employee"))]));
    assert_eq!(employees.len(), 1);

    let sub = Answer::from_pairs([(x, p), (n, name)]).unwrap();
    graph
        .materialize(&Atom::has(x, symbols.intern("name"), n), &sub)
        .unwrap();
    assert_eq!(graph.ownership_count(), 1);

    let err = graph
        .materialize(&Atom::has(x, symbols.intern("age"), n), &sub)
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownType(ref t) if t == "age"));
}

#[test]
fn predicates_cannot_be_materialised() {
    let (symbols, graph) = setup();
    let (x, y): (Var, Var) = (var(&symbols, "x"), var(&symbols, "y"));
    assert_eq!(
        graph.materialize(&Atom::neq(x, y), &Answer::new()),
        Err(GraphError::NotMaterialisable("inequality"))
    );
}

#[test]
fn rel_fixture_builds_labelled_relations() {
    let (symbols, graph) = setup();
    let a = graph.insert_entity("person");
    let b = graph.insert_entity("person");
    graph.insert_relation("friendship", &[("friend", a), ("friend", b)]);
    let (x, y) = (var(&symbols, "x"), var(&symbols, "y"));
    let query = Query::new([rel(&symbols, "friendship", &[("friend", x), ("friend", y)])]);
    assert_eq!(collect(&graph, &query).len(), 2);
}

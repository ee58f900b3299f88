use crate::atom::{Atom, RolePlayer, Var};
use crate::concept::ConceptId;
use crate::graph::MemoryGraph;
use crate::query::Query;
use crate::rule::{InferenceRule, RuleId, RuleRepository, RuleStore};
use crate::symbol::SymbolStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) fn setup() -> (Arc<SymbolStore>, Arc<MemoryGraph>) {
    let symbols = Arc::new(SymbolStore::new());
    let graph = Arc::new(MemoryGraph::new(Arc::clone(&symbols)));
    (symbols, graph)
}

pub(crate) fn var(symbols: &SymbolStore, name: &str) -> Var {
    Var::named(symbols, name)
}

/// `(role: $player, ...) isa ty`
pub(crate) fn rel(symbols: &SymbolStore, ty: &str, players: &[(&str, Var)]) -> Atom {
    Atom::relation(
        symbols.intern(ty),
        players
            .iter()
            .map(|(role, player)| RolePlayer::new(symbols.intern(role), *player)),
    )
}

/// `(from: $x, to: $y) isa link`
pub(crate) fn link(symbols: &SymbolStore, x: Var, y: Var) -> Atom {
    rel(symbols, "link", &[("from", x), ("to", y)])
}

/// A graph with `link` facts a->b->c and the transitivity rule.
pub(crate) struct Chain {
    pub symbols: Arc<SymbolStore>,
    pub graph: Arc<MemoryGraph>,
    pub rules: RuleStore,
    pub nodes: Vec<ConceptId>,
}

pub(crate) fn transitive_chain(len: usize) -> Chain {
    let (symbols, graph) = setup();
    graph.define_type("node", None);
    graph.define_type("link", None);
    graph.define_type("from", None);
    graph.define_type("to", None);
    let nodes: Vec<ConceptId> = (0..len).map(|_| graph.insert_entity("node")).collect();
    for pair in nodes.windows(2) {
        graph.insert_relation("link", &[("from", pair[0]), ("to", pair[1])]);
    }
    let mut rules = RuleStore::new();
    rules.add(transitivity(&symbols));
    Chain {
        symbols,
        graph,
        rules,
        nodes,
    }
}

/// `link(x, z), link(z, y) => link(x, y)`
pub(crate) fn transitivity(symbols: &SymbolStore) -> InferenceRule {
    let (x, y, z) = (var(symbols, "rx"), var(symbols, "ry"), var(symbols, "rz"));
    InferenceRule::new(
        "link-transitivity",
        Query::new([link(symbols, x, z), link(symbols, z, y)]),
        link(symbols, x, y),
    )
}

/// Rule repository that counts `rules_concluding` calls.
pub(crate) struct CountingRules {
    pub inner: RuleStore,
    pub calls: AtomicUsize,
}

impl CountingRules {
    pub fn new(inner: RuleStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RuleRepository for CountingRules {
    fn rules_concluding(&self, atom: &Atom) -> Vec<Arc<InferenceRule>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.rules_concluding(atom)
    }

    fn rule(&self, id: RuleId) -> Option<Arc<InferenceRule>> {
        self.inner.rule(id)
    }
}

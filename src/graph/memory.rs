use super::{AnswerStream, Graph, JoinOrderOracle, Schema};
use crate::answer::Answer;
use crate::atom::{role_assignments, Atom, Role, RolePlayer, Var};
use crate::concept::{ConceptId, Value};
use crate::error::GraphError;
use crate::query::Query;
use crate::symbol::{Label, SymbolStore};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::Arc;

/// In-memory graph with a type hierarchy, role hierarchy, relations,
/// attribute ownership and attribute values.
///
/// Types and roles are declared with [`define_type`](Self::define_type);
/// inserting an instance of an undeclared type declares it as a root type.
/// All methods take `&self`; the store sits behind a read-write lock so one
/// graph can serve concurrent sessions.
pub struct MemoryGraph {
    symbols: Arc<SymbolStore>,
    store: RwLock<Store>,
}

#[derive(Debug, Clone, Copy)]
struct TypeInfo {
    concept: ConceptId,
    sup: Option<Label>,
}

#[derive(Debug, Clone)]
struct RelationFact {
    id: ConceptId,
    ty: Label,
    players: SmallVec<[(Label, ConceptId); 4]>,
}

#[derive(Default)]
struct Store {
    next_id: u64,
    types: FxHashMap<Label, TypeInfo>,
    schema_labels: FxHashMap<ConceptId, Label>,
    instances: FxHashMap<ConceptId, SmallVec<[Label; 2]>>,
    values: FxHashMap<ConceptId, Value>,
    attributes: FxHashMap<(Label, Value), ConceptId>,
    relations: Vec<RelationFact>,
    relation_index: FxHashMap<ConceptId, usize>,
    ownerships: Vec<(ConceptId, ConceptId)>,
}

impl MemoryGraph {
    pub fn new(symbols: Arc<SymbolStore>) -> Self {
        Self {
            symbols,
            store: RwLock::new(Store::default()),
        }
    }

    pub fn symbols(&self) -> &Arc<SymbolStore> {
        &self.symbols
    }

    /// Declare a type or role, optionally as a subtype of `sup`.
    /// Redeclaring keeps the concept and replaces the supertype.
    pub fn define_type(&self, name: &str, sup: Option<&str>) -> Label {
        let label = self.symbols.intern(name);
        let sup = sup.map(|s| self.symbols.intern(s));
        let mut store = self.store.write();
        if let Some(s) = sup {
            store.declare(s);
        }
        store.declare(label);
        if let Some(info) = store.types.get_mut(&label) {
            info.sup = sup;
        }
        label
    }

    pub fn insert_entity(&self, ty: &str) -> ConceptId {
        let ty = self.symbols.intern(ty);
        let mut store = self.store.write();
        store.declare(ty);
        let id = store.fresh();
        store.instances.insert(id, SmallVec::from_slice(&[ty]));
        id
    }

    /// Insert an attribute. Attributes are unique per type and value.
    pub fn insert_attribute(&self, ty: &str, value: Value) -> ConceptId {
        let ty = self.symbols.intern(ty);
        let mut store = self.store.write();
        store.declare(ty);
        if let Some(&id) = store.attributes.get(&(ty, value.clone())) {
            return id;
        }
        let id = store.fresh();
        store.instances.insert(id, SmallVec::from_slice(&[ty]));
        store.values.insert(id, value.clone());
        store.attributes.insert((ty, value), id);
        id
    }

    pub fn insert_relation(&self, ty: &str, players: &[(&str, ConceptId)]) -> ConceptId {
        let ty = self.symbols.intern(ty);
        let players: SmallVec<[(Label, ConceptId); 4]> = players
            .iter()
            .map(|(role, player)| (self.symbols.intern(role), *player))
            .collect();
        let mut store = self.store.write();
        store.declare(ty);
        for (role, _) in players.iter() {
            store.declare(*role);
        }
        store.insert_relation(ty, players)
    }

    pub fn insert_ownership(&self, owner: ConceptId, attr: ConceptId) {
        let mut store = self.store.write();
        if !store.ownerships.contains(&(owner, attr)) {
            store.ownerships.push((owner, attr));
        }
    }

    pub fn relation_count(&self) -> usize {
        self.store.read().relations.len()
    }

    pub fn ownership_count(&self) -> usize {
        self.store.read().ownerships.len()
    }

    /// Most specific declared type of an instance.
    pub fn type_of(&self, concept: ConceptId) -> Option<Label> {
        self.store
            .read()
            .instances
            .get(&concept)
            .and_then(|types| types.first().copied())
    }

    pub fn value_of(&self, concept: ConceptId) -> Option<Value> {
        self.store.read().values.get(&concept).cloned()
    }

    /// The type or role label a schema concept stands for.
    pub fn label_of(&self, concept: ConceptId) -> Option<Label> {
        self.store.read().schema_labels.get(&concept).copied()
    }

    fn var_name(&self, var: Var) -> String {
        var.display(&self.symbols)
    }
}

impl Store {
    fn fresh(&mut self) -> ConceptId {
        let id = ConceptId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn declare(&mut self, label: Label) {
        if self.types.contains_key(&label) {
            return;
        }
        let concept = self.fresh();
        self.types.insert(label, TypeInfo { concept, sup: None });
        self.schema_labels.insert(concept, label);
    }

    fn is_subtype(&self, sub: Label, sup: Label) -> bool {
        let mut current = Some(sub);
        // a malformed hierarchy could loop; bound the walk by its size
        for _ in 0..=self.types.len() {
            match current {
                Some(t) if t == sup => return true,
                Some(t) => current = self.types.get(&t).and_then(|info| info.sup),
                None => return false,
            }
        }
        false
    }

    fn has_type(&self, concept: ConceptId, ty: Label) -> bool {
        self.instances
            .get(&concept)
            .map_or(false, |types| types.iter().any(|t| self.is_subtype(*t, ty)))
    }

    fn insert_relation(
        &mut self,
        ty: Label,
        mut players: SmallVec<[(Label, ConceptId); 4]>,
    ) -> ConceptId {
        players.sort_unstable();
        if let Some(existing) = self
            .relations
            .iter()
            .find(|r| r.ty == ty && r.players == players)
        {
            return existing.id;
        }
        let id = self.fresh();
        self.instances.insert(id, SmallVec::from_slice(&[ty]));
        self.relation_index.insert(id, self.relations.len());
        self.relations.push(RelationFact { id, ty, players });
        id
    }

    fn cardinality(&self, atom: &Atom) -> usize {
        match atom {
            Atom::Relation { ty, .. } => self
                .relations
                .iter()
                .filter(|r| self.is_subtype(r.ty, *ty))
                .count(),
            Atom::Isa { ty, .. } => self
                .instances
                .values()
                .filter(|types| types.iter().any(|t| self.is_subtype(*t, *ty)))
                .count(),
            Atom::Has { ty, .. } => self
                .ownerships
                .iter()
                .filter(|(_, attr)| self.has_type(*attr, *ty))
                .count(),
            _ => 0,
        }
    }

    /// Every extension of `partial` that satisfies `atom`.
    fn extend(&self, atom: &Atom, partial: &Answer, out: &mut Vec<Answer>) {
        match atom {
            Atom::Isa { var, ty } => match partial.get(*var) {
                Some(c) => {
                    if self.has_type(c, *ty) {
                        out.push(partial.clone());
                    }
                }
                None => {
                    for (&c, types) in self.instances.iter() {
                        if types.iter().any(|t| self.is_subtype(*t, *ty)) {
                            out.extend(partial.with(*var, c));
                        }
                    }
                }
            },
            Atom::Has { owner, ty, attr } => {
                for &(o, a) in self.ownerships.iter() {
                    if !self.has_type(a, *ty) {
                        continue;
                    }
                    if let Some(next) = partial.with(*owner, o).and_then(|p| p.with(*attr, a)) {
                        out.push(next);
                    }
                }
            }
            Atom::Relation { var, ty, roles } => {
                for fact in self.relations.iter() {
                    if !self.is_subtype(fact.ty, *ty) {
                        continue;
                    }
                    let base = match var {
                        Some(v) => match partial.with(*v, fact.id) {
                            Some(p) => p,
                            None => continue,
                        },
                        None => partial.clone(),
                    };
                    let compatible = |rp: &RolePlayer, player: &(Label, ConceptId)| {
                        self.role_compatible(rp, *player, &base)
                    };
                    for assignment in role_assignments(roles, &fact.players, compatible) {
                        if let Some(answer) = self.bind_players(roles, &fact.players, &assignment, &base) {
                            out.push(answer);
                        }
                    }
                }
            }
            Atom::Id { .. } | Atom::Value { .. } | Atom::Neq { .. } => {
                if self.satisfies(atom, partial) {
                    out.push(partial.clone());
                }
            }
        }
    }

    fn role_compatible(&self, rp: &RolePlayer, (role, player): (Label, ConceptId), partial: &Answer) -> bool {
        if partial.get(rp.player).map_or(false, |c| c != player) {
            return false;
        }
        match rp.role {
            Role::Label(l) => self.is_subtype(role, l),
            Role::Var(v) => match partial.get(v) {
                Some(c) => self
                    .schema_labels
                    .get(&c)
                    .map_or(false, |l| self.is_subtype(role, *l)),
                None => true,
            },
        }
    }

    fn bind_players(
        &self,
        roles: &[RolePlayer],
        players: &[(Label, ConceptId)],
        assignment: &[usize],
        base: &Answer,
    ) -> Option<Answer> {
        let mut answer = base.clone();
        for (rp, &j) in roles.iter().zip(assignment.iter()) {
            let (role, player) = players[j];
            answer = answer.with(rp.player, player)?;
            if let Role::Var(v) = rp.role {
                if !answer.contains(v) {
                    answer = answer.with(v, self.types.get(&role)?.concept)?;
                }
            }
        }
        Some(answer)
    }

    fn satisfies(&self, predicate: &Atom, answer: &Answer) -> bool {
        match predicate {
            Atom::Id { var, concept } => {
                concept.is_placeholder() || answer.get(*var) == Some(*concept)
            }
            Atom::Value { var, cmp, value } => answer
                .get(*var)
                .and_then(|c| self.values.get(&c))
                .map_or(false, |v| cmp.test(v, value)),
            Atom::Neq { left, right } => match (answer.get(*left), answer.get(*right)) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            },
            _ => true,
        }
    }

    fn order(&self, conjunction: &[Atom]) -> Vec<Atom> {
        let mut bound: FxHashSet<Var> = conjunction
            .iter()
            .filter_map(|a| match a {
                Atom::Id { var, .. } => Some(*var),
                _ => None,
            })
            .collect();
        let mut remaining: Vec<&Atom> = conjunction.iter().filter(|a| a.is_selectable()).collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let cost = |atom: &Atom| {
                let vars = atom.vars();
                let bound_count = vars.iter().filter(|v| bound.contains(v)).count();
                let disconnected = !bound.is_empty() && bound_count == 0;
                (disconnected, self.cardinality(atom) / (1 + 4 * bound_count))
            };
            let best = remaining
                .iter()
                .enumerate()
                .min_by_key(|&(i, atom)| (cost(*atom), i))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let atom = remaining.remove(best);
            bound.extend(atom.vars());
            ordered.push(atom.clone());
        }
        ordered
    }
}

impl Schema for MemoryGraph {
    fn is_subtype(&self, sub: Label, sup: Label) -> bool {
        sub == sup || self.store.read().is_subtype(sub, sup)
    }

    fn schema_concept(&self, label: Label) -> Option<ConceptId> {
        self.store.read().types.get(&label).map(|info| info.concept)
    }

    fn role_hierarchy(&self, role: ConceptId) -> Vec<ConceptId> {
        let store = self.store.read();
        let mut out = vec![role];
        let mut current = store.schema_labels.get(&role).copied();
        while let Some(label) = current {
            current = store.types.get(&label).and_then(|info| info.sup);
            if let Some(sup) = current.and_then(|s| store.types.get(&s)) {
                if out.contains(&sup.concept) {
                    break;
                }
                out.push(sup.concept);
            }
        }
        out
    }
}

impl JoinOrderOracle for MemoryGraph {
    fn estimate_join_order(&self, conjunction: &[Atom]) -> Vec<Atom> {
        self.store.read().order(conjunction)
    }
}

impl Graph for MemoryGraph {
    fn match_conjunction(&self, query: &Query) -> AnswerStream {
        let store = self.store.read();
        let predicates: Vec<&Atom> = query.predicates().collect();
        let mut partials = vec![query.substitution()];
        for atom in store.order(query.atoms()) {
            let mut next = Vec::new();
            for partial in partials.iter() {
                store.extend(&atom, partial, &mut next);
            }
            partials = next;
            if partials.is_empty() {
                break;
            }
        }
        let answers: Vec<Result<Answer, GraphError>> = partials
            .into_iter()
            .filter(|a| predicates.iter().all(|p| store.satisfies(p, a)))
            .map(Ok)
            .collect();
        Box::new(answers.into_iter())
    }

    fn materialize(&self, atom: &Atom, answer: &Answer) -> Result<Answer, GraphError> {
        let bound = |v: Var| {
            answer
                .get(v)
                .ok_or_else(|| GraphError::NonGround(self.var_name(v)))
        };
        match atom {
            Atom::Relation { var, ty, roles } => {
                if let Some(existing) = var.and_then(|v| answer.get(v)) {
                    return if self.store.read().relation_index.contains_key(&existing) {
                        Ok(answer.clone())
                    } else {
                        Err(GraphError::UnknownConcept(existing.raw()))
                    };
                }
                let mut store = self.store.write();
                let mut players: SmallVec<[(Label, ConceptId); 4]> = SmallVec::new();
                for rp in roles.iter() {
                    let role = match rp.role {
                        Role::Label(l) => l,
                        Role::Var(v) => {
                            let c = bound(v)?;
                            *store
                                .schema_labels
                                .get(&c)
                                .ok_or(GraphError::UnknownConcept(c.raw()))?
                        }
                    };
                    players.push((role, bound(rp.player)?));
                }
                store.declare(*ty);
                let id = store.insert_relation(*ty, players);
                match var {
                    Some(v) => answer
                        .with(*v, id)
                        .ok_or_else(|| GraphError::Storage("relation variable already bound".into())),
                    None => Ok(answer.clone()),
                }
            }
            Atom::Isa { var, ty } => {
                let c = bound(*var)?;
                let mut store = self.store.write();
                store.declare(*ty);
                if !store.has_type(c, *ty) {
                    store.instances.entry(c).or_default().push(*ty);
                }
                Ok(answer.clone())
            }
            Atom::Has { owner, attr, ty } => {
                let (o, a) = (bound(*owner)?, bound(*attr)?);
                let mut store = self.store.write();
                if !store.has_type(a, *ty) {
                    let name = self
                        .symbols
                        .resolve(*ty)
                        .map(str::to_owned)
                        .unwrap_or_default();
                    return Err(GraphError::UnknownType(name));
                }
                if !store.ownerships.contains(&(o, a)) {
                    store.ownerships.push((o, a));
                }
                Ok(answer.clone())
            }
            Atom::Id { .. } => Err(GraphError::NotMaterialisable("id")),
            Atom::Value { .. } => Err(GraphError::NotMaterialisable("value")),
            Atom::Neq { .. } => Err(GraphError::NotMaterialisable("inequality")),
        }
    }
}

//! Atoms - single predicate occurrences in a query.
//!
//! Selectable atoms (relations, type checks, attribute ownership) are what
//! gets matched and resolved. Predicates (id bindings, value comparisons and
//! inequalities) constrain the variables of selectable atoms.

use crate::concept::{Comparator, ConceptId, Value};
use crate::graph::Schema;
use crate::symbol::{Label, SymbolStore};
use crate::unifier::{HeadUnifier, MultiUnifier, Unifier};
use lasso::Key;
use smallvec::SmallVec;
use std::fmt;

/// A query variable.
///
/// Variables are interned names. Names starting with `_` are anonymous:
/// they take part in matching but are left out of default answer projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    name: Label,
    anonymous: bool,
}

impl Var {
    /// Intern a variable name. A leading `$` is ignored.
    pub fn named(symbols: &SymbolStore, name: &str) -> Var {
        let name = name.strip_prefix('$').unwrap_or(name);
        Var {
            name: symbols.intern(name),
            anonymous: name.starts_with('_'),
        }
    }

    pub fn label(self) -> Label {
        self.name
    }

    pub fn is_anonymous(self) -> bool {
        self.anonymous
    }

    /// Human readable name, falling back to the interned index.
    pub fn display(self, symbols: &SymbolStore) -> String {
        match symbols.resolve(self.name) {
            Some(name) => format!("${}", name),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$v{}", self.name.into_usize())
    }
}

/// The role a player plays in a relation: an explicit role label, or a role
/// variable that may stand for any role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Label(Label),
    Var(Var),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RolePlayer {
    pub role: Role,
    pub player: Var,
}

impl RolePlayer {
    pub fn new(role: Label, player: Var) -> Self {
        Self {
            role: Role::Label(role),
            player,
        }
    }

    pub fn with_role_var(role: Var, player: Var) -> Self {
        Self {
            role: Role::Var(role),
            player,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    /// `$var (role: $player, ...) isa ty`
    Relation {
        var: Option<Var>,
        ty: Label,
        roles: SmallVec<[RolePlayer; 4]>,
    },
    /// `$var isa ty`
    Isa { var: Var, ty: Label },
    /// `$owner has ty $attr`
    Has { owner: Var, ty: Label, attr: Var },
    /// `$var id concept`
    Id { var: Var, concept: ConceptId },
    /// `$var <cmp> value`
    Value {
        var: Var,
        cmp: Comparator,
        value: Value,
    },
    /// `$left != $right`
    Neq { left: Var, right: Var },
}

impl Atom {
    pub fn relation(ty: Label, roles: impl IntoIterator<Item = RolePlayer>) -> Atom {
        Atom::Relation {
            var: None,
            ty,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn relation_with_var(
        var: Var,
        ty: Label,
        roles: impl IntoIterator<Item = RolePlayer>,
    ) -> Atom {
        Atom::Relation {
            var: Some(var),
            ty,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn isa(var: Var, ty: Label) -> Atom {
        Atom::Isa { var, ty }
    }

    pub fn has(owner: Var, ty: Label, attr: Var) -> Atom {
        Atom::Has { owner, ty, attr }
    }

    pub fn id(var: Var, concept: ConceptId) -> Atom {
        Atom::Id { var, concept }
    }

    pub fn value(var: Var, cmp: Comparator, value: Value) -> Atom {
        Atom::Value { var, cmp, value }
    }

    pub fn neq(left: Var, right: Var) -> Atom {
        Atom::Neq { left, right }
    }

    /// Selectable atoms are matched and resolved; the rest are predicates.
    pub fn is_selectable(&self) -> bool {
        matches!(
            self,
            Atom::Relation { .. } | Atom::Isa { .. } | Atom::Has { .. }
        )
    }

    pub fn is_predicate(&self) -> bool {
        !self.is_selectable()
    }

    /// The schema type this atom concludes or checks.
    pub fn type_label(&self) -> Option<Label> {
        match self {
            Atom::Relation { ty, .. } | Atom::Isa { ty, .. } | Atom::Has { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// All variables in order of first occurrence, without duplicates.
    pub fn vars(&self) -> SmallVec<[Var; 8]> {
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        let mut push = |v: Var| {
            if !vars.contains(&v) {
                vars.push(v);
            }
        };
        match self {
            Atom::Relation { var, roles, .. } => {
                if let Some(v) = var {
                    push(*v);
                }
                for rp in roles.iter() {
                    if let Role::Var(rv) = rp.role {
                        push(rv);
                    }
                    push(rp.player);
                }
            }
            Atom::Isa { var, .. } | Atom::Id { var, .. } | Atom::Value { var, .. } => push(*var),
            Atom::Has { owner, attr, .. } => {
                push(*owner);
                push(*attr);
            }
            Atom::Neq { left, right } => {
                push(*left);
                push(*right);
            }
        }
        vars
    }

    pub fn has_var(&self, var: Var) -> bool {
        self.vars().contains(&var)
    }

    /// Role variables of a relation atom.
    pub fn role_vars(&self) -> SmallVec<[Var; 2]> {
        match self {
            Atom::Relation { roles, .. } => roles
                .iter()
                .filter_map(|rp| match rp.role {
                    Role::Var(v) => Some(v),
                    Role::Label(_) => None,
                })
                .collect(),
            _ => SmallVec::new(),
        }
    }

    /// Rename every variable.
    pub fn rename(&self, mut f: impl FnMut(Var) -> Var) -> Atom {
        match self {
            Atom::Relation { var, ty, roles } => Atom::Relation {
                var: var.map(&mut f),
                ty: *ty,
                roles: roles
                    .iter()
                    .map(|rp| RolePlayer {
                        role: match rp.role {
                            Role::Var(v) => Role::Var(f(v)),
                            label => label,
                        },
                        player: f(rp.player),
                    })
                    .collect(),
            },
            Atom::Isa { var, ty } => Atom::Isa { var: f(*var), ty: *ty },
            Atom::Has { owner, ty, attr } => Atom::Has {
                owner: f(*owner),
                ty: *ty,
                attr: f(*attr),
            },
            Atom::Id { var, concept } => Atom::Id {
                var: f(*var),
                concept: *concept,
            },
            Atom::Value { var, cmp, value } => Atom::Value {
                var: f(*var),
                cmp: *cmp,
                value: value.clone(),
            },
            Atom::Neq { left, right } => Atom::Neq {
                left: f(*left),
                right: f(*right),
            },
        }
    }

    /// Unify this (query) atom with a rule head.
    ///
    /// Every returned unifier maps head variables to this atom's variables.
    /// The head must conclude a subtype of this atom's type, and every role
    /// player of this atom must be matched by a distinct head role player
    /// whose role is the same as, or a subrole of, the queried role. An
    /// empty result means the head does not apply.
    pub fn unify_with_head<S: Schema + ?Sized>(&self, head: &Atom, schema: &S) -> MultiUnifier {
        match (self, head) {
            (
                Atom::Relation {
                    var: q_var,
                    ty: q_ty,
                    roles: q_roles,
                },
                Atom::Relation {
                    var: h_var,
                    ty: h_ty,
                    roles: h_roles,
                },
            ) => {
                if !schema.is_subtype(*h_ty, *q_ty) {
                    return MultiUnifier::new();
                }
                let compatible = |q: &RolePlayer, h: &RolePlayer| match (q.role, h.role) {
                    (Role::Label(ql), Role::Label(hl)) => schema.is_subtype(hl, ql),
                    (Role::Var(_), _) => true,
                    (Role::Label(_), Role::Var(_)) => false,
                };
                role_assignments(q_roles, h_roles, compatible)
                    .into_iter()
                    .map(|assignment| {
                        let mut pairs: SmallVec<[(Var, Var); 4]> = SmallVec::new();
                        let mut role_bindings = SmallVec::new();
                        if let (Some(qv), Some(hv)) = (q_var, h_var) {
                            pairs.push((*hv, *qv));
                        }
                        for (qi, &hi) in assignment.iter().enumerate() {
                            let (q, h) = (&q_roles[qi], &h_roles[hi]);
                            pairs.push((h.player, q.player));
                            match (q.role, h.role) {
                                (Role::Var(qr), Role::Var(hr)) => pairs.push((hr, qr)),
                                (Role::Var(qr), Role::Label(hl)) => role_bindings.push((qr, hl)),
                                _ => {}
                            }
                        }
                        HeadUnifier {
                            unifier: Unifier::from_pairs(pairs),
                            role_bindings,
                        }
                    })
                    .collect()
            }
            (Atom::Isa { var: qv, ty: q_ty }, Atom::Isa { var: hv, ty: h_ty }) => {
                if schema.is_subtype(*h_ty, *q_ty) {
                    std::iter::once(HeadUnifier::new(Unifier::from_pairs([(*hv, *qv)]))).collect()
                } else {
                    MultiUnifier::new()
                }
            }
            (
                Atom::Has {
                    owner: qo,
                    ty: q_ty,
                    attr: qa,
                },
                Atom::Has {
                    owner: ho,
                    ty: h_ty,
                    attr: ha,
                },
            ) => {
                if schema.is_subtype(*h_ty, *q_ty) {
                    std::iter::once(HeadUnifier::new(Unifier::from_pairs([
                        (*ho, *qo),
                        (*ha, *qa),
                    ])))
                    .collect()
                } else {
                    MultiUnifier::new()
                }
            }
            _ => MultiUnifier::new(),
        }
    }
}

/// Enumerate injective assignments of `query` role players to `candidates`.
///
/// Each assignment lists, for every query role player in order, the index of
/// the candidate it is matched with. Uses an explicit backtracking stack.
pub(crate) fn role_assignments<Q, C>(
    query: &[Q],
    candidates: &[C],
    compatible: impl Fn(&Q, &C) -> bool,
) -> Vec<SmallVec<[usize; 4]>> {
    let mut out = Vec::new();
    if query.len() > candidates.len() {
        return out;
    }
    let mut chosen: SmallVec<[usize; 4]> = SmallVec::new();
    let mut used = vec![false; candidates.len()];
    let mut next = 0usize;
    loop {
        let pos = chosen.len();
        if pos == query.len() {
            out.push(chosen.clone());
            match chosen.pop() {
                Some(j) => {
                    used[j] = false;
                    next = j + 1;
                }
                None => break,
            }
            continue;
        }
        let found = (next..candidates.len())
            .find(|&j| !used[j] && compatible(&query[pos], &candidates[j]));
        match found {
            Some(j) => {
                used[j] = true;
                chosen.push(j);
                next = 0;
            }
            None => match chosen.pop() {
                Some(j) => {
                    used[j] = false;
                    next = j + 1;
                }
                None => break,
            },
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/atom.rs"]
mod tests;

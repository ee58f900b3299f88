//! Canonical keys for atomic queries.
//!
//! Two atomic queries are alpha-equivalent when they are identical up to a
//! renaming of variables and a reordering of role players. The key is a
//! complete token encoding of the query with variables numbered by first
//! occurrence, minimised over the role-player orders that keep roles sorted.
//! Equal keys therefore mean equivalent queries, never just a hash collision,
//! and the canonical variable order gives the unifier between any two
//! members of a class positionally.

use crate::atom::{Atom, Role, RolePlayer, Var};
use crate::concept::{Comparator, ConceptId, Value};
use crate::symbol::Label;
use crate::unifier::Unifier;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Token {
    Relation,
    Isa,
    Has,
    Label(Label),
    NoVar,
    Var(u32),
    RoleVar(u32),
    Id(u32, ConceptId),
    Value(u32, Comparator, Value),
    Neq(u32, u32),
}

/// Canonical key of an atomic query's equivalence class.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomicKey(Arc<[Token]>);

impl fmt::Debug for AtomicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomicKey({} tokens)", self.0.len())
    }
}

impl fmt::Display for AtomicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                Token::Relation => f.write_str("rel")?,
                Token::Isa => f.write_str("isa")?,
                Token::Has => f.write_str("has")?,
                Token::Label(l) => write!(f, "L{}", lasso::Key::into_usize(*l))?,
                Token::NoVar => f.write_str("_")?,
                Token::Var(i) => write!(f, "v{}", i)?,
                Token::RoleVar(i) => write!(f, "r{}", i)?,
                Token::Id(i, c) => write!(f, "v{}={}", i, c)?,
                Token::Value(i, cmp, v) => write!(f, "v{}{}{}", i, cmp, v)?,
                Token::Neq(a, b) => write!(f, "v{}!=v{}", a, b)?,
            }
        }
        Ok(())
    }
}

/// A key together with the variable order it was built with:
/// `order[i]` is the variable numbered `i`.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub key: AtomicKey,
    pub order: SmallVec<[Var; 8]>,
}

impl Canonical {
    /// Build the canonical form of `atom` constrained by `predicates`.
    ///
    /// Predicates over variables outside the atom are ignored. When the
    /// number of role-player orders exceeds `max_permutations`, the order is
    /// derived from refined variable colours instead of enumerated.
    pub fn of(atom: &Atom, predicates: &[Atom], max_permutations: usize) -> Canonical {
        match atom {
            Atom::Relation { roles, .. } if roles.len() > 1 => {
                let mut sorted: SmallVec<[RolePlayer; 4]> = roles.clone();
                sorted.sort_by_key(role_class);
                let groups = group_bounds(&sorted);
                let combos: usize = groups
                    .iter()
                    .map(|&(s, e)| factorial(e - s))
                    .try_fold(1usize, |acc, n| acc.checked_mul(n))
                    .unwrap_or(usize::MAX);
                if combos <= 1 {
                    return encode(atom, &sorted, predicates);
                }
                if combos > max_permutations {
                    let shape = Shape::new(atom, &sorted, predicates);
                    return shape.canonical(atom, &sorted, predicates);
                }
                let mut best: Option<Canonical> = None;
                for order in group_orders(&sorted, &groups) {
                    let candidate = encode(atom, &order, predicates);
                    best = match best {
                        Some(b) if b.key <= candidate.key => Some(b),
                        _ => Some(candidate),
                    };
                }
                best.unwrap_or_else(|| encode(atom, &sorted, predicates))
            }
            Atom::Relation { roles, .. } => encode(atom, roles, predicates),
            _ => encode(atom, &[], predicates),
        }
    }

    /// Unifier translating this query's variables into `other`'s.
    /// None when the two are not equivalent.
    pub fn unifier_to(&self, other: &Canonical) -> Option<Unifier> {
        if self.key != other.key || self.order.len() != other.order.len() {
            return None;
        }
        Some(Unifier::from_pairs(
            self.order
                .iter()
                .copied()
                .zip(other.order.iter().copied()),
        ))
    }
}

fn role_class(rp: &RolePlayer) -> (u8, Option<Label>) {
    match rp.role {
        Role::Label(l) => (0, Some(l)),
        Role::Var(_) => (1, None),
    }
}

fn group_bounds(sorted: &[RolePlayer]) -> SmallVec<[(usize, usize); 4]> {
    let mut groups = SmallVec::new();
    let mut start = 0;
    for i in 1..=sorted.len() {
        if i == sorted.len() || role_class(&sorted[i]) != role_class(&sorted[start]) {
            groups.push((start, i));
            start = i;
        }
    }
    groups
}

fn factorial(n: usize) -> usize {
    (1..=n).try_fold(1usize, |acc, k| acc.checked_mul(k)).unwrap_or(usize::MAX)
}

/// Lexicographic next permutation in place. Returns false after the last one.
fn next_permutation(p: &mut [usize]) -> bool {
    if p.len() < 2 {
        return false;
    }
    let mut i = p.len() - 1;
    while i > 0 && p[i - 1] >= p[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = p.len() - 1;
    while p[j] <= p[i - 1] {
        j -= 1;
    }
    p.swap(i - 1, j);
    p[i..].reverse();
    true
}

/// Every role-player order obtained by permuting within each role group.
fn group_orders(
    sorted: &[RolePlayer],
    groups: &[(usize, usize)],
) -> Vec<SmallVec<[RolePlayer; 4]>> {
    let mut perms: Vec<Vec<usize>> = groups.iter().map(|&(s, e)| (s..e).collect()).collect();
    let mut out = Vec::new();
    loop {
        out.push(
            perms
                .iter()
                .flat_map(|p| p.iter().map(|&i| sorted[i]))
                .collect(),
        );
        // odometer over the per-group permutations
        let mut g = 0;
        loop {
            if g == perms.len() {
                return out;
            }
            if next_permutation(&mut perms[g]) {
                break;
            }
            perms[g].sort_unstable();
            g += 1;
        }
    }
}

/// Variable structure of a relation atom, used to order role players without
/// enumerating every permutation.
///
/// Each variable starts with a colour drawn from what the query states about
/// it, which is refined over role pairings and inequalities until stable.
/// Remaining ties are split by trying each tied variable first in turn;
/// variables whose exchange leaves the query unchanged are tried once.
struct Shape {
    vars: SmallVec<[Var; 8]>,
    base: Vec<BaseColour>,
    neq: Vec<SmallVec<[usize; 4]>>,
    // (partner is the role side, partner)
    pairs: Vec<SmallVec<[(bool, usize); 2]>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
struct BaseColour {
    relation_var: bool,
    played: SmallVec<[(u8, Option<Label>); 2]>,
    role_uses: u32,
    self_neq: bool,
    ids: SmallVec<[ConceptId; 1]>,
    values: SmallVec<[(Comparator, Value); 1]>,
}

fn slot(vars: &mut SmallVec<[Var; 8]>, v: Var) -> usize {
    match vars.iter().position(|&o| o == v) {
        Some(i) => i,
        None => {
            vars.push(v);
            vars.len() - 1
        }
    }
}

/// Dense ranks of `sigs`, ordered by signature.
fn ranks<T: Ord + Clone>(sigs: &[T]) -> Vec<u32> {
    let mut distinct = sigs.to_vec();
    distinct.sort();
    distinct.dedup();
    sigs.iter()
        .map(|s| distinct.binary_search(s).unwrap_or(0) as u32)
        .collect()
}

fn distinct_count(colours: &[u32]) -> usize {
    let mut seen: SmallVec<[u32; 8]> = colours.iter().copied().collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

impl Shape {
    fn new(atom: &Atom, roles: &[RolePlayer], predicates: &[Atom]) -> Shape {
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        let mut base: Vec<BaseColour> = Vec::new();
        let mut pairs: Vec<SmallVec<[(bool, usize); 2]>> = Vec::new();
        let grow = |vars: &mut SmallVec<[Var; 8]>,
                    base: &mut Vec<BaseColour>,
                    pairs: &mut Vec<SmallVec<[(bool, usize); 2]>>,
                    v: Var| {
            let i = slot(vars, v);
            if base.len() < vars.len() {
                base.push(BaseColour::default());
                pairs.push(SmallVec::new());
            }
            i
        };

        if let Atom::Relation { var: Some(v), .. } = atom {
            let i = grow(&mut vars, &mut base, &mut pairs, *v);
            base[i].relation_var = true;
        }
        for rp in roles {
            let p = grow(&mut vars, &mut base, &mut pairs, rp.player);
            base[p].played.push(role_class(rp));
            if let Role::Var(r) = rp.role {
                let r = grow(&mut vars, &mut base, &mut pairs, r);
                base[r].role_uses += 1;
                pairs[r].push((false, p));
                pairs[p].push((true, r));
            }
        }

        let mut neq: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); vars.len()];
        let index = |v: Var| vars.iter().position(|&o| o == v);
        for p in predicates {
            match p {
                Atom::Id { var, concept } => {
                    if let Some(i) = index(*var) {
                        base[i].ids.push(*concept);
                    }
                }
                Atom::Value { var, cmp, value } => {
                    if let Some(i) = index(*var) {
                        base[i].values.push((*cmp, value.clone()));
                    }
                }
                Atom::Neq { left, right } => {
                    if let (Some(a), Some(b)) = (index(*left), index(*right)) {
                        if a == b {
                            base[a].self_neq = true;
                        } else if !neq[a].contains(&b) {
                            neq[a].push(b);
                            neq[b].push(a);
                        }
                    }
                }
                _ => {}
            }
        }
        for colour in &mut base {
            colour.played.sort();
            colour.ids.sort();
            colour.ids.dedup();
            colour.values.sort();
            colour.values.dedup();
        }
        for partners in &mut pairs {
            partners.sort();
        }

        Shape {
            vars,
            base,
            neq,
            pairs,
        }
    }

    fn canonical(&self, atom: &Atom, roles: &[RolePlayer], predicates: &[Atom]) -> Canonical {
        let colours = self.refine(ranks(&self.base));
        let mut best: Option<Canonical> = None;
        self.search(colours, atom, roles, predicates, &mut best);
        best.unwrap_or_else(|| encode(atom, roles, predicates))
    }

    /// Refine colours by neighbour colours until the partition is stable.
    fn refine(&self, mut colours: Vec<u32>) -> Vec<u32> {
        loop {
            let sigs: Vec<_> = (0..self.vars.len())
                .map(|i| {
                    let mut neq: SmallVec<[u32; 4]> =
                        self.neq[i].iter().map(|&j| colours[j]).collect();
                    neq.sort_unstable();
                    let mut pairs: SmallVec<[(bool, u32); 2]> = self.pairs[i]
                        .iter()
                        .map(|&(side, j)| (side, colours[j]))
                        .collect();
                    pairs.sort_unstable();
                    (colours[i], neq, pairs)
                })
                .collect();
            let next = ranks(&sigs);
            if distinct_count(&next) == distinct_count(&colours) {
                return next;
            }
            colours = next;
        }
    }

    fn search(
        &self,
        colours: Vec<u32>,
        atom: &Atom,
        roles: &[RolePlayer],
        predicates: &[Atom],
        best: &mut Option<Canonical>,
    ) {
        let tied = (0..self.vars.len() as u32)
            .find(|&c| colours.iter().filter(|&&k| k == c).count() > 1);
        let Some(cell) = tied else {
            let candidate = encode(atom, &self.arrange(roles, &colours), predicates);
            if best.as_ref().map_or(true, |b| candidate.key < b.key) {
                *best = Some(candidate);
            }
            return;
        };

        let mut tried: SmallVec<[usize; 8]> = SmallVec::new();
        for m in (0..self.vars.len()).filter(|&i| colours[i] == cell) {
            if tried.iter().any(|&t| self.interchangeable(t, m)) {
                continue;
            }
            tried.push(m);
            let split: Vec<(u32, bool)> = colours
                .iter()
                .enumerate()
                .map(|(i, &k)| (k, i != m))
                .collect();
            self.search(self.refine(ranks(&split)), atom, roles, predicates, best);
        }
    }

    /// True when exchanging `u` and `w` maps the query onto itself.
    fn interchangeable(&self, u: usize, w: usize) -> bool {
        let swap = |i: usize| match i {
            i if i == u => w,
            i if i == w => u,
            i => i,
        };
        if self.base[u] != self.base[w] {
            return false;
        }
        let mut neq: SmallVec<[usize; 4]> = self.neq[u].iter().map(|&i| swap(i)).collect();
        let mut theirs = self.neq[w].clone();
        neq.sort_unstable();
        theirs.sort_unstable();
        if neq != theirs {
            return false;
        }
        let mut pairs: SmallVec<[(bool, usize); 2]> =
            self.pairs[u].iter().map(|&(s, i)| (s, swap(i))).collect();
        pairs.sort_unstable();
        pairs == self.pairs[w]
    }

    /// Role players ordered by role class, then by the colours of their variables.
    fn arrange(&self, roles: &[RolePlayer], colours: &[u32]) -> SmallVec<[RolePlayer; 4]> {
        let colour = |v: Var| {
            self.vars
                .iter()
                .position(|&o| o == v)
                .map_or(0, |i| colours[i])
        };
        let mut order: SmallVec<[RolePlayer; 4]> = roles.iter().copied().collect();
        order.sort_by_key(|rp| {
            let role = match rp.role {
                Role::Var(r) => colour(r),
                Role::Label(_) => 0,
            };
            (role_class(rp), role, colour(rp.player))
        });
        order
    }
}

fn encode(atom: &Atom, roles: &[RolePlayer], predicates: &[Atom]) -> Canonical {
    fn index(v: Var, order: &mut SmallVec<[Var; 8]>) -> u32 {
        match order.iter().position(|&o| o == v) {
            Some(i) => i as u32,
            None => {
                order.push(v);
                (order.len() - 1) as u32
            }
        }
    }

    let mut order: SmallVec<[Var; 8]> = SmallVec::new();

    let mut tokens: Vec<Token> = Vec::with_capacity(4 + roles.len() * 2 + predicates.len());
    match atom {
        Atom::Relation { var, ty, .. } => {
            tokens.push(Token::Relation);
            tokens.push(Token::Label(*ty));
            tokens.push(match var {
                Some(v) => Token::Var(index(*v, &mut order)),
                None => Token::NoVar,
            });
            for rp in roles {
                tokens.push(match rp.role {
                    Role::Label(l) => Token::Label(l),
                    Role::Var(v) => Token::RoleVar(index(v, &mut order)),
                });
                tokens.push(Token::Var(index(rp.player, &mut order)));
            }
        }
        Atom::Isa { var, ty } => {
            tokens.push(Token::Isa);
            tokens.push(Token::Label(*ty));
            tokens.push(Token::Var(index(*var, &mut order)));
        }
        Atom::Has { owner, ty, attr } => {
            tokens.push(Token::Has);
            tokens.push(Token::Label(*ty));
            tokens.push(Token::Var(index(*owner, &mut order)));
            tokens.push(Token::Var(index(*attr, &mut order)));
        }
        _ => {
            for v in atom.vars() {
                tokens.push(Token::Var(index(v, &mut order)));
            }
        }
    }

    let position = |v: Var| order.iter().position(|&o| o == v).map(|i| i as u32);
    let mut constraints: Vec<Token> = predicates
        .iter()
        .filter_map(|p| match p {
            Atom::Id { var, concept } => Some(Token::Id(position(*var)?, *concept)),
            Atom::Value { var, cmp, value } => {
                Some(Token::Value(position(*var)?, *cmp, value.clone()))
            }
            Atom::Neq { left, right } => {
                let (a, b) = (position(*left)?, position(*right)?);
                Some(Token::Neq(a.min(b), a.max(b)))
            }
            _ => None,
        })
        .collect();
    constraints.sort();
    constraints.dedup();
    tokens.extend(constraints);

    Canonical {
        key: AtomicKey(tokens.into()),
        order,
    }
}

#[cfg(test)]
#[path = "tests/key.rs"]
mod tests;

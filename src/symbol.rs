use lasso::{Spur, ThreadedRodeo};

/// An interned schema label (type or role name) or variable name.
pub type Label = Spur;

/// Interner shared by the schema, the rules and the queries of one knowledge base.
///
/// Interning the same name twice yields the same label, and every label
/// resolves back to its name. Safe to use from several threads.
pub struct SymbolStore {
    rodeo: ThreadedRodeo,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    pub fn intern(&self, name: &str) -> Label {
        self.rodeo.get_or_intern(name)
    }

    /// The name behind `label`. None for labels from another store.
    pub fn resolve(&self, label: Label) -> Option<&str> {
        self.rodeo.try_resolve(&label)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rodeo.contains(name)
    }

    /// Look a name up without interning it.
    pub fn get(&self, name: &str) -> Option<Label> {
        self.rodeo.get(name)
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

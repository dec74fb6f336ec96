//! A small insertion-ordered symbol table.
//!
//! [`Symtab`] maps symbol names to dense numeric ids, preserving insertion
//! order so that ids double as indices into name-parallel vectors. Grammar
//! construction uses it to assign terminal and nonterminal ids.

use indexmap::IndexMap;

/// An insertion-ordered bidirectional map between symbol names and ids.
#[derive(Default, Debug, Clone)]
pub struct Symtab {
    map: IndexMap<String, usize>,
}

impl Symtab {
    /// Creates a new, empty symbol table.
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    /// Adds a symbol, returning its id. If the symbol already exists its
    /// existing id is returned.
    pub fn add(&mut self, sym: &str) -> usize {
        if let Some(&idx) = self.map.get(sym) {
            return idx;
        }
        let idx = self.map.len();
        self.map.insert(sym.to_owned(), idx);
        idx
    }

    /// Looks up the id of a symbol by name.
    pub fn idx(&self, sym: &str) -> Option<usize> {
        self.map.get(sym).copied()
    }

    /// Returns the symbol name of a given id.
    pub fn sym(&self, idx: usize) -> Option<&str> {
        self.map.get_index(idx).map(|(name, _)| name.as_str())
    }

    /// Returns the number of symbols stored in the table.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the table holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns all symbol names as owned strings, in id order.
    pub fn names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }
}

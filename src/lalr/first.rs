//! FIRST sets, i.e. the 1-heads of the non-null terminal descendants of a
//! string, computed by an event-driven fixed point.
//!
//! Whether a string also has a *null* terminal descendant is carried inside
//! the set itself as a distinguished ε-marker, so a single structure
//! answers both questions lane tracing asks of a follow string.

use crate::grammar::Grammar;
use crate::graph::{add_edge, get_edges, make_graph_with_nnodes, make_transpose, NodeGraph};
use std::collections::{BTreeSet, VecDeque};

/// A member of a FIRST set: a terminal, or the ε-marker (`None`).
pub(crate) type FirstEntry = Option<usize>;

/// The FIRST set of a symbol or symbol string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FirstSet {
    symbols: BTreeSet<usize>,
    has_null: bool,
}

impl FirstSet {
    /// Returns `true` if the entry is already present.
    pub fn contains(&self, entry: FirstEntry) -> bool {
        match entry {
            Some(symbol) => self.symbols.contains(&symbol),
            None => self.has_null,
        }
    }

    /// Inserts an entry, returning `true` if it was new.
    pub fn insert(&mut self, entry: FirstEntry) -> bool {
        match entry {
            Some(symbol) => self.symbols.insert(symbol),
            None => !std::mem::replace(&mut self.has_null, true),
        }
    }

    /// The terminal members, without the ε-marker.
    pub fn symbols(&self) -> &BTreeSet<usize> {
        &self.symbols
    }

    /// Returns `true` if the ε-marker is present, i.e. the string can
    /// derive the empty string.
    pub fn has_null(&self) -> bool {
        self.has_null
    }

    /// Returns `true` if the string derives at least one nonempty
    /// terminal string.
    pub fn has_non_null_terminal_descendant(&self) -> bool {
        !self.symbols.is_empty()
    }

    /// All entries, terminals first, the ε-marker last.
    fn entries(&self) -> Vec<FirstEntry> {
        let mut out: Vec<FirstEntry> = self.symbols.iter().copied().map(Some).collect();
        if self.has_null {
            out.push(None);
        }
        out
    }
}

/// FIRST of a symbol string, by the standard null-propagation walk: union
/// member FIRSTs while they are nullable; if the whole string is nullable,
/// the result carries the ε-marker.
pub(crate) fn get_first_set_of_string(string: &[usize], first_sets: &[FirstSet]) -> FirstSet {
    let mut out = FirstSet::default();
    let mut i = 0;
    while i < string.len() {
        let symbol = string[i];
        let symbol_firsts = &first_sets[symbol];
        out.symbols.extend(symbol_firsts.symbols().iter().copied());
        if !symbol_firsts.has_null() {
            break;
        }
        i += 1;
    }
    if i == string.len() {
        out.has_null = true;
    }
    out
}

fn get_productions_by_lhs(grammar: &Grammar) -> NodeGraph {
    let mut lhs2prods = make_graph_with_nnodes(grammar.nsymbols);
    for (prod_i, prod) in grammar.productions.iter().enumerate() {
        add_edge(&mut lhs2prods, prod.lhs, prod_i);
    }
    lhs2prods
}

/* a graph where symbols are nodes, and there is an edge (A, B) if B
   appears in the RHS of any production in which A is the LHS */
fn get_symbol_graph(grammar: &Grammar, lhs2prods: &NodeGraph) -> NodeGraph {
    let mut out = make_graph_with_nnodes(grammar.nsymbols);
    for lhs in 0..grammar.nsymbols {
        let mut dependees: BTreeSet<usize> = BTreeSet::new();
        for &prod_i in get_edges(lhs2prods, lhs) {
            dependees.extend(grammar.productions[prod_i].rhs.iter().copied());
        }
        out[lhs] = dependees.into_iter().collect();
    }
    out
}

struct Event {
    added: FirstEntry,
    dependee: usize,
}

/// Computes the FIRST set of every symbol.
///
/// Seeds: each terminal is its own FIRST; each nonterminal with an
/// ε-production gets the ε-marker. Every insertion re-examines the symbols
/// whose productions mention the grown one, queueing whatever their RHS
/// FIRST now additionally contains, until the queue drains.
pub(crate) fn compute_first_sets(grammar: &Grammar) -> Vec<FirstSet> {
    log::debug!("computing FIRST sets");
    let mut event_q: VecDeque<Event> = VecDeque::new();
    let mut first_sets: Vec<FirstSet> = vec![FirstSet::default(); grammar.nsymbols];
    let lhs2prods = get_productions_by_lhs(grammar);
    for symbol in 0..grammar.nsymbols {
        if grammar.is_terminal(symbol) {
            event_q.push_back(Event {
                added: Some(symbol),
                dependee: symbol,
            });
        } else if get_edges(&lhs2prods, symbol)
            .iter()
            .any(|&prod_i| grammar.productions[prod_i].rhs.is_empty())
        {
            event_q.push_back(Event {
                added: None,
                dependee: symbol,
            });
        }
    }
    let dependers2dependees = get_symbol_graph(grammar, &lhs2prods);
    let dependees2dependers = make_transpose(&dependers2dependees);
    while let Some(event) = event_q.pop_front() {
        let Event { added, dependee } = event;
        if first_sets[dependee].contains(added) {
            continue;
        }
        first_sets[dependee].insert(added);
        for &depender in get_edges(&dependees2dependers, dependee) {
            debug_assert!(grammar.is_nonterminal(depender));
            for &prod_i in get_edges(&lhs2prods, depender) {
                let rhs_first_set =
                    get_first_set_of_string(&grammar.productions[prod_i].rhs, &first_sets);
                for entry in rhs_first_set.entries() {
                    if !first_sets[depender].contains(entry) {
                        event_q.push_back(Event {
                            added: entry,
                            dependee: depender,
                        });
                    }
                }
            }
        }
    }
    first_sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::build_grammar;
    use crate::language::{Language, ProductionDef, TokenDef};

    fn first_sets_of(tokens: &[&str], productions: &[(&str, &[&str])]) -> (Grammar, Vec<FirstSet>) {
        let lang = Language {
            tokens: tokens.iter().map(|&t| TokenDef::new(t, t)).collect(),
            productions: productions
                .iter()
                .map(|&(lhs, rhs)| ProductionDef::new(lhs, rhs))
                .collect(),
            ignored_tokens: vec![],
        };
        let grammar = build_grammar(&lang).unwrap();
        let first_sets = compute_first_sets(&grammar);
        (grammar, first_sets)
    }

    #[test]
    fn terminal_first_is_itself() {
        let (grammar, first_sets) = first_sets_of(&["a"], &[("S", &["a"])]);
        for terminal in 0..grammar.nterminals {
            assert_eq!(
                first_sets[terminal].symbols(),
                &BTreeSet::from([terminal])
            );
            assert!(!first_sets[terminal].has_null());
        }
    }

    #[test]
    fn epsilon_production_adds_the_marker() {
        // A ::= B c ; B ::= b | ε
        let (grammar, first_sets) =
            first_sets_of(&["b", "c"], &[("A", &["B", "c"]), ("B", &["b"]), ("B", &[])]);
        let b = 0;
        let c = 1;
        let nt_a = grammar.nterminals; // first nonterminal
        let nt_b = grammar.nterminals + 1;
        assert_eq!(first_sets[nt_a].symbols(), &BTreeSet::from([b, c]));
        assert!(!first_sets[nt_a].has_null());
        assert_eq!(first_sets[nt_b].symbols(), &BTreeSet::from([b]));
        assert!(first_sets[nt_b].has_null());
    }

    #[test]
    fn left_recursion_reaches_a_fixed_point() {
        let (grammar, first_sets) = first_sets_of(
            &["+", "x"],
            &[("E", &["E", "+", "x"]), ("E", &["x"])],
        );
        let nt_e = grammar.nterminals;
        assert_eq!(first_sets[nt_e].symbols(), &BTreeSet::from([1]));
        assert!(!first_sets[nt_e].has_null());
    }

    #[test]
    fn string_first_walks_through_nullables() {
        let (grammar, first_sets) =
            first_sets_of(&["b", "c"], &[("A", &["B", "c"]), ("B", &["b"]), ("B", &[])]);
        let nt_b = grammar.nterminals + 1;
        let c = 1;
        // FIRST(B c) = {b, c}, not nullable
        let fs = get_first_set_of_string(&[nt_b, c], &first_sets);
        assert_eq!(fs.symbols(), &BTreeSet::from([0, 1]));
        assert!(!fs.has_null());
        // FIRST(B B) is nullable
        let fs = get_first_set_of_string(&[nt_b, nt_b], &first_sets);
        assert!(fs.has_null());
        // FIRST of the empty string is just the marker
        let fs = get_first_set_of_string(&[], &first_sets);
        assert!(fs.has_null());
        assert!(!fs.has_non_null_terminal_descendant());
    }
}

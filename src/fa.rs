//! Finite automata over chartab symbols.
//!
//! [`FiniteAutomaton`] is a dense transition table shared by NFAs and DFAs.
//! An NFA carries two extra ε columns (ε₀ and ε₁) so the regex combinators
//! can branch unambiguously; a DFA has none. The module provides the
//! primitive builders and combinators the regex front-end reduces into,
//! subset construction, and iterative row-equivalence minimization.
//!
//! The combinators maintain one invariant throughout: an accepting state
//! never has an outgoing ε transition.

use crate::chartab::{self, NCHARS};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

const NONE: i32 = -1;

/// A finite automaton with dense transition storage.
///
/// Rows are states, columns are symbols (plus two ε columns when the
/// automaton is nondeterministic). State 0 is the start state. Each state
/// carries an optional accepted token id; when subset construction merges
/// several accepting NFA states, the smallest token id wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiniteAutomaton {
    nsymbols: usize,
    deterministic: bool,
    table: Vec<i32>,
    accepted_tokens: Vec<i32>,
}

impl FiniteAutomaton {
    /// Creates an automaton with no states.
    ///
    /// `nstates_reserve` only preallocates; states are added with
    /// [`add_state`](Self::add_state).
    pub fn new(nsymbols: usize, deterministic: bool, nstates_reserve: usize) -> Self {
        let ncols = nsymbols + if deterministic { 0 } else { 2 };
        Self {
            nsymbols,
            deterministic,
            table: Vec::with_capacity(ncols * nstates_reserve),
            accepted_tokens: Vec::with_capacity(nstates_reserve),
        }
    }

    /// Number of states.
    pub fn nstates(&self) -> usize {
        self.accepted_tokens.len()
    }

    /// Number of symbols, not counting ε columns.
    pub fn nsymbols(&self) -> usize {
        self.nsymbols
    }

    /// Number of transition columns, counting ε columns.
    fn nsymbols_eps(&self) -> usize {
        self.nsymbols + if self.deterministic { 0 } else { 2 }
    }

    /// Returns `true` for a DFA.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Column index of the ε₀ channel.
    pub fn epsilon0(&self) -> usize {
        assert!(!self.deterministic, "a DFA has no epsilon columns");
        self.nsymbols
    }

    /// Column index of the ε₁ channel.
    pub fn epsilon1(&self) -> usize {
        assert!(!self.deterministic, "a DFA has no epsilon columns");
        self.nsymbols + 1
    }

    /// Appends a fresh non-accepting state with no transitions and returns
    /// its index.
    pub fn add_state(&mut self) -> usize {
        let state = self.nstates();
        self.table.extend(std::iter::repeat(NONE).take(self.nsymbols_eps()));
        self.accepted_tokens.push(NONE);
        state
    }

    /// Sets the transition `from_state --at_symbol--> to_state`.
    ///
    /// `at_symbol` may address an ε column. The cell must not already be
    /// set; a double assignment is a caller bug.
    pub fn add_transition(&mut self, from_state: usize, at_symbol: usize, to_state: usize) {
        assert!(to_state < self.nstates(), "transition to unknown state {}", to_state);
        assert!(at_symbol < self.nsymbols_eps(), "symbol {} out of range", at_symbol);
        let cell = from_state * self.nsymbols_eps() + at_symbol;
        assert!(
            self.table[cell] == NONE,
            "transition ({}, {}) assigned twice",
            from_state,
            at_symbol
        );
        self.table[cell] = to_state as i32;
    }

    /// Marks `state` as accepting `token`, replacing any previous token.
    pub fn add_accept(&mut self, state: usize, token: usize) {
        self.accepted_tokens[state] = token as i32;
    }

    /// Clears the accepted token of `state`.
    pub fn remove_accept(&mut self, state: usize) {
        self.accepted_tokens[state] = NONE;
    }

    /// Returns the successor of `state` on `symbol` (which may address an ε
    /// column), or `None` when the cell is empty.
    pub fn step(&self, state: usize, symbol: usize) -> Option<usize> {
        assert!(state < self.nstates(), "state {} out of range", state);
        assert!(symbol < self.nsymbols_eps(), "symbol {} out of range", symbol);
        match self.table[state * self.nsymbols_eps() + symbol] {
            NONE => None,
            next => Some(next as usize),
        }
    }

    /// Returns the token accepted in `state`, if any.
    pub fn accepts(&self, state: usize) -> Option<usize> {
        match self.accepted_tokens[state] {
            NONE => None,
            token => Some(token as usize),
        }
    }

    /// Copies every state of `other` into `self`, offset by the current
    /// state count. Transitions and accepted tokens are preserved.
    fn append_states(&mut self, other: &FiniteAutomaton) {
        assert_eq!(other.nsymbols, self.nsymbols, "alphabet mismatch");
        if !other.deterministic {
            assert!(!self.deterministic, "cannot append an NFA to a DFA");
        }
        let offset = self.nstates();
        for other_state in 0..other.nstates() {
            let my_state = self.add_state();
            if let Some(token) = other.accepts(other_state) {
                self.add_accept(my_state, token);
            }
        }
        for other_state in 0..other.nstates() {
            let my_state = other_state + offset;
            for symbol in 0..other.nsymbols_eps() {
                if let Some(other_next) = other.step(other_state, symbol) {
                    self.add_transition(my_state, symbol, other_next + offset);
                }
            }
        }
    }

    /// Two-state NFA accepting exactly one symbol.
    pub fn make_single_nfa(nsymbols: usize, symbol: usize, token: usize) -> Self {
        Self::make_range_nfa(nsymbols, symbol, symbol, token)
    }

    /// Two-state NFA accepting any single symbol of an inclusive range.
    pub fn make_range_nfa(nsymbols: usize, range_start: usize, range_end: usize, token: usize) -> Self {
        assert!(range_start <= range_end, "empty symbol range");
        assert!(range_end < nsymbols, "range end {} out of range", range_end);
        let mut out = Self::new(nsymbols, true, 2);
        let start_state = out.add_state();
        let accept_state = out.add_state();
        for symbol in range_start..=range_end {
            out.add_transition(start_state, symbol, accept_state);
        }
        out.add_accept(accept_state, token);
        out
    }

    /// Two-state NFA accepting any single symbol of a set.
    pub fn make_set_nfa(nsymbols: usize, accepted: &BTreeSet<usize>, token: usize) -> Self {
        let mut out = Self::new(nsymbols, true, 2);
        let start_state = out.add_state();
        let accept_state = out.add_state();
        for &symbol in accepted {
            out.add_transition(start_state, symbol, accept_state);
        }
        out.add_accept(accept_state, token);
        out
    }

    /// Union: new start state with ε₀ to `a` and ε₁ to `b`.
    pub fn unite(a: &FiniteAutomaton, b: &FiniteAutomaton) -> Self {
        let nsymbols = a.nsymbols();
        let mut out = Self::new(nsymbols, false, 1 + a.nstates() + b.nstates());
        let start_state = out.add_state();
        let a_offset = out.nstates();
        out.append_states(a);
        let b_offset = out.nstates();
        out.append_states(b);
        let epsilon0 = out.epsilon0();
        let epsilon1 = out.epsilon1();
        out.add_transition(start_state, epsilon0, a_offset);
        out.add_transition(start_state, epsilon1, b_offset);
        out
    }

    /// Concatenation: `a` then `b`. Accepting states of `a` lose their
    /// token and gain an ε₀ edge to `b`'s start; accepting states of `b`
    /// are re-tagged to `token`.
    pub fn concat(a: &FiniteAutomaton, b: &FiniteAutomaton, token: usize) -> Self {
        let nsymbols = a.nsymbols();
        let mut out = Self::new(nsymbols, false, a.nstates() + b.nstates());
        out.append_states(a);
        let b_offset = out.nstates();
        out.append_states(b);
        let epsilon0 = out.epsilon0();
        for state in 0..a.nstates() {
            if a.accepts(state).is_some() {
                out.add_transition(state, epsilon0, b_offset);
                out.remove_accept(state);
            }
        }
        for state in 0..b.nstates() {
            if b.accepts(state).is_some() {
                out.add_accept(state + b_offset, token);
            }
        }
        out
    }

    /// One-or-more repetition. A fresh accept state is appended; every old
    /// accept gets ε₀ to it and ε₁ back to the start, keeping accepting
    /// states free of outgoing ε transitions.
    pub fn plus(a: &FiniteAutomaton, token: usize) -> Self {
        let mut out = Self::new(a.nsymbols(), false, a.nstates() + 1);
        out.append_states(a);
        let new_accept_state = out.add_state();
        out.add_accept(new_accept_state, token);
        let epsilon0 = out.epsilon0();
        let epsilon1 = out.epsilon1();
        for state in 0..a.nstates() {
            if a.accepts(state).is_some() {
                out.add_transition(state, epsilon0, new_accept_state);
                out.add_transition(state, epsilon1, 0);
                out.remove_accept(state);
            }
        }
        out
    }

    /// Zero-or-one repetition: new start, `a`, new accept, with an
    /// ε₀-linked chain through the old accepting states.
    pub fn maybe(a: &FiniteAutomaton, token: usize) -> Self {
        let mut out = Self::new(a.nsymbols(), false, a.nstates() + 2);
        let new_start_state = out.add_state();
        let offset = out.nstates();
        out.append_states(a);
        let new_accept_state = out.add_state();
        let epsilon0 = out.epsilon0();
        let epsilon1 = out.epsilon1();
        out.add_transition(new_start_state, epsilon1, offset);
        let mut last = new_start_state;
        for state in 0..a.nstates() {
            if a.accepts(state).is_some() {
                out.add_transition(last, epsilon0, state + offset);
                out.remove_accept(state + offset);
                last = state + offset;
            }
        }
        out.add_transition(last, epsilon0, new_accept_state);
        out.add_accept(new_accept_state, token);
        out
    }

    /// Zero-or-more repetition.
    pub fn star(a: &FiniteAutomaton, token: usize) -> Self {
        Self::maybe(&Self::plus(a, token), token)
    }

    /// Subset construction, NFA → DFA.
    ///
    /// Each DFA state is the ε-closure of a set of NFA states; sets are
    /// interned in insertion order so the resulting state numbering doubles
    /// as the work queue. When a subset holds several accepting NFA states
    /// the smallest token id wins, which is what gives earlier-declared
    /// tokens priority in the combined lexer.
    pub fn make_deterministic(nfa: &FiniteAutomaton) -> Self {
        if nfa.is_deterministic() {
            return nfa.clone();
        }
        let mut out = Self::new(nfa.nsymbols(), true, 0);
        let mut subsets: IndexSet<BTreeSet<usize>> = IndexSet::new();
        let start_ss = nfa.epsilon_closure(BTreeSet::from([0]));
        subsets.insert(start_ss);
        out.add_state();
        let mut front = 0;
        while front < subsets.len() {
            let state = front;
            let ss = subsets.get_index(front).expect("queued subset").clone();
            front += 1;
            for symbol in 0..nfa.nsymbols() {
                let next_ss = step_set(&ss, symbol, nfa);
                if next_ss.is_empty() {
                    continue;
                }
                let next_ss = nfa.epsilon_closure(next_ss);
                let (next_state, inserted) = subsets.insert_full(next_ss);
                if inserted {
                    out.add_state();
                }
                out.add_transition(state, symbol, next_state);
            }
            let min_accepted = ss.iter().filter_map(|&nfa_state| nfa.accepts(nfa_state)).min();
            if let Some(token) = min_accepted {
                out.add_accept(state, token);
            }
        }
        out
    }

    /// Smallest superset of `ss` closed under both ε channels.
    fn epsilon_closure(&self, mut ss: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut queue: VecDeque<usize> = ss.iter().copied().collect();
        let epsilon0 = self.epsilon0();
        let epsilon1 = self.epsilon1();
        while let Some(state) = queue.pop_front() {
            for epsilon in epsilon0..=epsilon1 {
                if let Some(next_state) = self.step(state, epsilon) {
                    if ss.insert(next_state) {
                        queue.push_back(next_state);
                    }
                }
            }
        }
        ss
    }

    /// One pass of row-equivalence reduction: states with identical
    /// (accepted token, transition row) signatures collapse into one.
    /// First-seen numbering keeps the group of state 0 as the new start.
    pub fn simplify_once(fa: &FiniteAutomaton) -> Self {
        let ncols = fa.nsymbols_eps();
        let mut signatures: IndexMap<(i32, Vec<i32>), usize> = IndexMap::new();
        let mut state_to_simple = Vec::with_capacity(fa.nstates());
        for state in 0..fa.nstates() {
            let row = fa.table[state * ncols..(state + 1) * ncols].to_vec();
            let nsimple = signatures.len();
            let simple = *signatures
                .entry((fa.accepted_tokens[state], row))
                .or_insert(nsimple);
            state_to_simple.push(simple);
        }
        let nsimple = signatures.len();
        let mut out = Self::new(fa.nsymbols(), fa.is_deterministic(), nsimple);
        for _ in 0..nsimple {
            out.add_state();
        }
        let mut did_simple = vec![false; nsimple];
        for state in 0..fa.nstates() {
            let simple = state_to_simple[state];
            if did_simple[simple] {
                continue;
            }
            for symbol in 0..ncols {
                if let Some(next_state) = fa.step(state, symbol) {
                    out.add_transition(simple, symbol, state_to_simple[next_state]);
                }
            }
            if let Some(token) = fa.accepts(state) {
                out.add_accept(simple, token);
            }
            did_simple[simple] = true;
        }
        out
    }

    /// Reduces the automaton until the state count is stable.
    ///
    /// A single pass suffices for Moore-reduced inputs; the loop is kept as
    /// a conservative fallback and logs when it actually iterated.
    pub fn simplify(fa: &FiniteAutomaton) -> Self {
        let mut out = Self::simplify_once(fa);
        let mut nstates = fa.nstates();
        let mut passes = 1;
        while out.nstates() < nstates {
            nstates = out.nstates();
            out = Self::simplify_once(&out);
            passes += 1;
        }
        if passes > 2 {
            log::warn!("simplify took {} passes to reach a fixpoint", passes);
        }
        out
    }

    /// Returns a copy with all transitions out of accepting states removed.
    ///
    /// Turns a DFA for `.*R` into one that stops at the first occurrence
    /// of `R`.
    pub fn remove_transitions_from_accepting(fa: &FiniteAutomaton) -> Self {
        let mut out = fa.clone();
        let ncols = out.nsymbols_eps();
        for state in 0..out.nstates() {
            if out.accepts(state).is_some() {
                for cell in &mut out.table[state * ncols..(state + 1) * ncols] {
                    *cell = NONE;
                }
            }
        }
        out
    }
}

fn step_set(ss: &BTreeSet<usize>, symbol: usize, fa: &FiniteAutomaton) -> BTreeSet<usize> {
    let mut next_ss = BTreeSet::new();
    for &state in ss {
        if let Some(next_state) = fa.step(state, symbol) {
            next_ss.insert(next_state);
        }
    }
    next_ss
}

/// NFA accepting any single character of a set.
pub fn make_char_set_nfa(accepted: &BTreeSet<char>, token: usize) -> FiniteAutomaton {
    let symbol_set = accepted.iter().map(|&c| chartab::get_symbol(c)).collect();
    FiniteAutomaton::make_set_nfa(NCHARS, &symbol_set, token)
}

/// NFA accepting any single character of an inclusive character range.
pub fn make_char_range_nfa(range_start: char, range_end: char, token: usize) -> FiniteAutomaton {
    FiniteAutomaton::make_range_nfa(
        NCHARS,
        chartab::get_symbol(range_start),
        chartab::get_symbol(range_end),
        token,
    )
}

/// NFA accepting exactly one character.
pub fn make_char_single_nfa(symbol_char: char, token: usize) -> FiniteAutomaton {
    let symbol = chartab::get_symbol(symbol_char);
    FiniteAutomaton::make_range_nfa(NCHARS, symbol, symbol, token)
}

impl fmt::Display for FiniteAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_deterministic() {
            write!(f, "dfa ")?;
        } else {
            write!(f, "nfa ")?;
        }
        writeln!(f, "{} states {} symbols", self.nstates(), self.nsymbols())?;
        for state in 0..self.nstates() {
            for symbol in 0..self.nsymbols() {
                if let Some(next_state) = self.step(state, symbol) {
                    writeln!(f, "({}, {}) -> {}", state, symbol, next_state)?;
                }
            }
            if !self.is_deterministic() {
                for epsilon in self.epsilon0()..=self.epsilon1() {
                    if let Some(next_state) = self.step(state, epsilon) {
                        writeln!(f, "({}, eps{}) -> {}", state, epsilon - self.epsilon0(), next_state)?;
                    }
                }
            }
            if let Some(token) = self.accepts(state) {
                writeln!(f, "{} accepts {}", state, token)?;
            }
        }
        Ok(())
    }
}

//! The finished, immutable parser tables.
//!
//! [`ParserTables`] is what the whole pipeline produces and what a runtime
//! shift-reduce parser consumes: a lexer DFA, the dense shift/reduce tables,
//! and the indentation token info. Nothing here is mutated after
//! construction; the tables can be shared freely between parser instances.

use crate::error::BuildError;
use crate::fa::FiniteAutomaton;
use crate::grammar::Grammar;

/// One cell of the terminal action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// No action; the input is rejected here.
    #[default]
    Error,
    /// Push the terminal and enter the state.
    Shift(usize),
    /// Reduce by the production.
    Reduce(usize),
    /// Successful parse completion.
    Accept,
    /// Consume and discard an ignored token.
    Skip,
}

/// What the runtime needs to know about one production: the dense
/// nonterminal index of its LHS and its RHS length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableProduction {
    /// Dense nonterminal index of the left-hand side.
    pub lhs: usize,
    /// Number of right-hand-side symbols.
    pub rhs_len: usize,
}

/// Dense shift/reduce tables.
///
/// Rows are parser states. Terminal columns hold [`Action`]s; nonterminal
/// columns hold goto states.
#[derive(Debug, Clone)]
pub struct ShiftReduceTables {
    nterminals: usize,
    nnonterminals: usize,
    productions: Vec<TableProduction>,
    terminal_actions: Vec<Action>,
    nonterminal_gotos: Vec<i32>,
}

impl ShiftReduceTables {
    /// Creates empty tables sized for `grammar`'s symbols.
    pub fn new(grammar: &Grammar, nstates_reserve: usize) -> Self {
        let productions = grammar
            .productions
            .iter()
            .map(|p| TableProduction {
                lhs: grammar.as_nonterminal(p.lhs),
                rhs_len: p.rhs.len(),
            })
            .collect();
        Self {
            nterminals: grammar.nterminals,
            nnonterminals: grammar.nnonterminals(),
            productions,
            terminal_actions: Vec::with_capacity(nstates_reserve * grammar.nterminals),
            nonterminal_gotos: Vec::with_capacity(nstates_reserve * grammar.nnonterminals()),
        }
    }

    /// Appends a state with all-error actions and no gotos.
    pub fn add_state(&mut self) {
        self.terminal_actions
            .extend(std::iter::repeat(Action::Error).take(self.nterminals));
        self.nonterminal_gotos
            .extend(std::iter::repeat(-1).take(self.nnonterminals));
    }

    /// Number of states.
    pub fn nstates(&self) -> usize {
        if self.nterminals == 0 {
            0
        } else {
            self.terminal_actions.len() / self.nterminals
        }
    }

    /// Number of terminal symbols (including the `end` terminal).
    pub fn nterminals(&self) -> usize {
        self.nterminals
    }

    /// Number of nonterminal symbols.
    pub fn nnonterminals(&self) -> usize {
        self.nnonterminals
    }

    /// The synthetic `end` terminal.
    pub fn end_terminal(&self) -> usize {
        self.nterminals - 1
    }

    /// Number of productions.
    pub fn nproductions(&self) -> usize {
        self.productions.len()
    }

    /// LHS index and RHS length of a production.
    pub fn production(&self, production: usize) -> TableProduction {
        self.productions[production]
    }

    /// The action on `terminal` in `state`.
    pub fn terminal_action(&self, state: usize, terminal: usize) -> Action {
        self.terminal_actions[state * self.nterminals + terminal]
    }

    /// The goto state on a dense nonterminal index, if any.
    pub fn nonterminal_goto(&self, state: usize, nonterminal: usize) -> Option<usize> {
        match self.nonterminal_gotos[state * self.nnonterminals + nonterminal] {
            -1 => None,
            next => Some(next as usize),
        }
    }

    /// Writes one terminal action cell.
    ///
    /// A second write to the same cell means two actions claimed the same
    /// lookahead, which the adequacy check should have ruled out; it is
    /// reported loudly instead of silently resolved.
    pub fn set_terminal_action(
        &mut self,
        state: usize,
        terminal: usize,
        action: Action,
    ) -> Result<(), BuildError> {
        assert!(terminal < self.nterminals, "terminal {} out of range", terminal);
        let cell = state * self.nterminals + terminal;
        if self.terminal_actions[cell] != Action::Error {
            return Err(BuildError::InternalInvariant(format!(
                "conflicting actions {:?} and {:?} in state {} on terminal {}",
                self.terminal_actions[cell], action, state, terminal
            )));
        }
        self.terminal_actions[cell] = action;
        Ok(())
    }

    /// Writes a `skip` cell for an ignored terminal, overriding whatever
    /// placeholder action was there.
    pub fn set_skip(&mut self, state: usize, terminal: usize) {
        assert!(terminal < self.nterminals, "terminal {} out of range", terminal);
        self.terminal_actions[state * self.nterminals + terminal] = Action::Skip;
    }

    /// Writes one nonterminal goto cell.
    pub fn set_nonterminal_goto(
        &mut self,
        state: usize,
        nonterminal: usize,
        next_state: usize,
    ) -> Result<(), BuildError> {
        assert!(
            nonterminal < self.nnonterminals,
            "nonterminal {} out of range",
            nonterminal
        );
        let cell = state * self.nnonterminals + nonterminal;
        if self.nonterminal_gotos[cell] != -1 {
            return Err(BuildError::InternalInvariant(format!(
                "goto cell ({}, {}) assigned twice",
                state, nonterminal
            )));
        }
        self.nonterminal_gotos[cell] = next_state as i32;
        Ok(())
    }
}

/// Indentation token info detected from the token declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indentation {
    /// `true` when the language declares an `INDENT` token.
    pub is_sensitive: bool,
    /// Token id of `INDENT`, when declared.
    pub indent_token: Option<usize>,
    /// Token id of `DEDENT`, when declared.
    pub dedent_token: Option<usize>,
    /// Token id of `NEWLINE`, when declared.
    pub newline_token: Option<usize>,
}

/// Everything a runtime parser needs for one language.
#[derive(Debug, Clone)]
pub struct ParserTables {
    /// The shift/reduce and goto tables.
    pub shift_reduce: ShiftReduceTables,
    /// The combined lexer DFA.
    pub lexer: FiniteAutomaton,
    /// Indentation token info.
    pub indent_info: Indentation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::build_grammar;
    use crate::language::{Language, ProductionDef, TokenDef};

    fn tiny_tables() -> ShiftReduceTables {
        let lang = Language {
            tokens: vec![TokenDef::new("a", "a")],
            productions: vec![ProductionDef::new("s", &["a"])],
            ignored_tokens: vec![],
        };
        let grammar = build_grammar(&lang).unwrap();
        let mut tables = ShiftReduceTables::new(&grammar, 2);
        tables.add_state();
        tables.add_state();
        tables
    }

    #[test]
    fn cells_default_to_error() {
        let tables = tiny_tables();
        assert_eq!(tables.nstates(), 2);
        assert_eq!(tables.terminal_action(0, 0), Action::Error);
        assert_eq!(tables.nonterminal_goto(1, 0), None);
    }

    #[test]
    fn conflicting_action_write_fails_loudly() {
        let mut tables = tiny_tables();
        tables.set_terminal_action(0, 0, Action::Shift(1)).unwrap();
        assert_eq!(tables.terminal_action(0, 0), Action::Shift(1));
        assert!(matches!(
            tables.set_terminal_action(0, 0, Action::Reduce(0)),
            Err(BuildError::InternalInvariant(_))
        ));
    }

    #[test]
    fn skip_overrides_placeholder_actions() {
        let mut tables = tiny_tables();
        tables.set_terminal_action(1, 0, Action::Reduce(0)).unwrap();
        tables.set_skip(1, 0);
        assert_eq!(tables.terminal_action(1, 0), Action::Skip);
    }

    #[test]
    fn goto_cells_write_once() {
        let mut tables = tiny_tables();
        tables.set_nonterminal_goto(0, 0, 1).unwrap();
        assert_eq!(tables.nonterminal_goto(0, 0), Some(1));
        assert!(tables.set_nonterminal_goto(0, 0, 1).is_err());
    }

    #[test]
    fn productions_carry_lhs_and_len() {
        let tables = tiny_tables();
        // production 0: s ::= a ; production 1: accept ::= s end
        assert_eq!(tables.nproductions(), 2);
        assert_eq!(tables.production(0).rhs_len, 1);
        assert_eq!(tables.production(1).rhs_len, 2);
        assert_eq!(tables.production(1).lhs, 1);
    }
}

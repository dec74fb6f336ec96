//! LALR(1) parser table construction.
//!
//! The construction implemented here is based on David Pager's work:
//!
//! > Pager, David. "The lane-tracing algorithm for constructing LR(k)
//! > parsers and ways of enhancing its efficiency."
//! > Information Sciences 12.1 (1977): 19-42.
//!
//! The identifiers follow the terminology of that paper, except where FIRST
//! set terminology is brought in, which Pager doesn't go into detail about.
//!
//! [`build_lalr1_parser`] builds the LR(0) machine, checks its adequacy,
//! and — only for grammars that are not LR(0) — computes precise lookahead
//! contexts for the reductions of inadequate states by tracing lanes
//! through the originator graph. [`accept_parser`] then flattens the
//! machine into dense [`ShiftReduceTables`].

mod first;
mod lanes;
mod lr0;

use crate::error::BuildError;
use crate::grammar::Grammar;
use crate::tables::{Action, ShiftReduceTables};
use std::collections::BTreeSet;

pub(crate) use first::{compute_first_sets, get_first_set_of_string, FirstSet};

/// A marked production: `production` with the dot before `rhs[dot]`.
///
/// Configurations are enumerated contiguously per production, dot
/// positions ascending, so `config + 1` is the same production with the
/// dot advanced one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Config {
    /// Index of the production in the grammar.
    pub production: usize,
    /// Position of the dot within the production's right-hand side.
    pub dot: usize,
}

/// All configurations of a grammar.
pub(crate) type Configurations = Vec<Config>;

/// A shift or reduce, before contexts are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateAction {
    /// Transition to `next_state`; the consumed symbol is the context.
    Shift {
        /// Successor state index.
        next_state: usize,
    },
    /// Reduce by `production` under the context's lookaheads.
    Reduce {
        /// Index of the reduced production.
        production: usize,
    },
}

/// An action plus the terminal (or, for nonterminal shifts, nonterminal)
/// context it fires under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActionInProgress {
    pub action: StateAction,
    pub context: BTreeSet<usize>,
}

/// A state of the LR(0) machine while the parser is being built: its
/// closed, sorted configuration set and its actions.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateInProgress {
    pub configs: Vec<usize>,
    pub actions: Vec<ActionInProgress>,
}

/// A configuration viewed as a member of a specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateConfig {
    /// State index.
    pub state: usize,
    /// Index of the configuration within that state's config list.
    pub config_in_state: usize,
}

/// The fully built LALR(1) machine, ready to be flattened into tables.
///
/// Configurations, state-configs, and the predecessor graphs are internal
/// to the build and are dropped when it returns; only the grammar and the
/// states with their resolved actions survive.
#[derive(Debug)]
pub struct ParserInProgress {
    pub(crate) grammar: Grammar,
    pub(crate) states: Vec<StateInProgress>,
}

impl ParserInProgress {
    /// The grammar the machine was built for.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Number of states of the LR automaton.
    pub fn nstates(&self) -> usize {
        self.states.len()
    }
}

/// Builds the LALR(1) machine for `grammar`.
///
/// Returns the machine with every reduction's context resolved, or fails
/// with [`BuildError::AmbiguousGrammar`] when lane tracing detects an
/// ambiguity and [`BuildError::NotLalr1`] when action contexts still
/// overlap after tracing.
pub fn build_lalr1_parser(grammar: Grammar) -> Result<ParserInProgress, BuildError> {
    let configs = lr0::make_configs(&grammar);
    let lhs2cs = lr0::get_left_hand_sides_to_start_configs(&configs, &grammar);
    log::debug!("building LR(0) parser");
    let mut states = lr0::build_lr0_parser(&configs, &grammar, &lhs2cs);
    log::debug!("checking adequacy of the LR(0) machine");
    let adequate = lr0::determine_adequate_states(&states, &grammar);
    if adequate.iter().all(|&a| a) {
        log::debug!("the grammar is LR(0)");
        return Ok(ParserInProgress { grammar, states });
    }

    let state_configs = lr0::form_state_configs(&states);
    let states2scs = lr0::form_states_to_state_configs(&state_configs, &states);
    let mut complete = vec![false; state_configs.len()];
    let mut contexts: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); state_configs.len()];
    /* initialize the accepting state-configs as described in footnote 8
       at the bottom of page 37 */
    let accept_production = grammar.accept_production();
    for (sc_i, sc) in state_configs.iter().enumerate() {
        let config_i = states[sc.state].configs[sc.config_in_state];
        if configs[config_i].production == accept_production {
            complete[sc_i] = true;
            contexts[sc_i].insert(grammar.end_terminal());
        }
    }

    let originator_graph =
        lanes::make_originator_graph(&state_configs, &states, &states2scs, &configs, &grammar);
    let first_sets = compute_first_sets(&grammar);

    /* compute context sets for all state-configs associated with reduction
       actions that are part of an inadequate state */
    for s_i in 0..states.len() {
        if adequate[s_i] {
            continue;
        }
        for cis_i in 0..states[s_i].configs.len() {
            let config = &configs[states[s_i].configs[cis_i]];
            if config.dot != grammar.productions[config.production].rhs.len() {
                continue;
            }
            let zeta_j_addr = states2scs[s_i][cis_i];
            lanes::compute_context_set(
                zeta_j_addr,
                &mut contexts,
                &mut complete,
                &state_configs,
                &originator_graph,
                &states,
                &states2scs,
                &configs,
                &first_sets,
                &grammar,
            )?;
        }
    }

    /* update the context sets for all reduction state-configs which are
       marked complete, even if they aren't in inadequate states */
    for s_i in 0..states.len() {
        let mut updates: Vec<(usize, BTreeSet<usize>)> = Vec::new();
        for (cis_i, &config_i) in states[s_i].configs.iter().enumerate() {
            let sc_i = states2scs[s_i][cis_i];
            if !complete[sc_i] {
                continue;
            }
            let config = &configs[config_i];
            if config.dot != grammar.productions[config.production].rhs.len() {
                continue;
            }
            updates.push((config.production, contexts[sc_i].clone()));
        }
        for action in &mut states[s_i].actions {
            if let StateAction::Reduce { production } = action.action {
                if let Some((_, context)) = updates.iter().find(|(p, _)| *p == production) {
                    action.context = context.clone();
                }
            }
        }
    }

    log::debug!("checking adequacy of the LALR(1) machine");
    let adequate = lr0::determine_adequate_states(&states, &grammar);
    if !adequate.iter().all(|&a| a) {
        return Err(BuildError::NotLalr1(lr0::collect_conflicts(
            &states, &grammar,
        )));
    }
    log::debug!("the grammar is LALR(1)");
    Ok(ParserInProgress { grammar, states })
}

/// Flattens the machine into dense [`ShiftReduceTables`].
///
/// Shifts on nonterminals become goto entries; reductions of the accept
/// production become `accept`; every ignored terminal gets a `skip` cell
/// in every state, written after the real actions so it overrides the
/// placeholder reduce fills of LR(0)-adequate states.
pub fn accept_parser(pip: &ParserInProgress) -> Result<ShiftReduceTables, BuildError> {
    let grammar = &pip.grammar;
    let mut out = ShiftReduceTables::new(grammar, pip.states.len());
    for _ in 0..pip.states.len() {
        out.add_state();
    }
    for (s_i, state) in pip.states.iter().enumerate() {
        for action in &state.actions {
            match action.action {
                StateAction::Shift { next_state } => {
                    debug_assert_eq!(action.context.len(), 1);
                    let symbol = *action.context.iter().next().ok_or_else(|| {
                        BuildError::InternalInvariant(format!(
                            "shift action without context in state {}",
                            s_i
                        ))
                    })?;
                    if grammar.is_nonterminal(symbol) {
                        out.set_nonterminal_goto(
                            s_i,
                            grammar.as_nonterminal(symbol),
                            next_state,
                        )?;
                    } else {
                        out.set_terminal_action(s_i, symbol, Action::Shift(next_state))?;
                    }
                }
                StateAction::Reduce { production } => {
                    let table_action = if production == grammar.accept_production() {
                        Action::Accept
                    } else {
                        Action::Reduce(production)
                    };
                    for &terminal in &action.context {
                        if !grammar.is_terminal(terminal) {
                            return Err(BuildError::InternalInvariant(format!(
                                "reduce context of state {} holds nonterminal {}",
                                s_i, terminal
                            )));
                        }
                        out.set_terminal_action(s_i, terminal, table_action)?;
                    }
                }
            }
        }
        for &terminal in &grammar.ignored_terminals {
            out.set_skip(s_i, terminal);
        }
    }
    Ok(out)
}

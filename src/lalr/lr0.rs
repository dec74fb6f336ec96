//! The LR(0) machine: configurations, closure, state construction, and the
//! adequacy check that decides whether lane tracing is needed at all.

use super::{ActionInProgress, Config, Configurations, StateAction, StateConfig, StateInProgress};
use crate::error::Conflict;
use crate::grammar::Grammar;
use crate::graph::{add_edge, get_edges, make_graph_with_nnodes, NodeGraph};
use indexmap::IndexMap;
use std::collections::{BTreeSet, VecDeque};

/// Expands the grammar productions into marked productions.
pub(super) fn make_configs(grammar: &Grammar) -> Configurations {
    let mut configs = Configurations::new();
    for (production, p) in grammar.productions.iter().enumerate() {
        for dot in 0..=p.rhs.len() {
            configs.push(Config { production, dot });
        }
    }
    configs
}

/// Groups the dot-0 configurations by their production's LHS.
pub(super) fn get_left_hand_sides_to_start_configs(
    configs: &Configurations,
    grammar: &Grammar,
) -> NodeGraph {
    let mut lhs2sc = make_graph_with_nnodes(grammar.nsymbols);
    for (config_i, config) in configs.iter().enumerate() {
        if config.dot > 0 {
            continue;
        }
        let lhs = grammar.productions[config.production].lhs;
        add_edge(&mut lhs2sc, lhs, config_i);
    }
    lhs2sc
}

/// Closes a state's configuration set: whenever the dot stands before a
/// nonterminal, that nonterminal's start configurations join the state.
/// The result is sorted, which is what state deduplication keys on.
fn close(
    state: &mut StateInProgress,
    configs: &Configurations,
    grammar: &Grammar,
    lhs2sc: &NodeGraph,
) {
    let mut config_q: VecDeque<usize> = VecDeque::new();
    let mut config_set: BTreeSet<usize> = BTreeSet::new();
    for &config_i in &state.configs {
        config_q.push_back(config_i);
        assert!(config_set.insert(config_i), "duplicate seed config");
    }
    while let Some(config_i) = config_q.pop_front() {
        let config = &configs[config_i];
        let prod = &grammar.productions[config.production];
        if config.dot == prod.rhs.len() {
            continue;
        }
        let symbol_after_dot = prod.rhs[config.dot];
        if grammar.is_terminal(symbol_after_dot) {
            continue;
        }
        for &sc in get_edges(lhs2sc, symbol_after_dot) {
            if config_set.insert(sc) {
                config_q.push_back(sc);
            }
        }
    }
    state.configs = config_set.into_iter().collect();
}

/// Builds all LR(0) states with their shift actions, then adds reduction
/// actions with placeholder contexts.
pub(super) fn build_lr0_parser(
    configs: &Configurations,
    grammar: &Grammar,
    lhs2sc: &NodeGraph,
) -> Vec<StateInProgress> {
    let mut states: Vec<StateInProgress> = Vec::new();
    let mut interned: IndexMap<Vec<usize>, usize> = IndexMap::new();
    {
        /* there is only one start configuration for the accept symbol */
        let accept_nt = grammar.accept_nonterminal();
        let start_accept_config = get_edges(lhs2sc, accept_nt)[0];
        let mut start_state = StateInProgress {
            configs: vec![start_accept_config],
            actions: Vec::new(),
        };
        close(&mut start_state, configs, grammar, lhs2sc);
        interned.insert(start_state.configs.clone(), 0);
        states.push(start_state);
    }
    let mut front = 0;
    while front < states.len() {
        let state_i = front;
        front += 1;
        let state_configs = states[state_i].configs.clone();
        let mut transition_symbols: BTreeSet<usize> = BTreeSet::new();
        for &config_i in &state_configs {
            let config = &configs[config_i];
            let prod = &grammar.productions[config.production];
            if config.dot == prod.rhs.len() {
                continue;
            }
            transition_symbols.insert(prod.rhs[config.dot]);
        }
        for transition_symbol in transition_symbols {
            let mut next_state = StateInProgress::default();
            for &config_i in &state_configs {
                let config = &configs[config_i];
                let prod = &grammar.productions[config.production];
                if config.dot == prod.rhs.len() {
                    continue;
                }
                if prod.rhs[config.dot] != transition_symbol {
                    continue;
                }
                /* the transition successor is just the next config index */
                next_state.configs.push(config_i + 1);
            }
            close(&mut next_state, configs, grammar, lhs2sc);
            let next_state_i = match interned.get(&next_state.configs) {
                Some(&existing) => existing,
                None => {
                    let fresh = states.len();
                    interned.insert(next_state.configs.clone(), fresh);
                    states.push(next_state);
                    fresh
                }
            };
            states[state_i].actions.push(ActionInProgress {
                action: StateAction::Shift {
                    next_state: next_state_i,
                },
                context: BTreeSet::from([transition_symbol]),
            });
        }
    }
    add_reduction_actions(&mut states, configs, grammar);
    set_lr0_contexts(&mut states, grammar);
    states
}

/// Emits a reduce action for every completed configuration.
fn add_reduction_actions(
    states: &mut [StateInProgress],
    configs: &Configurations,
    grammar: &Grammar,
) {
    for state in states.iter_mut() {
        for &config_i in &state.configs {
            let config = &configs[config_i];
            let prod = &grammar.productions[config.production];
            if config.dot != prod.rhs.len() {
                continue;
            }
            state.actions.push(ActionInProgress {
                action: StateAction::Reduce {
                    production: config.production,
                },
                context: BTreeSet::new(),
            });
        }
    }
}

/// Seeds reduction contexts: `{end}` for the accept production, the full
/// terminal set otherwise. Lane tracing refines the latter when needed.
fn set_lr0_contexts(states: &mut [StateInProgress], grammar: &Grammar) {
    for state in states.iter_mut() {
        for action in &mut state.actions {
            let StateAction::Reduce { production } = action.action else {
                continue;
            };
            if production == grammar.accept_production() {
                action.context.insert(grammar.end_terminal());
            } else {
                action.context.extend(0..grammar.nterminals);
            }
        }
    }
}

fn is_nonterminal_shift(action: &ActionInProgress, grammar: &Grammar) -> bool {
    matches!(action.action, StateAction::Shift { .. })
        && action
            .context
            .iter()
            .next()
            .is_some_and(|&symbol| grammar.is_nonterminal(symbol))
}

/// A state is adequate iff no two of its actions claim a common terminal.
/// Shifts on nonterminals are goto entries and don't participate.
pub(super) fn determine_adequate_states(
    states: &[StateInProgress],
    grammar: &Grammar,
) -> Vec<bool> {
    let mut out = Vec::with_capacity(states.len());
    for state in states {
        let mut state_is_adequate = true;
        'pairs: for (a_i, action) in state.actions.iter().enumerate() {
            if is_nonterminal_shift(action, grammar) {
                continue;
            }
            for action2 in &state.actions[a_i + 1..] {
                if is_nonterminal_shift(action2, grammar) {
                    continue;
                }
                if !action.context.is_disjoint(&action2.context) {
                    state_is_adequate = false;
                    break 'pairs;
                }
            }
        }
        out.push(state_is_adequate);
    }
    out
}

/// Collects one [`Conflict`] per overlapping terminal for diagnostics,
/// naming the reducing production of each clash.
pub(super) fn collect_conflicts(states: &[StateInProgress], grammar: &Grammar) -> Vec<Conflict> {
    let mut out = Vec::new();
    for (state_i, state) in states.iter().enumerate() {
        for (a_i, action) in state.actions.iter().enumerate() {
            if is_nonterminal_shift(action, grammar) {
                continue;
            }
            for action2 in &state.actions[a_i + 1..] {
                if is_nonterminal_shift(action2, grammar) {
                    continue;
                }
                let production = match (action.action, action2.action) {
                    (StateAction::Reduce { production }, _) => production,
                    (_, StateAction::Reduce { production }) => production,
                    _ => continue,
                };
                for &terminal in action.context.intersection(&action2.context) {
                    out.push(Conflict {
                        state: state_i,
                        production,
                        terminal,
                    });
                }
            }
        }
    }
    out
}

/// Flattens states into the addressable state-config list.
pub(super) fn form_state_configs(states: &[StateInProgress]) -> Vec<StateConfig> {
    let mut out = Vec::new();
    for (state, sip) in states.iter().enumerate() {
        for config_in_state in 0..sip.configs.len() {
            out.push(StateConfig {
                state,
                config_in_state,
            });
        }
    }
    out
}

/// Maps each state to the ids of its state-configs.
pub(super) fn form_states_to_state_configs(
    scs: &[StateConfig],
    states: &[StateInProgress],
) -> NodeGraph {
    let mut out = make_graph_with_nnodes(states.len());
    for (sc_i, sc) in scs.iter().enumerate() {
        out[sc.state].push(sc_i);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::build_grammar;
    use crate::language::{Language, ProductionDef, TokenDef};

    fn sum_grammar() -> Grammar {
        let lang = Language {
            tokens: vec![TokenDef::new("int", "[0-9]+"), TokenDef::new("+", "\\+")],
            productions: vec![
                ProductionDef::new("sum", &["int"]),
                ProductionDef::new("sum", &["sum", "+", "int"]),
            ],
            ignored_tokens: vec![],
        };
        build_grammar(&lang).unwrap()
    }

    #[test]
    fn configs_enumerate_every_dot_position() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        // sum ::= int (2), sum ::= sum + int (4), accept ::= sum end (3)
        assert_eq!(configs.len(), 9);
        assert_eq!(configs[2], Config { production: 1, dot: 0 });
        assert_eq!(configs[5], Config { production: 1, dot: 3 });
    }

    #[test]
    fn start_state_is_closed_over_the_start_symbol() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        let lhs2sc = get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = build_lr0_parser(&configs, &grammar, &lhs2sc);
        // start state: accept ::= . sum end, sum ::= . int, sum ::= . sum + int
        let start = &states[0];
        assert_eq!(start.configs.len(), 3);
        for &config_i in &start.configs {
            assert_eq!(configs[config_i].dot, 0);
        }
    }

    #[test]
    fn states_are_deduplicated_by_config_set() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        let lhs2sc = get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = build_lr0_parser(&configs, &grammar, &lhs2sc);
        let mut seen = BTreeSet::new();
        for state in &states {
            assert!(seen.insert(state.configs.clone()), "duplicate state");
        }
        // int, sum-goto, + after sum, int after +, end after sum
        assert_eq!(states.len(), 6);
    }

    #[test]
    fn every_shift_context_is_a_singleton() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        let lhs2sc = get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = build_lr0_parser(&configs, &grammar, &lhs2sc);
        for state in &states {
            for action in &state.actions {
                if let StateAction::Shift { .. } = action.action {
                    assert_eq!(action.context.len(), 1);
                }
            }
        }
    }

    #[test]
    fn accept_reduction_context_is_end_only() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        let lhs2sc = get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = build_lr0_parser(&configs, &grammar, &lhs2sc);
        let mut found = false;
        for state in &states {
            for action in &state.actions {
                if action.action
                    == (StateAction::Reduce {
                        production: grammar.accept_production(),
                    })
                {
                    assert_eq!(action.context, BTreeSet::from([grammar.end_terminal()]));
                    found = true;
                }
            }
        }
        assert!(found);
    }

    #[test]
    fn state_configs_address_every_member() {
        let grammar = sum_grammar();
        let configs = make_configs(&grammar);
        let lhs2sc = get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = build_lr0_parser(&configs, &grammar, &lhs2sc);
        let scs = form_state_configs(&states);
        let states2scs = form_states_to_state_configs(&scs, &states);
        let total: usize = states.iter().map(|s| s.configs.len()).sum();
        assert_eq!(scs.len(), total);
        for (s_i, sc_ids) in states2scs.iter().enumerate() {
            assert_eq!(sc_ids.len(), states[s_i].configs.len());
            for (cis_i, &sc_i) in sc_ids.iter().enumerate() {
                assert_eq!(scs[sc_i].state, s_i);
                assert_eq!(scs[sc_i].config_in_state, cis_i);
            }
        }
    }
}

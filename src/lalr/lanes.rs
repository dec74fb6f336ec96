//! Lane tracing: Pager's algorithm for computing the lookahead context of
//! each reduction in an inadequate state.
//!
//! Lookaheads flow backwards through the LR(0) machine along *originator*
//! edges. Two per-state-config relations feed the originator graph:
//!
//! * *immediate predecessor*: within one state, `A → α · B β` precedes
//!   every `B → · γ` of the same state (the latter's lookaheads come from
//!   the former's follow string);
//! * *transition predecessor*: `A → α · X β` in a state precedes
//!   `A → α X · β` in the successor reached on `X`.
//!
//! An originator of a state-config is reached by zero or more transition
//! predecessor hops followed by exactly one immediate predecessor hop.
//! Both graphs are cyclic for any recursive grammar, so nothing is
//! transitively materialized; each source gets its own breadth-first walk.

use super::{get_first_set_of_string, Configurations, FirstSet, StateAction, StateConfig, StateInProgress};
use crate::error::BuildError;
use crate::grammar::Grammar;
use crate::graph::{add_edge, get_edges, make_graph_with_nnodes, NodeGraph};
use std::collections::{BTreeSet, VecDeque};

fn make_immediate_predecessor_graph(
    scs: &[StateConfig],
    states: &[StateInProgress],
    states2scs: &NodeGraph,
    configs: &Configurations,
    grammar: &Grammar,
) -> NodeGraph {
    let mut out = make_graph_with_nnodes(scs.len());
    for (s_i, state) in states.iter().enumerate() {
        for (cis_i, &config_i) in state.configs.iter().enumerate() {
            let config = &configs[config_i];
            let prod = &grammar.productions[config.production];
            if config.dot == prod.rhs.len() {
                continue;
            }
            let s = prod.rhs[config.dot];
            if grammar.is_terminal(s) {
                continue;
            }
            for (cis_j, &config_j) in state.configs.iter().enumerate() {
                let config2 = &configs[config_j];
                if config2.dot != 0 {
                    continue;
                }
                if grammar.productions[config2.production].lhs == s {
                    let sc_i = states2scs[s_i][cis_i];
                    let sc_j = states2scs[s_i][cis_j];
                    add_edge(&mut out, sc_j, sc_i);
                }
            }
        }
    }
    out
}

fn find_transition_predecessors(
    scs: &[StateConfig],
    states: &[StateInProgress],
    states2scs: &NodeGraph,
    configs: &Configurations,
    grammar: &Grammar,
) -> NodeGraph {
    let mut out = make_graph_with_nnodes(scs.len());
    for (state_i, state) in states.iter().enumerate() {
        for action in &state.actions {
            let StateAction::Shift { next_state } = action.action else {
                continue;
            };
            debug_assert_eq!(action.context.len(), 1);
            let symbol = *action.context.iter().next().expect("shift context");
            let state2 = &states[next_state];
            for (cis_i, &config_i) in state.configs.iter().enumerate() {
                let config = &configs[config_i];
                for (cis_j, &config_j) in state2.configs.iter().enumerate() {
                    let config2 = &configs[config_j];
                    if config.production == config2.production && config.dot + 1 == config2.dot {
                        let prod = &grammar.productions[config.production];
                        if prod.rhs[config.dot] == symbol {
                            let sc_i = states2scs[state_i][cis_i];
                            let sc_j = states2scs[next_state][cis_j];
                            add_edge(&mut out, sc_j, sc_i);
                        }
                    }
                }
            }
        }
    }
    out
}

/// Builds the originator graph by per-source BFS over transition
/// predecessors, emitting an originator at every immediate predecessor
/// edge encountered along the way.
pub(super) fn make_originator_graph(
    scs: &[StateConfig],
    states: &[StateInProgress],
    states2scs: &NodeGraph,
    configs: &Configurations,
    grammar: &Grammar,
) -> NodeGraph {
    let mut out = make_graph_with_nnodes(scs.len());
    let ipg = make_immediate_predecessor_graph(scs, states, states2scs, configs, grammar);
    let tpg = find_transition_predecessors(scs, states, states2scs, configs, grammar);
    for sc_i in 0..scs.len() {
        let mut originators: BTreeSet<usize> = BTreeSet::new();
        let mut tpq: VecDeque<usize> = VecDeque::new();
        let mut tps: BTreeSet<usize> = BTreeSet::new();
        tpq.push_back(sc_i);
        tps.insert(sc_i);
        while let Some(tpp) = tpq.pop_front() {
            for &tpc in get_edges(&tpg, tpp) {
                if tps.insert(tpc) {
                    tpq.push_back(tpc);
                }
            }
            for &ip_i in get_edges(&ipg, tpp) {
                originators.insert(ip_i);
            }
        }
        out[sc_i] = originators.into_iter().collect();
    }
    out
}

/// The follow string of a state-config `A → α · X β`: the symbols after
/// `X`, whose FIRST feeds the lookahead of `A → α X · β`.
fn get_follow_string(
    sc_addr: usize,
    scs: &[StateConfig],
    states: &[StateInProgress],
    configs: &Configurations,
    grammar: &Grammar,
) -> Vec<usize> {
    let sc = &scs[sc_addr];
    let config_i = states[sc.state].configs[sc.config_in_state];
    let config = &configs[config_i];
    let rhs = &grammar.productions[config.production].rhs;
    if config.dot + 1 >= rhs.len() {
        return Vec::new();
    }
    rhs[config.dot + 1..].to_vec()
}

/// One entry of the LANE or STACK: a state-config address, or one of
/// Pager's two bookkeeping marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneItem {
    Sc(usize),
    Marker,
    Zero,
}

/// Merges lanes when an in-lane state-config is reached again: markers
/// between its lane position and the ζ-pointer become zeros and reappear
/// on top (under the just-pushed originator when the tests had failed).
fn move_markers(
    lane: &mut Vec<LaneItem>,
    zeta_prime_addr: usize,
    zeta_pointer: usize,
    tests_failed: bool,
) {
    let loc_of_zeta_prime = lane
        .iter()
        .position(|&item| item == LaneItem::Sc(zeta_prime_addr))
        .expect("in-lane state-config is on the lane");
    let mut r = 0;
    let mut i = loc_of_zeta_prime + 1;
    while i < zeta_pointer {
        if lane[i] == LaneItem::Marker {
            r += 1;
            lane[i] = LaneItem::Zero;
        }
        i += 1;
    }
    let top = if tests_failed { lane.pop() } else { None };
    lane.extend(std::iter::repeat(LaneItem::Marker).take(r));
    if let Some(top) = top {
        lane.push(top);
    }
}

/// Folds freshly generated contexts into every ancestor on the lane.
///
/// Walking from the ζ-pointer upward, each ancestor's existing context is
/// subtracted from the generated set, and what remains is added to it, so
/// a state-config's context stays the union of the lookaheads of all
/// explored lanes through it.
fn context_adding_routine(
    lane: &[LaneItem],
    zeta_pointer: usize,
    contexts_generated: &mut BTreeSet<usize>,
    contexts: &mut [BTreeSet<usize>],
) {
    log::trace!("context adding: lane {:?}, generated {:?}", lane, contexts_generated);
    for r in (0..=zeta_pointer).rev() {
        if contexts_generated.is_empty() {
            break;
        }
        let LaneItem::Sc(tau_r_addr) = lane[r] else {
            continue;
        };
        for symbol in &contexts[tau_r_addr] {
            contexts_generated.remove(symbol);
        }
        contexts[tau_r_addr].extend(contexts_generated.iter().copied());
    }
}

/// Handles an originator that must itself be traced before its context can
/// flow: the first failure extends the lane, the second converts the lane
/// top into a marker pair split across LANE and STACK, later ones are
/// deferred on the STACK.
#[allow(clippy::too_many_arguments)]
fn deal_with_tests_failed(
    num_originators_failed: &mut usize,
    first_originator_failed: &mut Option<usize>,
    zeta_prime_addr: usize,
    tests_failed: &mut bool,
    lane: &mut Vec<LaneItem>,
    in_lane: &mut [bool],
    zeta_addr: usize,
    stack: &mut Vec<LaneItem>,
) {
    match *num_originators_failed {
        0 => {
            log::trace!("{} is the first originator of {} to fail", zeta_prime_addr, zeta_addr);
            *first_originator_failed = Some(zeta_prime_addr);
            lane.push(LaneItem::Sc(zeta_prime_addr));
            in_lane[zeta_prime_addr] = true;
            *tests_failed = true;
        }
        1 => {
            log::trace!("{} is the second originator of {} to fail", zeta_prime_addr, zeta_addr);
            let zeta_double_prime_addr =
                first_originator_failed.expect("first failed originator recorded");
            debug_assert_eq!(
                lane.last(),
                Some(&LaneItem::Sc(zeta_double_prime_addr))
            );
            debug_assert_eq!(
                lane.get(lane.len() - 2),
                Some(&LaneItem::Sc(zeta_addr))
            );
            lane.pop();
            lane.push(LaneItem::Marker);
            lane.push(LaneItem::Sc(zeta_double_prime_addr));
            stack.push(LaneItem::Marker);
            stack.push(LaneItem::Sc(zeta_prime_addr));
        }
        _ => {
            log::trace!("{} is a later originator of {} to fail", zeta_prime_addr, zeta_addr);
            stack.push(LaneItem::Sc(zeta_prime_addr));
        }
    }
    *num_originators_failed += 1;
}

/// Pager's heuristic propagation: when a lane completes at a dot-0
/// state-config, its siblings in the same state that also sit at dot 0 on
/// a production with the same LHS receive the same context and are marked
/// complete.
fn heuristic_propagation_of_context_sets(
    tau_addr: usize,
    contexts: &mut [BTreeSet<usize>],
    complete: &mut [bool],
    scs: &[StateConfig],
    states: &[StateInProgress],
    states2scs: &NodeGraph,
    configs: &Configurations,
    grammar: &Grammar,
) {
    let tau = &scs[tau_addr];
    let state = &states[tau.state];
    let config_i = state.configs[tau.config_in_state];
    let config = &configs[config_i];
    if config.dot != 0 {
        return;
    }
    let lhs = grammar.productions[config.production].lhs;
    for (cis_j, &config_j) in state.configs.iter().enumerate() {
        if config_j == config_i {
            continue;
        }
        let config2 = &configs[config_j];
        if config2.dot != 0 {
            continue;
        }
        if grammar.productions[config2.production].lhs != lhs {
            continue;
        }
        let tau_prime_addr = states2scs[tau.state][cis_j];
        contexts[tau_prime_addr] = contexts[tau_addr].clone();
        complete[tau_prime_addr] = true;
    }
}

/// Computes the context set of one reduction state-config ζⱼ.
///
/// This is the algorithm described by the flowchart in Figure 7 of Pager's
/// paper: a depth-first exploration of originator lanes using two stacks,
/// with per-state-config IN_LANE and COMPLETE flags. Each originator's
/// follow string is classified by its FIRST set: a non-null terminal
/// descendant generates contexts immediately; a nullable-only follow
/// string makes the originator's own context relevant, completing it
/// first when necessary.
#[allow(clippy::too_many_arguments)]
pub(super) fn compute_context_set(
    zeta_j_addr: usize,
    contexts: &mut Vec<BTreeSet<usize>>,
    complete: &mut Vec<bool>,
    scs: &[StateConfig],
    originator_graph: &NodeGraph,
    states: &[StateInProgress],
    states2scs: &NodeGraph,
    configs: &Configurations,
    first_sets: &[FirstSet],
    grammar: &Grammar,
) -> Result<(), BuildError> {
    log::trace!("computing context set for zeta_j = {}", zeta_j_addr);
    if complete[zeta_j_addr] {
        log::trace!("{} was already complete", zeta_j_addr);
        return Ok(());
    }
    let mut stack: Vec<LaneItem> = Vec::new();
    let mut lane: Vec<LaneItem> = Vec::new();
    let mut in_lane = vec![false; scs.len()];
    lane.push(LaneItem::Sc(zeta_j_addr));
    in_lane[zeta_j_addr] = true;
    let mut tests_failed = false;
    loop {
        let zeta_addr = match lane.last() {
            Some(&LaneItem::Sc(addr)) => addr,
            top => {
                return Err(BuildError::InternalInvariant(format!(
                    "lane top is {:?}, expected a state-config",
                    top
                )))
            }
        };
        let zeta_pointer = lane.len() - 1;
        log::trace!("top of lane is zeta = {}", zeta_addr);
        let mut num_originators_failed = 0usize;
        let mut first_originator_failed: Option<usize> = None;
        /* DO_LOOP */
        for &zeta_prime_addr in get_edges(originator_graph, zeta_addr) {
            let gamma = get_follow_string(zeta_prime_addr, scs, states, configs, grammar);
            let gamma_first = get_first_set_of_string(&gamma, first_sets);
            log::trace!(
                "originator zeta' = {}, follow string {:?}, FIRST symbols {:?}, nullable {}",
                zeta_prime_addr,
                gamma,
                gamma_first.symbols(),
                gamma_first.has_null()
            );
            if gamma_first.has_non_null_terminal_descendant() {
                /* test A */
                let mut contexts_generated = gamma_first.symbols().clone();
                if gamma_first.has_null() {
                    if complete[zeta_prime_addr] {
                        contexts_generated.extend(contexts[zeta_prime_addr].iter().copied());
                        context_adding_routine(&lane, zeta_pointer, &mut contexts_generated, contexts);
                    } else if !in_lane[zeta_prime_addr] {
                        context_adding_routine(&lane, zeta_pointer, &mut contexts_generated, contexts);
                        /* TRACE_FURTHER */
                        deal_with_tests_failed(
                            &mut num_originators_failed,
                            &mut first_originator_failed,
                            zeta_prime_addr,
                            &mut tests_failed,
                            &mut lane,
                            &mut in_lane,
                            zeta_addr,
                            &mut stack,
                        );
                    } else {
                        return Err(BuildError::AmbiguousGrammar);
                    }
                } else {
                    context_adding_routine(&lane, zeta_pointer, &mut contexts_generated, contexts);
                }
            } else if complete[zeta_prime_addr] {
                /* test B */
                let mut contexts_generated = contexts[zeta_prime_addr].clone();
                context_adding_routine(&lane, zeta_pointer, &mut contexts_generated, contexts);
            } else if in_lane[zeta_prime_addr] {
                /* test C */
                move_markers(&mut lane, zeta_prime_addr, zeta_pointer, tests_failed);
                let mut contexts_generated = contexts[zeta_prime_addr].clone();
                context_adding_routine(&lane, zeta_pointer, &mut contexts_generated, contexts);
            } else {
                deal_with_tests_failed(
                    &mut num_originators_failed,
                    &mut first_originator_failed,
                    zeta_prime_addr,
                    &mut tests_failed,
                    &mut lane,
                    &mut in_lane,
                    zeta_addr,
                    &mut stack,
                );
            }
        } /* END DO_LOOP */
        if tests_failed {
            log::trace!("tests failed, continuing with the extended lane");
            tests_failed = false;
            continue;
        }
        let mut keep_lane_popping = true;
        while keep_lane_popping {
            match *lane.last().expect("lane never drains below zeta_j") {
                LaneItem::Marker => {
                    /* STACK popping loop */
                    loop {
                        match stack.last().copied() {
                            Some(LaneItem::Marker) => {
                                stack.pop();
                                lane.pop();
                                break; /* back into LANE popping */
                            }
                            Some(LaneItem::Sc(addr)) if complete[addr] => {
                                stack.pop();
                            }
                            Some(LaneItem::Sc(addr)) => {
                                stack.pop();
                                lane.push(LaneItem::Sc(addr));
                                in_lane[addr] = true;
                                keep_lane_popping = false;
                                break; /* back into the top-level loop */
                            }
                            top => {
                                return Err(BuildError::InternalInvariant(format!(
                                    "stack top is {:?} during stack popping",
                                    top
                                )))
                            }
                        }
                    }
                }
                LaneItem::Zero => {
                    lane.pop();
                }
                LaneItem::Sc(tau_addr) => {
                    in_lane[tau_addr] = false;
                    complete[tau_addr] = true;
                    log::trace!("lane member {} completed with context {:?}", tau_addr, contexts[tau_addr]);
                    heuristic_propagation_of_context_sets(
                        tau_addr, contexts, complete, scs, states, states2scs, configs, grammar,
                    );
                    if lane.len() == 1 && lane[0] == LaneItem::Sc(zeta_j_addr) {
                        return Ok(());
                    }
                    lane.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::build_grammar;
    use crate::lalr::lr0;
    use crate::language::{Language, ProductionDef, TokenDef};

    fn machine_of(
        tokens: &[&str],
        productions: &[(&str, &[&str])],
    ) -> (Grammar, Configurations, Vec<StateInProgress>, Vec<StateConfig>, NodeGraph) {
        let lang = Language {
            tokens: tokens.iter().map(|&t| TokenDef::new(t, t)).collect(),
            productions: productions
                .iter()
                .map(|&(lhs, rhs)| ProductionDef::new(lhs, rhs))
                .collect(),
            ignored_tokens: vec![],
        };
        let grammar = build_grammar(&lang).unwrap();
        let configs = lr0::make_configs(&grammar);
        let lhs2sc = lr0::get_left_hand_sides_to_start_configs(&configs, &grammar);
        let states = lr0::build_lr0_parser(&configs, &grammar, &lhs2sc);
        let scs = lr0::form_state_configs(&states);
        let states2scs = lr0::form_states_to_state_configs(&scs, &states);
        (grammar, configs, states, scs, states2scs)
    }

    #[test]
    fn originators_of_a_start_config_include_its_introducer() {
        // in state 0, S ::= . A a introduces A ::= . x
        let (grammar, configs, states, scs, states2scs) =
            machine_of(&["a", "x"], &[("S", &["A", "a"]), ("A", &["x"])]);
        let og = make_originator_graph(&scs, &states, &states2scs, &configs, &grammar);
        // find the SC of A ::= . x in state 0 and of S ::= . A a in state 0
        let mut a_start = None;
        let mut s_start = None;
        for (cis, &config_i) in states[0].configs.iter().enumerate() {
            let config = &configs[config_i];
            let prod = &grammar.productions[config.production];
            if config.dot == 0 && grammar.symbol_name(prod.lhs) == "A" {
                a_start = Some(states2scs[0][cis]);
            }
            if config.dot == 0 && grammar.symbol_name(prod.lhs) == "S" {
                s_start = Some(states2scs[0][cis]);
            }
        }
        let (a_start, s_start) = (a_start.unwrap(), s_start.unwrap());
        assert!(og[a_start].contains(&s_start));
    }

    #[test]
    fn reduction_originators_cross_transitions() {
        // the SC of A ::= x . in the state after shifting x originates
        // from S ::= . A a back in state 0
        let (grammar, configs, states, scs, states2scs) =
            machine_of(&["a", "x"], &[("S", &["A", "a"]), ("A", &["x"])]);
        let og = make_originator_graph(&scs, &states, &states2scs, &configs, &grammar);
        for (sc_i, sc) in scs.iter().enumerate() {
            let config = &configs[states[sc.state].configs[sc.config_in_state]];
            let prod = &grammar.productions[config.production];
            if grammar.symbol_name(prod.lhs) == "A" && config.dot == prod.rhs.len() {
                // its sole originator is S ::= . A a with follow string "a"
                assert_eq!(og[sc_i].len(), 1);
                let origin = og[sc_i][0];
                let follow = get_follow_string(origin, &scs, &states, &configs, &grammar);
                assert_eq!(follow, vec![0]); // terminal a
                return;
            }
        }
        panic!("no completed A configuration found");
    }

    #[test]
    fn follow_string_is_empty_at_the_rhs_tail() {
        let (grammar, configs, states, scs, _states2scs) =
            machine_of(&["a", "x"], &[("S", &["A", "a"]), ("A", &["x"])]);
        for sc_addr in 0..scs.len() {
            let sc = &scs[sc_addr];
            let config = &configs[states[sc.state].configs[sc.config_in_state]];
            let rhs_len = grammar.productions[config.production].rhs.len();
            let follow = get_follow_string(sc_addr, &scs, &states, &configs, &grammar);
            if config.dot + 1 >= rhs_len {
                assert!(follow.is_empty());
            } else {
                assert_eq!(follow.len(), rhs_len - config.dot - 1);
            }
        }
    }

    #[test]
    fn move_markers_zeroes_between_and_restacks() {
        let mut lane = vec![
            LaneItem::Sc(7),
            LaneItem::Marker,
            LaneItem::Sc(3),
            LaneItem::Marker,
            LaneItem::Sc(5),
        ];
        // zeta_pointer at the top Sc(5)
        move_markers(&mut lane, 7, 4, false);
        assert_eq!(
            lane,
            vec![
                LaneItem::Sc(7),
                LaneItem::Zero,
                LaneItem::Sc(3),
                LaneItem::Zero,
                LaneItem::Sc(5),
                LaneItem::Marker,
                LaneItem::Marker,
            ]
        );
    }

    #[test]
    fn context_adding_subtracts_known_contexts() {
        let lane = vec![LaneItem::Sc(0), LaneItem::Sc(1)];
        let mut contexts = vec![BTreeSet::from([10]), BTreeSet::new()];
        let mut generated = BTreeSet::from([10, 11]);
        context_adding_routine(&lane, 1, &mut generated, &mut contexts);
        // 11 is new everywhere; 10 is stripped once state-config 0 absorbs it
        assert_eq!(contexts[1], BTreeSet::from([10, 11]));
        assert_eq!(contexts[0], BTreeSet::from([10, 11]));
    }
}

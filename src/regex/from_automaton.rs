//! DFA → regex by state elimination.
//!
//! Based on:
//!
//! > Brzozowski, Janusz A., and Edward J. McCluskey. "Signal flow graph
//! > techniques for sequential circuit state diagrams." IEEE Transactions
//! > on Electronic Computers 2 (1963): 67-76.
//! >
//! > Delgado, Manuel, and José Morais. "Approximation to the smallest
//! > regular expression for a given regular language." CIAA 2004.
//!
//! The interior states of the automaton are eliminated one at a time,
//! always the one whose removal is cheapest under the Delgado–Morais
//! weight. Path labels are [`RegexTerm`]s, a closed sum with simplifying
//! constructors; the aggressive algebra is what keeps the output short.

use crate::chartab::{get_char, negate_set};
use crate::fa::FiniteAutomaton;
use std::collections::BTreeSet;
use std::fmt;

/// A regular-expression term under construction.
#[derive(Debug, Clone)]
pub(crate) enum RegexTerm {
    /// The empty language.
    Null,
    /// The empty string.
    Epsilon,
    /// Any single character of the set.
    CharSet(BTreeSet<char>),
    /// Alternation; subterms are unordered and duplicate-free, and never
    /// themselves `Either`.
    Either(Vec<RegexTerm>),
    /// Concatenation; subterms are never themselves `Concat`.
    Concat(Vec<RegexTerm>),
    /// Kleene star.
    Star(Box<RegexTerm>),
}

use RegexTerm::{CharSet, Concat, Either, Epsilon, Null, Star};

impl PartialEq for RegexTerm {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Null, Null) | (Epsilon, Epsilon) => true,
            (CharSet(a), CharSet(b)) => a == b,
            (Concat(a), Concat(b)) => a == b,
            (Star(a), Star(b)) => a == b,
            // alternation compares as a set
            (Either(a), Either(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x == y))
            }
            _ => false,
        }
    }
}

impl Eq for RegexTerm {}

fn is_special(c: char) -> bool {
    ".[]()|-^*+?\\".contains(c)
}

fn charset_contents(s: &BTreeSet<char>) -> String {
    let mut s = s.clone();
    let mut result = String::new();
    for (lo, hi, label) in [('a', 'z', "a-z"), ('A', 'Z', "A-Z"), ('0', '9', "0-9")] {
        if (lo..=hi).all(|c| s.contains(&c)) {
            for c in lo..=hi {
                s.remove(&c);
            }
            result += label;
        }
    }
    for c in s {
        if is_special(c) {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Prints a character set the shorter of the two ways: as itself or as the
/// negation of its complement.
pub(crate) fn from_charset(s: &BTreeSet<char>) -> String {
    if let Some(&c) = s.iter().next() {
        if s.len() == 1 {
            let mut out = String::new();
            if is_special(c) {
                out.push('\\');
            }
            out.push(c);
            return out;
        }
    }
    let positive_contents = charset_contents(s);
    let negative_contents = charset_contents(&negate_set(s));
    if positive_contents.len() <= negative_contents.len() {
        format!("[{}]", positive_contents)
    } else {
        format!("[^{}]", negative_contents)
    }
}

impl RegexTerm {
    fn needs_parentheses(&self) -> bool {
        match self {
            Null | CharSet(_) | Star(_) => false,
            Epsilon | Concat(_) => true,
            Either(subs) => {
                if subs.iter().any(|se| matches!(se, Epsilon)) {
                    // printed with a ? postfix, already atomic
                    false
                } else {
                    either_needs_inner_parentheses(subs)
                }
            }
        }
    }
}

fn either_needs_inner_parentheses(subs: &[RegexTerm]) -> bool {
    let mut non_epsilon_count = 0;
    let mut single_needs_parens = false;
    for se in subs {
        if !matches!(se, Epsilon) {
            single_needs_parens = se.needs_parentheses();
            non_epsilon_count += 1;
        }
    }
    non_epsilon_count > 1 || single_needs_parens
}

impl fmt::Display for RegexTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Null => write!(f, "NULL"),
            Epsilon => write!(f, "epsilon"),
            CharSet(s) => write!(f, "{}", from_charset(s)),
            Either(subs) => {
                let has_epsilon = subs.iter().any(|se| matches!(se, Epsilon));
                let mut result = String::new();
                let mut had_non_epsilon = false;
                for se in subs {
                    if matches!(se, Epsilon) {
                        continue;
                    }
                    if had_non_epsilon {
                        result.push('|');
                    }
                    result += &se.to_string();
                    had_non_epsilon = true;
                }
                if has_epsilon {
                    if either_needs_inner_parentheses(subs) {
                        result = format!("({})", result);
                    }
                    result.push('?');
                }
                write!(f, "{}", result)
            }
            Concat(subs) => {
                for se in subs {
                    if se.needs_parentheses() {
                        write!(f, "({})", se)?;
                    } else {
                        write!(f, "{}", se)?;
                    }
                }
                Ok(())
            }
            Star(sub) => {
                if sub.needs_parentheses() {
                    write!(f, "({})*", sub)
                } else {
                    write!(f, "{}*", sub)
                }
            }
        }
    }
}

fn either_insert(subs: &mut Vec<RegexTerm>, term: &RegexTerm) {
    if !subs.iter().any(|existing| existing == term) {
        subs.push(term.clone());
    }
}

fn either_has_epsilon(subs: &[RegexTerm]) -> bool {
    subs.iter().any(|se| matches!(se, Epsilon))
}

/// `x?` is an alternation of ε with exactly one other term.
fn either_is_question(subs: &[RegexTerm]) -> bool {
    subs.len() == 2 && either_has_epsilon(subs)
}

fn either_only_subexpression(subs: &[RegexTerm]) -> Option<&RegexTerm> {
    subs.iter().find(|se| !matches!(se, Epsilon))
}

fn either_remove_epsilon(subs: &[RegexTerm]) -> RegexTerm {
    if subs.len() == 2 {
        return either_only_subexpression(subs)
            .cloned()
            .unwrap_or(Epsilon);
    }
    let mut out = Vec::new();
    for se in subs {
        if !matches!(se, Epsilon) {
            either_insert(&mut out, se);
        }
    }
    Either(out)
}

/// Absorptions of a star into an alternation: `x* | ε`, `x* | x*`, and
/// `x* | x?` are all just `x*`.
fn star_either_with(sub: &RegexTerm, other: &RegexTerm) -> Option<RegexTerm> {
    match other {
        Epsilon => Some(Star(Box::new(sub.clone()))),
        Star(other_sub) => (sub == other_sub.as_ref()).then(|| Star(Box::new(sub.clone()))),
        Either(other_subs) if either_is_question(other_subs) => {
            (either_only_subexpression(other_subs) == Some(sub))
                .then(|| Star(Box::new(sub.clone())))
        }
        _ => None,
    }
}

/// Absorptions of a star into a concatenation: `x* x*` and `x* x?` are
/// `x*`, and `x? x*` promotes to `x*`.
fn star_concat_with(sub: &RegexTerm, other: &RegexTerm) -> Option<RegexTerm> {
    match other {
        Star(other_sub) => (sub == other_sub.as_ref()).then(|| Star(Box::new(sub.clone()))),
        Either(other_subs) if either_is_question(other_subs) => {
            (either_only_subexpression(other_subs) == Some(sub))
                .then(|| Star(Box::new(sub.clone())))
        }
        _ => None,
    }
}

fn concat_subs(term: &RegexTerm) -> Vec<RegexTerm> {
    match term {
        Concat(subs) => subs.clone(),
        other => vec![other.clone()],
    }
}

fn concat_first_n(subs: &[RegexTerm], n: usize) -> RegexTerm {
    match n {
        0 => Epsilon,
        1 => subs[0].clone(),
        _ => Concat(subs[..n].to_vec()),
    }
}

fn concat_last_n(subs: &[RegexTerm], n: usize) -> RegexTerm {
    match n {
        0 => Epsilon,
        1 => subs[subs.len() - 1].clone(),
        _ => Concat(subs[subs.len() - n..].to_vec()),
    }
}

fn common_prefix_size(a: &[RegexTerm], b: &[RegexTerm]) -> usize {
    let max_size = b.len();
    (0..max_size).take_while(|&i| a[i] == b[i]).count()
}

fn common_suffix_size(a: &[RegexTerm], b: &[RegexTerm]) -> usize {
    let max_size = b.len();
    (0..max_size)
        .take_while(|&i| a[a.len() - 1 - i] == b[b.len() - 1 - i])
        .count()
}

/// Factors a common prefix or suffix out of `concat | other`, turning
/// `ab | cb` into `(a|c)b` and `ab | a` into `a b?`.
fn concat_either_with(subs: &[RegexTerm], other: &RegexTerm) -> Option<RegexTerm> {
    if let Concat(other_subs) = other {
        if other_subs.len() > subs.len() {
            return concat_either_with(other_subs, &Concat(subs.to_vec()));
        }
        let suffix_size = common_suffix_size(subs, other_subs);
        if suffix_size > 0 {
            let my_prefix = concat_first_n(subs, subs.len() - suffix_size);
            let other_prefix = concat_first_n(other_subs, other_subs.len() - suffix_size);
            let suffix = concat_last_n(subs, suffix_size);
            return Some(concat(&either(&my_prefix, &other_prefix), &suffix));
        }
        let prefix_size = common_prefix_size(subs, other_subs);
        if prefix_size > 0 {
            let my_suffix = concat_last_n(subs, subs.len() - prefix_size);
            let other_suffix = concat_last_n(other_subs, other_subs.len() - prefix_size);
            let prefix = concat_first_n(subs, prefix_size);
            return Some(concat(&prefix, &either(&my_suffix, &other_suffix)));
        }
        return None;
    }
    if subs[subs.len() - 1] == *other {
        let prefix = concat_first_n(subs, subs.len() - 1);
        return Some(concat(&either(&prefix, &Epsilon), other));
    }
    if subs[0] == *other {
        let suffix = concat_last_n(subs, subs.len() - 1);
        return Some(concat(other, &either(&suffix, &Epsilon)));
    }
    None
}

fn either_either_with(subs: &[RegexTerm], other: &RegexTerm) -> RegexTerm {
    if let Either(other_subs) = other {
        let mut result = Either(subs.to_vec());
        for other_se in other_subs {
            result = either(&result, other_se);
        }
        return result;
    }
    let mut result = Vec::new();
    let mut did_combine = false;
    for se in subs {
        let combined = either(se, other);
        if !matches!(combined, Either(_)) {
            either_insert(&mut result, &combined);
            did_combine = true;
        } else {
            either_insert(&mut result, se);
        }
    }
    if !did_combine {
        either_insert(&mut result, other);
    }
    Either(result)
}

/// Alternation with simplification: `∅` is the unit, equal terms merge,
/// character sets union, stars absorb `ε` and `?` forms, and common
/// prefixes and suffixes factor out of concatenations.
pub(crate) fn either(a: &RegexTerm, b: &RegexTerm) -> RegexTerm {
    if a == b {
        return a.clone();
    }
    if matches!(a, Null) {
        return b.clone();
    }
    if matches!(b, Null) {
        return a.clone();
    }
    if let Star(sub) = a {
        if let Some(result) = star_either_with(sub, b) {
            return result;
        }
    }
    if let Star(sub) = b {
        if let Some(result) = star_either_with(sub, a) {
            return result;
        }
    }
    if let Concat(subs) = a {
        if let Some(result) = concat_either_with(subs, b) {
            return result;
        }
    }
    if let Concat(subs) = b {
        if let Some(result) = concat_either_with(subs, a) {
            return result;
        }
    }
    if let Either(subs) = a {
        return either_either_with(subs, b);
    }
    if let Either(subs) = b {
        return either_either_with(subs, a);
    }
    if let (CharSet(sa), CharSet(sb)) = (a, b) {
        return CharSet(sa.union(sb).copied().collect());
    }
    let mut subs = Vec::new();
    either_insert(&mut subs, a);
    either_insert(&mut subs, b);
    Either(subs)
}

/// Kleene star with simplification: `∅* = ∅`, `ε* = ε`, `(x*)* = x*`, and
/// an inner ε-alternative is absorbed, `(x?)* = x*`.
pub(crate) fn star(a: &RegexTerm) -> RegexTerm {
    match a {
        Null => Null,
        Epsilon => Epsilon,
        Star(_) => a.clone(),
        Either(subs) if either_has_epsilon(subs) => star(&either_remove_epsilon(subs)),
        _ => Star(Box::new(a.clone())),
    }
}

/// Concatenation with simplification: `∅` dominates, `ε` is the unit, and
/// adjacent stars of the same body collapse.
pub(crate) fn concat(a: &RegexTerm, b: &RegexTerm) -> RegexTerm {
    if matches!(a, Null) || matches!(b, Null) {
        return Null;
    }
    if matches!(a, Epsilon) {
        return b.clone();
    }
    if matches!(b, Epsilon) {
        return a.clone();
    }
    if let Star(sub) = a {
        if let Some(result) = star_concat_with(sub, b) {
            return result;
        }
    }
    if let Star(sub) = b {
        if let Some(result) = star_concat_with(sub, a) {
            return result;
        }
    }
    if let Concat(subs) = a {
        return concat_append_with(subs, b);
    }
    if let Concat(subs) = b {
        return concat_prepend_with(subs, a);
    }
    Concat(vec![a.clone(), b.clone()])
}

fn concat_append_with(subs: &[RegexTerm], other: &RegexTerm) -> RegexTerm {
    if let Concat(other_subs) = other {
        let mut result = Concat(subs.to_vec());
        for se in other_subs {
            result = concat(&result, se);
        }
        return result;
    }
    // try to combine the last subterm with the incoming term
    let all_but_last = concat_first_n(subs, subs.len() - 1);
    let last = concat_last_n(subs, 1);
    let combined = concat(&last, other);
    if matches!(combined, Concat(_)) {
        // nothing combined
        let mut result = concat_subs(&all_but_last);
        result.extend(concat_subs(&combined));
        Concat(result)
    } else {
        concat(&all_but_last, &combined)
    }
}

fn concat_prepend_with(subs: &[RegexTerm], other: &RegexTerm) -> RegexTerm {
    if let Concat(other_subs) = other {
        let mut result = Concat(subs.to_vec());
        for se in other_subs.iter().rev() {
            result = concat(se, &result);
        }
        return result;
    }
    let all_but_first = concat_last_n(subs, subs.len() - 1);
    let first = concat_first_n(subs, 1);
    let combined = concat(other, &first);
    if matches!(combined, Concat(_)) {
        let mut result = concat_subs(&combined);
        result.extend(concat_subs(&all_but_first));
        Concat(result)
    } else {
        concat(&combined, &all_but_first)
    }
}

fn update_path(i: usize, j: usize, k: usize, l: &mut [Vec<RegexTerm>]) {
    let through = concat(&l[i][k], &concat(&star(&l[k][k]), &l[k][j]));
    let merged = either(&l[i][j], &through);
    l[i][j] = merged;
}

/// Converts a DFA into a regex string accepting the same language.
///
/// A virtual accepting state F is appended; interior states are
/// eliminated in the order of ascending Delgado–Morais weight (self-loop
/// `len·(in·out−1)`, each outgoing edge `len·(in−1)`, each incoming edge
/// `len·(out−1)`). What remains is a two-node graph between the start
/// state and F, read off directly.
pub fn from_automaton(fa: &FiniteAutomaton) -> String {
    assert!(fa.is_deterministic(), "state elimination needs a DFA");
    let nstates = fa.nstates();
    let n = nstates + 1;
    let mut l: Vec<Vec<RegexTerm>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { Epsilon } else { Null }).collect())
        .collect();
    for i in 0..nstates {
        for s in 0..fa.nsymbols() {
            if let Some(j) = fa.step(i, s) {
                let label = CharSet(BTreeSet::from([get_char(s)]));
                let merged = either(&l[i][j], &label);
                l[i][j] = merged;
            }
        }
    }
    // a single virtual accepting state, reached by epsilon
    for i in 0..nstates {
        if fa.accepts(i).is_some() {
            l[i][nstates] = Epsilon;
        }
    }
    let mut vertex_exists = vec![true; n];
    for _ in 0..nstates.saturating_sub(1) {
        // pick the vertex to remove by the weight heuristic of Delgado
        // and Morais
        let mut min_weight_state = None;
        let mut min_weight = 0i64;
        for i in 1..nstates {
            if !vertex_exists[i] {
                continue;
            }
            let mut indeg = 0i64;
            let mut outdeg = 0i64;
            for j in 0..n {
                if !matches!(l[i][j], Null) {
                    outdeg += 1;
                }
                if !matches!(l[j][i], Null) {
                    indeg += 1;
                }
            }
            let mut weight = 0i64;
            if !matches!(l[i][i], Null) {
                weight += l[i][i].to_string().len() as i64 * (indeg * outdeg - 1);
            }
            for j in 0..n {
                if !matches!(l[i][j], Null) {
                    weight += l[i][j].to_string().len() as i64 * (indeg - 1);
                }
                if !matches!(l[j][i], Null) {
                    weight += l[j][i].to_string().len() as i64 * (outdeg - 1);
                }
            }
            if min_weight_state.is_none() || weight < min_weight {
                min_weight_state = Some(i);
                min_weight = weight;
            }
        }
        let k = min_weight_state.expect("an interior vertex remains");
        for i in 0..n {
            if !vertex_exists[i] {
                continue;
            }
            for j in 0..n {
                if !vertex_exists[j] {
                    continue;
                }
                update_path(i, i, k, &mut l);
                update_path(j, j, k, &mut l);
                update_path(i, j, k, &mut l);
                update_path(j, i, k, &mut l);
            }
        }
        vertex_exists[k] = false;
    }
    let f = nstates;
    let s = 0;
    concat(
        &star(&l[s][s]),
        &concat(
            &l[s][f],
            &star(&either(
                &concat(&l[f][s], &concat(&star(&l[s][s]), &l[s][f])),
                &l[f][f],
            )),
        ),
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::{accepts, build_dfa};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn cs(chars: &str) -> RegexTerm {
        CharSet(chars.chars().collect())
    }

    #[test]
    fn either_is_idempotent_and_absorbs_null() {
        let a = cs("a");
        assert_eq!(either(&a, &a), a);
        assert_eq!(either(&Null, &a), a);
        assert_eq!(either(&a, &Null), a);
    }

    #[test]
    fn charsets_merge_under_either() {
        assert_eq!(either(&cs("ab"), &cs("bc")), cs("abc"));
    }

    #[test]
    fn epsilon_is_the_concat_unit_and_null_dominates() {
        let a = cs("a");
        assert_eq!(concat(&Epsilon, &a), a);
        assert_eq!(concat(&a, &Epsilon), a);
        assert_eq!(concat(&Null, &a), Null);
        assert_eq!(concat(&a, &Null), Null);
    }

    #[test]
    fn star_collapses_stars_and_inner_epsilon() {
        let a = cs("a");
        let astar = star(&a);
        assert_eq!(star(&astar), astar);
        assert_eq!(star(&Epsilon), Epsilon);
        assert_eq!(star(&either(&a, &Epsilon)), astar);
    }

    #[test]
    fn star_absorbs_adjacent_forms() {
        let a = cs("a");
        let astar = star(&a);
        assert_eq!(concat(&astar, &astar), astar);
        assert_eq!(concat(&astar, &either(&a, &Epsilon)), astar);
        assert_eq!(either(&astar, &Epsilon), astar);
        assert_eq!(either(&astar, &either(&a, &Epsilon)), astar);
    }

    #[test]
    fn common_suffix_factors_out() {
        // ab | cb = (a|c)b
        let ab = concat(&cs("a"), &cs("b"));
        let cb = concat(&cs("c"), &cs("b"));
        let merged = either(&ab, &cb);
        assert_eq!(merged, concat(&cs("ac"), &cs("b")));
    }

    #[test]
    fn subset_concat_becomes_question() {
        // ab | b = a?b
        let ab = concat(&cs("a"), &cs("b"));
        let merged = either(&ab, &cs("b"));
        assert_eq!(merged.to_string(), "a?b");
    }

    #[test]
    fn question_prints_with_postfix() {
        let a = cs("a");
        assert_eq!(either(&a, &Epsilon).to_string(), "a?");
        let ab = concat(&cs("a"), &cs("b"));
        assert_eq!(either(&ab, &Epsilon).to_string(), "(ab)?");
    }

    #[test]
    fn printer_parenthesizes_alternations_in_context() {
        let ab = either(&cs("a"), &concat(&cs("b"), &cs("c")));
        let under_star = star(&ab);
        assert_eq!(under_star.to_string(), "(a|bc)*");
        let under_concat = concat(&cs("x"), &ab);
        assert_eq!(under_concat.to_string(), "x(a|bc)");
    }

    #[test]
    fn single_special_characters_print_escaped() {
        assert_eq!(cs("+").to_string(), "\\+");
        assert_eq!(cs(".").to_string(), "\\.");
    }

    #[test]
    fn charset_prints_ranges_and_negations() {
        let lower: BTreeSet<char> = ('a'..='z').collect();
        assert_eq!(CharSet(lower.clone()).to_string(), "[a-z]");
        let negated = crate::chartab::negate_set(&BTreeSet::from(['x']));
        assert_eq!(CharSet(negated).to_string(), "[^x]");
    }

    fn assert_round_trip(pattern: &str, accepted: &[&str], rejected: &[&str]) {
        let dfa = build_dfa("original", pattern, 0).unwrap();
        let printed = from_automaton(&dfa);
        let dfa2 = build_dfa("round-tripped", &printed, 0).unwrap();
        for text in accepted {
            assert_eq!(accepts(&dfa, text), Some(0), "{:?} on {:?}", pattern, text);
            assert_eq!(
                accepts(&dfa2, text),
                Some(0),
                "{:?} (printed {:?}) on {:?}",
                pattern,
                printed,
                text
            );
        }
        for text in rejected {
            assert_eq!(accepts(&dfa, text), None, "{:?} on {:?}", pattern, text);
            assert_eq!(
                accepts(&dfa2, text),
                None,
                "{:?} (printed {:?}) on {:?}",
                pattern,
                printed,
                text
            );
        }
    }

    #[test]
    fn round_trip_preserves_language() {
        init_logger();
        assert_round_trip(
            "a(b|c)*d",
            &["ad", "abd", "acbbd"],
            &["a", "abc", "d", "abdd"],
        );
        assert_round_trip("[0-9]+", &["0", "42", "007"], &["", "4x", "x"]);
        assert_round_trip("ab|ac", &["ab", "ac"], &["a", "bc", "abc"]);
        assert_round_trip("x?y", &["y", "xy"], &["x", "xxy"]);
    }
}

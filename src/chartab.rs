//! The fixed character table.
//!
//! Automata in this crate do not transition on raw bytes but on small
//! contiguous *symbol* indices. This module owns the bijection between the
//! legal input characters and those indices. Characters outside the table
//! are rejected at build time.

use once_cell::sync::Lazy;
use std::collections::BTreeSet;

/// The legal input alphabet, in symbol-index order: tab, line feed, carriage
/// return, then the printable ASCII range.
const LEGAL_CHARS: &[u8] =
    b"\t\n\r !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Number of distinct symbols, i.e. the alphabet size of every character
/// automaton built by this crate.
pub const NCHARS: usize = LEGAL_CHARS.len();

static CHAR_TO_SYMBOL: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut tab = [-1i16; 256];
    for (symbol, &c) in LEGAL_CHARS.iter().enumerate() {
        tab[c as usize] = symbol as i16;
    }
    tab
});

/// Returns `true` if `c` has a symbol index.
pub fn is_symbol(c: char) -> bool {
    c.is_ascii() && CHAR_TO_SYMBOL[c as usize] >= 0
}

/// Returns the symbol index of `c`, or `None` if the character is not part
/// of the legal alphabet.
pub fn try_symbol(c: char) -> Option<usize> {
    if !c.is_ascii() {
        return None;
    }
    match CHAR_TO_SYMBOL[c as usize] {
        s if s >= 0 => Some(s as usize),
        _ => None,
    }
}

/// Returns the symbol index of `c`.
///
/// Panics if `c` is not in the table; callers that take untrusted input
/// should use [`try_symbol`] instead.
pub fn get_symbol(c: char) -> usize {
    match try_symbol(c) {
        Some(s) => s,
        None => panic!("character {:?} has no symbol index", c),
    }
}

/// Returns the character of a symbol index.
pub fn get_char(symbol: usize) -> char {
    assert!(symbol < NCHARS, "symbol {} out of range", symbol);
    LEGAL_CHARS[symbol] as char
}

/// Complements a character set with respect to the legal alphabet.
pub fn negate_set(s: &BTreeSet<char>) -> BTreeSet<char> {
    let mut out = BTreeSet::new();
    for symbol in 0..NCHARS {
        let c = get_char(symbol);
        if !s.contains(&c) {
            out.insert(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_symbols() {
        for symbol in 0..NCHARS {
            let c = get_char(symbol);
            assert!(is_symbol(c));
            assert_eq!(get_symbol(c), symbol);
        }
    }

    #[test]
    fn rejects_out_of_table_characters() {
        assert_eq!(try_symbol('\x07'), None);
        assert_eq!(try_symbol('é'), None);
        assert!(!is_symbol('\x00'));
    }

    #[test]
    fn table_is_a_bijection() {
        let mut seen = BTreeSet::new();
        for symbol in 0..NCHARS {
            assert!(seen.insert(get_char(symbol)));
        }
        assert_eq!(seen.len(), NCHARS);
    }

    #[test]
    fn negate_set_complements() {
        let s: BTreeSet<char> = ['a', 'b', 'c'].into_iter().collect();
        let n = negate_set(&s);
        assert_eq!(n.len(), NCHARS - 3);
        assert!(!n.contains(&'a'));
        assert!(n.contains(&'d'));
        assert_eq!(negate_set(&n), s);
    }
}

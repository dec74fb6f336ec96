//! The bootstrapped regex front-end.
//!
//! Regex syntax is itself declared as a [`Language`] and compiled by the
//! same LALR(1) pipeline as any user language. The one thing that cannot
//! come from a regex is the regex lexer, so [`build_lexer`] assembles it
//! by hand from automaton primitives. The resulting parser tables are
//! built once per process and reused for every token of every user
//! language.
//!
//! The grammar's top productions follow the `grep.y` YACC grammar of
//! Plan 9's grep; the character-set productions follow a Prolog teaching
//! grammar for Perl regex sets.

mod from_automaton;

pub use from_automaton::from_automaton;

use crate::chartab::{self, negate_set, NCHARS};
use crate::driver::{Driver, Semantics};
use crate::error::{BuildError, ParseError};
use crate::fa::{make_char_set_nfa, make_char_single_nfa, FiniteAutomaton};
use crate::grammar::build_grammar;
use crate::lalr::{accept_parser, build_lalr1_parser};
use crate::language::{Language, ProductionDef, TokenDef};
use crate::tables::{Indentation, ParserTables};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;

const PROD_REGEX: usize = 0;
const PROD_UNION_DECAY: usize = 1;
const PROD_UNION: usize = 2;
const PROD_CONCAT_DECAY: usize = 3;
const PROD_CONCAT: usize = 4;
const PROD_QUAL_DECAY: usize = 5;
const PROD_STAR: usize = 6;
const PROD_PLUS: usize = 7;
const PROD_MAYBE: usize = 8;
const PROD_SINGLE_CHAR: usize = 9;
const PROD_ANY: usize = 10;
const PROD_SINGLE_SET: usize = 11;
const PROD_PARENS_UNION: usize = 12;
const PROD_SET_POSITIVE: usize = 13;
const PROD_SET_NEGATIVE: usize = 14;
const PROD_POSITIVE_SET: usize = 15;
const PROD_NEGATIVE_SET: usize = 16;
const PROD_SET_ITEMS_DECAY: usize = 17;
const PROD_SET_ITEMS_ADD: usize = 18;
const PROD_SET_ITEM_CHAR: usize = 19;
const PROD_SET_ITEM_RANGE: usize = 20;
const PROD_RANGE: usize = 21;
const NPRODS: usize = 22;

const TOK_CHAR: usize = 0;
const NTOKS: usize = 12;

const META_CHARS: &str = ".[]()|-^*+?";

/// The regex language itself: 12 tokens and 22 productions.
pub fn build_language() -> Language {
    let productions = vec![
        ProductionDef::new("regex", &["union"]),
        ProductionDef::new("union", &["concat"]),
        ProductionDef::new("union", &["union", "|", "concat"]),
        ProductionDef::new("concat", &["qualified"]),
        ProductionDef::new("concat", &["concat", "qualified"]),
        ProductionDef::new("qualified", &["single"]),
        ProductionDef::new("qualified", &["qualified", "*"]),
        ProductionDef::new("qualified", &["qualified", "+"]),
        ProductionDef::new("qualified", &["qualified", "?"]),
        ProductionDef::new("single", &["char"]),
        ProductionDef::new("single", &["."]),
        ProductionDef::new("single", &["set"]),
        ProductionDef::new("single", &["(", "union", ")"]),
        ProductionDef::new("set", &["positive-set"]),
        ProductionDef::new("set", &["negative-set"]),
        ProductionDef::new("positive-set", &["[", "set-items", "]"]),
        ProductionDef::new("negative-set", &["[", "^", "set-items", "]"]),
        ProductionDef::new("set-items", &["set-item"]),
        ProductionDef::new("set-items", &["set-items", "set-item"]),
        ProductionDef::new("set-item", &["char"]),
        ProductionDef::new("set-item", &["range"]),
        ProductionDef::new("range", &["char", "-", "char"]),
    ];
    debug_assert_eq!(productions.len(), NPRODS);
    // either one of the non-meta characters, or anything preceded by the
    // escape slash
    let tokens = vec![
        TokenDef::new("char", "[^\\\\\\.\\[\\]\\(\\)\\|\\-\\^\\*\\+\\?]|\\\\."),
        TokenDef::new(".", "\\."),
        TokenDef::new("[", "\\["),
        TokenDef::new("]", "\\]"),
        TokenDef::new("(", "\\("),
        TokenDef::new(")", "\\)"),
        TokenDef::new("|", "\\|"),
        TokenDef::new("-", "\\-"),
        TokenDef::new("^", "\\^"),
        TokenDef::new("*", "\\*"),
        TokenDef::new("+", "\\+"),
        TokenDef::new("?", "\\?"),
    ];
    debug_assert_eq!(tokens.len(), NTOKS);
    Language {
        tokens,
        productions,
        ignored_tokens: vec![],
    }
}

/// The hand-built regex lexer.
///
/// Bootstrap: this lexer is used to build the parser tables that read
/// regular expressions themselves, so it can't depend on that parser.
pub fn build_lexer() -> FiniteAutomaton {
    let all_chars: BTreeSet<usize> = (0..NCHARS).collect();
    let mut nonmeta_chars = all_chars.clone();
    for meta_char in META_CHARS.chars() {
        nonmeta_chars.remove(&chartab::get_symbol(meta_char));
    }
    let lex_nonmeta = FiniteAutomaton::make_set_nfa(NCHARS, &nonmeta_chars, TOK_CHAR);
    let lex_slash = make_char_single_nfa('\\', TOK_CHAR);
    let lex_any = FiniteAutomaton::make_set_nfa(NCHARS, &all_chars, TOK_CHAR);
    let lex_escaped = FiniteAutomaton::concat(&lex_slash, &lex_any, TOK_CHAR);
    let lex_char = FiniteAutomaton::unite(&lex_nonmeta, &lex_escaped);
    let mut lex_metachars: Option<FiniteAutomaton> = None;
    for (i, meta_char) in META_CHARS.chars().enumerate() {
        let token = TOK_CHAR + i + 1;
        let lex_metachar = make_char_single_nfa(meta_char, token);
        lex_metachars = Some(match lex_metachars {
            None => lex_metachar,
            Some(acc) => FiniteAutomaton::unite(&acc, &lex_metachar),
        });
    }
    let out = FiniteAutomaton::unite(&lex_char, &lex_metachars.expect("metachars exist"));
    FiniteAutomaton::simplify(&FiniteAutomaton::make_deterministic(&out))
}

static REGEX_PARSER_TABLES: Lazy<ParserTables> = Lazy::new(|| {
    let language = build_language();
    let grammar = build_grammar(&language).expect("the regex grammar resolves");
    let pip = build_lalr1_parser(grammar).expect("the regex grammar is LALR(1)");
    let shift_reduce = accept_parser(&pip).expect("the regex machine is adequate");
    let lexer = build_lexer();
    ParserTables {
        shift_reduce,
        lexer,
        indent_info: Indentation::default(),
    }
});

/// The process-wide regex parser tables, built on first use.
pub fn ask_parser_tables() -> &'static ParserTables {
    &REGEX_PARSER_TABLES
}

/// A value on the regex parse stack.
enum RegexValue {
    None,
    Char(char),
    Set(BTreeSet<char>),
    Fa(FiniteAutomaton),
}

fn take_args<const N: usize>(rhs: Vec<RegexValue>) -> Result<[RegexValue; N], ParseError> {
    rhs.try_into()
        .map_err(|_| ParseError::new("regex reduction with unexpected arity"))
}

fn as_fa(value: RegexValue) -> Result<FiniteAutomaton, ParseError> {
    match value {
        RegexValue::Fa(fa) => Ok(fa),
        _ => Err(ParseError::new("regex reduction expected an automaton")),
    }
}

fn as_char(value: RegexValue) -> Result<char, ParseError> {
    match value {
        RegexValue::Char(c) => Ok(c),
        _ => Err(ParseError::new("regex reduction expected a character")),
    }
}

fn as_set(value: RegexValue) -> Result<BTreeSet<char>, ParseError> {
    match value {
        RegexValue::Set(s) => Ok(s),
        _ => Err(ParseError::new("regex reduction expected a character set")),
    }
}

/// Reduces regex syntax to automata using the combinators; every accepting
/// state carries `result_token`.
struct RegexSemantics {
    result_token: usize,
}

impl Semantics for RegexSemantics {
    type Value = RegexValue;

    fn shift(&mut self, terminal: usize, text: &str) -> Result<RegexValue, ParseError> {
        if terminal != TOK_CHAR {
            return Ok(RegexValue::None);
        }
        let chars: Vec<char> = text.chars().collect();
        match chars.as_slice() {
            [c] => Ok(RegexValue::Char(*c)),
            ['\\', c] => Ok(RegexValue::Char(*c)),
            _ => Err(ParseError::new(format!(
                "regex char token with text {:?}",
                text
            ))),
        }
    }

    fn reduce(&mut self, production: usize, rhs: Vec<RegexValue>) -> Result<RegexValue, ParseError> {
        let token = self.result_token;
        Ok(match production {
            PROD_REGEX => {
                let [a] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::simplify(
                    &FiniteAutomaton::make_deterministic(&as_fa(a)?),
                ))
            }
            PROD_UNION_DECAY | PROD_CONCAT_DECAY | PROD_QUAL_DECAY | PROD_SET_ITEMS_DECAY
            | PROD_SET_ITEM_RANGE | PROD_SET_POSITIVE => {
                let [a] = take_args(rhs)?;
                a
            }
            PROD_UNION => {
                let [a, _, b] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::unite(&as_fa(a)?, &as_fa(b)?))
            }
            PROD_CONCAT => {
                let [a, b] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::concat(&as_fa(a)?, &as_fa(b)?, token))
            }
            PROD_STAR => {
                let [a, _] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::star(&as_fa(a)?, token))
            }
            PROD_PLUS => {
                let [a, _] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::plus(&as_fa(a)?, token))
            }
            PROD_MAYBE => {
                let [a, _] = take_args(rhs)?;
                RegexValue::Fa(FiniteAutomaton::maybe(&as_fa(a)?, token))
            }
            PROD_SINGLE_CHAR => {
                let [a] = take_args(rhs)?;
                RegexValue::Fa(make_char_single_nfa(as_char(a)?, token))
            }
            PROD_ANY => RegexValue::Fa(FiniteAutomaton::make_range_nfa(
                NCHARS,
                0,
                NCHARS - 1,
                token,
            )),
            PROD_SINGLE_SET => {
                let [a] = take_args(rhs)?;
                RegexValue::Fa(make_char_set_nfa(&as_set(a)?, token))
            }
            PROD_PARENS_UNION => {
                let [_, a, _] = take_args(rhs)?;
                a
            }
            PROD_SET_NEGATIVE => {
                let [a] = take_args(rhs)?;
                RegexValue::Set(negate_set(&as_set(a)?))
            }
            PROD_POSITIVE_SET => {
                let [_, a, _] = take_args(rhs)?;
                a
            }
            PROD_NEGATIVE_SET => {
                let [_, _, a, _] = take_args(rhs)?;
                a
            }
            PROD_SET_ITEMS_ADD => {
                let [a, b] = take_args(rhs)?;
                let mut set = as_set(a)?;
                set.extend(as_set(b)?);
                RegexValue::Set(set)
            }
            PROD_SET_ITEM_CHAR => {
                let [a] = take_args(rhs)?;
                RegexValue::Set(BTreeSet::from([as_char(a)?]))
            }
            PROD_RANGE => {
                let [lo, _, hi] = take_args(rhs)?;
                let (lo, hi) = (as_char(lo)?, as_char(hi)?);
                let mut set = BTreeSet::new();
                let mut c = lo as u32;
                while c <= hi as u32 {
                    set.insert(char::from_u32(c).expect("ascii range"));
                    c += 1;
                }
                RegexValue::Set(set)
            }
            _ => {
                return Err(ParseError::new(format!(
                    "unexpected regex production {}",
                    production
                )))
            }
        })
    }
}

/// Builds the minimal DFA of one token's regex; every accepting state
/// carries `token`.
///
/// On a parse failure the parse is repeated with a step trace, and the
/// trace goes into the error message along with the token's name.
pub fn build_dfa(name: &str, regex: &str, token: usize) -> Result<FiniteAutomaton, BuildError> {
    let tables = ask_parser_tables();
    let mut driver = Driver::new(tables, RegexSemantics {
        result_token: token,
    });
    match driver.parse(regex, name) {
        Ok(RegexValue::Fa(fa)) => Ok(fa),
        Ok(_) => Err(BuildError::InternalInvariant(format!(
            "regex parse of token {:?} produced a non-automaton value",
            name
        ))),
        Err(e) => {
            let mut debug_driver = Driver::new(tables, RegexSemantics {
                result_token: token,
            })
            .with_trace();
            let _ = debug_driver.parse(regex, name);
            Err(BuildError::RegexParse(format!(
                "{}\ncouldn't build DFA for token {:?} regex {:?}\nrepeating with a step trace:\n{}",
                e,
                name,
                regex,
                debug_driver.take_trace()
            )))
        }
    }
}

/// Runs a DFA over the whole of `text`, returning the accepted token.
pub fn accepts(dfa: &FiniteAutomaton, text: &str) -> Option<usize> {
    let mut state = 0;
    for c in text.chars() {
        let symbol = chartab::try_symbol(c)?;
        state = dfa.step(state, symbol)?;
    }
    dfa.accepts(state)
}

/// Returns `true` if `text` as a whole matches `regex`.
pub fn matches(regex: &str, text: &str) -> Result<bool, BuildError> {
    let dfa = build_dfa("first arg of matches", regex, 0)?;
    Ok(accepts(&dfa, text) == Some(0))
}

/// A regex for the first occurrence of a string: matches every prefix of
/// the input that ends with the first occurrence of `s`.
pub fn for_first_occurrence_of(s: &str) -> Result<String, BuildError> {
    let fa = build_dfa("ends-with", &format!(".*{}", s), 0)?;
    let fa = FiniteAutomaton::remove_transitions_from_accepting(&fa);
    Ok(from_automaton(&fa))
}

/// A regex matching `s` with the case of every letter ignored.
pub fn for_case_insensitive(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        if c.is_ascii_lowercase() {
            result.push('[');
            result.push(c);
            result.push(c.to_ascii_uppercase());
            result.push(']');
        } else if c.is_ascii_uppercase() {
            result.push('[');
            result.push(c.to_ascii_lowercase());
            result.push(c);
            result.push(']');
        } else {
            result.push(c);
        }
    }
    result
}

/// An optional sign.
pub fn maybe_sign() -> String {
    "[\\-\\+]?".to_string()
}

/// Digits with no leading zero.
pub fn leading_digits() -> String {
    "(0|([1-9][0-9]*))".to_string()
}

/// One or more digits.
pub fn trailing_digits() -> String {
    "[0-9]+".to_string()
}

// B: digits before the dot
// D: the dot
// A: digits after the dot
// E: exponent portion
//
//  B D A E  valid
//  0 1 1 0  1  form1
//  0 1 1 1  1  form1
//  1 0 0 1  1  form2
//  1 1 0 0  1  form3
//  1 1 0 1  1  form3
//  1 1 1 0  1  form3
//  1 1 1 1  1  form3

/// A floating-point literal that is not also an integer literal.
pub fn unsigned_floating_point_not_integer() -> String {
    let b = leading_digits();
    let d = "\\.";
    let a = trailing_digits();
    let e = format!("([eE]{}{})", maybe_sign(), trailing_digits());
    let maybe_a = format!("{}?", a);
    let maybe_e = format!("{}?", e);
    let form1 = format!("({}{}{})", d, a, maybe_e);
    let form2 = format!("({}{})", b, e);
    let form3 = format!("({}{}{}{})", b, d, maybe_a, maybe_e);
    format!("({}|{}|{})", form1, form2, form3)
}

/// An unsigned integer literal.
pub fn unsigned_integer() -> String {
    leading_digits()
}

/// An unsigned floating-point literal, integers included.
pub fn unsigned_floating_point() -> String {
    format!("({}|{})", unsigned_floating_point_not_integer(), unsigned_integer())
}

/// A signed integer literal.
pub fn signed_integer() -> String {
    format!("{}{}", maybe_sign(), unsigned_integer())
}

/// A signed floating-point literal that is not also an integer literal.
pub fn signed_floating_point_not_integer() -> String {
    format!("{}{}", maybe_sign(), unsigned_floating_point_not_integer())
}

/// A signed floating-point literal, integers included.
pub fn signed_floating_point() -> String {
    format!("{}{}", maybe_sign(), unsigned_floating_point())
}

/// Blanks, tabs, and line ends.
pub fn whitespace() -> String {
    "[ \t\n\r]+".to_string()
}

/// A line end, with or without a carriage return.
pub fn newline() -> String {
    "\r?\n".to_string()
}

/// A C-style identifier.
pub fn identifier() -> String {
    "[_a-zA-Z][_a-zA-Z0-9]*".to_string()
}

/// A C-style block comment.
pub fn c_style_comment() -> String {
    let slash = "/";
    let asterisk = "\\*";
    let comment_start = format!("{}{}", slash, asterisk);
    let not_asterisk = "[^\\*]";
    let neither_slash_nor_asterisk = "[^/\\*]";
    let zero_or_more_not_asterisks = format!("{}*", not_asterisk);
    let one_or_more_asterisks = format!("{}+", asterisk);
    let comment_head = format!("{}{}", zero_or_more_not_asterisks, one_or_more_asterisks);
    let comment_repeatee = format!(
        "{}{}{}",
        neither_slash_nor_asterisk, zero_or_more_not_asterisks, one_or_more_asterisks
    );
    let comment_repeater = format!("({})*", comment_repeatee);
    format!("{}{}{}{}", comment_start, comment_head, comment_repeater, slash)
}

/// A double-quoted string literal with backslash escapes.
pub fn double_quoted_string() -> String {
    "\"([^\"\\\\]|\\\\.)*\"".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tokenize;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn bootstrap_lexer_tokenizes_regex_syntax() {
        init_logger();
        let tables = ask_parser_tables();
        let tokens = tokenize(&tables.lexer, "a(b)*").unwrap();
        let ids: Vec<usize> = tokens.iter().map(|t| t.token).collect();
        // char ( char ) *
        assert_eq!(ids, vec![0, 4, 0, 5, 9]);
        let tokens = tokenize(&tables.lexer, "\\)x").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, 0);
        assert_eq!(tokens[0].end, 2);
    }

    #[test]
    fn parser_tables_are_memoized() {
        init_logger();
        let a = ask_parser_tables() as *const ParserTables;
        let b = ask_parser_tables() as *const ParserTables;
        assert_eq!(a, b);
    }

    #[test]
    fn qualified_repetition_dfa() {
        init_logger();
        // minimized a(b|c)*d has exactly 3 states
        let dfa = build_dfa("tok", "a(b|c)*d", 7).unwrap();
        assert_eq!(dfa.nstates(), 3);
        for text in ["ad", "abd", "acbbd"] {
            assert_eq!(accepts(&dfa, text), Some(7), "{:?}", text);
        }
        for text in ["a", "abc", "", "add"] {
            assert_eq!(accepts(&dfa, text), None, "{:?}", text);
        }
    }

    #[test]
    fn negated_set_dfa() {
        init_logger();
        let dfa = build_dfa("tok", "[^abc]", 0).unwrap();
        assert_eq!(dfa.nstates(), 2);
        let transitions = (0..dfa.nsymbols())
            .filter(|&s| dfa.step(0, s).is_some())
            .count();
        assert_eq!(transitions, NCHARS - 3);
        assert_eq!(accepts(&dfa, "d"), Some(0));
        assert_eq!(accepts(&dfa, "a"), None);
        assert_eq!(accepts(&dfa, "dd"), None);
    }

    #[test]
    fn escapes_make_metachars_literal() {
        init_logger();
        assert!(matches("\\.", ".").unwrap());
        assert!(!matches("\\.", "x").unwrap());
        assert!(matches("a\\+b", "a+b").unwrap());
        assert!(matches("\\\\", "\\").unwrap());
    }

    #[test]
    fn dot_matches_any_table_character() {
        init_logger();
        assert!(matches(".", "q").unwrap());
        assert!(matches(".", "\t").unwrap());
        assert!(!matches(".", "ab").unwrap());
    }

    #[test]
    fn ranges_and_unions() {
        init_logger();
        assert!(matches("[a-z0-9]+", "abc123").unwrap());
        assert!(!matches("[a-z0-9]+", "ABC").unwrap());
        assert!(matches("cat|dog", "cat").unwrap());
        assert!(matches("cat|dog", "dog").unwrap());
        assert!(!matches("cat|dog", "cow").unwrap());
    }

    #[test]
    fn bad_regex_reports_name_and_trace() {
        init_logger();
        let err = build_dfa("mytoken", "(", 0).unwrap_err();
        let BuildError::RegexParse(message) = err else {
            panic!("expected RegexParse");
        };
        assert!(message.contains("mytoken"));
        assert!(message.contains("step trace"));
        assert!(message.contains("shift"));
    }

    #[test]
    fn number_recipes_match_expected_literals() {
        init_logger();
        assert!(matches(&unsigned_integer(), "0").unwrap());
        assert!(matches(&unsigned_integer(), "42").unwrap());
        assert!(!matches(&unsigned_integer(), "007").unwrap());
        assert!(matches(&signed_integer(), "-7").unwrap());
        assert!(matches(&signed_floating_point(), "3.14").unwrap());
        assert!(matches(&signed_floating_point(), "-0.5e-3").unwrap());
        assert!(matches(&signed_floating_point(), "1e5").unwrap());
        assert!(matches(&unsigned_floating_point_not_integer(), ".5").unwrap());
        assert!(!matches(&unsigned_floating_point_not_integer(), "5").unwrap());
    }

    #[test]
    fn text_recipes_match() {
        init_logger();
        assert!(matches(&identifier(), "_foo42").unwrap());
        assert!(!matches(&identifier(), "9lives").unwrap());
        assert!(matches(&whitespace(), " \t\n").unwrap());
        assert!(matches(&newline(), "\r\n").unwrap());
        assert!(matches(&c_style_comment(), "/* hi * there */").unwrap());
        assert!(!matches(&c_style_comment(), "/* nope").unwrap());
        assert!(matches(&double_quoted_string(), "\"abc\\\"d\"").unwrap());
        assert!(!matches(&double_quoted_string(), "\"open").unwrap());
        assert!(matches(&for_case_insensitive("if"), "If").unwrap());
        assert!(!matches(&for_case_insensitive("if"), "of").unwrap());
    }

    #[test]
    fn first_occurrence_regex_stops_at_the_match() {
        init_logger();
        let pattern = for_first_occurrence_of("ab").unwrap();
        assert!(matches(&pattern, "xxab").unwrap());
        assert!(matches(&pattern, "ab").unwrap());
        assert!(!matches(&pattern, "xxabx").unwrap());
    }
}

//! The declarative [`Language`] input model and its assembly into
//! [`ParserTables`].
//!
//! A language is an ordered token list (name + regex), an ordered BNF
//! production list over those names, and a list of ignored token names.
//! Order matters twice: token declaration order is lexer priority, and the
//! first production's LHS is the start symbol.

use crate::error::BuildError;
use crate::fa::FiniteAutomaton;
use crate::grammar::build_grammar;
use crate::lalr::{accept_parser, build_lalr1_parser};
use crate::regex;
use crate::tables::{Indentation, ParserTables};

/// A token declaration: a name and the regex matching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    /// Token name, usable in production right-hand sides.
    pub name: String,
    /// The token's regular expression.
    pub regex: String,
}

impl TokenDef {
    /// Creates a token declaration.
    pub fn new(name: impl Into<String>, regex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regex: regex.into(),
        }
    }
}

/// A production declaration over symbol names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionDef {
    /// Left-hand-side nonterminal name.
    pub lhs: String,
    /// Right-hand-side names (tokens or nonterminals), possibly empty.
    pub rhs: Vec<String>,
}

impl ProductionDef {
    /// Creates a production declaration.
    pub fn new(lhs: impl Into<String>, rhs: &[&str]) -> Self {
        Self {
            lhs: lhs.into(),
            rhs: rhs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A user-declared language: tokens, productions, and ignored tokens.
#[derive(Debug, Clone, Default)]
pub struct Language {
    /// Token declarations, in priority order.
    pub tokens: Vec<TokenDef>,
    /// Productions; the first one's LHS is the start symbol.
    pub productions: Vec<ProductionDef>,
    /// Names of tokens the parser consumes and discards.
    pub ignored_tokens: Vec<String>,
}

/// Builds the combined lexer DFA for a language.
///
/// Each token's regex becomes its own minimal DFA carrying the token's
/// declaration index; the automata are united in order and the result is
/// determinized and minimized. Subset construction resolves overlaps
/// toward the smallest token id, so earlier declarations win ties.
pub fn build_lexer(language: &Language) -> Result<FiniteAutomaton, BuildError> {
    let mut lexer: Option<FiniteAutomaton> = None;
    for (token_id, token) in language.tokens.iter().enumerate() {
        if token.name.is_empty() {
            return Err(BuildError::InvalidLanguage(format!(
                "token {} has an empty name",
                token_id
            )));
        }
        if token.regex.is_empty() {
            return Err(BuildError::InvalidLanguage(format!(
                "token {} ({:?}) has an empty regex",
                token_id, token.name
            )));
        }
        let dfa = regex::build_dfa(&token.name, &token.regex, token_id)?;
        lexer = Some(match lexer {
            None => dfa,
            Some(lexer) => FiniteAutomaton::unite(&lexer, &dfa),
        });
    }
    let lexer = lexer.ok_or_else(|| {
        BuildError::InvalidLanguage("language declares no tokens".to_string())
    })?;
    Ok(FiniteAutomaton::simplify(
        &FiniteAutomaton::make_deterministic(&lexer),
    ))
}

/// Scans the token declarations for the `NEWLINE` / `INDENT` / `DEDENT`
/// triad.
///
/// A language is indent-sensitive iff it declares `INDENT`. A sensitive
/// language must declare all three, each exactly once, with `NEWLINE`
/// before the other two.
pub fn build_indent_info(language: &Language) -> Result<Indentation, BuildError> {
    let mut out = Indentation::default();
    for (token_id, token) in language.tokens.iter().enumerate() {
        match token.name.as_str() {
            "INDENT" => {
                if out.indent_token.is_some() {
                    return Err(BuildError::InvalidLanguage(
                        "the language has two or more INDENT tokens".to_string(),
                    ));
                }
                out.indent_token = Some(token_id);
                out.is_sensitive = true;
            }
            "DEDENT" => {
                if out.dedent_token.is_some() {
                    return Err(BuildError::InvalidLanguage(
                        "the language has two or more DEDENT tokens".to_string(),
                    ));
                }
                out.dedent_token = Some(token_id);
            }
            "NEWLINE" => {
                if out.newline_token.is_some() {
                    return Err(BuildError::InvalidLanguage(
                        "the language has two or more NEWLINE tokens".to_string(),
                    ));
                }
                out.newline_token = Some(token_id);
            }
            _ => {}
        }
    }
    if out.is_sensitive {
        let indent = out.indent_token.expect("INDENT is what makes it sensitive");
        let dedent = out.dedent_token.ok_or_else(|| {
            BuildError::InvalidLanguage(
                "this indentation-sensitive language has no DEDENT token".to_string(),
            )
        })?;
        let newline = out.newline_token.ok_or_else(|| {
            BuildError::InvalidLanguage(
                "this indentation-sensitive language has no NEWLINE token".to_string(),
            )
        })?;
        if indent < newline || dedent < newline {
            return Err(BuildError::InvalidLanguage(
                "NEWLINE needs to come before all other indent tokens".to_string(),
            ));
        }
    }
    Ok(out)
}

/// Runs the whole pipeline: lexer DFA, indentation info, grammar, LALR(1)
/// machine, and the final dense tables.
pub fn build_parser_tables(language: &Language) -> Result<ParserTables, BuildError> {
    let lexer = build_lexer(language)?;
    let indent_info = build_indent_info(language)?;
    let grammar = build_grammar(language)?;
    let pip = build_lalr1_parser(grammar)?;
    let shift_reduce = accept_parser(&pip)?;
    Ok(ParserTables {
        shift_reduce,
        lexer,
        indent_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn token_names(names: &[&str]) -> Language {
        Language {
            tokens: names.iter().map(|n| TokenDef::new(*n, "x")).collect(),
            productions: vec![],
            ignored_tokens: vec![],
        }
    }

    #[test]
    fn plain_language_is_not_indent_sensitive() {
        let info = build_indent_info(&token_names(&["id", "ws"])).unwrap();
        assert!(!info.is_sensitive);
        assert_eq!(info.indent_token, None);
        assert_eq!(info.dedent_token, None);
        assert_eq!(info.newline_token, None);
    }

    #[test]
    fn newline_alone_is_fine() {
        let info = build_indent_info(&token_names(&["NEWLINE", "id"])).unwrap();
        assert!(!info.is_sensitive);
        assert_eq!(info.newline_token, Some(0));
    }

    #[test]
    fn full_triad_in_order_is_sensitive() {
        let info =
            build_indent_info(&token_names(&["NEWLINE", "INDENT", "DEDENT", "id"])).unwrap();
        assert!(info.is_sensitive);
        assert_eq!(info.newline_token, Some(0));
        assert_eq!(info.indent_token, Some(1));
        assert_eq!(info.dedent_token, Some(2));
    }

    #[test]
    fn indent_without_dedent_is_an_error() {
        let err = build_indent_info(&token_names(&["NEWLINE", "INDENT"])).unwrap_err();
        assert!(matches!(err, BuildError::InvalidLanguage(m) if m.contains("DEDENT")));
    }

    #[test]
    fn indent_before_newline_is_an_error() {
        let err =
            build_indent_info(&token_names(&["INDENT", "NEWLINE", "DEDENT"])).unwrap_err();
        assert!(matches!(err, BuildError::InvalidLanguage(m) if m.contains("NEWLINE")));
    }

    #[test]
    fn duplicate_indent_token_is_an_error() {
        let err = build_indent_info(&token_names(&[
            "NEWLINE", "INDENT", "INDENT", "DEDENT",
        ]))
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidLanguage(m) if m.contains("two or more")));
    }

    #[test]
    fn empty_token_name_fails_lexer_build() {
        init_logger();
        let lang = Language {
            tokens: vec![TokenDef::new("", "a")],
            productions: vec![],
            ignored_tokens: vec![],
        };
        assert!(matches!(
            build_lexer(&lang),
            Err(BuildError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn empty_token_regex_fails_lexer_build() {
        init_logger();
        let lang = Language {
            tokens: vec![TokenDef::new("id", "")],
            productions: vec![],
            ignored_tokens: vec![],
        };
        assert!(matches!(
            build_lexer(&lang),
            Err(BuildError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn token_priority_follows_declaration_order() {
        init_logger();
        // "if" is both a keyword and an identifier; the keyword is
        // declared first and must win
        let lang = Language {
            tokens: vec![
                TokenDef::new("kw_if", "if"),
                TokenDef::new("id", "[a-z]+"),
            ],
            productions: vec![],
            ignored_tokens: vec![],
        };
        let lexer = build_lexer(&lang).unwrap();
        assert_eq!(crate::driver::longest_match(&lexer, "if", 0), Some((0, 2)));
        assert_eq!(crate::driver::longest_match(&lexer, "ifx", 0), Some((1, 3)));
        assert_eq!(crate::driver::longest_match(&lexer, "other", 0), Some((1, 5)));
    }
}

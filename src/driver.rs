//! A minimal runtime that drives finished [`ParserTables`].
//!
//! The bootstrapped regex front-end needs to *run* the regex parser to
//! turn regex text into automata, so the crate carries a small tokenizer
//! and shift-reduce loop of its own. The same driver doubles as the test
//! harness for user-built tables.

use crate::chartab;
use crate::error::{ParseError, Position};
use crate::fa::FiniteAutomaton;
use crate::tables::{Action, ParserTables};
use std::fmt::Write as _;

/// One token produced by [`tokenize`]: the token id and the byte range it
/// covers, plus its source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexedToken {
    /// Token id, i.e. the declaration index of the matched token.
    pub token: usize,
    /// Byte offset of the first matched character.
    pub start: usize,
    /// Byte offset one past the last matched character.
    pub end: usize,
    /// 1-based position of the first matched character.
    pub position: Position,
}

/// Longest match of `lexer` against `text` starting at byte `offset`.
///
/// Walks the DFA as far as the input allows, remembering the last
/// accepting state passed, and returns the accepted token id together
/// with the match length.
pub fn longest_match(
    lexer: &FiniteAutomaton,
    text: &str,
    offset: usize,
) -> Option<(usize, usize)> {
    debug_assert!(lexer.is_deterministic());
    let mut state = 0;
    let mut last_match = None;
    for (i, c) in text[offset..].char_indices() {
        let Some(symbol) = chartab::try_symbol(c) else {
            break;
        };
        state = match lexer.step(state, symbol) {
            Some(next_state) => next_state,
            None => break,
        };
        if lexer.accepts(state).is_some() {
            last_match = Some((lexer.accepts(state).expect("accepting"), i + c.len_utf8()));
        }
    }
    last_match
}

/// Splits `text` into tokens by repeated longest match.
///
/// Fails with a positioned [`ParseError`] on a character outside the
/// character table or on text no token matches.
pub fn tokenize(lexer: &FiniteAutomaton, text: &str) -> Result<Vec<LexedToken>, ParseError> {
    let mut out = Vec::new();
    let mut offset = 0;
    let mut position = Position::new(1, 1);
    while offset < text.len() {
        let c = text[offset..].chars().next().expect("offset in bounds");
        if chartab::try_symbol(c).is_none() {
            return Err(ParseError::at(
                format!("character {:?} is not in the character table", c),
                position,
            ));
        }
        let Some((token, len)) = longest_match(lexer, text, offset) else {
            let context: String = text[offset..].chars().take(10).collect();
            return Err(ParseError::at(
                format!("no token matches at {:?}", context),
                position,
            ));
        };
        out.push(LexedToken {
            token,
            start: offset,
            end: offset + len,
            position,
        });
        for c in text[offset..offset + len].chars() {
            if c == '\n' {
                position = Position::new(position.line + 1, 1);
            } else {
                position = Position::new(position.line, position.column + 1);
            }
        }
        offset += len;
    }
    Ok(out)
}

/// The semantic callbacks of a parse.
///
/// [`Driver::parse`] calls [`shift`](Semantics::shift) for every consumed
/// token and [`reduce`](Semantics::reduce) for every applied production;
/// the values flow through the parser's value stack.
pub trait Semantics {
    /// The values the parse computes.
    type Value;

    /// Called when `terminal` is shifted; `text` is the matched text
    /// (empty for the synthetic `end` terminal).
    fn shift(&mut self, terminal: usize, text: &str) -> Result<Self::Value, ParseError>;

    /// Called when `production` is reduced over the values of its RHS.
    fn reduce(&mut self, production: usize, rhs: Vec<Self::Value>) -> Result<Self::Value, ParseError>;
}

/// A table-driven shift-reduce parser.
pub struct Driver<'t, S> {
    tables: &'t ParserTables,
    semantics: S,
    trace: Option<String>,
}

impl<'t, S: Semantics> Driver<'t, S> {
    /// Creates a driver over `tables` with the given semantics.
    pub fn new(tables: &'t ParserTables, semantics: S) -> Self {
        Self {
            tables,
            semantics,
            trace: None,
        }
    }

    /// Enables step tracing; the trace is retrieved with
    /// [`take_trace`](Self::take_trace) after the parse.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(String::new());
        self
    }

    /// Returns and clears the collected step trace.
    pub fn take_trace(&mut self) -> String {
        self.trace.take().unwrap_or_default()
    }

    fn trace_step(&mut self, step: impl FnOnce() -> String) {
        if let Some(trace) = &mut self.trace {
            let line = step();
            log::trace!("{}", line);
            let _ = writeln!(trace, "{}", line);
        } else if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", step());
        }
    }

    /// Parses `text`, returning the start symbol's value.
    ///
    /// `name` labels the input in error messages. The token stream is
    /// pinned to the synthetic `end` terminal once exhausted, which is
    /// what lets the accept production's reduction fire.
    pub fn parse(&mut self, text: &str, name: &str) -> Result<S::Value, ParseError> {
        let tables = self.tables;
        let tokens = tokenize(&tables.lexer, text).map_err(|mut e| {
            e.message = format!("{}: {}", name, e.message);
            e
        })?;
        let sr = &tables.shift_reduce;
        let end = sr.end_terminal();
        let mut states: Vec<usize> = vec![0];
        let mut values: Vec<S::Value> = Vec::new();
        let mut next = 0;
        loop {
            let state = *states.last().expect("state stack is never empty");
            let (terminal, text_slice, position) = match tokens.get(next) {
                Some(t) => (t.token, &text[t.start..t.end], t.position),
                None => (end, "", Position::new(1, 1)),
            };
            match sr.terminal_action(state, terminal) {
                Action::Skip => {
                    self.trace_step(|| format!("skip {:?}", text_slice));
                    next += 1;
                }
                Action::Shift(new_state) => {
                    self.trace_step(|| format!("shift {:?} to state {}", text_slice, new_state));
                    values.push(self.semantics.shift(terminal, text_slice)?);
                    states.push(new_state);
                    if next < tokens.len() {
                        next += 1;
                    }
                }
                Action::Reduce(production) => {
                    self.trace_step(|| format!("reduce by production {}", production));
                    let prod = sr.production(production);
                    if values.len() < prod.rhs_len || states.len() <= prod.rhs_len {
                        return Err(ParseError::new(format!(
                            "{}: value stack underflow reducing production {}",
                            name, production
                        )));
                    }
                    let rhs = values.split_off(values.len() - prod.rhs_len);
                    states.truncate(states.len() - prod.rhs_len);
                    let value = self.semantics.reduce(production, rhs)?;
                    let state = *states.last().expect("state stack is never empty");
                    let Some(goto) = sr.nonterminal_goto(state, prod.lhs) else {
                        return Err(ParseError::new(format!(
                            "{}: missing goto from state {} on nonterminal {}",
                            name, state, prod.lhs
                        )));
                    };
                    values.push(value);
                    states.push(goto);
                }
                Action::Accept => {
                    self.trace_step(|| "accept".to_string());
                    // the stack holds the start symbol's value and the
                    // just-shifted end terminal's value
                    let mut rhs = values.split_off(values.len().saturating_sub(2));
                    if rhs.len() != 2 {
                        return Err(ParseError::new(format!(
                            "{}: accept with {} stacked values",
                            name,
                            rhs.len()
                        )));
                    }
                    return Ok(rhs.swap_remove(0));
                }
                Action::Error => {
                    let message = if next < tokens.len() {
                        format!("{}: unexpected {:?}", name, text_slice)
                    } else {
                        format!("{}: unexpected end of input", name)
                    };
                    return Err(ParseError {
                        message,
                        span: Some(crate::error::Span::new(position, position)),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{build_parser_tables, Language, ProductionDef, TokenDef};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn calculator_language() -> Language {
        Language {
            tokens: vec![
                TokenDef::new("INT", "[0-9]+"),
                TokenDef::new("+", "\\+"),
                TokenDef::new("WS", "[ \t]+"),
            ],
            productions: vec![
                ProductionDef::new("S", &["INT"]),
                ProductionDef::new("S", &["S", "+", "INT"]),
            ],
            ignored_tokens: vec!["WS".to_string()],
        }
    }

    /// Sums the integer tokens as they are reduced.
    struct SumSemantics;

    impl Semantics for SumSemantics {
        type Value = i64;

        fn shift(&mut self, _terminal: usize, text: &str) -> Result<i64, ParseError> {
            if text.chars().all(|c| c.is_ascii_digit()) && !text.is_empty() {
                text.parse()
                    .map_err(|e| ParseError::new(format!("bad integer {:?}: {}", text, e)))
            } else {
                Ok(0)
            }
        }

        fn reduce(&mut self, production: usize, rhs: Vec<i64>) -> Result<i64, ParseError> {
            Ok(match production {
                0 => rhs[0],
                1 => rhs[0] + rhs[2],
                _ => rhs.into_iter().next().unwrap_or(0),
            })
        }
    }

    #[test]
    fn tokenizes_with_whitespace() {
        init_logger();
        let tables = build_parser_tables(&calculator_language()).unwrap();
        let tokens = tokenize(&tables.lexer, "12 + 34").unwrap();
        let ids: Vec<usize> = tokens.iter().map(|t| t.token).collect();
        assert_eq!(ids, vec![0, 2, 1, 2, 0]);
        assert_eq!(&"12 + 34"[tokens[0].start..tokens[0].end], "12");
        assert_eq!(&"12 + 34"[tokens[2].start..tokens[2].end], "+");
    }

    #[test]
    fn parses_left_growing_sum() {
        init_logger();
        let tables = build_parser_tables(&calculator_language()).unwrap();
        let mut driver = Driver::new(&tables, SumSemantics);
        assert_eq!(driver.parse("1+2+3", "sum").unwrap(), 6);
        assert_eq!(driver.parse("12 + 34", "sum").unwrap(), 46);
        assert_eq!(driver.parse("7", "sum").unwrap(), 7);
    }

    #[test]
    fn rejects_syntax_errors_with_position() {
        init_logger();
        let tables = build_parser_tables(&calculator_language()).unwrap();
        let mut driver = Driver::new(&tables, SumSemantics);
        let err = driver.parse("1++2", "sum").unwrap_err();
        assert!(err.message.contains("unexpected"));
        assert!(err.span.is_some());
        let err = driver.parse("1+", "sum").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn rejects_unlexable_text() {
        init_logger();
        let tables = build_parser_tables(&calculator_language()).unwrap();
        let err = tokenize(&tables.lexer, "1 & 2").unwrap_err();
        assert!(err.message.contains("no token matches"));
        assert_eq!(err.span.unwrap().start.column, 3);
    }

    #[test]
    fn trace_records_steps() {
        init_logger();
        let tables = build_parser_tables(&calculator_language()).unwrap();
        let mut driver = Driver::new(&tables, SumSemantics).with_trace();
        driver.parse("1+2", "sum").unwrap();
        let trace = driver.take_trace();
        assert!(trace.contains("shift"));
        assert!(trace.contains("reduce"));
        assert!(trace.contains("accept"));
    }

    #[test]
    fn positions_track_lines() {
        init_logger();
        let lang = Language {
            tokens: vec![
                TokenDef::new("id", "[a-z]+"),
                TokenDef::new("nl", "\n"),
            ],
            productions: vec![ProductionDef::new("S", &["id"])],
            ignored_tokens: vec![],
        };
        let tables = build_parser_tables(&lang).unwrap();
        let tokens = tokenize(&tables.lexer, "ab\ncd").unwrap();
        assert_eq!(tokens[0].position, Position::new(1, 1));
        assert_eq!(tokens[1].position, Position::new(1, 3));
        assert_eq!(tokens[2].position, Position::new(2, 1));
    }
}

//! Error and source-location types.
//!
//! Two error surfaces exist: [`BuildError`] covers everything that can go
//! wrong while turning a [`Language`](crate::Language) into parser tables,
//! and [`ParseError`] covers failures while driving finished tables over
//! input text. Nothing is retried internally; every failure is reported at
//! the boundary it occurred on.

use thiserror::Error;

/// A 1-based line/column position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Position {
    /// Creates a new `Position`.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A half-open source range: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Starting position (inclusive).
    pub start: Position,
    /// Ending position (exclusive by convention).
    pub end: Position,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns `true` if the span is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An error produced while driving parser tables over input text.
///
/// Carries a human-readable message and, when the failing input location is
/// known, a [`Span`] pinpointing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", fmt_span(.span))]
pub struct ParseError {
    /// Human-readable message.
    pub message: String,
    /// Optional source span for pinpointing the error.
    pub span: Option<Span>,
}

impl ParseError {
    /// Creates a `ParseError` without location information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    /// Creates a `ParseError` pinned to a single position.
    pub fn at(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            span: Some(Span::new(position, position)),
        }
    }
}

fn fmt_span(span: &Option<Span>) -> String {
    match span {
        Some(s) => format!(" at {}:{}", s.start.line, s.start.column),
        None => String::new(),
    }
}

fn fmt_conflicts(conflicts: &[Conflict]) -> String {
    match conflicts.first() {
        Some(c) => format!(
            "{} conflict(s), first in state {} on terminal {}",
            conflicts.len(),
            c.state,
            c.terminal
        ),
        None => "no conflict details".to_string(),
    }
}

/// One unresolved action overlap left after lane tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// State of the LR automaton the overlap occurs in.
    pub state: usize,
    /// The reducing production involved in the overlap.
    pub production: usize,
    /// The terminal both actions claim.
    pub terminal: usize,
}

/// Represents all possible failures of table construction.
///
/// Each variant corresponds to one rejection point of the pipeline, from
/// language validation through grammar resolution, regex parsing, and the
/// LALR(1) adequacy check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The language declaration itself is malformed: an empty production
    /// left-hand side, an empty token name or regex, or a broken
    /// indentation token triad.
    #[error("invalid language: {0}")]
    InvalidLanguage(String),

    /// A right-hand-side name resolves to neither a token nor a production
    /// left-hand side.
    #[error("grammar symbol {0:?} is neither a token nor the LHS of a production")]
    UnknownSymbol(String),

    /// An ignored-token name does not name a declared token.
    #[error("ignored token {0:?} does not exist")]
    UnknownIgnoredToken(String),

    /// The bootstrap regex parser rejected a token's regex. The message
    /// names the token and carries a step trace of the failing parse.
    #[error("regex parse error: {0}")]
    RegexParse(String),

    /// Lane tracing revisited a lane member while generating non-nullable
    /// contexts; the grammar is ambiguous.
    #[error("grammar is ambiguous")]
    AmbiguousGrammar,

    /// Adequacy still fails after lane tracing.
    #[error("grammar is not LALR(1): {}", fmt_conflicts(.0))]
    NotLalr1(Vec<Conflict>),

    /// An internal invariant was violated; this is a bug in the builder,
    /// not in the input.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_error_trait_obj(e: &dyn std::error::Error) -> &dyn std::error::Error {
        e
    }

    #[test]
    fn parse_error_displays_position() {
        let err = ParseError::at("unexpected token", Position::new(3, 7));
        assert_eq!(err.to_string(), "unexpected token at 3:7");
        let _ = _assert_error_trait_obj(&err);
    }

    #[test]
    fn parse_error_without_span() {
        let err = ParseError::new("end of input");
        assert_eq!(err.to_string(), "end of input");
    }

    #[test]
    fn build_error_reports_conflicts() {
        let err = BuildError::NotLalr1(vec![Conflict {
            state: 4,
            production: 2,
            terminal: 1,
        }]);
        let s = err.to_string();
        assert!(s.contains("not LALR(1)"));
        assert!(s.contains("state 4"));
        let _ = _assert_error_trait_obj(&err);
    }

    #[test]
    fn span_emptiness() {
        let p = Position::new(1, 1);
        assert!(Span::new(p, p).is_empty());
        assert!(!Span::new(p, Position::new(1, 2)).is_empty());
    }
}

//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Lexer and LALR(1) parser table generator.
//!
//! `lanelex` turns a declarative [`Language`] — tokens as regular
//! expressions plus a BNF grammar — into the static tables a runtime
//! shift-reduce parser needs:
//!
//! * each token's regex becomes an NFA, the union of all tokens is
//!   determinized by subset construction and minimized by row
//!   equivalence, with declaration order as match priority;
//! * the grammar becomes an LR(0) machine whose reduction lookaheads are
//!   computed with Pager's lane-tracing algorithm, so the full class of
//!   LALR(1) grammars is accepted without ever materializing LR(1) item
//!   sets;
//! * as a diagnostic surface, a finished DFA can be turned back into a
//!   regex by state elimination under the Delgado–Morais weight
//!   heuristic.
//!
//! The regex front-end is bootstrapped: regex syntax is itself declared
//! as a [`Language`] and compiled by the same pipeline, with only the
//! regex lexer assembled by hand from automaton primitives. The regex
//! parser tables are built once per process and memoized.
//!
//! ```
//! use lanelex::{build_parser_tables, Language, ProductionDef, TokenDef};
//!
//! let language = Language {
//!     tokens: vec![
//!         TokenDef::new("int", "[0-9]+"),
//!         TokenDef::new("+", "\\+"),
//!         TokenDef::new("ws", "[ \t]+"),
//!     ],
//!     productions: vec![
//!         ProductionDef::new("sum", &["int"]),
//!         ProductionDef::new("sum", &["sum", "+", "int"]),
//!     ],
//!     ignored_tokens: vec!["ws".to_string()],
//! };
//! let tables = build_parser_tables(&language).unwrap();
//! assert!(tables.shift_reduce.nstates() > 0);
//! ```

pub mod chartab;
pub mod driver;
pub mod error;
pub mod fa;
pub mod grammar;
mod graph;
pub mod lalr;
pub mod language;
pub mod regex;
mod symtab;
pub mod tables;

pub use crate::error::{BuildError, Conflict, ParseError, Position, Span};
pub use crate::fa::FiniteAutomaton;
pub use crate::grammar::{build_grammar, Grammar};
pub use crate::lalr::{accept_parser, build_lalr1_parser, ParserInProgress};
pub use crate::language::{
    build_indent_info, build_lexer, build_parser_tables, Language, ProductionDef, TokenDef,
};
pub use crate::tables::{Action, Indentation, ParserTables, ShiftReduceTables};

//! The symbol-indexed grammar model.
//!
//! A [`Grammar`] numbers every symbol densely: terminals first, in token
//! declaration order, then nonterminals in the order their defining
//! productions first appear. [`build_grammar`] resolves a declarative
//! [`Language`] into this form and appends the two synthetic symbols the
//! LR construction needs: an `end` terminal and an accept nonterminal with
//! the single production `accept ::= start end`.

use crate::error::BuildError;
use crate::language::Language;
use crate::symtab::Symtab;

/// A production with resolved symbol ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// Left-hand-side nonterminal symbol.
    pub lhs: usize,
    /// Right-hand-side symbols, possibly empty.
    pub rhs: Vec<usize>,
}

/// A context-free grammar over dense symbol ids.
///
/// Symbols `[0, nterminals)` are terminals and `[nterminals, nsymbols)` are
/// nonterminals. The last terminal is the synthetic `end` terminal, the
/// last nonterminal is the synthetic accept symbol, and the last production
/// is the accept production.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Total number of symbols.
    pub nsymbols: usize,
    /// Number of terminal symbols.
    pub nterminals: usize,
    /// All productions; the accept production is last.
    pub productions: Vec<Production>,
    /// Symbol names for diagnostics, indexed by symbol id.
    pub symbol_names: Vec<String>,
    /// Terminal ids of ignored tokens.
    pub ignored_terminals: Vec<usize>,
}

impl Grammar {
    /// Returns `true` if `symbol` is a terminal.
    pub fn is_terminal(&self, symbol: usize) -> bool {
        symbol < self.nterminals
    }

    /// Returns `true` if `symbol` is a nonterminal.
    pub fn is_nonterminal(&self, symbol: usize) -> bool {
        symbol >= self.nterminals && symbol < self.nsymbols
    }

    /// Number of nonterminal symbols.
    pub fn nnonterminals(&self) -> usize {
        self.nsymbols - self.nterminals
    }

    /// Converts a nonterminal symbol id to a dense nonterminal index.
    pub fn as_nonterminal(&self, symbol: usize) -> usize {
        assert!(self.is_nonterminal(symbol), "symbol {} is not a nonterminal", symbol);
        symbol - self.nterminals
    }

    /// The synthetic `end` terminal.
    pub fn end_terminal(&self) -> usize {
        self.nterminals - 1
    }

    /// The synthetic accept nonterminal.
    pub fn accept_nonterminal(&self) -> usize {
        self.nsymbols - 1
    }

    /// Index of the accept production.
    pub fn accept_production(&self) -> usize {
        self.productions.len() - 1
    }

    /// Name of a symbol, for diagnostics.
    pub fn symbol_name(&self, symbol: usize) -> &str {
        &self.symbol_names[symbol]
    }
}

/// Appends the `end` terminal.
///
/// Terminals precede nonterminals, so inserting one more terminal shifts
/// every nonterminal id up by one.
fn add_end_terminal(grammar: &mut Grammar) {
    for production in &mut grammar.productions {
        if production.lhs >= grammar.nterminals {
            production.lhs += 1;
        }
        for rhs_symbol in &mut production.rhs {
            if *rhs_symbol >= grammar.nterminals {
                *rhs_symbol += 1;
            }
        }
    }
    grammar
        .symbol_names
        .insert(grammar.nterminals, "end".to_string());
    grammar.nterminals += 1;
    grammar.nsymbols += 1;
}

/// Appends the accept nonterminal and `accept ::= start end`, where start
/// is the LHS of the first user production.
fn add_accept_production(grammar: &mut Grammar) {
    let start_symbol = grammar.productions[0].lhs;
    let accept_symbol = grammar.nsymbols;
    grammar.symbol_names.push("accept".to_string());
    grammar.productions.push(Production {
        lhs: accept_symbol,
        rhs: vec![start_symbol, grammar.end_terminal()],
    });
    grammar.nsymbols += 1;
}

/// Resolves a [`Language`]'s named productions into a [`Grammar`].
///
/// Terminal ids follow token declaration order; nonterminal ids follow the
/// first appearance of each production LHS. Any RHS name that is neither a
/// token nor a production LHS is an [`BuildError::UnknownSymbol`]; ignored
/// token names that don't exist are [`BuildError::UnknownIgnoredToken`].
pub fn build_grammar(language: &Language) -> Result<Grammar, BuildError> {
    if language.productions.is_empty() {
        return Err(BuildError::InvalidLanguage(
            "language has no productions".to_string(),
        ));
    }
    let mut symbols = Symtab::new();
    for token in &language.tokens {
        if symbols.add(&token.name) != symbols.len() - 1 {
            return Err(BuildError::InvalidLanguage(format!(
                "token {:?} is declared twice",
                token.name
            )));
        }
    }
    let nterminals = language.tokens.len();
    for (i, production) in language.productions.iter().enumerate() {
        if production.lhs.is_empty() {
            return Err(BuildError::InvalidLanguage(format!(
                "production {} has an empty left hand side",
                i
            )));
        }
        if let Some(id) = symbols.idx(&production.lhs) {
            if id < nterminals {
                return Err(BuildError::InvalidLanguage(format!(
                    "production left hand side {:?} is also a token",
                    production.lhs
                )));
            }
            continue;
        }
        symbols.add(&production.lhs);
    }
    let mut productions = Vec::with_capacity(language.productions.len() + 1);
    for production in &language.productions {
        let lhs = symbols.idx(&production.lhs).expect("LHS was interned");
        let mut rhs = Vec::with_capacity(production.rhs.len());
        for name in &production.rhs {
            match symbols.idx(name) {
                Some(symbol) => rhs.push(symbol),
                None => return Err(BuildError::UnknownSymbol(name.clone())),
            }
        }
        productions.push(Production { lhs, rhs });
    }
    let mut ignored_terminals = Vec::with_capacity(language.ignored_tokens.len());
    for name in &language.ignored_tokens {
        match symbols.idx(name) {
            Some(terminal) if terminal < nterminals => ignored_terminals.push(terminal),
            _ => return Err(BuildError::UnknownIgnoredToken(name.clone())),
        }
    }
    let mut grammar = Grammar {
        nsymbols: symbols.len(),
        nterminals,
        productions,
        symbol_names: symbols.names(),
        ignored_terminals,
    };
    add_end_terminal(&mut grammar);
    add_accept_production(&mut grammar);
    Ok(grammar)
}

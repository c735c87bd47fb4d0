//! Module `scanner` turns expression source into a stream of [`Lexeme`]s
//! using one composite regular expression built from the grammar.
//!
//! # Public API
//!
//! - `Scanner::new(grammar: &Grammar) -> Result<Scanner>`
//!   Compile the composite pattern for every symbol that has one.
//!
//! - `Scanner::scan(&self, src) -> Lexemes`
//!   A `FusedIterator` yielding `Result<Lexeme, ExprError>`; it stops after
//!   the first error.
//!
//! - `Scanner::tokenize(&self, src) -> Result<Vec<Lexeme>>`
//!   Collects the stream.
//!
//! # Core Phases
//!
//! 1. **Composition** (`new`)
//!    - Each symbol contributes one alternative `(?P<sN>pattern)`, optionally
//!      followed by a non-capturing trailing context (`followed_by`) that must
//!      be present but is not consumed.
//!    - Boosted symbols come first, then the rest in registration order.
//!      Alternation is leftmost-first, so earlier alternatives win ties.
//!    - A final catch-all `(?P<broken>.)` matches any other character.
//!
//! 2. **Anchored scanning** (`next`)
//!    - Every match must start exactly where the previous lexeme ended; the
//!      pattern is anchored with `\A` and applied to the unconsumed tail.
//!    - The winning alternative is found by group name; ignorable symbols
//!      (whitespace, comments) are consumed without being emitted.
//!    - A catch-all match is a lex error carrying the offending character and
//!      its byte position.
//!
//! # Example
//!
//! ```rust
//! use bindexpr::engine::Engine;
//!
//! let engine = Engine::new().unwrap();
//! for lexeme in engine.scanner().scan("vm.Index / 2") {
//!     println!("{}", lexeme.unwrap());
//! }
//! ```

use std::iter::FusedIterator;

use log::{debug, info};
use regex::Regex;

use crate::error::{ExprError, Result};
use crate::grammar::{Grammar, SymbolId};
use crate::token::Lexeme;

// ─────────────────────────────────────────────────────────────────────────────
// Compiled rule table
// ─────────────────────────────────────────────────────────────────────────────

const BROKEN: &str = "broken";

#[derive(Debug, Clone)]
struct Rule {
    group: String,
    symbol: SymbolId,
    name: &'static str,
    ignore: bool,
}

/// Composite-pattern scanner for one grammar.
#[derive(Debug, Clone)]
pub struct Scanner {
    regex: Regex,
    rules: Vec<Rule>,
}

impl Scanner {
    pub fn new(grammar: &Grammar) -> Result<Self> {
        let mut ordered: Vec<_> = grammar
            .symbols()
            .filter(|(_, symbol)| symbol.pattern().is_some())
            .collect();

        // stable: registration order is kept within each group
        ordered.sort_by_key(|(_, symbol)| !symbol.is_boosted());

        let mut alternatives = Vec::with_capacity(ordered.len() + 1);
        let mut rules = Vec::with_capacity(ordered.len());

        for (id, symbol) in ordered {
            let group = format!("s{}", id);
            let pattern = symbol.pattern().unwrap_or_default();

            let alternative = match &symbol.followed_by {
                Some(context) => format!("(?P<{}>{})(?:{})", group, pattern, context),
                None => format!("(?P<{}>{})", group, pattern),
            };

            alternatives.push(alternative);
            rules.push(Rule {
                group,
                symbol: id,
                name: symbol.name(),
                ignore: symbol.is_ignored(),
            });
        }

        alternatives.push(format!("(?P<{}>.)", BROKEN));

        let source = format!(r"(?s)\A(?:{})", alternatives.join("|"));
        let regex = Regex::new(&source).map_err(|e| ExprError::rule("composite", e.to_string()))?;

        info!("Scanner compiled with {} rules", rules.len());
        debug!("Composite pattern: {}", source);

        Ok(Self { regex, rules })
    }

    /// Lazily scan `src`.
    pub fn scan<'s>(&'s self, src: &'s str) -> Lexemes<'s> {
        Lexemes {
            scanner: self,
            src,
            pos: 0,
            done: false,
        }
    }

    /// Scan all of `src`, failing on the first unmatched character.
    pub fn tokenize(&self, src: &str) -> Result<Vec<Lexeme>> {
        self.scan(src).collect()
    }
}

/// Iterator over the lexemes of one source string.
pub struct Lexemes<'s> {
    scanner: &'s Scanner,
    src: &'s str,
    pos: usize,
    done: bool,
}

impl Lexemes<'_> {
    /// Match at `self.pos`; `Ok(None)` means the match was ignorable.
    fn step(&mut self) -> Result<Option<Lexeme>> {
        let rest = &self.src[self.pos..];

        let caps = self
            .scanner
            .regex
            .captures(rest)
            .ok_or_else(|| ExprError::lex(self.pos, "No rule matches"))?;

        if let Some(broken) = caps.name(BROKEN) {
            return Err(ExprError::lex(
                self.pos,
                format!("Unmatched characters {} at {}", broken.as_str(), self.pos),
            ));
        }

        let (rule, matched) = self
            .scanner
            .rules
            .iter()
            .find_map(|rule| caps.name(&rule.group).map(|m| (rule, m)))
            .ok_or_else(|| ExprError::lex(self.pos, "No rule matches"))?;

        if matched.as_str().is_empty() {
            return Err(ExprError::rule(rule.name, format!("zero-length match at {}", self.pos)));
        }

        let position = self.pos;
        self.pos += matched.end();

        if rule.ignore {
            debug!("Skipping {} at {}", rule.name, position);
            return Ok(None);
        }

        Ok(Some(Lexeme::new(rule.symbol, rule.name, matched.as_str(), position)))
    }
}

impl Iterator for Lexemes<'_> {
    type Item = Result<Lexeme>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pos < self.src.len() {
            match self.step() {
                Ok(Some(lexeme)) => return Some(Ok(lexeme)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

impl FusedIterator for Lexemes<'_> {}

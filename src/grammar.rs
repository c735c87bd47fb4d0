//! Declarative symbol registry.
//!
//! A [`Symbol`] is an immutable rule describing one kind of token: its
//! lexing pattern, its binding priorities and what happens when a node of
//! that kind is built and evaluated.  Per-occurrence state (children, parent,
//! infix use, dot context) lives on parse-tree nodes and evaluation frames,
//! never on the symbol, so one [`Grammar`] can back any number of expressions.
//!
//! Priorities follow the "lower binds tighter" convention: `1` is member
//! access, [`Grammar::END_PRIORITY`] is the end-of-input stop signal and
//! [`Grammar::TOP_PRIORITY`] is the threshold a whole expression is built at.

use std::collections::HashMap;

use log::debug;
use regex::Regex;

use crate::engine::Engine;
use crate::error::{ExprError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::parser::{NodeId, Prepared, TreeBuilder};
use crate::token::Lexeme;
use crate::value::Value;

pub type SymbolId = usize;

/// Evaluates node `NodeId`; the symbol's unary form runs for prefix nodes, the binary one for infix nodes.
pub type Evaluator = fn(&mut Interpreter<'_>, NodeId) -> Flow<Value>;

/// Builds the operands of a node consumed in prefix position.
pub type PrefixBuilder = fn(&mut TreeBuilder<'_>, NodeId) -> Result<()>;

/// Builds the operands of a node consumed in infix position; receives the left tree.
pub type InfixBuilder = fn(&mut TreeBuilder<'_>, NodeId, NodeId) -> Result<()>;

/// Turns a literal lexeme into a value (or template) once, while the tree is built.
pub type Preparer = fn(&Engine, &Lexeme) -> Result<Prepared>;

/// One grammar rule.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub(crate) name: &'static str,
    pub(crate) pattern: Option<String>,
    pub(crate) followed_by: Option<String>,
    pub(crate) infix: Option<u8>,
    pub(crate) prefix: Option<u8>,
    pub(crate) right_associative: bool,
    pub(crate) terminal: bool,
    pub(crate) ignore: bool,
    pub(crate) boosted: bool,
    pub(crate) unary: Option<Evaluator>,
    pub(crate) binary: Option<Evaluator>,
    pub(crate) prefix_builder: Option<PrefixBuilder>,
    pub(crate) infix_builder: Option<InfixBuilder>,
    pub(crate) preparer: Option<Preparer>,
}

impl Symbol {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            pattern: None,
            followed_by: None,
            infix: None,
            prefix: None,
            right_associative: false,
            terminal: false,
            ignore: false,
            boosted: false,
            unary: None,
            binary: None,
            prefix_builder: None,
            infix_builder: None,
            preparer: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    #[inline]
    pub fn infix_priority(&self) -> Option<u8> {
        self.infix
    }

    #[inline]
    pub fn prefix_priority(&self) -> Option<u8> {
        self.prefix
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.boosted
    }

    #[inline]
    pub fn is_right_associative(&self) -> bool {
        self.right_associative
    }

    // ───────────────────────────── registration modifiers ───────────────────

    /// Try this rule before unboosted rules.
    pub fn boosted(&mut self) -> &mut Self {
        self.boosted = true;
        self
    }

    pub fn right_associative(&mut self) -> &mut Self {
        self.right_associative = true;
        self
    }

    /// Require `pattern` to follow the match without consuming it.
    pub fn followed_by(&mut self, pattern: &str) -> Result<&mut Self> {
        Regex::new(pattern).map_err(|e| ExprError::rule(self.name, e.to_string()))?;
        self.followed_by = Some(pattern.to_string());
        Ok(self)
    }

    pub fn with_infix_priority(&mut self, priority: u8) -> &mut Self {
        self.infix = Some(priority);
        self
    }

    pub fn with_prefix_builder(&mut self, builder: PrefixBuilder) -> &mut Self {
        self.prefix_builder = Some(builder);
        self
    }

    pub fn with_infix_builder(&mut self, builder: InfixBuilder) -> &mut Self {
        self.infix_builder = Some(builder);
        self
    }

    pub fn with_preparer(&mut self, preparer: Preparer) -> &mut Self {
        self.preparer = Some(preparer);
        self
    }
}

/// Rejects patterns that do not compile or that can match nothing at all.
fn validate_pattern(name: &str, pattern: &str) -> Result<()> {
    let whole = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ExprError::rule(name, e.to_string()))?;

    if whole.is_match("") {
        return Err(ExprError::rule(name, format!("pattern {:?} matches the empty string", pattern)));
    }

    Ok(())
}

/// Ordered set of symbols; registration order is lexing order.
#[derive(Debug, Clone)]
pub struct Grammar {
    symbols: Vec<Symbol>,
    by_name: HashMap<&'static str, SymbolId>,
    end: SymbolId,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Priority of the end-of-input pseudo token.
    pub const END_PRIORITY: u8 = 20;

    /// Threshold a complete expression is built at.
    pub const TOP_PRIORITY: u8 = 19;

    /// Name of the end-of-input pseudo symbol.
    pub const END: &'static str = "EOF";

    /// Empty grammar holding only the end-of-input symbol.
    pub fn new() -> Self {
        let mut end = Symbol::new(Self::END);
        end.terminal = true;
        end.infix = Some(Self::END_PRIORITY);
        end.prefix = Some(Self::END_PRIORITY);

        Self {
            symbols: vec![end],
            by_name: HashMap::from([(Self::END, 0)]),
            end: 0,
        }
    }

    fn entry(&mut self, name: &'static str, pattern: Option<&str>) -> Result<&mut Symbol> {
        let id = match self.by_name.get(name) {
            Some(&id) => id,
            None => {
                debug!("Registering symbol {}", name);
                self.symbols.push(Symbol::new(name));
                self.by_name.insert(name, self.symbols.len() - 1);
                self.symbols.len() - 1
            }
        };

        let symbol = &mut self.symbols[id];

        if let Some(pattern) = pattern {
            match &symbol.pattern {
                Some(existing) => debug!("Symbol {} keeps its pattern {:?}", name, existing),
                None => {
                    validate_pattern(name, pattern)?;
                    symbol.pattern = Some(pattern.to_string());
                }
            }
        }

        Ok(symbol)
    }

    /// Whitespace, comments: matched and dropped.
    pub fn ignore(&mut self, name: &'static str, pattern: &str) -> Result<&mut Symbol> {
        let symbol = self.entry(name, Some(pattern))?;
        symbol.ignore = true;
        Ok(symbol)
    }

    /// Leaf symbol; `evaluator` may be omitted when a preparer binds the value.
    pub fn terminal(&mut self, name: &'static str, pattern: &str, evaluator: Option<Evaluator>) -> Result<&mut Symbol> {
        let symbol = self.entry(name, Some(pattern))?;
        symbol.terminal = true;
        symbol.unary = evaluator;
        Ok(symbol)
    }

    /// Prefix use of `name`. Passing `None` as pattern reuses the pattern of an existing symbol.
    pub fn unary(
        &mut self,
        priority: u8,
        name: &'static str,
        pattern: Option<&str>,
        evaluator: Option<Evaluator>,
    ) -> Result<&mut Symbol> {
        let symbol = self.entry(name, pattern)?;
        symbol.prefix = Some(priority);
        if evaluator.is_some() {
            symbol.unary = evaluator;
        }
        Ok(symbol)
    }

    /// Infix use of `name`.
    pub fn binary(
        &mut self,
        priority: u8,
        name: &'static str,
        pattern: Option<&str>,
        evaluator: Option<Evaluator>,
    ) -> Result<&mut Symbol> {
        let symbol = self.entry(name, pattern)?;
        symbol.infix = Some(priority);
        if evaluator.is_some() {
            symbol.binary = evaluator;
        }
        Ok(symbol)
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn end(&self) -> SymbolId {
        self.end
    }

    /// Symbols with ids, in registration order.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate()
    }
}

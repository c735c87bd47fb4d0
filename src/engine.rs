use std::rc::Rc;

use log::debug;

use crate::error::Result;
use crate::grammar::Grammar;
use crate::parser::{Expression, TreeBuilder};
use crate::reflect::{TypeAccessor, TypeAccessorCache, TypeRef};
use crate::scanner::Scanner;
use crate::syntax;
use crate::token::Lexeme;
use crate::value::Value;

/// A grammar, its compiled scanner and the type accessors evaluation resolves members with.
///
/// One engine is usually shared (through `Rc`) by every [`Scope`](crate::environment::Scope)
/// of a host.
#[derive(Debug)]
pub struct Engine {
    grammar: Grammar,
    scanner: Scanner,
    accessors: TypeAccessorCache,
}

impl Engine {
    /// Engine over the standard expression grammar.
    pub fn new() -> Result<Self> {
        Self::with_grammar(syntax::standard()?)
    }

    pub fn with_grammar(grammar: Grammar) -> Result<Self> {
        let scanner = Scanner::new(&grammar)?;

        Ok(Self {
            grammar,
            scanner,
            accessors: TypeAccessorCache::new(),
        })
    }

    pub fn shared() -> Result<Rc<Self>> {
        Self::new().map(Rc::new)
    }

    #[inline]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    #[inline]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    #[inline]
    pub fn accessors(&self) -> &TypeAccessorCache {
        &self.accessors
    }

    pub fn accessor(&self, ty: TypeRef) -> Rc<TypeAccessor> {
        self.accessors.get(ty)
    }

    /// Accessor members of `value` resolve against; null has none.
    pub fn accessor_for(&self, value: &Value) -> Result<Rc<TypeAccessor>> {
        self.accessors.for_value(value)
    }

    pub fn lex(&self, code: &str) -> Result<Vec<Lexeme>> {
        self.scanner.tokenize(code)
    }

    /// Compile `code` into a fresh expression; no caching happens here.
    pub fn build_expression(&self, code: &str) -> Result<Expression> {
        let lexemes = self.lex(code)?;
        debug!("Lexed {:?} into {} lexemes", code, lexemes.len());

        TreeBuilder::new(self, lexemes, code.len())?.finish(code)
    }
}

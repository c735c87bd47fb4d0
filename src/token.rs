use log::debug;
use serde::Serialize;
use std::fmt;

use crate::grammar::SymbolId;

/// One classified slice of source text produced by the [`Scanner`](crate::scanner::Scanner).
///
/// `name` is the name of the grammar symbol whose rule matched, `text` the
/// matched characters and `position` the byte offset of the first of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lexeme {
    #[serde(skip)]
    pub symbol: SymbolId,

    pub name: &'static str,

    pub text: String,

    pub position: usize,
}

impl Lexeme {
    pub fn new(symbol: SymbolId, name: &'static str, text: &str, position: usize) -> Self {
        debug!("Creating lexeme {} {:?} at {}", name, text, position);

        Self {
            symbol,
            name,
            text: text.to_string(),
            position,
        }
    }

    /// `true` when the lexeme text equals `text` exactly.
    #[inline]
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.text, self.position)
    }
}

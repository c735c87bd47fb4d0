//! Centralised error hierarchy for the **expression engine**.
//!
//! Every subsystem (scanner, grammar registration, tree builder, evaluator,
//! type accessors, formatting) converts its failure modes into one of the
//! variants defined here.  Errors are never recovered inside the engine: a
//! failing sub-expression fails the whole evaluation and the caller decides
//! what to do with the message.
//!
//! The module **does not** print diagnostics itself.

use thiserror::Error;

use log::info;

/// Canonical error type used throughout the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExprError {
    /// Lexical (scanner) error with the byte offset of the offending input.
    #[error("[position {position}] Lex error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 0‑based byte offset where scanning stopped.
        position: usize,
    },

    /// A token rule that can never be used by the scanner (zero-length or malformed pattern).
    #[error("Invalid token rule {symbol}: {message}")]
    Rule { symbol: String, message: String },

    /// Syntactic (tree builder) error.
    #[error("[position {position}] Parse error: {message}")]
    Parse { message: String, position: usize },

    /// Unknown root, member, method or indexer, bad overload, bad assignment target or null context.
    #[error("Binding error: {0}")]
    Binding(String),

    /// Operand of the wrong kind for an operator.
    #[error("Type error: {0}")]
    Type(String),

    /// Integer division by zero or a value that does not fit its target.
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// Malformed composite format string or specifier.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure reported by host member code.
    #[error("Host error: {0}")]
    Host(String),

    /// Malformed JSON root document (transparent).
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExprError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(position: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: position={}, msg={}", position, message);

        ExprError::Lex { message, position }
    }

    /// Helper constructor for **grammar registration**.
    pub fn rule<S: Into<String>>(symbol: &str, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Rule error: symbol={}, msg={}", symbol, message);

        ExprError::Rule {
            symbol: symbol.to_string(),
            message,
        }
    }

    /// Helper constructor for the **tree builder**.
    pub fn parse<S: Into<String>>(position: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: position={}, msg={}", position, message);

        ExprError::Parse { message, position }
    }

    pub fn binding<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Binding error: {}", message);

        ExprError::Binding(message)
    }

    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Type error: {}", message);

        ExprError::Type(message)
    }

    pub fn arithmetic<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Arithmetic error: {}", message);

        ExprError::Arithmetic(message)
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Format error: {}", message);

        ExprError::Format(message)
    }

    /// Used by host types to fail a getter, setter, method or indexer.
    pub fn host<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Host error: {}", message);

        ExprError::Host(message)
    }

    /// `true` for failures raised before evaluation starts (scanning, rules, tree building).
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ExprError::Lex { .. } | ExprError::Rule { .. } | ExprError::Parse { .. }
        )
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, ExprError>;

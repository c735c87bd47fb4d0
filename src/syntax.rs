//! The standard expression grammar: symbol table, custom tree builders and
//! literal preparers.
//!
//! | Priority | Symbols                                         |
//! |---------:|-------------------------------------------------|
//! | 1        | `.` `?.` `name(..)` `name[..]` `(..)`           |
//! | 2        | unary `+` `-` `!`, `**` (right-associative)     |
//! | 3        | `*` `/` `%`                                     |
//! | 4        | binary `+` `-`                                  |
//! | 6        | `<` `<=` `>` `>=`                               |
//! | 7        | `==` `!=`                                       |
//! | 11       | `&&`                                            |
//! | 12       | `\|\|`                                          |
//! | 13       | `? :`                                           |
//! | 14       | `=` (right-associative)                         |
//! | 15       | `,` (argument lists only)                       |
//!
//! Registration order is lexing order: literals and keywords come before
//! identifiers, and longer operators before their prefixes (`**` before `*`,
//! `<=` before `<`, `?.` before `?`).

use crate::engine::Engine;
use crate::error::{ExprError, Result};
use crate::format::Template;
use crate::grammar::Grammar;
use crate::interpreter as eval;
use crate::parser::{Interpolation, NodeId, Prepared, TreeBuilder};
use crate::token::Lexeme;
use crate::value::Value;

/// Symbol names of the standard grammar.
pub mod names {
    pub const WHITESPACE: &str = "WHITESPACE";
    pub const COMMENT: &str = "COMMENT";
    pub const FLOAT: &str = "FLOAT";
    pub const INT: &str = "INT";
    pub const STRING: &str = "STRING";
    pub const TRUE: &str = "TRUE";
    pub const FALSE: &str = "FALSE";
    pub const NULL: &str = "NULL";
    pub const IDENTIFIER: &str = "IDENTIFIER";
    pub const DOT: &str = "DOT";
    pub const METHOD: &str = "METHOD";
    pub const INDEXER: &str = "INDEXER";
    pub const LEFT_PAREN: &str = "LEFT_PAREN";
    pub const RIGHT_PAREN: &str = "RIGHT_PAREN";
    pub const LEFT_BRACKET: &str = "LEFT_BRACKET";
    pub const RIGHT_BRACKET: &str = "RIGHT_BRACKET";
    pub const PLUS: &str = "PLUS";
    pub const MINUS: &str = "MINUS";
    pub const STAR_STAR: &str = "STAR_STAR";
    pub const BANG: &str = "BANG";
    pub const STAR: &str = "STAR";
    pub const SLASH: &str = "SLASH";
    pub const PERCENT: &str = "PERCENT";
    pub const LESS_EQUAL: &str = "LESS_EQUAL";
    pub const LESS: &str = "LESS";
    pub const GREATER_EQUAL: &str = "GREATER_EQUAL";
    pub const GREATER: &str = "GREATER";
    pub const EQUAL_EQUAL: &str = "EQUAL_EQUAL";
    pub const BANG_EQUAL: &str = "BANG_EQUAL";
    pub const AND_AND: &str = "AND_AND";
    pub const OR_OR: &str = "OR_OR";
    pub const QUESTION: &str = "QUESTION";
    pub const COLON: &str = "COLON";
    pub const EQUAL: &str = "EQUAL";
    pub const COMMA: &str = "COMMA";
}

use names::*;

const IDENT: &str = r"[a-zA-Z_][a-zA-Z_0-9]*";

/// Priority argument expressions are built at; stops at `,` and `)`.
const ARGUMENT_PRIORITY: u8 = 15;

/// Priority a bracketed expression is built at; stops only at closing tokens.
const CLOSING_PRIORITY: u8 = 100;

/// Build the standard grammar.
pub fn standard() -> Result<Grammar> {
    let mut g = Grammar::new();

    g.ignore(WHITESPACE, r"\s+")?;
    g.ignore(COMMENT, r"/\*(?s:.*?)\*/")?;

    g.terminal(FLOAT, r"\d+(?:(?:\.\d+)?[fF]|\.\d+)", None)?
        .with_preparer(prepare_float);
    g.terminal(INT, r"\d+", None)?.with_preparer(prepare_int);
    g.terminal(STRING, r#""[^"]*"|'[^']*'"#, None)?
        .with_preparer(prepare_string);
    g.terminal(TRUE, r"true\b", None)?.with_preparer(prepare_keyword);
    g.terminal(FALSE, r"false\b", None)?
        .with_preparer(prepare_keyword);
    g.terminal(NULL, r"null\b", None)?.with_preparer(prepare_keyword);
    g.terminal(IDENTIFIER, IDENT, Some(eval::identifier))?;

    // 1: member access, calls, grouping
    g.binary(1, DOT, Some(r"\.|\?\."), Some(eval::dot))?;
    g.unary(1, METHOD, Some(IDENT), Some(eval::method))?
        .boosted()
        .followed_by(r"\s*\(")?
        .with_prefix_builder(build_call);
    g.unary(1, INDEXER, Some(IDENT), Some(eval::indexer))?
        .boosted()
        .followed_by(r"\s*\[")?
        .with_prefix_builder(build_index);
    g.unary(1, LEFT_PAREN, Some(r"\("), Some(eval::group))?
        .with_prefix_builder(build_group);
    g.binary(CLOSING_PRIORITY, RIGHT_PAREN, Some(r"\)"), None)?;
    g.unary(1, LEFT_BRACKET, Some(r"\["), None)?
        .with_prefix_builder(build_bracket);
    g.binary(CLOSING_PRIORITY, RIGHT_BRACKET, Some(r"\]"), None)?;

    // 2: unary operators, power
    g.unary(2, PLUS, Some(r"\+"), Some(eval::unary_plus))?;
    g.unary(2, MINUS, Some(r"-|−"), Some(eval::unary_minus))?;
    g.binary(2, STAR_STAR, Some(r"\*\*"), Some(eval::pow))?
        .right_associative();
    g.unary(2, BANG, Some(r"!"), Some(eval::not))?;

    // 3, 4: arithmetic
    g.binary(3, STAR, Some(r"\*|×"), Some(eval::mul))?;
    g.binary(3, SLASH, Some(r"/|÷"), Some(eval::div))?;
    g.binary(3, PERCENT, Some(r"%"), Some(eval::rem))?;
    g.binary(4, PLUS, None, Some(eval::add))?;
    g.binary(4, MINUS, None, Some(eval::sub))?;

    // 6, 7: comparison
    g.binary(6, LESS_EQUAL, Some(r"<="), Some(eval::le))?;
    g.binary(6, LESS, Some(r"<"), Some(eval::lt))?;
    g.binary(6, GREATER_EQUAL, Some(r">="), Some(eval::ge))?;
    g.binary(6, GREATER, Some(r">"), Some(eval::gt))?;
    g.binary(7, EQUAL_EQUAL, Some(r"=="), Some(eval::eq))?;
    g.binary(7, BANG_EQUAL, Some(r"!="), Some(eval::ne))?.boosted();

    // 11 - 15: logic, conditional, assignment, separators
    g.binary(11, AND_AND, Some(r"&&"), Some(eval::and))?;
    g.binary(12, OR_OR, Some(r"\|\|"), Some(eval::or))?;
    g.binary(13, QUESTION, Some(r"\?"), Some(eval::ternary))?
        .with_infix_builder(build_ternary);
    g.unary(13, COLON, Some(r":"), None)?
        .with_infix_priority(CLOSING_PRIORITY);
    g.binary(14, EQUAL, Some(r"="), Some(eval::assign))?
        .right_associative();
    g.binary(ARGUMENT_PRIORITY, COMMA, Some(r","), None)?;

    Ok(g)
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

/// `open arg (, arg)* close`, each argument becoming an input of `node`.
fn build_arguments(b: &mut TreeBuilder<'_>, node: NodeId, open: &str, close: &str) -> Result<()> {
    b.skip(open)?;

    if b.current_is(close) {
        return b.skip(close);
    }

    loop {
        let argument = b.build(ARGUMENT_PRIORITY)?;
        b.push_input(node, argument);

        if b.current_is(",") {
            b.skip(",")?;
        } else {
            break;
        }
    }

    b.skip(close)
}

fn build_call(b: &mut TreeBuilder<'_>, node: NodeId) -> Result<()> {
    build_arguments(b, node, "(", ")")
}

fn build_index(b: &mut TreeBuilder<'_>, node: NodeId) -> Result<()> {
    build_arguments(b, node, "[", "]")
}

fn build_group(b: &mut TreeBuilder<'_>, node: NodeId) -> Result<()> {
    let inner = b.build(CLOSING_PRIORITY)?;
    b.push_input(node, inner);
    b.skip(")")
}

fn build_bracket(b: &mut TreeBuilder<'_>, node: NodeId) -> Result<()> {
    let inner = b.build(CLOSING_PRIORITY)?;
    b.push_input(node, inner);
    b.skip("]")
}

/// `cond ? a : b` with `left` as the condition.
fn build_ternary(b: &mut TreeBuilder<'_>, node: NodeId, left: NodeId) -> Result<()> {
    b.push_input(node, left);
    b.pop()?;

    let when_true = b.build(13)?;
    b.push_input(node, when_true);
    b.skip(":")?;

    let when_false = b.build(13)?;
    b.push_input(node, when_false);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Preparers
// ─────────────────────────────────────────────────────────────────────────────

fn prepare_int(_: &Engine, lexeme: &Lexeme) -> Result<Prepared> {
    lexeme
        .text
        .parse::<i32>()
        .map(|v| Prepared::Constant(Value::Int(v)))
        .map_err(|e| ExprError::parse(lexeme.position, format!("Invalid integer {}: {}", lexeme.text, e)))
}

fn prepare_float(_: &Engine, lexeme: &Lexeme) -> Result<Prepared> {
    lexeme
        .text
        .trim_end_matches(['f', 'F'])
        .parse::<f32>()
        .map(|v| Prepared::Constant(Value::Float(v)))
        .map_err(|e| ExprError::parse(lexeme.position, format!("Invalid float {}: {}", lexeme.text, e)))
}

fn prepare_keyword(_: &Engine, lexeme: &Lexeme) -> Result<Prepared> {
    let value = match lexeme.text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Null,
    };

    Ok(Prepared::Constant(value))
}

/// Strip the quotes; every `{expr[,align][:format]}` hole is compiled now.
fn prepare_string(engine: &Engine, lexeme: &Lexeme) -> Result<Prepared> {
    let text = &lexeme.text;
    let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or_default();

    let (template, sources) = Template::parse_interpolated(inner, lexeme.position + 1)?;

    if sources.is_empty() {
        return Ok(Prepared::Constant(Value::str(template.render(&[])?)));
    }

    let parts = sources
        .iter()
        .map(|source| engine.build_expression(source))
        .collect::<Result<Vec<_>>>()?;

    Ok(Prepared::Interpolated(Interpolation::new(template, parts)))
}

//! Operand promotion for arithmetic, relational and equality operators.
//!
//! The order of checks is fixed:
//!
//! 1. `+`, `==`, `!=` only: if either operand is a string, both become strings.
//! 2. If both operands are integral, compute on `i32`.
//! 3. Otherwise compute on `f32`; for `==`/`!=` operands that are not both
//!    numeric fall back to general equality instead.

use crate::error::Result;
use crate::value::Value;

/// Operands after promotion.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    Text(String, String),
    Int(i32, i32),
    Float(f32, f32),
    /// Neither string nor numeric: compare with general equality.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i32),
    Float(f32),
}

/// Promotion used by `-`, `*`, `/`, `%`, `**` and the relational operators.
pub fn int_float(a: &Value, b: &Value, op: &str) -> Result<Operands> {
    if a.is_integral() && b.is_integral() {
        Ok(Operands::Int(a.to_i32(op)?, b.to_i32(op)?))
    } else {
        Ok(Operands::Float(a.to_f32(op)?, b.to_f32(op)?))
    }
}

/// Promotion used by `+` (`fallback == false`) and `==`/`!=` (`fallback == true`).
pub fn str_int_float(a: &Value, b: &Value, op: &str, fallback: bool) -> Result<Operands> {
    if a.is_str() || b.is_str() {
        return Ok(Operands::Text(a.to_string(), b.to_string()));
    }

    if a.is_integral() && b.is_integral() {
        return Ok(Operands::Int(a.to_i32(op)?, b.to_i32(op)?));
    }

    if (a.is_numeric() && b.is_numeric()) || !fallback {
        return Ok(Operands::Float(a.to_f32(op)?, b.to_f32(op)?));
    }

    Ok(Operands::Fallback)
}

/// Promotion for unary `+` and `-`.
pub fn int_float_unary(a: &Value, op: &str) -> Result<Operand> {
    if a.is_integral() {
        Ok(Operand::Int(a.to_i32(op)?))
    } else {
        Ok(Operand::Float(a.to_f32(op)?))
    }
}

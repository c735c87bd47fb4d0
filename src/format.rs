//! Composite formatting for interpolated string literals.
//!
//! An interpolated literal such as `'total {vm.Sum,8:F2} ({vm.Count})'` is
//! split once, at parse time, into a [`Template`] of text runs and holes.
//! Each hole carries the source of a nested expression, an optional
//! alignment (`,8` pads left, `,-8` pads right) and an optional format
//! specifier that is applied to the evaluated value:
//!
//! | Specifier      | Meaning                                   | `1234.5` →      |
//! |----------------|-------------------------------------------|-----------------|
//! | `F`n           | fixed point, n decimals (default 2)       | `1234.50`       |
//! | `N`n           | fixed point with thousands separators     | `1,234.50`      |
//! | `D`n           | integer, zero padded to n digits          | (integers only) |
//! | `X`n / `x`n    | hexadecimal                               | (integers only) |
//! | `E`n / `e`n    | scientific, n decimals (default 6)        | `1.234500E+003` |
//! | `P`n           | percent                                   | `123,450.00 %`  |
//! | `G`n           | n significant digits (default shortest)   | `G2` → `1.2E+03`|
//! | custom         | `0`, `#`, `.`, `,`, `%` + literal text    | `0.0` → `1234.5`|
//!
//! Rounding is half away from zero on the shortest decimal representation.
//! Formats apply to numbers only; other values ignore them.

use memchr::{memchr, memchr2};
use phf::phf_map;

use crate::error::{ExprError, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standard {
    Fixed,
    Number,
    Decimal,
    HexUpper,
    HexLower,
    ExponentUpper,
    ExponentLower,
    Percent,
    General,
}

static STANDARD_FORMATS: phf::Map<char, Standard> = phf_map! {
    'F' => Standard::Fixed,
    'f' => Standard::Fixed,
    'N' => Standard::Number,
    'n' => Standard::Number,
    'D' => Standard::Decimal,
    'd' => Standard::Decimal,
    'X' => Standard::HexUpper,
    'x' => Standard::HexLower,
    'E' => Standard::ExponentUpper,
    'e' => Standard::ExponentLower,
    'P' => Standard::Percent,
    'p' => Standard::Percent,
    'G' => Standard::General,
    'g' => Standard::General,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Hole {
        index: usize,
        alignment: Option<i32>,
        format: Option<String>,
    },
}

/// Validated composite format: text runs and numbered holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Split `text` into a template and the expression source of every hole.
    ///
    /// `position` is the offset of `text` in the enclosing source, used for errors.
    pub fn parse_interpolated(text: &str, position: usize) -> Result<(Template, Vec<String>)> {
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut sources = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while let Some(offset) = memchr2(b'{', b'}', &bytes[i..]) {
            let at = i + offset;
            literal.push_str(&text[i..at]);

            // escaped braces
            if bytes.get(at + 1) == Some(&bytes[at]) {
                literal.push(bytes[at] as char);
                i = at + 2;
                continue;
            }

            if bytes[at] == b'}' {
                return Err(ExprError::parse(position + at, "Unbalanced '}' in string literal"));
            }

            let close = memchr(b'}', &bytes[at + 1..])
                .map(|o| at + 1 + o)
                .ok_or_else(|| ExprError::parse(position + at, "Unclosed '{' in string literal"))?;

            let (source, alignment, format) = split_hole(&text[at + 1..close], position + at)?;

            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }

            segments.push(Segment::Hole {
                index: sources.len(),
                alignment,
                format,
            });
            sources.push(source);
            i = close + 1;
        }

        literal.push_str(&text[i..]);
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Ok((Template { segments }, sources))
    }

    /// Substitute `values` (one per hole, in order) into the template.
    pub fn render(&self, values: &[Value]) -> Result<String> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),

                Segment::Hole {
                    index,
                    alignment,
                    format,
                } => {
                    let value = values.get(*index).ok_or_else(|| {
                        ExprError::format(format!("No value for placeholder {}", index))
                    })?;
                    let text = format_value(value, format.as_deref())?;
                    out.push_str(&align(text, *alignment));
                }
            }
        }

        Ok(out)
    }
}

/// Shortest expression prefix whose remainder is a valid `[,alignment][:format]` tail.
fn split_hole(content: &str, position: usize) -> Result<(String, Option<i32>, Option<String>)> {
    for (at, _) in content.char_indices().chain(std::iter::once((content.len(), ' '))) {
        let Some((alignment, format)) = hole_tail(&content[at..]) else {
            continue;
        };

        let alignment = alignment
            .map(str::parse::<i32>)
            .transpose()
            .map_err(|_| ExprError::parse(position, "Alignment out of range"))?;

        return Ok((content[..at].to_string(), alignment, format.map(str::to_string)));
    }

    Err(ExprError::parse(position, format!("Malformed placeholder {{{}}}", content)))
}

/// Parse `[,\s*-?digits\s*][:format]`, the whole of `tail`.
fn hole_tail(tail: &str) -> Option<(Option<&str>, Option<&str>)> {
    let mut rest = tail;
    let mut alignment = None;

    if let Some(after) = rest.strip_prefix(',') {
        let end = after.find(':').unwrap_or(after.len());
        let number = after[..end].trim();
        let digits = number.strip_prefix('-').unwrap_or(number);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        alignment = Some(number);
        rest = &after[end..];
    }

    match rest.strip_prefix(':') {
        None if rest.is_empty() => Some((alignment, None)),
        Some(format) if !format.is_empty() => Some((alignment, Some(format))),
        _ => None,
    }
}

fn align(text: String, alignment: Option<i32>) -> String {
    let Some(alignment) = alignment else {
        return text;
    };

    let width = alignment.unsigned_abs() as usize;
    let len = text.chars().count();

    if len >= width {
        return text;
    }

    let padding = " ".repeat(width - len);

    if alignment < 0 {
        text + &padding
    } else {
        padding + &text
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value formatting
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Byte(v) => Number::Integer(i64::from(*v)),
            Value::Short(v) => Number::Integer(i64::from(*v)),
            Value::Int(v) => Number::Integer(i64::from(*v)),
            Value::Long(v) => Number::Integer(*v),
            // shortest text first, so 3.1f formats as 3.1 rather than 3.0999999
            Value::Float(v) => Number::Real(v.to_string().parse::<f64>().unwrap_or(f64::from(*v))),
            Value::Double(v) => Number::Real(*v),
            _ => return None,
        })
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(v) => v as f64,
            Number::Real(v) => v,
        }
    }
}

/// Render `value`, applying `format` when the value is numeric.
pub fn format_value(value: &Value, format: Option<&str>) -> Result<String> {
    let format = format.map(str::trim).filter(|f| !f.is_empty());

    match (Number::of(value), format) {
        (Some(number), Some(format)) => format_number(value, number, format),
        _ => Ok(value.to_string()),
    }
}

fn format_number(value: &Value, number: Number, format: &str) -> Result<String> {
    let mut chars = format.chars();
    let letter = chars.next().unwrap_or('G');
    let rest = chars.as_str();

    let standard = STANDARD_FORMATS
        .get(&letter)
        .copied()
        .filter(|_| rest.chars().all(|c| c.is_ascii_digit()));

    let Some(standard) = standard else {
        return Ok(custom(number.as_f64(), format));
    };

    let precision = if rest.is_empty() {
        None
    } else {
        Some(
            rest.parse::<usize>()
                .map_err(|_| ExprError::format(format!("Precision out of range in '{}'", format)))?,
        )
    };

    Ok(match standard {
        Standard::Fixed => signed(number.as_f64(), precision.unwrap_or(2), false),

        Standard::Number => signed(number.as_f64(), precision.unwrap_or(2), true),

        Standard::Percent => format!("{} %", signed(number.as_f64() * 100.0, precision.unwrap_or(2), true)),

        Standard::Decimal => match number {
            Number::Integer(v) => {
                let mut digits = itoa::Buffer::new();
                let body = digits.format(v.unsigned_abs());
                let padded = format!("{:0>width$}", body, width = precision.unwrap_or(0));
                if v < 0 {
                    format!("-{}", padded)
                } else {
                    padded
                }
            }
            Number::Real(_) => {
                return Err(ExprError::format(format!(
                    "Format '{}' requires an integral value, received {}",
                    format,
                    value.type_name()
                )))
            }
        },

        Standard::HexUpper | Standard::HexLower => match number {
            Number::Integer(v) => {
                let bits = match value {
                    Value::Long(_) => v as u64,
                    _ => u64::from(v as u32),
                };
                let hex = if standard == Standard::HexUpper {
                    format!("{:X}", bits)
                } else {
                    format!("{:x}", bits)
                };
                format!("{:0>width$}", hex, width = precision.unwrap_or(0))
            }
            Number::Real(_) => {
                return Err(ExprError::format(format!(
                    "Format '{}' requires an integral value, received {}",
                    format,
                    value.type_name()
                )))
            }
        },

        Standard::ExponentUpper | Standard::ExponentLower => {
            exponent(number.as_f64(), precision.unwrap_or(6), standard == Standard::ExponentUpper)
        }

        Standard::General => match precision {
            Some(digits) if digits > 0 => general(number.as_f64(), digits, letter == 'G'),
            _ => value.to_string(),
        },
    })
}

/// Decimal digits of `|v|` and the position of the decimal point relative to them.
fn decimal_digits(v: f64) -> (Vec<u8>, i32) {
    if v == 0.0 {
        return (vec![0], 1);
    }

    let scientific = format!("{:e}", v.abs());
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();

    (digits, exp + 1)
}

/// Round `|v|` half away from zero to `decimals` places; returns integer and fraction digits.
fn round_fixed(v: f64, decimals: usize) -> (String, String) {
    let (mut digits, mut point) = decimal_digits(v);
    let keep = point + decimals as i32;

    if keep < 0 {
        digits.clear();
    } else if (keep as usize) < digits.len() {
        let round_up = digits[keep as usize] >= 5;
        digits.truncate(keep as usize);

        if round_up {
            let mut i = digits.len();
            loop {
                if i == 0 {
                    digits.insert(0, 1);
                    point += 1;
                    break;
                }
                i -= 1;
                if digits[i] == 9 {
                    digits[i] = 0;
                } else {
                    digits[i] += 1;
                    break;
                }
            }
        }
    }

    let digit_at = |idx: i32| -> char {
        if idx < 0 {
            '0'
        } else {
            digits.get(idx as usize).map_or('0', |d| (b'0' + d) as char)
        }
    };

    let int_part: String = if point <= 0 {
        "0".to_string()
    } else {
        (0..point).map(digit_at).collect()
    };
    let frac_part: String = (0..decimals as i32).map(|i| digit_at(point + i)).collect();

    (int_part, frac_part)
}

fn group_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);

    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

fn is_zero(int_part: &str, frac_part: &str) -> bool {
    int_part.chars().chain(frac_part.chars()).all(|c| c == '0')
}

fn signed(v: f64, decimals: usize, grouped: bool) -> String {
    let (int_part, frac_part) = round_fixed(v, decimals);
    let negative = v < 0.0 && !is_zero(&int_part, &frac_part);
    let int_part = if grouped { group_thousands(&int_part) } else { int_part };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&int_part);
    if decimals > 0 {
        out.push('.');
        out.push_str(&frac_part);
    }
    out
}

fn exponent(v: f64, decimals: usize, upper: bool) -> String {
    let text = format!("{:.*e}", decimals, v.abs());
    let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    format!(
        "{}{}{}{}{:03}",
        if v < 0.0 { "-" } else { "" },
        mantissa,
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.unsigned_abs()
    )
}

/// `digits` significant digits, scientific when the exponent falls outside `-5..digits`.
fn general(v: f64, digits: usize, upper: bool) -> String {
    if v == 0.0 {
        return "0".to_string();
    }

    let text = format!("{:.*e}", digits - 1, v.abs());
    let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp >= -5 && exp < digits as i32 {
        let decimals = (digits as i32 - 1 - exp) as usize;
        return trim_fraction(&signed(v, decimals, false)).to_string();
    }

    format!(
        "{}{}{}{}{:02}",
        if v < 0.0 { "-" } else { "" },
        trim_fraction(mantissa),
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.unsigned_abs()
    )
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Custom numeric pattern: literal prefix, `0#,.` body, literal suffix.
fn custom(v: f64, pattern: &str) -> String {
    let is_body = |c: char| matches!(c, '0' | '#' | ',' | '.');

    let start = pattern.find(|c| c == '0' || c == '#');
    let Some(start) = start else {
        return pattern.to_string();
    };
    let end = pattern
        .char_indices()
        .skip_while(|(i, _)| *i < start)
        .find(|(_, c)| !is_body(*c))
        .map_or(pattern.len(), |(i, _)| i);

    let (prefix, body, suffix) = (&pattern[..start], &pattern[start..end], &pattern[end..]);
    let v = if prefix.contains('%') || suffix.contains('%') {
        v * 100.0
    } else {
        v
    };

    let (int_pattern, frac_pattern) = body.split_once('.').unwrap_or((body, ""));
    let min_int = int_pattern.matches('0').count();
    let grouped = int_pattern.contains(',');
    let min_frac = frac_pattern.matches('0').count();
    let max_frac = min_frac + frac_pattern.matches('#').count();

    let (int_part, frac_part) = round_fixed(v, max_frac);
    let negative = v < 0.0 && !is_zero(&int_part, &frac_part);

    let mut frac_part = frac_part;
    while frac_part.len() > min_frac && frac_part.ends_with('0') {
        frac_part.pop();
    }

    let int_part = int_part.trim_start_matches('0');
    let int_part = format!("{:0>width$}", int_part, width = min_int);
    let int_part = if grouped { group_thousands(&int_part) } else { int_part };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(prefix);
    out.push_str(&int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(&frac_part);
    }
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_fixed(2.5, 0), ("3".to_string(), String::new()));
        assert_eq!(round_fixed(0.125, 2), ("0".to_string(), "13".to_string()));
        assert_eq!(round_fixed(9.995, 2), ("10".to_string(), "00".to_string()));
        assert_eq!(round_fixed(0.0004, 2), ("0".to_string(), "00".to_string()));
    }

    #[test]
    fn splits_hole_at_shortest_expression() {
        assert_eq!(
            split_hole("Math.Max(1,2),6:F1", 0).unwrap(),
            ("Math.Max(1,2)".to_string(), Some(6), Some("F1".to_string()))
        );
        assert_eq!(split_hole("a", 0).unwrap(), ("a".to_string(), None, None));
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("123"), "123");
    }
}

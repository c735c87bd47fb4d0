//! Conversions between Rust host types and dynamic [`Value`]s.
//!
//! * [`Typed`] declares the [`ValueType`] a Rust type is exposed as.
//! * `From<T> for Value` produces values from host data.
//! * [`FromValue`] reads host data back, accepting only implicit (lossless)
//!   numeric widening, the way a member write in a statically typed host would.
//! * [`coerce`] performs the explicit best-effort conversion used when a
//!   method or indexer is resolved by name rather than by exact signature.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ExprError, Result};
use crate::reflect::{Reflect, TypeRef};
use crate::value::{ObjectRef, Value, ValueType};

/// Declared type of a Rust type when exposed through a type accessor.
pub trait Typed {
    fn value_type() -> ValueType;
}

/// Read a Rust value out of a dynamic [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(value: &Value, expected: ValueType) -> Result<T> {
    Err(ExprError::type_error(format!(
        "Cannot convert {} to {}",
        value.type_name(),
        expected
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// Primitive numeric kinds
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! primitive {
    ($ty:ty, $variant:ident, $kind:ident, [$($from:ident),*]) => {
        impl Typed for $ty {
            fn value_type() -> ValueType {
                ValueType::$kind
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl FromValue for $ty {
            #[allow(clippy::unnecessary_cast)]
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    $(Value::$from(v) => Ok(*v as $ty),)*
                    other => mismatch(other, ValueType::$kind),
                }
            }
        }
    };
}

primitive!(u8, Byte, Byte, [Byte]);
primitive!(i16, Short, Short, [Byte, Short]);
primitive!(i32, Int, Int, [Byte, Short, Int]);
primitive!(i64, Long, Long, [Byte, Short, Int, Long]);
primitive!(f32, Float, Float, [Byte, Short, Int, Long, Float]);
primitive!(f64, Double, Double, [Byte, Short, Int, Long, Float, Double]);

impl Typed for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => mismatch(other, ValueType::Bool),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strings
// ─────────────────────────────────────────────────────────────────────────────

impl Typed for String {
    fn value_type() -> ValueType {
        ValueType::String
    }
}

impl Typed for Option<String> {
    fn value_type() -> ValueType {
        ValueType::String
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => mismatch(other, ValueType::String),
        }
    }
}

impl FromValue for Option<String> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => String::from_value(other).map(Some),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Containers, objects, unit
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into))
    }
}

impl<T> Typed for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => items.borrow().iter().map(T::from_value).collect(),
            other => mismatch(other, ValueType::List),
        }
    }
}

impl<T: Reflect> From<Rc<RefCell<T>>> for Value {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        Value::Object(ObjectRef::from_rc(rc))
    }
}

impl<T: Reflect> Typed for Rc<RefCell<T>> {
    fn value_type() -> ValueType {
        ValueType::Object(TypeRef::of::<T>())
    }
}

impl<T: Reflect> Typed for Option<Rc<RefCell<T>>> {
    fn value_type() -> ValueType {
        ValueType::Object(TypeRef::of::<T>())
    }
}

impl<T: Reflect> FromValue for Rc<RefCell<T>> {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_object()
            .and_then(ObjectRef::downcast::<T>)
            .map_or_else(|| mismatch(value, Self::value_type()), Ok)
    }
}

impl<T: Reflect> FromValue for Option<Rc<RefCell<T>>> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => Rc::<RefCell<T>>::from_value(other).map(Some),
        }
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<TypeRef> for Value {
    fn from(ty: TypeRef) -> Self {
        Value::Type(ty)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl Typed for () {
    fn value_type() -> ValueType {
        ValueType::Void
    }
}

impl Typed for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Explicit coercion
// ─────────────────────────────────────────────────────────────────────────────

/// Best-effort conversion of `value` to a numeric `target`.
///
/// Floating values round half to even, strings are parsed, booleans map to
/// `1`/`0` and `null` to zero. Non-numeric targets pass the value through.
pub fn coerce(value: &Value, target: ValueType) -> Result<Value> {
    Ok(match target {
        ValueType::Byte => Value::Byte(narrow(value, target)?),
        ValueType::Short => Value::Short(narrow(value, target)?),
        ValueType::Int => Value::Int(narrow(value, target)?),
        ValueType::Long => Value::Long(explicit_integer(value, target)?),
        ValueType::Float => Value::Float(explicit_float(value, target)? as f32),
        ValueType::Double => Value::Double(explicit_float(value, target)?),
        _ => value.clone(),
    })
}

fn narrow<T: TryFrom<i64>>(value: &Value, target: ValueType) -> Result<T> {
    let wide = explicit_integer(value, target)?;

    T::try_from(wide).map_err(|_| {
        ExprError::arithmetic(format!("{} is too large or too small for {}", wide, target))
    })
}

fn explicit_integer(value: &Value, target: ValueType) -> Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Byte(v) => Ok(i64::from(*v)),
        Value::Short(v) => Ok(i64::from(*v)),
        Value::Int(v) => Ok(i64::from(*v)),
        Value::Long(v) => Ok(*v),
        Value::Float(v) => rounded(f64::from(*v), target),
        Value::Double(v) => rounded(*v, target),
        Value::Str(s) => s.trim().parse::<i64>().map_err(|_| {
            ExprError::type_error(format!("'{}' is not a valid {}", s, target))
        }),
        other => mismatch(other, target),
    }
}

fn rounded(v: f64, target: ValueType) -> Result<i64> {
    let r = v.round_ties_even();

    if r.is_finite() && r >= i64::MIN as f64 && r <= i64::MAX as f64 {
        Ok(r as i64)
    } else {
        Err(ExprError::arithmetic(format!(
            "{} is too large or too small for {}",
            v, target
        )))
    }
}

fn explicit_float(value: &Value, target: ValueType) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Byte(v) => Ok(f64::from(*v)),
        Value::Short(v) => Ok(f64::from(*v)),
        Value::Int(v) => Ok(f64::from(*v)),
        Value::Long(v) => Ok(*v as f64),
        Value::Float(v) => Ok(f64::from(*v)),
        Value::Double(v) => Ok(*v),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            ExprError::type_error(format!("'{}' is not a valid {}", s, target))
        }),
        other => mismatch(other, target),
    }
}

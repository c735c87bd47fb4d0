//! JSON documents as expression roots.
//!
//! Objects become [`Record`]s (so their keys read as members), arrays become
//! lists, integers become `int` (or `long` when they do not fit) and every
//! other number becomes `double`.

use std::io::Read;

use log::info;
use serde_json::{Map, Number, Value as Json};

use crate::builtins::Record;
use crate::environment::Scope;
use crate::error::{ExprError, Result};
use crate::value::Value;

pub fn to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number(n),
        Json::String(s) => Value::str(s),
        Json::Array(items) => Value::list(items.iter().map(to_value)),
        Json::Object(fields) => Value::object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_value(v)))
                .collect::<Record>(),
        ),
    }
}

fn number(n: &Number) -> Value {
    if let Some(v) = n.as_i64() {
        return i32::try_from(v).map_or(Value::Long(v), Value::Int);
    }

    n.as_f64().map_or(Value::Null, Value::Double)
}

/// JSON rendering of a value; host objects other than records become their display text.
pub fn from_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Byte(v) => Json::from(*v),
        Value::Short(v) => Json::from(*v),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        // shortest f32 text keeps 0.1f as 0.1
        Value::Float(v) => float(v.to_string().parse().unwrap_or(f64::NAN)),
        Value::Double(v) => float(*v),
        Value::Str(s) => Json::String(s.to_string()),
        Value::List(items) => Json::Array(items.borrow().iter().map(from_value).collect()),
        Value::Object(obj) => match obj.cell::<Record>() {
            Some(cell) => match cell.try_borrow() {
                Ok(record) => Json::Object(
                    record
                        .iter()
                        .map(|(k, v)| (k.clone(), from_value(v)))
                        .collect::<Map<_, _>>(),
                ),
                Err(_) => Json::String(value.to_string()),
            },
            None => Json::String(value.to_string()),
        },
        Value::Type(ty) => Json::String(ty.name().to_string()),
    }
}

fn float(v: f64) -> Json {
    Number::from_f64(v).map_or(Json::Null, Json::Number)
}

/// Register every top-level key of a JSON object as a root of `scope`.
pub fn roots_from_str(scope: &mut Scope, text: &str) -> Result<usize> {
    let document: Json = serde_json::from_str(text)?;
    add_roots(scope, &document)
}

pub fn roots_from_reader<R: Read>(scope: &mut Scope, reader: R) -> Result<usize> {
    let document: Json = serde_json::from_reader(reader)?;
    add_roots(scope, &document)
}

fn add_roots(scope: &mut Scope, document: &Json) -> Result<usize> {
    let fields = document
        .as_object()
        .ok_or_else(|| ExprError::host("Root document must be a JSON object"))?;

    for (name, json) in fields {
        scope.add_value_root(name, to_value(json));
    }

    info!("Loaded {} roots from JSON", fields.len());
    Ok(fields.len())
}

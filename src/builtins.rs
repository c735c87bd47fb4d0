//! Type accessors for values the engine produces itself: primitives,
//! strings, lists, the map-like [`Record`] and the static [`MathFunctions`].

use std::collections::BTreeMap;

use crate::error::{ExprError, Result};
use crate::format::format_value;
use crate::reflect::{Reflect, TypeBuilder};
use crate::value::{Value, ValueType};

fn text(context: &Value) -> Result<&str> {
    context
        .as_str()
        .ok_or_else(|| ExprError::type_error(format!("Expected string but received {}", context.type_name())))
}

fn string_arg(args: &[Value], i: usize) -> Result<&str> {
    text(&args[i])
}

fn int_arg(args: &[Value], i: usize) -> Result<i32> {
    args[i].to_i32("argument")
}

/// `ToString()` and `ToString(format)` shared by every primitive.
fn formattable<T: Reflect>(b: &mut TypeBuilder<T>) {
    b.raw_method("ToString", &[], ValueType::String, |context, _| {
        Ok(Value::str(context.to_string()))
    });
    b.raw_method("ToString", &[ValueType::String], ValueType::String, |context, args| {
        format_value(context, Some(string_arg(args, 0)?)).map(Value::from)
    });
}

macro_rules! primitive_type {
    ($ty:ty, $name:literal) => {
        impl Reflect for $ty {
            const NAME: &'static str = $name;

            fn reflect(b: &mut TypeBuilder<Self>) {
                formattable(b);
            }
        }
    };
}

primitive_type!(bool, "bool");
primitive_type!(u8, "byte");
primitive_type!(i16, "short");
primitive_type!(i32, "int");
primitive_type!(i64, "long");
primitive_type!(f32, "float");
primitive_type!(f64, "double");

impl Reflect for String {
    const NAME: &'static str = "string";

    fn reflect(b: &mut TypeBuilder<Self>) {
        formattable(b);

        b.raw_property("Length", ValueType::Int, |context| {
            Ok(Value::Int(text(context)?.chars().count() as i32))
        })
        .raw_method("ToUpper", &[], ValueType::String, |context, _| {
            Ok(Value::from(text(context)?.to_uppercase()))
        })
        .raw_method("ToLower", &[], ValueType::String, |context, _| {
            Ok(Value::from(text(context)?.to_lowercase()))
        })
        .raw_method("Trim", &[], ValueType::String, |context, _| {
            Ok(Value::from(text(context)?.trim()))
        })
        .raw_method("Contains", &[ValueType::String], ValueType::Bool, |context, args| {
            Ok(Value::Bool(text(context)?.contains(string_arg(args, 0)?)))
        })
        .raw_method("StartsWith", &[ValueType::String], ValueType::Bool, |context, args| {
            Ok(Value::Bool(text(context)?.starts_with(string_arg(args, 0)?)))
        })
        .raw_method("EndsWith", &[ValueType::String], ValueType::Bool, |context, args| {
            Ok(Value::Bool(text(context)?.ends_with(string_arg(args, 0)?)))
        })
        .raw_method(
            "Substring",
            &[ValueType::Int, ValueType::Int],
            ValueType::String,
            |context, args| {
                let chars: Vec<char> = text(context)?.chars().collect();
                let (start, length) = (int_arg(args, 0)?, int_arg(args, 1)?);

                if start < 0 || length < 0 || (start as usize + length as usize) > chars.len() {
                    return Err(ExprError::binding(format!(
                        "Substring({}, {}) is out of range for a string of length {}",
                        start,
                        length,
                        chars.len()
                    )));
                }

                let start = start as usize;
                Ok(Value::from(chars[start..start + length as usize].iter().collect::<String>()))
            },
        )
        .raw_indexer(&[ValueType::Int], ValueType::String, |context, args| {
            let i = int_arg(args, 0)?;

            usize::try_from(i)
                .ok()
                .and_then(|i| text(context).ok()?.chars().nth(i))
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| ExprError::binding(format!("Index {} is out of range", i)))
        });
    }
}

impl Reflect for Vec<Value> {
    const NAME: &'static str = "list";

    fn reflect(b: &mut TypeBuilder<Self>) {
        fn items(context: &Value) -> Result<&crate::value::ListRef> {
            match context {
                Value::List(items) => Ok(items),
                other => Err(ExprError::type_error(format!(
                    "Expected list but received {}",
                    other.type_name()
                ))),
            }
        }

        b.raw_property("Count", ValueType::Int, |context| {
            Ok(Value::Int(items(context)?.borrow().len() as i32))
        })
        .raw_property("Length", ValueType::Int, |context| {
            Ok(Value::Int(items(context)?.borrow().len() as i32))
        })
        .raw_method("Contains", &[ValueType::Any], ValueType::Bool, |context, args| {
            Ok(Value::Bool(items(context)?.borrow().contains(&args[0])))
        })
        .raw_indexer(&[ValueType::Int], ValueType::Any, |context, args| {
            let i = int_arg(args, 0)?;
            let items = items(context)?.borrow();

            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| {
                    ExprError::binding(format!(
                        "Index {} is out of range for a list of {} items",
                        i,
                        items.len()
                    ))
                })
        });
    }
}

/// Map-like host object whose keys are reachable as members: `rec.key`, `rec['key']`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Reflect for Record {
    const NAME: &'static str = "Record";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.property("Count", |r: &Record| r.fields.len() as i32)
            .property("Keys", |r: &Record| r.fields.keys().cloned().collect::<Vec<String>>())
            .method1("ContainsKey", |r: &mut Record, key: String| r.fields.contains_key(&key))
            .indexer(|r: &Record, key: String| r.fields.get(&key).cloned().unwrap_or_default())
            .dynamic_members(
                |r: &Record, name: &str| r.fields.get(name).cloned(),
                |r: &mut Record, name: &str, value: Value| {
                    r.fields.insert(name.to_string(), value);
                    true
                },
            );
    }
}

/// Static-only type registered as the `Math` root.
pub struct MathFunctions;

impl Reflect for MathFunctions {
    const NAME: &'static str = "Math";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.static_property("PI", || std::f32::consts::PI)
            .static_property("E", || std::f32::consts::E)
            .static_method2("Min", |a: i32, c: i32| a.min(c))
            .static_method2("Min", |a: f32, c: f32| a.min(c))
            .static_method2("Max", |a: i32, c: i32| a.max(c))
            .static_method2("Max", |a: f32, c: f32| a.max(c))
            .static_method1("Abs", |a: i32| a.wrapping_abs())
            .static_method1("Abs", |a: f32| a.abs())
            .static_method1("Sqrt", |a: f32| a.sqrt())
            .static_method2("Pow", |a: f32, c: f32| a.powf(c))
            .static_method1("Round", |a: f32| a.round_ties_even())
            .static_method1("Floor", |a: f32| a.floor())
            .static_method1("Ceiling", |a: f32| a.ceil())
            .static_method(
                "Clamp",
                &[ValueType::Float, ValueType::Float, ValueType::Float],
                ValueType::Float,
                |args| {
                    let v = args[0].to_f32("Clamp")?;
                    let (lo, hi) = (args[1].to_f32("Clamp")?, args[2].to_f32("Clamp")?);
                    Ok(Value::Float(v.max(lo).min(hi)))
                },
            );
    }
}

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ExprError, Result};
use crate::reflect::{Reflect, TypeRef};

/// Shared, mutable list payload.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Dynamic runtime value flowing through evaluation.
///
/// Integral kinds mirror the numeric kinds host members may declare; the
/// evaluator promotes them to `Int` or `Float` when computing.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Rc<str>),
    List(ListRef),
    Object(ObjectRef),
    /// A type used as a static member context (static roots).
    Type(TypeRef),
}

/// Declared or runtime type of a member, argument or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Accepts any value, `null` included.
    Any,
    /// Methods without a result.
    Void,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    List,
    Object(TypeRef),
    Type,
}

impl ValueType {
    /// Types a `null` argument may bind to.
    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            ValueType::Any
                | ValueType::String
                | ValueType::List
                | ValueType::Object(_)
                | ValueType::Type
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Void => "void",
            ValueType::Bool => "bool",
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Object(ty) => ty.name(),
            ValueType::Type => "type",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to a host object living in a `RefCell`.
///
/// The cell is stored type-erased so that the original `Rc<RefCell<T>>` can
/// be recovered by downcasting; equality is identity.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Rc<dyn Any>,
    ty: TypeRef,
}

impl ObjectRef {
    pub fn new<T: Reflect>(value: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(value)))
    }

    pub fn from_rc<T: Reflect>(rc: Rc<RefCell<T>>) -> Self {
        Self {
            cell: rc,
            ty: TypeRef::of::<T>(),
        }
    }

    #[inline]
    pub fn type_ref(&self) -> TypeRef {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }

    /// Borrow the cell when the object is a `T`.
    pub fn cell<T: Reflect>(&self) -> Option<&RefCell<T>> {
        self.cell.downcast_ref::<RefCell<T>>()
    }

    /// Recover the shared handle when the object is a `T`.
    pub fn downcast<T: Reflect>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.cell).downcast::<RefCell<T>>().ok()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.cell) as *const (),
            Rc::as_ptr(&other.cell) as *const (),
        )
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectRef({}@{:p})",
            self.ty.name(),
            Rc::as_ptr(&self.cell) as *const ()
        )
    }
}

impl Value {
    pub fn object<T: Reflect>(value: T) -> Self {
        Value::Object(ObjectRef::new(value))
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn str<S: AsRef<str>>(s: S) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Integral numeric kinds.
    #[inline]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)
        )
    }

    /// Integral and floating numeric kinds.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, Value::Float(_) | Value::Double(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The boolean payload, or a type error naming `what` needed it.
    pub fn as_bool(&self, what: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ExprError::type_error(format!(
                "Expected bool for {} but received {}",
                what,
                other.type_name()
            ))),
        }
    }

    /// Integral value as `i32`; narrowing a `long` that does not fit is an error.
    pub fn to_i32(&self, op: &str) -> Result<i32> {
        match self {
            Value::Byte(v) => Ok(i32::from(*v)),
            Value::Short(v) => Ok(i32::from(*v)),
            Value::Int(v) => Ok(*v),
            Value::Long(v) => i32::try_from(*v).map_err(|_| {
                ExprError::arithmetic(format!("{} does not fit an int in '{}'", v, op))
            }),
            other => Err(ExprError::type_error(format!(
                "Operator '{}' cannot be applied to {}",
                op,
                other.type_name()
            ))),
        }
    }

    /// Numeric value as `f32`.
    pub fn to_f32(&self, op: &str) -> Result<f32> {
        match self {
            Value::Byte(v) => Ok(f32::from(*v)),
            Value::Short(v) => Ok(f32::from(*v)),
            Value::Int(v) => Ok(*v as f32),
            Value::Long(v) => Ok(*v as f32),
            Value::Float(v) => Ok(*v),
            Value::Double(v) => Ok(*v as f32),
            other => Err(ExprError::type_error(format!(
                "Operator '{}' cannot be applied to {}",
                op,
                other.type_name()
            ))),
        }
    }

    /// Runtime type; `None` for `null`.
    pub fn runtime_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueType::Bool,
            Value::Byte(_) => ValueType::Byte,
            Value::Short(_) => ValueType::Short,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::Str(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Object(obj) => ValueType::Object(obj.type_ref()),
            Value::Type(_) => ValueType::Type,
        })
    }

    /// The type whose accessor resolves members on this value.
    ///
    /// A `Type` value resolves to itself, which is how static roots reach static members.
    pub fn type_ref(&self) -> Option<TypeRef> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => TypeRef::of::<bool>(),
            Value::Byte(_) => TypeRef::of::<u8>(),
            Value::Short(_) => TypeRef::of::<i16>(),
            Value::Int(_) => TypeRef::of::<i32>(),
            Value::Long(_) => TypeRef::of::<i64>(),
            Value::Float(_) => TypeRef::of::<f32>(),
            Value::Double(_) => TypeRef::of::<f64>(),
            Value::Str(_) => TypeRef::of::<String>(),
            Value::List(_) => TypeRef::of::<Vec<Value>>(),
            Value::Object(obj) => obj.type_ref(),
            Value::Type(ty) => *ty,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Type(ty) => ty.name(),
            other => other.runtime_type().map_or("null", ValueType::name),
        }
    }

    /// General equality used when neither the string nor a numeric path applies.
    ///
    /// Objects compare by identity, lists by content, types by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self == other
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = itoa::Buffer::new();

        match self {
            Value::Null => Ok(()),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Byte(v) => f.write_str(digits.format(*v)),

            Value::Short(v) => f.write_str(digits.format(*v)),

            Value::Int(v) => f.write_str(digits.format(*v)),

            Value::Long(v) => f.write_str(digits.format(*v)),

            Value::Float(v) => write!(f, "{}", v),

            Value::Double(v) => write!(f, "{}", v),

            Value::Str(s) => f.write_str(s),

            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }

            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),

            Value::Type(ty) => f.write_str(ty.name()),
        }
    }
}

//! Binding expressions evaluated against a host object graph.
//!
//! A [`Scope`] names the roots an expression can reach (`vm`, `Math`, ...) and
//! caches compiled [`Expression`]s by source text. The [`Engine`] behind it
//! lexes, builds and evaluates them, resolving members of host types through
//! [`Reflect`] accessors.
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use bindexpr::{Engine, Scope, Value};
//!
//! let mut scope = Scope::new(Rc::new(Engine::new().unwrap()));
//! scope.add_value_root("rate", Value::Int(3));
//!
//! assert_eq!(scope.evaluate("rate * 2 + 1").unwrap(), Value::Int(7));
//! ```

pub mod ast_printer;
pub mod builtins;
pub mod convert;
pub mod engine;
pub mod environment;
pub mod error;
pub mod format;
pub mod grammar;
pub mod interpreter;
pub mod json;
pub mod numeric;
pub mod parser;
pub mod reflect;
pub mod scanner;
pub mod syntax;
pub mod token;
pub mod value;

pub use engine::Engine;
pub use environment::{MemberRoot, Scope};
pub use error::{ExprError, Result};
pub use parser::Expression;
pub use reflect::{Reflect, TypeBuilder, TypeRef};
pub use value::{Value, ValueType};

//! Runtime member access over host types.
//!
//! A host type opts in by implementing [`Reflect`], whose `reflect` function
//! registers the type's readable/writable members, methods and indexers on a
//! [`TypeBuilder`].  The result is a [`TypeAccessor`]: name → getter, name →
//! setter, name → declared type, plus method, property and indexer
//! descriptors.  Accessors are built lazily, once per concrete type, and kept
//! in a [`TypeAccessorCache`] owned by the [`Engine`](crate::engine::Engine).
//!
//! # Resolution rules
//!
//! | Operation       | First attempt                         | Fallback                                           |
//! |-----------------|---------------------------------------|----------------------------------------------------|
//! | `get` / `set`   | declared member                       | dynamic members (map-like types)                   |
//! | `call_method`   | exact parameter types (`null` fits nullable params) | the single method of that name, arguments coerced |
//! | `get_indexed`   | exact parameter types                 | every argument converted to `int`                  |

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

use log::{debug, info};

use crate::convert::{coerce, FromValue, Typed};
use crate::error::{ExprError, Result};
use crate::value::{Value, ValueType};

/// A host type whose members expressions may reach.
pub trait Reflect: Any + Sized {
    /// Name used in diagnostics and type results.
    const NAME: &'static str;

    /// Register the members of `Self`.
    fn reflect(builder: &mut TypeBuilder<Self>);
}

/// Lightweight handle to a reflectable type: identity plus a way to build its accessor.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    build: fn() -> TypeAccessor,
}

impl TypeRef {
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::NAME,
            build: build_accessor::<T>,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name)
    }
}

fn build_accessor<T: Reflect>() -> TypeAccessor {
    let mut builder = TypeBuilder::<T>::new();
    T::reflect(&mut builder);
    builder.accessor
}

type Getter = Box<dyn Fn(&Value) -> Result<Value>>;
type Setter = Box<dyn Fn(&Value, Value) -> Result<()>>;
type Invoker = Box<dyn Fn(&Value, &[Value]) -> Result<Value>>;
type DynamicGetter = Box<dyn Fn(&Value, &str) -> Result<Option<Value>>>;
type DynamicSetter = Box<dyn Fn(&Value, &str, Value) -> Result<bool>>;

/// Readable and/or writable member.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: ValueType,
    pub readable: bool,
    pub writable: bool,
    pub is_static: bool,
}

pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
    pub is_static: bool,
    invoke: Invoker,
}

impl MethodDescriptor {
    fn accepts_exactly(&self, args: &[Value]) -> bool {
        signature_matches(&self.params, args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, type_list(&self.params))
    }
}

pub struct IndexerDescriptor {
    pub params: Vec<ValueType>,
    pub returns: ValueType,
    invoke: Invoker,
}

struct DynamicMembers {
    get: DynamicGetter,
    set: DynamicSetter,
}

fn signature_matches(params: &[ValueType], args: &[Value]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| match arg.runtime_type() {
                None => param.is_nullable(),
                Some(ty) => *param == ValueType::Any || *param == ty,
            })
}

fn type_list(types: &[ValueType]) -> String {
    types
        .iter()
        .map(|ty| ty.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn arg_types(args: &[Value]) -> String {
    args.iter()
        .map(Value::type_name)
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// TypeAccessor
// ─────────────────────────────────────────────────────────────────────────────

/// Member-access capabilities of one type, immutable once built.
pub struct TypeAccessor {
    name: &'static str,
    getters: HashMap<String, Getter>,
    setters: HashMap<String, Setter>,
    types: HashMap<String, ValueType>,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    indexers: Vec<IndexerDescriptor>,
    dynamic: Option<DynamicMembers>,
}

impl TypeAccessor {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            getters: HashMap::new(),
            setters: HashMap::new(),
            types: HashMap::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            indexers: Vec::new(),
            dynamic: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Declared type of a member, if the type declares one by that name.
    pub fn member_type(&self, name: &str) -> Option<ValueType> {
        self.types.get(name).copied()
    }

    /// Declared type of a member, or the runtime type of a dynamic member's current value.
    pub fn member_type_of(&self, context: &Value, name: &str) -> Result<ValueType> {
        if let Some(ty) = self.member_type(name) {
            return Ok(ty);
        }

        if let Some(dynamic) = &self.dynamic {
            if let Some(value) = (dynamic.get)(context, name)? {
                return Ok(value.runtime_type().unwrap_or(ValueType::Any));
            }
        }

        Err(ExprError::binding(format!(
            "Unable to find member {} on {}",
            name, self.name
        )))
    }

    pub fn get(&self, context: &Value, name: &str) -> Result<Value> {
        if let Some(getter) = self.getters.get(name) {
            debug!("Reading {}.{}", self.name, name);
            return getter(context);
        }

        if let Some(dynamic) = &self.dynamic {
            if let Some(value) = (dynamic.get)(context, name)? {
                return Ok(value);
            }
        }

        Err(ExprError::binding(format!(
            "Unable to find getter for {} on {}",
            name, self.name
        )))
    }

    pub fn set(&self, context: &Value, name: &str, value: Value) -> Result<()> {
        if let Some(setter) = self.setters.get(name) {
            debug!("Writing {}.{} = {}", self.name, name, value);
            return setter(context, value);
        }

        if let Some(dynamic) = &self.dynamic {
            if (dynamic.set)(context, name, value)? {
                return Ok(());
            }
        }

        Err(ExprError::binding(format!(
            "Unable to find setter for {} on {}",
            name, self.name
        )))
    }

    /// Invoke method `name`; when `disable_execute` is set the method is
    /// resolved and its arguments converted, but it is not called.
    pub fn call_method(
        &self,
        context: &Value,
        name: &str,
        disable_execute: bool,
        args: &[Value],
    ) -> Result<Value> {
        if let Some(method) = self
            .methods
            .iter()
            .find(|m| m.name == name && m.accepts_exactly(args))
        {
            if disable_execute {
                debug!("Execution disabled, skipping {}.{}", self.name, name);
                return Ok(Value::Null);
            }

            return (method.invoke)(context, args);
        }

        let mut candidates = self.methods.iter().filter(|m| m.name == name);

        let method = match (candidates.next(), candidates.next()) {
            (Some(method), None) => method,

            (None, _) => {
                return Err(ExprError::binding(format!(
                    "Unable to find method {} on {}",
                    name, self.name
                )))
            }

            (Some(_), Some(_)) => {
                return Err(ExprError::binding(format!(
                    "Ambiguous call to {}.{} with arguments ({})",
                    self.name,
                    name,
                    arg_types(args)
                )))
            }
        };

        if method.params.len() != args.len() {
            return Err(ExprError::binding(format!(
                "Argument count mismatch for {}.{}: expected {} but received {}",
                self.name,
                name,
                method.params.len(),
                args.len()
            )));
        }

        let converted = args
            .iter()
            .zip(&method.params)
            .map(|(arg, param)| coerce(arg, *param))
            .collect::<Result<Vec<_>>>()?;

        if disable_execute {
            debug!("Execution disabled, skipping {}.{}", self.name, name);
            return Ok(Value::Null);
        }

        (method.invoke)(context, &converted)
    }

    /// Index `context` with `args`; `name` only labels diagnostics.
    pub fn get_indexed(
        &self,
        context: &Value,
        name: &str,
        disable_execute: bool,
        args: &[Value],
    ) -> Result<Value> {
        let indexer = match self.find_indexer(args) {
            Some(indexer) => Some((indexer, None)),
            None => args
                .iter()
                .map(|arg| coerce(arg, ValueType::Int))
                .collect::<Result<Vec<_>>>()
                .ok()
                .and_then(|ints| self.find_indexer(&ints).map(|i| (i, Some(ints)))),
        };

        let Some((indexer, converted)) = indexer else {
            return Err(ExprError::binding(format!(
                "Unable to find indexer {} on {} for ({})",
                name,
                self.name,
                arg_types(args)
            )));
        };

        if disable_execute {
            debug!("Execution disabled, skipping {}[..]", name);
            return Ok(Value::Null);
        }

        (indexer.invoke)(context, converted.as_deref().unwrap_or(args))
    }

    fn find_indexer(&self, args: &[Value]) -> Option<&IndexerDescriptor> {
        self.indexers
            .iter()
            .find(|i| signature_matches(&i.params, args))
    }
}

impl fmt::Debug for TypeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAccessor")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .field("indexers", &self.indexers.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TypeBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Registers members of `T` while its [`TypeAccessor`] is being built.
///
/// Instance members downcast the context to `RefCell<T>`; static members
/// ignore it.  The `raw_*` forms receive the context value directly and are
/// used by built-in value types that are not stored in a cell.
pub struct TypeBuilder<T> {
    accessor: TypeAccessor,
    _marker: PhantomData<fn(T)>,
}

fn instance<'v, T: Reflect>(context: &'v Value, member: &str) -> Result<&'v RefCell<T>> {
    match context {
        Value::Object(obj) => obj.cell::<T>().ok_or_else(|| {
            ExprError::binding(format!(
                "{} is not a {} (reading {})",
                obj.type_name(),
                T::NAME,
                member
            ))
        }),

        Value::Type(_) => Err(ExprError::binding(format!(
            "{} is an instance member of {} and cannot be used statically",
            member,
            T::NAME
        ))),

        other => Err(ExprError::binding(format!(
            "Cannot use {} on {}",
            member,
            other.type_name()
        ))),
    }
}

fn borrow<'c, T>(cell: &'c RefCell<T>, member: &str) -> Result<Ref<'c, T>> {
    cell.try_borrow()
        .map_err(|_| ExprError::binding(format!("{} is being mutated", member)))
}

fn borrow_mut<'c, T>(cell: &'c RefCell<T>, member: &str) -> Result<RefMut<'c, T>> {
    cell.try_borrow_mut()
        .map_err(|_| ExprError::binding(format!("{} is already borrowed", member)))
}

impl<T: Reflect> TypeBuilder<T> {
    fn new() -> Self {
        Self {
            accessor: TypeAccessor::new(T::NAME),
            _marker: PhantomData,
        }
    }

    fn declare(&mut self, name: &str, ty: ValueType, readable: bool, writable: bool, is_static: bool) {
        self.accessor.types.insert(name.to_string(), ty);
        self.accessor.properties.push(PropertyDescriptor {
            name: name.to_string(),
            ty,
            readable,
            writable,
            is_static,
        });
    }

    /// Readable and writable field.
    pub fn field<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: Typed + Into<Value> + FromValue + 'static,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) + 'static,
    {
        self.property(name, get);

        let member = name.to_string();
        self.accessor.setters.insert(
            name.to_string(),
            Box::new(move |context: &Value, value: Value| {
                let cell = instance::<T>(context, &member)?;
                let value = V::from_value(&value)?;
                set(&mut *borrow_mut(cell, &member)?, value);
                Ok(())
            }),
        );

        if let Some(p) = self.accessor.properties.iter_mut().rev().find(|p| p.name == name) {
            p.writable = true;
        }

        self
    }

    /// Read-only member.
    pub fn property<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: Typed + Into<Value> + 'static,
        G: Fn(&T) -> V + 'static,
    {
        self.declare(name, V::value_type(), true, false, false);

        let member = name.to_string();
        self.accessor.getters.insert(
            name.to_string(),
            Box::new(move |context: &Value| {
                let cell = instance::<T>(context, &member)?;
                let value = get(&*borrow(cell, &member)?);
                Ok(value.into())
            }),
        );

        self
    }

    /// Read-only member reachable through a static root.
    pub fn static_property<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: Typed + Into<Value> + 'static,
        G: Fn() -> V + 'static,
    {
        self.declare(name, V::value_type(), true, false, true);
        self.accessor
            .getters
            .insert(name.to_string(), Box::new(move |_: &Value| Ok(get().into())));
        self
    }

    /// Method with explicit parameter types; `call` receives already matched arguments.
    pub fn method<F>(&mut self, name: &str, params: &[ValueType], returns: ValueType, call: F) -> &mut Self
    where
        F: Fn(&mut T, &[Value]) -> Result<Value> + 'static,
    {
        let member = name.to_string();
        self.push_method(
            name,
            params,
            returns,
            false,
            Box::new(move |context: &Value, args: &[Value]| {
                let cell = instance::<T>(context, &member)?;
                let result = call(&mut *borrow_mut(cell, &member)?, args);
                result
            }),
        )
    }

    pub fn method0<R, F>(&mut self, name: &str, call: F) -> &mut Self
    where
        R: Typed + Into<Value>,
        F: Fn(&mut T) -> R + 'static,
    {
        self.method(name, &[], R::value_type(), move |this, _| Ok(call(this).into()))
    }

    pub fn method1<A, R, F>(&mut self, name: &str, call: F) -> &mut Self
    where
        A: Typed + FromValue,
        R: Typed + Into<Value>,
        F: Fn(&mut T, A) -> R + 'static,
    {
        self.method(name, &[A::value_type()], R::value_type(), move |this, args| {
            Ok(call(this, A::from_value(&args[0])?).into())
        })
    }

    pub fn method2<A, B, R, F>(&mut self, name: &str, call: F) -> &mut Self
    where
        A: Typed + FromValue,
        B: Typed + FromValue,
        R: Typed + Into<Value>,
        F: Fn(&mut T, A, B) -> R + 'static,
    {
        self.method(
            name,
            &[A::value_type(), B::value_type()],
            R::value_type(),
            move |this, args| Ok(call(this, A::from_value(&args[0])?, B::from_value(&args[1])?).into()),
        )
    }

    pub fn static_method<F>(&mut self, name: &str, params: &[ValueType], returns: ValueType, call: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.push_method(name, params, returns, true, Box::new(move |_: &Value, args: &[Value]| call(args)))
    }

    pub fn static_method1<A, R, F>(&mut self, name: &str, call: F) -> &mut Self
    where
        A: Typed + FromValue,
        R: Typed + Into<Value>,
        F: Fn(A) -> R + 'static,
    {
        self.static_method(name, &[A::value_type()], R::value_type(), move |args| {
            Ok(call(A::from_value(&args[0])?).into())
        })
    }

    pub fn static_method2<A, B, R, F>(&mut self, name: &str, call: F) -> &mut Self
    where
        A: Typed + FromValue,
        B: Typed + FromValue,
        R: Typed + Into<Value>,
        F: Fn(A, B) -> R + 'static,
    {
        self.static_method(
            name,
            &[A::value_type(), B::value_type()],
            R::value_type(),
            move |args| Ok(call(A::from_value(&args[0])?, B::from_value(&args[1])?).into()),
        )
    }

    /// Single-key indexer.
    pub fn indexer<K, V, F>(&mut self, get: F) -> &mut Self
    where
        K: Typed + FromValue,
        V: Typed + Into<Value>,
        F: Fn(&T, K) -> V + 'static,
    {
        self.indexer_with(&[K::value_type()], V::value_type(), move |this, args| {
            Ok(get(this, K::from_value(&args[0])?).into())
        })
    }

    /// Indexer with any number of keys.
    pub fn indexer_with<F>(&mut self, params: &[ValueType], returns: ValueType, get: F) -> &mut Self
    where
        F: Fn(&T, &[Value]) -> Result<Value> + 'static,
    {
        self.accessor.indexers.push(IndexerDescriptor {
            params: params.to_vec(),
            returns,
            invoke: Box::new(move |context: &Value, args: &[Value]| {
                let cell = instance::<T>(context, "indexer")?;
                let result = get(&*borrow(cell, "indexer")?, args);
                result
            }),
        });
        self
    }

    /// Members resolved by name at runtime, consulted after declared members.
    ///
    /// `get` returns `None` for unknown names; `set` returns `false` when it refuses a name.
    pub fn dynamic_members<G, S>(&mut self, get: G, set: S) -> &mut Self
    where
        G: Fn(&T, &str) -> Option<Value> + 'static,
        S: Fn(&mut T, &str, Value) -> bool + 'static,
    {
        self.accessor.dynamic = Some(DynamicMembers {
            get: Box::new(move |context: &Value, name: &str| {
                let cell = instance::<T>(context, name)?;
                let value = get(&*borrow(cell, name)?, name);
                Ok(value)
            }),
            set: Box::new(move |context: &Value, name: &str, value: Value| {
                let cell = instance::<T>(context, name)?;
                let accepted = set(&mut *borrow_mut(cell, name)?, name, value);
                Ok(accepted)
            }),
        });
        self
    }

    // ───────────────────────────── raw context forms ────────────────────────

    pub fn raw_property<F>(&mut self, name: &str, ty: ValueType, get: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value> + 'static,
    {
        self.declare(name, ty, true, false, false);
        self.accessor.getters.insert(name.to_string(), Box::new(get));
        self
    }

    pub fn raw_method<F>(&mut self, name: &str, params: &[ValueType], returns: ValueType, call: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        self.push_method(name, params, returns, false, Box::new(call))
    }

    pub fn raw_indexer<F>(&mut self, params: &[ValueType], returns: ValueType, get: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        self.accessor.indexers.push(IndexerDescriptor {
            params: params.to_vec(),
            returns,
            invoke: Box::new(get),
        });
        self
    }

    fn push_method(
        &mut self,
        name: &str,
        params: &[ValueType],
        returns: ValueType,
        is_static: bool,
        invoke: Invoker,
    ) -> &mut Self {
        self.accessor.methods.push(MethodDescriptor {
            name: name.to_string(),
            params: params.to_vec(),
            returns,
            is_static,
            invoke,
        });
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Lazily built accessors keyed by concrete type; never evicted except by [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct TypeAccessorCache {
    accessors: RefCell<HashMap<TypeId, Rc<TypeAccessor>>>,
}

impl TypeAccessorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ty: TypeRef) -> Rc<TypeAccessor> {
        if let Some(accessor) = self.accessors.borrow().get(&ty.id()) {
            return Rc::clone(accessor);
        }

        let accessor = Rc::new((ty.build)());

        info!(
            "Built type accessor for {} ({} properties, {} methods)",
            ty.name(),
            accessor.properties.len(),
            accessor.methods.len()
        );

        self.accessors
            .borrow_mut()
            .insert(ty.id(), Rc::clone(&accessor));

        accessor
    }

    /// Accessor for the type a value resolves members against.
    pub fn for_value(&self, value: &Value) -> Result<Rc<TypeAccessor>> {
        value
            .type_ref()
            .map(|ty| self.get(ty))
            .ok_or_else(|| ExprError::binding("Cannot access members of null"))
    }

    pub fn len(&self) -> usize {
        self.accessors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ty: TypeRef) -> bool {
        self.accessors.borrow().contains_key(&ty.id())
    }

    pub fn clear(&self) {
        info!("Clearing {} cached type accessors", self.len());
        self.accessors.borrow_mut().clear();
    }
}

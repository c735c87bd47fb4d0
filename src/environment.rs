use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::engine::Engine;
use crate::error::{ExprError, Result};
use crate::interpreter::{EvalMode, Interpreter, PathTarget};
use crate::parser::Expression;
use crate::reflect::TypeRef;
use crate::value::{Value, ValueType};

/// Name of the temporary root [`Scope::assign`] injects.
pub const VALUE_ROOT: &str = "value";

enum RootKind {
    /// Re-read on every access.
    Object(Box<dyn Fn() -> Value>),
    /// Class-level access to the static members of a type.
    Static(TypeRef),
}

/// A named entry point into the host's object graph.
pub struct MemberRoot {
    name: String,
    kind: RootKind,
}

impl MemberRoot {
    pub fn object<F>(name: &str, accessor: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        Self {
            name: name.to_string(),
            kind: RootKind::Object(Box::new(accessor)),
        }
    }

    pub fn of_static(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            kind: RootKind::Static(ty),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, RootKind::Static(_))
    }

    /// Current value: the accessor's result, or the type itself for static roots.
    pub fn value(&self) -> Value {
        match &self.kind {
            RootKind::Object(accessor) => accessor(),
            RootKind::Static(ty) => Value::Type(*ty),
        }
    }

    /// Runtime type of the current value, or the fixed type of a static root.
    pub fn member_type(&self) -> Option<ValueType> {
        match &self.kind {
            RootKind::Object(accessor) => accessor().runtime_type(),
            RootKind::Static(ty) => Some(ValueType::Object(*ty)),
        }
    }
}

impl fmt::Debug for MemberRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            RootKind::Object(_) => "object",
            RootKind::Static(ty) => ty.name(),
        };

        f.debug_struct("MemberRoot")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// Named roots plus the compiled-expression cache an expression evaluates within.
pub struct Scope {
    engine: Rc<Engine>,
    roots: HashMap<String, MemberRoot>,
    expressions: RefCell<HashMap<String, Rc<Expression>>>,
    disable_execute: bool,
    disable_set: bool,
}

impl Scope {
    pub fn new(engine: Rc<Engine>) -> Self {
        Self {
            engine,
            roots: HashMap::new(),
            expressions: RefCell::new(HashMap::new()),
            disable_execute: false,
            disable_set: false,
        }
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    // ───────────────────────────── roots ────────────────────────────────────

    /// Add or replace a root.
    pub fn add_root(&mut self, root: MemberRoot) {
        debug!("Adding root {:?}", root);
        self.roots.insert(root.name.clone(), root);
    }

    pub fn add_object_root<F>(&mut self, name: &str, accessor: F)
    where
        F: Fn() -> Value + 'static,
    {
        self.add_root(MemberRoot::object(name, accessor));
    }

    /// Root that always yields (a clone of) `value`.
    pub fn add_value_root<V: Into<Value>>(&mut self, name: &str, value: V) {
        let value = value.into();
        self.add_object_root(name, move || value.clone());
    }

    pub fn add_static_root(&mut self, name: &str, ty: TypeRef) {
        self.add_root(MemberRoot::of_static(name, ty));
    }

    pub fn remove_root(&mut self, name: &str) -> Option<MemberRoot> {
        self.roots.remove(name)
    }

    pub fn root(&self, name: &str) -> Option<&MemberRoot> {
        self.roots.get(name)
    }

    pub fn roots(&self) -> impl Iterator<Item = &MemberRoot> {
        self.roots.values()
    }

    pub fn root_value(&self, name: &str) -> Result<Value> {
        self.roots
            .get(name)
            .map(MemberRoot::value)
            .ok_or_else(|| ExprError::binding(format!("Unable to find member root for {}", name)))
    }

    /// Remove every root; compiled expressions are kept.
    pub fn clear(&mut self) {
        debug!("Clearing {} roots", self.roots.len());
        self.roots.clear();
    }

    // ───────────────────────────── flags ────────────────────────────────────

    /// When set, method and indexer calls are resolved but not invoked, and writes are skipped.
    #[inline]
    pub fn disable_execute(&self) -> bool {
        self.disable_execute
    }

    pub fn set_disable_execute(&mut self, disable: bool) {
        self.disable_execute = disable;
    }

    /// When set, assignments and `set_value` skip the write.
    #[inline]
    pub fn disable_set(&self) -> bool {
        self.disable_set
    }

    pub fn set_disable_set(&mut self, disable: bool) {
        self.disable_set = disable;
    }

    // ───────────────────────────── expression cache ─────────────────────────

    /// Compiled expression for `code`, built on first request.
    pub fn build_or_get_expression(&self, code: &str) -> Result<Rc<Expression>> {
        if let Some(expression) = self.expressions.borrow().get(code) {
            return Ok(Rc::clone(expression));
        }

        let expression = Rc::new(self.engine.build_expression(code)?);
        info!("Caching expression {:?}", code);

        self.expressions
            .borrow_mut()
            .insert(code.to_string(), Rc::clone(&expression));

        Ok(expression)
    }

    pub fn cached_expressions(&self) -> usize {
        self.expressions.borrow().len()
    }

    pub fn clear_expressions(&self) {
        self.expressions.borrow_mut().clear();
    }

    // ───────────────────────────── evaluation ───────────────────────────────

    pub fn evaluate(&self, code: &str) -> Result<Value> {
        self.build_or_get_expression(code)?.evaluate(self)
    }

    fn probe(&self, expression: &Expression) -> Result<Option<PathTarget>> {
        Interpreter::new(expression, self, EvalMode::PathProbe).probe()
    }

    /// Write `value` to the member `expression` ends in.
    pub fn set_value(&self, expression: &Expression, value: Value) -> Result<()> {
        let target = self.probe(expression)?.ok_or_else(|| {
            ExprError::binding(format!(
                "{} is not a valid set value expression",
                expression.source()
            ))
        })?;

        if self.disable_set || self.disable_execute {
            debug!("Set disabled, skipping write of {}", target.member);
            return Ok(());
        }

        self.engine
            .accessor_for(&target.context)?
            .set(&target.context, &target.member, value)
    }

    pub fn set_path(&self, code: &str, value: Value) -> Result<()> {
        let expression = self.build_or_get_expression(code)?;
        self.set_value(&expression, value)
    }

    /// `true` when `expression` ends in `context.identifier` and the context resolves.
    pub fn is_valid_set_value_expression(&self, expression: &Expression) -> Result<bool> {
        Ok(self.probe(expression)?.is_some())
    }

    /// Like [`is_valid_set_value_expression`](Self::is_valid_set_value_expression), but any
    /// failure to compile or resolve `code` counts as invalid.
    pub fn is_valid_path(&self, code: &str) -> bool {
        self.build_or_get_expression(code)
            .and_then(|expression| self.is_valid_set_value_expression(&expression))
            .unwrap_or(false)
    }

    /// Declared type of the member `code` ends in, without reading it.
    pub fn path_result_type(&self, code: &str) -> Result<Option<ValueType>> {
        let expression = self.build_or_get_expression(code)?;

        let Some(target) = self.probe(&expression)? else {
            return Ok(None);
        };

        self.engine
            .accessor_for(&target.context)?
            .member_type_of(&target.context, &target.member)
            .map(Some)
    }

    /// Store `value` through `destination`.
    ///
    /// A plain member path is written directly; anything else is evaluated
    /// with a temporary `value` root holding `value`.
    pub fn assign(&mut self, destination: &str, value: Value) -> Result<Value> {
        let expression = self.build_or_get_expression(destination)?;

        if self.is_valid_set_value_expression(&expression)? {
            self.set_value(&expression, value.clone())?;
            return Ok(value);
        }

        let previous = self.remove_root(VALUE_ROOT);
        self.add_value_root(VALUE_ROOT, value);

        let result = expression.evaluate(self);

        self.remove_root(VALUE_ROOT);
        if let Some(previous) = previous {
            self.add_root(previous);
        }

        result
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .field("expressions", &self.cached_expressions())
            .field("disable_execute", &self.disable_execute)
            .field("disable_set", &self.disable_set)
            .finish()
    }
}

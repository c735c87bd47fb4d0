use log::debug;
use thiserror::Error;

use crate::environment::Scope;
use crate::error::{ExprError, Result};
use crate::numeric::{int_float, int_float_unary, str_int_float, Operand, Operands};
use crate::parser::{Expression, Node, NodeId, Prepared};
use crate::syntax::names;
use crate::value::Value;

/// Why evaluation of a node stopped early.
#[derive(Error, Debug)]
pub enum Interrupt {
    #[error(transparent)]
    Error(#[from] ExprError),

    /// The last identifier of the expression was reached while probing a path.
    #[error("Path end reached")]
    PathEnd,
}

/// Result of evaluating one node.
pub type Flow<T> = std::result::Result<T, Interrupt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Produce the value of the expression.
    Value,
    /// Stop at the last identifier and report where it points.
    PathProbe,
}

/// The member a path expression ends in: `context.member`.
#[derive(Debug, Clone)]
pub struct PathTarget {
    pub context: Value,
    pub member: String,
}

/// Tree walker for one evaluation of one expression.
pub struct Interpreter<'a> {
    expression: &'a Expression,
    scope: &'a Scope,
    mode: EvalMode,
    /// Context each dot node resolved its right side against, by node id.
    contexts: Vec<Option<Value>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(expression: &'a Expression, scope: &'a Scope, mode: EvalMode) -> Self {
        Self {
            expression,
            scope,
            mode,
            contexts: vec![None; expression.nodes().len()],
        }
    }

    /// Evaluate the whole expression.
    pub fn run(mut self) -> Result<Value> {
        match self.evaluate(self.expression.root()) {
            Ok(value) => Ok(value),
            Err(Interrupt::Error(e)) => Err(e),
            Err(Interrupt::PathEnd) => Err(ExprError::binding(format!(
                "Unexpected end of path in {}",
                self.expression.source()
            ))),
        }
    }

    /// Evaluate up to the last identifier without reading or writing it.
    ///
    /// `None` when the expression does not end in `context.identifier`.
    pub fn probe(mut self) -> Result<Option<PathTarget>> {
        if !self.expression.ends_in_identifier() {
            return Ok(None);
        }

        match self.evaluate(self.expression.root()) {
            Ok(_) => Ok(None),
            Err(Interrupt::Error(e)) => Err(e),
            Err(Interrupt::PathEnd) => Ok(self.path_target()),
        }
    }

    fn path_target(&self) -> Option<PathTarget> {
        let last = self.expression.last();
        let dot = self.dot_parent(last).filter(|&dot| is_plain_dot(self.node(dot)))?;
        let context = self.contexts[dot].clone()?;

        // the path value must flow unchanged from the dot to the root
        let mut child = dot;
        while let Some(parent) = self.node(child).parent {
            let node = self.node(parent);
            let passes = (is_plain_dot(node) && node.inputs.get(1) == Some(&child))
                || (node.is(names::LEFT_PAREN) && !node.infix);

            if !passes {
                return None;
            }
            child = parent;
        }

        Some(PathTarget {
            context,
            member: self.node(last).text().to_string(),
        })
    }

    #[inline]
    fn node(&self, id: NodeId) -> &'a Node {
        self.expression.node(id)
    }

    #[inline]
    pub(crate) fn input(&self, id: NodeId, index: usize) -> Flow<NodeId> {
        self.node(id).inputs.get(index).copied().ok_or_else(|| {
            Interrupt::Error(ExprError::parse(
                self.node(id).lexeme.position,
                format!("'{}' is missing operand {}", self.node(id).text(), index + 1),
            ))
        })
    }

    /// The dot node `id` is the right side of, if any.
    fn dot_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let node = self.node(parent);

        (node.is(names::DOT) && node.inputs.get(1) == Some(&id)).then_some(parent)
    }

    /// Context established by the dot `id` is the right side of.
    pub(crate) fn member_context(&self, id: NodeId) -> Option<Value> {
        self.dot_parent(id).and_then(|dot| self.contexts[dot].clone())
    }

    pub fn evaluate(&mut self, id: NodeId) -> Flow<Value> {
        let node = self.node(id);

        match node.prepared() {
            Some(Prepared::Constant(value)) => return Ok(value.clone()),

            Some(Prepared::Interpolated(interpolation)) => {
                let values = interpolation
                    .parts()
                    .iter()
                    .map(|part| part.evaluate(self.scope))
                    .collect::<Result<Vec<_>>>()?;

                return Ok(Value::str(interpolation.template().render(&values)?));
            }

            None => {}
        }

        let symbol = self.scope.engine().grammar().symbol(node.symbol);
        let evaluator = if node.infix { symbol.binary } else { symbol.unary };

        let evaluator = evaluator.ok_or_else(|| {
            ExprError::rule(
                symbol.name(),
                format!("'{}' has no evaluator", node.text()),
            )
        })?;

        debug!("Evaluating {} '{}'", symbol.name(), node.text());
        evaluator(self, id)
    }

    fn operands(&mut self, id: NodeId) -> Flow<(Value, Value)> {
        let left = self.evaluate(self.input(id, 0)?)?;
        let right = self.evaluate(self.input(id, 1)?)?;
        Ok((left, right))
    }

    fn arguments(&mut self, id: NodeId) -> Flow<Vec<Value>> {
        let inputs = &self.node(id).inputs;
        let mut args = Vec::with_capacity(inputs.len());

        for &input in inputs {
            args.push(self.evaluate(input)?);
        }

        Ok(args)
    }

    /// Evaluate the left side of dot `id`; `None` when `?.` met null.
    fn dot_context(&mut self, id: NodeId) -> Flow<Option<Value>> {
        let context = self.evaluate(self.input(id, 0)?)?;

        if !context.is_null() {
            return Ok(Some(context));
        }

        if self.node(id).text() == "?." {
            debug!("Null context, '?.' short-circuits");
            return Ok(None);
        }

        Err(ExprError::binding(format!(
            "Context is null in '{}' at {}",
            self.expression.source(),
            self.node(id).lexeme.position
        ))
        .into())
    }
}

/// `.` but not `?.`: only a plain dot can be written through.
fn is_plain_dot(node: &Node) -> bool {
    node.is(names::DOT) && node.text() == "."
}

// ─────────────────────────────────────────────────────────────────────────────
// Member access
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn identifier(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    if it.mode == EvalMode::PathProbe && id == it.expression.last() {
        return Err(Interrupt::PathEnd);
    }

    let name = it.node(id).text();

    match it.member_context(id) {
        Some(context) => {
            let accessor = it.scope.engine().accessor_for(&context)?;
            Ok(accessor.get(&context, name)?)
        }
        None => Ok(it.scope.root_value(name)?),
    }
}

pub(crate) fn dot(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let Some(context) = it.dot_context(id)? else {
        return Ok(Value::Null);
    };

    it.contexts[id] = Some(context);
    it.evaluate(it.input(id, 1)?)
}

pub(crate) fn method(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let context = it.member_context(id).ok_or_else(|| {
        ExprError::binding(format!(
            "Methods can only be used in combination with . or ?. ({})",
            it.node(id).text()
        ))
    })?;

    let args = it.arguments(id)?;
    let accessor = it.scope.engine().accessor_for(&context)?;

    Ok(accessor.call_method(&context, it.node(id).text(), it.scope.disable_execute(), &args)?)
}

pub(crate) fn indexer(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let name = it.node(id).text();

    let target = match it.member_context(id) {
        Some(context) => it.scope.engine().accessor_for(&context)?.get(&context, name)?,
        None => it.scope.root_value(name)?,
    };

    if target.is_null() {
        return Err(ExprError::binding(format!("{} returns null", name)).into());
    }

    let args = it.arguments(id)?;
    let accessor = it.scope.engine().accessor_for(&target)?;

    Ok(accessor.get_indexed(&target, name, it.scope.disable_execute(), &args)?)
}

pub(crate) fn group(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    it.evaluate(it.input(id, 0)?)
}

pub(crate) fn assign(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let target = it.input(id, 0)?;

    if !is_plain_dot(it.node(target)) {
        return Err(ExprError::binding(format!(
            "Left part of assignment must be dot but was '{}'",
            it.node(target).text()
        ))
        .into());
    }

    let member = it.input(target, 1)?;
    if !it.node(member).is(names::IDENTIFIER) {
        return Err(ExprError::binding(format!(
            "Cannot assign to '{}', expected a member name",
            it.node(member).text()
        ))
        .into());
    }

    let context = it.dot_context(target)?.ok_or_else(|| {
        ExprError::binding(format!("Context of '{}' is null", it.node(member).text()))
    })?;

    let value = it.evaluate(it.input(id, 1)?)?;
    let name = it.node(member).text();

    if it.scope.disable_set() || it.scope.disable_execute() {
        debug!("Set disabled, skipping write of {}", name);
        return Ok(value);
    }

    it.scope
        .engine()
        .accessor_for(&context)?
        .set(&context, name, value.clone())?;

    Ok(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Logic
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn and(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    if !it.evaluate(it.input(id, 0)?)?.as_bool("&&")? {
        return Ok(Value::Bool(false));
    }

    Ok(Value::Bool(it.evaluate(it.input(id, 1)?)?.as_bool("&&")?))
}

pub(crate) fn or(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    if it.evaluate(it.input(id, 0)?)?.as_bool("||")? {
        return Ok(Value::Bool(true));
    }

    Ok(Value::Bool(it.evaluate(it.input(id, 1)?)?.as_bool("||")?))
}

pub(crate) fn not(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    Ok(Value::Bool(!it.evaluate(it.input(id, 0)?)?.as_bool("!")?))
}

pub(crate) fn ternary(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let branch = if it.evaluate(it.input(id, 0)?)?.as_bool("?")? { 1 } else { 2 };
    it.evaluate(it.input(id, branch)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Arithmetic
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn unary_plus(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let value = it.evaluate(it.input(id, 0)?)?;

    Ok(match int_float_unary(&value, "+")? {
        Operand::Int(v) => Value::Int(v),
        Operand::Float(v) => Value::Float(v),
    })
}

pub(crate) fn unary_minus(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let value = it.evaluate(it.input(id, 0)?)?;

    Ok(match int_float_unary(&value, "-")? {
        Operand::Int(v) => Value::Int(v.wrapping_neg()),
        Operand::Float(v) => Value::Float(-v),
    })
}

pub(crate) fn add(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let (a, b) = it.operands(id)?;

    Ok(match str_int_float(&a, &b, "+", false)? {
        Operands::Text(a, b) => Value::str(a + &b),
        Operands::Int(a, b) => Value::Int(a.wrapping_add(b)),
        Operands::Float(a, b) => Value::Float(a + b),
        Operands::Fallback => {
            return Err(ExprError::type_error("Operator '+' needs strings or numbers").into())
        }
    })
}

/// `-`, `*`, `/`, `%` share the IntFloat promotion.
fn arithmetic(
    it: &mut Interpreter<'_>,
    id: NodeId,
    op: &str,
    int: fn(i32, i32) -> Option<i32>,
    float: fn(f32, f32) -> f32,
) -> Flow<Value> {
    let (a, b) = it.operands(id)?;

    match int_float(&a, &b, op)? {
        Operands::Int(x, y) => int(x, y).map(Value::Int).ok_or_else(|| {
            ExprError::arithmetic(format!("{} {} {} is undefined for int", x, op, y)).into()
        }),
        Operands::Float(x, y) => Ok(Value::Float(float(x, y))),
        _ => Err(ExprError::type_error(format!("Operator '{}' needs numbers", op)).into()),
    }
}

pub(crate) fn sub(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    arithmetic(it, id, "-", |a, b| Some(a.wrapping_sub(b)), |a, b| a - b)
}

pub(crate) fn mul(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    arithmetic(it, id, "*", |a, b| Some(a.wrapping_mul(b)), |a, b| a * b)
}

pub(crate) fn div(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    arithmetic(it, id, "/", i32::checked_div, |a, b| a / b)
}

pub(crate) fn rem(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    arithmetic(it, id, "%", i32::checked_rem, |a, b| a % b)
}

pub(crate) fn pow(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    let (a, b) = it.operands(id)?;

    let (base, exponent) = match int_float(&a, &b, "**")? {
        Operands::Int(x, y) => (f64::from(x), f64::from(y)),
        Operands::Float(x, y) => (f64::from(x), f64::from(y)),
        _ => return Err(ExprError::type_error("Operator '**' needs numbers").into()),
    };

    Ok(Value::Float(base.powf(exponent) as f32))
}

// ─────────────────────────────────────────────────────────────────────────────
// Comparison
// ─────────────────────────────────────────────────────────────────────────────

fn compare(
    it: &mut Interpreter<'_>,
    id: NodeId,
    op: &str,
    int: fn(&i32, &i32) -> bool,
    float: fn(&f32, &f32) -> bool,
) -> Flow<Value> {
    let (a, b) = it.operands(id)?;

    match int_float(&a, &b, op)? {
        Operands::Int(x, y) => Ok(Value::Bool(int(&x, &y))),
        Operands::Float(x, y) => Ok(Value::Bool(float(&x, &y))),
        _ => Err(ExprError::type_error(format!("Operator '{}' needs numbers", op)).into()),
    }
}

pub(crate) fn lt(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    compare(it, id, "<", i32::lt, f32::lt)
}

pub(crate) fn le(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    compare(it, id, "<=", i32::le, f32::le)
}

pub(crate) fn gt(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    compare(it, id, ">", i32::gt, f32::gt)
}

pub(crate) fn ge(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    compare(it, id, ">=", i32::ge, f32::ge)
}

fn equals(it: &mut Interpreter<'_>, id: NodeId, op: &str) -> Flow<bool> {
    let (a, b) = it.operands(id)?;

    Ok(match str_int_float(&a, &b, op, true)? {
        Operands::Text(x, y) => x == y,
        Operands::Int(x, y) => x == y,
        Operands::Float(x, y) => x == y,
        Operands::Fallback => a.loose_eq(&b),
    })
}

pub(crate) fn eq(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    Ok(Value::Bool(equals(it, id, "==")?))
}

pub(crate) fn ne(it: &mut Interpreter<'_>, id: NodeId) -> Flow<Value> {
    Ok(Value::Bool(!equals(it, id, "!=")?))
}

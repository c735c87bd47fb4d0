/*!
Operator-precedence tree builder
================================

Definitions
-----------
* **n** = number of lexemes (plus the single end-of-input node).
* Priorities: lower number binds tighter; see [`Grammar`](crate::grammar::Grammar).

Algorithm (Pratt)
-----------------

```text
build(threshold):
    left ← current; advance
    if left is not terminal:
        left.prefix_builder(left)            -- calls, indexers, groups
        or left.inputs ← [build(left.prefix_priority)]
    while threshold > current.infix_priority:
        op ← current; op.infix ← true
        op.infix_builder(op, left)           -- ternary
        or op.inputs ← [left, build(op.infix_priority + right_assoc)]
        left ← op
    return left
```

An expression is `build(TOP_PRIORITY)` followed by the end-of-input node.
After building, one pass links every node to its parent.

### Time / Space

| Phase              | Cost | Notes                                        |
|--------------------|-----:|----------------------------------------------|
| node creation      | Θ(n) | literal preparers run once per literal       |
| `build`            | Θ(n) | each node is consumed exactly once           |
| parent linking     | Θ(n) | iterative walk from the root                 |

Nodes live in one arena (`Vec<Node>`) owned by the [`Expression`]; children
and parents are indices into it.

### Logging Policy

| Location              | Level   | Purpose                       |
|-----------------------|---------|-------------------------------|
| `Expression` creation | `info`  | one line per compiled source  |
| `build`               | `debug` | prefix/infix decisions        |
| error paths           | `info`  | via `ExprError` constructors  |
*/

use std::collections::VecDeque;
use std::fmt;

use log::{debug, info};

use crate::ast_printer::AstPrinter;
use crate::engine::Engine;
use crate::environment::Scope;
use crate::error::{ExprError, Result};
use crate::format::Template;
use crate::grammar::{Grammar, Symbol, SymbolId};
use crate::interpreter::{EvalMode, Interpreter};
use crate::syntax::names;
use crate::token::Lexeme;
use crate::value::Value;

/// Index of a node inside its [`Expression`].
pub type NodeId = usize;

/// Deepest nesting of sub-expressions a parse tree may have.
pub const MAX_DEPTH: usize = 256;

/// Value bound to a literal node while the tree is built.
#[derive(Debug)]
pub enum Prepared {
    Constant(Value),
    Interpolated(Interpolation),
}

/// An interpolated string literal: its template and one compiled expression per hole.
#[derive(Debug)]
pub struct Interpolation {
    pub(crate) template: Template,
    pub(crate) parts: Vec<Expression>,
}

impl Interpolation {
    pub fn new(template: Template, parts: Vec<Expression>) -> Self {
        Self { template, parts }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn parts(&self) -> &[Expression] {
        &self.parts
    }
}

/// One parse-tree node.
#[derive(Debug)]
pub struct Node {
    pub lexeme: Lexeme,
    pub symbol: SymbolId,
    /// Operands, in source order.
    pub inputs: Vec<NodeId>,
    /// Consumed as an infix operator.
    pub infix: bool,
    /// Set once after building; read-only afterwards.
    pub parent: Option<NodeId>,
    pub(crate) prepared: Option<Prepared>,
}

impl Node {
    #[inline]
    pub fn text(&self) -> &str {
        &self.lexeme.text
    }

    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.lexeme.name == name
    }

    pub fn prepared(&self) -> Option<&Prepared> {
        self.prepared.as_ref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expression
// ─────────────────────────────────────────────────────────────────────────────

/// A compiled expression: the node arena, its root and its last source lexeme.
#[derive(Debug)]
pub struct Expression {
    source: String,
    nodes: Vec<Node>,
    root: NodeId,
    last: NodeId,
}

impl Expression {
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The last lexeme of the source (the node before end-of-input).
    #[inline]
    pub fn last(&self) -> NodeId {
        self.last
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// `true` when the final lexeme is an identifier, the shape every member path ends in.
    pub fn ends_in_identifier(&self) -> bool {
        self.node(self.last).is(names::IDENTIFIER)
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Value> {
        Interpreter::new(self, scope, EvalMode::Value).run()
    }

    /// Segments of the member path from the root: the right-hand sides of
    /// every dot, preceded by the leftmost operand.
    ///
    /// `vm?.(true?a:b).GetOne().one` → `vm`, `(`, `GetOne`, `one`.
    pub fn token_path(&self) -> Vec<&Node> {
        let mut path = Vec::new();
        let mut id = self.root;

        while self.node(id).is(names::DOT) && self.node(id).inputs.len() == 2 {
            path.push(self.node(self.node(id).inputs[1]));
            id = self.node(id).inputs[0];
        }

        path.push(self.node(id));
        path.reverse();
        path
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&AstPrinter::print(self))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TreeBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Pratt builder over one lexeme stream; custom builders drive it through
/// [`build`](Self::build), [`skip`](Self::skip) and [`push_input`](Self::push_input).
pub struct TreeBuilder<'e> {
    grammar: &'e Grammar,
    nodes: Vec<Node>,
    queue: VecDeque<NodeId>,
    current: NodeId,
    depth: usize,
}

impl<'e> TreeBuilder<'e> {
    /// Create nodes for `lexemes` (running literal preparers) plus the end node.
    pub fn new(engine: &'e Engine, lexemes: Vec<Lexeme>, source_len: usize) -> Result<Self> {
        let grammar = engine.grammar();
        let mut nodes = Vec::with_capacity(lexemes.len() + 1);

        for lexeme in lexemes {
            let symbol = lexeme.symbol;
            let prepared = match grammar.symbol(symbol).preparer {
                Some(prepare) => Some(prepare(engine, &lexeme)?),
                None => None,
            };

            nodes.push(Node {
                lexeme,
                symbol,
                inputs: Vec::new(),
                infix: false,
                parent: None,
                prepared,
            });
        }

        let end = grammar.end();
        nodes.push(Node {
            lexeme: Lexeme::new(end, Grammar::END, "", source_len),
            symbol: end,
            inputs: Vec::new(),
            infix: false,
            parent: None,
            prepared: None,
        });

        let mut queue: VecDeque<NodeId> = (0..nodes.len()).collect();
        let current = queue.pop_front().unwrap_or_default();

        Ok(Self {
            grammar,
            nodes,
            queue,
            current,
            depth: 0,
        })
    }

    #[inline]
    fn symbol(&self, id: NodeId) -> &'e Symbol {
        self.grammar.symbol(self.nodes[id].symbol)
    }

    #[inline]
    fn is_end(&self, id: NodeId) -> bool {
        self.nodes[id].symbol == self.grammar.end()
    }

    /// The lookahead node.
    #[inline]
    pub fn current(&self) -> &Node {
        &self.nodes[self.current]
    }

    #[inline]
    pub fn current_is(&self, text: &str) -> bool {
        !self.is_end(self.current) && self.current().lexeme.is(text)
    }

    fn describe(&self, id: NodeId) -> String {
        if self.is_end(id) {
            "end of input".to_string()
        } else {
            format!("'{}'", self.nodes[id].text())
        }
    }

    /// Advance the lookahead.
    pub fn pop(&mut self) -> Result<()> {
        match self.queue.pop_front() {
            Some(next) => {
                self.current = next;
                Ok(())
            }
            None => Err(ExprError::parse(
                self.current().lexeme.position,
                "Unexpected end of input",
            )),
        }
    }

    /// Consume the lookahead, which must read `text`.
    pub fn skip(&mut self, text: &str) -> Result<()> {
        if !self.current_is(text) {
            return Err(ExprError::parse(
                self.current().lexeme.position,
                format!("Expected '{}' but received {}", text, self.describe(self.current)),
            ));
        }

        self.pop()
    }

    pub fn push_input(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].inputs.push(child);
    }

    /// Build one sub-tree at `priority`: infix operators binding tighter than it are absorbed.
    pub fn build(&mut self, priority: u8) -> Result<NodeId> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::parse(
                self.current().lexeme.position,
                format!("Expression nests deeper than {} levels", MAX_DEPTH),
            ));
        }

        self.depth += 1;
        let built = self.build_nested(priority);
        self.depth -= 1;
        built
    }

    fn build_nested(&mut self, priority: u8) -> Result<NodeId> {
        let mut left = self.current;

        if self.is_end(left) {
            return Err(ExprError::parse(
                self.nodes[left].lexeme.position,
                "Unexpected end of input",
            ));
        }

        self.pop()?;

        let symbol = self.symbol(left);

        if !symbol.terminal {
            if let Some(builder) = symbol.prefix_builder {
                debug!("Prefix builder for {}", self.describe(left));
                builder(self, left)?;
            } else {
                let prefix = symbol.prefix.ok_or_else(|| {
                    ExprError::parse(
                        self.nodes[left].lexeme.position,
                        format!("{} cannot start an expression", self.describe(left)),
                    )
                })?;

                let operand = self.build(prefix)?;
                self.push_input(left, operand);
            }
        }

        loop {
            let op = self.current;

            if self.is_end(op) {
                break;
            }

            let symbol = self.symbol(op);
            let infix = symbol.infix.ok_or_else(|| {
                ExprError::parse(
                    self.nodes[op].lexeme.position,
                    format!("{} cannot be used as an infix operator", self.describe(op)),
                )
            })?;

            if priority <= infix {
                break;
            }

            debug!("Infix {} at priority {}", self.describe(op), infix);
            self.nodes[op].infix = true;

            if let Some(builder) = symbol.infix_builder {
                builder(self, op, left)?;
            } else {
                self.push_input(op, left);
                self.pop()?;

                let right = self.build(infix + u8::from(symbol.right_associative))?;
                self.push_input(op, right);
            }

            left = op;
        }

        Ok(left)
    }

    /// Build a whole expression and link parents.
    pub fn finish(mut self, source: &str) -> Result<Expression> {
        if self.nodes.len() < 2 {
            return Err(ExprError::parse(0, "No tokens received"));
        }

        let root = self.build(Grammar::TOP_PRIORITY)?;

        if !self.is_end(self.current) {
            return Err(ExprError::parse(
                self.current().lexeme.position,
                format!("Unexpected {} after complete expression", self.describe(self.current)),
            ));
        }

        // left-associative chains grow the tree without nesting the builder
        let mut pending = vec![(root, 1)];
        while let Some((id, depth)) = pending.pop() {
            if depth > MAX_DEPTH {
                return Err(ExprError::parse(
                    self.nodes[id].lexeme.position,
                    format!("Expression nests deeper than {} levels", MAX_DEPTH),
                ));
            }

            for i in 0..self.nodes[id].inputs.len() {
                let child = self.nodes[id].inputs[i];
                self.nodes[child].parent = Some(id);
                pending.push((child, depth + 1));
            }
        }

        let last = self.nodes.len() - 2;

        info!("Built expression {:?} ({} nodes)", source, self.nodes.len());

        Ok(Expression {
            source: source.to_string(),
            nodes: self.nodes,
            root,
            last,
        })
    }
}

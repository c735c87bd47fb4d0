use crate::parser::{Expression, NodeId};

/// Renders a parse tree in parenthesized prefix form: `2+3*4` → `(+ 2 (* 3 4))`.
///
/// Nodes without inputs print bare, so `vm.Get()` renders as `(. vm Get)`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expression: &Expression) -> String {
        let mut out = String::new();
        Self::write(expression, expression.root(), &mut out);
        out
    }

    fn write(expression: &Expression, id: NodeId, out: &mut String) {
        let node = expression.node(id);

        if node.inputs.is_empty() {
            out.push_str(node.text());
            return;
        }

        out.push('(');
        out.push_str(node.text());

        for &input in &node.inputs {
            out.push(' ');
            Self::write(expression, input, out);
        }

        out.push(')');
    }
}

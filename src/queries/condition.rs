//! Operator handling shared by every compiler.
//!
//! [`ConditionBuilder`] is the [`ExpressionListener`] all compilers run. It
//! owns the operand stack and the error list; the compiler-specific part is
//! the [`OperandRenderer`] that turns each leaf into SQL.

use crate::agql::{walk, ComparisonOp, Expr, ExpressionListener, Literal, Operand};
use crate::db::escape::quote_sql_literal;

use super::{CompileError, Fragment};

/// Compiler-specific translation of leaf operands.
pub(super) trait OperandRenderer {
    /// SQL for `operand`, or a message explaining why it is not supported.
    fn render(&mut self, operand: &Operand) -> Result<Fragment, String>;
}

pub(super) struct ConditionBuilder<'r, R: OperandRenderer> {
    renderer: &'r mut R,
    stack: Vec<Fragment>,
    errors: Vec<String>,
}

impl<'r, R: OperandRenderer> ConditionBuilder<'r, R> {
    pub fn new(renderer: &'r mut R) -> Self {
        Self {
            renderer,
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Walk `expr` and return the WHERE condition, or every error found.
    pub fn build(mut self, text: &str, expr: &Expr) -> Result<Fragment, CompileError> {
        walk(expr, &mut self);
        if self.stack.len() != 1 && self.errors.is_empty() {
            self.errors
                .push(format!("Malformed expression ({} terms)", self.stack.len()));
        }
        if !self.errors.is_empty() {
            let mut messages = Vec::with_capacity(self.errors.len());
            for message in self.errors {
                if !messages.contains(&message) {
                    messages.push(message);
                }
            }
            return Err(CompileError::Invalid {
                expression: text.to_string(),
                messages,
            });
        }
        Ok(self.stack.pop().unwrap_or_default())
    }

    fn pop(&mut self) -> Fragment {
        self.stack.pop().unwrap_or_else(|| Fragment::new("NULL"))
    }

    /// Pop `count` fragments and join them, preserving order.
    fn pop_joined(&mut self, count: usize, separator: &str) -> Fragment {
        let at = self.stack.len().saturating_sub(count);
        let items = self.stack.split_off(at);
        let mut joined = Fragment::default();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                joined.push_str(separator);
            }
            joined.push(item);
        }
        joined
    }

    fn binary(&mut self, template: impl FnOnce(&str, &str) -> String) {
        let right = self.pop();
        let left = self.pop();
        let mut params = left.params;
        params.extend(right.params);
        self.stack
            .push(Fragment::with_params(template(&left.sql, &right.sql), params));
    }
}

impl<R: OperandRenderer> ExpressionListener for ConditionBuilder<'_, R> {
    fn exit_operand(&mut self, operand: &Operand) {
        match self.renderer.render(operand) {
            Ok(fragment) => self.stack.push(fragment),
            Err(message) => {
                self.errors.push(message);
                self.stack.push(Fragment::new("NULL"));
            }
        }
    }

    fn exit_comparison(&mut self, op: ComparisonOp) {
        self.binary(|left, right| match (op, right) {
            (ComparisonOp::Eq, "NULL") => format!("{} IS NULL", left),
            (ComparisonOp::Ne, "NULL") => format!("{} IS NOT NULL", left),
            _ => format!("{} {} {}", left, op.sql(), right),
        });
    }

    fn exit_pattern_match(&mut self, negated: bool) {
        let op = if negated { "NOT REGEXP" } else { "REGEXP" };
        self.binary(|subject, pattern| format!("{} {} {}", subject, op, pattern));
    }

    fn exit_includes(&mut self, container: &Operand, negated: bool) {
        let is_set = matches!(
            container,
            Operand::List(_) | Operand::Collection { .. }
        );
        self.binary(|element, container| match (is_set, negated) {
            (true, false) => format!("{} IN {}", element, container),
            (true, true) => format!("{} NOT IN {}", element, container),
            (false, false) => format!("INSTR({}, {}) > 0", container, element),
            (false, true) => format!("INSTR({}, {}) = 0", container, element),
        });
    }

    fn exit_and(&mut self, count: usize) {
        let joined = self.pop_joined(count, " AND ");
        self.stack.push(joined);
    }

    fn exit_or(&mut self, count: usize) {
        let mut joined = self.pop_joined(count, " OR ");
        joined.sql = format!("({})", joined.sql);
        self.stack.push(joined);
    }

    fn exit_not(&mut self) {
        let mut inner = self.pop();
        inner.sql = format!("NOT ({})", inner.sql);
        self.stack.push(inner);
    }
}

/// SQL for a literal value.
pub(super) fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => quote_sql_literal(s),
        Literal::Number(n) => n.clone(),
        Literal::Bool(true) => "1".to_string(),
        Literal::Bool(false) => "0".to_string(),
        Literal::Null => "NULL".to_string(),
        Literal::Regex { pattern, flags } => {
            if flags.contains('i') {
                quote_sql_literal(&format!("(?i){}", pattern))
            } else {
                quote_sql_literal(pattern)
            }
        }
    }
}

/// SQL for the operands every compiler renders the same way.
///
/// Returns `None` for operands that depend on the primary layer.
pub(super) fn render_common(operand: &Operand) -> Option<Result<Fragment, String>> {
    match operand {
        Operand::Literal(literal) => Some(Ok(Fragment::new(render_literal(literal)))),
        Operand::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_literal).collect();
            Some(Ok(Fragment::new(format!("({})", rendered.join(", ")))))
        }
        Operand::Unsupported(text) => Some(Err(format!("Unsupported expression: {}", text))),
        _ => None,
    }
}

//! Post-order traversal of the expression tree.
//!
//! Compilers implement [`ExpressionListener`] and keep an operand stack:
//! every `exit_operand` pushes one fragment, every operator callback pops its
//! operands and pushes the combined fragment. After the walk the stack holds
//! exactly one fragment, the WHERE condition.

use super::ast::{ComparisonOp, Expr, Operand};

pub trait ExpressionListener {
    fn enter_expression(&mut self, _expr: &Expr) {}
    fn exit_expression(&mut self, _expr: &Expr) {}

    /// A leaf value. Called for both sides of every binary node.
    fn exit_operand(&mut self, operand: &Operand);

    fn exit_comparison(&mut self, op: ComparisonOp);

    /// Stack holds subject then pattern.
    fn exit_pattern_match(&mut self, negated: bool);

    /// Stack holds element then container.
    fn exit_includes(&mut self, container: &Operand, negated: bool);

    fn exit_and(&mut self, count: usize);
    fn exit_or(&mut self, count: usize);
    fn exit_not(&mut self);
}

pub fn walk(expr: &Expr, listener: &mut dyn ExpressionListener) {
    listener.enter_expression(expr);
    match expr {
        Expr::Or(items) => {
            for item in items {
                walk(item, listener);
            }
            listener.exit_or(items.len());
        }
        Expr::And(items) => {
            for item in items {
                walk(item, listener);
            }
            listener.exit_and(items.len());
        }
        Expr::Not(inner) => {
            walk(inner, listener);
            listener.exit_not();
        }
        Expr::Comparison { left, op, right } => {
            listener.exit_operand(left);
            listener.exit_operand(right);
            listener.exit_comparison(*op);
        }
        Expr::PatternMatch {
            subject,
            pattern,
            negated,
        } => {
            listener.exit_operand(subject);
            listener.exit_operand(pattern);
            listener.exit_pattern_match(*negated);
        }
        Expr::Includes {
            container,
            element,
            negated,
        } => {
            listener.exit_operand(element);
            listener.exit_operand(container);
            listener.exit_includes(container, *negated);
        }
        Expr::Operand(operand) => listener.exit_operand(operand),
    }
    listener.exit_expression(expr);
}

/// Every operand in the tree, left to right.
pub fn operands(expr: &Expr) -> Vec<&Operand> {
    let mut found = Vec::new();
    collect(expr, &mut found);
    found
}

fn collect<'a>(expr: &'a Expr, found: &mut Vec<&'a Operand>) {
    match expr {
        Expr::Or(items) | Expr::And(items) => {
            for item in items {
                collect(item, found);
            }
        }
        Expr::Not(inner) => collect(inner, found),
        Expr::Comparison { left, right, .. } => {
            found.push(left);
            found.push(right);
        }
        Expr::PatternMatch {
            subject, pattern, ..
        } => {
            found.push(subject);
            found.push(pattern);
        }
        Expr::Includes {
            container, element, ..
        } => {
            found.push(element);
            found.push(container);
        }
        Expr::Operand(operand) => found.push(operand),
    }
}

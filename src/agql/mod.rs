//! Annotation Graph Query Language.
//!
//! [`parse`] turns an expression into a typed [`Expression`] tree; [`walk`]
//! visits it post-order, calling an [`ExpressionListener`].

mod ast;
mod parser;
mod walker;

pub use ast::{
    AnchorEnd, AnchorField, CollectionKind, ComparisonOp, Expr, Expression, Field, Literal,
    Operand,
};
pub use parser::parse;
pub use walker::{operands, walk, ExpressionListener};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Cannot parse '{expression}':\n{message}")]
    Syntax { expression: String, message: String },

    #[error("Empty expression: '{0}'")]
    Empty(String),
}

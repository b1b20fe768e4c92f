//! Typed parse tree for AGQL expressions.
//!
//! The parser classifies member chains as it builds the tree, so consumers
//! see `Operand::Other { layer: "pos", field: Field::Label }` rather than a
//! raw `my('pos').label` call chain. Chains that do not map onto any known
//! form become [`Operand::Unsupported`]; rejecting them is left to the
//! compilers, which report every problem in one pass.

use std::fmt;

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub text: String,
    pub root: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Comparison {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
    },
    /// `/re/.test(subject)` or `subject MATCHES pattern`.
    PatternMatch {
        subject: Operand,
        pattern: Operand,
        negated: bool,
    },
    /// `container.includes(element)` or `element IN container`.
    Includes {
        container: Operand,
        element: Operand,
        negated: bool,
    },
    /// A value used directly as a condition, e.g. `true`.
    Operand(Operand),
}

impl Expr {
    /// Logical negation, folded into pattern matches and includes.
    pub fn negate(self) -> Expr {
        match self {
            Expr::PatternMatch {
                subject,
                pattern,
                negated,
            } => Expr::PatternMatch {
                subject,
                pattern,
                negated: !negated,
            },
            Expr::Includes {
                container,
                element,
                negated,
            } => Expr::Includes {
                container,
                element,
                negated: !negated,
            },
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// SQL spelling. `==` and `=` both become `=`; `!=` becomes `<>`.
    pub fn sql(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// String contents with AGQL escapes already removed.
    String(String),
    /// Numeric literal as written.
    Number(String),
    Bool(bool),
    Null,
    Regex { pattern: String, flags: String },
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEnd {
    Start,
    End,
}

impl AnchorEnd {
    pub fn name(self) -> &'static str {
        match self {
            AnchorEnd::Start => "start",
            AnchorEnd::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorField {
    Offset,
    Id,
    Confidence,
}

/// An attribute of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Label,
    Ordinal,
    Annotator,
    Confidence,
    Anchor(AnchorEnd, AnchorField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// `labels('x')`: labels of related annotations.
    Labels,
    /// `list('x')` / `all('x')`: ids of related annotations.
    List,
    /// `annotators('x')`: distinct annotators of related annotations.
    Annotators,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    /// `['a', 'b']`
    List(Vec<Literal>),
    /// A field of the annotation being matched: `id`, `label`, `start.offset`.
    Own(Field),
    /// `layer.id` or `layerId`.
    LayerId,
    /// `graph.id`.
    GraphId,
    /// `parent.id`, `parent.label`.
    Parent(Field),
    /// `my('layer').field` or `first('layer').field`.
    Other { layer: String, field: Field },
    Collection { kind: CollectionKind, layer: String },
    /// `.length` of a collection or string.
    Length(Box<Operand>),
    /// Source text of a chain with no known meaning.
    Unsupported(String),
}

impl Operand {
    pub fn string_literal(&self) -> Option<&str> {
        match self {
            Operand::Literal(literal) => literal.as_str(),
            _ => None,
        }
    }

    /// Layer named by this operand, if it refers to another layer.
    pub fn referenced_layer(&self) -> Option<&str> {
        match self {
            Operand::Other { layer, .. } | Operand::Collection { layer, .. } => Some(layer),
            Operand::Length(inner) => inner.referenced_layer(),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Unsupported(text) => write!(f, "{}", text),
            other => write!(f, "{:?}", other),
        }
    }
}

//! Builds the typed tree from pest pairs.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{
    AnchorEnd, AnchorField, CollectionKind, ComparisonOp, Expr, Expression, Field, Literal,
    Operand,
};
use super::ParseError;
use crate::db::escape::unescape_literal;

#[derive(Parser)]
#[grammar = "agql/agql.pest"]
struct AgqlParser;

/// Parse an AGQL expression.
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    let mut pairs = AgqlParser::parse(Rule::expression, text).map_err(|e| ParseError::Syntax {
        expression: text.to_string(),
        message: e.to_string(),
    })?;
    let root = pairs
        .next()
        .and_then(|expression| {
            expression
                .into_inner()
                .find(|pair| pair.as_rule() == Rule::disjunction)
        })
        .map(build_disjunction)
        .ok_or_else(|| ParseError::Empty(text.to_string()))?;
    Ok(Expression {
        text: text.to_string(),
        root,
    })
}

fn collapse(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

fn build_disjunction(pair: Pair<Rule>) -> Expr {
    let items = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::conjunction)
        .map(build_conjunction)
        .collect();
    collapse(items, Expr::Or)
}

fn build_conjunction(pair: Pair<Rule>) -> Expr {
    let items = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::negation)
        .map(build_negation)
        .collect();
    collapse(items, Expr::And)
}

fn build_negation(pair: Pair<Rule>) -> Expr {
    let mut negations = 0;
    let mut expr = Expr::Operand(Operand::Unsupported(pair.as_str().to_string()));
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::not_op => negations += 1,
            Rule::relation => expr = build_relation(inner),
            _ => {}
        }
    }
    if negations % 2 == 1 { expr.negate() } else { expr }
}

fn build_relation(pair: Pair<Rule>) -> Expr {
    let text = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    let Some(left) = inner.next() else {
        return Expr::Operand(Operand::Unsupported(text));
    };
    let left = build_value(left);
    let (Some(op), Some(right)) = (inner.next(), inner.next()) else {
        return match left {
            Built::Operand(operand) => Expr::Operand(operand),
            Built::Condition(expr) => expr,
        };
    };
    let right = build_value(right);
    let op_text = op
        .as_str()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    let left = left.into_operand();
    let right = right.into_operand();
    let comparison = |op| Expr::Comparison {
        left: left.clone(),
        op,
        right: right.clone(),
    };
    match op_text.as_str() {
        "==" | "=" => comparison(ComparisonOp::Eq),
        "!=" | "<>" => comparison(ComparisonOp::Ne),
        "<" => comparison(ComparisonOp::Lt),
        "<=" => comparison(ComparisonOp::Le),
        ">" => comparison(ComparisonOp::Gt),
        ">=" => comparison(ComparisonOp::Ge),
        "MATCHES" | "NOT MATCHES" => Expr::PatternMatch {
            subject: left,
            pattern: right,
            negated: op_text.starts_with("NOT"),
        },
        "IN" | "NOT IN" => Expr::Includes {
            container: right,
            element: left,
            negated: op_text.starts_with("NOT"),
        },
        _ => Expr::Operand(Operand::Unsupported(text)),
    }
}

/// Result of building a value: either a scalar operand or, for method calls
/// like `.includes()` and `.test()`, a condition.
enum Built {
    Operand(Operand),
    Condition(Expr),
}

impl Built {
    fn into_operand(self) -> Operand {
        match self {
            Built::Operand(operand) => operand,
            Built::Condition(expr) => Operand::Unsupported(format!("{:?}", expr)),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Base(Operand),
    Group(Expr),
    Name(String),
    Call(String, Vec<Expr>),
}

impl Segment {
    fn name(&self) -> Option<&str> {
        match self {
            Segment::Name(name) => Some(name),
            _ => None,
        }
    }

    fn call(&self) -> Option<(&str, &[Expr])> {
        match self {
            Segment::Call(name, args) => Some((name, args)),
            _ => None,
        }
    }
}

fn build_value(pair: Pair<Rule>) -> Built {
    let text = pair.as_str().trim().to_string();
    let segments: Vec<Segment> = pair
        .into_inner()
        .map(|p| match p.as_rule() {
            Rule::accessor => p
                .into_inner()
                .next()
                .map(build_segment)
                .unwrap_or_else(|| Segment::Base(Operand::Unsupported(text.clone()))),
            _ => build_segment(p),
        })
        .collect();
    classify(&segments, &text)
}

fn build_segment(pair: Pair<Rule>) -> Segment {
    match pair.as_rule() {
        Rule::ident => Segment::Name(pair.as_str().to_string()),
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            let args = inner
                .next()
                .map(|args| args.into_inner().map(build_disjunction).collect())
                .unwrap_or_default();
            Segment::Call(name, args)
        }
        Rule::group => match pair.into_inner().next().map(build_disjunction) {
            Some(Expr::Operand(operand)) => Segment::Base(operand),
            Some(expr) => Segment::Group(expr),
            None => Segment::Base(Operand::Unsupported("()".to_string())),
        },
        Rule::list => {
            let text = pair.as_str().to_string();
            let elements: Option<Vec<Literal>> = pair
                .into_inner()
                .map(|p| match build_disjunction(p) {
                    Expr::Operand(Operand::Literal(literal)) => Some(literal),
                    _ => None,
                })
                .collect();
            Segment::Base(elements.map_or(Operand::Unsupported(text), Operand::List))
        }
        _ => Segment::Base(
            build_literal(pair.clone()).map_or_else(
                || Operand::Unsupported(pair.as_str().to_string()),
                Operand::Literal,
            ),
        ),
    }
}

fn build_literal(pair: Pair<Rule>) -> Option<Literal> {
    match pair.as_rule() {
        Rule::string => {
            let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Some(Literal::String(unescape_literal(body)))
        }
        Rule::number => Some(Literal::Number(pair.as_str().to_string())),
        Rule::boolean => Some(Literal::Bool(pair.as_str() == "true")),
        Rule::null_literal => Some(Literal::Null),
        Rule::regex => {
            let mut inner = pair.into_inner();
            let pattern = inner.next().map(|p| p.as_str()).unwrap_or("");
            let flags = inner.next().map(|p| p.as_str()).unwrap_or("");
            Some(Literal::Regex {
                pattern: pattern.replace("\\/", "/"),
                flags: flags.to_string(),
            })
        }
        _ => None,
    }
}

fn operand_arg(arg: &Expr) -> Operand {
    match arg {
        Expr::Operand(operand) => operand.clone(),
        other => Operand::Unsupported(format!("{:?}", other)),
    }
}

/// The single string argument of `my('x')` and friends.
fn layer_arg(args: &[Expr]) -> Option<String> {
    match args {
        [Expr::Operand(operand)] => operand.string_literal().map(str::to_string),
        _ => None,
    }
}

fn anchor_field(name: &str) -> Option<AnchorField> {
    match name {
        "offset" => Some(AnchorField::Offset),
        "id" => Some(AnchorField::Id),
        "confidence" => Some(AnchorField::Confidence),
        _ => None,
    }
}

fn anchor_end(name: &str) -> Option<AnchorEnd> {
    match name {
        "start" => Some(AnchorEnd::Start),
        "end" => Some(AnchorEnd::End),
        _ => None,
    }
}

/// Map the trailing names of a chain onto an annotation field.
fn field(segments: &[Segment]) -> Option<Field> {
    let names: Option<Vec<&str>> = segments.iter().map(Segment::name).collect();
    match names?.as_slice() {
        ["id"] => Some(Field::Id),
        ["label"] => Some(Field::Label),
        ["ordinal"] => Some(Field::Ordinal),
        ["annotator"] => Some(Field::Annotator),
        ["confidence"] => Some(Field::Confidence),
        [end, attribute] => Some(Field::Anchor(anchor_end(end)?, anchor_field(attribute)?)),
        _ => None,
    }
}

fn classify(segments: &[Segment], text: &str) -> Built {
    let unsupported = || Built::Operand(Operand::Unsupported(text.to_string()));
    let Some((last, prefix)) = segments.split_last() else {
        return unsupported();
    };

    if !prefix.is_empty() {
        if let Some(("includes", [arg])) = last.call() {
            return Built::Condition(Expr::Includes {
                container: classify(prefix, text).into_operand(),
                element: operand_arg(arg),
                negated: false,
            });
        }
        if let (Some(("test", [arg])), [Segment::Base(Operand::Literal(regex @ Literal::Regex { .. }))]) =
            (last.call(), prefix)
        {
            return Built::Condition(Expr::PatternMatch {
                subject: operand_arg(arg),
                pattern: Operand::Literal(regex.clone()),
                negated: false,
            });
        }
        if last.name() == Some("length") {
            return Built::Operand(Operand::Length(Box::new(
                classify(prefix, text).into_operand(),
            )));
        }
    }

    let operand = match segments {
        [Segment::Base(operand)] => operand.clone(),
        [Segment::Group(expr)] => return Built::Condition(expr.clone()),
        [Segment::Name(name)] if name == "layerId" => Operand::LayerId,
        [Segment::Name(name)] if name == "graphId" => Operand::GraphId,
        [Segment::Name(first), Segment::Name(second)] if first == "layer" && second == "id" => {
            Operand::LayerId
        }
        [Segment::Name(first), Segment::Name(second)] if first == "graph" && second == "id" => {
            Operand::GraphId
        }
        [Segment::Name(first), rest @ ..] if first == "parent" => match field(rest) {
            Some(field) => Operand::Parent(field),
            None => return unsupported(),
        },
        [Segment::Call(name, args), rest @ ..] if name == "my" || name == "first" => {
            match (layer_arg(args), field(rest)) {
                (Some(layer), Some(field)) => Operand::Other { layer, field },
                _ => return unsupported(),
            }
        }
        [Segment::Call(name, args)] => {
            let kind = match name.as_str() {
                "labels" => CollectionKind::Labels,
                "list" | "all" => CollectionKind::List,
                "annotators" => CollectionKind::Annotators,
                _ => return unsupported(),
            };
            match layer_arg(args) {
                Some(layer) => Operand::Collection { kind, layer },
                None => return unsupported(),
            }
        }
        _ => match field(segments) {
            Some(field) => Operand::Own(field),
            None => return unsupported(),
        },
    };
    Built::Operand(operand)
}

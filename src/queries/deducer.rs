//! Primary-layer deduction.
//!
//! Only three idioms are recognised:
//!
//! - `layer.id == 'name'` (or `layerId`, either operand order)
//! - `id == '<encoded id>'`, whose layer is read off the id
//! - `['<encoded id>', ...].includes(id)` / `id IN [...]`, using the first id
//!
//! The first match in left-to-right order wins. Expressions with none of
//! them are rejected even when they are otherwise well formed.

use crate::agql::{ComparisonOp, Expr, Expression, Field, Literal, Operand};
use crate::ids::EncodedId;
use crate::layers::{Layer, Schema, PARTICIPANT_ATTRIBUTE_PREFIX, TRANSCRIPT_ATTRIBUTE_PREFIX};

use super::CompileError;

/// Layer whose rows the expression selects.
pub fn deduce_primary_layer<'s>(
    schema: &'s Schema,
    expression: &Expression,
) -> Result<&'s Layer, CompileError> {
    find(schema, &expression.root)
        .ok_or_else(|| CompileError::NoPrimaryLayer(expression.text.clone()))
}

fn find<'s>(schema: &'s Schema, expr: &Expr) -> Option<&'s Layer> {
    match expr {
        Expr::Or(items) | Expr::And(items) => items.iter().find_map(|item| find(schema, item)),
        Expr::Not(inner) => find(schema, inner),
        Expr::Comparison {
            left,
            op: ComparisonOp::Eq,
            right,
        } => from_comparison(schema, left, right).or_else(|| from_comparison(schema, right, left)),
        Expr::Includes {
            container: Operand::List(items),
            element: Operand::Own(Field::Id),
            ..
        } => items
            .first()
            .and_then(Literal::as_str)
            .and_then(|id| layer_of_id(schema, id)),
        _ => None,
    }
}

fn from_comparison<'s>(schema: &'s Schema, subject: &Operand, value: &Operand) -> Option<&'s Layer> {
    let value = value.string_literal()?;
    match subject {
        Operand::LayerId => schema.layer(value),
        Operand::Own(Field::Id) => layer_of_id(schema, value),
        _ => None,
    }
}

/// Layer an encoded id belongs to.
fn layer_of_id<'s>(schema: &'s Schema, id: &str) -> Option<&'s Layer> {
    match EncodedId::parse(id).ok()? {
        EncodedId::Annotation(id) => schema.layer_by_numeric_id(id.layer_id),
        EncodedId::Meta(id) => schema.layer_by_numeric_id(id.layer_id),
        EncodedId::TranscriptAttribute(id) => {
            schema.layer(&format!("{}{}", TRANSCRIPT_ATTRIBUTE_PREFIX, id.attribute))
        }
        EncodedId::ParticipantAttribute(id) => {
            schema.layer(&format!("{}{}", PARTICIPANT_ATTRIBUTE_PREFIX, id.attribute))
        }
        EncodedId::Anchor(_) => None,
    }
}

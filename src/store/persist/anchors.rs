use tracing::{debug, warn};

use crate::db::{Database, SqlValue};
use crate::graph::{Anchor, Change, Graph};
use crate::ids::AnchorId;
use crate::layers::{Schema, Scope};
use crate::store::context::SaveContext;
use crate::store::StoreError;

fn stored_id(anchor: &Anchor) -> Result<i64, StoreError> {
    let id: AnchorId = anchor
        .id
        .parse()
        .map_err(StoreError::invalid_id(&anchor.id, "anchor"))?;
    Ok(id.0)
}

fn anchor_values(anchor: &Anchor, ctx: &SaveContext) -> [SqlValue; 4] {
    [
        anchor.offset.into(),
        anchor.confidence.into(),
        anchor.annotator.as_deref().into(),
        anchor.when.as_deref().unwrap_or(&ctx.now).into(),
    ]
}

/// Insert created anchors and update changed ones.
///
/// Unchanged annotations that pointed at a created anchor are queued in
/// `ctx.extra_updates`, since their stored row still holds the old id.
pub(crate) fn save_anchors(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
) -> Result<(), StoreError> {
    let changed: Vec<Anchor> = graph
        .anchors()
        .filter(|a| matches!(a.change, Change::Create | Change::Update))
        .cloned()
        .collect();

    for anchor in changed {
        let [offset, status, by, when] = anchor_values(&anchor, ctx);
        if anchor.change == Change::Create {
            let row = db.insert(
                "INSERT INTO anchor (ag_id, offset, alignment_status, annotated_by, annotated_when) \
                 VALUES (?, ?, ?, ?, ?)",
                &[ctx.ag_id.into(), offset, status, by, when],
            )?;
            let new_id = AnchorId(row).to_string();
            for touched in graph.rename_anchor(&anchor.id, &new_id) {
                if graph
                    .annotation(&touched)
                    .is_some_and(|a| a.change == Change::NoChange)
                {
                    ctx.extra_updates.insert(touched);
                }
            }
            ctx.rename(&anchor.id, &new_id);
        } else {
            let row = stored_id(&anchor)?;
            db.execute(
                "UPDATE anchor SET offset = ?, alignment_status = ?, annotated_by = ?, \
                 annotated_when = ? WHERE anchor_id = ? AND ag_id = ?",
                &[offset, status, by, when, row.into(), ctx.ag_id.into()],
            )?;
        }
    }
    Ok(())
}

/// Delete destroyed anchors that no stored annotation still uses.
///
/// An anchor still in use is kept, flagged unchanged in the graph and
/// reported in `ctx.kept_anchors`.
pub(crate) fn destroy_anchors(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &mut SaveContext,
) -> Result<(), StoreError> {
    let destroyed: Vec<String> = graph
        .anchors()
        .filter(|a| a.change == Change::Destroy)
        .map(|a| a.id.clone())
        .collect();
    if destroyed.is_empty() {
        return Ok(());
    }
    let tables: Vec<String> = schema
        .layers()
        .iter()
        .filter(|layer| !matches!(layer.scope(), None | Some(Scope::Episode)))
        .filter_map(|layer| layer.table_name())
        .collect();

    for id in destroyed {
        let Ok(AnchorId(row)) = id.parse::<AnchorId>() else {
            debug!(anchor = %id, "destroyed before being stored");
            continue;
        };
        let mut users = 0;
        for table in &tables {
            users += db
                .query_i64(
                    &format!(
                        "SELECT COUNT(*) FROM {table} WHERE start_anchor_id = ? OR end_anchor_id = ?"
                    ),
                    &[row.into(), row.into()],
                )?
                .unwrap_or(0);
        }
        if users > 0 {
            warn!(anchor = %id, users, "anchor still in use, not deleted");
            if let Some(anchor) = graph.anchor_mut(&id) {
                anchor.change = Change::NoChange;
            }
            ctx.kept_anchors.push(id);
            continue;
        }
        db.execute(
            "DELETE FROM anchor WHERE anchor_id = ? AND ag_id = ?",
            &[row.into(), ctx.ag_id.into()],
        )?;
    }
    Ok(())
}

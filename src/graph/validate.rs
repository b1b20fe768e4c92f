//! Structural normalization and validation before save.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Change, Graph};
use crate::layers::{Schema, Scope};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Annotation {annotation} is on unknown layer '{layer}'")]
    UnknownLayer { annotation: String, layer: String },

    #[error("Annotation {annotation} needs a parent on layer '{layer}'")]
    MissingParent { annotation: String, layer: String },

    #[error("Annotation {annotation} has parent {parent} on layer '{found}', expected '{expected}'")]
    WrongParentLayer {
        annotation: String,
        parent: String,
        expected: String,
        found: String,
    },

    #[error("Annotation {annotation} refers to missing anchor {anchor}")]
    MissingAnchor { annotation: String, anchor: String },

    #[error("Annotation {annotation} ends at {end} before it starts at {start}")]
    ReversedAnchors {
        annotation: String,
        start: f64,
        end: f64,
    },

    #[error("Several '{layer}' annotations under {parent} have ordinal {ordinal}")]
    DuplicateOrdinal {
        layer: String,
        parent: String,
        ordinal: i64,
    },

    #[error("Annotation {annotation} survives its destroyed parent {parent}")]
    OrphanedChild { annotation: String, parent: String },
}

fn live(change: Change) -> bool {
    change != Change::Destroy
}

/// Fix what can be fixed mechanically. Returns the number of annotations
/// changed.
///
/// Tag annotations take their parent's anchors, and sibling ordinals are
/// made strictly increasing in (ordinal, start offset, id) order.
pub fn normalize(graph: &mut Graph, schema: &Schema) -> usize {
    let mut changed = 0;

    for layer in schema.topological_order() {
        if !layer.is_tag() || !matches!(layer.scope(), Some(scope) if scope != Scope::Episode) {
            continue;
        }
        let inherited: Vec<(String, Option<String>, Option<String>)> = graph
            .annotations()
            .filter(|a| a.layer_id == layer.id && live(a.change))
            .filter_map(|a| {
                let parent = graph.parent(a)?;
                (parent.start_id != a.start_id || parent.end_id != a.end_id).then(|| {
                    (a.id.clone(), parent.start_id.clone(), parent.end_id.clone())
                })
            })
            .collect();
        for (id, start, end) in inherited {
            if let Some(annotation) = graph.annotation_mut(&id) {
                annotation.start_id = start;
                annotation.end_id = end;
                annotation.mark_updated();
                changed += 1;
            }
        }
    }

    let mut groups: BTreeMap<(String, Option<String>), Vec<(i64, f64, String)>> = BTreeMap::new();
    for annotation in graph.annotations().filter(|a| live(a.change)) {
        groups
            .entry((annotation.layer_id.clone(), annotation.parent_id.clone()))
            .or_default()
            .push((
                annotation.ordinal,
                graph.start_offset(annotation),
                annotation.id.clone(),
            ));
    }
    for mut siblings in groups.into_values() {
        siblings.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));
        let mut previous = i64::MIN;
        for (ordinal, _, id) in siblings {
            let wanted = ordinal.max(previous.saturating_add(1));
            if wanted != ordinal
                && let Some(annotation) = graph.annotation_mut(&id)
            {
                annotation.ordinal = wanted;
                annotation.mark_updated();
                changed += 1;
            }
            previous = wanted;
        }
    }
    changed
}

/// Check referential and ordinal consistency, reporting every problem.
pub fn validate(graph: &Graph, schema: &Schema) -> Result<(), Vec<GraphError>> {
    let mut errors = Vec::new();
    let mut ordinals: BTreeMap<(&str, &str, i64), usize> = BTreeMap::new();

    for annotation in graph.annotations().filter(|a| live(a.change)) {
        let Some(layer) = schema.layer(&annotation.layer_id) else {
            errors.push(GraphError::UnknownLayer {
                annotation: annotation.id.clone(),
                layer: annotation.layer_id.clone(),
            });
            continue;
        };

        match (&layer.parent_id, &annotation.parent_id) {
            (Some(expected), None) => errors.push(GraphError::MissingParent {
                annotation: annotation.id.clone(),
                layer: expected.clone(),
            }),
            (Some(expected), Some(parent_id)) => match graph.annotation(parent_id) {
                None => errors.push(GraphError::MissingParent {
                    annotation: annotation.id.clone(),
                    layer: expected.clone(),
                }),
                Some(parent) if parent.change == Change::Destroy => {
                    errors.push(GraphError::OrphanedChild {
                        annotation: annotation.id.clone(),
                        parent: parent.id.clone(),
                    })
                }
                Some(parent) if &parent.layer_id != expected => {
                    errors.push(GraphError::WrongParentLayer {
                        annotation: annotation.id.clone(),
                        parent: parent.id.clone(),
                        expected: expected.clone(),
                        found: parent.layer_id.clone(),
                    })
                }
                Some(_) => {}
            },
            (None, Some(parent_id)) if parent_id != &graph.id => {
                errors.push(GraphError::WrongParentLayer {
                    annotation: annotation.id.clone(),
                    parent: parent_id.clone(),
                    expected: "graph".to_string(),
                    found: graph
                        .annotation(parent_id)
                        .map(|p| p.layer_id.clone())
                        .unwrap_or_default(),
                })
            }
            (None, _) => {}
        }

        if matches!(layer.scope(), Some(scope) if scope != Scope::Episode) {
            for end in [&annotation.start_id, &annotation.end_id] {
                let present = end
                    .as_deref()
                    .and_then(|id| graph.anchor(id))
                    .is_some_and(|anchor| live(anchor.change));
                if !present {
                    errors.push(GraphError::MissingAnchor {
                        annotation: annotation.id.clone(),
                        anchor: end.clone().unwrap_or_else(|| "(none)".to_string()),
                    });
                }
            }
            let offset = |id: &Option<String>| {
                id.as_deref()
                    .and_then(|id| graph.anchor(id))
                    .and_then(|anchor| anchor.offset)
            };
            if let (Some(start), Some(end)) = (offset(&annotation.start_id), offset(&annotation.end_id))
                && start > end
            {
                errors.push(GraphError::ReversedAnchors {
                    annotation: annotation.id.clone(),
                    start,
                    end,
                });
            }
        }

        *ordinals
            .entry((
                annotation.layer_id.as_str(),
                annotation.parent_id.as_deref().unwrap_or(""),
                annotation.ordinal,
            ))
            .or_default() += 1;
    }

    for ((layer, parent, ordinal), count) in ordinals {
        if count > 1 {
            errors.push(GraphError::DuplicateOrdinal {
                layer: layer.to_string(),
                parent: if parent.is_empty() { graph.id.clone() } else { parent.to_string() },
                ordinal,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Anchor, Annotation};
    use crate::layers::PARTICIPANT_LAYER;
    use crate::test_utils::sample_schema;
    use rstest::{fixture, rstest};

    #[fixture]
    fn graph() -> Graph {
        let mut graph = Graph::new("a.trs");
        graph.insert_anchor(Anchor::new("n_1", Some(0.0)));
        graph.insert_anchor(Anchor::new("n_2", Some(1.0)));
        graph.insert_anchor(Anchor::new("n_3", Some(2.0)));
        graph.insert_annotation(Annotation::new("m_-2_1", PARTICIPANT_LAYER, "Ann"));
        graph.insert_annotation(
            Annotation::new("em_11_1", "turn", "Ann")
                .spanning("n_1", "n_3")
                .with_parent("m_-2_1"),
        );
        graph.insert_annotation(
            Annotation::new("ew_0_1", "word", "hi")
                .spanning("n_1", "n_2")
                .with_parent("em_11_1"),
        );
        graph.insert_annotation(
            Annotation::new("ew_0_2", "word", "there")
                .spanning("n_2", "n_3")
                .with_parent("em_11_1")
                .with_ordinal(2),
        );
        graph
    }

    #[rstest]
    fn test_valid_graph(graph: Graph) {
        assert_eq!(validate(&graph, &sample_schema()), Ok(()));
    }

    #[rstest]
    fn test_reports_every_problem(mut graph: Graph) {
        graph.insert_annotation(Annotation::new("x", "nowhere", ""));
        graph.insert_annotation(
            Annotation::new("ew_0_3", "word", "bad")
                .spanning("n_3", "n_1")
                .with_parent("em_11_1")
                .with_ordinal(2),
        );
        graph.insert_annotation(Annotation::new("ew_2_1", "orthography", "hi").with_parent("ew_0_9"));

        let errors = validate(&graph, &sample_schema()).unwrap_err();
        assert!(errors.contains(&GraphError::UnknownLayer {
            annotation: "x".into(),
            layer: "nowhere".into()
        }));
        assert!(errors.iter().any(|e| matches!(e, GraphError::ReversedAnchors { annotation, .. } if annotation == "ew_0_3")));
        assert!(errors.iter().any(|e| matches!(e, GraphError::DuplicateOrdinal { ordinal: 2, .. })));
        assert!(errors.iter().any(|e| matches!(e, GraphError::MissingParent { annotation, .. } if annotation == "ew_2_1")));
        assert!(errors.iter().any(|e| matches!(e, GraphError::MissingAnchor { annotation, .. } if annotation == "ew_2_1")));
    }

    #[rstest]
    fn test_wrong_parent_layer(mut graph: Graph) {
        graph.insert_annotation(
            Annotation::new("es_1_1", "segment", "h")
                .spanning("n_1", "n_2")
                .with_parent("em_11_1"),
        );
        let errors = validate(&graph, &sample_schema()).unwrap_err();
        assert_eq!(
            errors,
            vec![GraphError::WrongParentLayer {
                annotation: "es_1_1".into(),
                parent: "em_11_1".into(),
                expected: "word".into(),
                found: "turn".into()
            }]
        );
    }

    #[rstest]
    fn test_orphaned_child(mut graph: Graph) {
        graph.destroy_annotation("em_11_1");
        let errors = validate(&graph, &sample_schema()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, GraphError::OrphanedChild { .. })));
    }

    #[rstest]
    fn test_normalize_inherits_tag_anchors(mut graph: Graph) {
        let tag = graph.add_annotation("orthography", "hi", None, Some("ew_0_1"));
        let schema = sample_schema();
        assert_eq!(normalize(&mut graph, &schema), 1);
        let tag = graph.annotation(&tag).unwrap();
        assert_eq!(tag.start_id.as_deref(), Some("n_1"));
        assert_eq!(tag.end_id.as_deref(), Some("n_2"));
        assert_eq!(tag.change, Change::Create);
        assert_eq!(validate(&graph, &schema), Ok(()));
    }

    #[rstest]
    fn test_normalize_renumbers_duplicate_ordinals(mut graph: Graph) {
        graph.annotation_mut("ew_0_2").unwrap().ordinal = 1;
        assert_eq!(normalize(&mut graph, &sample_schema()), 1);
        assert_eq!(graph.annotation("ew_0_1").unwrap().ordinal, 1);
        let moved = graph.annotation("ew_0_2").unwrap();
        assert_eq!(moved.ordinal, 2);
        assert_eq!(moved.change, Change::Update);
    }
}

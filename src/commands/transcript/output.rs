//! Output formatting for transcript command results.

use super::execute::TranscriptResult;
use crate::output::Outputable;

fn offset(value: f64) -> String {
    if value.is_finite() {
        format!("{:.3}", value)
    } else {
        "?".to_string()
    }
}

impl Outputable for TranscriptResult {
    fn to_table(&self) -> String {
        let graph = &self.graph;
        let mut lines = vec![format!("Transcript: {}", graph.id)];
        if let Some(fragment) = &graph.fragment {
            let mut line = format!(
                "Fragment: {} - {}",
                offset(fragment.start),
                offset(fragment.end)
            );
            if let Some(defined_by) = &fragment.defined_by {
                line.push_str(&format!(" ({})", defined_by));
            }
            lines.push(line);
        }

        for layer in &self.layers {
            let mut annotations = graph.layer_annotations(layer);
            annotations.sort_by(|a, b| {
                graph
                    .start_offset(a)
                    .total_cmp(&graph.start_offset(b))
                    .then(a.ordinal.cmp(&b.ordinal))
            });
            lines.push(String::new());
            lines.push(format!("{} ({}):", layer, annotations.len()));
            for annotation in annotations {
                let span = match (&annotation.start_id, &annotation.end_id) {
                    (Some(_), Some(_)) => format!(
                        "[{} - {}] ",
                        offset(graph.start_offset(annotation)),
                        offset(graph.end_offset(annotation))
                    ),
                    _ => String::new(),
                };
                lines.push(format!("  {}{}  ({})", span, annotation.label, annotation.id));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Anchor, Annotation, Graph};
    use rstest::{fixture, rstest};

    #[fixture]
    fn small() -> TranscriptResult {
        let mut graph = Graph::new("tiny.trs");
        graph.insert_anchor(Anchor::new("n_1", Some(0.0)));
        graph.insert_anchor(Anchor::new("n_2", Some(1.25)));
        graph.insert_annotation(Annotation::new("m_-2_1", "participant", "Ann"));
        graph.insert_annotation(
            Annotation::new("ew_0_1", "word", "hello")
                .spanning("n_1", "n_2")
                .with_parent("em_11_1"),
        );
        TranscriptResult {
            layers: vec!["participant".to_string(), "word".to_string()],
            graph,
        }
    }

    crate::output_table_contains_test! {
        test_name: test_table_groups_by_layer,
        fixture: small,
        fixture_type: TranscriptResult,
        contains: ["Transcript: tiny.trs", "participant (1):", "  Ann  (m_-2_1)", "[0.000 - 1.250] hello  (ew_0_1)"],
    }

    crate::output_json_test! {
        test_name: test_json_embeds_graph,
        fixture: small,
        fixture_type: TranscriptResult,
        assertions: {
            "layers": serde_json::json!(["participant", "word"]),
        },
    }
}

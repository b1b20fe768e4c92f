//! Output formatting for annotations command results.

use super::execute::AnnotationsResult;
use crate::output::{render_columns, Outputable};

impl Outputable for AnnotationsResult {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Annotations: {}", self.expression)];
        lines.push(format!("Matches: {}", self.total));

        if !self.ids.is_empty() {
            lines.push(String::new());
            lines.extend(self.ids.iter().map(|id| format!("  {}", id)));
        }

        if !self.annotations.is_empty() {
            let rows: Vec<Vec<String>> = self
                .annotations
                .iter()
                .map(|a| {
                    vec![
                        a.transcript_id.clone(),
                        a.id.clone(),
                        a.layer.clone(),
                        a.label.clone(),
                        a.parent_id.clone().unwrap_or_default(),
                        a.ordinal.to_string(),
                    ]
                })
                .collect();
            lines.push(String::new());
            lines.push(render_columns(
                &["TRANSCRIPT", "ID", "LAYER", "LABEL", "PARENT", "ORD"],
                &rows,
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MatchedAnnotation;
    use rstest::{fixture, rstest};

    #[fixture]
    fn one_word() -> AnnotationsResult {
        AnnotationsResult {
            expression: "label == 'the'".to_string(),
            total: 1,
            annotations: vec![MatchedAnnotation {
                id: "ew_0_1".to_string(),
                layer: "word".to_string(),
                label: "the".to_string(),
                transcript_id: "interview.trs".to_string(),
                parent_id: Some("em_11_1".to_string()),
                ordinal: 1,
                start_anchor_id: Some("n_1".to_string()),
                end_anchor_id: Some("n_2".to_string()),
                confidence: 100,
                annotator: None,
            }],
            ids: Vec::new(),
        }
    }

    crate::output_table_contains_test! {
        test_name: test_table_rows,
        fixture: one_word,
        fixture_type: AnnotationsResult,
        contains: ["Matches: 1", "TRANSCRIPT", "interview.trs", "ew_0_1", "em_11_1"],
    }

    crate::output_json_test! {
        test_name: test_json_skips_empty_ids,
        fixture: one_word,
        fixture_type: AnnotationsResult,
        assertions: {
            "total": 1,
            "ids": serde_json::Value::Null,
        },
    }
}

//! Output formatting for translate command results.

use super::execute::TranslateResult;
use crate::output::Outputable;

impl Outputable for TranslateResult {
    fn to_table(&self) -> String {
        let mut lines = vec![self.sql.clone()];
        if !self.params.is_empty() {
            lines.push(String::new());
            for (i, param) in self.params.iter().enumerate() {
                lines.push(format!("  ?{} = {}", i + 1, param));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MatchTarget;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn translated() -> TranslateResult {
        TranslateResult {
            expression: "layer.id == 'word'".to_string(),
            target: MatchTarget::Annotations,
            sql: "SELECT 1 WHERE x = ?".to_string(),
            params: vec![json!("demo")],
        }
    }

    crate::output_table_contains_test! {
        test_name: test_table_numbers_params,
        fixture: translated,
        fixture_type: TranslateResult,
        contains: ["SELECT 1 WHERE x = ?", "?1 = \"demo\""],
    }

    crate::output_json_test! {
        test_name: test_json_has_target,
        fixture: translated,
        fixture_type: TranslateResult,
        assertions: {
            "target": "annotations",
            "params": json!(["demo"]),
        },
    }
}

//! Output formatting for transcripts command results.

use super::execute::TranscriptsResult;
use crate::output::Outputable;

impl Outputable for TranscriptsResult {
    fn to_table(&self) -> String {
        let heading = format!("{:?}", self.kind);
        let mut lines = match &self.expression {
            Some(expression) => vec![format!("{} matching {}: {}", heading, expression, self.total)],
            None => vec![format!("{}: {}", heading, self.total)],
        };
        if !self.names.is_empty() {
            lines.push(String::new());
            lines.extend(self.names.iter().map(|name| format!("  {}", name)));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::transcripts::ListKind;
    use rstest::{fixture, rstest};

    #[fixture]
    fn listing() -> TranscriptsResult {
        TranscriptsResult {
            kind: ListKind::Transcripts,
            expression: None,
            total: 2,
            names: vec!["a.trs".to_string(), "b.trs".to_string()],
        }
    }

    crate::output_table_contains_test! {
        test_name: test_table_lists_names,
        fixture: listing,
        fixture_type: TranscriptsResult,
        contains: ["Transcripts: 2", "  a.trs", "  b.trs"],
    }

    crate::output_json_test! {
        test_name: test_json_kind,
        fixture: listing,
        fixture_type: TranscriptsResult,
        assertions: {
            "kind": "transcripts",
            "total": 2,
        },
    }
}

//! Output formatting for import command results.

use super::execute::ImportResult;
use crate::output::Outputable;
use crate::store::SaveOutcome;

impl Outputable for ImportResult {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Import: {}", self.transcript)];
        if self.replaced {
            lines.push("  replaced the stored transcript".to_string());
        }
        match &self.outcome {
            SaveOutcome::NoChanges => lines.push("  nothing to save".to_string()),
            SaveOutcome::Saved(summary) => {
                lines.push(format!("  ag_id:      {}", summary.ag_id));
                lines.push(format!("  statements: {}", summary.statements));
                lines.push(format!("  created:    {}", summary.created.len()));
                if !summary.kept_anchors.is_empty() {
                    lines.push(format!(
                        "  kept anchors still in use: {}",
                        summary.kept_anchors.join(", ")
                    ));
                }
            }
        }
        lines.join("\n")
    }
}

//! Output formatting for layers command results.

use super::execute::{LayerSummary, LayersResult};
use crate::output::{render_columns, Outputable};

fn scope_name(layer: &LayerSummary) -> String {
    layer
        .scope
        .map(|s| format!("{:?}", s).to_lowercase())
        .unwrap_or_default()
}

impl Outputable for LayersResult {
    fn to_table(&self) -> String {
        if let (Some(_), Some(layer)) = (&self.requested, self.layers.first()) {
            let mut lines = vec![
                format!("Layer: {}", layer.id),
                format!("  parent:    {}", layer.parent_id.as_deref().unwrap_or("(graph)")),
                format!("  kind:      {}", layer.kind),
            ];
            if let Some(numeric_id) = layer.numeric_id {
                lines.push(format!("  id:        {}", numeric_id));
            }
            if layer.scope.is_some() {
                lines.push(format!("  scope:     {}", scope_name(layer)));
            }
            lines.push(format!("  alignment: {:?}", layer.alignment).to_lowercase());
            lines.push(format!("  peers:     {}", layer.peers));
            if !layer.description.is_empty() {
                lines.push(format!("  {}", layer.description));
            }
            if !layer.valid_labels.is_empty() {
                lines.push(format!("  labels ({}):", layer.valid_labels.len()));
                for (label, description) in &layer.valid_labels {
                    lines.push(format!("    {} {}", label, description).trim_end().to_string());
                }
            }
            return lines.join("\n");
        }

        let rows: Vec<Vec<String>> = self
            .layers
            .iter()
            .map(|l| {
                vec![
                    l.id.clone(),
                    l.parent_id.clone().unwrap_or_default(),
                    l.kind.clone(),
                    scope_name(l),
                    l.numeric_id.map(|n| n.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        format!(
            "Layers ({}):\n\n{}",
            self.layers.len(),
            render_columns(&["LAYER", "PARENT", "KIND", "SCOPE", "ID"], &rows)
        )
    }
}

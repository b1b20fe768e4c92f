//! Output formatting for setup command results.

use super::execute::{RelationState, SetupResult};
use crate::output::Outputable;

impl Outputable for SetupResult {
    fn to_table(&self) -> String {
        let mut output = String::new();

        output.push_str("Database Setup\n\n");

        if self.dry_run {
            output.push_str("Schema creation (dry-run):\n");
        } else {
            output.push_str("Schema creation:\n");
        }

        for relation in &self.relations {
            let (symbol, status_text) = match relation.status {
                RelationState::Created => ("✓", "created"),
                RelationState::AlreadyExists => ("✓", "exists"),
                RelationState::WouldCreate => ("→", "would create"),
            };
            output.push_str(&format!("  {} {} ({})\n", symbol, relation.name, status_text));
        }

        if let Some(corpus) = &self.corpus {
            output.push_str(&format!("\nCorpus: {}\n", corpus));
        }

        if self.dry_run {
            output.push_str("\nNo changes made (dry-run mode).\n");
        } else if self.created_new {
            output.push_str("\nDatabase ready.\n");
        } else {
            output.push_str("\nDatabase already configured.\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::execute::RelationStatus;
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn fresh() -> SetupResult {
        SetupResult {
            relations: vec![
                RelationStatus {
                    name: "transcript".to_string(),
                    status: RelationState::Created,
                },
                RelationStatus {
                    name: "anchor".to_string(),
                    status: RelationState::AlreadyExists,
                },
            ],
            created_new: true,
            dry_run: false,
            corpus: Some("demo".to_string()),
        }
    }

    crate::output_table_contains_test! {
        test_name: test_table_lists_relations,
        fixture: fresh,
        fixture_type: SetupResult,
        contains: ["✓ transcript (created)", "✓ anchor (exists)", "Corpus: demo", "Database ready."],
    }

    crate::output_json_test! {
        test_name: test_json_status_names,
        fixture: fresh,
        fixture_type: SetupResult,
        assertions: {
            "created_new": true,
            "corpus": "demo",
        },
    }
}

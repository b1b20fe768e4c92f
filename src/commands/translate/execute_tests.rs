//! Execute tests for translate command.

#[cfg(test)]
mod tests {
    use super::super::{ProjectionArg, TranslateCmd};
    use crate::store::{GraphStore, MatchTarget};
    use crate::test_utils::empty_store;
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> GraphStore {
        empty_store()
    }

    fn translate(expression: &str, projection: ProjectionArg, transcripts: bool) -> TranslateCmd {
        TranslateCmd {
            expression: expression.to_string(),
            projection,
            transcripts,
        }
    }

    crate::execute_test! {
        test_name: test_translate_word_count,
        fixture: store,
        cmd: translate("layer.id == 'word' && label == 'a'", ProjectionArg::Count, false),
        assertions: |result| {
            assert_eq!(result.target, MatchTarget::Annotations);
            assert!(result.sql.starts_with("SELECT COUNT(*) AS count, 'word' AS layer FROM annotation_layer_0"));
            assert!(!result.sql.contains("ORDER BY"));
        },
    }

    crate::execute_test! {
        test_name: test_translate_transcripts,
        fixture: store,
        cmd: translate("/^a/.test(id)", ProjectionArg::Count, true),
        assertions: |result| {
            assert_eq!(result.target, MatchTarget::Transcripts);
            assert!(result.sql.contains("FROM transcript graph"));
        },
    }

    crate::execute_error_test! {
        test_name: test_translate_without_primary_layer,
        fixture: store,
        cmd: translate("label == 'x'", ProjectionArg::Ids, false),
        contains: "layer",
    }
}

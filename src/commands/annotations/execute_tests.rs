//! Execute tests for annotations command.

#[cfg(test)]
mod tests {
    use super::super::AnnotationsCmd;
    use crate::commands::PageArgs;
    use crate::store::GraphStore;
    use crate::test_utils::seeded_store;
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> GraphStore {
        seeded_store()
    }

    fn find(expression: &str) -> AnnotationsCmd {
        AnnotationsCmd {
            expression: expression.to_string(),
            count: false,
            ids: false,
            page: PageArgs::default(),
        }
    }

    crate::execute_test! {
        test_name: test_words_by_speaker,
        fixture: store,
        cmd: find("layer.id == 'word' && my('turn').label == 'Bob'"),
        assertions: |result| {
            assert_eq!(result.total, 2);
            assert_eq!(result.annotations.len(), 2);
            assert!(result.annotations.iter().all(|a| a.layer == "word"));
        },
    }

    crate::execute_test! {
        test_name: test_count_only,
        fixture: store,
        cmd: AnnotationsCmd { count: true, ..find("layer.id == 'word'") },
        assertions: |result| {
            assert_eq!(result.total, 5);
            assert!(result.annotations.is_empty());
            assert!(result.ids.is_empty());
        },
    }

    crate::execute_test! {
        test_name: test_ids_paged,
        fixture: store,
        cmd: AnnotationsCmd {
            ids: true,
            page: PageArgs { offset: 3, limit: 10 },
            ..find("layer.id == 'word'")
        },
        assertions: |result| {
            assert_eq!(result.total, 5);
            assert_eq!(result.ids.len(), 2);
            assert!(result.ids.iter().all(|id| id.starts_with("ew_0_")));
        },
    }

    crate::execute_error_test! {
        test_name: test_invalid_expression,
        fixture: store,
        cmd: find("layer.id == "),
        contains: "Cannot parse",
    }
}

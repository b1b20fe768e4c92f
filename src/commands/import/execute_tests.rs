//! Execute tests for import command.

#[cfg(test)]
mod tests {
    use super::super::ImportCmd;
    use crate::commands::Execute;
    use crate::fixtures::INTERVIEW;
    use crate::store::{GraphStore, SaveOutcome};
    use crate::test_utils::{create_temp_json_file, empty_store, seeded_store};
    use rstest::{fixture, rstest};
    use tempfile::NamedTempFile;

    #[fixture]
    fn interview_file() -> NamedTempFile {
        create_temp_json_file(INTERVIEW)
    }

    fn import(file: &NamedTempFile, id: Option<&str>, replace: bool) -> ImportCmd {
        ImportCmd {
            file: file.path().to_path_buf(),
            id: id.map(str::to_string),
            replace,
        }
    }

    #[rstest]
    fn test_import_new_transcript(interview_file: NamedTempFile) {
        let mut store = empty_store();
        let result = import(&interview_file, None, false).execute(&mut store).unwrap();
        assert_eq!(result.transcript, "interview.trs");
        assert!(!result.replaced);
        assert!(matches!(result.outcome, SaveOutcome::Saved(_)));
        assert!(result.outcome.created_id("w1").unwrap().starts_with("ew_0_"));
        assert_eq!(store.count_matching_annotations("layer.id == 'word'").unwrap(), 5);
    }

    #[rstest]
    fn test_import_under_other_name(interview_file: NamedTempFile) {
        let mut store = seeded_store();
        import(&interview_file, Some("copy.trs"), false)
            .execute(&mut store)
            .unwrap();
        assert_eq!(
            store.get_transcript_ids().unwrap(),
            vec!["copy.trs", "interview.trs"]
        );
    }

    #[rstest]
    fn test_import_replace(interview_file: NamedTempFile) {
        let mut store: GraphStore = seeded_store();
        let result = import(&interview_file, None, true).execute(&mut store).unwrap();
        assert!(result.replaced);
        assert_eq!(store.get_transcript_ids().unwrap(), vec!["interview.trs"]);
        assert_eq!(store.count_matching_annotations("layer.id == 'word'").unwrap(), 5);
    }

    #[rstest]
    fn test_import_invalid_json() {
        let mut store = empty_store();
        let file = create_temp_json_file("{ not a graph");
        let err = import(&file, None, false).execute(&mut store).unwrap_err();
        assert!(err.to_string().contains("Invalid graph JSON"));
    }
}

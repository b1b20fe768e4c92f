//! CLI parsing tests for transcripts command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::transcripts::ListKind;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_defaults_test! {
        command: "transcripts",
        variant: Transcripts,
        required_args: [],
        defaults: {
            expression: None,
            kind: ListKind::Transcripts,
            count: false,
            page.limit: 100,
        },
    }

    crate::cli_option_test! {
        command: "transcripts",
        variant: Transcripts,
        test_name: test_transcripts_expression,
        args: ["/^a/.test(id)"],
        field: expression,
        expected: Some("/^a/.test(id)".to_string()),
    }

    crate::cli_option_test! {
        command: "transcripts",
        variant: Transcripts,
        test_name: test_transcripts_kind,
        args: ["-k", "participants"],
        field: kind,
        expected: ListKind::Participants,
    }

    crate::cli_limit_tests! {
        command: "transcripts",
        variant: Transcripts,
        required_args: [],
        limit: {
            field: page.limit,
            default: 100,
            max: 1000,
        },
    }
}

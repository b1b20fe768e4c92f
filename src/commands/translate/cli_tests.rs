//! CLI parsing tests for translate command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::translate::ProjectionArg;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "translate",
        test_name: test_translate_requires_expression,
        required_arg: "<EXPRESSION>",
    }

    crate::cli_defaults_test! {
        command: "translate",
        variant: Translate,
        required_args: ["layer.id == 'word'"],
        defaults: {
            projection: ProjectionArg::Annotations,
            transcripts: false,
        },
    }

    crate::cli_option_test! {
        command: "translate",
        variant: Translate,
        test_name: test_translate_count,
        args: ["layer.id == 'word'", "-p", "count"],
        field: projection,
        expected: ProjectionArg::Count,
    }

    crate::cli_option_test! {
        command: "translate",
        variant: Translate,
        test_name: test_translate_transcripts,
        args: ["/a/.test(id)", "--transcripts"],
        field: transcripts,
        expected: true,
    }

    crate::cli_error_test! {
        command: "translate",
        test_name: test_translate_unknown_projection,
        args: ["label == 'x'", "--projection", "rows"],
    }
}

//! CLI parsing tests for annotations command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "annotations",
        test_name: test_annotations_requires_expression,
        required_arg: "<EXPRESSION>",
    }

    crate::cli_defaults_test! {
        command: "annotations",
        variant: Annotations,
        required_args: ["layer.id == 'word'"],
        defaults: {
            count: false,
            ids: false,
            page.offset: 0,
        },
    }

    crate::cli_option_test! {
        command: "annotations",
        variant: Annotations,
        test_name: test_annotations_offset,
        args: ["layer.id == 'word'", "--offset", "20"],
        field: page.offset,
        expected: 20,
    }

    crate::cli_limit_tests! {
        command: "annotations",
        variant: Annotations,
        required_args: ["layer.id == 'word'"],
        limit: {
            field: page.limit,
            default: 100,
            max: 1000,
        },
    }

    crate::cli_error_test! {
        command: "annotations",
        test_name: test_annotations_count_conflicts_with_ids,
        args: ["layer.id == 'word'", "--count", "--ids"],
    }

    crate::cli_error_test! {
        command: "annotations",
        test_name: test_annotations_negative_offset,
        args: ["layer.id == 'word'", "--offset", "-1"],
    }
}

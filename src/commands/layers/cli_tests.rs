//! CLI parsing tests for layers command.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_defaults_test! {
        command: "layers",
        variant: Layers,
        required_args: [],
        defaults: {
            layer: None,
        },
    }

    crate::cli_option_test! {
        command: "layers",
        variant: Layers,
        test_name: test_layers_single,
        args: ["word"],
        field: layer,
        expected: Some("word".to_string()),
    }
}

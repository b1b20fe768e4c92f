//! Test fixtures, loaded at compile time with `include_str!`.
//!
//! ## Available Fixtures
//!
//! - [`INTERVIEW`] - A two-speaker transcript touching every layer class

/// Transcript `interview.trs` in the graph JSON format.
///
/// Contains:
/// - corpus `demo`, episode `interview`, type `interview`, one series note
/// - participants Ann (main, gender F) and Bob, one turn and one utterance each
/// - 5 words (`the thing is` / `that there`), 2 segments under `the`
/// - orthography tags on the first two words, a `pos` tag on the first
/// - a freeform `topic` spanning Ann's turn
///
/// Anchor and annotation ids are temporary; import with
/// `Graph::mark_all_created`.
pub const INTERVIEW: &str = include_str!("interview.json");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interview_is_valid_json() {
        let _: serde_json::Value =
            serde_json::from_str(INTERVIEW).expect("INTERVIEW should be valid JSON");
    }
}

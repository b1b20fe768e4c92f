//! Bookkeeping carried through one load or save.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::graph::FragmentBounds;

/// The `transcript` row an operation works against.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TranscriptRow {
    pub ag_id: i64,
    pub transcript_id: String,
    pub corpus_name: Option<String>,
    pub family_id: Option<i64>,
    pub type_id: Option<i64>,
}

pub(crate) struct LoadContext {
    pub transcript: TranscriptRow,
    pub bounds: Option<FragmentBounds>,
    /// Speaker number to name, for turn and utterance labels.
    pub participant_names: HashMap<i64, String>,
    pub main_participants: BTreeSet<i64>,
}

impl LoadContext {
    pub fn new(transcript: TranscriptRow, bounds: Option<FragmentBounds>) -> Self {
        Self {
            transcript,
            bounds,
            participant_names: HashMap::new(),
            main_participants: BTreeSet::new(),
        }
    }

    /// Display label for a stored turn or utterance label.
    pub fn participant_label(&self, stored: &str) -> String {
        stored
            .parse::<i64>()
            .ok()
            .and_then(|number| self.participant_names.get(&number))
            .cloned()
            .unwrap_or_else(|| stored.to_string())
    }
}

pub(crate) struct SaveContext {
    pub ag_id: i64,
    pub family_id: Option<i64>,
    /// Participant name to speaker number, for turn and utterance labels.
    pub participant_numbers: HashMap<String, i64>,
    /// Original ids already written.
    pub processed: HashSet<String>,
    /// Unchanged annotations whose anchors were renamed.
    pub extra_updates: BTreeSet<String>,
    /// Temporary id to stored id.
    pub renamed: BTreeMap<String, String>,
    /// Whether a word or segment scope row was written.
    pub words_changed: bool,
    pub kept_anchors: Vec<String>,
    /// Timestamp for rows that carry none.
    pub now: String,
}

impl SaveContext {
    pub fn new(ag_id: i64, family_id: Option<i64>) -> Self {
        Self {
            ag_id,
            family_id,
            participant_numbers: HashMap::new(),
            processed: HashSet::new(),
            extra_updates: BTreeSet::new(),
            renamed: BTreeMap::new(),
            words_changed: false,
            kept_anchors: Vec::new(),
            now: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Record a rename, following earlier renames back to the caller's id.
    pub fn rename(&mut self, old: &str, new: &str) {
        let original = self
            .renamed
            .iter()
            .find(|(_, current)| current.as_str() == old)
            .map(|(original, _)| original.clone())
            .unwrap_or_else(|| old.to_string());
        if original != new {
            self.renamed.insert(original, new.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_label_falls_back_to_stored() {
        let mut ctx = LoadContext::new(
            TranscriptRow {
                ag_id: 1,
                transcript_id: "a.trs".into(),
                corpus_name: None,
                family_id: None,
                type_id: None,
            },
            None,
        );
        ctx.participant_names.insert(3, "Ann".into());
        assert_eq!(ctx.participant_label("3"), "Ann");
        assert_eq!(ctx.participant_label("4"), "4");
        assert_eq!(ctx.participant_label("Bob"), "Bob");
    }

    #[test]
    fn test_rename_chains() {
        let mut ctx = SaveContext::new(1, None);
        ctx.rename("+1", "m_-2_5");
        ctx.rename("m_-2_5", "m_-2_6");
        assert_eq!(ctx.renamed.get("+1").map(String::as_str), Some("m_-2_6"));
        assert_eq!(ctx.renamed.len(), 1);
    }
}

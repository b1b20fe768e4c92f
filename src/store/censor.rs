use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{Change, Graph};

/// Replace the labels of words overlapped by matching annotations.
///
/// An annotation on `layer` whose whole label matches `pattern` censors
/// every word inside its span: the word label becomes `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Censorship {
    pub layer: String,
    pub pattern: String,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    "---".to_string()
}

impl Censorship {
    pub fn new(layer: &str, pattern: &str, label: &str) -> Self {
        Self {
            layer: layer.to_string(),
            pattern: pattern.to_string(),
            label: label.to_string(),
        }
    }

    /// The pattern, anchored to match whole labels.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{})$", self.pattern))
    }

    /// Apply to `graph`, returning the number of words relabelled.
    pub fn apply(&self, graph: &mut Graph, word_layer: &str) -> Result<usize, regex::Error> {
        let pattern = self.compile()?;
        let spans: Vec<(f64, f64)> = graph
            .layer_annotations(&self.layer)
            .into_iter()
            .filter(|a| a.change != Change::Destroy && pattern.is_match(&a.label))
            .map(|a| (graph.start_offset(a), graph.end_offset(a)))
            .collect();
        if spans.is_empty() {
            return Ok(0);
        }

        let words: Vec<String> = graph
            .layer_annotations(word_layer)
            .into_iter()
            .filter(|a| a.change != Change::Destroy && a.label != self.label)
            .filter(|a| {
                let (start, end) = (graph.start_offset(a), graph.end_offset(a));
                spans.iter().any(|&(s, e)| s <= start && end <= e)
            })
            .map(|a| a.id.clone())
            .collect();
        for id in &words {
            graph.set_label(id, &self.label);
        }
        if !words.is_empty() {
            debug!(layer = %self.layer, words = words.len(), "labels censored");
        }
        Ok(words.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture_graph;
    use rstest::rstest;

    #[rstest]
    fn test_censors_words_inside_matching_span() {
        let mut graph = fixture_graph();
        let censorship = Censorship::new("topic", "greet.*", "***");
        assert_eq!(censorship.apply(&mut graph, "word").unwrap(), 3);
        let labels: Vec<_> = graph
            .layer_annotations("word")
            .iter()
            .map(|w| w.label.clone())
            .collect();
        assert_eq!(labels, vec!["***", "***", "***", "that", "there"]);
        assert_eq!(graph.annotation("w1").unwrap().change, Change::Update);
    }

    #[rstest]
    fn test_pattern_must_match_whole_label() {
        let mut graph = fixture_graph();
        assert_eq!(Censorship::new("topic", "greet", "***").apply(&mut graph, "word").unwrap(), 0);
        assert!(!graph.has_changes());
    }

    #[rstest]
    fn test_bad_pattern() {
        let mut graph = fixture_graph();
        assert!(Censorship::new("topic", "(", "***").apply(&mut graph, "word").is_err());
    }

    #[rstest]
    fn test_default_label() {
        let censorship: Censorship =
            serde_json::from_str(r#"{"layer": "topic", "pattern": "x"}"#).unwrap();
        assert_eq!(censorship.label, "---");
    }
}

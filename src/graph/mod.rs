//! In-memory annotation graph with change tracking.
//!
//! A [`Graph`] is one transcript (or a fragment of one): anchors on a shared
//! timeline and annotations that span pairs of anchors. Every object carries
//! a [`Change`] tag telling the store what to do with it on save. Objects
//! created in memory get temporary ids (`+1`, `+2`, ...) that the store
//! replaces with encoded row ids via [`Graph::rename_anchor`] and
//! [`Graph::rename_annotation`].
//!
//! Graph-level annotations (participants, corpus, episode, attributes) have
//! no anchors of their own in storage; after loading they span the graph's
//! first and last anchors.

mod validate;

pub use validate::{normalize, validate, GraphError};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What saving should do with an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    #[default]
    NoChange,
    Create,
    Update,
    Destroy,
}

impl Change {
    fn is_none(&self) -> bool {
        *self == Change::NoChange
    }
}

/// A point on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    /// Seconds from the start of the recording; `None` when unaligned.
    pub offset: Option<f64>,
    /// Alignment confidence, stored as `alignment_status`.
    #[serde(default)]
    pub confidence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Change::is_none")]
    pub change: Change,
}

impl Anchor {
    pub fn new(id: impl Into<String>, offset: Option<f64>) -> Self {
        Self {
            id: id.into(),
            offset,
            confidence: 0,
            annotator: None,
            when: None,
            change: Change::NoChange,
        }
    }
}

/// A labelled span on one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "layer")]
    pub layer_id: String,
    pub label: String,
    #[serde(default, rename = "start", skip_serializing_if = "Option::is_none")]
    pub start_id: Option<String>,
    #[serde(default, rename = "end", skip_serializing_if = "Option::is_none")]
    pub end_id: Option<String>,
    /// `None` when the parent is the graph itself.
    #[serde(default, rename = "parent", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default = "first_ordinal")]
    pub ordinal: i64,
    /// Label confidence, stored as `label_status`.
    #[serde(default)]
    pub confidence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Change::is_none")]
    pub change: Change,
}

fn first_ordinal() -> i64 {
    1
}

impl Annotation {
    pub fn new(
        id: impl Into<String>,
        layer_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            layer_id: layer_id.into(),
            label: label.into(),
            start_id: None,
            end_id: None,
            parent_id: None,
            ordinal: 1,
            confidence: 0,
            annotator: None,
            when: None,
            change: Change::NoChange,
        }
    }

    pub fn spanning(mut self, start_id: impl Into<String>, end_id: impl Into<String>) -> Self {
        self.start_id = Some(start_id.into());
        self.end_id = Some(end_id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: i64) -> Self {
        self.ordinal = ordinal;
        self
    }
}

/// Temporal extent of a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentBounds {
    pub start: f64,
    pub end: f64,
    /// The annotation whose span defined the fragment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defined_by: Option<String>,
}

impl FragmentBounds {
    /// Whether `[start, end]` lies inside these bounds.
    pub fn contains(&self, start: f64, end: f64) -> bool {
        self.start <= start && end <= self.end
    }
}

/// A transcript, or a fragment of one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Transcript name, e.g. `interview.trs`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<FragmentBounds>,
    /// Skip normalization and validation on save.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub validated: bool,
    #[serde(default, with = "keyed")]
    anchors: BTreeMap<String, Anchor>,
    #[serde(default, with = "keyed")]
    annotations: BTreeMap<String, Annotation>,
    #[serde(skip)]
    next_temporary: u64,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn anchor(&self, id: &str) -> Option<&Anchor> {
        self.anchors.get(id)
    }

    pub fn anchor_mut(&mut self, id: &str) -> Option<&mut Anchor> {
        self.anchors.get_mut(id)
    }

    pub fn anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    pub fn annotation_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.annotations.get_mut(id)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn annotations_mut(&mut self) -> impl Iterator<Item = &mut Annotation> {
        self.annotations.values_mut()
    }

    /// Annotations on `layer_id`, ordered by parent then ordinal.
    pub fn layer_annotations(&self, layer_id: &str) -> Vec<&Annotation> {
        let mut found: Vec<&Annotation> = self
            .annotations
            .values()
            .filter(|a| a.layer_id == layer_id)
            .collect();
        found.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then(a.ordinal.cmp(&b.ordinal))
                .then(self.start_offset(a).total_cmp(&self.start_offset(b)))
        });
        found
    }

    /// Children of `parent_id` on `layer_id`, by ordinal.
    pub fn children(&self, parent_id: &str, layer_id: &str) -> Vec<&Annotation> {
        let mut found: Vec<&Annotation> = self
            .annotations
            .values()
            .filter(|a| a.layer_id == layer_id && a.parent_id.as_deref() == Some(parent_id))
            .collect();
        found.sort_by_key(|a| a.ordinal);
        found
    }

    pub fn parent(&self, annotation: &Annotation) -> Option<&Annotation> {
        annotation
            .parent_id
            .as_deref()
            .and_then(|id| self.annotations.get(id))
    }

    /// Start offset of an annotation, `-inf` when unknown.
    pub fn start_offset(&self, annotation: &Annotation) -> f64 {
        self.offset_of(annotation.start_id.as_deref())
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn end_offset(&self, annotation: &Annotation) -> f64 {
        self.offset_of(annotation.end_id.as_deref())
            .unwrap_or(f64::INFINITY)
    }

    fn offset_of(&self, anchor_id: Option<&str>) -> Option<f64> {
        anchor_id
            .and_then(|id| self.anchors.get(id))
            .and_then(|anchor| anchor.offset)
    }

    /// Earliest and latest aligned anchors.
    pub fn extent(&self) -> Option<(&Anchor, &Anchor)> {
        let aligned = || self.anchors.values().filter(|a| a.offset.is_some());
        let offset = |anchor: &Anchor| anchor.offset.unwrap_or_default();
        let first = aligned().min_by(|a, b| offset(a).total_cmp(&offset(b)))?;
        let last = aligned().max_by(|a, b| offset(a).total_cmp(&offset(b)))?;
        Some((first, last))
    }

    fn temporary_id(&mut self) -> String {
        loop {
            self.next_temporary += 1;
            let id = format!("+{}", self.next_temporary);
            if !self.anchors.contains_key(&id) && !self.annotations.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert an anchor as loaded from storage, replacing any with its id.
    pub fn insert_anchor(&mut self, anchor: Anchor) {
        self.anchors.insert(anchor.id.clone(), anchor);
    }

    pub fn insert_annotation(&mut self, annotation: Annotation) {
        self.annotations.insert(annotation.id.clone(), annotation);
    }

    /// Create a new anchor with a temporary id.
    pub fn add_anchor(&mut self, offset: Option<f64>) -> String {
        let id = self.temporary_id();
        let mut anchor = Anchor::new(id.clone(), offset);
        anchor.change = Change::Create;
        self.anchors.insert(id.clone(), anchor);
        id
    }

    /// Create a new annotation with a temporary id.
    ///
    /// The ordinal follows the last existing sibling.
    pub fn add_annotation(
        &mut self,
        layer_id: &str,
        label: &str,
        span: Option<(&str, &str)>,
        parent_id: Option<&str>,
    ) -> String {
        let id = self.temporary_id();
        let ordinal = self
            .annotations
            .values()
            .filter(|a| a.layer_id == layer_id && a.parent_id.as_deref() == parent_id)
            .map(|a| a.ordinal)
            .max()
            .unwrap_or(0)
            + 1;
        let mut annotation = Annotation::new(id.clone(), layer_id, label).with_ordinal(ordinal);
        if let Some((start, end)) = span {
            annotation = annotation.spanning(start, end);
        }
        annotation.parent_id = parent_id.map(str::to_string);
        annotation.change = Change::Create;
        self.annotations.insert(id.clone(), annotation);
        id
    }

    /// Change a label, flagging the annotation for update.
    pub fn set_label(&mut self, id: &str, label: &str) -> bool {
        let Some(annotation) = self.annotations.get_mut(id) else {
            return false;
        };
        if annotation.label != label {
            annotation.label = label.to_string();
            annotation.mark_updated();
        }
        true
    }

    /// Flag an annotation for deletion. Its children are left alone.
    pub fn destroy_annotation(&mut self, id: &str) -> bool {
        match self.annotations.get_mut(id) {
            Some(annotation) => {
                annotation.change = Change::Destroy;
                true
            }
            None => false,
        }
    }

    pub fn destroy_anchor(&mut self, id: &str) -> bool {
        match self.anchors.get_mut(id) {
            Some(anchor) => {
                anchor.change = Change::Destroy;
                true
            }
            None => false,
        }
    }

    /// Replace an anchor's id everywhere it is referenced.
    ///
    /// Returns the ids of annotations whose start or end changed.
    pub fn rename_anchor(&mut self, old: &str, new: &str) -> Vec<String> {
        let Some(mut anchor) = self.anchors.remove(old) else {
            return Vec::new();
        };
        anchor.id = new.to_string();
        self.anchors.insert(new.to_string(), anchor);

        let mut touched = Vec::new();
        for annotation in self.annotations.values_mut() {
            let mut hit = false;
            for end in [&mut annotation.start_id, &mut annotation.end_id] {
                if end.as_deref() == Some(old) {
                    *end = Some(new.to_string());
                    hit = true;
                }
            }
            if hit {
                touched.push(annotation.id.clone());
            }
        }
        touched
    }

    /// Replace an annotation's id, re-pointing its children.
    pub fn rename_annotation(&mut self, old: &str, new: &str) {
        let Some(mut annotation) = self.annotations.remove(old) else {
            return;
        };
        annotation.id = new.to_string();
        self.annotations.insert(new.to_string(), annotation);
        for child in self.annotations.values_mut() {
            if child.parent_id.as_deref() == Some(old) {
                child.parent_id = Some(new.to_string());
            }
        }
        if let Some(bounds) = &mut self.fragment
            && bounds.defined_by.as_deref() == Some(old)
        {
            bounds.defined_by = Some(new.to_string());
        }
    }

    /// Whether anything would be written on save.
    pub fn has_changes(&self) -> bool {
        self.anchors.values().any(|a| a.change != Change::NoChange)
            || self
                .annotations
                .values()
                .any(|a| a.change != Change::NoChange)
    }

    /// Drop destroyed objects and clear all change tags.
    pub fn commit(&mut self) {
        self.anchors.retain(|_, a| a.change != Change::Destroy);
        self.annotations.retain(|_, a| a.change != Change::Destroy);
        for anchor in self.anchors.values_mut() {
            anchor.change = Change::NoChange;
        }
        for annotation in self.annotations.values_mut() {
            annotation.change = Change::NoChange;
        }
        self.validated = false;
    }

    /// Flag every object for creation, as when importing a new transcript.
    pub fn mark_all_created(&mut self) {
        for anchor in self.anchors.values_mut() {
            anchor.change = Change::Create;
        }
        for annotation in self.annotations.values_mut() {
            annotation.change = Change::Create;
        }
    }
}

impl Annotation {
    /// Flag for update unless already being created or destroyed.
    pub fn mark_updated(&mut self) {
        if self.change == Change::NoChange {
            self.change = Change::Update;
        }
    }
}

impl Anchor {
    pub fn mark_updated(&mut self) {
        if self.change == Change::NoChange {
            self.change = Change::Update;
        }
    }
}

/// Serializes an id-keyed map as a plain list of its values.
mod keyed {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Anchor, Annotation};

    pub trait Keyed {
        fn key(&self) -> &str;
    }

    impl Keyed for Anchor {
        fn key(&self) -> &str {
            &self.id
        }
    }

    impl Keyed for Annotation {
        fn key(&self) -> &str {
            &self.id
        }
    }

    pub fn serialize<S, T>(map: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Keyed,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items
            .into_iter()
            .map(|item| (item.key().to_string(), item))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn graph() -> Graph {
        let mut graph = Graph::new("a.trs");
        graph.insert_anchor(Anchor::new("n_1", Some(0.0)));
        graph.insert_anchor(Anchor::new("n_2", Some(1.5)));
        graph.insert_annotation(Annotation::new("em_11_1", "turn", "Ann").spanning("n_1", "n_2"));
        graph.insert_annotation(
            Annotation::new("ew_0_1", "word", "hello")
                .spanning("n_1", "n_2")
                .with_parent("em_11_1"),
        );
        graph
    }

    #[rstest]
    fn test_new_objects_get_temporary_ids(mut graph: Graph) {
        let anchor = graph.add_anchor(Some(2.0));
        let word = graph.add_annotation("word", "there", Some(("n_2", &anchor)), Some("em_11_1"));
        assert!(anchor.starts_with('+'));
        assert_ne!(anchor, word);
        let added = graph.annotation(&word).unwrap();
        assert_eq!(added.ordinal, 2);
        assert_eq!(added.change, Change::Create);
        assert!(graph.has_changes());
    }

    #[rstest]
    fn test_rename_anchor_repoints_annotations(mut graph: Graph) {
        let touched = graph.rename_anchor("n_2", "n_9");
        assert_eq!(touched.len(), 2);
        assert!(graph.anchor("n_2").is_none());
        assert_eq!(graph.annotation("ew_0_1").unwrap().end_id.as_deref(), Some("n_9"));
    }

    #[rstest]
    fn test_rename_annotation_repoints_children(mut graph: Graph) {
        graph.rename_annotation("em_11_1", "em_11_7");
        assert_eq!(
            graph.annotation("ew_0_1").unwrap().parent_id.as_deref(),
            Some("em_11_7")
        );
        assert_eq!(graph.children("em_11_7", "word").len(), 1);
    }

    #[rstest]
    fn test_commit_drops_destroyed(mut graph: Graph) {
        graph.destroy_annotation("ew_0_1");
        graph.set_label("em_11_1", "Bob");
        assert!(graph.has_changes());
        graph.commit();
        assert!(!graph.has_changes());
        assert!(graph.annotation("ew_0_1").is_none());
        assert_eq!(graph.annotation("em_11_1").unwrap().label, "Bob");
    }

    #[rstest]
    fn test_set_label_keeps_create_tag(mut graph: Graph) {
        let id = graph.add_annotation("word", "x", Some(("n_1", "n_2")), Some("em_11_1"));
        graph.set_label(&id, "y");
        assert_eq!(graph.annotation(&id).unwrap().change, Change::Create);
    }

    #[rstest]
    fn test_extent(graph: Graph) {
        let (first, last) = graph.extent().unwrap();
        assert_eq!(first.id, "n_1");
        assert_eq!(last.id, "n_2");
    }

    #[rstest]
    fn test_json_shape(graph: Graph) {
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["anchors"].as_array().unwrap().len(), 2);
        assert_eq!(json["annotations"][1]["layer"], "word");
        assert_eq!(json["annotations"][1]["parent"], "em_11_1");
        assert!(json["annotations"][1].get("change").is_none());

        let back: Graph = serde_json::from_value(json).unwrap();
        assert_eq!(back, graph);
    }
}

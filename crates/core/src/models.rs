use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DOCUMENT_TYPE_PDF: &str = "pdf";

/// Chapter, heading and subheading of an outline node, taken from the first
/// three titles on its root-to-node path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyPath {
    pub chapter: Option<String>,
    pub heading: Option<String>,
    pub subheading: Option<String>,
}

impl HierarchyPath {
    pub fn from_titles<S: AsRef<str>>(titles: &[S]) -> Self {
        let slot = |index: usize| titles.get(index).map(|title| title.as_ref().to_string());
        Self {
            chapter: slot(0),
            heading: slot(1),
            subheading: slot(2),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chapter.is_none() && self.heading.is_none() && self.subheading.is_none()
    }

    pub fn display(&self) -> String {
        [&self.chapter, &self.heading, &self.subheading]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// Page number (1-based) to the hierarchy that starts on that page.
pub type PageHierarchyMap = BTreeMap<u32, HierarchyPath>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub page_number: u32,
    pub chapter: Option<String>,
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub chunk_index: u64,
    pub content_length: usize,
    pub document_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(
        content: String,
        source: &str,
        page_number: u32,
        hierarchy: &HierarchyPath,
        chunk_index: u64,
    ) -> Self {
        let content_length = content.chars().count();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page_number,
                chapter: hierarchy.chapter.clone(),
                heading: hierarchy.heading.clone(),
                subheading: hierarchy.subheading.clone(),
                chunk_index,
                content_length,
                document_type: DOCUMENT_TYPE_PDF.to_string(),
            },
        }
    }

    /// Flattened store payload: metadata fields, hierarchy fields only when
    /// set, plus the chunk text under `content`.
    pub fn payload(&self) -> Map<String, Value> {
        let meta = &self.metadata;
        let mut payload = Map::new();
        payload.insert("source".to_string(), Value::from(meta.source.clone()));
        payload.insert("page_number".to_string(), Value::from(meta.page_number));
        payload.insert("chunk_index".to_string(), Value::from(meta.chunk_index));
        payload.insert("content_length".to_string(), Value::from(meta.content_length));
        payload.insert(
            "document_type".to_string(),
            Value::from(meta.document_type.clone()),
        );

        for (key, value) in [
            ("chapter", &meta.chapter),
            ("heading", &meta.heading),
            ("subheading", &meta.subheading),
        ] {
            if let Some(value) = value {
                payload.insert(key.to_string(), Value::from(value.clone()));
            }
        }

        payload.insert("content".to_string(), Value::from(self.content.clone()));
        payload
    }
}

/// Metadata constraints for a filtered search. Blank strings count as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    pub chapter: Option<String>,
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub page_number: Option<u32>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        non_blank(&self.chapter).is_none()
            && non_blank(&self.heading).is_none()
            && non_blank(&self.subheading).is_none()
            && self.page_number.is_none()
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

/// A retrieval result in uniform shape. `score` is only present for
/// similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub payload: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_path_truncates_and_pads_to_three_slots() {
        let deep = HierarchyPath::from_titles(&["Part", "Chapter", "Section", "Paragraph"]);
        assert_eq!(deep.chapter.as_deref(), Some("Part"));
        assert_eq!(deep.heading.as_deref(), Some("Chapter"));
        assert_eq!(deep.subheading.as_deref(), Some("Section"));

        let shallow = HierarchyPath::from_titles(&["Intro"]);
        assert_eq!(shallow.chapter.as_deref(), Some("Intro"));
        assert_eq!(shallow.heading, None);
        assert_eq!(shallow.subheading, None);
        assert_eq!(shallow.display(), "Intro");

        assert!(HierarchyPath::from_titles::<&str>(&[]).is_empty());
    }

    #[test]
    fn chunk_payload_omits_unset_hierarchy_fields() {
        let hierarchy = HierarchyPath::from_titles(&["Moves"]);
        let chunk = Chunk::new("Roll +edge.".to_string(), "rules.pdf", 4, &hierarchy, 7);
        let payload = chunk.payload();

        assert_eq!(payload["chapter"], "Moves");
        assert!(!payload.contains_key("heading"));
        assert!(!payload.contains_key("subheading"));
        assert_eq!(payload["page_number"], 4);
        assert_eq!(payload["chunk_index"], 7);
        assert_eq!(payload["content_length"], 11);
        assert_eq!(payload["document_type"], "pdf");
        assert_eq!(payload["content"], "Roll +edge.");
    }

    #[test]
    fn chunk_ids_are_unique_uuids() {
        let hierarchy = HierarchyPath::default();
        let first = Chunk::new("a".to_string(), "x.pdf", 1, &hierarchy, 0);
        let second = Chunk::new("a".to_string(), "x.pdf", 1, &hierarchy, 1);
        assert_ne!(first.id, second.id);
        assert!(Uuid::parse_str(&first.id).is_ok());
    }

    #[test]
    fn blank_filter_fields_count_as_unset() {
        let filters = SearchFilters {
            chapter: Some("   ".to_string()),
            heading: Some(String::new()),
            ..Default::default()
        };
        assert!(filters.is_empty());

        let filters = SearchFilters {
            page_number: Some(3),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }
}

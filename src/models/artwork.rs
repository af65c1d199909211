//! Artwork models normalized from the MET collection API.
//!
//! [`MetObject`] mirrors the upstream object payload shape; [`Artwork`] is
//! the normalized record the rest of the system consumes and persists.
//! The external object id is stable and unique per the upstream catalog
//! and never changes after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin marker distinguishing imported records from natively-authored ones.
pub const ARTWORK_SOURCE_MET: &str = "met";

/// Normalized artwork record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artwork {
    /// External identifier from the upstream catalog. Immutable.
    pub object_id: u64,
    pub title: String,
    pub primary_image: String,
    pub primary_image_small: String,
    pub additional_images: Vec<String>,
    pub artist_display_name: String,
    /// Free-text date as the catalog reports it (e.g. "ca. 1660").
    pub object_date: String,
    pub medium: String,
    pub dimensions: String,
    pub culture: String,
    pub department: String,
    pub classification: String,
    pub credit_line: String,
    pub repository: String,
    pub object_url: String,
    /// Deduplicated tag terms.
    pub tags: Vec<String>,
    /// Origin marker, always [`ARTWORK_SOURCE_MET`] for imported records.
    pub source: String,
    /// User who triggered the import, set on persistence.
    pub imported_by: Option<String>,
    /// Import timestamp, set on persistence.
    pub imported_at: Option<DateTime<Utc>>,
}

impl Artwork {
    /// Build a normalized record from an upstream payload.
    pub fn from_met(object: MetObject) -> Self {
        let tags = normalize_tags(&object.tags.unwrap_or_default());
        Self {
            object_id: object.object_id,
            title: object.title,
            primary_image: object.primary_image,
            primary_image_small: object.primary_image_small,
            additional_images: object.additional_images,
            artist_display_name: object.artist_display_name,
            object_date: object.object_date,
            medium: object.medium,
            dimensions: object.dimensions,
            culture: object.culture,
            department: object.department,
            classification: object.classification,
            credit_line: object.credit_line,
            repository: object.repository,
            object_url: object.object_url,
            tags,
            source: ARTWORK_SOURCE_MET.to_string(),
            imported_by: None,
            imported_at: None,
        }
    }

    /// Whether the record carries a usable preview image.
    pub fn has_image(&self) -> bool {
        !self.primary_image_small.is_empty() || !self.primary_image.is_empty()
    }
}

/// Raw object payload from `GET /objects/{id}`.
///
/// Every field defaults so partial payloads deserialize; a missing or zero
/// `objectID` marks the payload as unusable (definitive-absent).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetObject {
    #[serde(rename = "objectID", default)]
    pub object_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub primary_image: String,
    #[serde(default)]
    pub primary_image_small: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub artist_display_name: String,
    #[serde(default)]
    pub object_date: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub culture: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub credit_line: String,
    #[serde(default)]
    pub repository: String,
    #[serde(rename = "objectURL", default)]
    pub object_url: String,
    /// Upstream sends tag objects, but older payloads carried plain
    /// strings; normalization accepts both.
    #[serde(default)]
    pub tags: Option<Vec<serde_json::Value>>,
}

/// Response shape for `GET /search` and `GET /objects?departmentIds=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "objectIDs", default)]
    pub object_ids: Option<Vec<u64>>,
}

impl SearchResponse {
    /// A missing or null id list means zero matches, not an error.
    pub fn into_ids(self) -> Vec<u64> {
        self.object_ids.unwrap_or_default()
    }
}

/// Normalize upstream tags: plain strings and objects with a `term` field
/// are accepted, everything else is discarded. Duplicates are dropped
/// while preserving first-seen order.
pub fn normalize_tags(raw: &[serde_json::Value]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for value in raw {
        let term = match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("term")
                .and_then(|t| t.as_str())
                .map(|s| s.to_string()),
            _ => None,
        };
        if let Some(term) = term {
            if !term.is_empty() && !tags.contains(&term) {
                tags.push(term);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_tags_mixed_shapes() {
        let raw = vec![
            json!("abstract"),
            json!({"term": "oil"}),
            json!({"notTerm": "x"}),
            json!(null),
        ];
        assert_eq!(normalize_tags(&raw), vec!["abstract", "oil"]);
    }

    #[test]
    fn test_normalize_tags_deduplicates() {
        let raw = vec![
            json!("portrait"),
            json!({"term": "portrait"}),
            json!({"term": "dutch"}),
        ];
        assert_eq!(normalize_tags(&raw), vec!["portrait", "dutch"]);
    }

    #[test]
    fn test_met_object_deserializes_upstream_shape() {
        let payload = json!({
            "objectID": 436535,
            "title": "Wheat Field with Cypresses",
            "primaryImage": "https://images.metmuseum.org/main.jpg",
            "primaryImageSmall": "https://images.metmuseum.org/small.jpg",
            "artistDisplayName": "Vincent van Gogh",
            "objectDate": "1889",
            "medium": "Oil on canvas",
            "department": "European Paintings",
            "creditLine": "Purchase, 1993",
            "objectURL": "https://www.metmuseum.org/art/collection/search/436535",
            "tags": [{"term": "Landscapes"}, {"term": "Cypresses"}]
        });

        let object: MetObject = serde_json::from_value(payload).unwrap();
        assert_eq!(object.object_id, 436535);
        assert_eq!(object.artist_display_name, "Vincent van Gogh");

        let artwork = Artwork::from_met(object);
        assert_eq!(artwork.tags, vec!["Landscapes", "Cypresses"]);
        assert_eq!(artwork.source, ARTWORK_SOURCE_MET);
        assert!(artwork.has_image());
        assert!(artwork.imported_at.is_none());
    }

    #[test]
    fn test_met_object_without_id_is_unusable() {
        let object: MetObject = serde_json::from_value(json!({"message": "Not a valid object"}))
            .unwrap();
        assert_eq!(object.object_id, 0);
    }

    #[test]
    fn test_search_response_null_ids_is_zero_matches() {
        let response: SearchResponse =
            serde_json::from_value(json!({"total": 0, "objectIDs": null})).unwrap();
        assert!(response.into_ids().is_empty());
    }

    #[test]
    fn test_has_image_falls_back_to_full_size() {
        let mut artwork = Artwork::from_met(MetObject {
            object_id: 1,
            ..Default::default()
        });
        assert!(!artwork.has_image());
        artwork.primary_image = "https://images.metmuseum.org/main.jpg".to_string();
        assert!(artwork.has_image());
    }
}

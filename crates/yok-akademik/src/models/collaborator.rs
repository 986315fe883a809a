//! Collaborator records and the collaborator snapshot document.

use serde::{Deserialize, Deserializer, Serialize};

/// One node of a profile's collaboration graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorRecord {
    /// `authorId` of the collaborator; empty when the profile could not be resolved.
    pub author_id: String,

    /// Name shown on the graph node.
    pub name: String,

    /// Institution / faculty / department text, or a fallback.
    pub info: String,

    /// Remote URL, `data:image` URI, or the default placeholder.
    pub photo_url: String,

    /// Canonical profile URL; empty when unresolvable.
    pub profile_url: String,

    /// Always `"completed"` once recorded.
    pub status: String,
}

impl CollaboratorRecord {
    /// Record status value.
    pub const COMPLETED: &'static str = "completed";

    /// Whether the collaborator's profile could not be resolved.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.profile_url.is_empty()
    }
}

/// Lifecycle status of a collaborator snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    #[default]
    Scraping,
    Completed,
}

impl CollaboratorStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scraping => "scraping",
            Self::Completed => "completed",
        }
    }
}

/// Durable state of one collaborator scan (`collaborators.json`).
///
/// `total_profiles` counts collaborators; the name is part of the file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollaboratorSnapshot {
    pub total_profiles: usize,
    pub status: CollaboratorStatus,
    pub selected_profile: String,
    pub collaborator_profiles: Vec<CollaboratorRecord>,
}

impl CollaboratorSnapshot {
    /// Start an empty snapshot for the given profile URL.
    #[must_use]
    pub fn new(selected_profile: impl Into<String>) -> Self {
        Self {
            total_profiles: 0,
            status: CollaboratorStatus::Scraping,
            selected_profile: selected_profile.into(),
            collaborator_profiles: Vec::new(),
        }
    }

    /// Append a collaborator and keep the count in sync.
    pub fn push(&mut self, collaborator: CollaboratorRecord) {
        self.collaborator_profiles.push(collaborator);
        self.total_profiles = self.collaborator_profiles.len();
    }

    /// Mark the scan as finished.
    pub fn complete(&mut self) {
        self.status = CollaboratorStatus::Completed;
        self.total_profiles = self.collaborator_profiles.len();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collaborator_profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collaborator_profiles.is_empty()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == CollaboratorStatus::Completed
    }

    /// Most recently appended collaborator.
    #[must_use]
    pub fn latest(&self) -> Option<&CollaboratorRecord> {
        self.collaborator_profiles.last()
    }
}

// Older writers stored the bare list; accept both shapes.
impl<'de> Deserialize<'de> for CollaboratorSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Document {
            total_profiles: Option<usize>,
            status: CollaboratorStatus,
            selected_profile: String,
            collaborator_profiles: Vec<CollaboratorRecord>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Document(Document),
            List(Vec<CollaboratorRecord>),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Document(doc) => Self {
                total_profiles: doc.total_profiles.unwrap_or(doc.collaborator_profiles.len()),
                status: doc.status,
                selected_profile: doc.selected_profile,
                collaborator_profiles: doc.collaborator_profiles,
            },
            Shape::List(list) => Self {
                total_profiles: list.len(),
                status: CollaboratorStatus::Scraping,
                selected_profile: String::new(),
                collaborator_profiles: list,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collaborator(name: &str) -> CollaboratorRecord {
        CollaboratorRecord {
            name: name.to_string(),
            status: CollaboratorRecord::COMPLETED.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_push_and_latest() {
        let mut snapshot = CollaboratorSnapshot::new("https://p");
        snapshot.push(collaborator("A"));
        snapshot.push(collaborator("B"));

        assert_eq!(snapshot.total_profiles, 2);
        assert_eq!(snapshot.latest().map(|c| c.name.as_str()), Some("B"));
        assert!(!snapshot.is_completed());
    }

    #[test]
    fn test_document_shape_roundtrip() {
        let mut snapshot = CollaboratorSnapshot::new("https://p");
        snapshot.push(collaborator("A"));
        snapshot.complete();

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""status":"completed""#));
        let decoded: CollaboratorSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_bare_list_is_accepted() {
        let decoded: CollaboratorSnapshot =
            serde_json::from_str(r#"[{"name": "A"}, {"name": "B"}]"#).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.total_profiles, 2);
    }

    #[test]
    fn test_missing_total_defaults_to_list_length() {
        let decoded: CollaboratorSnapshot =
            serde_json::from_str(r#"{"collaborator_profiles": [{"name": "A"}]}"#).unwrap();
        assert_eq!(decoded.total_profiles, 1);
        assert_eq!(decoded.status, CollaboratorStatus::Scraping);
    }
}

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mood attached to a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Calm,
    Neutral,
    Anxious,
    Sad,
}

impl Default for Mood {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Opaque handle to artifact bytes held by the artifact vault.
///
/// Deserialized references must be well-formed (see
/// [`ArtifactRef::is_well_formed`]); a stored record carrying anything else
/// fails to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Longest accepted reference.
    pub const MAX_LEN: usize = 64;

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, at most [`Self::MAX_LEN`] characters, only ASCII
    /// alphanumerics, `-` and `_`. Such a reference is safe to use as a file
    /// name.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl TryFrom<String> for ArtifactRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let artifact_ref = Self(value);
        if artifact_ref.is_well_formed() {
            Ok(artifact_ref)
        } else {
            Err(format!("malformed artifact reference {:?}", artifact_ref.0))
        }
    }
}

impl From<ArtifactRef> for String {
    fn from(value: ArtifactRef) -> Self {
        value.0
    }
}

impl From<&str> for ArtifactRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted voice-journal record.
///
/// The entry exclusively owns `artifact_ref`; removing the entry discards the
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceEntry {
    pub id: String,
    pub title: String,
    pub artifact_ref: ArtifactRef,
    #[serde(default)]
    pub transcript: String,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub insights: String,
}

/// Fields supplied when creating an entry; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub artifact_ref: ArtifactRef,
    pub transcript: String,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
    pub mood: Mood,
    pub tags: BTreeSet<String>,
    pub insights: String,
}

impl NewEntry {
    pub fn into_entry(self, id: String) -> VoiceEntry {
        VoiceEntry {
            id,
            title: self.title,
            artifact_ref: self.artifact_ref,
            transcript: self.transcript,
            duration_secs: self.duration_secs,
            timestamp: self.timestamp,
            mood: self.mood,
            tags: self.tags,
            favorite: false,
            insights: self.insights,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteChange {
    Set(bool),
    Toggle,
}

/// Partial update applied by `EntryStore::update`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub transcript: Option<String>,
    pub mood: Option<Mood>,
    pub tags: Option<BTreeSet<String>>,
    pub insights: Option<String>,
    pub favorite: Option<FavoriteChange>,
}

impl EntryPatch {
    pub fn toggle_favorite() -> Self {
        Self {
            favorite: Some(FavoriteChange::Toggle),
            ..Default::default()
        }
    }

    pub fn apply(&self, entry: &mut VoiceEntry) {
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(transcript) = &self.transcript {
            entry.transcript = transcript.clone();
        }
        if let Some(mood) = self.mood {
            entry.mood = mood;
        }
        if let Some(tags) = &self.tags {
            entry.tags = tags.clone();
        }
        if let Some(insights) = &self.insights {
            entry.insights = insights.clone();
        }
        match self.favorite {
            Some(FavoriteChange::Set(value)) => entry.favorite = value,
            Some(FavoriteChange::Toggle) => entry.favorite = !entry.favorite,
            None => {}
        }
    }
}

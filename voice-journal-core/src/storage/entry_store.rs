use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::models::entry::{EntryPatch, NewEntry, VoiceEntry};
use crate::models::error::{JournalError, PersistenceError};
use crate::storage::artifact_vault::ArtifactVault;
use crate::traits::persisted_store::PersistedStore;

struct StoreInner {
    entries: Vec<VoiceEntry>,
    skipped_records: usize,
}

/// Persists voice-journal entries under one key of a `PersistedStore`.
///
/// The entry list is held in memory and written through on every change.
/// The stored value is a JSON array of entry objects; loading skips records
/// that fail to parse instead of failing the whole list.
pub struct EntryStore {
    store: Arc<dyn PersistedStore>,
    vault: Arc<ArtifactVault>,
    key: String,
    inner: Mutex<StoreInner>,
}

impl EntryStore {
    /// Load the entry list stored under `key`.
    ///
    /// Artifact references of loaded entries are adopted by the vault when
    /// their bytes are still available.
    pub fn open(
        store: Arc<dyn PersistedStore>,
        vault: Arc<ArtifactVault>,
        key: impl Into<String>,
    ) -> Result<Self, JournalError> {
        let key = key.into();
        let (entries, skipped_records) = match store.get(&key)? {
            Some(raw) => parse_entries(&raw)?,
            None => (Vec::new(), 0),
        };

        for entry in &entries {
            if !vault.is_live(&entry.artifact_ref) && !vault.adopt(&entry.artifact_ref) {
                log::debug!("Entry {} has no playable artifact", entry.id);
            }
        }

        log::info!(
            "Loaded {} voice entries ({} corrupt records skipped)",
            entries.len(),
            skipped_records
        );

        Ok(Self {
            store,
            vault,
            key,
            inner: Mutex::new(StoreInner {
                entries,
                skipped_records,
            }),
        })
    }

    pub fn create(&self, new_entry: NewEntry) -> Result<VoiceEntry, JournalError> {
        let entry = new_entry.into_entry(uuid::Uuid::new_v4().to_string());
        let mut inner = self.inner.lock();
        inner.entries.push(entry.clone());
        if let Err(e) = self.persist(&inner.entries) {
            inner.entries.pop();
            return Err(e);
        }
        log::info!("Created voice entry {}", entry.id);
        Ok(entry)
    }

    /// Entries matching `predicate`, newest first.
    pub fn list<F>(&self, predicate: F) -> Vec<VoiceEntry>
    where
        F: Fn(&VoiceEntry) -> bool,
    {
        let mut matching: Vec<VoiceEntry> = self
            .inner
            .lock()
            .entries
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching
    }

    pub fn get(&self, id: &str) -> Option<VoiceEntry> {
        self.inner.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn update(&self, id: &str, patch: &EntryPatch) -> Result<VoiceEntry, JournalError> {
        let mut inner = self.inner.lock();
        let index = position(&inner.entries, id)?;

        let previous = inner.entries[index].clone();
        patch.apply(&mut inner.entries[index]);
        if let Err(e) = self.persist(&inner.entries) {
            inner.entries[index] = previous;
            return Err(e);
        }
        Ok(inner.entries[index].clone())
    }

    /// Delete an entry and discard its artifact before returning.
    pub fn remove(&self, id: &str) -> Result<VoiceEntry, JournalError> {
        let mut inner = self.inner.lock();
        let index = position(&inner.entries, id)?;

        let entry = inner.entries.remove(index);
        if let Err(e) = self.persist(&inner.entries) {
            inner.entries.insert(index, entry);
            return Err(e);
        }
        drop(inner);

        self.vault.discard(&entry.artifact_ref);
        log::info!("Removed voice entry {}", entry.id);
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records dropped as corrupt when the list was loaded.
    pub fn skipped_records(&self) -> usize {
        self.inner.lock().skipped_records
    }

    fn persist(&self, entries: &[VoiceEntry]) -> Result<(), JournalError> {
        let json = serde_json::to_string(entries).map_err(|e| {
            PersistenceError::WriteFailure(format!("failed to serialize entries: {}", e))
        })?;
        self.store.set(&self.key, &json)?;
        Ok(())
    }
}

fn position(entries: &[VoiceEntry], id: &str) -> Result<usize, JournalError> {
    entries
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| JournalError::NotFound(id.to_string()))
}

/// Parse a stored entry list, skipping records that do not deserialize.
fn parse_entries(raw: &str) -> Result<(Vec<VoiceEntry>, usize), PersistenceError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        PersistenceError::CorruptRecord(format!("entry list is not valid JSON: {}", e))
    })?;
    let Value::Array(records) = value else {
        return Err(PersistenceError::CorruptRecord("entry list is not an array".into()));
    };

    let mut entries = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<VoiceEntry>(record) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                log::warn!("Skipping corrupt voice entry record {}: {}", index, e);
                skipped += 1;
            }
        }
    }
    Ok((entries, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::models::artifact::AudioArtifact;
    use crate::models::audio_models::EncodingDescriptor;
    use crate::models::entry::{FavoriteChange, Mood};
    use crate::storage::persisted::MemoryStore;

    const KEY: &str = "voice-journal-entries";

    fn setup() -> (Arc<MemoryStore>, Arc<ArtifactVault>, EntryStore) {
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(ArtifactVault::in_memory());
        let entries = EntryStore::open(store.clone(), vault.clone(), KEY).unwrap();
        (store, vault, entries)
    }

    fn new_entry(vault: &ArtifactVault, title: &str, timestamp: DateTime<Utc>) -> NewEntry {
        let encoding = EncodingDescriptor::new("audio/webm");
        let artifact = AudioArtifact::new(vec![1, 2, 3], encoding, 3.0, timestamp);
        NewEntry {
            title: title.to_string(),
            artifact_ref: vault.store(artifact).unwrap(),
            transcript: "I felt calm".into(),
            duration_secs: 3.0,
            timestamp,
            mood: Mood::Calm,
            tags: BTreeSet::from(["health".to_string()]),
            insights: String::new(),
        }
    }

    #[test]
    fn create_and_reload_preserves_timestamp() {
        let (store, vault, entries) = setup();
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let created = entries.create(new_entry(&vault, "Morning", ts)).unwrap();

        let reopened = EntryStore::open(store, vault, KEY).unwrap();
        let loaded = reopened.get(&created.id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.timestamp, ts);
    }

    #[test]
    fn list_is_newest_first_and_filtered() {
        let (_store, vault, entries) = setup();
        let base = Utc::now();
        entries.create(new_entry(&vault, "old", base - Duration::days(2))).unwrap();
        let newest = entries.create(new_entry(&vault, "new", base)).unwrap();
        entries.create(new_entry(&vault, "mid", base - Duration::days(1))).unwrap();

        let titles: Vec<String> = entries.list(|_| true).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);

        entries.update(&newest.id, &EntryPatch::toggle_favorite()).unwrap();
        let favorites = entries.list(|e| e.favorite);
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, newest.id);
    }

    #[test]
    fn favorite_toggle_flips_and_persists() {
        let (store, vault, entries) = setup();
        let entry = entries.create(new_entry(&vault, "t", Utc::now())).unwrap();
        assert!(!entry.favorite);

        assert!(entries.update(&entry.id, &EntryPatch::toggle_favorite()).unwrap().favorite);
        assert!(!entries.update(&entry.id, &EntryPatch::toggle_favorite()).unwrap().favorite);

        let set = EntryPatch {
            favorite: Some(FavoriteChange::Set(true)),
            title: Some("renamed".into()),
            ..Default::default()
        };
        entries.update(&entry.id, &set).unwrap();

        let reopened = EntryStore::open(store, vault, KEY).unwrap();
        let loaded = reopened.get(&entry.id).unwrap();
        assert!(loaded.favorite);
        assert_eq!(loaded.title, "renamed");
    }

    #[test]
    fn remove_discards_artifact() {
        let (_store, vault, entries) = setup();
        let entry = entries.create(new_entry(&vault, "t", Utc::now())).unwrap();
        vault.materialize(&entry.artifact_ref).unwrap();

        entries.remove(&entry.id).unwrap();
        assert!(!vault.is_live(&entry.artifact_ref));
        assert_eq!(vault.transient_count(), 0);
        assert!(entries.is_empty());
        assert!(matches!(entries.remove(&entry.id), Err(JournalError::NotFound(_))));
    }

    #[test]
    fn create_delete_cycles_leave_no_live_references() {
        let (_store, vault, entries) = setup();
        for i in 0..25 {
            let entry = entries.create(new_entry(&vault, &format!("e{}", i), Utc::now())).unwrap();
            if i % 3 == 0 {
                vault.materialize(&entry.artifact_ref).unwrap();
            }
            entries.remove(&entry.id).unwrap();
        }
        assert_eq!(vault.live_count(), 0);
        assert_eq!(vault.released_total(), 25);
    }

    #[test]
    fn corrupt_records_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(ArtifactVault::in_memory());
        store.insert_raw(
            KEY,
            r#"[
                {"id":"a","title":"ok","artifactRef":"r1","durationSecs":2.0,"timestamp":"2026-01-02T03:04:05Z","mood":"happy"},
                {"id":"b","title":"bad timestamp","artifactRef":"r2","durationSecs":1.0,"timestamp":"yesterday"},
                42,
                {"id":"c","title":"bad mood","artifactRef":"r3","durationSecs":1.0,"timestamp":"2026-01-02T03:04:05Z","mood":"furious"},
                {"id":"d","title":"minimal","artifactRef":"r4","durationSecs":1.5,"timestamp":"2026-01-03T00:00:00Z"}
            ]"#,
        );

        let entries = EntryStore::open(store, vault, KEY).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.skipped_records(), 3);

        let minimal = entries.get("d").unwrap();
        assert_eq!(minimal.mood, Mood::Neutral);
        assert!(minimal.tags.is_empty());
        assert_eq!(entries.get("a").unwrap().mood, Mood::Happy);
    }

    #[test]
    fn path_like_artifact_ref_is_a_corrupt_record() {
        let root =
            std::env::temp_dir().join(format!("voice_journal_entries_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let outside = root.join("outside.vja");
        std::fs::write(&outside, b"not ours").unwrap();

        let store = Arc::new(MemoryStore::new());
        let record = serde_json::json!([{
            "id": "x",
            "title": "escapes",
            "artifactRef": root.join("outside").to_str().unwrap(),
            "durationSecs": 1.0,
            "timestamp": "2026-01-02T03:04:05Z"
        }, {
            "id": "y",
            "title": "climbs",
            "artifactRef": "../outside",
            "durationSecs": 1.0,
            "timestamp": "2026-01-02T03:04:05Z"
        }]);
        store.insert_raw(KEY, &record.to_string());

        let vault = Arc::new(ArtifactVault::in_directory(root.join("vault"), None).unwrap());
        let entries = EntryStore::open(store, vault.clone(), KEY).unwrap();
        assert!(entries.is_empty());
        assert_eq!(entries.skipped_records(), 2);
        assert_eq!(vault.live_count(), 0);
        assert!(matches!(entries.remove("x"), Err(JournalError::NotFound(_))));
        assert!(outside.exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn non_array_root_is_corrupt() {
        let store = Arc::new(MemoryStore::new());
        store.insert_raw(KEY, r#"{"entries": []}"#);
        let err = EntryStore::open(store, Arc::new(ArtifactVault::in_memory()), KEY)
            .err()
            .unwrap();
        assert!(matches!(err, JournalError::Persistence(PersistenceError::CorruptRecord(_))));
    }

    #[test]
    fn failed_write_rolls_back() {
        let (store, vault, entries) = setup();
        let entry = entries.create(new_entry(&vault, "keep", Utc::now())).unwrap();

        store.set_fail_writes(true);
        let err = entries.create(new_entry(&vault, "lost", Utc::now())).unwrap_err();
        assert!(matches!(err, JournalError::Persistence(PersistenceError::WriteFailure(_))));
        assert_eq!(entries.len(), 1);

        assert!(entries.update(&entry.id, &EntryPatch::toggle_favorite()).is_err());
        assert!(!entries.get(&entry.id).unwrap().favorite);

        assert!(entries.remove(&entry.id).is_err());
        assert_eq!(entries.len(), 1);
        assert!(vault.is_live(&entry.artifact_ref));
    }
}

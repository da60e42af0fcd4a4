use crate::models::error::PersistenceError;

/// Generic key-value persistence consumed by the entry store.
///
/// Failures are returned, never panicked.
pub trait PersistedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

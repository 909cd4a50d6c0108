//! Process-scoped history of submitted inputs.

use std::sync::RwLock;

use thiserror::Error;

/// One submitted input.
///
/// `input` is the fully normalized logical command (continuation markers
/// stripped, lines joined). `id` is assigned later, once the remote
/// acknowledgement for the input arrives; until then it is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Remote identifier, populated by a late acknowledgement.
    pub id: Option<String>,
    /// Normalized logical command.
    pub input: String,
}

/// History error.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History is empty")]
    Empty,
}

/// Append-only log of submitted inputs, shared for the process lifetime.
///
/// Owned by the top-level session and injected by reference into every
/// prompt instance, so recall survives prompt open/close cycles. Entries
/// are immutable once appended except for the single late `id` assignment.
/// Never persisted across process restarts.
pub struct HistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an input; returns its position.
    pub fn append<S: Into<String>>(&self, input: S) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(HistoryEntry {
            id: None,
            input: input.into(),
        });
        entries.len() - 1
    }

    /// The most recently appended entry.
    #[must_use]
    pub fn last(&self) -> Option<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Entry input at a 0-based position, or the empty-string sentinel
    /// when out of bounds.
    #[must_use]
    pub fn at(&self, index: usize) -> String {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)
            .map(|e| e.input.clone())
            .unwrap_or_default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign the remote id to the most recent entry.
    ///
    /// This is the only mutation an entry ever sees after creation.
    ///
    /// # Errors
    /// Returns [`HistoryError::Empty`] when nothing has been appended yet.
    pub fn set_last_id<S: Into<String>>(&self, id: S) -> Result<(), HistoryError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.last_mut().ok_or(HistoryError::Empty)?;
        entry.id = Some(id.into());
        Ok(())
    }

    /// Clone of all entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let store = HistoryStore::new();
        assert_eq!(store.append("echo one"), 0);
        assert_eq!(store.append("echo two"), 1);
        assert_eq!(store.at(0), "echo one");
        assert_eq!(store.at(1), "echo two");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn no_deduplication() {
        let store = HistoryStore::new();
        store.append("ls");
        store.append("ls");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn at_out_of_bounds_is_empty_sentinel() {
        let store = HistoryStore::new();
        assert_eq!(store.at(0), "");
        store.append("pwd");
        assert_eq!(store.at(5), "");
    }

    #[test]
    fn last_on_empty_is_none() {
        let store = HistoryStore::new();
        assert!(store.last().is_none());
    }

    #[test]
    fn set_last_id_late_assignment() {
        let store = HistoryStore::new();
        store.append("echo hi");
        assert_eq!(store.last().unwrap().id, None);
        store.set_last_id("42").unwrap();
        assert_eq!(store.last().unwrap().id.as_deref(), Some("42"));
    }

    #[test]
    fn set_last_id_on_empty_fails() {
        let store = HistoryStore::new();
        assert!(matches!(store.set_last_id("42"), Err(HistoryError::Empty)));
    }
}

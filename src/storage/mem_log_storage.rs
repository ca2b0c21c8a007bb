use std::collections::BTreeMap;

use anyerror::AnyError;

use crate::storage::ErrorSubject;
use crate::storage::ErrorVerb;
use crate::storage::HardState;
use crate::storage::LogState;
use crate::storage::RaftLogStorage;
use crate::storage::StorageError;
use crate::Entry;
use crate::LogIdOptionExt;

/// A [`RaftLogStorage`] that keeps everything in memory.
///
/// It is meant for tests and for embedding partitions whose durability is provided elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemLogStorage {
    log: BTreeMap<u64, Entry>,
    hard_state: HardState,
    committed: u64,
}

impl MemLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw parts without any check, e.g., to simulate a damaged log.
    pub fn from_parts(entries: impl IntoIterator<Item = Entry>, hard_state: HardState, committed: u64) -> Self {
        Self {
            log: entries.into_iter().map(|e| (e.index(), e)).collect(),
            hard_state,
            committed,
        }
    }

    /// All entries currently stored, in index order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.log.values()
    }
}

impl RaftLogStorage for MemLogStorage {
    fn log_state(&mut self) -> Result<LogState, StorageError> {
        let last_log_id = self.log.values().next_back().map(|e| e.log_id);
        Ok(LogState { last_log_id })
    }

    fn read_entry(&mut self, index: u64) -> Result<Option<Entry>, StorageError> {
        Ok(self.log.get(&index).cloned())
    }

    fn append(&mut self, entries: Vec<Entry>) -> Result<(), StorageError> {
        let mut next = self.log.values().next_back().map(|e| e.log_id).next_index();

        for ent in entries {
            if ent.index() != next {
                return Err(StorageError::new(
                    ErrorSubject::Log(ent.index()),
                    ErrorVerb::Write,
                    AnyError::error(format!("expect to append at index {}", next)),
                ));
            }
            next += 1;
            self.log.insert(ent.index(), ent);
        }

        Ok(())
    }

    fn truncate_from(&mut self, index: u64) -> Result<(), StorageError> {
        let _ = self.log.split_off(&index);
        Ok(())
    }

    fn save_hard_state(&mut self, hard_state: &HardState) -> Result<(), StorageError> {
        self.hard_state = *hard_state;
        Ok(())
    }

    fn read_hard_state(&mut self) -> Result<HardState, StorageError> {
        Ok(self.hard_state)
    }

    fn save_committed(&mut self, committed: u64) -> Result<(), StorageError> {
        self.committed = committed;
        Ok(())
    }

    fn read_committed(&mut self) -> Result<u64, StorageError> {
        Ok(self.committed)
    }
}

//! The log persistence boundary of a partition.
//!
//! A partition persists three things: the log entries, the [`HardState`] and the committed
//! index. [`RaftLogStorage`] is a synchronous contract: when a method returns `Ok`, the data must
//! be durable.

mod helper;
mod mem_log_storage;
mod storage_error;

#[cfg(test)] mod mem_log_storage_test;

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

pub(crate) use helper::StorageHelper;
pub use mem_log_storage::MemLogStorage;
pub use storage_error::ErrorSubject;
pub use storage_error::ErrorVerb;
pub use storage_error::StorageError;

use crate::display_ext::DisplayOptionExt;
use crate::Entry;
use crate::LogId;
use crate::NodeId;

/// The term and vote that must survive a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct HardState {
    pub term: u64,
    pub voted_for: Option<NodeId>,
}

impl Display for HardState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{term: {}, voted_for: {}}}", self.term, self.voted_for.display())
    }
}

/// Summary of the stored log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogState {
    /// The id of the last entry, `None` if the log is empty.
    pub last_log_id: Option<LogId>,
}

/// Append-only, index addressed log store with a tail truncation.
///
/// Indexes start at 1 and have no gap.
pub trait RaftLogStorage {
    fn log_state(&mut self) -> Result<LogState, StorageError>;

    /// Read the entry at `index`, or `None` if there is no such entry.
    fn read_entry(&mut self, index: u64) -> Result<Option<Entry>, StorageError>;

    /// Append entries right after the last one.
    fn append(&mut self, entries: Vec<Entry>) -> Result<(), StorageError>;

    /// Remove every entry at or after `index`.
    fn truncate_from(&mut self, index: u64) -> Result<(), StorageError>;

    fn save_hard_state(&mut self, hard_state: &HardState) -> Result<(), StorageError>;

    fn read_hard_state(&mut self) -> Result<HardState, StorageError>;

    fn save_committed(&mut self, committed: u64) -> Result<(), StorageError>;

    fn read_committed(&mut self) -> Result<u64, StorageError>;

    /// Read the id of an entry that must exist.
    ///
    /// A missing entry or one with a mismatching index means the log is damaged.
    fn read_log_id(&mut self, index: u64) -> Result<LogId, StorageError> {
        let ent = self.read_entry(index)?;
        match ent {
            Some(e) if e.index() == index => Ok(e.log_id),
            Some(e) => Err(StorageError::corrupt(index, format!("found entry {}", e.log_id))),
            None => Err(StorageError::corrupt(index, "entry not found")),
        }
    }

    /// Read the entries in `[start, end)`, all of which must exist.
    fn read_entries(&mut self, start: u64, end: u64) -> Result<Vec<Entry>, StorageError> {
        let mut res = Vec::with_capacity(end.saturating_sub(start) as usize);

        for index in start..end {
            let ent = self.read_entry(index)?;
            match ent {
                Some(e) if e.index() == index => res.push(e),
                Some(e) => return Err(StorageError::corrupt(index, format!("found entry {}", e.log_id))),
                None => return Err(StorageError::corrupt(index, "entry not found")),
            }
        }

        Ok(res)
    }
}

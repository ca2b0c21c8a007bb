use crate::error::Fatal;
use crate::Clock;
use crate::Entry;
use crate::Raft;
use crate::RaftLogStorage;
use crate::RaftNetwork;

/// Reads the committed entries of a partition in order, without gaps.
///
/// The position is kept by the reader, so a cursor can be created at any committed index to
/// replay the log from there, e.g., after the reader restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedCursor {
    next_index: u64,
}

impl CommittedCursor {
    /// A cursor whose first entry is at `from`. Indexes start at 1.
    pub fn new(from: u64) -> Self {
        Self {
            next_index: from.max(1),
        }
    }

    /// The index of the next entry to read.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Read at most `max` committed entries after the last one read.
    ///
    /// Returns an empty `Vec` if no new entry is committed.
    pub fn next_batch<S, N, K>(&mut self, raft: &mut Raft<S, N, K>, max: u64) -> Result<Vec<Entry>, Fatal>
    where
        S: RaftLogStorage,
        N: RaftNetwork,
        K: Clock,
    {
        let entries = raft.committed_entries(self.next_index, max)?;

        if let Some(last) = entries.last() {
            self.next_index = last.index() + 1;
        }

        Ok(entries)
    }
}

impl Default for CommittedCursor {
    fn default() -> Self {
        Self::new(1)
    }
}

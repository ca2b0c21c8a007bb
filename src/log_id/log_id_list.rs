use std::ops::RangeInclusive;

use crate::log_id::LogId;
use crate::storage::RaftLogStorage;
use crate::StorageError;

/// Compact in-memory index of the terms of every entry in the local log.
///
/// It stores only the ids of the entries that start a new term, plus the last log id at the end.
/// The term of any entry can be found with a binary search, without reading the log.
///
/// E.g., the log `[(1,1),(1,2),(3,3),(3,4),(3,5)]` is stored as `[(1,1),(3,3),(3,5)]`.
#[derive(Default, Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct LogIdList {
    key_log_ids: Vec<LogId>,
}

impl LogIdList {
    pub(crate) fn new(key_log_ids: impl IntoIterator<Item = LogId>) -> Self {
        Self {
            key_log_ids: key_log_ids.into_iter().collect(),
        }
    }

    /// Build the list from the log in `sto`, whose last entry is `last`.
    pub(crate) fn load<S>(sto: &mut S, last: Option<LogId>) -> Result<Self, StorageError>
    where S: RaftLogStorage + ?Sized {
        let Some(last) = last else {
            return Ok(Self::default());
        };

        let first = sto.read_log_id(1)?;
        let key_log_ids = Self::get_key_log_ids(first..=last, sto)?;

        Ok(Self::new(key_log_ids))
    }

    /// Find the first log id of every term in `range`, and the last one.
    ///
    /// It uses a modified binary search that reads only `O(terms * log(n))` entries:
    ///
    /// ```text
    /// A---------------A : push_res(A);
    /// A-------A-------C : push_res(A); find(A,C) // both find `A`, need to de-dup
    /// A-------B-------C : find(A,B); find(B,C)   // both find `B`, need to de-dup
    /// A-------C-------C : find(A,C)
    /// ```
    pub(crate) fn get_key_log_ids<S>(range: RangeInclusive<LogId>, sto: &mut S) -> Result<Vec<LogId>, StorageError>
    where S: RaftLogStorage + ?Sized {
        let first = *range.start();
        let last = *range.end();

        let mut res: Vec<LogId> = vec![];

        let mut stack = vec![(first, last)];

        while let Some((first, last)) = stack.pop() {
            // Case AA
            if first.term == last.term {
                if res.last().map(|x| x.term) < Some(first.term) {
                    res.push(first);
                }
                continue;
            }

            // Adjacent entries with different terms.
            if first.index + 1 == last.index {
                if res.last().map(|x| x.term) < Some(first.term) {
                    res.push(first);
                }
                res.push(last);
                continue;
            }

            let mid = sto.read_log_id((first.index + last.index) / 2)?;

            if first.term == mid.term {
                // Case AAC
                if res.last().map(|x| x.term) < Some(first.term) {
                    res.push(first);
                }
                stack.push((mid, last));
            } else if mid.term == last.term {
                // Case ACC
                stack.push((first, mid));
            } else {
                // Case ABC
                stack.push((mid, last));
                stack.push((first, mid));
            }
        }

        if res.last() != Some(&last) {
            res.push(last);
        }

        Ok(res)
    }

    /// Append a new log id.
    ///
    /// The last two key log ids may share one term, since the last log id is always present.
    pub(crate) fn append(&mut self, new_log_id: LogId) {
        let l = self.key_log_ids.len();
        if l == 0 {
            self.key_log_ids.push(new_log_id);
            return;
        }

        debug_assert!(
            new_log_id > self.key_log_ids[l - 1],
            "new_log_id: {}, last: {}",
            new_log_id,
            self.key_log_ids[l - 1]
        );

        if l == 1 {
            self.key_log_ids.push(new_log_id);
            return;
        }

        let last = &self.key_log_ids[l - 1];

        if self.key_log_ids[l - 2].term == last.term {
            // The last one is only a marker of the last log id. Replace it.
            self.key_log_ids[l - 1] = new_log_id;
            return;
        }

        self.key_log_ids.push(new_log_id);
    }

    /// Append the ids of consecutive entries.
    pub(crate) fn extend(&mut self, new_ids: impl IntoIterator<Item = LogId>) {
        for log_id in new_ids {
            self.append(log_id);
        }
    }

    /// Delete log ids from index `at`, inclusive.
    pub(crate) fn truncate(&mut self, at: u64) {
        let res = self.key_log_ids.binary_search_by(|log_id| log_id.index.cmp(&at));

        let i = match res {
            Ok(i) => i,
            Err(i) => {
                if i == self.key_log_ids.len() {
                    return;
                }
                i
            }
        };

        self.key_log_ids.truncate(i);

        // Add a key log id if there is a gap between last.index and at - 1.
        if let Some(last) = self.key_log_ids.last().copied() {
            if last.index < at - 1 {
                self.append(LogId::new(last.term, at - 1));
            }
        }
    }

    /// Get the log id at `index`, or `None` if it is not in the log.
    pub(crate) fn get(&self, index: u64) -> Option<LogId> {
        let res = self.key_log_ids.binary_search_by(|log_id| log_id.index.cmp(&index));

        match res {
            Ok(i) => Some(self.key_log_ids[i]),
            Err(i) => {
                if i == 0 || i == self.key_log_ids.len() {
                    None
                } else {
                    Some(LogId::new(self.key_log_ids[i - 1].term, index))
                }
            }
        }
    }

    /// Returns the index of the first entry that has the same term as the entry at `index`.
    ///
    /// A follower reports it as the conflict index, so that the leader skips the whole term.
    pub(crate) fn first_index_of_term_at(&self, index: u64) -> Option<u64> {
        let log_id = self.get(index)?;
        let first = self.key_log_ids.iter().find(|x| x.term == log_id.term)?;
        Some(first.index)
    }

    pub(crate) fn last(&self) -> Option<&LogId> {
        self.key_log_ids.last()
    }

    #[cfg(test)]
    pub(crate) fn key_log_ids(&self) -> &[LogId] {
        &self.key_log_ids
    }
}

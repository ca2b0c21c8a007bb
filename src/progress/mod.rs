//! Progress tracks replication state, i.e., it can be considered a map of member id to the log id
//! already replicated to it.
//!
//! The replicated value of every member is monotonically incremental. Decreasing it is not
//! allowed. Calculating the quorum-accepted value is optimized on this assumption.

pub(crate) mod entry;
mod id_val;
mod inflight;

#[cfg(test)] mod vec_progress_test;

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::slice::Iter;

pub(crate) use entry::ProgressEntry;
pub(crate) use id_val::IdVal;
pub(crate) use inflight::Inflight;

use crate::quorum::QuorumSet;
use crate::LogId;
use crate::NodeId;

/// Track the replication progress of several members, and calculate the greatest log id that is
/// accepted by a quorum of voters.
///
/// Voters are kept at the front of the vector, the members being caught up (not yet voters) at
/// the end. Voters whose matching log id is greater than the quorum-accepted one are kept sorted
/// in descending order, the others are unsorted.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub(crate) struct VecProgress<QS>
where QS: QuorumSet
{
    /// Quorum set to determine if a set of ids constitutes a quorum.
    quorum_set: QS,

    /// The max log id that is accepted by a quorum.
    quorum_accepted: Option<LogId>,

    /// Number of voters.
    voter_count: usize,

    entries: Vec<IdVal<ProgressEntry>>,
}

impl<QS> Display for VecProgress<QS>
where QS: QuorumSet
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, item) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?
        }
        write!(f, "}}")?;

        Ok(())
    }
}

impl<QS> VecProgress<QS>
where QS: QuorumSet
{
    pub(crate) fn new(
        quorum_set: QS,
        learner_ids: impl IntoIterator<Item = NodeId>,
        default_v: impl Fn() -> ProgressEntry,
    ) -> Self {
        let mut entries = quorum_set.ids().map(|id| IdVal::new(id, default_v())).collect::<Vec<_>>();

        let voter_count = entries.len();

        entries.extend(learner_ids.into_iter().map(|id| IdVal::new(id, default_v())));

        Self {
            quorum_set,
            quorum_accepted: None,
            voter_count,
            entries,
        }
    }

    /// Find the position of the specified id.
    #[inline(always)]
    fn index(&self, target: &NodeId) -> Option<usize> {
        self.entries.iter().position(|item| &item.id == target)
    }

    /// Move an element at `index` up so that all the values greater than `quorum_accepted` are
    /// sorted.
    #[inline(always)]
    fn move_up(&mut self, index: usize) -> usize {
        for i in (0..index).rev() {
            if self.entries[i].val.matching < self.entries[i + 1].val.matching {
                self.entries.swap(i, i + 1);
            } else {
                return i + 1;
            }
        }

        0
    }

    /// Update the entry of `id` with `f`, then re-calculate the quorum-accepted log id.
    ///
    /// It returns `Err` with the current quorum-accepted value if `id` is not tracked.
    ///
    /// Only when the **previous value** is less than or equal to the quorum-accepted one, and the
    /// **new value** is greater than it, the quorum-accepted value possibly changes:
    ///
    /// ```text
    /// a -----------+-------->
    /// b -------+------------>
    /// c ---+---------------->
    /// ------------------------------
    ///      1   3   5
    /// ```
    ///
    /// With a majority quorum of `a,b,c`, the quorum-accepted is `3`. Then:
    /// - update(a, 6): nothing to do: quorum-accepted is still 3;
    /// - update(b, 4): re-calc:       quorum-accepted becomes 4;
    /// - update(c, 2): nothing to do: quorum-accepted is still 3;
    pub(crate) fn update_with<F>(&mut self, id: &NodeId, f: F) -> Result<Option<LogId>, Option<LogId>>
    where F: FnOnce(&mut ProgressEntry) {
        let Some(index) = self.index(id) else {
            return Err(self.quorum_accepted);
        };

        let ent = &mut self.entries[index];
        let prev = ent.val.matching;

        f(&mut ent.val);

        let new = ent.val.matching;

        debug_assert!(new >= prev, "matching must not revert: {:?} -> {:?}", prev, new);

        if prev == new {
            return Ok(self.quorum_accepted);
        }

        // A member that is not a voter does not grant a value.
        if index >= self.voter_count {
            return Ok(self.quorum_accepted);
        }

        if prev <= self.quorum_accepted && new > self.quorum_accepted {
            let new_index = self.move_up(index);

            // From high to low, find the max value that constitutes a quorum.
            for i in new_index..self.voter_count {
                let prog = self.entries[i].val.matching;

                if prog <= self.quorum_accepted {
                    break;
                }

                let it = self.entries[0..=i].iter().map(|item| &item.id);

                if self.quorum_set.is_quorum(it) {
                    self.quorum_accepted = prog;
                    break;
                }
            }
        }

        Ok(self.quorum_accepted)
    }

    pub(crate) fn get(&self, id: &NodeId) -> Option<&ProgressEntry> {
        let index = self.index(id)?;
        Some(&self.entries[index].val)
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut ProgressEntry> {
        let index = self.index(id)?;
        Some(&mut self.entries[index].val)
    }

    pub(crate) fn quorum_accepted(&self) -> Option<LogId> {
        self.quorum_accepted
    }

    pub(crate) fn iter(&self) -> Iter<'_, IdVal<ProgressEntry>> {
        self.entries.as_slice().iter()
    }

    #[cfg(test)]
    pub(crate) fn is_voter(&self, id: &NodeId) -> Option<bool> {
        let index = self.index(id)?;
        Some(index < self.voter_count)
    }

    /// Build a new progress with another quorum set, keeping the replication state of members
    /// present in both.
    pub(crate) fn upgrade_quorum_set(
        self,
        quorum_set: QS,
        learner_ids: impl IntoIterator<Item = NodeId>,
        default_v: impl Fn() -> ProgressEntry,
    ) -> Self {
        let mut new_prog = Self::new(quorum_set, learner_ids, default_v);

        for item in self.entries.into_iter() {
            let _ = new_prog.update_with(&item.id, |v| *v = item.val);
        }
        new_prog
    }
}

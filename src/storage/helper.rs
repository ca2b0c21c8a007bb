use crate::display_ext::DisplayOptionExt;
use crate::engine::raft_state::RaftState;
use crate::log_id::LogIdList;
use crate::membership::MembershipRegistry;
use crate::storage::RaftLogStorage;
use crate::term::TermState;
use crate::LogId;
use crate::LogIdOptionExt;
use crate::StorageError;

/// The number of entries read at a time when scanning the log.
const READ_BATCH: u64 = 1024;

/// StorageHelper provides additional methods to access a [`RaftLogStorage`] implementation.
pub(crate) struct StorageHelper<'a, S>
where S: RaftLogStorage
{
    pub(crate) sto: &'a mut S,
}

impl<'a, S> StorageHelper<'a, S>
where S: RaftLogStorage
{
    pub(crate) fn new(sto: &'a mut S) -> Self {
        Self { sto }
    }

    /// Rebuild the consensus state from what is persisted.
    pub(crate) fn get_initial_state(&mut self) -> Result<RaftState, StorageError> {
        let hard_state = self.sto.read_hard_state()?;
        let committed = self.sto.read_committed()?;
        let last_log_id = self.sto.log_state()?.last_log_id;

        tracing::info!(
            hard_state = display(&hard_state),
            committed = display(committed),
            last_log_id = display(last_log_id.display()),
            "get_initial_state"
        );

        if committed > last_log_id.index() {
            return Err(StorageError::corrupt(
                committed,
                format!("committed index is beyond the last log id {}", last_log_id.display()),
            ));
        }

        let log_ids = LogIdList::load(&mut *self.sto, last_log_id)?;

        let mut membership = self.get_membership(last_log_id)?;
        membership.commit(committed);

        Ok(RaftState {
            term: TermState::new(hard_state),
            log_ids,
            committed,
            membership,
        })
    }

    /// Collect every configuration in the log, none of them committed yet.
    fn get_membership(&mut self, last_log_id: Option<LogId>) -> Result<MembershipRegistry, StorageError> {
        let mut membership = MembershipRegistry::default();

        let end = last_log_id.next_index();
        let mut start = 1;

        while start < end {
            let batch_end = std::cmp::min(start + READ_BATCH, end);

            for ent in self.sto.read_entries(start, batch_end)? {
                if let Some(c) = ent.get_configuration() {
                    membership.append(ent.log_id, c.clone());
                }
            }

            start = batch_end;
        }

        Ok(membership)
    }
}

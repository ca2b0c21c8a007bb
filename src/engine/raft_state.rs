use std::error::Error;

use validit::Validate;

use crate::log_id::LogIdList;
use crate::membership::MembershipRegistry;
use crate::term::TermState;
use crate::LogId;
use crate::LogIdOptionExt;

/// The consensus state of a partition member that survives role changes.
#[derive(Debug, Clone, Default)]
#[derive(PartialEq, Eq)]
pub(crate) struct RaftState {
    pub(crate) term: TermState,

    /// The ids of all entries in the log.
    pub(crate) log_ids: LogIdList,

    /// Index of the last committed entry, 0 if none.
    pub(crate) committed: u64,

    pub(crate) membership: MembershipRegistry,
}

impl RaftState {
    pub(crate) fn last_log_id(&self) -> Option<LogId> {
        self.log_ids.last().copied()
    }

    pub(crate) fn last_log_index(&self) -> u64 {
        self.last_log_id().index()
    }
}

impl Validate for RaftState {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        validit::less_equal!(self.committed, self.last_log_index());
        self.membership.validate()?;
        Ok(())
    }
}

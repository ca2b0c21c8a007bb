//! Error types exposed by this crate.

use std::convert::Infallible;
use std::fmt::Debug;

use crate::display_ext::DisplayOptionExt;
use crate::metrics::ServerState;
use crate::LogId;
use crate::Member;
use crate::NodeId;
use crate::StorageError;

/// Fatal is unrecoverable and shuts down the partition at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fatal {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A protocol invariant is broken, e.g., a leader asked to overwrite a committed entry.
    #[error("invariant violated: {0}")]
    Violation(String),

    /// The partition stopped after an earlier fatal error.
    #[error("partition stopped")]
    Stopped,
}

/// The error of an operation on [`Raft`](crate::Raft): either the operation failed, or the
/// partition stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaftError<E = Infallible>
where E: std::error::Error
{
    #[error(transparent)]
    APIError(E),

    #[error(transparent)]
    Fatal(#[from] Fatal),
}

impl<E> RaftError<E>
where E: std::error::Error + Debug
{
    /// Return a reference to Self::APIError.
    pub fn api_error(&self) -> Option<&E> {
        match self {
            RaftError::APIError(e) => Some(e),
            RaftError::Fatal(_) => None,
        }
    }

    /// Try to convert self to APIError.
    pub fn into_api_error(self) -> Option<E> {
        match self {
            RaftError::APIError(e) => Some(e),
            RaftError::Fatal(_) => None,
        }
    }

    /// Return a reference to Self::Fatal.
    pub fn fatal(&self) -> Option<&Fatal> {
        match self {
            RaftError::APIError(_) => None,
            RaftError::Fatal(f) => Some(f),
        }
    }
}

/// The request must be sent to the leader, which is the member in the hint if one is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
#[error("has to forward request to: {}", .leader_member.display())]
pub struct ForwardToLeader {
    pub leader_id: Option<NodeId>,
    pub leader_member: Option<Member>,
}

impl ForwardToLeader {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(leader_member: Option<Member>) -> Self {
        Self {
            leader_id: leader_member.as_ref().map(|m| m.id),
            leader_member,
        }
    }
}

/// The error of a proposal submitted with [`Raft::propose`](crate::Raft::propose).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientWriteError {
    #[error(transparent)]
    ForwardToLeader(#[from] ForwardToLeader),

    /// The leader that accepted the proposal stepped down before it was committed.
    ///
    /// The entry may still be committed by a later leader.
    #[error("leader changed before {log_id} is committed, current term: {term}")]
    LeaderChanged { log_id: LogId, term: u64 },

    #[error("partition is closed")]
    Closed,
}

/// The error of a join or leave started on this member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MembershipChangeError {
    #[error(transparent)]
    ForwardToLeader(#[from] ForwardToLeader),

    /// Only one configuration change can be in flight.
    #[error("configuration change in progress: {pending}")]
    ConfigurationChangeInProgress { pending: LogId },

    #[error("not allowed in state {state}")]
    NotAllowed { state: ServerState },

    /// None of the given contacts is another member.
    #[error("no member to contact")]
    NoContacts,

    /// The only member can not leave.
    #[error("member {id} is the last member")]
    LastMember { id: NodeId },

    /// The request is abandoned because this member changed its role or is closed.
    #[error("aborted in state {state}")]
    Aborted { state: ServerState },
}

/// The error of creating a cluster with [`Raft::bootstrap`](crate::Raft::bootstrap).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitializeError {
    /// Bootstrap is only allowed on a member with an empty log.
    #[error("can not bootstrap with a non-empty log, last log id: {}", .last_log_id.display())]
    NotAllowed { last_log_id: Option<LogId> },

    #[error("member {id} is not in the initial members")]
    NotInMembers { id: NodeId },
}

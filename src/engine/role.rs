use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::metrics::ServerState;
use crate::network::RequestId;
use crate::progress::ProgressEntry;
use crate::progress::VecProgress;
use crate::LogId;
use crate::Member;
use crate::NodeId;

/// The role of a partition member. Each variant carries only the state the role needs.
#[derive(Debug, Clone, Default)]
#[derive(PartialEq, Eq)]
pub(crate) enum Role {
    #[default]
    Inactive,
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(Box<LeaderState>),
    Joining(JoiningState),
    Leaving(LeavingState),
}

impl Role {
    pub(crate) fn server_state(&self) -> ServerState {
        match self {
            Role::Inactive => ServerState::Inactive,
            Role::Follower(_) => ServerState::Follower,
            Role::Candidate(_) => ServerState::Candidate,
            Role::Leader(l) => {
                if l.is_leaving() {
                    ServerState::Leaving
                } else {
                    ServerState::Leader
                }
            }
            Role::Joining(_) => ServerState::Joining,
            Role::Leaving(_) => ServerState::Leaving,
        }
    }

    pub(crate) fn leader(&self) -> Option<&LeaderState> {
        match self {
            Role::Leader(l) => Some(l.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
#[derive(PartialEq, Eq)]
pub(crate) struct FollowerState {
    /// The pre-vote round in progress.
    pub(crate) poll: Option<PollRound>,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct PollRound {
    /// The term this member would start an election for.
    pub(crate) term: u64,
    pub(crate) granted: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Default)]
#[derive(PartialEq, Eq)]
pub(crate) struct CandidateState {
    pub(crate) granted: BTreeSet<NodeId>,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct LeaderState {
    /// Replication progress of every voter and of the members being added.
    pub(crate) progress: VecProgress<BTreeSet<NodeId>>,

    pub(crate) next_heartbeat: Instant,

    /// The configuration change proposed by this leader and not yet committed.
    pub(crate) change: Option<PendingChange>,
}

impl LeaderState {
    /// The leader is removing itself from the configuration.
    pub(crate) fn is_leaving(&self) -> bool {
        self.change.as_ref().map(|c| c.local).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Join,
    Leave,
}

/// A join or leave being committed, and who to respond to once it is.
#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct PendingChange {
    pub(crate) log_id: LogId,
    pub(crate) kind: ChangeKind,
    pub(crate) requester: Member,
    pub(crate) request_id: RequestId,

    /// The request is started on this member, i.e., the leader is leaving.
    pub(crate) local: bool,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct JoiningState {
    pub(crate) request_id: RequestId,

    pub(crate) contacts: Vec<Member>,

    /// Index into `contacts` of the next member to try.
    pub(crate) next_contact: usize,

    /// Where to send the next request to, as suggested by a rejection.
    pub(crate) leader_hint: Option<Member>,

    pub(crate) sent_at: Option<Instant>,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct LeavingState {
    pub(crate) request_id: RequestId,

    pub(crate) leader_hint: Option<Member>,

    pub(crate) sent_at: Option<Instant>,
}

/// Whether a request sent at `sent_at` should be sent again.
pub(crate) fn is_request_due(sent_at: Option<Instant>, now: Instant, timeout: Duration) -> bool {
    match sent_at {
        None => true,
        Some(t) => now.saturating_duration_since(t) >= timeout,
    }
}

/// Build the progress of a leader whose log ends at `last_index`.
pub(crate) fn new_progress(
    voters: BTreeSet<NodeId>,
    learners: impl IntoIterator<Item = NodeId>,
    last_index: u64,
) -> VecProgress<BTreeSet<NodeId>> {
    VecProgress::new(voters, learners, || ProgressEntry::empty(last_index + 1))
}

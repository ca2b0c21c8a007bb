//! The six request/response pairs exchanged between members of a partition.
//!
//! Rejections never travel as errors: a stale term, a log conflict or a missing leadership is
//! reported in the fields of a response.

use std::fmt;

use crate::display_ext::DisplayOptionExt;
use crate::display_ext::DisplaySliceExt;
use crate::EffectiveConfiguration;
use crate::Entry;
use crate::LogId;
use crate::Member;
use crate::NodeId;

/// Correlates a join or leave response with its request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(derive_more::Display)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct RequestId(pub u64);

/// A pre-vote: asks whether a member would grant a vote, without changing any state on it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct PollRequest {
    /// The term the requester would start an election for.
    pub term: u64,
    pub last_log_id: Option<LogId>,
}

impl fmt::Display for PollRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Poll{{term: {}, last_log_id: {}}}", self.term, self.last_log_id.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct PollResponse {
    pub term: u64,
    pub granted: bool,
}

impl fmt::Display for PollResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PollResp{{term: {}, granted: {}}}", self.term, self.granted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct VoteRequest {
    pub term: u64,
    pub last_log_id: Option<LogId>,
}

impl fmt::Display for VoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vote{{term: {}, last_log_id: {}}}", self.term, self.last_log_id.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct VoteResponse {
    pub term: u64,
    pub granted: bool,
}

impl fmt::Display for VoteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoteResp{{term: {}, granted: {}}}", self.term, self.granted)
    }
}

/// Replicates entries, or is a heartbeat if `entries` is empty.
///
/// `prev_log_id` is `None` when `entries` start at index 1.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct AppendRequest {
    pub term: u64,
    pub prev_log_id: Option<LogId>,
    pub entries: Vec<Entry>,
    pub leader_commit: u64,
}

impl fmt::Display for AppendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Append{{term: {}, prev_log_id: {}, leader_commit: {}, entries: {}}}",
            self.term,
            self.prev_log_id.display(),
            self.leader_commit,
            self.entries.display()
        )
    }
}

/// The response to an [`AppendRequest`].
///
/// On success `matched` is the id of the last entry known to match the leader's log. On a
/// mismatch of `prev_log_id`, `conflict_index` is where the leader should retry from; it is never
/// greater than the index of `prev_log_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct AppendResponse {
    pub term: u64,
    pub succeeded: bool,
    pub matched: Option<LogId>,
    pub conflict_index: u64,
}

impl fmt::Display for AppendResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AppendResp{{term: {}, succeeded: {}, matched: {}, conflict_index: {}}}",
            self.term,
            self.succeeded,
            self.matched.display(),
            self.conflict_index
        )
    }
}

impl AppendResponse {
    pub fn success(term: u64, matched: Option<LogId>) -> Self {
        Self {
            term,
            succeeded: true,
            matched,
            conflict_index: 0,
        }
    }

    pub fn conflict(term: u64, conflict_index: u64) -> Self {
        Self {
            term,
            succeeded: false,
            matched: None,
            conflict_index,
        }
    }

    /// Rejected because of a stale term.
    pub fn reject(term: u64) -> Self {
        Self::conflict(term, 0)
    }
}

/// Announces a committed configuration.
///
/// `successor` names the member that should start an election at once, when the sender is a
/// leader that removed itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct ConfigureRequest {
    pub term: u64,
    pub configuration: EffectiveConfiguration,
    pub successor: Option<NodeId>,
}

impl fmt::Display for ConfigureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configure{{term: {}, configuration: {}, successor: {}}}",
            self.term,
            self.configuration,
            self.successor.display()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct ConfigureResponse {
    pub term: u64,
    pub acknowledged: bool,
}

impl fmt::Display for ConfigureResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigureResp{{term: {}, acknowledged: {}}}", self.term, self.acknowledged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct JoinRequest {
    pub request_id: RequestId,
    pub member: Member,
}

impl fmt::Display for JoinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Join{{request_id: {}, member: {}}}", self.request_id, self.member)
    }
}

/// The response to a [`JoinRequest`].
///
/// When accepted, `configuration` is the committed configuration that contains the joiner. When
/// rejected, `leader` is a hint where to send the request to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct JoinResponse {
    pub request_id: RequestId,
    pub term: u64,
    pub accepted: bool,
    pub configuration: Option<EffectiveConfiguration>,
    pub leader: Option<Member>,
}

impl fmt::Display for JoinResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JoinResp{{request_id: {}, term: {}, accepted: {}, configuration: {}, leader: {}}}",
            self.request_id,
            self.term,
            self.accepted,
            self.configuration.display(),
            self.leader.display()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct LeaveRequest {
    pub request_id: RequestId,
    pub member: Member,
}

impl fmt::Display for LeaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Leave{{request_id: {}, member: {}}}", self.request_id, self.member)
    }
}

/// The response to a [`LeaveRequest`].
///
/// When accepted, `configuration` is the committed configuration without the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct LeaveResponse {
    pub request_id: RequestId,
    pub term: u64,
    pub accepted: bool,
    pub configuration: Option<EffectiveConfiguration>,
    pub leader: Option<Member>,
}

impl fmt::Display for LeaveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LeaveResp{{request_id: {}, term: {}, accepted: {}, configuration: {}, leader: {}}}",
            self.request_id,
            self.term,
            self.accepted,
            self.configuration.display(),
            self.leader.display()
        )
    }
}

use std::fmt;

use crate::display_ext::DisplayOptionExt;
use crate::display_ext::DisplaySliceExt;
use crate::error::MembershipChangeError;
use crate::metrics::ServerState;
use crate::network::MessageBody;
use crate::network::RequestId;
use crate::storage::HardState;
use crate::Configuration;
use crate::Entry;
use crate::LogId;
use crate::Member;

/// Commands to send to the runtime, which executes them in order.
#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) enum Command {
    /// Append entries to the end of the log.
    AppendEntries { entries: Vec<Entry> },

    /// Remove every entry at or after `since`.
    TruncateLog { since: u64 },

    SaveHardState { hard_state: HardState },

    /// Persist the committed index, then resolve the proposals up to it.
    Commit { committed: u64 },

    Send { target: Member, body: MessageBody },

    /// Read the entries in `(prev_log_id.index, last_index]` from the log and send them to
    /// `target` in an append request.
    Replicate {
        target: Member,
        term: u64,
        prev_log_id: Option<LogId>,
        last_index: u64,
        leader_commit: u64,
    },

    /// Resolve the future of a join or leave started on this member.
    ResolveRequest {
        request_id: RequestId,
        result: Result<Configuration, MembershipChangeError>,
    },

    /// Fail every join or leave started on this member.
    CancelRequests { error: MembershipChangeError },

    /// Fail every pending proposal: this member is no longer the leader. `term` is the current
    /// term.
    CancelProposals { term: u64 },

    UpdateServerState { server_state: ServerState },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::AppendEntries { entries } => write!(f, "AppendEntries: {}", entries.display()),
            Command::TruncateLog { since } => write!(f, "TruncateLog: since {}", since),
            Command::SaveHardState { hard_state } => write!(f, "SaveHardState: {}", hard_state),
            Command::Commit { committed } => write!(f, "Commit: {}", committed),
            Command::Send { target, body } => write!(f, "Send: to {}: {}", target, body),
            Command::Replicate {
                target,
                term,
                prev_log_id,
                last_index,
                leader_commit,
            } => write!(
                f,
                "Replicate: to {}, term: {}, ({}, {}], leader_commit: {}",
                target,
                term,
                prev_log_id.display(),
                last_index,
                leader_commit
            ),
            Command::ResolveRequest { request_id, result } => match result {
                Ok(c) => write!(f, "ResolveRequest: {}: Ok({})", request_id, c),
                Err(e) => write!(f, "ResolveRequest: {}: Err({})", request_id, e),
            },
            Command::CancelRequests { error } => write!(f, "CancelRequests: {}", error),
            Command::CancelProposals { term } => write!(f, "CancelProposals: term {}", term),
            Command::UpdateServerState { server_state } => write!(f, "UpdateServerState: {}", server_state),
        }
    }
}

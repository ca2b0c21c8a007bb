//! Helpers to build engines in a given state for unit tests.

use std::time::Duration;
use std::time::Instant;

use crate::engine::raft_state::RaftState;
use crate::engine::Command;
use crate::engine::Engine;
use crate::engine::EngineConfig;
use crate::log_id::LogIdList;
use crate::membership::MembershipRegistry;
use crate::network::MessageBody;
use crate::network::VoteResponse;
use crate::storage::HardState;
use crate::term::TermState;
use crate::Configuration;
use crate::EffectiveConfiguration;
use crate::Endpoint;
use crate::LogId;
use crate::Member;
use crate::NodeId;

pub(crate) fn log_id(term: u64, index: u64) -> LogId {
    LogId::new(term, index)
}

pub(crate) fn member(id: NodeId) -> Member {
    Member::new(id, Endpoint::new("127.0.0.1", 26500 + id as u16))
}

pub(crate) fn config(version: u64, ids: &[NodeId]) -> Configuration {
    Configuration::new(version, ids.iter().map(|id| member(*id)))
}

/// The state of a member with the log ids `log_ids`, whose configuration `{ids}` is committed
/// by the first entry.
pub(crate) fn state(term: u64, log_ids: &[LogId], committed: u64, ids: &[NodeId]) -> RaftState {
    let mut list = LogIdList::default();
    list.extend(log_ids.iter().copied());

    RaftState {
        term: TermState::new(HardState { term, voted_for: None }),
        log_ids: list,
        committed,
        membership: MembershipRegistry::new(EffectiveConfiguration::new(Some(log_id(0, 1)), config(1, ids))),
    }
}

pub(crate) fn engine(id: NodeId, state: RaftState) -> Engine {
    Engine::new(EngineConfig::new_default(member(id)), state, Instant::now())
}

/// A started follower of `{1,2,3}` in term 1, whose log is `[T0-1, T1-2]`, both committed.
pub(crate) fn follower(id: NodeId) -> Engine {
    let mut eng = engine(id, state(1, &[log_id(0, 1), log_id(1, 2)], 2, &[1, 2, 3]));
    eng.startup();
    eng.output.clear_commands();
    eng
}

/// Move the clock past any election timeout.
pub(crate) fn pass_election_timeout(eng: &mut Engine) {
    let now = eng.timer.now() + Duration::from_millis(1000);
    eng.update_now(now);
}

/// Elect member 1 of `{1,2,3}` with the vote of member 2, and drop the output.
pub(crate) fn leader() -> Engine {
    let mut eng = follower(1);
    eng.become_candidate();
    eng.handle_message(
        member(2),
        MessageBody::VoteResponse(VoteResponse { term: 2, granted: true }),
    )
    .unwrap();
    eng.output.clear_commands();
    eng
}

/// The messages sent, as `(target id, body)`.
pub(crate) fn sent(commands: &[Command]) -> Vec<(NodeId, MessageBody)> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Send { target, body } => Some((target.id, body.clone())),
            _ => None,
        })
        .collect()
}

/// The targets of `Replicate` commands.
pub(crate) fn replicated_to(commands: &[Command]) -> Vec<NodeId> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Replicate { target, .. } => Some(target.id),
            _ => None,
        })
        .collect()
}

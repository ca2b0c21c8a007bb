use std::collections::BTreeSet;

use crate::display_ext::DisplayOptionExt;
use crate::engine::engine_config::EngineConfig;
use crate::engine::raft_state::RaftState;
use crate::engine::role::new_progress;
use crate::engine::role::LeaderState;
use crate::engine::Command;
use crate::engine::EngineOutput;
use crate::progress::Inflight;
use crate::progress::ProgressEntry;
use crate::Entry;
use crate::EntryPayload;
use crate::LogId;
use crate::Member;
use crate::NodeId;

/// Replicate the log of a leader and track what is accepted by a quorum.
pub(crate) struct ReplicationHandler<'st> {
    pub(crate) config: &'st EngineConfig,
    pub(crate) state: &'st mut RaftState,
    pub(crate) leader: &'st mut LeaderState,
    pub(crate) output: &'st mut EngineOutput,
}

impl<'st> ReplicationHandler<'st> {
    /// Append an entry of the current term to the leader's log.
    ///
    /// It does not commit or replicate it: the caller decides when to.
    pub(crate) fn append_entry(&mut self, payload: EntryPayload) -> LogId {
        let log_id = LogId::new(self.state.term.term(), self.state.last_log_index() + 1);
        let entry = Entry::new(log_id, payload);

        tracing::debug!(entry = display(&entry), "{}", func_name!());

        if let Some(c) = entry.get_configuration() {
            self.state.membership.append(log_id, c.clone());
        }
        self.state.log_ids.append(log_id);
        self.output.push_command(Command::AppendEntries { entries: vec![entry] });

        let me = self.config.id();
        let _ = self.leader.progress.update_with(&me, |p| p.update_matching(Some(log_id)));

        log_id
    }

    /// Returns the index to commit up to, if a quorum accepted an entry of the current term beyond
    /// the committed one.
    ///
    /// An entry of a previous term is never committed by counting replicas: it is committed
    /// along with the first entry of the current term.
    pub(crate) fn calc_commit(&self) -> Option<u64> {
        let accepted = self.leader.progress.quorum_accepted()?;

        if accepted.term != self.state.term.term() {
            return None;
        }

        if accepted.index > self.state.committed {
            Some(accepted.index)
        } else {
            None
        }
    }

    /// Update the matching log id of `target` after it accepted an append request.
    pub(crate) fn update_matching(&mut self, target: NodeId, matched: Option<LogId>) {
        // A log id the leader does not have can not be a match.
        if let Some(m) = matched {
            if self.state.log_ids.get(m.index) != Some(m) {
                tracing::warn!(to = display(target), matched = display(m), "ignore unknown matched log id");
                return;
            }
        }

        let res = self.leader.progress.update_with(&target, |p| p.update_matching(matched));

        tracing::debug!(
            to = display(target),
            matched = display(matched.display()),
            quorum_accepted = display(res.ok().flatten().display()),
            "{}",
            func_name!()
        );
    }

    /// `target` rejected an append request because `prev_log_id` is not in its log.
    pub(crate) fn update_conflicting(&mut self, target: NodeId, conflict_index: u64) {
        let Some(p) = self.leader.progress.get_mut(&target) else {
            return;
        };

        p.update_conflicting(conflict_index);

        tracing::debug!(to = display(target), progress = display(&*p), "{}", func_name!());
    }

    /// Send a heartbeat, possibly carrying entries, to every target, even if a request is in
    /// flight.
    pub(crate) fn send_heartbeats(&mut self) {
        for target in self.targets() {
            if let Some(p) = self.leader.progress.get_mut(&target) {
                p.reset_inflight();
            }
            self.send_to(target);
        }
    }

    /// Send the entries not yet replicated to every target that has no request in flight.
    pub(crate) fn send_to_all(&mut self) {
        for target in self.targets() {
            self.send_to(target);
        }
    }

    /// Keep sending to `target` if it does not have every entry yet.
    pub(crate) fn send_if_lagging(&mut self, target: NodeId) {
        let last = self.state.last_log_id();

        let Some(p) = self.leader.progress.get(&target) else {
            return;
        };

        if p.matching < last {
            self.send_to(target);
        }
    }

    /// Send the next append request to `target` unless one is in flight.
    pub(crate) fn send_to(&mut self, target: NodeId) {
        let Some(member) = self.member(&target) else {
            tracing::warn!(to = display(target), "replication target is not a member");
            return;
        };

        let last_index = self.state.last_log_index();

        let Some(p) = self.leader.progress.get_mut(&target) else {
            return;
        };

        let Some(Inflight::Logs { prev_index, last_index }) =
            p.next_send(last_index, self.config.max_payload_entries)
        else {
            return;
        };

        debug_assert!(prev_index <= self.state.last_log_index());

        let prev_log_id = if prev_index == 0 {
            None
        } else {
            self.state.log_ids.get(prev_index)
        };

        self.output.push_command(Command::Replicate {
            target: member,
            term: self.state.term.term(),
            prev_log_id,
            last_index,
            leader_commit: self.state.committed,
        });
    }

    /// Rebuild the progress for the committed configuration as the quorum, plus the members of
    /// the latest configuration as targets.
    ///
    /// The replication state of members present before and after is kept.
    pub(crate) fn rebuild_progress(&mut self) {
        let voters = self.state.membership.committed().config.voter_ids();
        let learners = self
            .state
            .membership
            .latest()
            .config
            .voter_ids()
            .difference(&voters)
            .copied()
            .collect::<Vec<_>>();

        let last_index = self.state.last_log_index();

        let prev = std::mem::replace(&mut self.leader.progress, new_progress(BTreeSet::new(), [], last_index));
        self.leader.progress = prev.upgrade_quorum_set(voters, learners, || ProgressEntry::empty(last_index + 1));

        tracing::info!(progress = display(&self.leader.progress), "{}", func_name!());
    }

    /// Ids of every member to replicate to, i.e., everyone tracked but this member.
    pub(crate) fn targets(&self) -> Vec<NodeId> {
        let me = self.config.id();
        self.leader.progress.iter().map(|x| x.id).filter(|id| *id != me).collect()
    }

    /// Find a member in the latest or the committed configuration.
    fn member(&self, id: &NodeId) -> Option<Member> {
        let m = &self.state.membership;
        m.latest().config.get(id).or_else(|| m.committed().config.get(id)).cloned()
    }
}

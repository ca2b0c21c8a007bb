use crate::display_ext::DisplayOptionExt;
use crate::display_ext::DisplaySliceExt;
use crate::engine::raft_state::RaftState;
use crate::engine::Command;
use crate::engine::EngineOutput;
use crate::error::Fatal;
use crate::Entry;
use crate::LogId;
use crate::LogIdOptionExt;

/// The outcome of accepting an append request.
#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq)]
pub(crate) enum AppendResult {
    /// `prev_log_id` is not in the local log. The leader should retry from `conflict_index`.
    Conflict { conflict_index: u64 },

    /// The log matches the leader's up to `matched`, and entries up to `commit` can be committed.
    Success { matched: Option<LogId>, commit: Option<u64> },
}

/// Receive replicated entries from a leader.
///
/// It only deals with the log. Role transitions are left to the caller.
pub(crate) struct FollowingHandler<'st> {
    pub(crate) state: &'st mut RaftState,
    pub(crate) output: &'st mut EngineOutput,
}

impl<'st> FollowingHandler<'st> {
    /// Append entries that follow `prev_log_id`, replacing the conflicting local ones.
    ///
    /// Entries already in the log are skipped, so a delayed or duplicated request never
    /// truncates entries the leader has replicated since. Replacing a committed entry is a
    /// violation of the protocol.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn append_entries(
        &mut self,
        prev_log_id: Option<LogId>,
        entries: Vec<Entry>,
        leader_commit: u64,
    ) -> Result<AppendResult, Fatal> {
        tracing::debug!(
            prev_log_id = display(prev_log_id.display()),
            entries = display(entries.display()),
            leader_commit = display(leader_commit),
            my_last_log_id = display(self.state.last_log_id().display()),
            my_committed = display(self.state.committed),
            "{}",
            func_name!()
        );

        if let Some(prev) = prev_log_id {
            let local = self.state.log_ids.get(prev.index);

            if local != Some(prev) {
                let conflict_index = self.conflict_index(prev);

                tracing::debug!(
                    local = display(local.display()),
                    conflict_index = display(conflict_index),
                    "prev_log_id does not match"
                );
                return Ok(AppendResult::Conflict { conflict_index });
            }
        }

        let matched = entries.last().map(|x| x.log_id).or(prev_log_id);

        let since = entries.iter().position(|ent| self.state.log_ids.get(ent.index()) != Some(ent.log_id));

        if let Some(i) = since {
            let first = entries[i].index();

            if first <= self.state.last_log_index() {
                if first <= self.state.committed {
                    return Err(Fatal::Violation(format!(
                        "overwriting committed entry {} with {}, committed: {}",
                        self.state.log_ids.get(first).display(),
                        entries[i].log_id,
                        self.state.committed
                    )));
                }
                self.truncate_logs(first);
            }

            let to_append = entries.into_iter().skip(i).collect::<Vec<_>>();
            self.do_append_entries(to_append);
        }

        let commit = std::cmp::min(leader_commit, matched.index());
        let commit = if commit > self.state.committed { Some(commit) } else { None };

        Ok(AppendResult::Success { matched, commit })
    }

    /// The index a leader should retry from, when `prev` is not in the local log.
    ///
    /// It is the first index of the local term at `prev.index`, so that the whole conflicting
    /// term is skipped, or the index right after the local log if the local log is shorter.
    fn conflict_index(&self, prev: LogId) -> u64 {
        let last_index = self.state.last_log_index();

        let index = if prev.index > last_index {
            last_index + 1
        } else {
            self.state.log_ids.first_index_of_term_at(prev.index).unwrap_or(1)
        };

        index.min(prev.index).max(1)
    }

    /// Delete entries since `since`, inclusive, and the configurations they carry.
    pub(crate) fn truncate_logs(&mut self, since: u64) {
        tracing::info!(since = display(since), "{}", func_name!());

        debug_assert!(since > self.state.committed);

        self.state.log_ids.truncate(since);
        if self.state.membership.truncate(since) {
            tracing::info!(
                membership = display(&self.state.membership),
                "uncommitted configuration removed"
            );
        }

        self.output.push_command(Command::TruncateLog { since });
    }

    /// Append entries right after the last one in the log.
    pub(crate) fn do_append_entries(&mut self, entries: Vec<Entry>) {
        if entries.is_empty() {
            return;
        }

        debug_assert_eq!(self.state.last_log_index() + 1, entries[0].index());

        for ent in entries.iter() {
            if let Some(c) = ent.get_configuration() {
                self.state.membership.append(ent.log_id, c.clone());
            }
        }

        self.state.log_ids.extend(entries.iter().map(|x| x.log_id));

        self.output.push_command(Command::AppendEntries { entries });
    }
}

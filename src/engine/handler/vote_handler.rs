use crate::display_ext::DisplayOptionExt;
use crate::engine::engine_config::EngineConfig;
use crate::engine::raft_state::RaftState;
use crate::engine::time_state::TimeState;
use crate::engine::Command;
use crate::engine::EngineOutput;
use crate::network::PollRequest;
use crate::network::PollResponse;
use crate::network::VoteRequest;
use crate::network::VoteResponse;
use crate::Member;

/// Handle term, vote and pre-vote related operations.
pub(crate) struct VoteHandler<'st> {
    pub(crate) config: &'st EngineConfig,
    pub(crate) state: &'st mut RaftState,
    pub(crate) timer: &'st mut TimeState,
    pub(crate) output: &'st mut EngineOutput,
}

impl<'st> VoteHandler<'st> {
    /// Adopt a greater term and/or the first known leader of the current term, and persist the
    /// term if it changed.
    ///
    /// Returns `true` if anything changed: a candidate or a leader has to step down then.
    pub(crate) fn update_term_and_leader(&mut self, term: u64, leader: Option<&Member>) -> bool {
        let prev_term = self.state.term.term();

        let changed = self.state.term.update_term_and_leader(term, leader);
        if !changed {
            return false;
        }

        tracing::info!(
            term = display(&self.state.term),
            prev_term = display(prev_term),
            "{}",
            func_name!()
        );

        if self.state.term.term() != prev_term {
            self.output.push_command(Command::SaveHardState {
                hard_state: self.state.term.hard_state(),
            });
        }

        true
    }

    /// Decide whether to grant a vote to `candidate`.
    ///
    /// The caller must have adopted a greater term in `req` before calling it.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn handle_vote_req(&mut self, candidate: &Member, req: &VoteRequest) -> VoteResponse {
        let my_term = self.state.term.term();
        let my_last = self.state.last_log_id();

        tracing::debug!(
            candidate = display(candidate),
            req = display(req),
            my_term = display(my_term),
            my_last_log_id = display(my_last.display()),
            "{}",
            func_name!()
        );

        let reject = VoteResponse {
            term: my_term,
            granted: false,
        };

        if req.term < my_term {
            tracing::debug!("reject vote: stale term");
            return reject;
        }

        debug_assert_eq!(req.term, my_term);

        if req.last_log_id < my_last {
            tracing::debug!("reject vote: candidate log is less up to date");
            return reject;
        }

        let prev_vote = self.state.term.voted_for();

        if !self.state.term.vote_for(candidate.id) {
            tracing::debug!(voted_for = display(prev_vote.display()), "reject vote: already voted");
            return reject;
        }

        if prev_vote.is_none() {
            self.output.push_command(Command::SaveHardState {
                hard_state: self.state.term.hard_state(),
            });
        }

        // Granting a vote defers this member's own election.
        self.timer.reset_election_deadline(self.config.new_rand_election_timeout());

        tracing::info!(candidate = display(candidate), term = display(my_term), "vote granted");

        VoteResponse {
            term: my_term,
            granted: true,
        }
    }

    /// Decide whether this member would grant a vote, without changing any state.
    ///
    /// A pre-vote is refused while a leader is heard from within the minimal election timeout,
    /// so that a member rejoining after a partition does not disturb a healthy leader.
    pub(crate) fn handle_poll_req(&self, req: &PollRequest) -> PollResponse {
        let my_term = self.state.term.term();

        let granted = req.term >= my_term
            && req.last_log_id >= self.state.last_log_id()
            && !self.timer.leader_seen_within(self.config.election_timeout_min);

        tracing::debug!(
            req = display(req),
            my_term = display(my_term),
            granted = display(granted),
            "{}",
            func_name!()
        );

        PollResponse { term: my_term, granted }
    }
}

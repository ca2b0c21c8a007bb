use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::time::Instant;

use validit::Valid;

use crate::display_ext::DisplayOptionExt;
use crate::engine::engine_config::EngineConfig;
use crate::engine::handler::following_handler::AppendResult;
use crate::engine::handler::following_handler::FollowingHandler;
use crate::engine::handler::replication_handler::ReplicationHandler;
use crate::engine::handler::vote_handler::VoteHandler;
use crate::engine::raft_state::RaftState;
use crate::engine::role::is_request_due;
use crate::engine::role::new_progress;
use crate::engine::role::CandidateState;
use crate::engine::role::FollowerState;
use crate::engine::role::LeaderState;
use crate::engine::role::LeavingState;
use crate::engine::role::PollRound;
use crate::engine::role::Role;
use crate::engine::time_state::TimeState;
use crate::engine::Command;
use crate::engine::EngineOutput;
use crate::error::Fatal;
use crate::error::ForwardToLeader;
use crate::error::InitializeError;
use crate::error::MembershipChangeError;
use crate::metrics::ServerState;
use crate::network::AppendRequest;
use crate::network::AppendResponse;
use crate::network::ConfigureRequest;
use crate::network::ConfigureResponse;
use crate::network::MessageBody;
use crate::network::PollRequest;
use crate::network::PollResponse;
use crate::network::VoteRequest;
use crate::network::VoteResponse;
use crate::quorum::QuorumSet;
use crate::Configuration;
use crate::EffectiveConfiguration;
use crate::Entry;
use crate::EntryPayload;
use crate::LogId;
use crate::Member;
use crate::NodeId;

/// The Raft protocol of one partition member.
///
/// It implements elections, replication and membership changes without performing any I/O.
/// Every state change that has to be persisted or sent is emitted as a [`Command`] into
/// `output`, to be executed by the runtime in order.
#[derive(Debug)]
pub(crate) struct Engine {
    pub(crate) config: EngineConfig,

    /// The state of this member.
    pub(crate) state: Valid<RaftState>,

    pub(crate) role: Role,

    pub(crate) timer: TimeState,

    /// The server state last reported to the runtime.
    pub(crate) server_state: ServerState,

    /// Output entry for the runtime.
    pub(crate) output: EngineOutput,
}

impl Engine {
    pub(crate) fn new(config: EngineConfig, state: RaftState, now: Instant) -> Self {
        let timer = TimeState::new(now, config.new_rand_election_timeout());

        Self {
            config,
            state: Valid::new(state),
            role: Role::Inactive,
            timer,
            server_state: ServerState::Inactive,
            output: EngineOutput::default(),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.config.id()
    }

    /// Start to run after the state is loaded from storage.
    ///
    /// A member of the committed configuration starts as a follower. Any other member stays
    /// inactive until it joins.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn startup(&mut self) {
        tracing::info!(
            id = display(self.id()),
            term = display(&self.state.term),
            last_log_id = display(self.state.last_log_id().display()),
            committed = display(self.state.committed),
            membership = display(&self.state.membership),
            "{}",
            func_name!()
        );

        if self.is_committed_member(&self.id()) {
            self.become_follower();
        } else {
            tracing::info!("not a member of the committed configuration, stay inactive");
        }
    }

    /// Create a new cluster whose first configuration consists of `members`.
    ///
    /// Every initial member is bootstrapped with the same members, so that they all start with
    /// the identical first entry.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn bootstrap(&mut self, members: Vec<Member>) -> Result<(), InitializeError> {
        let last_log_id = self.state.last_log_id();

        if last_log_id.is_some() || self.role != Role::Inactive {
            tracing::error!(last_log_id = display(last_log_id.display()), "can not bootstrap");
            return Err(InitializeError::NotAllowed { last_log_id });
        }

        let me = self.id();
        if !members.iter().any(|m| m.id == me) {
            return Err(InitializeError::NotInMembers { id: me });
        }

        let config = Configuration::new(1, members);
        let entry = Entry::configuration(LogId::new(0, 1), config);

        tracing::info!(entry = display(&entry), "{}", func_name!());

        self.following_handler().do_append_entries(vec![entry]);
        self.commit(1);

        Ok(())
    }

    /// Advance the cached time to `now`.
    pub(crate) fn update_now(&mut self, now: Instant) {
        self.timer.update_now(now);
    }

    /// Run the timers: elections, heartbeats and resending join or leave requests.
    pub(crate) fn tick(&mut self) {
        let now = self.timer.now();
        let request_timeout = self.config.request_timeout;

        match &mut self.role {
            Role::Inactive => {}
            Role::Follower(_) => {
                if self.timer.is_election_due() {
                    self.start_poll();
                }
            }
            Role::Candidate(_) => {
                if self.timer.is_election_due() {
                    tracing::info!(term = display(self.state.term.term()), "election timeout");
                    self.become_candidate();
                }
            }
            Role::Leader(l) => {
                if now >= l.next_heartbeat {
                    l.next_heartbeat = now + self.config.heartbeat_interval;
                    if let Some(mut rh) = self.replication_handler() {
                        rh.send_heartbeats();
                    }
                }
            }
            Role::Joining(j) => {
                if is_request_due(j.sent_at, now, request_timeout) {
                    self.send_join();
                }
            }
            Role::Leaving(l) => {
                if is_request_due(l.sent_at, now, request_timeout) {
                    self.send_leave();
                }
            }
        }
    }

    /// Handle a message from another member.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn handle_message(&mut self, from: Member, body: MessageBody) -> Result<(), Fatal> {
        tracing::debug!(
            from = display(&from),
            body = display(&body),
            state = display(self.server_state),
            "{}",
            func_name!()
        );

        if self.role == Role::Inactive {
            tracing::debug!("inactive, ignore message from {}", from);
            return Ok(());
        }

        match body {
            MessageBody::PollRequest(req) => self.handle_poll_request(from, req),
            MessageBody::PollResponse(resp) => self.handle_poll_response(from, resp),
            MessageBody::VoteRequest(req) => self.handle_vote_request(from, req),
            MessageBody::VoteResponse(resp) => self.handle_vote_response(from, resp),
            MessageBody::AppendRequest(req) => return self.handle_append_request(from, req),
            MessageBody::AppendResponse(resp) => self.handle_append_response(from, resp),
            MessageBody::ConfigureRequest(req) => return self.handle_configure_request(from, req),
            MessageBody::ConfigureResponse(resp) => self.handle_configure_response(resp),
            MessageBody::JoinRequest(req) => self.handle_join_request(req),
            MessageBody::JoinResponse(resp) => self.handle_join_response(resp),
            MessageBody::LeaveRequest(req) => self.handle_leave_request(req),
            MessageBody::LeaveResponse(resp) => self.handle_leave_response(resp),
        }

        Ok(())
    }

    /// Append a payload proposed by the application, if this member is the leader.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn propose(&mut self, data: Vec<u8>) -> Result<LogId, ForwardToLeader> {
        let Some(mut rh) = self.replication_handler() else {
            return Err(self.forward_to_leader());
        };

        let log_id = rh.append_entry(EntryPayload::Normal(data));
        rh.send_to_all();

        self.leader_commit();

        Ok(log_id)
    }

    /// Stop participating: fail every pending future and become inactive.
    pub(crate) fn close(&mut self) {
        tracing::info!(state = display(self.server_state), "{}", func_name!());

        self.set_role(Role::Inactive);
        self.output.push_command(Command::CancelRequests {
            error: MembershipChangeError::Aborted {
                state: ServerState::Inactive,
            },
        });
    }

    // --- elections

    /// Start a pre-vote round for the next term, without changing the term.
    fn start_poll(&mut self) {
        self.reset_election_deadline();

        let me = self.id();
        if !self.is_committed_member(&me) {
            tracing::warn!("not a voter of the committed configuration, do not elect");
            return;
        }

        let term = self.state.term.term() + 1;
        let granted = BTreeSet::from([me]);
        let is_quorum = self.is_quorum(&granted);

        tracing::info!(term = display(term), "start pre-vote");

        if let Role::Follower(f) = &mut self.role {
            f.poll = Some(PollRound { term, granted });
        }

        if is_quorum {
            self.become_candidate();
            return;
        }

        let req = PollRequest {
            term,
            last_log_id: self.state.last_log_id(),
        };
        for target in self.other_voters() {
            self.send(target, req.clone().into());
        }
    }

    /// Start an election for a new term.
    pub(crate) fn become_candidate(&mut self) {
        let me = self.id();
        let term = self.state.term.increase_term_for_self(me);

        self.output.push_command(Command::SaveHardState {
            hard_state: self.state.term.hard_state(),
        });
        self.reset_election_deadline();

        let granted = BTreeSet::from([me]);
        let is_quorum = self.is_quorum(&granted);

        self.set_role(Role::Candidate(CandidateState { granted }));

        tracing::info!(term = display(term), "start election");

        if is_quorum {
            self.become_leader();
            return;
        }

        let req = VoteRequest {
            term,
            last_log_id: self.state.last_log_id(),
        };
        for target in self.other_voters() {
            self.send(target, req.clone().into());
        }
    }

    /// Become the leader of the current term and commit a blank entry to establish it.
    fn become_leader(&mut self) {
        let me = self.config.me.clone();
        self.state.term.set_self_leader(&me);

        let membership = &self.state.membership;
        let voters = membership.committed().config.voter_ids();
        let learners = membership.latest().config.voter_ids().difference(&voters).copied().collect::<Vec<_>>();

        let mut progress = new_progress(voters, learners, self.state.last_log_index());
        let last_log_id = self.state.last_log_id();
        let _ = progress.update_with(&me.id, |p| p.update_matching(last_log_id));

        let next_heartbeat = self.timer.now() + self.config.heartbeat_interval;

        self.set_role(Role::Leader(Box::new(LeaderState {
            progress,
            next_heartbeat,
            change: None,
        })));

        tracing::info!(term = display(&self.state.term), "become leader");

        if let Some(mut rh) = self.replication_handler() {
            rh.append_entry(EntryPayload::Blank);
            rh.send_heartbeats();
        }

        self.leader_commit();
    }

    pub(crate) fn become_follower(&mut self) {
        self.reset_election_deadline();
        self.set_role(Role::Follower(FollowerState::default()));
    }

    /// Give up leading or electing, after a greater term or the leader of the current term is
    /// seen.
    pub(crate) fn step_down(&mut self) {
        match &mut self.role {
            Role::Leader(l) => {
                let leaving = l.change.as_ref().filter(|c| c.local).map(|c| c.request_id);

                tracing::info!(term = display(&self.state.term), "leader steps down");

                if let Some(request_id) = leaving {
                    // Go on leaving through the new leader.
                    self.set_role(Role::Leaving(LeavingState {
                        request_id,
                        leader_hint: None,
                        sent_at: None,
                    }));
                } else {
                    self.become_follower();
                }
            }
            Role::Candidate(_) => {
                tracing::info!(term = display(&self.state.term), "candidate steps down");
                self.become_follower();
            }
            Role::Follower(f) => {
                f.poll = None;
            }
            Role::Inactive | Role::Joining(_) | Role::Leaving(_) => {}
        }
    }

    /// Adopt `term` if it is greater than the local one, and step down.
    ///
    /// Returns `true` if the term is adopted.
    fn observe_term(&mut self, term: u64) -> bool {
        if term <= self.state.term.term() {
            return false;
        }

        self.vote_handler().update_term_and_leader(term, None);
        self.step_down();
        true
    }

    fn handle_poll_request(&mut self, from: Member, req: PollRequest) {
        let resp = match self.role {
            Role::Follower(_) | Role::Candidate(_) | Role::Leaving(_) => self.vote_handler().handle_poll_req(&req),
            _ => PollResponse {
                term: self.state.term.term(),
                granted: false,
            },
        };

        self.send(from, resp.into());
    }

    fn handle_poll_response(&mut self, from: Member, resp: PollResponse) {
        if self.observe_term(resp.term) {
            return;
        }

        let next_term = self.state.term.term() + 1;
        let is_voter = self.is_committed_member(&from.id);

        let Role::Follower(f) = &mut self.role else {
            return;
        };
        let Some(round) = &mut f.poll else {
            return;
        };

        if !resp.granted || round.term != next_term || !is_voter {
            tracing::debug!(from = display(&from), resp = display(&resp), "pre-vote not counted");
            return;
        }

        round.granted.insert(from.id);
        let granted = round.granted.clone();

        if self.is_quorum(&granted) {
            tracing::info!(granted = debug(&granted), "pre-vote granted by a quorum");
            self.become_candidate();
        }
    }

    fn handle_vote_request(&mut self, from: Member, req: VoteRequest) {
        if let Role::Joining(_) = self.role {
            let resp = VoteResponse {
                term: self.state.term.term(),
                granted: false,
            };
            self.send(from, resp.into());
            return;
        }

        self.observe_term(req.term);

        let resp = self.vote_handler().handle_vote_req(&from, &req);
        self.send(from, resp.into());
    }

    fn handle_vote_response(&mut self, from: Member, resp: VoteResponse) {
        if self.observe_term(resp.term) {
            return;
        }

        let term = self.state.term.term();
        let is_voter = self.is_committed_member(&from.id);

        let Role::Candidate(c) = &mut self.role else {
            return;
        };

        if resp.term != term || !resp.granted || !is_voter {
            return;
        }

        c.granted.insert(from.id);
        let granted = c.granted.clone();

        if self.is_quorum(&granted) {
            tracing::info!(granted = debug(&granted), "vote granted by a quorum");
            self.become_leader();
        }
    }

    // --- replication

    fn handle_append_request(&mut self, from: Member, req: AppendRequest) -> Result<(), Fatal> {
        let my_term = self.state.term.term();

        if req.term < my_term {
            tracing::debug!(req_term = display(req.term), my_term = display(my_term), "reject stale append");
            self.send(from, AppendResponse::reject(my_term).into());
            return Ok(());
        }

        let changed = self.vote_handler().update_term_and_leader(req.term, Some(&from));

        if !changed && self.state.term.leader_id() != Some(from.id) {
            return Err(Fatal::Violation(format!(
                "append from {} in term {}, whose leader is {}",
                from,
                req.term,
                self.state.term.leader().display()
            )));
        }

        if changed {
            self.step_down();
        }

        self.timer.seen_leader();
        self.reset_election_deadline();
        if let Role::Follower(f) = &mut self.role {
            f.poll = None;
        }

        let res = self.following_handler().append_entries(req.prev_log_id, req.entries, req.leader_commit)?;

        let term = self.state.term.term();
        let resp = match res {
            AppendResult::Conflict { conflict_index } => AppendResponse::conflict(term, conflict_index),
            AppendResult::Success { matched, commit } => {
                if let Some(c) = commit {
                    self.commit(c);
                }
                AppendResponse::success(term, matched)
            }
        };

        self.send(from, resp.into());
        Ok(())
    }

    fn handle_append_response(&mut self, from: Member, resp: AppendResponse) {
        if self.observe_term(resp.term) {
            return;
        }

        if resp.term < self.state.term.term() {
            tracing::debug!(from = display(&from), resp = display(&resp), "ignore stale append response");
            return;
        }

        let Some(mut rh) = self.replication_handler() else {
            return;
        };

        if resp.succeeded {
            rh.update_matching(from.id, resp.matched);
            self.leader_commit();

            if let Some(mut rh) = self.replication_handler() {
                rh.send_if_lagging(from.id);
            }
        } else {
            rh.update_conflicting(from.id, resp.conflict_index);
            rh.send_to(from.id);
        }
    }

    /// Commit what a quorum accepted, and let the followers know at once.
    pub(crate) fn leader_commit(&mut self) {
        let Some(rh) = self.replication_handler() else {
            return;
        };
        let Some(committed) = rh.calc_commit() else {
            return;
        };

        self.commit(committed);

        if let Some(mut rh) = self.replication_handler() {
            rh.send_to_all();
        }
    }

    /// Entries up to `committed` are committed.
    pub(crate) fn commit(&mut self, committed: u64) {
        if committed <= self.state.committed {
            return;
        }

        debug_assert!(committed <= self.state.last_log_index());

        tracing::debug!(committed = display(committed), "{}", func_name!());

        self.state.committed = committed;
        self.output.push_command(Command::Commit { committed });

        let prev = self.state.membership.committed().config.clone();
        let changed = self.state.membership.commit(committed).cloned();

        if let Some(c) = changed {
            self.on_configuration_committed(prev, c);
        }
    }

    // --- configuration announcement

    fn handle_configure_request(&mut self, from: Member, req: ConfigureRequest) -> Result<(), Fatal> {
        let my_term = self.state.term.term();

        if req.term < my_term {
            let resp = ConfigureResponse {
                term: my_term,
                acknowledged: false,
            };
            self.send(from, resp.into());
            return Ok(());
        }

        if self.vote_handler().update_term_and_leader(req.term, Some(&from)) {
            self.step_down();
        }
        self.timer.seen_leader();

        self.adopt_configuration(req.configuration);

        let resp = ConfigureResponse {
            term: self.state.term.term(),
            acknowledged: true,
        };
        self.send(from, resp.into());

        let me = self.id();
        if req.successor == Some(me) && matches!(self.role, Role::Follower(_)) && self.is_committed_member(&me) {
            tracing::info!("chosen as successor of the leaving leader");
            self.become_candidate();
        }

        Ok(())
    }

    fn handle_configure_response(&mut self, resp: ConfigureResponse) {
        self.observe_term(resp.term);
    }

    /// Take a configuration a leader announced as committed.
    pub(crate) fn adopt_configuration(&mut self, c: EffectiveConfiguration) {
        let prev = self.state.membership.committed().config.clone();

        if self.state.membership.adopt(c.clone()) {
            self.on_configuration_committed(prev, c);
        }
    }

    /// A new configuration is committed, or adopted from a leader. `prev` is the one it replaces.
    pub(crate) fn on_configuration_committed(&mut self, prev: Configuration, c: EffectiveConfiguration) {
        tracing::info!(configuration = display(&c), prev = display(&prev), "configuration committed");

        let me = self.id();
        let is_member = c.config.contains(&me);

        match &self.role {
            Role::Leader(_) => self.leader_on_configuration_committed(prev, c),
            Role::Inactive | Role::Joining(_) => {
                if is_member {
                    if let Role::Joining(j) = &self.role {
                        let request_id = j.request_id;
                        self.output.push_command(Command::ResolveRequest {
                            request_id,
                            result: Ok(c.config),
                        });
                    }
                    self.become_follower();
                }
            }
            Role::Leaving(l) => {
                if !is_member {
                    let request_id = l.request_id;
                    self.output.push_command(Command::ResolveRequest {
                        request_id,
                        result: Ok(c.config),
                    });
                    self.set_role(Role::Inactive);
                }
            }
            Role::Follower(_) | Role::Candidate(_) => {
                if !is_member {
                    tracing::info!("removed from the configuration");
                    self.set_role(Role::Inactive);
                }
            }
        }
    }

    /// Announce the committed configuration, respond to the requester of the change, and quit
    /// if this leader is removed.
    fn leader_on_configuration_committed(&mut self, prev: Configuration, c: EffectiveConfiguration) {
        let me = self.id();
        let is_member = c.config.contains(&me);

        let Role::Leader(l) = &mut self.role else {
            return;
        };

        let is_change_committed = l.change.as_ref().map(|ch| Some(ch.log_id) <= c.log_id).unwrap_or(false);
        let change = if is_change_committed { l.change.take() } else { None };

        // The most up to date remaining member takes over from a removed leader.
        let successor = if is_member {
            None
        } else {
            l.progress
                .iter()
                .filter(|x| x.id != me && c.config.contains(&x.id))
                .max_by_key(|x| (x.val.matching, Reverse(x.id)))
                .map(|x| x.id)
        };

        if let Some(mut rh) = self.replication_handler() {
            rh.rebuild_progress();
        }

        let req = ConfigureRequest {
            term: self.state.term.term(),
            configuration: c.clone(),
            successor,
        };

        let mut targets = prev.members().chain(c.config.members()).filter(|m| m.id != me).cloned().collect::<Vec<_>>();
        targets.sort();
        targets.dedup_by_key(|m| m.id);

        for target in targets {
            self.send(target, req.clone().into());
        }

        if let Some(change) = change {
            self.respond_change(&change, true);
        }

        if !is_member {
            tracing::info!(successor = display(successor.display()), "leader is removed, quit");
            self.set_role(Role::Inactive);
            return;
        }

        self.update_server_state();
        self.leader_commit();
    }

    // --- helpers

    pub(crate) fn set_role(&mut self, role: Role) {
        let prev = std::mem::replace(&mut self.role, role);

        if let Role::Leader(l) = prev {
            self.quit_leader(*l);
        }

        self.update_server_state();
    }

    /// Fail what the leader accepted and can no longer track.
    fn quit_leader(&mut self, leader: LeaderState) {
        self.output.push_command(Command::CancelProposals {
            term: self.state.term.term(),
        });

        if let Some(change) = leader.change {
            if !change.local {
                self.respond_change(&change, false);
            }
        }
    }

    pub(crate) fn update_server_state(&mut self) {
        let server_state = self.role.server_state();

        if server_state == self.server_state {
            return;
        }

        tracing::info!(
            from = display(self.server_state),
            to = display(server_state),
            "server state changed"
        );

        self.server_state = server_state;
        self.output.push_command(Command::UpdateServerState { server_state });
    }

    pub(crate) fn reset_election_deadline(&mut self) {
        self.timer.reset_election_deadline(self.config.new_rand_election_timeout());
    }

    pub(crate) fn send(&mut self, target: Member, body: MessageBody) {
        self.output.push_command(Command::Send { target, body });
    }

    pub(crate) fn forward_to_leader(&self) -> ForwardToLeader {
        let me = self.id();
        let leader = self.state.term.leader().map(|l| l.member.clone()).filter(|m| m.id != me);
        ForwardToLeader::new(leader)
    }

    pub(crate) fn is_committed_member(&self, id: &NodeId) -> bool {
        self.state.membership.committed().config.contains(id)
    }

    fn is_quorum(&self, granted: &BTreeSet<NodeId>) -> bool {
        self.state.membership.committed().config.voter_ids().is_quorum(granted.iter())
    }

    /// Voters of the committed configuration, except this member.
    fn other_voters(&self) -> Vec<Member> {
        let me = self.id();
        self.state.membership.committed().config.members().filter(|m| m.id != me).cloned().collect()
    }

    pub(crate) fn vote_handler(&mut self) -> VoteHandler<'_> {
        VoteHandler {
            config: &self.config,
            state: &mut self.state,
            timer: &mut self.timer,
            output: &mut self.output,
        }
    }

    pub(crate) fn following_handler(&mut self) -> FollowingHandler<'_> {
        FollowingHandler {
            state: &mut self.state,
            output: &mut self.output,
        }
    }

    /// Returns `None` if this member is not a leader.
    pub(crate) fn replication_handler(&mut self) -> Option<ReplicationHandler<'_>> {
        let Role::Leader(leader) = &mut self.role else {
            return None;
        };

        Some(ReplicationHandler {
            config: &self.config,
            state: &mut self.state,
            leader: &mut **leader,
            output: &mut self.output,
        })
    }
}

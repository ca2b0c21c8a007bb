//! Adding and removing one member at a time.
//!
//! A member that wants to join or leave asks the leader, which appends a configuration with
//! the member added or removed. The new configuration takes effect once it is committed. Until
//! then the leader refuses any other change.

use crate::display_ext::DisplayOptionExt;
use crate::engine::role::ChangeKind;
use crate::engine::role::JoiningState;
use crate::engine::role::LeavingState;
use crate::engine::role::PendingChange;
use crate::engine::role::Role;
use crate::engine::Command;
use crate::engine::Engine;
use crate::error::MembershipChangeError;
use crate::network::JoinRequest;
use crate::network::JoinResponse;
use crate::network::LeaveRequest;
use crate::network::LeaveResponse;
use crate::network::MessageBody;
use crate::network::RequestId;
use crate::EntryPayload;
use crate::LogId;
use crate::Member;

impl Engine {
    /// Ask to be added to the cluster, through one of `contacts`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn join(&mut self, contacts: Vec<Member>, request_id: RequestId) -> Result<(), MembershipChangeError> {
        if self.role != Role::Inactive {
            return Err(MembershipChangeError::NotAllowed {
                state: self.server_state,
            });
        }

        let me = self.id();
        let contacts = contacts.into_iter().filter(|m| m.id != me).collect::<Vec<_>>();
        if contacts.is_empty() {
            return Err(MembershipChangeError::NoContacts);
        }

        tracing::info!(request_id = display(request_id), contacts = debug(&contacts), "{}", func_name!());

        self.set_role(Role::Joining(JoiningState {
            request_id,
            contacts,
            next_contact: 0,
            leader_hint: None,
            sent_at: None,
        }));
        self.send_join();

        Ok(())
    }

    /// Send the join request to the suggested leader, the known leader or the next contact.
    pub(crate) fn send_join(&mut self) {
        let now = self.timer.now();
        let me = self.config.me.clone();
        let leader = self.state.term.leader().map(|l| l.member.clone()).filter(|m| m.id != me.id);

        let Role::Joining(j) = &mut self.role else {
            return;
        };

        let target = match j.leader_hint.take().or(leader) {
            Some(t) => t,
            None => {
                let t = j.contacts[j.next_contact % j.contacts.len()].clone();
                j.next_contact += 1;
                t
            }
        };

        j.sent_at = Some(now);

        let req = JoinRequest {
            request_id: j.request_id,
            member: me,
        };

        tracing::debug!(to = display(&target), req = display(&req), "{}", func_name!());

        self.send(target, req.into());
    }

    /// Ask the leader to be removed from the cluster.
    ///
    /// A leader removes itself. It keeps leading until the configuration without it is
    /// committed.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn leave(&mut self, request_id: RequestId) -> Result<(), MembershipChangeError> {
        let me = self.config.me.clone();

        let committed = &self.state.membership.committed().config;
        if committed.len() == 1 && committed.contains(&me.id) {
            return Err(MembershipChangeError::LastMember { id: me.id });
        }

        tracing::info!(request_id = display(request_id), state = display(self.server_state), "{}", func_name!());

        match self.role {
            Role::Follower(_) => {
                self.set_role(Role::Leaving(LeavingState {
                    request_id,
                    leader_hint: None,
                    sent_at: None,
                }));
                self.send_leave();
                Ok(())
            }
            Role::Leader(_) => {
                self.propose_change(ChangeKind::Leave, me, request_id, true)?;
                Ok(())
            }
            _ => Err(MembershipChangeError::NotAllowed {
                state: self.server_state,
            }),
        }
    }

    /// Send the leave request to the suggested or the known leader.
    pub(crate) fn send_leave(&mut self) {
        let now = self.timer.now();
        let me = self.config.me.clone();
        let leader = self.state.term.leader().map(|l| l.member.clone()).filter(|m| m.id != me.id);

        let Role::Leaving(l) = &mut self.role else {
            return;
        };

        l.sent_at = Some(now);

        let Some(target) = l.leader_hint.take().or(leader) else {
            tracing::debug!("no leader known, wait for one");
            return;
        };

        let req = LeaveRequest {
            request_id: l.request_id,
            member: me,
        };

        tracing::debug!(to = display(&target), req = display(&req), "{}", func_name!());

        self.send(target, req.into());
    }

    pub(crate) fn handle_join_request(&mut self, req: JoinRequest) {
        if self.role.leader().is_none() {
            self.reject_change(ChangeKind::Join, req.member, req.request_id);
            return;
        }

        let committed = self.state.membership.committed();
        if committed.config.get(&req.member.id) == Some(&req.member) {
            tracing::info!(member = display(&req.member), "already a member");
            let change = PendingChange {
                log_id: LogId::default(),
                kind: ChangeKind::Join,
                requester: req.member,
                request_id: req.request_id,
                local: false,
            };
            self.respond_change(&change, true);
            return;
        }

        self.handle_remote_change(ChangeKind::Join, req.member, req.request_id);
    }

    pub(crate) fn handle_leave_request(&mut self, req: LeaveRequest) {
        if self.role.leader().is_none() {
            self.reject_change(ChangeKind::Leave, req.member, req.request_id);
            return;
        }

        if req.member.id == self.id() {
            tracing::warn!("ignore leave request from self");
            return;
        }

        if !self.state.membership.latest().config.contains(&req.member.id) && !self.state.membership.has_pending() {
            tracing::info!(member = display(&req.member), "already removed");
            let change = PendingChange {
                log_id: LogId::default(),
                kind: ChangeKind::Leave,
                requester: req.member,
                request_id: req.request_id,
                local: false,
            };
            self.respond_change(&change, true);
            return;
        }

        self.handle_remote_change(ChangeKind::Leave, req.member, req.request_id);
    }

    /// Propose the change requested by another member, or attach the request to the same change
    /// in progress.
    fn handle_remote_change(&mut self, kind: ChangeKind, requester: Member, request_id: RequestId) {
        let res = self.propose_change(kind, requester.clone(), request_id, false);

        let Err(err) = res else {
            return;
        };

        let pending = match err {
            MembershipChangeError::ConfigurationChangeInProgress { pending } => pending,
            err => {
                tracing::info!(error = display(&err), "reject change");
                self.reject_change(kind, requester, request_id);
                return;
            }
        };

        let latest = &self.state.membership.latest().config;
        let is_same_outcome = match kind {
            ChangeKind::Join => latest.get(&requester.id) == Some(&requester),
            ChangeKind::Leave => !latest.contains(&requester.id),
        };

        let Role::Leader(l) = &mut self.role else {
            return;
        };

        let is_attachable = match &l.change {
            None => true,
            Some(c) => !c.local && c.requester.id == requester.id,
        };

        if is_same_outcome && is_attachable {
            tracing::info!(
                requester = display(&requester),
                pending = display(pending),
                "respond when the pending configuration is committed"
            );
            l.change = Some(PendingChange {
                log_id: pending,
                kind,
                requester,
                request_id,
                local: false,
            });
            return;
        }

        tracing::info!(pending = display(pending), "reject change: another change in progress");
        self.reject_change(kind, requester, request_id);
    }

    /// Append a configuration with `requester` added or removed, as a leader.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn propose_change(
        &mut self,
        kind: ChangeKind,
        requester: Member,
        request_id: RequestId,
        local: bool,
    ) -> Result<LogId, MembershipChangeError> {
        if self.role.leader().is_none() {
            return Err(self.forward_to_leader().into());
        }

        if let Some(p) = self.state.membership.pending() {
            return Err(MembershipChangeError::ConfigurationChangeInProgress {
                pending: p.log_id.unwrap_or_default(),
            });
        }

        let committed = &self.state.membership.committed().config;
        let config = match kind {
            ChangeKind::Join => committed.with_member(requester.clone()),
            ChangeKind::Leave => committed.without_member(&requester.id),
        };

        if config.is_empty() {
            return Err(MembershipChangeError::LastMember { id: requester.id });
        }

        tracing::info!(requester = display(&requester), config = display(&config), "{}", func_name!());

        let Some(mut rh) = self.replication_handler() else {
            return Err(self.forward_to_leader().into());
        };

        let log_id = rh.append_entry(EntryPayload::Configuration(config));
        rh.rebuild_progress();
        rh.send_to_all();

        rh.leader.change = Some(PendingChange {
            log_id,
            kind,
            requester,
            request_id,
            local,
        });

        self.update_server_state();
        self.leader_commit();

        Ok(log_id)
    }

    pub(crate) fn handle_join_response(&mut self, resp: JoinResponse) {
        let me = self.id();

        let Role::Joining(j) = &mut self.role else {
            return;
        };

        if resp.request_id != j.request_id {
            tracing::debug!(resp = display(&resp), "ignore response to another request");
            return;
        }

        if !resp.accepted {
            // Resent at the next timeout, to the suggested leader.
            j.leader_hint = resp.leader.filter(|m| m.id != me);
            tracing::info!(hint = display(j.leader_hint.display()), "join rejected");
            return;
        }

        self.follow_responder(resp.term, resp.leader.as_ref());

        if let Some(c) = resp.configuration {
            self.adopt_configuration(c);
        }
    }

    pub(crate) fn handle_leave_response(&mut self, resp: LeaveResponse) {
        let me = self.id();

        let Role::Leaving(l) = &mut self.role else {
            return;
        };

        if resp.request_id != l.request_id {
            tracing::debug!(resp = display(&resp), "ignore response to another request");
            return;
        }

        if !resp.accepted {
            l.leader_hint = resp.leader.filter(|m| m.id != me);
            tracing::info!(hint = display(l.leader_hint.display()), "leave rejected");
            return;
        }

        self.follow_responder(resp.term, resp.leader.as_ref());

        match resp.configuration {
            Some(c) => self.adopt_configuration(c),
            None => tracing::warn!("leave accepted without a configuration"),
        }
    }

    /// Take the term and the leader from an accepted join or leave response, so that a new
    /// follower does not start an election for a stale term before the first append arrives.
    fn follow_responder(&mut self, term: u64, leader: Option<&Member>) {
        let leader = leader.filter(|m| m.id != self.id());

        if self.vote_handler().update_term_and_leader(term, leader) && leader.is_some() {
            self.timer.seen_leader();
            self.reset_election_deadline();
        }
    }

    /// Respond to the member that requested a change. A local change resolves its future.
    pub(crate) fn respond_change(&mut self, change: &PendingChange, accepted: bool) {
        let term = self.state.term.term();
        let committed = self.state.membership.committed().clone();

        if change.local {
            let result = if accepted {
                Ok(committed.config)
            } else {
                Err(MembershipChangeError::Aborted {
                    state: self.server_state,
                })
            };

            self.output.push_command(Command::ResolveRequest {
                request_id: change.request_id,
                result,
            });
            return;
        }

        let configuration = if accepted { Some(committed) } else { None };
        let leader = self.state.term.leader().map(|l| l.member.clone());

        let body: MessageBody = match change.kind {
            ChangeKind::Join => JoinResponse {
                request_id: change.request_id,
                term,
                accepted,
                configuration,
                leader,
            }
            .into(),
            ChangeKind::Leave => LeaveResponse {
                request_id: change.request_id,
                term,
                accepted,
                configuration,
                leader,
            }
            .into(),
        };

        self.send(change.requester.clone(), body);
    }

    /// Refuse a change, pointing the requester to the leader if one is known.
    fn reject_change(&mut self, kind: ChangeKind, requester: Member, request_id: RequestId) {
        let change = PendingChange {
            log_id: LogId::default(),
            kind,
            requester,
            request_id,
            local: false,
        };
        self.respond_change(&change, false);
    }
}

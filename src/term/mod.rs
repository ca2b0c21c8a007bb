//! Term and leadership tracking.


use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::display_ext::DisplayOptionExt;
use crate::storage::HardState;
use crate::Member;
use crate::NodeId;

/// The leader a member knows about, and the term it leads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct LeaderRef {
    pub term: u64,
    pub member: Member,
}

impl Display for LeaderRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "T{}:{}", self.term, self.member)
    }
}

/// The current term, the vote granted in it and the leader of it.
///
/// The term never decreases. The leader is set at most once per term and is cleared when the
/// term increases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermState {
    term: u64,
    voted_for: Option<NodeId>,
    leader: Option<LeaderRef>,
}

impl Display for TermState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term: {}, voted_for: {}, leader: {}}}",
            self.term,
            self.voted_for.display(),
            self.leader.display()
        )
    }
}

impl TermState {
    /// Restore from the persisted hard state. The leader is never persisted.
    pub fn new(hard_state: HardState) -> Self {
        Self {
            term: hard_state.term,
            voted_for: hard_state.voted_for,
            leader: None,
        }
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn leader(&self) -> Option<&LeaderRef> {
        self.leader.as_ref()
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.leader.as_ref().map(|l| l.member.id)
    }

    /// The part of the state that must survive a restart.
    pub fn hard_state(&self) -> HardState {
        HardState {
            term: self.term,
            voted_for: self.voted_for,
        }
    }

    /// Adopt a greater term and/or the first known leader of the current term.
    ///
    /// A greater term clears the vote and the leader. Returns `false` if `term` is not greater
    /// and no new leader is learned, i.e., nothing changed. A caller that is a candidate or a
    /// leader must step down when it returns `true`.
    pub fn update_term_and_leader(&mut self, term: u64, leader: Option<&Member>) -> bool {
        if term > self.term {
            self.term = term;
            self.voted_for = None;
            self.leader = leader.map(|m| LeaderRef {
                term,
                member: m.clone(),
            });
            return true;
        }

        if term == self.term && self.leader.is_none() {
            if let Some(m) = leader {
                self.leader = Some(LeaderRef {
                    term,
                    member: m.clone(),
                });
                return true;
            }
        }

        false
    }

    /// Record the vote granted in the current term.
    ///
    /// It returns `false` if a vote for another candidate has already been granted in this term.
    pub fn vote_for(&mut self, candidate: NodeId) -> bool {
        match self.voted_for {
            Some(v) if v != candidate => false,
            _ => {
                self.voted_for = Some(candidate);
                true
            }
        }
    }

    /// Start a new term as a candidate voting for itself.
    pub fn increase_term_for_self(&mut self, id: NodeId) -> u64 {
        self.term += 1;
        self.voted_for = Some(id);
        self.leader = None;
        self.term
    }

    /// Become the leader of the current term.
    pub fn set_self_leader(&mut self, me: &Member) {
        debug_assert!(self.leader.is_none(), "leader is set at most once per term");
        debug_assert_eq!(Some(me.id), self.voted_for);

        self.leader = Some(LeaderRef {
            term: self.term,
            member: me.clone(),
        });
    }
}

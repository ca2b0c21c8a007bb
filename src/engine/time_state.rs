use std::time::Duration;
use std::time::Instant;

/// Time related state of the engine.
///
/// The engine never reads a clock: the runtime updates `now` before every call into it.
#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
pub(crate) struct TimeState {
    /// Cached current time.
    now: Instant,

    /// When a follower starts a pre-vote, or a candidate starts a new election.
    election_deadline: Instant,

    /// The last time a message from a leader of the current term is received.
    leader_seen_at: Option<Instant>,
}

impl TimeState {
    pub(crate) fn new(now: Instant, election_timeout: Duration) -> Self {
        Self {
            now,
            election_deadline: now + election_timeout,
            leader_seen_at: None,
        }
    }

    pub(crate) fn now(&self) -> Instant {
        self.now
    }

    pub(crate) fn update_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    pub(crate) fn reset_election_deadline(&mut self, timeout: Duration) {
        self.election_deadline = self.now + timeout;
    }

    pub(crate) fn is_election_due(&self) -> bool {
        self.now >= self.election_deadline
    }

    pub(crate) fn seen_leader(&mut self) {
        self.leader_seen_at = Some(self.now);
    }

    /// Whether a leader is heard from within the last `d`.
    pub(crate) fn leader_seen_within(&self, d: Duration) -> bool {
        match self.leader_seen_at {
            None => false,
            Some(t) => self.now.saturating_duration_since(t) < d,
        }
    }
}

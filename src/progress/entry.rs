use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use validit::Validate;

use crate::display_ext::DisplayOptionExt;
use crate::progress::Inflight;
use crate::LogId;
use crate::LogIdOptionExt;

/// State of replication to a target member.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub(crate) struct ProgressEntry {
    /// The id of the last log entry known to match the leader's on the target.
    pub(crate) matching: Option<LogId>,

    /// Index of the next entry to send to the target.
    ///
    /// Entries before it are assumed to match. On a conflict it is moved backwards, but never to
    /// or before `matching`.
    pub(crate) next_index: u64,

    /// The data being transmitted in flight.
    pub(crate) inflight: Inflight,
}

impl ProgressEntry {
    /// Create a progress entry that optimistically assumes the target has everything before
    /// `next_index`.
    pub(crate) fn empty(next_index: u64) -> Self {
        Self {
            matching: None,
            next_index,
            inflight: Inflight::None,
        }
    }

    /// Create a progress entry of a member that is known to have `matching`, such as the leader
    /// itself.
    pub(crate) fn new(matching: Option<LogId>) -> Self {
        Self {
            matching,
            next_index: matching.next_index(),
            inflight: Inflight::None,
        }
    }

    /// Decide what to send next, given the last index of the leader's log.
    ///
    /// Returns the range `(prev_index, last_index]` to send, or `None` if a request is already in
    /// flight. An empty range is a heartbeat.
    pub(crate) fn next_send(&mut self, leader_last_index: u64, max_entries: u64) -> Option<Inflight> {
        if !self.inflight.is_none() {
            return None;
        }

        let prev_index = self.next_index - 1;
        let last_index = std::cmp::min(leader_last_index, prev_index + max_entries);
        let last_index = std::cmp::max(last_index, prev_index);

        self.inflight = Inflight::logs(prev_index, last_index);
        Some(self.inflight)
    }

    /// Forget the request in flight, e.g. when it is considered lost and should be re-sent.
    pub(crate) fn reset_inflight(&mut self) {
        self.inflight = Inflight::None;
    }

    /// The target accepted entries up to `matching`.
    ///
    /// A smaller value is ignored: responses may arrive out of order.
    pub(crate) fn update_matching(&mut self, matching: Option<LogId>) {
        self.inflight = Inflight::None;

        if matching > self.matching {
            self.matching = matching;
        }

        if self.matching.next_index() > self.next_index {
            self.next_index = self.matching.next_index();
        }
    }

    /// The target rejected an append because its log does not contain the entry before
    /// `next_index`. `conflict_index` is where the target suggests to restart.
    ///
    /// The next request starts at a strictly smaller index, but never at or before a matching one.
    pub(crate) fn update_conflicting(&mut self, conflict_index: u64) {
        self.inflight = Inflight::None;

        let probe = std::cmp::min(conflict_index, self.next_index.saturating_sub(1));
        self.next_index = std::cmp::max(probe, self.matching.next_index()).max(1);
    }
}

impl Display for ProgressEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{matching: {}, next: {}, inflight: {}}}",
            self.matching.display(),
            self.next_index,
            self.inflight
        )
    }
}

impl Validate for ProgressEntry {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        validit::less_equal!(self.matching.next_index(), self.next_index);

        if let Inflight::Logs { prev_index, .. } = self.inflight {
            validit::equal!(prev_index + 1, self.next_index);
        }

        Ok(())
    }
}

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use validit::Validate;

use crate::membership::Configuration;
use crate::membership::EffectiveConfiguration;
use crate::LogId;
use crate::LogIdOptionExt;

/// Keeps the committed configuration and the configurations that are in the log but not yet
/// committed.
///
/// A leader proposes at most one configuration at a time. A follower may however hold more than
/// one uncommitted configuration, e.g., when it has not yet learned that the previous one is
/// committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MembershipRegistry {
    committed: EffectiveConfiguration,
    pending: VecDeque<EffectiveConfiguration>,
}

impl Display for MembershipRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{committed: {}, pending: [", self.committed)?;
        for (i, p) in self.pending.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "]}}")
    }
}

impl MembershipRegistry {
    pub(crate) fn new(committed: EffectiveConfiguration) -> Self {
        Self {
            committed,
            pending: VecDeque::new(),
        }
    }

    /// The configuration used to count votes and to decide commitment.
    pub(crate) fn committed(&self) -> &EffectiveConfiguration {
        &self.committed
    }

    /// The latest configuration that is in the log but not yet committed.
    pub(crate) fn pending(&self) -> Option<&EffectiveConfiguration> {
        self.pending.back()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The latest configuration, committed or not.
    pub(crate) fn latest(&self) -> &EffectiveConfiguration {
        self.pending.back().unwrap_or(&self.committed)
    }

    /// A configuration entry has been appended to the log.
    ///
    /// An entry that is not newer than the latest known configuration is ignored. It happens
    /// when a configuration is adopted before its entry is replicated.
    pub(crate) fn append(&mut self, log_id: LogId, config: Configuration) {
        if Some(log_id) <= self.latest().log_id {
            return;
        }

        self.pending.push_back(EffectiveConfiguration::new(Some(log_id), config));
    }

    /// Entries since `index` have been removed from the log.
    ///
    /// Returns `true` if a pending configuration is dropped.
    pub(crate) fn truncate(&mut self, since: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|c| c.log_id.map(|x| x.index) < Some(since));
        before != self.pending.len()
    }

    /// Entries up to `committed` have been committed.
    ///
    /// Returns the new committed configuration if it changed.
    pub(crate) fn commit(&mut self, committed: u64) -> Option<&EffectiveConfiguration> {
        let mut changed = false;

        while let Some(first) = self.pending.front() {
            if first.log_id.map(|x| x.index) > Some(committed) {
                break;
            }

            if let Some(c) = self.pending.pop_front() {
                self.committed = c;
                changed = true;
            }
        }

        if changed {
            Some(&self.committed)
        } else {
            None
        }
    }

    /// Adopt a configuration a leader announced as committed.
    ///
    /// Pending configurations that are not newer are dropped. Returns `true` if the committed
    /// configuration changed.
    pub(crate) fn adopt(&mut self, c: EffectiveConfiguration) -> bool {
        if c.log_id <= self.committed.log_id {
            return false;
        }

        self.pending.retain(|p| p.log_id > c.log_id);
        self.committed = c;
        true
    }
}

impl Validate for MembershipRegistry {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        let mut prev = self.committed.log_id;
        for p in self.pending.iter() {
            validit::less_equal!(prev.next_index(), p.log_id.index());
            prev = p.log_id;
        }
        Ok(())
    }
}

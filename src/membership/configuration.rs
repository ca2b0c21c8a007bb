use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::display_ext::DisplayOptionExt;
use crate::LogId;
use crate::Member;
use crate::NodeId;

/// The set of members of a partition.
///
/// Every member is a voter. A configuration is only changed one member at a time, and every
/// change increases `version` by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Configuration {
    pub version: u64,
    pub members: BTreeMap<NodeId, Member>,
}

impl Display for Configuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}:{{", self.version)?;
        for (i, m) in self.members.values().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", m)?;
        }
        write!(f, "}}")
    }
}

impl Configuration {
    pub fn new(version: u64, members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            version,
            members: members.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The ids that form the majority quorum of this configuration.
    pub fn voter_ids(&self) -> BTreeSet<NodeId> {
        self.members.keys().copied().collect()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Build the next configuration with `member` added, or its endpoint replaced.
    pub fn with_member(&self, member: Member) -> Self {
        let mut members = self.members.clone();
        members.insert(member.id, member);

        Self {
            version: self.version + 1,
            members,
        }
    }

    /// Build the next configuration with the member `id` removed.
    pub fn without_member(&self, id: &NodeId) -> Self {
        let mut members = self.members.clone();
        members.remove(id);

        Self {
            version: self.version + 1,
            members,
        }
    }
}

/// A configuration and the id of the log entry that carries it.
///
/// `log_id` is `None` only for the empty configuration of a member that has never seen one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct EffectiveConfiguration {
    pub log_id: Option<LogId>,
    pub config: Configuration,
}

impl Display for EffectiveConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.config, self.log_id.display())
    }
}

impl EffectiveConfiguration {
    pub fn new(log_id: Option<LogId>, config: Configuration) -> Self {
        Self { log_id, config }
    }
}

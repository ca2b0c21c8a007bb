use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// Logical id of a member. Unique within a partition's configurations.
pub type NodeId = u64;

/// Identifies the logical partition a [`Raft`](crate::Raft) instance replicates.
pub type PartitionId = u32;

/// Network address a member can be reached at.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl ToString, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A participant of a partition: a logical id plus the endpoint it is reachable at.
///
/// A `Member` is immutable. An address change replaces the whole value through a new
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Member {
    pub id: NodeId,
    pub endpoint: Endpoint,
}

impl Member {
    pub fn new(id: NodeId, endpoint: Endpoint) -> Self {
        Self { id, endpoint }
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint)
    }
}

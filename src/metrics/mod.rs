//! Read-only snapshots of a partition's state.
//!
//! A [`Raft`](crate::Raft) publishes a new [`RaftMetrics`] through a `tokio::sync::watch` channel
//! whenever any field changes. Other components observe a partition only through these snapshots.

mod server_state;

pub use server_state::ServerState;

use std::fmt;

use crate::display_ext::DisplayOptionExt;
use crate::Configuration;
use crate::NodeId;
use crate::PartitionId;

/// A snapshot of the state of one partition member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct RaftMetrics {
    pub id: NodeId,
    pub partition: PartitionId,

    /// The role this member is in.
    pub state: ServerState,

    pub term: u64,

    /// The leader of the current term, if known.
    pub leader: Option<NodeId>,

    /// The index of the last entry, 0 if the log is empty.
    pub last_log_index: u64,

    pub committed: u64,

    /// The committed configuration.
    pub configuration: Configuration,
}

impl fmt::Display for RaftMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics{{id:{}, partition:{}, {}, term:{}, leader:{}, last_log:{}, committed:{}, configuration:{}}}",
            self.id,
            self.partition,
            self.state,
            self.term,
            self.leader.display(),
            self.last_log_index,
            self.committed,
            self.configuration,
        )
    }
}

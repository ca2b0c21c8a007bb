/// The role a partition member is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(derive_more::Display)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ServerState {
    /// Not part of any configuration, or closed.
    #[default]
    Inactive,

    /// Replicates the log from a leader.
    Follower,

    /// Requesting votes for a new term.
    Candidate,

    /// Accepts proposals and replicates them.
    Leader,

    /// Waiting for a leader to add it to the configuration.
    Joining,

    /// Waiting for a leader to remove it from the configuration.
    Leaving,
}

impl ServerState {
    pub fn is_leader(&self) -> bool {
        *self == ServerState::Leader
    }

    pub fn is_follower(&self) -> bool {
        *self == ServerState::Follower
    }
}

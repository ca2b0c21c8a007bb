use std::time::Duration;

use rand::thread_rng;
use rand::Rng;

use crate::Config;
use crate::Member;
use crate::NodeId;

/// Config for Engine
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub(crate) struct EngineConfig {
    /// This member.
    pub(crate) me: Member,

    pub(crate) election_timeout_min: Duration,
    pub(crate) election_timeout_max: Duration,

    pub(crate) heartbeat_interval: Duration,

    /// How long to wait for a join or leave response before sending the request again.
    pub(crate) request_timeout: Duration,

    /// The maximum number of entries per append request.
    pub(crate) max_payload_entries: u64,
}

impl EngineConfig {
    pub(crate) fn new(me: Member, config: &Config) -> Self {
        Self {
            me,
            election_timeout_min: Duration::from_millis(config.election_timeout_min),
            election_timeout_max: Duration::from_millis(config.election_timeout_max),
            heartbeat_interval: config.heartbeat_interval(),
            request_timeout: config.request_timeout(),
            max_payload_entries: config.max_payload_entries,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_default(me: Member) -> Self {
        Self {
            me,
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(50),
            request_timeout: Duration::from_millis(1000),
            max_payload_entries: 300,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.me.id
    }

    /// A random election timeout in `[min, max)`.
    pub(crate) fn new_rand_election_timeout(&self) -> Duration {
        thread_rng().gen_range(self.election_timeout_min..self.election_timeout_max)
    }
}

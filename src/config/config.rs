use std::time::Duration;

use anyerror::AnyError;
use clap::Parser;
use rand::thread_rng;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::config::error::ConfigError;

/// The runtime configuration of a partition member.
///
/// All durations are in milliseconds. Keep `heartbeat_interval` well below `election_timeout_min`
/// so that a healthy leader is never suspected by its followers.
#[derive(Clone, Debug, Serialize, Deserialize, Parser)]
pub struct Config {
    /// The application specific name of this cluster
    #[clap(long, env = "RAFT_CLUSTER_NAME", default_value = "flow")]
    pub cluster_name: String,

    /// The minimum election timeout in milliseconds
    #[clap(long, env = "RAFT_ELECTION_TIMEOUT_MIN", default_value = "150")]
    pub election_timeout_min: u64,

    /// The maximum election timeout in milliseconds
    #[clap(long, env = "RAFT_ELECTION_TIMEOUT_MAX", default_value = "300")]
    pub election_timeout_max: u64,

    /// The interval in milliseconds at which a leader sends append requests to every member
    #[clap(long, env = "RAFT_HEARTBEAT_INTERVAL", default_value = "50")]
    pub heartbeat_interval: u64,

    /// The maximum number of entries per append request
    #[clap(long, env = "RAFT_MAX_PAYLOAD_ENTRIES", default_value = "300")]
    pub max_payload_entries: u64,

    /// The time in milliseconds to wait for a join or leave response before retrying
    #[clap(long, env = "RAFT_REQUEST_TIMEOUT", default_value = "1000")]
    pub request_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl Config {
    /// Generate a new random election timeout within the configured min & max.
    pub fn new_rand_election_timeout(&self) -> Duration {
        let ms = thread_rng().gen_range(self.election_timeout_min..self.election_timeout_max);
        Duration::from_millis(ms)
    }

    pub fn election_timeout_min(&self) -> Duration {
        Duration::from_millis(self.election_timeout_min)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    /// Build a `Config` from command line arguments, the first one being the program name.
    pub fn build(args: &[&str]) -> Result<Config, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::new(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;
        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<Config, ConfigError> {
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(ConfigError::ElectionTimeout {
                min: self.election_timeout_min,
                max: self.election_timeout_max,
            });
        }

        if self.election_timeout_min <= self.heartbeat_interval {
            return Err(ConfigError::ElectionTimeoutLTHeartBeat {
                election_timeout_min: self.election_timeout_min,
                heartbeat_interval: self.heartbeat_interval,
            });
        }

        if self.max_payload_entries == 0 {
            return Err(ConfigError::MaxPayloadIs0);
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::RequestTimeoutIs0);
        }

        Ok(self)
    }
}

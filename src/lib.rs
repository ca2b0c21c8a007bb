#![allow(clippy::bool_assert_comparison, clippy::type_complexity)]
#![deny(unused_qualifications)]

//! Consensus and replication core of one workflow-engine partition.
//!
//! A partition is a replicated, append-only log. This crate elects a single leader per
//! partition, replicates the log to a quorum of members and changes the membership one member
//! at a time, all as a single-threaded, cooperative state machine:
//!
//! - An external scheduler repeatedly calls [`Raft::do_work`]. Every call performs a bounded
//!   amount of work and never blocks.
//! - Inbound messages from other members are passed to [`Raft::handle_message`].
//! - Outbound messages are handed to a [`RaftNetwork`] implementation, fire-and-forget.
//! - Entries are persisted through a synchronous [`RaftLogStorage`].
//!
//! The workflow engine above submits opaque payloads with [`Raft::propose`] and reads them
//! back, in order, once committed with [`Raft::committed_entries`].
//!
//! Internally the protocol lives in a pure `Engine` that never performs I/O: it only emits
//! commands, which [`Raft`] executes against the storage and the network.

macro_rules! func_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let n = &name[..name.len() - 3];
        let nn = n.replace("::{{closure}}", "");
        nn.split("::").last().unwrap_or_default().to_string()
    }};
}

mod config;
mod display_ext;
mod node;
mod progress;
mod quorum;

pub(crate) mod engine;

pub mod entry;
pub mod error;
pub mod log_id;
pub mod membership;
pub mod metrics;
pub mod network;
pub mod raft;
pub mod storage;
pub mod term;
pub mod timer;

pub use anyerror;
pub use anyerror::AnyError;

pub use crate::config::Config;
pub use crate::config::ConfigError;
pub use crate::entry::Entry;
pub use crate::entry::EntryPayload;
pub use crate::log_id::LogId;
pub use crate::log_id::LogIdOptionExt;
pub use crate::membership::Configuration;
pub use crate::membership::EffectiveConfiguration;
pub use crate::metrics::RaftMetrics;
pub use crate::metrics::ServerState;
pub use crate::network::Envelope;
pub use crate::network::MessageBody;
pub use crate::network::RaftNetwork;
pub use crate::node::Endpoint;
pub use crate::node::Member;
pub use crate::node::NodeId;
pub use crate::node::PartitionId;
pub use crate::raft::CommittedCursor;
pub use crate::raft::Raft;
pub use crate::storage::HardState;
pub use crate::storage::LogState;
pub use crate::storage::MemLogStorage;
pub use crate::storage::RaftLogStorage;
pub use crate::storage::StorageError;
pub use crate::term::LeaderRef;
pub use crate::timer::Clock;
pub use crate::timer::ManualClock;
pub use crate::timer::StdClock;

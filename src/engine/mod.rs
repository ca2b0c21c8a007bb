//! The protocol of a partition member, free of any I/O.
//!
//! [`Engine`] receives local operations, inbound messages and ticks, updates the in-memory
//! [`RaftState`](raft_state::RaftState) and emits [`Command`]s. The runtime executes the commands
//! in order: it persists entries and the hard state, sends messages and resolves futures.

mod change_membership;
mod command;
mod engine_config;
mod engine_impl;
mod engine_output;
mod time_state;

pub(crate) mod handler;
pub(crate) mod raft_state;
pub(crate) mod role;

#[cfg(test)] mod testing;

#[cfg(test)] mod handle_vote_test;

pub(crate) use command::Command;
pub(crate) use engine_config::EngineConfig;
pub(crate) use engine_impl::Engine;
pub(crate) use engine_output::EngineOutput;

//! Log entry and its payload.

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::membership::Configuration;
use crate::LogId;

/// The payload of a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum EntryPayload {
    /// An empty payload committed by a leader to establish its leadership.
    Blank,

    /// An opaque payload proposed by the workflow engine.
    Normal(Vec<u8>),

    /// A cluster configuration. It takes effect once the entry is committed.
    Configuration(Configuration),
}

impl Display for EntryPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EntryPayload::Blank => write!(f, "blank"),
            EntryPayload::Normal(data) => write!(f, "normal({} bytes)", data.len()),
            EntryPayload::Configuration(c) => write!(f, "configuration: {}", c),
        }
    }
}

/// A record of the replicated log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Entry {
    pub log_id: LogId,

    pub payload: EntryPayload,
}

impl Display for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_id, self.payload)
    }
}

impl Entry {
    pub fn new(log_id: LogId, payload: EntryPayload) -> Self {
        Self { log_id, payload }
    }

    pub fn blank(log_id: LogId) -> Self {
        Self::new(log_id, EntryPayload::Blank)
    }

    pub fn normal(log_id: LogId, data: impl Into<Vec<u8>>) -> Self {
        Self::new(log_id, EntryPayload::Normal(data.into()))
    }

    pub fn configuration(log_id: LogId, config: Configuration) -> Self {
        Self::new(log_id, EntryPayload::Configuration(config))
    }

    pub fn index(&self) -> u64 {
        self.log_id.index
    }

    pub fn term(&self) -> u64 {
        self.log_id.term
    }

    /// Returns the configuration if this entry carries one.
    pub fn get_configuration(&self) -> Option<&Configuration> {
        match &self.payload {
            EntryPayload::Configuration(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the application payload if this entry carries one.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            EntryPayload::Normal(d) => Some(d),
            _ => None,
        }
    }
}

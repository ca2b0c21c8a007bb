//! The identity of a log entry and utilities to work with optional log ids.

mod log_id_list;


use std::fmt::Display;
use std::fmt::Formatter;

pub(crate) use log_id_list::LogIdList;

/// The identity of a log entry.
///
/// Log ids are ordered lexicographically by `(term, index)`, which is exactly the order used to
/// decide which of two logs is more up to date.
///
/// Log indexes start at 1. An empty log is represented by `None`, which is smaller than any
/// `Some(log_id)`.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct LogId {
    /// The term of the leader that proposed this entry.
    pub term: u64,

    /// The position of the entry in the log.
    pub index: u64,
}

impl LogId {
    pub fn new(term: u64, index: u64) -> Self {
        Self { term, index }
    }
}

impl Display for LogId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}-{}", self.term, self.index)
    }
}

/// Index related helpers for an optional log id, where `None` stands for an empty log.
pub trait LogIdOptionExt {
    /// Returns the index, or 0 if it is `None`.
    fn index(&self) -> u64;

    /// Returns the index of the entry right after this one.
    fn next_index(&self) -> u64;

    /// Returns the term, or 0 if it is `None`.
    fn term(&self) -> u64;
}

impl LogIdOptionExt for Option<LogId> {
    fn index(&self) -> u64 {
        self.map(|x| x.index).unwrap_or_default()
    }

    fn next_index(&self) -> u64 {
        self.index() + 1
    }

    fn term(&self) -> u64 {
        self.map(|x| x.term).unwrap_or_default()
    }
}

impl LogIdOptionExt for Option<&LogId> {
    fn index(&self) -> u64 {
        self.map(|x| x.index).unwrap_or_default()
    }

    fn next_index(&self) -> u64 {
        self.index() + 1
    }

    fn term(&self) -> u64 {
        self.map(|x| x.term).unwrap_or_default()
    }
}

use std::fmt;

use anyerror::AnyError;

/// What a storage operation was working on when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSubject {
    Log(u64),
    Logs,
    HardState,
    Committed,
}

/// What a storage operation was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVerb {
    Read,
    Write,
    Delete,
}

impl fmt::Display for ErrorVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An error raised by a [`RaftLogStorage`](crate::RaftLogStorage).
///
/// Any storage error is fatal to the partition it happens in.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum StorageError {
    #[error("when {verb} {subject:?}: {source}")]
    IO {
        subject: ErrorSubject,
        verb: ErrorVerb,
        source: AnyError,
    },

    /// A persisted entry is missing or does not decode to what is expected.
    #[error("corrupt log at index {index}: {reason}")]
    Corrupt { index: u64, reason: String },
}

impl StorageError {
    pub fn new(subject: ErrorSubject, verb: ErrorVerb, source: AnyError) -> Self {
        StorageError::IO { subject, verb, source }
    }

    pub fn corrupt(index: u64, reason: impl ToString) -> Self {
        StorageError::Corrupt {
            index,
            reason: reason.to_string(),
        }
    }
}

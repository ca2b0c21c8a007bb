use std::fmt;

/// The append request being transmitted to a member and not yet responded.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub(crate) enum Inflight {
    #[default]
    None,

    /// Entries in `(prev_index, last_index]` are being sent.
    Logs { prev_index: u64, last_index: u64 },
}

impl fmt::Display for Inflight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inflight::None => write!(f, "None"),
            Inflight::Logs { prev_index, last_index } => write!(f, "Logs:({}, {}]", prev_index, last_index),
        }
    }
}

impl Inflight {
    pub(crate) fn logs(prev_index: u64, last_index: u64) -> Self {
        debug_assert!(prev_index <= last_index);
        Inflight::Logs { prev_index, last_index }
    }

    pub(crate) fn is_none(&self) -> bool {
        matches!(self, Inflight::None)
    }
}

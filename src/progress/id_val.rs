use std::fmt;

use crate::NodeId;

/// The progress value `val` of member `id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IdVal<V> {
    pub(crate) id: NodeId,
    pub(crate) val: V,
}

impl<V: fmt::Display> fmt::Display for IdVal<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.val)
    }
}

impl<V> IdVal<V> {
    pub(crate) fn new(id: NodeId, val: V) -> Self {
        Self { id, val }
    }
}

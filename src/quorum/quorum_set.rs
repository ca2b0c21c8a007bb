use crate::NodeId;

/// Decides whether a group of members is enough to elect a leader or to commit an entry.
pub(crate) trait QuorumSet {
    type Iter: Iterator<Item = NodeId>;

    /// Whether `ids` contains a quorum of this set. An id not in this set is not counted.
    fn is_quorum<'a, I>(&self, ids: I) -> bool
    where I: Iterator<Item = &'a NodeId> + Clone;

    /// Every member of this set, in ascending order.
    fn ids(&self) -> Self::Iter;
}

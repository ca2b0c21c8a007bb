use std::collections::btree_set;
use std::collections::BTreeSet;

use crate::quorum::majority_of;
use crate::quorum::QuorumSet;
use crate::NodeId;

/// The voters of a configuration: any majority of them is a quorum.
impl QuorumSet for BTreeSet<NodeId> {
    type Iter = btree_set::IntoIter<NodeId>;

    fn is_quorum<'a, I>(&self, ids: I) -> bool
    where I: Iterator<Item = &'a NodeId> + Clone {
        let majority = majority_of(self.len());
        ids.filter(|id| self.contains(id)).take(majority).count() >= majority
    }

    fn ids(&self) -> Self::Iter {
        self.clone().into_iter()
    }
}

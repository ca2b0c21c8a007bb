//! A quorum is a set of members a vote request or an append request has to reach.
//! The only quorum used by a partition is the **majority** of the committed configuration.
//! A quorum set is a collection of quorums, e.g. the quorum set of majority of `{a,b,c}` is
//! `{a,b}, {b,c}, {a,c}`.

mod quorum_set;
mod quorum_set_impl;
mod util;


pub(crate) use quorum_set::QuorumSet;
pub(crate) use util::majority_of;

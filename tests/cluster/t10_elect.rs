use std::sync::Arc;

use anyhow::Result;
use flowraft::Config;
use flowraft::ServerState;
use maplit::btreeset;
use pretty_assertions::assert_eq;

use crate::fixtures::RaftRouter;

/// A bootstrapped cluster elects exactly one leader, which every other member follows.
#[test]
fn elect_single_leader() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    for id in router.ids() {
        assert_eq!(ServerState::Follower, router.metrics(id)?.state);
    }

    let leader = router.wait_for_leader("elect leader")?;
    let term = router.metrics(leader)?.term;

    router.wait_for_committed(&[1, 2, 3], leader, 2)?;

    let mut leaders = btreeset! {};
    for id in router.ids() {
        let m = router.metrics(id)?;
        assert_eq!(term, m.term, "node {} is in the leader's term", id);
        assert_eq!(Some(leader), m.leader);
        assert_eq!(2, m.last_log_index, "config entry and blank entry");

        if m.state == ServerState::Leader {
            leaders.insert(id);
        } else {
            assert_eq!(ServerState::Follower, m.state);
        }
    }

    assert_eq!(btreeset! {leader}, leaders);

    Ok(())
}

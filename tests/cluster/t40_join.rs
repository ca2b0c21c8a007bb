use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use flowraft::Config;
use flowraft::ServerState;
use maplit::btreeset;
use pretty_assertions::assert_eq;

use crate::fixtures::member;
use crate::fixtures::RaftRouter;

/// A new member asks a follower to join, is redirected to the leader and is added once the new
/// configuration is committed.
#[test]
fn join_through_follower() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let leader = router.wait_for_leader("elect leader")?;
    router.wait_for_committed(&[1, 2, 3], leader, 2)?;

    let _rx = router.get(leader)?.propose(b"x".to_vec())?;
    router.wait_for_committed(&[1, 2, 3], leader, 3)?;

    tracing::info!("--- node 4 joins through a follower");
    let follower = router.ids().into_iter().find(|id| *id != leader).unwrap_or_default();

    router.new_node(4)?;
    assert_eq!(ServerState::Inactive, router.metrics(4)?.state);

    let mut rx = router.get(4)?.join(vec![member(follower)])?;
    assert_eq!(ServerState::Joining, router.metrics(4)?.state);

    let mut joined = None;
    router.run_until(Duration::from_secs(10), "node 4 joined", |_| {
        if let Ok(res) = rx.try_recv() {
            joined = Some(res);
        }
        Ok(joined.is_some())
    })?;

    let config = joined.unwrap_or_else(|| panic!("join is resolved"))?;
    assert_eq!(btreeset! {1,2,3,4}, config.voter_ids());

    router.wait_for_committed(&[1, 2, 3, 4], leader, 4)?;

    for id in router.ids() {
        let m = router.metrics(id)?;
        assert_eq!(btreeset! {1,2,3,4}, m.configuration.voter_ids(), "node {}", id);
    }

    assert_eq!(ServerState::Follower, router.metrics(4)?.state);
    assert_eq!(vec![b"x".to_vec()], router.committed_data(4)?);

    tracing::info!("--- the new member takes part in commits");
    let _rx = router.get(leader)?.propose(b"y".to_vec())?;
    router.wait_for_committed(&[1, 2, 3, 4], leader, 5)?;

    assert_eq!(vec![b"x".to_vec(), b"y".to_vec()], router.committed_data(4)?);

    Ok(())
}

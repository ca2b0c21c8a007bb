use std::sync::Arc;

use anyhow::Result;
use flowraft::Config;
use flowraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::RaftRouter;

/// A restarted member recovers its term, log and committed index from storage and follows again.
#[test]
fn restart_recovers_state() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let leader = router.wait_for_leader("elect leader")?;
    let _rx = router.get(leader)?.propose(b"x".to_vec())?;
    router.wait_for_committed(&[1, 2, 3], leader, 3)?;

    tracing::info!("--- restart a follower");
    let follower = router.ids().into_iter().find(|id| *id != leader).unwrap_or_default();
    let before = router.metrics(follower)?;

    router.restart(follower)?;

    let after = router.metrics(follower)?;
    assert_eq!(ServerState::Follower, after.state);
    assert_eq!(before.term, after.term);
    assert_eq!(before.committed, after.committed);
    assert_eq!(before.last_log_index, after.last_log_index);
    assert_eq!(before.configuration, after.configuration);
    assert_eq!(None, after.leader, "leader is not persisted");

    router.wait_for_committed(&[1, 2, 3], leader, 3)?;

    tracing::info!("--- restart the leader, another member takes over");
    let term = router.metrics(leader)?.term;
    router.restart(leader)?;
    assert_eq!(ServerState::Follower, router.metrics(leader)?.state);

    let new_leader = router.wait_for_leader("elect a new leader")?;
    assert!(router.metrics(new_leader)?.term > term);

    let _rx = router.get(new_leader)?.propose(b"y".to_vec())?;
    let last = router.metrics(new_leader)?.last_log_index;
    router.wait_for_committed(&[1, 2, 3], new_leader, last)?;

    for id in router.ids() {
        assert_eq!(vec![b"x".to_vec(), b"y".to_vec()], router.committed_data(id)?, "node {}", id);
    }

    Ok(())
}

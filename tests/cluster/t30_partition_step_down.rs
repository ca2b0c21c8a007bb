use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use flowraft::error::ClientWriteError;
use flowraft::Config;
use flowraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::RaftRouter;

/// An isolated leader can not commit. Once it is back it steps down, and its uncommitted entry is
/// replaced by the log of the new leader.
#[test]
fn partitioned_leader_steps_down() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let old_leader = router.wait_for_leader("elect leader")?;
    router.wait_for_committed(&[1, 2, 3], old_leader, 2)?;
    let old_term = router.metrics(old_leader)?.term;

    tracing::info!("--- isolate the leader, its proposal can not be committed");
    router.isolate(old_leader);

    let mut lost_rx = router.get(old_leader)?.propose(b"lost".to_vec())?;

    let new_leader = router.wait_for_leader("elect a new leader")?;
    assert_ne!(old_leader, new_leader);
    assert!(router.metrics(new_leader)?.term > old_term);

    assert_eq!(
        ServerState::Leader,
        router.metrics(old_leader)?.state,
        "a leader without a quorum keeps its role"
    );
    assert_eq!(2, router.metrics(old_leader)?.committed);

    tracing::info!("--- the new leader commits");
    let others = router.ids().into_iter().filter(|id| *id != old_leader).collect::<Vec<_>>();

    let _rx = router.get(new_leader)?.propose(b"y".to_vec())?;
    router.wait_for_committed(&others, new_leader, 4)?;

    tracing::info!("--- restore the old leader");
    router.restore(old_leader);

    let mut lost = None;
    router.run_until(Duration::from_secs(5), "old leader follows", |r| {
        if let Ok(res) = lost_rx.try_recv() {
            lost = Some(res);
        }
        let m = r.metrics(old_leader)?;
        Ok(m.leader == Some(new_leader) && m.committed >= 4)
    })?;

    assert_eq!(ServerState::Follower, router.metrics(old_leader)?.state);
    assert!(matches!(lost, Some(Err(ClientWriteError::LeaderChanged { .. }))));

    for id in router.ids() {
        assert_eq!(vec![b"y".to_vec()], router.committed_data(id)?, "node {}", id);
    }

    Ok(())
}

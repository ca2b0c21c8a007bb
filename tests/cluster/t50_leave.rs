use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use flowraft::Config;
use flowraft::NodeId;
use flowraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::RaftRouter;

/// A follower leaves: it becomes inactive once the configuration without it is committed.
#[test]
fn follower_leaves() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let leader = router.wait_for_leader("elect leader")?;
    router.wait_for_committed(&[1, 2, 3], leader, 2)?;

    let leaving = router.ids().into_iter().find(|id| *id != leader).unwrap_or_default();
    let remaining = router.ids().into_iter().filter(|id| *id != leaving).collect::<Vec<_>>();

    let mut rx = router.get(leaving)?.leave()?;
    assert_eq!(ServerState::Leaving, router.metrics(leaving)?.state);

    let mut left = None;
    router.run_until(Duration::from_secs(10), "follower left", |_| {
        if let Ok(res) = rx.try_recv() {
            left = Some(res);
        }
        Ok(left.is_some())
    })?;

    let config = left.unwrap_or_else(|| panic!("leave is resolved"))?;
    assert!(!config.contains(&leaving));

    assert_eq!(ServerState::Inactive, router.metrics(leaving)?.state);

    let expected: BTreeSet<NodeId> = remaining.iter().copied().collect();
    for id in remaining.iter() {
        assert_eq!(expected, router.metrics(*id)?.configuration.voter_ids(), "node {}", id);
    }

    tracing::info!("--- the remaining members go on committing");
    let _rx = router.get(leader)?.propose(b"x".to_vec())?;
    router.wait_for_committed(&remaining, leader, 4)?;

    assert_eq!(vec![b"x".to_vec()], router.committed_data(leader)?);

    Ok(())
}

/// A leader leaves: it hands over to the most up to date remaining member, which is elected.
#[test]
fn leader_leaves() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let leader = router.wait_for_leader("elect leader")?;
    router.wait_for_committed(&[1, 2, 3], leader, 2)?;
    let term = router.metrics(leader)?.term;

    let mut rx = router.get(leader)?.leave()?;
    assert_eq!(ServerState::Leaving, router.metrics(leader)?.state);

    let mut left = None;
    router.run_until(Duration::from_secs(10), "leader left", |_| {
        if let Ok(res) = rx.try_recv() {
            left = Some(res);
        }
        Ok(left.is_some())
    })?;

    let config = left.unwrap_or_else(|| panic!("leave is resolved"))?;
    let remaining = config.voter_ids();
    assert_eq!(2, remaining.len());
    assert!(!remaining.contains(&leader));

    assert_eq!(ServerState::Inactive, router.metrics(leader)?.state);

    let new_leader = router.wait_for_leader("elect the successor")?;
    assert!(remaining.contains(&new_leader));
    assert!(router.metrics(new_leader)?.term > term);

    let _rx = router.get(new_leader)?.propose(b"x".to_vec())?;

    let ids = remaining.iter().copied().collect::<Vec<_>>();
    let committed = router.metrics(new_leader)?.last_log_index;
    router.wait_for_committed(&ids, new_leader, committed)?;

    for id in ids {
        assert_eq!(vec![b"x".to_vec()], router.committed_data(id)?, "node {}", id);
    }

    Ok(())
}

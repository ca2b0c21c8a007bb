use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use flowraft::error::ClientWriteError;
use flowraft::error::RaftError;
use flowraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::RaftRouter;

/// A proposal is committed at the next index and becomes visible on every member, in order.
#[test]
fn replicate_proposals() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));
    router.new_cluster(&[1, 2, 3])?;

    let leader = router.wait_for_leader("elect leader")?;
    router.wait_for_committed(&[1, 2, 3], leader, 2)?;

    tracing::info!("--- propose to a follower");
    {
        let follower = router.ids().into_iter().find(|id| *id != leader).unwrap_or_default();
        let res = router.get(follower)?.propose(b"x".to_vec());

        match res {
            Err(RaftError::APIError(ClientWriteError::ForwardToLeader(f))) => {
                assert_eq!(Some(leader), f.leader_id);
            }
            other => panic!("expect ForwardToLeader, got: {:?}", other.map(|_| ())),
        }
    }

    tracing::info!("--- propose to the leader");
    let mut rx = router.get(leader)?.propose(b"x".to_vec())?;

    let mut committed = None;
    router.run_until(Duration::from_secs(5), "commit x", |_| {
        if let Ok(res) = rx.try_recv() {
            committed = Some(res);
        }
        Ok(committed.is_some())
    })?;

    assert_eq!(Some(Ok(3)), committed);

    tracing::info!("--- propose more, then read on every member");
    let mut receivers = vec![];
    for data in ["y", "z"] {
        receivers.push(router.get(leader)?.propose(data.as_bytes().to_vec())?);
    }

    router.wait_for_committed(&[1, 2, 3], leader, 5)?;

    for (i, mut rx) in receivers.into_iter().enumerate() {
        assert_eq!(Ok(4 + i as u64), rx.try_recv()?);
    }

    for id in router.ids() {
        assert_eq!(
            vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()],
            router.committed_data(id)?,
            "node {}",
            id
        );
    }

    Ok(())
}

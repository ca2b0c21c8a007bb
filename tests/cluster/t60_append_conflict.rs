use std::sync::Arc;

use anyhow::Result;
use flowraft::Config;
use flowraft::Configuration;
use flowraft::Entry;
use flowraft::HardState;
use flowraft::LogId;
use flowraft::MemLogStorage;
use pretty_assertions::assert_eq;

use crate::fixtures::members;
use crate::fixtures::RaftRouter;

fn normal(term: u64, index: u64, data: &str) -> Entry {
    Entry::normal(LogId::new(term, index), data)
}

fn store(term: u64, entries: Vec<Entry>) -> MemLogStorage {
    let mut log = vec![
        Entry::configuration(LogId::new(0, 1), Configuration::new(1, members(&[1, 2, 3]))),
        normal(1, 2, "a"),
    ];
    log.extend(entries);

    MemLogStorage::from_parts(log, HardState { term, voted_for: None }, 2)
}

/// A follower with uncommitted entries of a stale term has them replaced by the leader's log.
///
/// - Node 1 has `[0-1, 1-2, 3-3, 3-4, 3-5]`.
/// - Node 2 has `[0-1, 1-2, 2-3, 2-4, 2-5, 2-6]`, isolated until node 1 is elected.
/// - Node 3 has `[0-1, 1-2]`.
#[test]
fn append_conflict_truncates_follower() -> Result<()> {
    let span = init_ut!();
    let _g = span.enter();

    let mut router = RaftRouter::new(Arc::new(Config::default().validate()?));

    router.new_node_with_store(1, store(3, vec![normal(3, 3, "b3"), normal(3, 4, "b4"), normal(3, 5, "b5")]))?;
    router.new_node_with_store(
        2,
        store(2, vec![
            normal(2, 3, "c3"),
            normal(2, 4, "c4"),
            normal(2, 5, "c5"),
            normal(2, 6, "c6"),
        ]),
    )?;
    router.new_node_with_store(3, store(1, vec![]))?;

    tracing::info!("--- only node 1 can be elected without node 2");
    router.isolate(2);

    let leader = router.wait_for_leader("elect node 1")?;
    assert_eq!(1, leader);
    assert_eq!(4, router.metrics(1)?.term);

    router.wait_for_committed(&[1, 3], 1, 6)?;

    tracing::info!("--- node 2 rejoins and its conflicting entries are replaced");
    router.restore(2);

    router.wait_for_committed(&[1, 2, 3], 1, 6)?;

    let want = router.get(1)?.committed_entries(1, 100)?;
    assert_eq!(
        vec![
            LogId::new(0, 1),
            LogId::new(1, 2),
            LogId::new(3, 3),
            LogId::new(3, 4),
            LogId::new(3, 5),
            LogId::new(4, 6)
        ],
        want.iter().map(|e| e.log_id).collect::<Vec<_>>()
    );

    for id in [2, 3] {
        let got = router.get(id)?.committed_entries(1, 100)?;
        assert_eq!(want, got, "node {}", id);
    }

    assert_eq!(6, router.metrics(2)?.last_log_index, "entry 2-6 is replaced by 4-6");

    for id in router.ids() {
        assert_eq!(
            vec![b"a".to_vec(), b"b3".to_vec(), b"b4".to_vec(), b"b5".to_vec()],
            router.committed_data(id)?
        );
    }

    Ok(())
}

use maplit::btreeset;
use pretty_assertions::assert_eq;
use validit::Validate;

use crate::progress::Inflight;
use crate::progress::ProgressEntry;
use crate::progress::VecProgress;
use crate::LogId;

fn log_id(term: u64, index: u64) -> Option<LogId> {
    Some(LogId::new(term, index))
}

#[test]
fn test_vec_progress_update_quorum_accepted() -> anyhow::Result<()> {
    let mut progress = VecProgress::new(btreeset! {1,2,3}, [4], || ProgressEntry::empty(1));

    let cases = vec![
        (1, log_id(1, 3), None),
        (4, log_id(1, 5), None), // not a voter
        (2, log_id(1, 2), log_id(1, 2)),
        (3, log_id(1, 4), log_id(1, 3)),
        (2, log_id(1, 5), log_id(1, 4)),
        (1, log_id(1, 5), log_id(1, 5)),
    ];

    for (id, matching, want) in cases {
        let got = progress.update_with(&id, |e| e.update_matching(matching));
        assert_eq!(Ok(want), got, "update {} to {:?}", id, matching);
    }

    assert_eq!(Err(log_id(1, 5)), progress.update_with(&9, |e| e.update_matching(log_id(1, 9))));
    assert_eq!(Some(true), progress.is_voter(&1));
    assert_eq!(Some(false), progress.is_voter(&4));
    assert_eq!(None, progress.is_voter(&9));

    Ok(())
}

#[test]
fn test_vec_progress_upgrade_quorum_set() -> anyhow::Result<()> {
    let mut progress = VecProgress::new(btreeset! {1,2,3}, [4], || ProgressEntry::empty(1));

    let _ = progress.update_with(&1, |e| e.update_matching(log_id(1, 3)));
    let _ = progress.update_with(&4, |e| e.update_matching(log_id(1, 3)));

    assert_eq!(None, progress.quorum_accepted());

    // 4 becomes a voter, 3 is removed.
    let progress = progress.upgrade_quorum_set(btreeset! {1,2,4}, [], || ProgressEntry::empty(4));

    assert_eq!(log_id(1, 3), progress.quorum_accepted());
    assert_eq!(None, progress.get(&3));
    assert_eq!(Some(4), progress.get(&1).map(|x| x.next_index));

    Ok(())
}

#[test]
fn test_progress_entry_next_send() -> anyhow::Result<()> {
    let mut pe = ProgressEntry::empty(5);

    assert_eq!(Some(Inflight::logs(4, 7)), pe.next_send(10, 3));
    assert_eq!(None, pe.next_send(10, 3), "one request in flight at a time");
    pe.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

    pe.update_matching(log_id(2, 7));
    assert_eq!(8, pe.next_index);
    assert_eq!(Some(Inflight::logs(7, 10)), pe.next_send(10, 3));

    pe.reset_inflight();
    assert_eq!(Some(Inflight::logs(7, 10)), pe.next_send(10, 100));

    pe.reset_inflight();
    pe.update_matching(log_id(2, 10));
    assert_eq!(Some(Inflight::logs(10, 10)), pe.next_send(10, 3), "heartbeat");

    Ok(())
}

#[test]
fn test_progress_entry_update_conflicting() -> anyhow::Result<()> {
    let mut pe = ProgressEntry::empty(9);

    // Target suggests an index far behind.
    pe.update_conflicting(3);
    assert_eq!(3, pe.next_index);

    // A suggestion that is not smaller still moves back by one.
    pe.update_conflicting(7);
    assert_eq!(2, pe.next_index);

    pe.update_conflicting(0);
    assert_eq!(1, pe.next_index, "never below 1");

    // Never move back to a matching entry.
    let mut pe = ProgressEntry::new(log_id(1, 4));
    pe.next_index = 8;
    pe.update_conflicting(2);
    assert_eq!(5, pe.next_index);

    Ok(())
}

use pretty_assertions::assert_eq;

use crate::storage::HardState;
use crate::storage::MemLogStorage;
use crate::storage::RaftLogStorage;
use crate::storage::StorageError;
use crate::Entry;
use crate::LogId;

fn log_id(term: u64, index: u64) -> LogId {
    LogId::new(term, index)
}

fn blank(term: u64, index: u64) -> Entry {
    Entry::blank(log_id(term, index))
}

#[test]
fn test_mem_log_storage_append_read_truncate() -> anyhow::Result<()> {
    let mut sto = MemLogStorage::new();
    assert_eq!(None, sto.log_state()?.last_log_id);

    sto.append(vec![blank(0, 1), blank(1, 2), Entry::normal(log_id(1, 3), "x")])?;
    assert_eq!(Some(log_id(1, 3)), sto.log_state()?.last_log_id);

    assert_eq!(Some(b"x".as_slice()), sto.read_entry(3)?.as_ref().and_then(|e| e.data()));
    assert_eq!(None, sto.read_entry(4)?);
    assert_eq!(log_id(1, 2), sto.read_log_id(2)?);

    let ents = sto.read_entries(2, 4)?;
    assert_eq!(vec![log_id(1, 2), log_id(1, 3)], ents.iter().map(|e| e.log_id).collect::<Vec<_>>());

    sto.truncate_from(2)?;
    assert_eq!(Some(log_id(0, 1)), sto.log_state()?.last_log_id);

    sto.append(vec![blank(2, 2)])?;
    assert_eq!(Some(log_id(2, 2)), sto.log_state()?.last_log_id);

    Ok(())
}

#[test]
fn test_mem_log_storage_reject_gap() -> anyhow::Result<()> {
    let mut sto = MemLogStorage::new();

    let res = sto.append(vec![blank(1, 2)]);
    assert!(matches!(res, Err(StorageError::IO { .. })));

    Ok(())
}

#[test]
fn test_mem_log_storage_hard_state_and_committed() -> anyhow::Result<()> {
    let mut sto = MemLogStorage::new();
    assert_eq!(HardState::default(), sto.read_hard_state()?);
    assert_eq!(0, sto.read_committed()?);

    let hs = HardState {
        term: 3,
        voted_for: Some(2),
    };
    sto.save_hard_state(&hs)?;
    sto.save_committed(5)?;

    assert_eq!(hs, sto.read_hard_state()?);
    assert_eq!(5, sto.read_committed()?);

    Ok(())
}

#[test]
fn test_missing_entry_is_corrupt() -> anyhow::Result<()> {
    let mut sto = MemLogStorage::from_parts([blank(1, 1), blank(1, 3)], HardState::default(), 0);

    assert!(matches!(sto.read_log_id(2), Err(StorageError::Corrupt { index: 2, .. })));

    let res = sto.read_entries(1, 4);
    assert_eq!(Err(StorageError::corrupt(2, "entry not found")), res.map(|_| ()));

    Ok(())
}

use pretty_assertions::assert_eq;

use crate::engine::testing::follower;
use crate::engine::testing::leader;
use crate::engine::testing::log_id;
use crate::engine::testing::member;
use crate::engine::Command;
use crate::metrics::ServerState;
use crate::network::VoteRequest;
use crate::network::VoteResponse;
use crate::storage::HardState;

fn hs(term: u64, voted_for: Option<u64>) -> Command {
    Command::SaveHardState {
        hard_state: HardState { term, voted_for },
    }
}

fn resp(to: u64, term: u64, granted: bool) -> Command {
    Command::Send {
        target: member(to),
        body: VoteResponse { term, granted }.into(),
    }
}

#[test]
fn test_grant_vote() -> anyhow::Result<()> {
    let mut eng = follower(2);

    eng.handle_message(
        member(1),
        VoteRequest {
            term: 2,
            last_log_id: Some(log_id(1, 2)),
        }
        .into(),
    )?;

    assert_eq!(Some(1), eng.state.term.voted_for());
    assert_eq!(
        vec![hs(2, None), hs(2, Some(1)), resp(1, 2, true)],
        eng.output.take_commands()
    );

    tracing::info!("--- granting the same candidate again does not save the vote again");
    {
        eng.handle_message(
            member(1),
            VoteRequest {
                term: 2,
                last_log_id: Some(log_id(1, 2)),
            }
            .into(),
        )?;
        assert_eq!(vec![resp(1, 2, true)], eng.output.take_commands());
    }

    Ok(())
}

#[test]
fn test_reject_vote_less_up_to_date_log() -> anyhow::Result<()> {
    let mut eng = follower(2);

    eng.handle_message(
        member(1),
        VoteRequest {
            term: 2,
            last_log_id: Some(log_id(1, 1)),
        }
        .into(),
    )?;

    // The greater term is adopted even though the vote is rejected.
    assert_eq!(2, eng.state.term.term());
    assert_eq!(None, eng.state.term.voted_for());
    assert_eq!(vec![hs(2, None), resp(1, 2, false)], eng.output.take_commands());

    Ok(())
}

#[test]
fn test_reject_vote_already_voted() -> anyhow::Result<()> {
    let mut eng = follower(2);

    let req = VoteRequest {
        term: 2,
        last_log_id: Some(log_id(1, 2)),
    };

    eng.handle_message(member(1), req.clone().into())?;
    eng.output.clear_commands();

    eng.handle_message(member(3), req.into())?;

    assert_eq!(Some(1), eng.state.term.voted_for());
    assert_eq!(vec![resp(3, 2, false)], eng.output.take_commands());

    Ok(())
}

#[test]
fn test_reject_vote_stale_term() -> anyhow::Result<()> {
    let mut eng = follower(2);

    eng.handle_message(
        member(1),
        VoteRequest {
            term: 0,
            last_log_id: Some(log_id(1, 2)),
        }
        .into(),
    )?;

    assert_eq!(vec![resp(1, 1, false)], eng.output.take_commands());

    Ok(())
}

#[test]
fn test_leader_steps_down_on_greater_term() -> anyhow::Result<()> {
    let mut eng = leader();

    eng.handle_message(
        member(3),
        VoteRequest {
            term: 3,
            last_log_id: Some(log_id(2, 3)),
        }
        .into(),
    )?;

    assert_eq!(ServerState::Follower, eng.server_state);
    assert_eq!(None, eng.state.term.leader());
    assert_eq!(
        vec![
            hs(3, None),
            Command::CancelProposals { term: 3 },
            Command::UpdateServerState {
                server_state: ServerState::Follower
            },
            hs(3, Some(3)),
            resp(3, 3, true),
        ],
        eng.output.take_commands()
    );

    Ok(())
}

#[test]
fn test_leader_rejects_vote_of_same_term() -> anyhow::Result<()> {
    let mut eng = leader();

    eng.handle_message(
        member(3),
        VoteRequest {
            term: 2,
            last_log_id: Some(log_id(2, 3)),
        }
        .into(),
    )?;

    assert_eq!(ServerState::Leader, eng.server_state);
    assert_eq!(vec![resp(3, 2, false)], eng.output.take_commands());

    Ok(())
}

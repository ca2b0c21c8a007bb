//! The runtime of one partition member.
//!
//! [`Raft`] owns the storage, the network and the protocol engine. Every public method feeds the
//! engine an event, then runs the commands the engine emits, in order, before returning.

mod committed_cursor;


use std::sync::Arc;

pub use committed_cursor::CommittedCursor;
use tokio::sync::oneshot;
use tokio::sync::watch;

use crate::engine::Command;
use crate::engine::Engine;
use crate::engine::EngineConfig;
use crate::error::ClientWriteError;
use crate::error::Fatal;
use crate::error::InitializeError;
use crate::error::MembershipChangeError;
use crate::error::RaftError;
use crate::metrics::RaftMetrics;
use crate::metrics::ServerState;
use crate::network::AppendRequest;
use crate::network::Dispatcher;
use crate::storage::StorageHelper;
use crate::Clock;
use crate::Config;
use crate::Configuration;
use crate::Entry;
use crate::Envelope;
use crate::LogIdOptionExt;
use crate::Member;
use crate::NodeId;
use crate::PartitionId;
use crate::RaftLogStorage;
use crate::RaftNetwork;
use crate::StdClock;
use crate::StorageError;

/// Resolves to the committed index of a proposal.
pub type ProposalReceiver = oneshot::Receiver<Result<u64, ClientWriteError>>;

/// Resolves to the committed configuration that contains, or no longer contains, this member.
pub type MembershipChangeReceiver = oneshot::Receiver<Result<Configuration, MembershipChangeError>>;

/// A member of one partition.
///
/// It is driven by a single caller: [`Raft::do_work`] is called repeatedly to run the timers,
/// [`Raft::handle_message`] for every inbound message. No method blocks.
///
/// Once a [`Fatal`] error is returned, the partition is stopped and every further call returns
/// [`Fatal::Stopped`].
pub struct Raft<S, N, K = StdClock>
where
    S: RaftLogStorage,
    N: RaftNetwork,
    K: Clock,
{
    me: Member,
    partition: PartitionId,

    config: Arc<Config>,

    engine: Engine,

    storage: S,

    dispatcher: Dispatcher<N>,

    clock: K,

    tx_metrics: watch::Sender<RaftMetrics>,

    /// The error that stopped this partition.
    fatal: Option<Fatal>,
}

impl<S, N, K> Raft<S, N, K>
where
    S: RaftLogStorage,
    N: RaftNetwork,
    K: Clock,
{
    /// Load the state of `me` from `storage` and start as a follower, or inactive if `me` is not
    /// a member of the committed configuration.
    #[tracing::instrument(level = "debug", skip_all, fields(id = display(me.id), partition = display(partition)))]
    pub fn open(
        me: Member,
        partition: PartitionId,
        config: Arc<Config>,
        mut storage: S,
        network: N,
        clock: K,
    ) -> Result<Self, Fatal> {
        let state = StorageHelper::new(&mut storage).get_initial_state()?;

        let engine = Engine::new(EngineConfig::new(me.clone(), &config), state, clock.now());
        let dispatcher = Dispatcher::new(network, partition, me.clone());

        let (tx_metrics, _rx_metrics) = watch::channel(RaftMetrics {
            id: me.id,
            partition,
            ..RaftMetrics::default()
        });

        let mut raft = Self {
            me,
            partition,
            config,
            engine,
            storage,
            dispatcher,
            clock,
            tx_metrics,
            fatal: None,
        };

        raft.engine.startup();
        raft.run_engine_commands()?;

        Ok(raft)
    }

    /// Create a new cluster with `members` as the first configuration.
    ///
    /// Only a member with an empty log can bootstrap. Every initial member should be bootstrapped
    /// with the same `members`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn bootstrap(&mut self, members: Vec<Member>) -> Result<(), RaftError<InitializeError>> {
        self.ensure_running()?;
        self.update_now();

        self.engine.bootstrap(members).map_err(RaftError::APIError)?;
        self.run_engine_commands()?;

        Ok(())
    }

    /// Ask to be added to an existing cluster, through any of `contacts`.
    ///
    /// The returned future resolves once this member is in a committed configuration.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn join(&mut self, contacts: Vec<Member>) -> Result<MembershipChangeReceiver, Fatal> {
        self.ensure_running()?;
        self.update_now();

        let request_id = self.dispatcher.next_request_id();
        let (tx, rx) = oneshot::channel();

        match self.engine.join(contacts, request_id) {
            Ok(()) => self.dispatcher.register_request(request_id, tx),
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }

        self.run_engine_commands()?;
        Ok(rx)
    }

    /// Ask to be removed from the cluster.
    ///
    /// The returned future resolves once a configuration without this member is committed.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn leave(&mut self) -> Result<MembershipChangeReceiver, Fatal> {
        self.ensure_running()?;
        self.update_now();

        let request_id = self.dispatcher.next_request_id();
        let (tx, rx) = oneshot::channel();

        match self.engine.leave(request_id) {
            Ok(()) => self.dispatcher.register_request(request_id, tx),
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }

        self.run_engine_commands()?;
        Ok(rx)
    }

    /// Append `data` to the log, if this member is the leader.
    ///
    /// The returned future resolves to the index of the entry once it is committed, or fails if
    /// this member stops being the leader before that.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn propose(&mut self, data: Vec<u8>) -> Result<ProposalReceiver, RaftError<ClientWriteError>> {
        self.ensure_running()?;
        self.update_now();

        let log_id = self.engine.propose(data).map_err(|e| RaftError::APIError(e.into()))?;

        let (tx, rx) = oneshot::channel();
        self.dispatcher.register_proposal(log_id, tx);

        self.run_engine_commands()?;
        Ok(rx)
    }

    /// Handle a message received from another member.
    ///
    /// A message for another partition or another member is dropped.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn handle_message(&mut self, envelope: Envelope) -> Result<(), Fatal> {
        self.ensure_running()?;

        if envelope.partition != self.partition || envelope.to != self.me.id {
            tracing::warn!(
                envelope = display(&envelope),
                partition = display(self.partition),
                id = display(self.me.id),
                "drop message not addressed to this member"
            );
            return Ok(());
        }

        self.update_now();

        if let Err(e) = self.engine.handle_message(envelope.from, envelope.body) {
            return Err(self.on_fatal(e));
        }

        self.run_engine_commands()?;
        Ok(())
    }

    /// Run the timers once: elections, heartbeats and resending join or leave requests.
    ///
    /// Returns the number of commands executed, 0 if there was nothing to do.
    pub fn do_work(&mut self) -> Result<usize, Fatal> {
        self.ensure_running()?;
        self.update_now();

        self.engine.tick();
        self.run_engine_commands()
    }

    /// Read at most `max` committed entries starting at index `from`.
    ///
    /// Returns an empty `Vec` if there is no committed entry at `from` yet.
    pub fn committed_entries(&mut self, from: u64, max: u64) -> Result<Vec<Entry>, Fatal> {
        self.ensure_running()?;

        let start = from.max(1);
        let end = std::cmp::min(self.engine.state.committed + 1, start.saturating_add(max));

        if start >= end {
            return Ok(vec![]);
        }

        match self.storage.read_entries(start, end) {
            Ok(entries) => Ok(entries),
            Err(e) => Err(self.on_fatal(e.into())),
        }
    }

    /// Stop this member: fail every pending future and stop sending messages.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn close(&mut self) -> Result<(), Fatal> {
        if self.fatal.is_some() {
            return Ok(());
        }

        tracing::info!(id = display(self.me.id), partition = display(self.partition), "close");

        self.dispatcher.cancel_proposals(|_| ClientWriteError::Closed);

        self.engine.close();
        let res = self.run_engine_commands();

        if self.fatal.is_none() {
            self.fatal = Some(Fatal::Stopped);
        }

        res.map(|_| ())
    }

    pub fn is_closed(&self) -> bool {
        self.fatal.is_some()
    }

    /// Subscribe to the metrics of this member.
    pub fn metrics(&self) -> watch::Receiver<RaftMetrics> {
        self.tx_metrics.subscribe()
    }

    pub fn id(&self) -> NodeId {
        self.me.id
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn server_state(&self) -> ServerState {
        self.engine.server_state
    }

    pub fn committed(&self) -> u64 {
        self.engine.state.committed
    }

    /// Stop and return the storage, e.g., to reopen it.
    pub fn into_storage(mut self) -> S {
        let _ = self.close();
        self.storage
    }

    fn ensure_running(&self) -> Result<(), Fatal> {
        match self.fatal {
            Some(_) => Err(Fatal::Stopped),
            None => Ok(()),
        }
    }

    fn update_now(&mut self) {
        let now = self.clock.now();
        self.engine.update_now(now);
    }

    /// Run every command queued by the engine.
    ///
    /// Returns the number of commands executed.
    fn run_engine_commands(&mut self) -> Result<usize, Fatal> {
        let mut n = 0;

        while let Some(cmd) = self.engine.output.pop_command() {
            n += 1;

            if let Err(e) = self.run_command(cmd) {
                return Err(self.on_fatal(e.into()));
            }
        }

        self.report_metrics();
        Ok(n)
    }

    fn run_command(&mut self, cmd: Command) -> Result<(), StorageError> {
        tracing::debug!("run command: {}", cmd);

        match cmd {
            Command::AppendEntries { entries } => {
                self.storage.append(entries)?;
            }
            Command::TruncateLog { since } => {
                self.storage.truncate_from(since)?;
            }
            Command::SaveHardState { hard_state } => {
                self.storage.save_hard_state(&hard_state)?;
            }
            Command::Commit { committed } => {
                self.storage.save_committed(committed)?;
                self.dispatcher.resolve_proposals(committed);
            }
            Command::Send { target, body } => {
                self.dispatcher.send(&target, body);
            }
            Command::Replicate {
                target,
                term,
                prev_log_id,
                last_index,
                leader_commit,
            } => {
                let entries = self.storage.read_entries(prev_log_id.next_index(), last_index + 1)?;

                let req = AppendRequest {
                    term,
                    prev_log_id,
                    entries,
                    leader_commit,
                };
                self.dispatcher.send(&target, req.into());
            }
            Command::ResolveRequest { request_id, result } => {
                self.dispatcher.resolve_request(request_id, result);
            }
            Command::CancelRequests { error } => {
                self.dispatcher.cancel_requests(error);
            }
            Command::CancelProposals { term } => {
                self.dispatcher.cancel_proposals(|log_id| ClientWriteError::LeaderChanged { log_id, term });
            }
            Command::UpdateServerState { server_state } => {
                tracing::info!(
                    id = display(self.me.id),
                    partition = display(self.partition),
                    server_state = display(server_state),
                    "server state updated"
                );
            }
        }

        Ok(())
    }

    /// Stop this partition: fail every future and drop every queued command.
    fn on_fatal(&mut self, fatal: Fatal) -> Fatal {
        tracing::error!(
            id = display(self.me.id),
            partition = display(self.partition),
            error = display(&fatal),
            "partition stopped by fatal error"
        );

        self.dispatcher.cancel_proposals(|_| ClientWriteError::Closed);
        self.dispatcher.cancel_requests(MembershipChangeError::Aborted {
            state: ServerState::Inactive,
        });

        while let Some(cmd) = self.engine.output.pop_command() {
            tracing::debug!("drop command: {}", cmd);
        }

        self.fatal = Some(fatal.clone());

        self.tx_metrics.send_modify(|m| m.state = ServerState::Inactive);

        fatal
    }

    fn report_metrics(&mut self) {
        let st = &self.engine.state;

        let m = RaftMetrics {
            id: self.me.id,
            partition: self.partition,
            state: self.engine.server_state,
            term: st.term.term(),
            leader: st.term.leader_id(),
            last_log_index: st.last_log_index(),
            committed: st.committed,
            configuration: st.membership.committed().config.clone(),
        };

        tracing::debug!(metrics = display(&m), "{}", func_name!());

        self.tx_metrics.send_if_modified(|cur| {
            if *cur == m {
                return false;
            }
            *cur = m;
            true
        });
    }
}

//! An in-process cluster of partition members for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::time::Duration;

use anyhow::Context;
use flowraft::Config;
use flowraft::Endpoint;
use flowraft::Envelope;
use flowraft::ManualClock;
use flowraft::MemLogStorage;
use flowraft::Member;
use flowraft::NodeId;
use flowraft::PartitionId;
use flowraft::Raft;
use flowraft::RaftMetrics;
use flowraft::RaftNetwork;
use flowraft::ServerState;
use tracing_subscriber::EnvFilter;

#[allow(unused)]
macro_rules! func_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let n = &name[..name.len() - 3];
        let nn = n.replace("::{{closure}}", "");
        nn
    }};
}

/// Install the test subscriber and return a span named after the calling test.
#[allow(unused)]
macro_rules! init_ut {
    () => {{
        let name = func_name!();
        let last = name.split("::").last().unwrap_or_default().to_string();

        crate::fixtures::init_default_ut_tracing();

        tracing::debug_span!("ut", "{}", last)
    }};
}

pub const PARTITION: PartitionId = 1;

/// How much time passes in one [`RaftRouter::step`].
pub const STEP: Duration = Duration::from_millis(10);

/// The maximum number of messages delivered in one step, to detect message loops.
const MAX_DELIVERIES: usize = 100_000;

pub type MemRaft = Raft<MemLogStorage, RouterNetwork, ManualClock>;

pub fn init_default_ut_tracing() {
    static START: Once = Once::new();

    START.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub fn member(id: NodeId) -> Member {
    Member::new(id, Endpoint::new("127.0.0.1", 26500 + id as u16))
}

pub fn members(ids: &[NodeId]) -> Vec<Member> {
    ids.iter().map(|id| member(*id)).collect()
}

/// Queues every message sent by a member, for the router to deliver.
#[derive(Clone, Default)]
pub struct RouterNetwork {
    queue: Arc<Mutex<VecDeque<Envelope>>>,
}

impl RaftNetwork for RouterNetwork {
    fn send(&mut self, _target: &Member, envelope: Envelope) {
        self.queue.lock().unwrap().push_back(envelope);
    }
}

/// Runs members of one partition with a shared clock and a shared message queue.
pub struct RaftRouter {
    config: Arc<Config>,

    clock: ManualClock,

    network: RouterNetwork,

    nodes: BTreeMap<NodeId, MemRaft>,

    /// Nodes which are isolated can neither send nor receive messages.
    isolated: BTreeSet<NodeId>,
}

impl RaftRouter {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            clock: ManualClock::new(),
            network: RouterNetwork::default(),
            nodes: BTreeMap::new(),
            isolated: BTreeSet::new(),
        }
    }

    /// Open member `id` with an empty log.
    pub fn new_node(&mut self, id: NodeId) -> anyhow::Result<()> {
        self.new_node_with_store(id, MemLogStorage::new())
    }

    pub fn new_node_with_store(&mut self, id: NodeId, sto: MemLogStorage) -> anyhow::Result<()> {
        let raft = Raft::open(
            member(id),
            PARTITION,
            self.config.clone(),
            sto,
            self.network.clone(),
            self.clock.clone(),
        )?;

        self.nodes.insert(id, raft);
        Ok(())
    }

    /// Open and bootstrap a cluster of `ids`.
    pub fn new_cluster(&mut self, ids: &[NodeId]) -> anyhow::Result<()> {
        for id in ids {
            self.new_node(*id)?;
        }

        for id in ids {
            self.get(*id)?.bootstrap(members(ids))?;
        }

        Ok(())
    }

    pub fn get(&mut self, id: NodeId) -> anyhow::Result<&mut MemRaft> {
        self.nodes.get_mut(&id).with_context(|| format!("node {} not found", id))
    }

    pub fn metrics(&self, id: NodeId) -> anyhow::Result<RaftMetrics> {
        let raft = self.nodes.get(&id).with_context(|| format!("node {} not found", id))?;
        let m = raft.metrics().borrow().clone();
        Ok(m)
    }

    pub fn isolate(&mut self, id: NodeId) {
        self.isolated.insert(id);
    }

    pub fn restore(&mut self, id: NodeId) {
        self.isolated.remove(&id);
    }

    /// Close member `id` and open it again from its storage.
    pub fn restart(&mut self, id: NodeId) -> anyhow::Result<()> {
        let raft = self.nodes.remove(&id).with_context(|| format!("node {} not found", id))?;
        let sto = raft.into_storage();
        self.new_node_with_store(id, sto)
    }

    /// Deliver queued messages until the queue is empty.
    ///
    /// Messages from or to an isolated node, or to an unknown or closed node, are dropped.
    pub fn deliver_all(&mut self) -> anyhow::Result<usize> {
        let mut n = 0;

        loop {
            let envelope = self.network.queue.lock().unwrap().pop_front();
            let Some(envelope) = envelope else {
                return Ok(n);
            };

            n += 1;
            anyhow::ensure!(n < MAX_DELIVERIES, "too many messages, last: {}", envelope);

            if self.isolated.contains(&envelope.from.id) || self.isolated.contains(&envelope.to) {
                tracing::debug!("drop message of isolated node: {}", envelope);
                continue;
            }

            let Some(raft) = self.nodes.get_mut(&envelope.to) else {
                continue;
            };
            if raft.is_closed() {
                continue;
            }

            raft.handle_message(envelope)?;
        }
    }

    /// Move the clock forward by `d`, run every member once and deliver the messages.
    pub fn step(&mut self, d: Duration) -> anyhow::Result<()> {
        self.clock.advance(d);

        for raft in self.nodes.values_mut() {
            if raft.is_closed() {
                continue;
            }
            raft.do_work()?;
        }

        self.deliver_all()?;
        Ok(())
    }

    /// Run steps until `cond` holds, for at most `timeout` of the shared clock.
    pub fn run_until(
        &mut self,
        timeout: Duration,
        msg: &str,
        mut cond: impl FnMut(&mut Self) -> anyhow::Result<bool>,
    ) -> anyhow::Result<()> {
        let mut elapsed = Duration::ZERO;

        self.deliver_all()?;

        loop {
            if cond(self)? {
                tracing::info!("done: {} in {:?}", msg, elapsed);
                return Ok(());
            }

            anyhow::ensure!(elapsed < timeout, "timeout after {:?}: {}", timeout, msg);

            self.step(STEP)?;
            elapsed += STEP;
        }
    }

    /// The leader with the greatest term among the nodes that are not isolated.
    pub fn leader(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|(id, raft)| !self.isolated.contains(id) && raft.server_state() == ServerState::Leader)
            .max_by_key(|(_id, raft)| raft.metrics().borrow().term)
            .map(|(id, _raft)| *id)
    }

    pub fn wait_for_leader(&mut self, msg: &str) -> anyhow::Result<NodeId> {
        self.run_until(Duration::from_secs(10), msg, |r| Ok(r.leader().is_some()))?;
        self.leader().context("no leader")
    }

    /// Wait until every node in `ids` follows `leader` and has committed up to `index`.
    pub fn wait_for_committed(&mut self, ids: &[NodeId], leader: NodeId, index: u64) -> anyhow::Result<()> {
        self.run_until(Duration::from_secs(10), &format!("committed {} on {:?}", index, ids), |r| {
            for id in ids {
                let m = r.metrics(*id)?;
                if m.leader != Some(leader) || m.committed < index {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// The payloads of the committed normal entries of `id`, in log order.
    pub fn committed_data(&mut self, id: NodeId) -> anyhow::Result<Vec<Vec<u8>>> {
        let entries = self.get(id)?.committed_entries(1, u64::MAX)?;
        Ok(entries.iter().filter_map(|e| e.data()).map(|d| d.to_vec()).collect())
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }
}

use std::collections::BTreeMap;

use tokio::sync::oneshot;

use crate::error::ClientWriteError;
use crate::error::MembershipChangeError;
use crate::network::Envelope;
use crate::network::MessageBody;
use crate::network::RaftNetwork;
use crate::network::RequestId;
use crate::Configuration;
use crate::LogId;
use crate::Member;
use crate::PartitionId;

pub(crate) type ProposalTx = oneshot::Sender<Result<u64, ClientWriteError>>;
pub(crate) type MembershipTx = oneshot::Sender<Result<Configuration, MembershipChangeError>>;

/// Owns the network and the senders of every future handed out by this member.
///
/// Every future is resolved exactly once: a sender is removed from its table when it is used.
pub(crate) struct Dispatcher<N: RaftNetwork> {
    network: N,

    partition: PartitionId,

    me: Member,

    last_request_id: u64,

    /// Join or leave requests started on this member.
    requests: BTreeMap<RequestId, MembershipTx>,

    /// Proposals accepted by this member as a leader, by log index.
    proposals: BTreeMap<u64, (LogId, ProposalTx)>,
}

impl<N: RaftNetwork> Dispatcher<N> {
    pub(crate) fn new(network: N, partition: PartitionId, me: Member) -> Self {
        Self {
            network,
            partition,
            me,
            last_request_id: 0,
            requests: BTreeMap::new(),
            proposals: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub(crate) fn send(&mut self, target: &Member, body: MessageBody) {
        tracing::debug!(to = display(target), body = display(&body), "send");

        let envelope = Envelope {
            partition: self.partition,
            from: self.me.clone(),
            to: target.id,
            body,
        };
        self.network.send(target, envelope);
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        self.last_request_id += 1;
        RequestId(self.last_request_id)
    }

    pub(crate) fn register_request(&mut self, request_id: RequestId, tx: MembershipTx) {
        self.requests.insert(request_id, tx);
    }

    pub(crate) fn resolve_request(
        &mut self,
        request_id: RequestId,
        res: Result<Configuration, MembershipChangeError>,
    ) {
        let Some(tx) = self.requests.remove(&request_id) else {
            tracing::debug!(request_id = display(request_id), "no pending request to resolve");
            return;
        };

        let _ = tx.send(res);
    }

    pub(crate) fn register_proposal(&mut self, log_id: LogId, tx: ProposalTx) {
        self.proposals.insert(log_id.index, (log_id, tx));
    }

    /// Resolve every proposal up to `committed` with its index.
    pub(crate) fn resolve_proposals(&mut self, committed: u64) {
        let rest = self.proposals.split_off(&(committed + 1));
        let done = std::mem::replace(&mut self.proposals, rest);

        for (index, (_log_id, tx)) in done {
            let _ = tx.send(Ok(index));
        }
    }

    /// Fail every pending proposal, e.g., when this member is no longer the leader.
    pub(crate) fn cancel_proposals(&mut self, f: impl Fn(LogId) -> ClientWriteError) {
        for (_index, (log_id, tx)) in std::mem::take(&mut self.proposals) {
            let _ = tx.send(Err(f(log_id)));
        }
    }

    pub(crate) fn cancel_requests(&mut self, err: MembershipChangeError) {
        for (_request_id, tx) in std::mem::take(&mut self.requests) {
            let _ = tx.send(Err(err.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_proposals(&self) -> usize {
        self.proposals.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}

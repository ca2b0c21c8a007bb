//! The boundary to the transport, and the correlation of locally initiated requests.

mod dispatcher;
pub mod message;


use std::fmt;

pub(crate) use dispatcher::Dispatcher;
pub use message::AppendRequest;
pub use message::AppendResponse;
pub use message::ConfigureRequest;
pub use message::ConfigureResponse;
pub use message::JoinRequest;
pub use message::JoinResponse;
pub use message::LeaveRequest;
pub use message::LeaveResponse;
pub use message::PollRequest;
pub use message::PollResponse;
pub use message::RequestId;
pub use message::VoteRequest;
pub use message::VoteResponse;

use crate::Member;
use crate::NodeId;
use crate::PartitionId;

/// Sends messages to other members.
///
/// Sending is fire-and-forget: a message may be lost, duplicated or reordered, and the protocol
/// tolerates it. An implementation must not block; it should queue the message and return.
pub trait RaftNetwork {
    fn send(&mut self, target: &Member, envelope: Envelope);
}

/// A message with its routing information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Envelope {
    pub partition: PartitionId,
    pub from: Member,
    pub to: NodeId,
    pub body: MessageBody,
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[p{}] {} -> {}: {}", self.partition, self.from, self.to, self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(derive_more::From)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum MessageBody {
    PollRequest(PollRequest),
    PollResponse(PollResponse),
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
    AppendRequest(AppendRequest),
    AppendResponse(AppendResponse),
    ConfigureRequest(ConfigureRequest),
    ConfigureResponse(ConfigureResponse),
    JoinRequest(JoinRequest),
    JoinResponse(JoinResponse),
    LeaveRequest(LeaveRequest),
    LeaveResponse(LeaveResponse),
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBody::PollRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::PollResponse(m) => fmt::Display::fmt(m, f),
            MessageBody::VoteRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::VoteResponse(m) => fmt::Display::fmt(m, f),
            MessageBody::AppendRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::AppendResponse(m) => fmt::Display::fmt(m, f),
            MessageBody::ConfigureRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::ConfigureResponse(m) => fmt::Display::fmt(m, f),
            MessageBody::JoinRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::JoinResponse(m) => fmt::Display::fmt(m, f),
            MessageBody::LeaveRequest(m) => fmt::Display::fmt(m, f),
            MessageBody::LeaveResponse(m) => fmt::Display::fmt(m, f),
        }
    }
}

impl MessageBody {
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageBody::PollRequest(_)
                | MessageBody::VoteRequest(_)
                | MessageBody::AppendRequest(_)
                | MessageBody::ConfigureRequest(_)
                | MessageBody::JoinRequest(_)
                | MessageBody::LeaveRequest(_)
        )
    }
}

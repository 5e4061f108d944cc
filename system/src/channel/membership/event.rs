use std::fmt;

use tokio::sync::broadcast;

use crate::node::Endpoint;

pub type EventReceiver = broadcast::Receiver<MembershipEvent>;
pub type EventSender = broadcast::Sender<MembershipEvent>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MembershipEvent {
    Added {
        timestamp: i64,
        local: Endpoint,
        member: Endpoint,
    },
    Removed {
        timestamp: i64,
        local: Endpoint,
        member: Endpoint,
    },
}

impl MembershipEvent {
    pub async fn build() -> EventSender {
        let (event_sender, _) = broadcast::channel::<MembershipEvent>(1024);

        event_sender
    }

    pub fn local(&self) -> Endpoint {
        match self {
            MembershipEvent::Added { local, .. } | MembershipEvent::Removed { local, .. } => *local,
        }
    }

    pub fn member(&self) -> Endpoint {
        match self {
            MembershipEvent::Added { member, .. } | MembershipEvent::Removed { member, .. } => {
                *member
            }
        }
    }
}

impl fmt::Display for MembershipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipEvent::Added {
                timestamp,
                local,
                member,
            } => write!(f, "[{}] {} | node {} joined", timestamp, local, member),
            MembershipEvent::Removed {
                timestamp,
                local,
                member,
            } => write!(f, "[{}] {} | node {} removed", timestamp, local, member),
        }
    }
}

use crate::channel::membership::event::MembershipEvent;
use crate::membership::{Member, Membership, MembershipError, Message, NodeState, Upsert};
use crate::node::Endpoint;
use crate::{debug, info, warn};

impl Membership {
    pub(super) async fn process(&mut self, bytes: &[u8]) -> Result<(), MembershipError> {
        match Message::from_bytes(bytes)? {
            Message::JoinRequest { origin, heartbeat } => {
                debug!(local = %self.endpoint, origin = %origin, "received join request!");

                self.join_request(origin, heartbeat);
            }
            Message::JoinReply(members) => {
                debug!(local = %self.endpoint, count = members.len(), "received join reply!");

                self.join_reply(members);
            }
            Message::Gossip(members) => {
                debug!(local = %self.endpoint, count = members.len(), "received gossip!");

                self.gossip(members);
            }
        }

        Ok(())
    }

    fn join_request(&mut self, origin: Endpoint, heartbeat: i64) {
        let members = self
            .list
            .snapshot()
            .iter()
            .map(|record| record.member())
            .collect();

        if let Err(error) = self.send(origin, &Message::JoinReply(members)) {
            warn!(local = %self.endpoint, "join reply -> {}", error);
        }

        self.add_member(origin, heartbeat);
    }

    fn join_reply(&mut self, members: Vec<Member>) {
        if self.state == NodeState::Joining && self.config.sync_clock_on_join {
            self.adopted_heartbeat = members
                .iter()
                .filter(|member| member.endpoint != self.endpoint)
                .map(|member| member.heartbeat)
                .max();
        }

        self.merge(members);

        if self.state == NodeState::Joining {
            info!(local = %self.endpoint, "joined group!");

            self.state = NodeState::InGroup;
        }
    }

    fn gossip(&mut self, members: Vec<Member>) {
        self.merge(members);

        if self.state == NodeState::Joining {
            info!(local = %self.endpoint, "joined group through gossip!");

            self.state = NodeState::InGroup;
        }
    }

    fn merge(&mut self, members: Vec<Member>) {
        let local = self.list.self_record_id();

        for member in members {
            if member.endpoint != local {
                self.add_member(member.endpoint, member.heartbeat);
            }
        }
    }

    fn add_member(&mut self, endpoint: Endpoint, heartbeat: i64) {
        match self.list.upsert(endpoint, heartbeat, self.heartbeat) {
            Ok(Upsert::Inserted) => {
                info!(
                    local = %self.endpoint,
                    member = %endpoint,
                    timestamp = self.heartbeat,
                    "node added",
                );

                self.emit(MembershipEvent::Added {
                    timestamp: self.heartbeat,
                    local: self.endpoint,
                    member: endpoint,
                });
            }
            Ok(Upsert::Updated) => {
                debug!(
                    local = %self.endpoint,
                    member = %endpoint,
                    heartbeat,
                    "updated member",
                );
            }
            Ok(Upsert::Unchanged) => {}
            Err(error @ MembershipError::DuplicateSelfReference(_)) => {
                debug!(local = %self.endpoint, "{}", error);
            }
            Err(error) => {
                warn!(local = %self.endpoint, "{}", error);
            }
        }
    }
}

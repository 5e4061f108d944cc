use crate::channel::membership::event::{EventSender, MembershipEvent};
use crate::channel::membership::inbound::InboundReceiver;
use crate::channel::membership::sender::{Dissemination, DisseminationSender};
use crate::config::Config;
use crate::node::Endpoint;
use crate::{debug, info, warn};

pub use error::MembershipError;
pub use list::{Member, MemberRecord, Upsert};
pub use message::Message;

use dissemination::GossipRound;
use failure_detector::FailureDetector;
use list::List;

mod dissemination;
mod error;
mod failure_detector;
mod list;
mod message;
mod receiver;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    Uninitialized,
    Initialized,
    Joining,
    InGroup,
    Stopped,
}

/// One node's view of the group and the protocol driving it.
///
/// The scheduler owns this value and calls [`Membership::tick`] once per
/// protocol period; nothing else touches the table.
pub struct Membership {
    endpoint: Endpoint,
    config: Config,
    state: NodeState,
    heartbeat: i64,
    adopted_heartbeat: Option<i64>,
    list: List,
    failure_detector: FailureDetector,
    gossip: GossipRound,
    inbound: InboundReceiver,
    dissemination: DisseminationSender,
    events: EventSender,
}

impl Membership {
    pub async fn init(
        endpoint: Endpoint,
        config: Config,
        inbound: InboundReceiver,
        dissemination: DisseminationSender,
        events: EventSender,
    ) -> Result<Membership, Box<dyn std::error::Error>> {
        config.validate()?;

        let list = List::init(endpoint, config.removal_deadline());
        let failure_detector = FailureDetector::init(&config);
        let gossip = GossipRound::init(&config);

        info!(local = %endpoint, "initialized!");

        Ok(Membership {
            endpoint,
            config,
            state: NodeState::Uninitialized,
            heartbeat: 0,
            adopted_heartbeat: None,
            list,
            failure_detector,
            gossip,
            inbound,
            dissemination,
            events,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn heartbeat(&self) -> i64 {
        self.heartbeat
    }

    pub fn members(&self) -> Vec<MemberRecord> {
        self.list.snapshot()
    }

    pub fn is_member(&self, endpoint: &Endpoint) -> bool {
        self.list.contains(endpoint)
    }

    /// Registers this node and either boots the group or asks the
    /// introducer to let us in.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.init_this_node()?;
        self.introduce_self_to_group()?;

        Ok(())
    }

    /// Drains queued datagrams, then runs failure detection and gossip once
    /// the node is part of the group.
    pub async fn tick(&mut self) {
        match self.state {
            NodeState::Uninitialized | NodeState::Stopped => return,
            _ => self.check_messages().await,
        }

        if self.state == NodeState::InGroup {
            self.node_loop_ops();
        }
    }

    pub async fn stop(&mut self) {
        info!(local = %self.endpoint, heartbeat = self.heartbeat, "shutting down...");

        self.state = NodeState::Stopped;
        self.list.clear();
        self.inbound.close();

        while self.inbound.try_recv().is_ok() {}
    }

    fn init_this_node(&mut self) -> Result<(), MembershipError> {
        if self.state != NodeState::Uninitialized {
            return Err(MembershipError::InvalidState {
                expected: NodeState::Uninitialized,
                actual: self.state,
            });
        }

        self.heartbeat = 0;
        self.gossip.reset();
        self.list.clear();
        self.list.register_self(self.heartbeat);
        self.state = NodeState::Initialized;

        self.emit(MembershipEvent::Added {
            timestamp: self.heartbeat,
            local: self.endpoint,
            member: self.endpoint,
        });

        Ok(())
    }

    fn introduce_self_to_group(&mut self) -> Result<(), MembershipError> {
        if self.endpoint == self.config.introducer {
            info!(local = %self.endpoint, "starting up group...");

            self.state = NodeState::InGroup;
        } else {
            info!(
                local = %self.endpoint,
                introducer = %self.config.introducer,
                "trying to join...",
            );

            let join_request = Message::JoinRequest {
                origin: self.endpoint,
                heartbeat: self.heartbeat,
            };

            self.send(self.config.introducer, &join_request)?;
            self.state = NodeState::Joining;
        }

        Ok(())
    }

    async fn check_messages(&mut self) {
        while let Ok(bytes) = self.inbound.try_recv() {
            if let Err(error) = self.process(&bytes).await {
                warn!(local = %self.endpoint, "dropping message -> {}", error);
            }
        }
    }

    fn node_loop_ops(&mut self) {
        if let Some(adopted) = self.adopted_heartbeat.take() {
            if adopted > self.heartbeat {
                self.list.rebase(adopted - self.heartbeat);
                self.heartbeat = adopted;
            }
        }

        self.heartbeat = self.heartbeat.saturating_add(1);
        self.list.refresh_self(self.heartbeat);

        for record in self.failure_detector.detect(&mut self.list, self.heartbeat) {
            info!(
                local = %self.endpoint,
                member = %record.endpoint,
                timestamp = self.heartbeat,
                "node removed",
            );

            self.emit(MembershipEvent::Removed {
                timestamp: self.heartbeat,
                local: self.endpoint,
                member: record.endpoint,
            });
        }

        if self.gossip.ready() {
            self.disseminate();
        }
    }

    fn send(&self, target: Endpoint, message: &Message) -> Result<(), MembershipError> {
        if target == self.endpoint {
            debug!(local = %self.endpoint, "not sending {:?} to self", message.tag());

            return Ok(());
        }

        let datagram = Dissemination::Message {
            origin: self.endpoint,
            target,
            bytes: message.build(),
        };

        self.dissemination
            .try_send(datagram)
            .map_err(|_| MembershipError::TransportSendFailure(target))
    }

    fn emit(&self, event: MembershipEvent) {
        self.events.send(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::membership::event::EventReceiver;
    use crate::network::EmulatedNetwork;

    async fn test_node(
        test_network: &mut EmulatedNetwork,
        test_id: u32,
        test_events: &EventSender,
    ) -> Result<Membership, Box<dyn std::error::Error>> {
        let test_endpoint = Endpoint::new(test_id, 0);
        let test_inbound = test_network.register(test_endpoint).await;

        Membership::init(
            test_endpoint,
            Config::default(),
            test_inbound,
            test_network.outbound(),
            test_events.to_owned(),
        )
        .await
    }

    fn test_removals(test_subscriber: &mut EventReceiver, test_member: Endpoint) -> Vec<Endpoint> {
        let mut test_locals = Vec::new();

        while let Ok(test_event) = test_subscriber.try_recv() {
            if let MembershipEvent::Removed { local, member, .. } = test_event {
                if member == test_member {
                    test_locals.push(local);
                }
            }
        }

        test_locals
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let test_membership = test_node(&mut test_network, 1, &test_events).await?;

        assert_eq!(test_membership.endpoint(), Endpoint::new(1, 0));
        assert_eq!(test_membership.state(), NodeState::Uninitialized);
        assert_eq!(test_membership.heartbeat(), 0);
        assert!(test_membership.members().is_empty());

        let test_endpoint = Endpoint::new(2, 0);
        let test_inbound = test_network.register(test_endpoint).await;
        let test_config = Config {
            fail_timeout: -5,
            ..Config::default()
        };

        assert!(Membership::init(
            test_endpoint,
            test_config,
            test_inbound,
            test_network.outbound(),
            test_events.to_owned(),
        )
        .await
        .is_err());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bootstrap() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_subscriber = test_events.subscribe();
        let mut test_introducer = test_node(&mut test_network, 1, &test_events).await?;

        test_introducer.start().await?;

        assert_eq!(test_introducer.state(), NodeState::InGroup);
        assert_eq!(test_introducer.members().len(), 1);
        assert_eq!(test_introducer.members()[0].endpoint, Endpoint::new(1, 0));
        assert_eq!(
            test_subscriber.try_recv()?,
            MembershipEvent::Added {
                timestamp: 0,
                local: Endpoint::new(1, 0),
                member: Endpoint::new(1, 0),
            },
        );
        assert_eq!(test_network.deliver(), 0);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_twice() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_introducer = test_node(&mut test_network, 1, &test_events).await?;

        test_introducer.start().await?;

        assert!(test_introducer.start().await.is_err());
        assert_eq!(test_introducer.state(), NodeState::InGroup);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;
        let mut test_b = test_node(&mut test_network, 2, &test_events).await?;

        test_a.start().await?;
        test_b.start().await?;

        assert_eq!(test_b.state(), NodeState::Joining);
        assert_eq!(test_b.members().len(), 1);

        test_network.deliver();
        test_a.tick().await;

        assert!(test_a.is_member(&Endpoint::new(2, 0)));

        test_b.tick().await;

        assert_eq!(test_b.state(), NodeState::Joining);
        assert_eq!(test_b.heartbeat(), 0);

        assert_eq!(test_network.deliver(), 1);
        test_b.tick().await;

        assert_eq!(test_b.state(), NodeState::InGroup);
        assert!(test_b.is_member(&Endpoint::new(1, 0)));
        assert!(test_b.is_member(&Endpoint::new(2, 0)));
        assert_eq!(test_b.members().len(), 2);
        assert_eq!(test_b.heartbeat(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_request_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_subscriber = test_events.subscribe();
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;
        let test_join_request = Message::JoinRequest {
            origin: Endpoint::new(2, 0),
            heartbeat: 0,
        }
        .build();
        let test_b_inbound = test_network.register(Endpoint::new(2, 0)).await;

        test_a.start().await?;
        test_subscriber.try_recv()?;

        test_a.process(&test_join_request).await?;
        test_a.process(&test_join_request).await?;

        assert_eq!(test_a.members().len(), 2);
        assert!(matches!(
            test_subscriber.try_recv()?,
            MembershipEvent::Added { member, .. } if member == Endpoint::new(2, 0),
        ));
        assert!(test_subscriber.try_recv().is_err());
        assert_eq!(test_network.deliver(), 2);

        drop(test_b_inbound);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_self_pollution() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;

        test_a.start().await?;
        test_a.tick().await;

        let test_before = test_a.members()[0];
        let test_gossip = Message::Gossip(vec![
            Member::new(Endpoint::new(1, 0), 500),
            Member::new(Endpoint::new(3, 0), 4),
        ])
        .build();
        let test_join_reply = Message::JoinReply(vec![Member::new(Endpoint::new(1, 0), 900)]).build();

        test_a.process(&test_gossip).await?;
        test_a.process(&test_join_reply).await?;

        assert_eq!(test_a.members()[0], test_before);
        assert_eq!(test_a.members().len(), 2);
        assert_eq!(test_a.heartbeat(), 1);

        test_a.tick().await;

        assert_eq!(test_a.members()[0].heartbeat, 2);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_join_reply() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_b = test_node(&mut test_network, 2, &test_events).await?;

        test_b.start().await?;

        let mut test_join_reply =
            Message::JoinReply(vec![Member::new(Endpoint::new(1, 0), 0)]).build();

        test_join_reply.truncate(10);

        assert!(matches!(
            test_b.process(&test_join_reply).await,
            Err(MembershipError::MalformedMessage { .. }),
        ));
        assert!(test_b.process(&[]).await.is_err());
        assert_eq!(test_b.state(), NodeState::Joining);
        assert_eq!(test_b.members().len(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gossip_while_joining() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_b = test_node(&mut test_network, 2, &test_events).await?;

        test_b.start().await?;

        let test_gossip = Message::Gossip(vec![Member::new(Endpoint::new(1, 0), 3)]).build();

        test_b.process(&test_gossip).await?;

        assert_eq!(test_b.state(), NodeState::InGroup);
        assert!(test_b.is_member(&Endpoint::new(1, 0)));

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gossip_round() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;
        let _test_b_inbound = test_network.register(Endpoint::new(2, 0)).await;
        let _test_c_inbound = test_network.register(Endpoint::new(3, 0)).await;

        test_a.start().await?;
        test_a
            .process(&Message::Gossip(vec![
                Member::new(Endpoint::new(2, 0), 0),
                Member::new(Endpoint::new(3, 0), 0),
            ])
            .build())
            .await?;

        for _ in 0..4 {
            test_a.tick().await;
        }

        assert_eq!(test_network.deliver(), 0);

        test_a.tick().await;

        assert_eq!(test_network.deliver(), 2);
        assert_eq!(test_network.statistics().sent, 2);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_detection() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_subscriber = test_events.subscribe();
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;
        let mut test_b = test_node(&mut test_network, 2, &test_events).await?;

        test_a.start().await?;
        test_b.start().await?;

        for _ in 0..12 {
            test_network.deliver();
            test_a.tick().await;
            test_b.tick().await;
        }

        assert!(test_a.is_member(&Endpoint::new(2, 0)));

        test_b.stop().await;
        test_network.unregister(&Endpoint::new(2, 0));

        assert_eq!(test_b.state(), NodeState::Stopped);
        assert!(test_b.members().is_empty());

        let test_last_seen = test_a
            .members()
            .iter()
            .find(|record| record.endpoint == Endpoint::new(2, 0))
            .map(|record| record.timestamp)
            .ok_or("missing member")?;

        while test_a.heartbeat() < test_last_seen + 24 {
            test_network.deliver();
            test_a.tick().await;
        }

        assert!(test_a.is_member(&Endpoint::new(2, 0)));

        test_network.deliver();
        test_a.tick().await;

        assert!(!test_a.is_member(&Endpoint::new(2, 0)));

        for _ in 0..30 {
            test_network.deliver();
            test_a.tick().await;
        }

        assert_eq!(
            test_removals(&mut test_subscriber, Endpoint::new(2, 0)),
            vec![Endpoint::new(1, 0)],
        );
        assert_eq!(test_a.members().len(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stopped_tick() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let mut test_a = test_node(&mut test_network, 1, &test_events).await?;

        test_a.tick().await;

        assert_eq!(test_a.heartbeat(), 0);

        test_a.start().await?;
        test_a.tick().await;
        test_a.stop().await;
        test_a.tick().await;

        assert_eq!(test_a.heartbeat(), 1);
        assert_eq!(test_a.state(), NodeState::Stopped);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_transport_failure() -> Result<(), Box<dyn std::error::Error>> {
        let test_events = MembershipEvent::build().await;
        let (_test_inbound_sender, test_inbound) =
            crate::channel::membership::inbound::build().await;
        let (test_dissemination, test_outbound) = Dissemination::build().await;

        drop(test_outbound);

        let mut test_b = Membership::init(
            Endpoint::new(2, 0),
            Config::default(),
            test_inbound,
            test_dissemination,
            test_events,
        )
        .await?;

        assert!(test_b.start().await.is_err());
        assert_eq!(test_b.state(), NodeState::Initialized);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_clock_on_join() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_network = EmulatedNetwork::init(0.0, 0).await?;
        let test_events = MembershipEvent::build().await;
        let test_endpoint = Endpoint::new(2, 0);
        let test_inbound = test_network.register(test_endpoint).await;
        let test_config = Config {
            sync_clock_on_join: true,
            ..Config::default()
        };
        let mut test_b = Membership::init(
            test_endpoint,
            test_config,
            test_inbound,
            test_network.outbound(),
            test_events,
        )
        .await?;

        test_b.start().await?;
        test_b
            .process(&Message::JoinReply(vec![Member::new(Endpoint::new(1, 0), 40)]).build())
            .await?;

        assert_eq!(test_b.heartbeat(), 0);
        assert_eq!(test_b.members()[0].heartbeat, 0);

        test_b.tick().await;

        assert_eq!(test_b.heartbeat(), 41);
        assert_eq!(test_b.members()[0].heartbeat, 41);
        assert!(test_b.is_member(&Endpoint::new(1, 0)));
        assert_eq!(test_b.members()[1].timestamp, 40);

        Ok(())
    }
}

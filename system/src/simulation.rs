use tokio::sync::broadcast::error::TryRecvError;

use crate::channel::membership::event::{EventReceiver, MembershipEvent};
use crate::config::Config;
use crate::membership::{MemberRecord, Membership, NodeState};
use crate::network::{EmulatedNetwork, Statistics};
use crate::node::Endpoint;
use crate::{info, warn};

/// Stop one node at a given step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Failure {
    pub node: u32,
    pub at: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    pub nodes: u32,
    pub steps: u64,
    pub join_interval: u64,
    pub failure: Option<Failure>,
    pub drop_probability: f64,
    pub seed: u64,
    pub config: Config,
}

impl Default for Scenario {
    fn default() -> Scenario {
        Scenario {
            nodes: 10,
            steps: 100,
            join_interval: 1,
            failure: None,
            drop_probability: 0.0,
            seed: 0,
            config: Config::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub endpoint: Endpoint,
    pub state: NodeState,
    pub heartbeat: i64,
    pub members: Vec<MemberRecord>,
}

impl View {
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.members.iter().any(|record| &record.endpoint == endpoint)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub views: Vec<View>,
    pub events: Vec<MembershipEvent>,
    pub statistics: Statistics,
}

/// Runs every node of a scenario over one emulated network.
pub struct Simulation {
    scenario: Scenario,
    network: EmulatedNetwork,
    nodes: Vec<Membership>,
    subscriber: EventReceiver,
    events: Vec<MembershipEvent>,
}

impl Simulation {
    pub async fn init(scenario: Scenario) -> Result<Simulation, Box<dyn std::error::Error>> {
        if scenario.nodes == 0 {
            return Err(Box::from("a simulation needs at least one node"));
        }

        let mut network = EmulatedNetwork::init(scenario.drop_probability, scenario.seed).await?;
        let mut nodes = Vec::with_capacity(scenario.nodes as usize);
        let event_sender = MembershipEvent::build().await;
        let subscriber = event_sender.subscribe();
        let config = Config {
            introducer: Endpoint::new(1, 0),
            ..scenario.config.to_owned()
        };

        for id in 1..=scenario.nodes {
            let endpoint = Endpoint::new(id, 0);
            let inbound = network.register(endpoint).await;
            let membership = Membership::init(
                endpoint,
                config.to_owned(),
                inbound,
                network.outbound(),
                event_sender.to_owned(),
            )
            .await?;

            nodes.push(membership);
        }

        info!(nodes = scenario.nodes, steps = scenario.steps, "initialized!");

        Ok(Simulation {
            scenario,
            network,
            nodes,
            subscriber,
            events: Vec::with_capacity(64),
        })
    }

    pub async fn run(mut self) -> Result<Report, Box<dyn std::error::Error>> {
        for step in 0..self.scenario.steps {
            self.step(step).await?;
        }

        let views = self
            .nodes
            .iter()
            .filter(|node| !matches!(node.state(), NodeState::Uninitialized | NodeState::Stopped))
            .map(|node| View {
                endpoint: node.endpoint(),
                state: node.state(),
                heartbeat: node.heartbeat(),
                members: node.members(),
            })
            .collect();

        info!(
            sent = self.network.statistics().sent,
            dropped = self.network.statistics().dropped,
            "simulation complete!",
        );

        Ok(Report {
            views,
            events: self.events,
            statistics: self.network.statistics(),
        })
    }

    async fn step(&mut self, step: u64) -> Result<(), Box<dyn std::error::Error>> {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if index as u64 * self.scenario.join_interval == step {
                node.start().await?;
            }
        }

        if let Some(failure) = self.scenario.failure {
            if failure.at == step {
                self.fail(failure.node).await;
            }
        }

        self.network.deliver();

        for node in self.nodes.iter_mut() {
            node.tick().await;
        }

        self.collect_events();

        Ok(())
    }

    async fn fail(&mut self, id: u32) {
        let endpoint = Endpoint::new(id, 0);

        match self.nodes.iter_mut().find(|node| node.endpoint() == endpoint) {
            Some(node) => {
                info!(node = %endpoint, "failing node");

                node.stop().await;
                self.network.unregister(&endpoint);
            }
            None => warn!(node = %endpoint, "no such node to fail"),
        }
    }

    fn collect_events(&mut self) {
        loop {
            match self.subscriber.try_recv() {
                Ok(event) => self.events.push(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("missed {} membership events", missed);
                }
                Err(_) => break,
            }
        }
    }
}

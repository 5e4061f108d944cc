use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::channel::membership::inbound::{enqueue, InboundReceiver, InboundSender};
use crate::channel::membership::sender::{
    Dissemination, DisseminationReceiver, DisseminationSender, DISSEMINATION_CAPACITY,
};
use crate::node::Endpoint;
use crate::{debug, info};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// In-process stand-in for an unreliable datagram network.
///
/// Every node sends through its own outbound queue; [`EmulatedNetwork::deliver`]
/// moves every pending datagram into its target's inbound queue or loses it.
pub struct EmulatedNetwork {
    outboxes: Vec<DisseminationReceiver>,
    inboxes: HashMap<Endpoint, InboundSender>,
    drop_probability: f64,
    rng: StdRng,
    statistics: Statistics,
}

impl EmulatedNetwork {
    pub async fn init(
        drop_probability: f64,
        seed: u64,
    ) -> Result<EmulatedNetwork, Box<dyn std::error::Error>> {
        if !(0.0..=1.0).contains(&drop_probability) {
            return Err(Box::from(format!(
                "drop probability must be within 0 and 1, got {}",
                drop_probability,
            )));
        }

        let outboxes = Vec::with_capacity(10);
        let inboxes = HashMap::with_capacity(10);
        let rng = StdRng::seed_from_u64(seed);

        info!(drop_probability, seed, "initialized!");

        Ok(EmulatedNetwork {
            outboxes,
            inboxes,
            drop_probability,
            rng,
            statistics: Statistics::default(),
        })
    }

    pub async fn register(&mut self, endpoint: Endpoint) -> InboundReceiver {
        let (inbound_sender, inbound_receiver) = crate::channel::membership::inbound::build().await;

        self.inboxes.insert(endpoint, inbound_sender);

        inbound_receiver
    }

    pub fn unregister(&mut self, endpoint: &Endpoint) {
        self.inboxes.remove(endpoint);
    }

    /// Opens a new outbound queue, one per sending node.
    pub fn outbound(&mut self) -> DisseminationSender {
        let (dissemination_sender, dissemination_receiver) = mpsc::channel(DISSEMINATION_CAPACITY);

        self.outboxes.push(dissemination_receiver);

        dissemination_sender
    }

    /// Routes everything queued so far, outbox by outbox, and returns how
    /// many datagrams landed.
    pub fn deliver(&mut self) -> usize {
        let mut delivered = 0;
        let mut outboxes = std::mem::take(&mut self.outboxes);

        outboxes.retain_mut(|outbox| loop {
            match outbox.try_recv() {
                Ok(datagram) => {
                    if self.route(datagram) {
                        delivered += 1;
                    }
                }
                Err(TryRecvError::Empty) => break true,
                Err(TryRecvError::Disconnected) => break false,
            }
        });

        self.outboxes = outboxes;

        delivered
    }

    fn route(&mut self, datagram: Dissemination) -> bool {
        let Dissemination::Message {
            origin,
            target,
            bytes,
        } = datagram;

        self.statistics.sent += 1;

        if self.drop_probability > 0.0 && self.rng.gen_bool(self.drop_probability) {
            debug!(origin = %origin, target = %target, "dropped datagram");

            self.statistics.dropped += 1;

            return false;
        }

        match self.inboxes.get(&target) {
            Some(inbox) if enqueue(inbox, bytes) => {
                self.statistics.delivered += 1;

                true
            }
            _ => {
                debug!(origin = %origin, target = %target, "undeliverable datagram");

                self.statistics.dropped += 1;

                false
            }
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }
}

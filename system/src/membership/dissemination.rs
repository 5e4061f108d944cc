use rand::seq::SliceRandom;

use crate::config::{Config, Fanout};
use crate::membership::{Membership, Message};
use crate::node::Endpoint;
use crate::{debug, warn};

/// Countdown that fires a gossip round every `fail_timeout` ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct GossipRound {
    period: i64,
    countdown: i64,
    fanout: Fanout,
}

impl GossipRound {
    pub fn init(config: &Config) -> GossipRound {
        let period = config.fail_timeout.max(1);

        GossipRound {
            period,
            countdown: period,
            fanout: config.fanout,
        }
    }

    /// Counts one tick down; `true` when a round is due.
    pub fn ready(&mut self) -> bool {
        self.countdown -= 1;

        if self.countdown <= 0 {
            self.countdown = self.period;

            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.countdown = self.period;
    }

    pub fn targets(&self, peers: Vec<Endpoint>) -> Vec<Endpoint> {
        match self.fanout {
            Fanout::All => peers,
            Fanout::Random(count) => {
                let mut rng = rand::thread_rng();

                peers
                    .choose_multiple(&mut rng, count)
                    .copied()
                    .collect()
            }
        }
    }
}

impl Membership {
    /// Pushes the whole table to this round's targets.
    pub(super) fn disseminate(&self) {
        let targets = self.gossip.targets(self.list.peers());
        let members = self
            .list
            .snapshot()
            .iter()
            .map(|record| record.member())
            .collect();
        let gossip = Message::Gossip(members);

        for target in targets {
            debug!(local = %self.endpoint, target = %target, "gossip");

            if let Err(error) = self.send(target, &gossip) {
                warn!(local = %self.endpoint, "gossip -> {}", error);
            }
        }
    }
}

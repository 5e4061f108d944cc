use std::time::Duration;

use crate::node::Endpoint;

/// Ticks before a silent member counts as failed.
pub const FAIL_TIMEOUT: i64 = 5;
/// Additional ticks after failure before the member is removed.
pub const REMOVE_TIMEOUT: i64 = 20;

/// How many peers receive the table each gossip round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fanout {
    All,
    Random(usize),
}

impl Fanout {
    pub fn from_str(fanout: &str) -> Result<Fanout, Box<dyn std::error::Error>> {
        match fanout {
            "all" => Ok(Fanout::All),
            peers => {
                let peers = peers.parse::<usize>()?;

                if peers == 0 {
                    return Err(Box::from("fanout must be `all` or at least 1"));
                }

                Ok(Fanout::Random(peers))
            }
        }
    }
}

/// Parses a timeout in ticks.
pub fn timeout_from_str(timeout: &str) -> Result<i64, Box<dyn std::error::Error>> {
    let timeout = timeout.parse::<i64>()?;

    if timeout < 0 {
        return Err(Box::from(format!("timeouts must be at least 0, got {}", timeout)));
    }

    Ok(timeout)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub fail_timeout: i64,
    pub remove_timeout: i64,
    pub introducer: Endpoint,
    pub fanout: Fanout,
    pub protocol_period: Duration,
    /// A joining node advances its clock to the newest heartbeat in the
    /// join reply, so nodes started long after the introducer are not
    /// treated as stale by peers.
    pub sync_clock_on_join: bool,
}

impl Config {
    pub fn with_introducer(introducer: Endpoint) -> Config {
        Config {
            introducer,
            ..Config::default()
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.fail_timeout < 0 || self.remove_timeout < 0 {
            return Err(Box::from(format!(
                "timeouts must be at least 0, got fail {} and remove {}",
                self.fail_timeout, self.remove_timeout,
            )));
        }

        Ok(())
    }

    /// Local clock age at which a record is evicted.
    pub fn removal_deadline(&self) -> i64 {
        self.fail_timeout.saturating_add(self.remove_timeout)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            fail_timeout: FAIL_TIMEOUT,
            remove_timeout: REMOVE_TIMEOUT,
            introducer: Endpoint::new(1, 0),
            fanout: Fanout::All,
            protocol_period: Duration::from_secs(1),
            sync_clock_on_join: false,
        }
    }
}

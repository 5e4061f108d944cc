use crate::config::Config;
use crate::membership::list::{List, MemberRecord};

/// Evicts members whose last refresh is older than
/// `fail_timeout + remove_timeout` local ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FailureDetector {
    fail_timeout: i64,
    remove_timeout: i64,
}

impl FailureDetector {
    pub fn init(config: &Config) -> FailureDetector {
        FailureDetector {
            fail_timeout: config.fail_timeout,
            remove_timeout: config.remove_timeout,
        }
    }

    pub fn detect(&self, list: &mut List, clock: i64) -> Vec<MemberRecord> {
        list.evict_expired(clock, self.fail_timeout, self.remove_timeout)
    }
}

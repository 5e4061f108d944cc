use crate::membership::MembershipError;
use crate::node::Endpoint;

/// A member as carried on the wire: identity plus its self-reported heartbeat.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Member {
    pub endpoint: Endpoint,
    pub heartbeat: i64,
}

impl Member {
    pub fn new(endpoint: Endpoint, heartbeat: i64) -> Member {
        Member {
            endpoint,
            heartbeat,
        }
    }
}

/// One row of the membership table.
///
/// `timestamp` is the local clock at the last refresh, never the remote one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemberRecord {
    pub endpoint: Endpoint,
    pub heartbeat: i64,
    pub timestamp: i64,
}

impl MemberRecord {
    pub fn member(&self) -> Member {
        Member::new(self.endpoint, self.heartbeat)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

pub struct List {
    local: Endpoint,
    removal_deadline: i64,
    members: Vec<MemberRecord>,
}

impl List {
    pub fn init(local: Endpoint, removal_deadline: i64) -> List {
        let members = Vec::with_capacity(10);

        List {
            local,
            removal_deadline,
            members,
        }
    }

    /// Inserts the self record at the head of the table.
    pub fn register_self(&mut self, heartbeat: i64) {
        self.members.retain(|record| record.endpoint != self.local);
        self.members.insert(
            0,
            MemberRecord {
                endpoint: self.local,
                heartbeat,
                timestamp: heartbeat,
            },
        );
    }

    /// Advances the self record to the local clock.
    pub fn refresh_self(&mut self, clock: i64) {
        if let Some(record) = self
            .members
            .iter_mut()
            .find(|record| record.endpoint == self.local)
        {
            record.heartbeat = clock;
            record.timestamp = clock;
        }
    }

    /// Shifts every local timestamp forward after the local clock jumped.
    pub fn rebase(&mut self, delta: i64) {
        for record in self.members.iter_mut() {
            record.timestamp = record.timestamp.saturating_add(delta);
        }
    }

    pub fn self_record_id(&self) -> Endpoint {
        self.local
    }

    pub fn upsert(
        &mut self,
        endpoint: Endpoint,
        heartbeat: i64,
        clock: i64,
    ) -> Result<Upsert, MembershipError> {
        if endpoint == self.local {
            return Err(MembershipError::DuplicateSelfReference(endpoint));
        }

        match self
            .members
            .iter_mut()
            .find(|record| record.endpoint == endpoint)
        {
            Some(record) => {
                if heartbeat > record.heartbeat {
                    record.heartbeat = heartbeat;
                    record.timestamp = clock;

                    Ok(Upsert::Updated)
                } else {
                    Ok(Upsert::Unchanged)
                }
            }
            None => {
                if heartbeat.saturating_add(self.removal_deadline) <= clock {
                    return Err(MembershipError::StaleResurrection(endpoint));
                }

                self.members.push(MemberRecord {
                    endpoint,
                    heartbeat,
                    timestamp: clock,
                });

                Ok(Upsert::Inserted)
            }
        }
    }

    /// Removes every non-self record whose age reached the deadline and
    /// returns them in table order.
    pub fn evict_expired(
        &mut self,
        clock: i64,
        fail_timeout: i64,
        remove_timeout: i64,
    ) -> Vec<MemberRecord> {
        let local = self.local;
        let (kept, evicted): (Vec<MemberRecord>, Vec<MemberRecord>) =
            self.members.drain(..).partition(|record| {
                record.endpoint == local
                    || record
                        .timestamp
                        .saturating_add(fail_timeout)
                        .saturating_add(remove_timeout)
                        > clock
            });

        self.members = kept;

        evicted
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&MemberRecord> {
        self.members
            .iter()
            .find(|record| &record.endpoint == endpoint)
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.get(endpoint).is_some()
    }

    pub fn peers(&self) -> Vec<Endpoint> {
        self.members
            .iter()
            .map(|record| record.endpoint)
            .filter(|endpoint| endpoint != &self.local)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<MemberRecord> {
        self.members.to_vec()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}

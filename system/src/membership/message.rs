use bytes::{Buf, BufMut, BytesMut};

use crate::membership::list::Member;
use crate::membership::MembershipError;
use crate::node::Endpoint;

pub const JOIN_REQUEST: u8 = 0;
pub const JOIN_REPLY: u8 = 1;
pub const GOSSIP: u8 = 2;

pub const HEADER_SIZE: usize = 1;
pub const ENDPOINT_SIZE: usize = 6;
pub const HEARTBEAT_SIZE: usize = 8;
pub const COUNT_SIZE: usize = 4;
pub const RECORD_SIZE: usize = ENDPOINT_SIZE + HEARTBEAT_SIZE;

/// Membership protocol datagrams.
///
/// Every integer is written big-endian. A type tag byte leads each message:
///
/// ```text
/// JoinRequest  | 0 | id u32 | port u16 | heartbeat i64 |
/// JoinReply    | 1 | count u32 | count * (id u32 | port u16 | heartbeat i64) |
/// Gossip       | 2 | count u32 | count * (id u32 | port u16 | heartbeat i64) |
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    JoinRequest { origin: Endpoint, heartbeat: i64 },
    JoinReply(Vec<Member>),
    Gossip(Vec<Member>),
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::JoinRequest { .. } => JOIN_REQUEST,
            Message::JoinReply(_) => JOIN_REPLY,
            Message::Gossip(_) => GOSSIP,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Message::JoinRequest { .. } => HEADER_SIZE + RECORD_SIZE,
            Message::JoinReply(members) | Message::Gossip(members) => {
                HEADER_SIZE + COUNT_SIZE + members.len() * RECORD_SIZE
            }
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(self.encoded_len());

        buffer.put_u8(self.tag());

        match self {
            Message::JoinRequest { origin, heartbeat } => {
                put_member(&mut buffer, &Member::new(*origin, *heartbeat));
            }
            Message::JoinReply(members) | Message::Gossip(members) => {
                buffer.put_u32(members.len() as u32);

                for member in members {
                    put_member(&mut buffer, member);
                }
            }
        }

        buffer.to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Message, MembershipError> {
        let mut buffer = bytes;

        ensure(buffer, HEADER_SIZE, bytes.len())?;

        match buffer.get_u8() {
            JOIN_REQUEST => {
                ensure(buffer, RECORD_SIZE, bytes.len())?;

                let member = get_member(&mut buffer);

                Ok(Message::JoinRequest {
                    origin: member.endpoint,
                    heartbeat: member.heartbeat,
                })
            }
            JOIN_REPLY => Ok(Message::JoinReply(get_members(buffer, bytes.len())?)),
            GOSSIP => Ok(Message::Gossip(get_members(buffer, bytes.len())?)),
            unknown => Err(MembershipError::UnknownMessageType(unknown)),
        }
    }
}

fn ensure(buffer: &[u8], required: usize, total: usize) -> Result<(), MembershipError> {
    if buffer.remaining() < required {
        return Err(MembershipError::MalformedMessage {
            expected: total - buffer.remaining() + required,
            received: total,
        });
    }

    Ok(())
}

fn put_member(buffer: &mut BytesMut, member: &Member) {
    buffer.put_u32(member.endpoint.id);
    buffer.put_u16(member.endpoint.port);
    buffer.put_i64(member.heartbeat);
}

fn get_member(buffer: &mut &[u8]) -> Member {
    let id = buffer.get_u32();
    let port = buffer.get_u16();
    let heartbeat = buffer.get_i64();

    Member::new(Endpoint::new(id, port), heartbeat)
}

fn get_members(mut buffer: &[u8], total: usize) -> Result<Vec<Member>, MembershipError> {
    ensure(buffer, COUNT_SIZE, total)?;

    let count = buffer.get_u32() as usize;
    let required = count
        .checked_mul(RECORD_SIZE)
        .ok_or(MembershipError::MalformedMessage {
            expected: usize::MAX,
            received: total,
        })?;

    ensure(buffer, required, total)?;

    let mut members = Vec::with_capacity(count);

    for _ in 0..count {
        members.push(get_member(&mut buffer));
    }

    Ok(members)
}

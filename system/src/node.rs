use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Identity of a cluster member: a 4-byte id plus a 2-byte port.
///
/// For the UDP transport the id is read as an IPv4 address, so an endpoint
/// maps one-to-one onto a `SocketAddrV4`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Endpoint {
    pub id: u32,
    pub port: u16,
}

impl Endpoint {
    pub fn new(id: u32, port: u16) -> Endpoint {
        Endpoint { id, port }
    }

    pub fn from_socket_address(address: SocketAddr) -> Result<Endpoint, Box<dyn std::error::Error>> {
        match address {
            SocketAddr::V4(v4) => Ok(Endpoint::from(v4)),
            SocketAddr::V6(v6) => Err(Box::from(format!(
                "endpoints are ipv4 only, got {}",
                v6,
            ))),
        }
    }

    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::from(*self))
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(address: SocketAddrV4) -> Endpoint {
        Endpoint {
            id: u32::from(*address.ip()),
            port: address.port(),
        }
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(endpoint.id), endpoint.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Ipv4Addr::from(self.id), self.port)
    }
}

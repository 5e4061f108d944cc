use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::channel::membership::inbound::{enqueue, InboundSender};
use crate::channel::membership::sender::{Dissemination, DisseminationReceiver};
use crate::channel::transition::ShutdownSender;
use crate::{debug, error, info};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Feeds datagrams from the socket into the node's inbound queue.
pub struct Receiver {
    udp_socket: Arc<UdpSocket>,
    inbound: InboundSender,
    shutdown: ShutdownSender,
}

impl Receiver {
    pub async fn init(
        udp_socket: Arc<UdpSocket>,
        inbound: InboundSender,
        shutdown: ShutdownSender,
    ) -> Receiver {
        info!("initialized!");

        Receiver {
            udp_socket,
            inbound,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut buffer = vec![0; MAX_DATAGRAM_SIZE];
        let mut shutdown = self.shutdown.subscribe();

        info!("running!");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("shutting down...");

                    break
                }
                result = self.udp_socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((bytes, origin)) => {
                            debug!(origin = %origin, bytes, "received datagram");

                            if !enqueue(&self.inbound, buffer[..bytes].to_vec()) {
                                debug!(origin = %origin, "datagram dropped");
                            }
                        }
                        Err(error) => error!("receiving UDP message -> {:?}", error),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Drains the outbound queue onto the socket.
pub struct Sender {
    udp_socket: Arc<UdpSocket>,
    dissemination: DisseminationReceiver,
    shutdown: ShutdownSender,
}

impl Sender {
    pub async fn init(
        udp_socket: Arc<UdpSocket>,
        dissemination: DisseminationReceiver,
        shutdown: ShutdownSender,
    ) -> Sender {
        info!("initialized!");

        Sender {
            udp_socket,
            dissemination,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("shutting down...");

                    break
                }
                Some(Dissemination::Message { origin, target, bytes }) = self.dissemination.recv() => {
                    debug!(origin = %origin, target = %target, "sending UDP message -> {:?}", &bytes);

                    if let Err(error) = self
                        .udp_socket
                        .send_to(&bytes, target.socket_address())
                        .await
                    {
                        error!(target = %target, "sending UDP message -> {:?}", error);
                    }
                }
                else => break,
            }
        }

        Ok(())
    }
}

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::warn;

pub type InboundReceiver = mpsc::Receiver<Vec<u8>>;
pub type InboundSender = mpsc::Sender<Vec<u8>>;

pub const INBOUND_CAPACITY: usize = 1024;

pub async fn build() -> (InboundSender, InboundReceiver) {
    let (inbound_sender, inbound_receiver) = mpsc::channel::<Vec<u8>>(INBOUND_CAPACITY);

    (inbound_sender, inbound_receiver)
}

/// Pushes a datagram onto a node's queue without waiting.
///
/// Returns `false` when the datagram was dropped.
pub fn enqueue(inbound: &InboundSender, bytes: Vec<u8>) -> bool {
    match inbound.try_send(bytes) {
        Ok(()) => true,
        Err(TrySendError::Full(bytes)) => {
            warn!("inbound queue full, dropping {} bytes", bytes.len());

            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

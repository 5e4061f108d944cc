use tokio::sync::mpsc;

use crate::node::Endpoint;

pub type DisseminationReceiver = mpsc::Receiver<Dissemination>;
pub type DisseminationSender = mpsc::Sender<Dissemination>;

pub const DISSEMINATION_CAPACITY: usize = 1024;

/// An outbound datagram handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum Dissemination {
    Message {
        origin: Endpoint,
        target: Endpoint,
        bytes: Vec<u8>,
    },
}

impl Dissemination {
    pub async fn build() -> (DisseminationSender, DisseminationReceiver) {
        let (dissemination_sender, dissemination_receiver) =
            mpsc::channel::<Dissemination>(DISSEMINATION_CAPACITY);

        (dissemination_sender, dissemination_receiver)
    }
}

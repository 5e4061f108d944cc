use tokio::sync::broadcast;

pub type ShutdownSender = broadcast::Sender<Shutdown>;

#[derive(Clone, Debug)]
pub enum Shutdown {
    Run,
}

impl Shutdown {
    pub async fn build() -> ShutdownSender {
        let (shutdown_sender, _shutdown_receiver) = broadcast::channel::<Shutdown>(64);

        shutdown_sender
    }

    pub async fn send(shutdown: &ShutdownSender) -> Result<(), Box<dyn std::error::Error>> {
        shutdown.send(Shutdown::Run)?;

        Ok(())
    }
}

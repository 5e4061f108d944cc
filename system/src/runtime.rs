use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::signal::ctrl_c;
use tokio::time::{interval, MissedTickBehavior};

use crate::channel::membership::event::MembershipEvent;
use crate::channel::membership::inbound;
use crate::channel::membership::sender::Dissemination;
use crate::channel::transition::{Shutdown, ShutdownSender};
use crate::communications::{Receiver, Sender};
use crate::config::Config;
use crate::membership::Membership;
use crate::node::Endpoint;
use crate::{error, info};

pub async fn launch(endpoint: Endpoint, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("node -> {}", &endpoint);
    info!("introducer -> {}", &config.introducer);

    // -------------------------------------------------------------------------------------------
    // |        init shutdown channel
    // -------------------------------------------------------------------------------------------

    let shutdown_signal = Shutdown::build().await;
    let shutdown_receiver_task = shutdown_signal.to_owned();
    let shutdown_sender_task = shutdown_signal.to_owned();
    let shutdown_membership_task = shutdown_signal.to_owned();
    let mut system_shutdown = shutdown_signal.subscribe();

    // -------------------------------------------------------------------------------------------
    // |        init membership channels
    // -------------------------------------------------------------------------------------------

    let (inbound_sender, inbound_receiver) = inbound::build().await;
    let (dissemination_sender, dissemination_receiver) = Dissemination::build().await;
    let event_sender = MembershipEvent::build().await;

    // -------------------------------------------------------------------------------------------
    // |        init udp socket
    // -------------------------------------------------------------------------------------------

    let udp_socket = UdpSocket::bind(endpoint.socket_address()).await?;
    let receiving_udp_socket = Arc::new(udp_socket);
    let sending_udp_socket = receiving_udp_socket.clone();

    // -------------------------------------------------------------------------------------------
    // |        init membership
    // -------------------------------------------------------------------------------------------

    let protocol_period = config.protocol_period;

    let mut membership = Membership::init(
        endpoint,
        config,
        inbound_receiver,
        dissemination_sender,
        event_sender,
    )
    .await?;

    membership.start().await?;

    let membership_handle = tokio::spawn(async move {
        if let Err(error) = run_membership(membership, protocol_period, shutdown_membership_task).await
        {
            error!("membership -> {:?}", error);
        }
    });

    // -------------------------------------------------------------------------------------------
    // |        init udp receiver + sender
    // -------------------------------------------------------------------------------------------

    let mut receiver =
        Receiver::init(receiving_udp_socket, inbound_sender, shutdown_receiver_task).await;

    let receiver_handle = tokio::spawn(async move {
        if let Err(error) = receiver.run().await {
            error!("udp receiver -> {:?}", error);
        }
    });

    let mut sender =
        Sender::init(sending_udp_socket, dissemination_receiver, shutdown_sender_task).await;

    let sender_handle = tokio::spawn(async move {
        if let Err(error) = sender.run().await {
            error!("udp sender -> {:?}", error);
        }
    });

    // -------------------------------------------------------------------------------------------
    // |        init shutdown signal
    // -------------------------------------------------------------------------------------------

    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            ctrl_c = ctrl_c() => {
                info!("received shutdown signal {:?}", ctrl_c);
                info!("preparing to shut down...");

                if let Err(error) = Shutdown::send(&shutdown_signal).await {
                    error!("error sending shutdown signal! -> {:?}", error);
                }
            }
            _ = system_shutdown.recv() => {
                info!("shutting down...");
            }
        }
    });

    // -------------------------------------------------------------------------------------------
    // |        launch!!!
    // -------------------------------------------------------------------------------------------

    tokio::try_join!(
        membership_handle,
        receiver_handle,
        sender_handle,
        shutdown_handle,
    )?;

    Ok(())
}

/// Ticks the node once per protocol period until shutdown.
pub async fn run_membership(
    mut membership: Membership,
    protocol_period: std::time::Duration,
    shutdown: ShutdownSender,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut shutdown = shutdown.subscribe();
    let mut protocol_period = interval(protocol_period);

    protocol_period.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("running...");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                membership.stop().await;

                break
            }
            _ = protocol_period.tick() => {
                membership.tick().await;
            }
        }
    }

    Ok(())
}

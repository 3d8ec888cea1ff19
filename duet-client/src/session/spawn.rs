use crate::channel::{ChannelEvent, RendezvousChannel, SignalingOutput};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::MediaCapture;
use crate::negotiation::PeerConnector;
use crate::session::{SessionController, SessionHandle};
use duet_core::EventName;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Forward every channel event into one ordered queue.
///
/// Rejections switch automatic reconnection off inside the channel's own read
/// loop, before the coordinator gets to close the transport.
pub fn bind_channel(channel: &RendezvousChannel) -> mpsc::UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    for name in EventName::ALL {
        let tx = tx.clone();
        let switch = channel.reconnect_switch();
        let rejection = matches!(name, EventName::RoomFull | EventName::DuplicateSession);

        channel.on(name, move |event| {
            if rejection {
                switch.disable();
            }
            let _ = tx.send(event.clone());
        });
    }

    rx
}

/// Wire a controller to `channel`, open the transport and start the controller task.
pub fn spawn_session(
    config: SessionConfig,
    channel: &RendezvousChannel,
    connector: Arc<dyn PeerConnector>,
    capture: &dyn MediaCapture,
) -> Result<SessionHandle, SessionError> {
    let channel_rx = bind_channel(channel);
    let channel = channel.connect()?;
    let signaling: Arc<dyn SignalingOutput> = Arc::new(channel);

    let (controller, handle) =
        SessionController::new(config, signaling, connector, capture.local_tracks(), channel_rx);
    tokio::spawn(controller.run());

    Ok(handle)
}

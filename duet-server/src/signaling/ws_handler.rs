use crate::CoordinatorState;
use crate::room::RoomCommand;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use duet_core::{ClientMessage, ConnectionId, ServerMessage, SessionId};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The room a socket joined. A socket joins at most one session.
type RoomBinding = Arc<OnceLock<(SessionId, mpsc::Sender<RoomCommand>)>>;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<CoordinatorState>,
) -> impl IntoResponse {
    let connection_id = ConnectionId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

async fn handle_socket(socket: WebSocket, connection_id: ConnectionId, state: CoordinatorState) {
    info!("New WebSocket connection: {:?}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let binding: RoomBinding = Arc::new(OnceLock::new());

    state.signaling.add_connection(connection_id, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let binding = binding.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            if !route(&state, &binding, connection_id, message).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid ClientMessage from {:?}: {:?}", connection_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.signaling.remove_connection(&connection_id);

    if let Some((_, room)) = binding.get() {
        let _ = room.send(RoomCommand::Disconnect { connection_id }).await;
    }
    info!("WebSocket disconnected: {:?}", connection_id);
}

/// Forward one client message to its room. Returns `false` once the room is gone.
async fn route(
    state: &CoordinatorState,
    binding: &RoomBinding,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> bool {
    let command = match message {
        ClientMessage::Join(request) => {
            let room = match binding.get() {
                Some((session_id, room)) if *session_id == request.session_id => room.clone(),
                Some((session_id, _)) => {
                    warn!(
                        "{:?} is bound to {} and cannot join {}",
                        connection_id, session_id, request.session_id
                    );
                    reply_error(state, connection_id, "connection already joined another session");
                    return true;
                }
                None => {
                    let room = state.rooms.get_room_sender(&request.session_id);
                    let _ = binding.set((request.session_id.clone(), room.clone()));
                    room
                }
            };
            debug!(
                "{:?} wants to join {} as {}",
                connection_id, request.session_id, request.persistent_id
            );
            return forward(&room, RoomCommand::Join { connection_id, request }).await;
        }
        message => RoomCommand::Signal {
            connection_id,
            message,
        },
    };

    match binding.get() {
        Some((_, room)) => forward(room, command).await,
        None => {
            reply_error(state, connection_id, "join a session first");
            true
        }
    }
}

async fn forward(room: &mpsc::Sender<RoomCommand>, command: RoomCommand) -> bool {
    if let Err(e) = room.send(command).await {
        error!("Room died: {}", e);
        return false;
    }
    true
}

fn reply_error(state: &CoordinatorState, connection_id: ConnectionId, message: &str) {
    state.signaling.send_signal(
        connection_id,
        &ServerMessage::Error {
            message: message.to_string(),
        },
    );
}

//! Rendezvous coordinator: one room actor per session, reached over `/ws`.

mod config;
mod error;
mod room;
mod signaling;

pub use config::*;
pub use error::*;
pub use room::*;
pub use signaling::*;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared by every socket handler.
#[derive(Clone)]
pub struct CoordinatorState {
    pub signaling: SignalingService,
    pub rooms: RoomManager,
}

impl CoordinatorState {
    pub fn new(config: CoordinatorConfig) -> Self {
        let signaling = SignalingService::new();
        let rooms = RoomManager::new(Arc::new(signaling.clone()), config);

        Self { signaling, rooms }
    }
}

pub fn app(state: CoordinatorState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Serve on an already bound listener; used by tests that bind port 0.
pub async fn serve_with_listener(
    listener: TcpListener,
    config: CoordinatorConfig,
) -> anyhow::Result<()> {
    serve_with_state(listener, CoordinatorState::new(config)).await
}

/// Serve with a state the caller keeps a handle to.
pub async fn serve_with_state(listener: TcpListener, state: CoordinatorState) -> anyhow::Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read coordinator address")?;
    info!("Coordinator listening on {}", addr);

    axum::serve(listener, app(state))
        .await
        .map_err(CoordinatorError::Serve)?;
    Ok(())
}

pub async fn serve(config: CoordinatorConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CoordinatorError::Bind { addr, source })?;

    serve_with_listener(listener, config).await
}

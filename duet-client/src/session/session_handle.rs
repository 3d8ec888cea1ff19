use crate::error::SessionError;
use crate::session::{SessionCommand, SessionObserver, SessionStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Cheap, cloneable front end of a running [`SessionController`](crate::SessionController).
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    /// Ask to join. Repeated calls while joining or joined emit nothing.
    pub async fn join(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Join).await
    }

    pub async fn leave(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave).await
    }

    /// Only a request; the room's recording state changes when the coordinator
    /// broadcasts it.
    pub async fn request_start_recording(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StartRecording).await
    }

    pub async fn request_stop_recording(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StopRecording).await
    }

    pub async fn set_observer(&self, observer: Arc<dyn SessionObserver>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetObserver(observer)).await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Status(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::ControllerGone)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerGone)
    }
}

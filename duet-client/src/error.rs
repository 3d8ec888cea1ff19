use crate::negotiation::{NegotiationPhase, NegotiationRole};
use duet_core::SdpKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid rendezvous url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("{op} is not allowed for the {role:?} side in phase {phase:?}")]
    InvalidPhase {
        op: &'static str,
        role: NegotiationRole,
        phase: NegotiationPhase,
    },
    #[error("expected an {expected:?} description, got {got:?}")]
    UnexpectedDescription { expected: SdpKind, got: SdpKind },
    #[error("negotiation session is closed")]
    Closed,
    #[error("peer connection error: {0:#}")]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session controller is no longer running")]
    ControllerGone,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

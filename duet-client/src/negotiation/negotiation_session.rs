use crate::channel::SignalingOutput;
use crate::config::IceConfig;
use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::negotiation::{PeerConnectionState, PeerConnector, PeerEvent, PeerEventSink, PeerTransport};
use duet_core::{ConnectionId, IceCandidate, SdpKind, SessionDescription};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Stable handle of one negotiation, never reused within a controller.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NegotiationId(pub u64);

impl fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Already present when the peer arrived; sends the offer.
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    New,
    OfferSent,
    OfferReceived,
    AnswerExchanged,
    Connected,
    Closed,
}

/// Offer/answer state machine for one remote participant.
///
/// Remote candidates that arrive before the remote description are held in a
/// FIFO buffer and applied, in arrival order, right after the description is set.
pub struct NegotiationSession {
    id: NegotiationId,
    peer: ConnectionId,
    role: NegotiationRole,
    phase: NegotiationPhase,
    transport: Option<Box<dyn PeerTransport>>,
    hooks: PeerEventSink,
    pending_candidates: VecDeque<IceCandidate>,
    remote_description_set: bool,
}

impl NegotiationSession {
    /// Build the peer connection for `peer` with `local_tracks` attached. Its hooks
    /// report into `events`, tagged with `id`.
    pub async fn create(
        id: NegotiationId,
        peer: ConnectionId,
        role: NegotiationRole,
        connector: &dyn PeerConnector,
        ice: &IceConfig,
        local_tracks: &[LocalTrack],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Self, NegotiationError> {
        let hooks = PeerEventSink::new(id, peer, events);
        let transport = connector.connect(ice, local_tracks, hooks.clone()).await?;

        info!("Negotiation {} with {:?} created as {:?}", id, peer, role);

        Ok(Self {
            id,
            peer,
            role,
            phase: NegotiationPhase::New,
            transport: Some(transport),
            hooks,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
        })
    }

    pub fn id(&self) -> NegotiationId {
        self.id
    }

    pub fn peer(&self) -> ConnectionId {
        self.peer
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == NegotiationPhase::Closed
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_len(&self) -> usize {
        self.pending_candidates.len()
    }

    pub async fn send_offer(&mut self, signaling: &dyn SignalingOutput) -> Result<(), NegotiationError> {
        self.expect(NegotiationRole::Initiator, NegotiationPhase::New, "send_offer")?;

        let transport = self.transport()?;
        let offer = transport.create_offer().await?;
        transport.set_local_description(offer.clone()).await?;
        signaling.send_offer(self.peer, offer).await;

        self.phase = NegotiationPhase::OfferSent;
        debug!("Negotiation {} sent offer to {:?}", self.id, self.peer);
        Ok(())
    }

    pub async fn receive_offer(
        &mut self,
        description: SessionDescription,
        signaling: &dyn SignalingOutput,
    ) -> Result<(), NegotiationError> {
        self.expect(NegotiationRole::Responder, NegotiationPhase::New, "receive_offer")?;
        expect_kind(SdpKind::Offer, &description)?;

        self.transport()?.set_remote_description(description).await?;
        self.remote_description_set = true;
        self.phase = NegotiationPhase::OfferReceived;
        self.drain_pending().await;

        let transport = self.transport()?;
        let answer = transport.create_answer().await?;
        transport.set_local_description(answer.clone()).await?;
        signaling.send_answer(self.peer, answer).await;

        self.phase = NegotiationPhase::AnswerExchanged;
        debug!("Negotiation {} answered {:?}", self.id, self.peer);
        Ok(())
    }

    pub async fn receive_answer(&mut self, description: SessionDescription) -> Result<(), NegotiationError> {
        self.expect(NegotiationRole::Initiator, NegotiationPhase::OfferSent, "receive_answer")?;
        expect_kind(SdpKind::Answer, &description)?;

        self.transport()?.set_remote_description(description).await?;
        self.remote_description_set = true;
        self.drain_pending().await;

        self.phase = NegotiationPhase::AnswerExchanged;
        debug!("Negotiation {} got answer from {:?}", self.id, self.peer);
        Ok(())
    }

    /// Buffers until the remote description is set. A candidate that fails to
    /// apply is logged and skipped.
    pub async fn receive_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }

        if !self.remote_description_set {
            self.pending_candidates.push_back(candidate);
            debug!(
                "Negotiation {} buffered candidate ({} pending)",
                self.id,
                self.pending_candidates.len()
            );
            return Ok(());
        }

        if let Err(e) = self.transport()?.add_ice_candidate(candidate).await {
            warn!("Skipping ICE candidate from {:?}: {:#}", self.peer, e);
        }
        Ok(())
    }

    pub fn on_connection_state(&mut self, state: PeerConnectionState) {
        if state == PeerConnectionState::Connected && self.phase == NegotiationPhase::AnswerExchanged {
            info!("Negotiation {} with {:?} connected", self.id, self.peer);
            self.phase = NegotiationPhase::Connected;
        }
    }

    /// Safe in any phase and idempotent. Never fails; transport errors are logged.
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }

        self.hooks.detach();
        self.pending_candidates.clear();
        self.phase = NegotiationPhase::Closed;

        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Error closing peer connection to {:?}: {:#}", self.peer, e);
            }
        }
        info!("Negotiation {} with {:?} closed", self.id, self.peer);
    }

    async fn drain_pending(&mut self) {
        let Some(transport) = self.transport.as_deref() else {
            self.pending_candidates.clear();
            return;
        };

        if !self.pending_candidates.is_empty() {
            debug!(
                "Negotiation {} draining {} buffered candidates",
                self.id,
                self.pending_candidates.len()
            );
        }
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Skipping buffered ICE candidate from {:?}: {:#}", self.peer, e);
            }
        }
    }

    fn transport(&self) -> Result<&dyn PeerTransport, NegotiationError> {
        self.transport.as_deref().ok_or(NegotiationError::Closed)
    }

    fn expect(
        &self,
        role: NegotiationRole,
        phase: NegotiationPhase,
        op: &'static str,
    ) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        if self.role != role || self.phase != phase {
            return Err(NegotiationError::InvalidPhase {
                op,
                role: self.role,
                phase: self.phase,
            });
        }
        Ok(())
    }
}

fn expect_kind(expected: SdpKind, description: &SessionDescription) -> Result<(), NegotiationError> {
    if description.kind != expected {
        return Err(NegotiationError::UnexpectedDescription {
            expected,
            got: description.kind,
        });
    }
    Ok(())
}

impl fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("pending_candidates", &self.pending_candidates.len())
            .field("remote_description_set", &self.remote_description_set)
            .finish()
    }
}

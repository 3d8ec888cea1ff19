use duet_core::utils::MAX_PARTICIPANTS;
use duet_core::{ConnectionId, Participant, PersistentId, RecordingState, RoomSnapshot, SessionId};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Inserted,
    /// Same `persistentId` already present; the delta is a no-op.
    AlreadyPresent,
    OverCapacity,
}

/// Local mirror of the coordinator's room. Every apply runs to completion on
/// `&mut self`, so readers never see a half-updated snapshot.
#[derive(Debug, Clone)]
pub struct RoomState {
    snapshot: RoomSnapshot,
}

impl RoomState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            snapshot: RoomSnapshot::empty(session_id),
        }
    }

    pub fn snapshot(&self) -> &RoomSnapshot {
        &self.snapshot
    }

    pub fn apply_full_snapshot(&mut self, mut snapshot: RoomSnapshot) {
        if snapshot.participants.len() > MAX_PARTICIPANTS {
            warn!(
                "Full snapshot for {} lists {} participants, keeping the first {}",
                snapshot.session_id,
                snapshot.participants.len(),
                MAX_PARTICIPANTS
            );
            snapshot.participants.truncate(MAX_PARTICIPANTS);
        }
        self.snapshot = snapshot;
    }

    pub fn apply_join(&mut self, participant: Participant) -> JoinOutcome {
        if self.snapshot.participant(&participant.persistent_id).is_some() {
            debug!("Duplicate join for {}, ignoring", participant.persistent_id);
            return JoinOutcome::AlreadyPresent;
        }

        // A connection id belongs to exactly one identity.
        self.snapshot
            .participants
            .retain(|p| p.connection_id != participant.connection_id);

        if self.snapshot.participants.len() >= MAX_PARTICIPANTS {
            warn!(
                "Room {} is at capacity, not mirroring {}",
                self.snapshot.session_id, participant.persistent_id
            );
            return JoinOutcome::OverCapacity;
        }

        self.snapshot.participants.push(participant);
        JoinOutcome::Inserted
    }

    pub fn apply_leave(&mut self, persistent_id: &PersistentId) -> Option<Participant> {
        let index = self
            .snapshot
            .participants
            .iter()
            .position(|p| &p.persistent_id == persistent_id)?;
        Some(self.snapshot.participants.remove(index))
    }

    /// Rebind an identity to a new connection. Returns the connection id it replaced.
    pub fn apply_reconnect(
        &mut self,
        persistent_id: &PersistentId,
        new_connection_id: ConnectionId,
    ) -> Option<ConnectionId> {
        let participant = self
            .snapshot
            .participants
            .iter_mut()
            .find(|p| &p.persistent_id == persistent_id)?;
        let old = participant.connection_id;
        participant.connection_id = new_connection_id;
        Some(old)
    }

    pub fn apply_recording(&mut self, state: RecordingState) {
        self.snapshot.recording_state = state;
    }

    pub fn reset(&mut self) {
        self.snapshot = RoomSnapshot::empty(self.snapshot.session_id.clone());
    }
}

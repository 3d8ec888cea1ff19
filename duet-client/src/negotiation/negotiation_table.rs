use crate::negotiation::{NegotiationId, NegotiationSession};
use duet_core::ConnectionId;
use std::collections::HashMap;

/// Arena of live negotiations keyed by [`NegotiationId`], with a secondary index
/// by the remote connection id.
#[derive(Debug, Default)]
pub struct NegotiationTable {
    next_id: u64,
    sessions: HashMap<NegotiationId, NegotiationSession>,
    by_peer: HashMap<ConnectionId, NegotiationId>,
}

impl NegotiationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> NegotiationId {
        self.next_id += 1;
        NegotiationId(self.next_id)
    }

    /// Returns the session previously registered for the same peer, if any.
    pub fn insert(&mut self, session: NegotiationSession) -> Option<NegotiationSession> {
        let replaced = self.remove_peer(&session.peer());
        self.by_peer.insert(session.peer(), session.id());
        self.sessions.insert(session.id(), session);
        replaced
    }

    pub fn contains(&self, id: NegotiationId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn get_mut(&mut self, id: NegotiationId) -> Option<&mut NegotiationSession> {
        self.sessions.get_mut(&id)
    }

    pub fn by_peer(&self, peer: &ConnectionId) -> Option<&NegotiationSession> {
        self.by_peer.get(peer).and_then(|id| self.sessions.get(id))
    }

    pub fn by_peer_mut(&mut self, peer: &ConnectionId) -> Option<&mut NegotiationSession> {
        let id = self.by_peer.get(peer)?;
        self.sessions.get_mut(id)
    }

    pub fn remove_peer(&mut self, peer: &ConnectionId) -> Option<NegotiationSession> {
        let id = self.by_peer.remove(peer)?;
        self.sessions.remove(&id)
    }

    pub fn drain(&mut self) -> Vec<NegotiationSession> {
        self.by_peer.clear();
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    pub fn peers(&self) -> Vec<ConnectionId> {
        self.by_peer.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NegotiationSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

use duet_core::{EventName, ServerMessage};

/// What the rendezvous channel hands to its handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The underlying transport is open.
    Connected,
    /// The underlying transport dropped.
    Disconnected,
    Message(ServerMessage),
}

impl ChannelEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::Connected => EventName::Connect,
            Self::Disconnected => EventName::Disconnect,
            Self::Message(message) => message.event_name(),
        }
    }
}

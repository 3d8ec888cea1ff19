use duet_core::utils::MAX_PARTICIPANTS;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub bind_addr: SocketAddr,
    /// How long a dropped participant keeps its slot before `peer-left` is sent.
    pub reconnect_grace: Duration,
    pub max_participants: usize,
    /// How often a room with no members checks whether it can be dropped.
    pub idle_room_sweep: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            reconnect_grace: Duration::from_secs(10),
            max_participants: MAX_PARTICIPANTS,
            idle_room_sweep: Duration::from_secs(30),
        }
    }
}

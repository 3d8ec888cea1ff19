use duet_core::utils::default_stun_urls;
use duet_core::{IceServerConfig, PersistentId, Role, SessionId};
use std::time::Duration;

pub const TURN_URL_ENV: &str = "DUET_TURN_URL";
pub const TURN_USERNAME_ENV: &str = "DUET_TURN_USERNAME";
pub const TURN_CREDENTIAL_ENV: &str = "DUET_TURN_CREDENTIAL";

/// Discovery servers for a peer connection: a fixed STUN list plus an optional
/// relay supplied by the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceConfig {
    pub stun_urls: Vec<String>,
    pub relay: Option<IceServerConfig>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_urls: default_stun_urls(),
            relay: None,
        }
    }
}

impl IceConfig {
    /// Default STUN list, with a TURN relay when `DUET_TURN_URL` is set.
    pub fn from_env() -> Self {
        let relay = std::env::var(TURN_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| IceServerConfig {
                urls: vec![url],
                username: std::env::var(TURN_USERNAME_ENV).ok(),
                credential: std::env::var(TURN_CREDENTIAL_ENV).ok(),
            });

        Self {
            relay,
            ..Self::default()
        }
    }

    /// No discovery servers at all; host candidates only.
    pub fn local_only() -> Self {
        Self {
            stun_urls: Vec::new(),
            relay: None,
        }
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers = Vec::new();
        if !self.stun_urls.is_empty() {
            servers.push(IceServerConfig {
                urls: self.stun_urls.clone(),
                username: None,
                credential: None,
            });
        }
        if let Some(relay) = &self.relay {
            servers.push(relay.clone());
        }
        servers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl ReconnectPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the coordinator, e.g. `ws://localhost:3000/ws`.
    pub url: String,
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: SessionId,
    pub persistent_id: PersistentId,
    pub role: Role,
    pub email: Option<String>,
    pub ice: IceConfig,
}

impl SessionConfig {
    pub fn new(session_id: SessionId, persistent_id: PersistentId, role: Role) -> Self {
        Self {
            session_id,
            persistent_id,
            role,
            email: None,
            ice: IceConfig::from_env(),
        }
    }
}

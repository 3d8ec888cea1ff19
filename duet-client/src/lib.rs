//! Client side of a two-party audio session.
//!
//! Coordinator events flow through the [`RendezvousChannel`] into a
//! [`SessionController`], which mirrors room membership and drives one
//! [`NegotiationSession`] per remote participant.

mod channel;
mod config;
mod error;
mod media;
mod negotiation;
mod room;
mod session;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use room::*;
pub use session::*;

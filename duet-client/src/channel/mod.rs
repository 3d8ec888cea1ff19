mod channel_event;
mod rendezvous;
mod signaling_output;

pub use channel_event::*;
pub use rendezvous::*;
pub use signaling_output::*;

mod negotiation_session;
mod negotiation_table;
mod peer_transport;
mod rtc_transport;

pub use negotiation_session::*;
pub use negotiation_table::*;
pub use peer_transport::*;
pub use rtc_transport::*;

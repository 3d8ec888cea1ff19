use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to bind coordinator to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("coordinator stopped: {0}")]
    Serve(#[source] std::io::Error),
}

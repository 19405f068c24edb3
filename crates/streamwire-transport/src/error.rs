//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("output queue full")]
    BufferFull,

    /// The connection owning the queue was closed before or while waiting
    #[error("enqueue abandoned: connection closed")]
    EnqueueAbandoned,

    #[error("already connected")]
    AlreadyConnected,

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

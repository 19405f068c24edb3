//! streamwire transport
//!
//! Byte-oriented TCP transport for streamwire sessions:
//! - [`Socket`]: one connection, an input loop and an output loop
//! - [`SocketListener`]: the protocol role consuming inbound bytes
//! - [`BufferPool`]: reusable output buffers
//! - [`OutputQueue`]: bounded FIFO with backpressure

pub mod buffer_pool;
pub mod config;
pub mod error;
pub mod keep_alive;
pub mod queue;
pub mod socket;
pub mod traits;

pub use buffer_pool::BufferPool;
pub use config::SocketConfig;
pub use error::{Result, TransportError};
pub use keep_alive::KeepAlive;
pub use queue::OutputQueue;
pub use socket::Socket;
pub use traits::SocketListener;

//! Listener trait definitions

use async_trait::async_trait;
use bytes::BytesMut;

use crate::socket::Socket;

/// Protocol role driven by a [`Socket`] (publisher session, recorder, ...)
#[async_trait]
pub trait SocketListener: Send + Sync {
    /// Connection established, called before the input loop starts
    async fn on_connect(&self, socket: &Socket);

    /// Connection attempt timed out
    async fn on_timeout(&self, socket: &Socket);

    /// New inbound bytes.
    ///
    /// `buffer` holds the bytes left over from the previous call followed by
    /// the bytes just read. Consume a prefix by advancing it; whatever is
    /// left is handed back, unchanged, at the head of the next call.
    async fn listen(&self, socket: &Socket, buffer: &mut BytesMut);

    /// Socket closed. `disconnected` is true when the peer went away, a read
    /// failed or the connection could not be made; false for local closes,
    /// connect timeouts and write failures.
    async fn on_close(&self, _socket: &Socket, _disconnected: bool) {}
}

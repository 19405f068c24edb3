//! Common test helpers and utilities for streamwire tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A recording socket listener
//! - A loopback capture server with RAII cleanup
//! - A listener whose accept backlog is full, for connect timeouts

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamwire_transport::{Socket, SocketListener};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Recording Listener
// ============================================================================

/// Socket listener that records every callback.
///
/// `listen` consumes the largest prefix that is a whole multiple of the
/// chunk size (1 by default, i.e. everything) and leaves the rest for the
/// next delivery.
pub struct RecordingListener {
    chunk_size: usize,
    greeting: Option<Vec<u8>>,
    connects: AtomicU32,
    timeouts: AtomicU32,
    close_count: AtomicU32,
    delivery_count: AtomicU32,
    closes: Mutex<Vec<bool>>,
    deliveries: Mutex<Vec<Vec<u8>>>,
    consumed: Mutex<Vec<u8>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self {
            chunk_size: 1,
            greeting: None,
            connects: AtomicU32::new(0),
            timeouts: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
            delivery_count: AtomicU32::new(0),
            closes: Mutex::new(Vec::new()),
            deliveries: Mutex::new(Vec::new()),
            consumed: Mutex::new(Vec::new()),
        }
    }

    /// Only consume whole units of `chunk_size` bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Enqueue `greeting` from `on_connect`
    pub fn with_greeting(mut self, greeting: impl Into<Vec<u8>>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts.load(Ordering::SeqCst)
    }

    /// `disconnected` flag of every `on_close`, in call order
    pub fn closes(&self) -> Vec<bool> {
        self.closes.lock().clone()
    }

    /// Every buffer handed to `listen`, as it looked on entry
    pub fn deliveries(&self) -> Vec<Vec<u8>> {
        self.deliveries.lock().clone()
    }

    /// Bytes consumed across all deliveries
    pub fn consumed(&self) -> Vec<u8> {
        self.consumed.lock().clone()
    }

    pub async fn wait_for_connect(&self, max_wait: Duration) -> bool {
        wait_for_count(&self.connects, 1, max_wait).await
    }

    pub async fn wait_for_timeout(&self, max_wait: Duration) -> bool {
        wait_for_count(&self.timeouts, 1, max_wait).await
    }

    pub async fn wait_for_close(&self, max_wait: Duration) -> bool {
        wait_for_count(&self.close_count, 1, max_wait).await
    }

    pub async fn wait_for_deliveries(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.delivery_count, n, max_wait).await
    }

    pub async fn wait_for_consumed(&self, len: usize, max_wait: Duration) -> bool {
        wait_for(
            || async { self.consumed.lock().len() >= len },
            DEFAULT_CHECK_INTERVAL,
            max_wait,
        )
        .await
    }
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketListener for RecordingListener {
    async fn on_connect(&self, socket: &Socket) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(greeting) = &self.greeting {
            let mut buffer = socket.acquire_buffer(greeting.len());
            buffer.extend_from_slice(greeting);
            if let Err(e) = socket.enqueue(buffer).await {
                debug!("Greeting not queued: {}", e);
            }
        }
    }

    async fn on_timeout(&self, _socket: &Socket) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    async fn listen(&self, _socket: &Socket, buffer: &mut BytesMut) {
        self.deliveries.lock().push(buffer.to_vec());
        let take = buffer.len() - buffer.len() % self.chunk_size;
        let consumed = buffer.split_to(take);
        self.consumed.lock().extend_from_slice(&consumed);
        self.delivery_count.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_close(&self, _socket: &Socket, disconnected: bool) {
        self.closes.lock().push(disconnected);
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Capture Server - RAII wrapper with proper cleanup
// ============================================================================

/// Loopback server that accepts one connection and records what it reads
pub struct CaptureServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<u8>>>,
    peer: Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>,
    accepted: Arc<AtomicU32>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind capture server");
        let addr = listener.local_addr().expect("capture server address");

        let received = Arc::new(Mutex::new(Vec::new()));
        let peer = Arc::new(tokio::sync::Mutex::new(None));
        let accepted = Arc::new(AtomicU32::new(0));

        let handle = {
            let received = received.clone();
            let peer = peer.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (mut reader, writer) = stream.into_split();
                *peer.lock().await = Some(writer);
                accepted.fetch_add(1, Ordering::SeqCst);

                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => received.lock().extend_from_slice(&buf[..n]),
                    }
                }
            })
        };

        Self {
            addr,
            received,
            peer,
            accepted,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Bytes read from the client so far
    pub fn received(&self) -> Vec<u8> {
        self.received.lock().clone()
    }

    pub async fn wait_for_peer(&self, max_wait: Duration) -> bool {
        wait_for_count(&self.accepted, 1, max_wait).await
    }

    pub async fn wait_for_received(&self, len: usize, max_wait: Duration) -> bool {
        wait_for(
            || async { self.received.lock().len() >= len },
            DEFAULT_CHECK_INTERVAL,
            max_wait,
        )
        .await
    }

    /// Write to the accepted client
    pub async fn send(&self, data: &[u8]) -> std::io::Result<()> {
        let mut peer = self.peer.lock().await;
        match peer.as_mut() {
            Some(writer) => {
                writer.write_all(data).await?;
                writer.flush().await
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no client accepted",
            )),
        }
    }

    /// Shut down the write side towards the client; the client sees end of stream
    pub async fn disconnect(&self) {
        if let Some(mut writer) = self.peer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for CaptureServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Stalled Listener
// ============================================================================

/// A listening socket that never accepts and whose backlog is full, so new
/// connection attempts hang until they time out
pub struct StalledListener {
    addr: SocketAddr,
    _listener: TcpListener,
    _fillers: Vec<TcpStream>,
}

impl StalledListener {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Bind a stalled listener on loopback
pub async fn stalled_listener() -> StalledListener {
    let socket = TcpSocket::new_v4().expect("create socket");
    socket
        .bind("127.0.0.1:0".parse().expect("loopback address"))
        .expect("bind stalled listener");
    let listener = socket.listen(0).expect("listen");
    let addr = listener.local_addr().expect("stalled listener address");

    // Fill the accept queue until connection attempts stop completing
    let mut fillers = Vec::new();
    for _ in 0..16 {
        match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => fillers.push(stream),
            _ => break,
        }
    }

    StalledListener {
        addr,
        _listener: listener,
        _fillers: fillers,
    }
}

/// Find a loopback TCP port with nothing listening on it
pub async fn find_closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

//! Queued TCP socket
//!
//! One [`Socket`] owns one TCP connection at a time and drives it with two
//! tasks:
//! - the input loop polls for readable bytes every `poll_interval`, appends
//!   them to the carried-over accumulator and hands the lot to the listener
//! - the output loop drains the output queue in FIFO order, writing and
//!   flushing each buffer before returning it to the pool
//!
//! Every `connect` starts a fresh connection state (run flag and output
//! queue). Loops of an earlier connection only ever see their own state, so
//! nothing queued after a reconnect can leak onto the old stream.
//!
//! Failures never propagate out of the loops. They close the socket and
//! reach the listener through `on_timeout` / `on_close`.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use streamwire_core::Message;

use crate::buffer_pool::BufferPool;
use crate::config::SocketConfig;
use crate::error::{Result, TransportError};
use crate::keep_alive::KeepAlive;
use crate::queue::OutputQueue;
use crate::traits::SocketListener;

/// Growth step of the input accumulator
const READ_CHUNK_SIZE: usize = 8192;

/// Handle to a queued TCP socket. Clones share the same connection.
#[derive(Clone)]
pub struct Socket {
    inner: Arc<Inner>,
}

struct Inner {
    config: SocketConfig,
    listener: Arc<dyn SocketListener>,
    pool: BufferPool,
    total_bytes_in: AtomicU64,
    total_bytes_out: AtomicU64,
    connection: Mutex<Arc<Connection>>,
}

/// Run flag and output queue of one connection attempt
struct Connection {
    keep_alive: KeepAlive,
    queue: OutputQueue,
}

impl Connection {
    fn new(queue_capacity: usize) -> Self {
        Self {
            keep_alive: KeepAlive::new(),
            queue: OutputQueue::new(queue_capacity),
        }
    }

    /// State of a socket that has not connected yet
    fn idle(queue_capacity: usize) -> Self {
        Self {
            keep_alive: KeepAlive::stopped(),
            queue: OutputQueue::new(queue_capacity),
        }
    }
}

enum ReadOutcome {
    Idle,
    Data(usize),
}

impl Socket {
    /// Create a socket with the default configuration
    pub fn new(listener: Arc<dyn SocketListener>) -> Self {
        Self::build(SocketConfig::default(), listener)
    }

    pub fn with_config(config: SocketConfig, listener: Arc<dyn SocketListener>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, listener))
    }

    fn build(config: SocketConfig, listener: Arc<dyn SocketListener>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: BufferPool::new(config.pool_capacity),
                connection: Mutex::new(Arc::new(Connection::idle(config.queue_capacity))),
                config,
                listener,
                total_bytes_in: AtomicU64::new(0),
                total_bytes_out: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.inner.config
    }

    /// Start connecting to `host:port` in the background.
    ///
    /// The socket is alive from this call until it is closed. Outcomes are
    /// reported to the listener. Output queued before this call is dropped;
    /// output queued from here on is sent once the connection is up.
    pub fn connect(&self, host: impl Into<String>, port: u16) -> Result<()> {
        let connection = Arc::new(Connection::new(self.inner.config.queue_capacity));
        {
            let mut current = self.inner.connection.lock();
            if current.keep_alive.is_alive() {
                return Err(TransportError::AlreadyConnected);
            }
            *current = connection.clone();
        }

        let socket = self.clone();
        let host = host.into();
        tokio::spawn(async move {
            socket.run_connection(host, port, connection).await;
        });
        Ok(())
    }

    fn connection(&self) -> Arc<Connection> {
        self.inner.connection.lock().clone()
    }

    /// Close the connection and drop all unsent output.
    ///
    /// Only the first call after a connect has any effect; the listener's
    /// `on_close` receives `disconnected` untouched.
    pub async fn close(&self, disconnected: bool) {
        let connection = self.connection();
        self.shutdown(&connection, disconnected).await;
    }

    async fn shutdown(&self, connection: &Connection, disconnected: bool) {
        if !connection.keep_alive.cancel() {
            return;
        }
        connection.queue.close();
        let discarded = connection.queue.clear();
        debug!(
            "Socket closed (disconnected: {}), {} queued buffers discarded",
            disconnected, discarded
        );
        self.inner.listener.on_close(self, disconnected).await;
    }

    /// Whether the socket is between `connect` and `close`
    pub fn is_alive(&self) -> bool {
        self.connection().keep_alive.is_alive()
    }

    /// Get an empty buffer for `capacity` bytes, reused from the pool when possible
    pub fn acquire_buffer(&self, capacity: usize) -> BytesMut {
        self.inner.pool.acquire(capacity)
    }

    /// Queue a filled buffer for sending, waiting while the queue is full.
    ///
    /// Cancel safe: dropping the future while it waits queues nothing.
    /// Fails with `EnqueueAbandoned` once the connection is closed, including
    /// while waiting for space.
    pub async fn enqueue(&self, buffer: BytesMut) -> Result<()> {
        self.connection().queue.push(buffer).await
    }

    /// Queue a filled buffer, failing with `BufferFull` instead of waiting
    pub fn try_enqueue(&self, buffer: BytesMut) -> Result<()> {
        self.connection().queue.try_push(buffer)
    }

    /// Encode `message` into a pooled buffer and queue it
    pub async fn enqueue_message(&self, message: &Message) -> Result<()> {
        let mut buffer = self.acquire_buffer(message.length());
        message.encode(&mut buffer);
        self.enqueue(buffer).await
    }

    /// Bytes read from the connection so far
    pub fn total_bytes_in(&self) -> u64 {
        self.inner.total_bytes_in.load(Ordering::Relaxed)
    }

    /// Bytes written to the connection so far
    pub fn total_bytes_out(&self) -> u64 {
        self.inner.total_bytes_out.load(Ordering::Relaxed)
    }

    /// Bytes queued and not yet confirmed written, including a buffer the
    /// output loop is writing right now
    pub fn queue_bytes_out(&self) -> u64 {
        self.connection().queue.queued_bytes()
    }

    /// Buffers waiting in the output queue
    pub fn queued_buffers(&self) -> usize {
        self.connection().queue.len()
    }

    /// Buffers waiting in the pool for reuse
    pub fn pooled_buffers(&self) -> usize {
        self.inner.pool.len()
    }

    async fn run_connection(self, host: String, port: u16, connection: Arc<Connection>) {
        let keep_alive = &connection.keep_alive;
        let timeout = self.inner.config.connect_timeout();
        info!("Connecting to {}:{}", host, port);

        let connect = tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port)));
        let result = tokio::select! {
            result = connect => result,
            _ = keep_alive.cancelled() => {
                debug!("Connect to {}:{} cancelled", host, port);
                return;
            }
        };

        let stream = match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Connection to {}:{} failed: {}", host, port, e);
                self.shutdown(&connection, true).await;
                return;
            }
            Err(_) => {
                warn!("Connection to {}:{} timed out after {:?}", host, port, timeout);
                self.shutdown(&connection, false).await;
                self.inner.listener.on_timeout(&self).await;
                return;
            }
        };

        if let Err(e) = self.apply_options(&stream) {
            warn!("Failed to set socket options: {}", e);
        }

        let (reader, writer) = stream.into_split();
        tokio::spawn(self.clone().run_output(writer, connection.clone()));

        info!("Connected to {}:{}", host, port);
        self.inner.listener.on_connect(&self).await;

        self.run_input(reader, &connection).await;
    }

    fn apply_options(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.inner.config.nodelay)?;

        #[cfg(feature = "keepalive")]
        if self.inner.config.keepalive_secs > 0 {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(
                self.inner.config.keepalive_secs,
            ));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }

    async fn run_input(&self, reader: OwnedReadHalf, connection: &Connection) {
        let keep_alive = &connection.keep_alive;
        let interval = self.inner.config.poll_interval();
        let mut accumulator = BytesMut::new();

        while keep_alive.is_alive() {
            match read_available(&reader, &mut accumulator) {
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Data(read)) => {
                    self.inner
                        .total_bytes_in
                        .fetch_add(read as u64, Ordering::Relaxed);
                    trace!("Read {} bytes, {} buffered", read, accumulator.len());
                    self.inner.listener.listen(self, &mut accumulator).await;
                }
                Err(e) => {
                    warn!("Read failed: {}", e);
                    self.shutdown(connection, true).await;
                    break;
                }
            }

            if !keep_alive.pause(interval).await {
                break;
            }
        }
        debug!("Input loop stopped");
    }

    async fn run_output<W>(self, mut writer: W, connection: Arc<Connection>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let keep_alive = &connection.keep_alive;
        let queue = &connection.queue;
        let interval = self.inner.config.poll_interval();

        'drain: while keep_alive.is_alive() {
            while let Some(buffer) = queue.pop_front() {
                let len = buffer.len();
                let result = tokio::select! {
                    result = write_flush(&mut writer, &buffer) => result,
                    _ = keep_alive.cancelled() => {
                        queue.finish(len);
                        break 'drain;
                    }
                };

                queue.finish(len);
                match result {
                    Ok(()) => {
                        self.inner
                            .total_bytes_out
                            .fetch_add(len as u64, Ordering::Relaxed);
                        trace!("Wrote {} bytes", len);
                        self.inner.pool.release(buffer);
                    }
                    Err(e) => {
                        warn!("Write failed: {}", e);
                        self.shutdown(&connection, false).await;
                        break 'drain;
                    }
                }

                if !keep_alive.is_alive() {
                    break 'drain;
                }
            }

            if !keep_alive.pause(interval).await {
                break;
            }
        }
        debug!("Output loop stopped");
    }
}

/// Read everything the socket has ready without waiting for more
fn read_available(reader: &OwnedReadHalf, buffer: &mut BytesMut) -> io::Result<ReadOutcome> {
    let mut total = 0;
    loop {
        buffer.reserve(READ_CHUNK_SIZE);
        match reader.try_read_buf(buffer) {
            Ok(0) if total == 0 => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                ))
            }
            // End of stream after data, reported on the next cycle
            Ok(0) => return Ok(ReadOutcome::Data(total)),
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(if total == 0 {
                    ReadOutcome::Idle
                } else {
                    ReadOutcome::Data(total)
                });
            }
            Err(e) => return Err(e),
        }
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(writer: &mut W, buffer: &[u8]) -> io::Result<()> {
    writer.write_all(buffer).await?;
    writer.flush().await
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("alive", &self.is_alive())
            .field("total_bytes_in", &self.total_bytes_in())
            .field("total_bytes_out", &self.total_bytes_out())
            .field("queue_bytes_out", &self.queue_bytes_out())
            .field("config", &self.inner.config)
            .finish()
    }
}

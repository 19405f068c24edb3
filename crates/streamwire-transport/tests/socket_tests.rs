//! Socket integration tests against loopback peers

use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use streamwire_core::{AvcVideoMessage, FrameType, Message};
use streamwire_test_utils::{
    find_closed_port, stalled_listener, CaptureServer, RecordingListener, DEFAULT_TIMEOUT,
};
use streamwire_transport::{Socket, SocketConfig, TransportError};

fn fast_config() -> SocketConfig {
    SocketConfig::default().with_poll_interval(Duration::from_millis(10))
}

fn filled(socket: &Socket, len: usize, fill: u8) -> BytesMut {
    let mut buffer = socket.acquire_buffer(len);
    buffer.extend_from_slice(&vec![fill; len]);
    buffer
}

async fn connected(
    listener: Arc<RecordingListener>,
    config: SocketConfig,
) -> (Socket, CaptureServer) {
    let server = CaptureServer::start().await;
    let socket = Socket::with_config(config, listener.clone()).unwrap();
    socket.connect("127.0.0.1", server.port()).unwrap();

    assert!(listener.wait_for_connect(DEFAULT_TIMEOUT).await, "no on_connect");
    assert!(server.wait_for_peer(DEFAULT_TIMEOUT).await, "server saw no client");
    (socket, server)
}

#[tokio::test]
async fn test_output_written_in_fifo_order() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    socket.enqueue(filled(&socket, 10, 1)).await.unwrap();
    socket.enqueue(filled(&socket, 20, 2)).await.unwrap();
    socket.enqueue(filled(&socket, 30, 3)).await.unwrap();

    assert!(server.wait_for_received(60, DEFAULT_TIMEOUT).await);
    let received = server.received();
    let mut expected = vec![1u8; 10];
    expected.extend_from_slice(&[2u8; 20]);
    expected.extend_from_slice(&[3u8; 30]);
    assert_eq!(received, expected);

    let drained = streamwire_test_utils::wait_for(
        || async { socket.total_bytes_out() == 60 && socket.queue_bytes_out() == 0 },
        Duration::from_millis(10),
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(drained, "counters did not settle: {:?}", socket);

    socket.close(false).await;
}

#[tokio::test]
async fn test_written_buffers_return_to_pool() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    socket.enqueue(filled(&socket, 64, 7)).await.unwrap();
    assert!(server.wait_for_received(64, DEFAULT_TIMEOUT).await);

    let pooled = streamwire_test_utils::wait_for(
        || async { socket.pooled_buffers() == 1 },
        Duration::from_millis(10),
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(pooled);

    let reused = socket.acquire_buffer(64);
    assert!(reused.is_empty());
    assert_eq!(socket.pooled_buffers(), 0);

    socket.close(false).await;
}

#[tokio::test]
async fn test_connect_timeout_reports_once() {
    let stalled = stalled_listener().await;
    let listener = Arc::new(RecordingListener::new());
    let config = fast_config().with_connect_timeout(Duration::from_millis(200));
    let socket = Socket::with_config(config, listener.clone()).unwrap();

    socket.connect("127.0.0.1", stalled.port()).unwrap();
    assert!(socket.is_alive());

    assert!(listener.wait_for_timeout(DEFAULT_TIMEOUT).await, "no on_timeout");
    // Give any stray callback a chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(listener.timeouts(), 1);
    assert_eq!(listener.connects(), 0);
    assert_eq!(listener.closes(), vec![false]);
    assert!(!socket.is_alive());
    assert_eq!(socket.total_bytes_in(), 0);
    assert_eq!(socket.total_bytes_out(), 0);
}

#[tokio::test]
async fn test_refused_connection_closes_as_disconnected() {
    let port = find_closed_port().await;
    let listener = Arc::new(RecordingListener::new());
    let socket = Socket::with_config(fast_config(), listener.clone()).unwrap();

    socket.connect("127.0.0.1", port).unwrap();
    assert!(listener.wait_for_close(DEFAULT_TIMEOUT).await);

    assert_eq!(listener.closes(), vec![true]);
    assert_eq!(listener.connects(), 0);
    assert_eq!(listener.timeouts(), 0);
    assert!(!socket.is_alive());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, _server) = connected(listener.clone(), fast_config()).await;

    socket.close(false).await;
    socket.close(true).await;
    socket.close(false).await;

    assert_eq!(listener.closes(), vec![false]);
    assert!(!socket.is_alive());
}

#[tokio::test]
async fn test_close_discards_pending_output() {
    let listener = Arc::new(RecordingListener::new());
    let socket = Socket::with_config(fast_config(), listener.clone()).unwrap();
    let stalled = stalled_listener().await;

    socket.connect("127.0.0.1", stalled.port()).unwrap();
    socket.enqueue(filled(&socket, 16, 0)).await.unwrap();
    assert_eq!(socket.queue_bytes_out(), 16);

    socket.close(false).await;
    assert_eq!(socket.queue_bytes_out(), 0);
    assert_eq!(socket.queued_buffers(), 0);
    assert_eq!(listener.closes(), vec![false]);
}

#[tokio::test]
async fn test_reconnect_after_close() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, _server) = connected(listener.clone(), fast_config()).await;

    assert!(matches!(
        socket.connect("127.0.0.1", 1),
        Err(TransportError::AlreadyConnected)
    ));

    socket.close(false).await;
    let second = CaptureServer::start().await;
    socket.connect("127.0.0.1", second.port()).unwrap();
    assert!(second.wait_for_peer(DEFAULT_TIMEOUT).await);
    assert!(socket.is_alive());

    socket.close(false).await;
}

#[tokio::test]
async fn test_output_after_reconnect_reaches_new_peer() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, first) = connected(listener.clone(), fast_config()).await;

    socket.close(false).await;
    let second = CaptureServer::start().await;
    socket.connect("127.0.0.1", second.port()).unwrap();
    // Queued before the new connection is up
    socket.enqueue(filled(&socket, 32, 9)).await.unwrap();

    assert!(second.wait_for_received(32, DEFAULT_TIMEOUT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(second.received(), vec![9u8; 32]);
    assert!(first.received().is_empty());

    socket.close(false).await;
}

#[tokio::test]
async fn test_close_abandons_waiting_enqueue() {
    let stalled = stalled_listener().await;
    let listener = Arc::new(RecordingListener::new());
    let config = fast_config().with_queue_capacity(1);
    let socket = Socket::with_config(config, listener.clone()).unwrap();

    socket.connect("127.0.0.1", stalled.port()).unwrap();
    socket.enqueue(filled(&socket, 8, 0)).await.unwrap();

    let waiting = {
        let socket = socket.clone();
        tokio::spawn(async move { socket.enqueue(BytesMut::from(&b"blocked"[..])).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    socket.close(false).await;

    let result = tokio::time::timeout(DEFAULT_TIMEOUT, waiting)
        .await
        .expect("enqueue still waiting after close")
        .unwrap();
    assert!(matches!(result, Err(TransportError::EnqueueAbandoned)));
    assert_eq!(socket.queue_bytes_out(), 0);
    assert_eq!(listener.closes(), vec![false]);
}

#[tokio::test]
async fn test_unconsumed_input_carried_over() {
    let listener = Arc::new(RecordingListener::new().with_chunk_size(4));
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    server.send(b"abcdef").await.unwrap();
    assert!(listener.wait_for_consumed(4, DEFAULT_TIMEOUT).await);
    assert!(listener.wait_for_deliveries(1, DEFAULT_TIMEOUT).await);

    server.send(b"gh").await.unwrap();
    assert!(listener.wait_for_consumed(8, DEFAULT_TIMEOUT).await);

    assert_eq!(listener.consumed(), b"abcdefgh".to_vec());
    let deliveries = listener.deliveries();
    assert_eq!(deliveries.first().unwrap(), &b"abcdef".to_vec());
    assert_eq!(deliveries.last().unwrap(), &b"efgh".to_vec());
    // Carried-over bytes are not counted twice
    assert_eq!(socket.total_bytes_in(), 8);

    socket.close(false).await;
}

#[tokio::test]
async fn test_remote_disconnect_closes_as_disconnected() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    server.disconnect().await;

    assert!(listener.wait_for_close(DEFAULT_TIMEOUT).await);
    assert_eq!(listener.closes(), vec![true]);
    assert!(!socket.is_alive());
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    let listener = Arc::new(RecordingListener::new());
    let config = fast_config().with_queue_capacity(2);
    let socket = Socket::with_config(config, listener).unwrap();

    socket.enqueue(filled(&socket, 1, 0)).await.unwrap();
    socket.enqueue(filled(&socket, 1, 0)).await.unwrap();

    assert!(matches!(
        socket.try_enqueue(filled(&socket, 1, 0)),
        Err(TransportError::BufferFull)
    ));

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        socket.enqueue(filled(&socket, 1, 0)),
    )
    .await;
    assert!(blocked.is_err(), "enqueue should wait while the queue is full");
    assert_eq!(socket.queued_buffers(), 2);
    assert_eq!(socket.queue_bytes_out(), 2);
}

#[tokio::test]
async fn test_enqueue_message_reaches_peer() {
    let listener = Arc::new(RecordingListener::new());
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    let message = Message::AvcVideo(
        AvcVideoMessage::new(vec![0, 0, 0, 1, 0x65, 0xAA, 0xBB])
            .with_frame_type(FrameType::Key)
            .with_timestamp(40),
    );
    socket.enqueue_message(&message).await.unwrap();

    let expected = message.to_bytes();
    assert!(server.wait_for_received(expected.len(), DEFAULT_TIMEOUT).await);
    assert_eq!(server.received(), expected.to_vec());
    assert_eq!(&server.received()[..5], &[0x17, 0x01, 0x00, 0x00, 0x00]);

    socket.close(false).await;
}

#[tokio::test]
async fn test_greeting_from_on_connect_is_sent() {
    let listener = Arc::new(RecordingListener::new().with_greeting(&b"\x03hello"[..]));
    let (socket, server) = connected(listener.clone(), fast_config()).await;

    assert!(server.wait_for_received(6, DEFAULT_TIMEOUT).await);
    assert_eq!(server.received(), b"\x03hello".to_vec());

    socket.close(false).await;
}

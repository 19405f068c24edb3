//! Endpoint probe

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use streamwire_transport::{Socket, SocketConfig, SocketListener};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeEvent {
    Connected,
    TimedOut,
    Closed { disconnected: bool },
}

/// Forwards socket callbacks to the probe task
struct ProbeListener {
    events: mpsc::UnboundedSender<ProbeEvent>,
}

#[async_trait]
impl SocketListener for ProbeListener {
    async fn on_connect(&self, _socket: &Socket) {
        let _ = self.events.send(ProbeEvent::Connected);
    }

    async fn on_timeout(&self, _socket: &Socket) {
        let _ = self.events.send(ProbeEvent::TimedOut);
    }

    async fn listen(&self, _socket: &Socket, buffer: &mut BytesMut) {
        debug!("Received {} bytes", buffer.len());
        buffer.clear();
    }

    async fn on_close(&self, _socket: &Socket, disconnected: bool) {
        let _ = self.events.send(ProbeEvent::Closed { disconnected });
    }
}

pub async fn run_probe(config: SocketConfig, host: &str, port: u16, hold_ms: u64) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let socket = Socket::with_config(config, Arc::new(ProbeListener { events: tx }))
        .context("Invalid socket configuration")?;

    println!(
        "{} Probing {}:{} (timeout {:?})",
        "streamwire".cyan().bold(),
        host,
        port,
        socket.config().connect_timeout()
    );
    socket
        .connect(host, port)
        .context("Failed to start connection")?;

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                socket.close(false).await;
                return Ok(());
            }
        };

        match event {
            Some(ProbeEvent::Connected) => break,
            Some(ProbeEvent::TimedOut) => {
                println!("{} {}:{} timed out", "TIMEOUT".yellow().bold(), host, port);
                bail!("Connection to {}:{} timed out", host, port);
            }
            Some(ProbeEvent::Closed { disconnected: true }) => {
                println!("{} {}:{} unreachable", "FAILED".red().bold(), host, port);
                bail!("Connection to {}:{} failed", host, port);
            }
            // A timeout closes the socket before `on_timeout` is called
            Some(ProbeEvent::Closed { disconnected: false }) => continue,
            None => bail!("Socket dropped without reporting an outcome"),
        }
    }

    println!("{} Connected to {}:{}", "OK".green().bold(), host, port);

    if hold_ms > 0 {
        let hold = tokio::time::sleep(Duration::from_millis(hold_ms));
        tokio::pin!(hold);
        loop {
            tokio::select! {
                _ = &mut hold => break,
                event = rx.recv() => {
                    if let Some(ProbeEvent::Closed { .. }) | None = event {
                        println!("{} Remote closed the connection", "CLOSED".yellow().bold());
                        break;
                    }
                }
            }
        }
    }

    println!(
        "  bytes in: {}, bytes out: {}",
        socket.total_bytes_in(),
        socket.total_bytes_out()
    );
    socket.close(false).await;
    Ok(())
}

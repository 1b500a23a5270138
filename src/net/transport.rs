//! Relay transport session
//!
//! Owns one TCP connection to the relay and exposes a publish/subscribe
//! surface over named events. Handlers run on the reader task, never on the
//! tick loop, so they must hand data off without blocking.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::protocol::{decode_frame, encode_frame, event, OutboundEvent};

/// Callback invoked with the raw payload of a named event
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has not been called yet
    Idle,
    /// TCP handshake in progress
    Connecting,
    /// Connected, frames flow both ways
    Connected,
    /// Connection failed or was closed; there is no reconnect
    Closed,
}

/// A session with the relay
pub struct TransportSession {
    handlers: Arc<DashMap<String, EventHandler>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Taken by the writer task once the connection is up
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl TransportSession {
    pub fn new() -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        Self {
            handlers: Arc::new(DashMap::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            state_tx: Arc::new(state_tx),
            state_rx,
        }
    }

    /// Connect to the relay.
    ///
    /// Failures are logged and swallowed; the session then stays closed and
    /// the game carries on without networking.
    pub async fn connect(&self, addr: SocketAddr) {
        match self.try_connect(addr).await {
            Ok(()) => {}
            Err(TransportError::AlreadyConnected) => {
                warn!(relay = %addr, "Session already connected, ignoring connect");
            }
            Err(TransportError::Closed) => {
                warn!(relay = %addr, "Session closed, reconnecting is not supported");
            }
            Err(e) => {
                error!(relay = %addr, error = %e, "Failed to connect to relay");
                let _ = self.state_tx.send(ConnectionState::Closed);
            }
        }
    }

    async fn try_connect(&self, addr: SocketAddr) -> Result<(), TransportError> {
        let Some(outbound_rx) = self.outbound_rx.lock().take() else {
            return Err(match self.state() {
                ConnectionState::Closed => TransportError::Closed,
                _ => TransportError::AlreadyConnected,
            });
        };

        let _ = self.state_tx.send(ConnectionState::Connecting);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::Connect)?;
        stream.set_nodelay(true).map_err(TransportError::Connect)?;

        let (reader, writer) = stream.into_split();
        let _ = self.state_tx.send(ConnectionState::Connected);
        info!(relay = %addr, "Connected to relay");

        let writer_state = self.state_tx.clone();
        tokio::spawn(async move {
            write_loop(writer, outbound_rx).await;
            let _ = writer_state.send(ConnectionState::Closed);
        });

        let handlers = self.handlers.clone();
        let reader_state = self.state_tx.clone();
        tokio::spawn(async move {
            dispatch(&handlers, event::CONNECTED, json!({}));
            read_loop(reader, &handlers).await;
            let _ = reader_state.send(ConnectionState::Closed);
            warn!("Relay connection closed");
        });

        Ok(())
    }

    /// Register the handler for `event_name`, replacing any previous one
    pub fn subscribe<F>(&self, event_name: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        if self
            .handlers
            .insert(event_name.to_string(), Arc::new(handler))
            .is_some()
        {
            warn!(event = event_name, "Replaced existing event handler");
        }
    }

    /// Fire-and-forget send of a named event
    pub fn emit(&self, event_name: &str, payload: Value) {
        if self.state() == ConnectionState::Closed {
            debug!(event = event_name, "Relay connection closed, dropping event");
            return;
        }

        let line = match encode_frame(event_name, payload) {
            Ok(line) => line,
            Err(e) => {
                warn!(event = event_name, error = %e, "Failed to encode event");
                return;
            }
        };

        if self.outbound_tx.send(line).is_err() {
            debug!(event = event_name, "Outbound queue closed, dropping event");
        }
    }

    /// Send a typed outbound event
    pub fn emit_event(&self, outbound: &OutboundEvent) {
        self.emit(outbound.name(), outbound.payload());
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl Default for TransportSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Invoke the subscriber of `name`, if any
fn dispatch(handlers: &DashMap<String, EventHandler>, name: &str, payload: Value) {
    // Clone out of the map so a handler may subscribe without deadlocking
    let handler = handlers.get(name).map(|entry| entry.value().clone());
    match handler {
        Some(handler) => handler(payload),
        None => debug!(event = name, "No subscriber for event"),
    }
}

async fn read_loop(reader: OwnedReadHalf, handlers: &DashMap<String, EventHandler>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode_frame(&line) {
                    Ok((name, payload)) => dispatch(handlers, &name, payload),
                    Err(e) => warn!(error = %e, "Failed to decode relay frame"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Relay read error");
                break;
            }
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(error = %e, "Relay write failed");
            break;
        }
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("Session already connected")]
    AlreadyConnected,

    #[error("Session closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn delivers_connected_then_named_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = TransportSession::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connected_tx = tx.clone();
        session.subscribe(event::CONNECTED, move |_| {
            let _ = connected_tx.send("connected".to_string());
        });
        session.subscribe(event::PEER_JOINED, move |payload| {
            let _ = tx.send(payload["id"].as_str().unwrap_or_default().to_string());
        });

        let relay = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"v\":1,\"event\":\"peer-joined\",\"data\":{\"id\":\"B\"}}\n")
                .await
                .unwrap();
            socket
        });

        session.connect(addr).await;
        let _socket = tokio_test::assert_ok!(relay.await);

        assert_eq!(recv_within(&mut rx).await, "connected");
        assert_eq!(recv_within(&mut rx).await, "B");
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn emitted_events_reach_the_relay_as_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = TransportSession::new();
        // Queued before the connection exists
        session.emit_event(&OutboundEvent::CameraStart);

        let relay = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let first = lines.next_line().await.unwrap().unwrap();
            let second = lines.next_line().await.unwrap().unwrap();
            (first, second)
        });

        session.connect(addr).await;
        session.emit(event::PEER_POSITION, json!({ "x": 1.5, "y": 2.5 }));

        let (first, second) = timeout(Duration::from_secs(5), relay)
            .await
            .unwrap()
            .unwrap();

        let (name, _) = decode_frame(&first).unwrap();
        assert_eq!(name, "camera-start");
        let (name, data) = decode_frame(&second).unwrap();
        assert_eq!(name, "peer-position");
        assert_eq!(data["x"], json!(1.5));
    }

    #[tokio::test]
    async fn connection_failure_is_swallowed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = TransportSession::new();
        session.connect(addr).await;

        assert_eq!(session.state(), ConnectionState::Closed);
        session.emit(event::PEER_POSITION, json!({ "x": 0.0, "y": 0.0 }));
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = TransportSession::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.subscribe(event::PEER_LEFT, move |payload| {
            let _ = tx.send(payload);
        });

        let relay = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"not json\n").await.unwrap();
            socket
                .write_all(b"{\"v\":9,\"event\":\"peer-left\",\"data\":{\"id\":\"old\"}}\n")
                .await
                .unwrap();
            socket
                .write_all(b"{\"v\":1,\"event\":\"peer-left\",\"data\":{\"id\":\"C\"}}\n")
                .await
                .unwrap();
            socket
        });

        session.connect(addr).await;
        let _socket = relay.await.unwrap();

        let payload = recv_within(&mut rx).await;
        assert_eq!(payload["id"], json!("C"));
    }

    #[tokio::test]
    async fn second_connect_keeps_the_first_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = TransportSession::new();
        session.connect(addr).await;
        let (_socket, _) = listener.accept().await.unwrap();

        session.connect(addr).await;

        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn connect_after_failure_reports_closed_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = TransportSession::new();
        session.connect(addr).await;

        let err = session.try_connect(addr).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn connect_while_connected_reports_already_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = TransportSession::new();
        session.connect(addr).await;
        let (_socket, _) = listener.accept().await.unwrap();

        let err = session.try_connect(addr).await.unwrap_err();
        assert!(matches!(err, TransportError::AlreadyConnected));
    }

    #[test]
    fn subscribe_replaces_previous_handler() {
        let session = TransportSession::new();
        session.subscribe(event::PEER_ID, |_| {});
        session.subscribe(event::PEER_ID, |_| {});
        assert_eq!(session.handlers.len(), 1);
    }
}

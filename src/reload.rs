//! Live-reload notifications over WebSocket.
//!
//! # Architecture
//!
//! ```text
//!                       ┌──────────────────────────┐
//!   watch thread ──────►│ ReloadHub::broadcast()   │
//!                       └────────────┬─────────────┘
//!                                    │ mpsc per client
//!                 ┌──────────────────┼──────────────────┐
//!                 ▼                  ▼                  ▼
//!           sender thread      sender thread      sender thread
//!           (msg | 60s ping)        ...                ...
//!                 │
//!           ┌─────┴──────┐
//!           │ WebSocket  │◄── reader thread (close detection)
//!           └────────────┘
//! ```
//!
//! Both threads of a client share the socket behind a mutex and a `closed`
//! flag. Once the flag is set no further frame is written.

use crate::{content::EntityKind, log, watch::WatchOp};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    io::ErrorKind,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::{Duration, Instant},
};
use tungstenite::{
    Message, WebSocket,
    handshake::server::{ErrorResponse, Request, Response},
    http::StatusCode,
};

/// Request path of the reload socket.
pub const WS_PATH: &str = "/--ws--";

const PING_INTERVAL: Duration = Duration::from_secs(60);
/// How long the reader holds the socket before letting the sender in.
const READ_TIMEOUT: Duration = Duration::from_millis(200);
/// How often an idle sender checks the `closed` flag.
const CLOSE_POLL: Duration = Duration::from_millis(200);

// ============================================================================
// Message
// ============================================================================

/// `{"type":"post","id":"<id>","op":"update"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadMessage {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    pub op: WatchOp,
}

impl ReloadMessage {
    pub fn new(kind: EntityKind, id: impl Into<String>, op: WatchOp) -> Self {
        Self { kind, id: id.into(), op }
    }
}

// ============================================================================
// Hub
// ============================================================================

/// Fans reload messages out to every connected browser.
#[derive(Debug, Default)]
pub struct ReloadHub {
    clients: Mutex<Vec<Sender<String>>>,
}

impl ReloadHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bind the reload socket and accept clients in the background.
    pub fn start(self: &Arc<Self>, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .with_context(|| format!("failed to bind reload socket on {addr}"))?;
        let local = listener.local_addr()?;

        let hub = Arc::clone(self);
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let hub = Arc::clone(&hub);
                        thread::spawn(move || hub.accept(stream));
                    }
                    Err(err) => log!("reload"; "accept failed: {err}"),
                }
            }
        });

        log!("reload"; "ws://{local}{WS_PATH}");
        Ok(local)
    }

    /// Send `message` to every open client, dropping the closed ones.
    pub fn broadcast(&self, message: &ReloadMessage) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(err) => {
                log!("reload"; "failed to encode message: {err}");
                return;
            }
        };

        let mut clients = self.clients.lock();
        clients.retain(|client| client.send(text.clone()).is_ok());
        if !clients.is_empty() {
            log!("reload"; "{text} → {} client(s)", clients.len());
        }
    }

    #[cfg(test)]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    fn accept(&self, stream: TcpStream) {
        let socket = match tungstenite::accept_hdr(stream, check_path) {
            Ok(socket) => socket,
            Err(err) => {
                log!("reload"; "handshake failed: {err}");
                return;
            }
        };
        if let Err(err) = socket.get_ref().set_read_timeout(Some(READ_TIMEOUT)) {
            log!("reload"; "failed to configure socket: {err}");
            return;
        }

        let (tx, rx) = mpsc::channel();
        self.clients.lock().push(tx);
        log!("reload"; "client connected");

        let client = Arc::new(Client {
            socket: Mutex::new(socket),
            closed: AtomicBool::new(false),
        });
        let reader = Arc::clone(&client);
        thread::spawn(move || reader.read_loop());
        client.send_loop(rx);
    }
}

fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }
    let mut error = ErrorResponse::new(Some("not found".to_owned()));
    *error.status_mut() = StatusCode::NOT_FOUND;
    Err(error)
}

// ============================================================================
// Client
// ============================================================================

struct Client {
    socket: Mutex<WebSocket<TcpStream>>,
    closed: AtomicBool,
}

impl Client {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn read_loop(&self) {
        while !self.is_closed() {
            let result = self.socket.lock().read();
            match result {
                Ok(Message::Close(_)) => {
                    log!("reload"; "client disconnected");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
                Err(err) => {
                    log!("reload"; "read failed: {err}");
                    break;
                }
            }
        }
        self.close();
    }

    fn send_loop(&self, rx: Receiver<String>) {
        let mut last_sent = Instant::now();
        while !self.is_closed() {
            let text = match rx.recv_timeout(CLOSE_POLL) {
                Ok(text) => text,
                Err(RecvTimeoutError::Timeout) if last_sent.elapsed() >= PING_INTERVAL => String::new(),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if self.is_closed() {
                break;
            }
            if let Err(err) = self.socket.lock().send(Message::text(text)) {
                log!("reload"; "send failed: {err}");
                break;
            }
            last_sent = Instant::now();
        }

        self.close();
        let mut socket = self.socket.lock();
        // Best effort: the peer may already be gone.
        let _ = socket.close(None);
        let _ = socket.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================

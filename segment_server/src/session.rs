//! Per-connection command loop.
//!
//! A session moves `AwaitCommand → Processing → AwaitCommand | Closed`.
//! Request failures are reported to the client and the session keeps going;
//! only a disconnect, an undecodable frame or `shutdown` closes it.

use crate::catalog::{Catalog, CatalogError};
use crate::command::{Command, SegmentRequest};
use crate::error::{Result, ServerError};
use crate::extractor;
use crate::shutdown::ShutdownSignal;
use log::{debug, info, warn};
use segment_protocol::{CatalogEntry, Connection, ErrorKind, Message};
use std::net::TcpStream;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitCommand,
    Processing,
    Closed,
}

/// Read-only state every session needs
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub catalog: Arc<Catalog>,
    /// Snapshot answered to `list`, serialized once at startup
    pub listing: Arc<String>,
    pub shutdown: ShutdownSignal,
    pub chunk_size: usize,
}

impl SessionContext {
    pub fn new(
        catalog: Arc<Catalog>,
        snapshot: &[CatalogEntry],
        shutdown: ShutdownSignal,
        chunk_size: usize,
    ) -> Result<Self> {
        let listing = serde_json::to_string(snapshot).map_err(CatalogError::from)?;

        Ok(Self {
            catalog,
            listing: Arc::new(listing),
            shutdown,
            chunk_size: chunk_size.max(1),
        })
    }
}

pub struct Session {
    connection: Connection,
    peer: String,
    context: SessionContext,
    state: SessionState,
}

impl Session {
    pub fn new(stream: TcpStream, context: SessionContext) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let connection = Connection::new(stream)?;

        Ok(Self {
            connection,
            peer,
            context,
            state: SessionState::AwaitCommand,
        })
    }

    /// Serve commands until the session closes. The connection is dropped
    /// on return.
    pub fn run(mut self) {
        info!("🔌 Client {} connected", self.peer);

        while self.state != SessionState::Closed {
            let next = self.step();
            self.transition(next);
        }

        info!("🔌 Client {} disconnected", self.peer);
    }

    /// Handle one read cycle and return the next state
    fn step(&mut self) -> SessionState {
        let text = match self.connection.read_message() {
            Ok(Message::Command { text }) => text,
            Ok(other) => {
                warn!(
                    "⚠️  Client {} sent unexpected message: {:?}",
                    self.peer,
                    other.message_type()
                );
                self.report(
                    ErrorKind::Protocol,
                    format!("unexpected message type {:?}", other.message_type()),
                );
                return SessionState::Closed;
            }
            Err(e) if e.is_disconnect() => {
                debug!("Client {} closed the connection: {}", self.peer, e);
                return SessionState::Closed;
            }
            Err(e) => {
                warn!("⚠️  Protocol error with {}: {}", self.peer, e);
                self.report(ErrorKind::Protocol, e.to_string());
                return SessionState::Closed;
            }
        };

        self.transition(SessionState::Processing);

        match self.process(&text) {
            Ok(next) => next,
            // Failed to write a reply: the connection is unusable
            Err(ServerError::Protocol(e)) => {
                warn!("⚠️  Lost connection to {}: {}", self.peer, e);
                SessionState::Closed
            }
            Err(e) => {
                warn!("⚠️  Request {:?} from {} failed: {}", text, self.peer, e);
                if self.report(e.kind(), e.to_string()) {
                    SessionState::AwaitCommand
                } else {
                    SessionState::Closed
                }
            }
        }
    }

    fn process(&mut self, text: &str) -> Result<SessionState> {
        match Command::parse(text)? {
            Command::List => {
                info!("📋 Client {} requested the catalog", self.peer);
                self.connection.write_message(&Message::CatalogListing {
                    json: self.context.listing.to_string(),
                })?;
                Ok(SessionState::AwaitCommand)
            }
            Command::Segment(request) => {
                self.send_segment(&request)?;
                Ok(SessionState::AwaitCommand)
            }
            Command::Shutdown => {
                info!("🛑 Client {} requested server shutdown", self.peer);
                // Set before the ack goes out: a client holding the ack must
                // never reach a dispatcher that still accepts
                if !self.context.shutdown.trigger() {
                    debug!("Shutdown already in progress");
                }
                self.connection.write_message(&Message::ShutdownAck {
                    message: "Server is shutting down".to_string(),
                })?;
                Ok(SessionState::Closed)
            }
        }
    }

    fn send_segment(&mut self, request: &SegmentRequest) -> Result<()> {
        info!(
            "🎧 Client {} requested {} from {}s to {}s",
            self.peer, request.asset_name, request.start_seconds, request.end_seconds
        );

        let asset = self.context.catalog.lookup(&request.asset_name)?;
        let payload = extractor::extract(asset, request.start_seconds, request.end_seconds)?;

        let mut chunks = 0usize;
        for chunk in payload.chunks(self.context.chunk_size) {
            self.connection.write_message(&Message::SegmentChunk {
                data: chunk.to_vec(),
            })?;
            chunks += 1;
        }
        self.connection.write_message(&Message::SegmentEnd {
            total_bytes: payload.len() as u64,
            frames: payload.frames(),
        })?;

        info!(
            "✅ Sent {} frames ({} bytes, {} chunks) of {} to {}",
            payload.frames(),
            payload.len(),
            chunks,
            request.asset_name,
            self.peer
        );
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        if next != self.state {
            debug!("Session {}: {:?} -> {:?}", self.peer, self.state, next);
            self.state = next;
        }
    }

    /// Send an error reply. Returns false if the connection is gone.
    fn report(&mut self, kind: ErrorKind, message: String) -> bool {
        match self.connection.write_message(&Message::error(kind, message)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not report error to {}: {}", self.peer, e);
                false
            }
        }
    }
}

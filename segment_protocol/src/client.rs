use crate::protocol::{CatalogEntry, Connection, Message, ProtocolError};
use log::{debug, error, info};
use std::net::TcpStream;
use std::time::Duration;

/// High-level TCP client for the segment server
pub struct SegmentClient {
    connection: Connection,
}

impl SegmentClient {
    /// Connect to the segment server
    pub fn connect(address: &str) -> Result<Self, ProtocolError> {
        info!("📡 Connecting to segment server at {}", address);

        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(Some(Duration::from_secs(30)))?;
        stream.set_write_timeout(Some(Duration::from_secs(10)))?;

        let connection = Connection::new(stream)?;

        info!("✅ Connected to segment server");

        Ok(SegmentClient { connection })
    }

    /// Fetch the server's catalog snapshot
    pub fn list(&mut self) -> Result<Vec<CatalogEntry>, ProtocolError> {
        debug!("📤 Sending list command");
        self.connection.write_message(&Message::command("list"))?;

        match self.connection.read_message()? {
            Message::CatalogListing { json } => {
                let entries: Vec<CatalogEntry> = serde_json::from_str(&json)?;
                info!("📋 Received catalog with {} entries", entries.len());
                Ok(entries)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    /// Request `[start, end)` seconds of `name` and collect the chunks
    pub fn fetch_segment(
        &mut self,
        name: &str,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<SegmentDownload, ProtocolError> {
        info!(
            "🎧 Requesting segment of {} from {}s to {}s",
            name, start_seconds, end_seconds
        );

        let command = format!("{},{},{}", name, start_seconds, end_seconds);
        self.connection.write_message(&Message::command(command))?;

        let mut data = Vec::new();
        let mut chunks = 0u32;

        loop {
            match self.connection.read_message()? {
                Message::SegmentChunk { data: chunk } => {
                    chunks += 1;
                    data.extend_from_slice(&chunk);
                }
                Message::SegmentEnd {
                    total_bytes,
                    frames,
                } => {
                    if total_bytes != data.len() as u64 {
                        error!(
                            "❌ Segment size mismatch: expected {} bytes, got {}",
                            total_bytes,
                            data.len()
                        );
                        return Err(ProtocolError::SizeMismatch {
                            expected: total_bytes,
                            received: data.len() as u64,
                        });
                    }

                    info!(
                        "✅ Received segment: {} bytes in {} chunks ({} frames)",
                        data.len(),
                        chunks,
                        frames
                    );
                    return Ok(SegmentDownload { data, frames });
                }
                other => return Err(Self::unexpected(other)),
            }
        }
    }

    /// Ask the server to stop accepting connections
    pub fn shutdown(&mut self) -> Result<String, ProtocolError> {
        info!("🛑 Requesting server shutdown");
        self.connection.write_message(&Message::command("shutdown"))?;

        match self.connection.read_message()? {
            Message::ShutdownAck { message } => {
                info!("✅ Server acknowledged shutdown: {}", message);
                Ok(message)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    /// Send raw command text and return the first reply
    pub fn send_raw(&mut self, text: &str) -> Result<Message, ProtocolError> {
        self.connection.write_message(&Message::command(text))?;
        self.connection.read_message()
    }

    fn unexpected(message: Message) -> ProtocolError {
        match message {
            Message::ErrorResponse { kind, message } => {
                error!("❌ Server error ({}): {}", kind, message);
                ProtocolError::Remote { kind, message }
            }
            other => {
                error!("❌ Unexpected message type: {:?}", other.message_type());
                ProtocolError::UnexpectedMessage(other.message_type())
            }
        }
    }
}

/// A complete segment received from the server
#[derive(Debug, Clone)]
pub struct SegmentDownload {
    /// Self-contained WAV file bytes
    pub data: Vec<u8>,
    /// Number of audio frames in the segment
    pub frames: u32,
}

impl SegmentDownload {
    /// Get the size of the payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

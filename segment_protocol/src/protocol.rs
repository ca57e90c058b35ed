use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream};
use thiserror::Error;

/// Largest payload accepted in a single frame (16MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("Invalid payload size: {0}")]
    InvalidPayloadSize(u32),

    #[error("Invalid string encoding")]
    InvalidString,

    #[error("Invalid error kind: {0}")]
    InvalidErrorKind(u8),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected message: {0:?}")]
    UnexpectedMessage(MessageType),

    #[error("Segment size mismatch: expected {expected} bytes, received {received}")]
    SizeMismatch { expected: u64, received: u64 },

    #[error("Server error ({kind}): {message}")]
    Remote { kind: ErrorKind, message: String },
}

impl ProtocolError {
    /// True when the peer has gone away rather than sent something invalid
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Message types for our binary protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Client → Server
    Command = 0x01,

    // Server → Client
    CatalogListing = 0x10,
    SegmentChunk = 0x11,
    SegmentEnd = 0x12,
    ShutdownAck = 0x13,
    ErrorResponse = 0x14,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Command),
            0x10 => Ok(MessageType::CatalogListing),
            0x11 => Ok(MessageType::SegmentChunk),
            0x12 => Ok(MessageType::SegmentEnd),
            0x13 => Ok(MessageType::ShutdownAck),
            0x14 => Ok(MessageType::ErrorResponse),
            _ => Err(ProtocolError::InvalidMessageType(value)),
        }
    }
}

/// Failure categories reported to clients in an `ErrorResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    NotFound = 1,
    MalformedCommand = 2,
    InvalidRange = 3,
    EmptyRange = 4,
    Io = 5,
    Protocol = 6,
    Busy = 7,
}

impl TryFrom<u8> for ErrorKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErrorKind::NotFound),
            2 => Ok(ErrorKind::MalformedCommand),
            3 => Ok(ErrorKind::InvalidRange),
            4 => Ok(ErrorKind::EmptyRange),
            5 => Ok(ErrorKind::Io),
            6 => Ok(ErrorKind::Protocol),
            7 => Ok(ErrorKind::Busy),
            _ => Err(ProtocolError::InvalidErrorKind(value)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::MalformedCommand => "malformed command",
            ErrorKind::InvalidRange => "invalid range",
            ErrorKind::EmptyRange => "empty range",
            ErrorKind::Io => "io failure",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Busy => "busy",
        };
        f.write_str(name)
    }
}

/// Container formats the catalog can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    /// Uncompressed PCM in a RIFF/WAVE container
    #[serde(rename = "wav")]
    PcmWav,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormat::PcmWav => f.write_str("wav"),
        }
    }
}

/// One record of the catalog snapshot answered to `list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name, unique within the catalog
    pub name: String,
    /// Duration in seconds
    pub duration: f64,
    pub format: AudioFormat,
}

/// Messages that can be sent/received
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Client → Server
    /// Text command: `list`, `<name>,<start>,<end>` or `shutdown`
    Command { text: String },

    // Server → Client
    /// JSON catalog snapshot
    CatalogListing { json: String },
    SegmentChunk { data: Vec<u8> },
    /// Sent once after the last chunk of a segment
    SegmentEnd { total_bytes: u64, frames: u32 },
    ShutdownAck { message: String },
    ErrorResponse { kind: ErrorKind, message: String },
}

impl Message {
    pub fn command(text: impl Into<String>) -> Self {
        Message::Command { text: text.into() }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Message::ErrorResponse {
            kind,
            message: message.into(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Command { .. } => MessageType::Command,
            Message::CatalogListing { .. } => MessageType::CatalogListing,
            Message::SegmentChunk { .. } => MessageType::SegmentChunk,
            Message::SegmentEnd { .. } => MessageType::SegmentEnd,
            Message::ShutdownAck { .. } => MessageType::ShutdownAck,
            Message::ErrorResponse { .. } => MessageType::ErrorResponse,
        }
    }

    /// Serialize message to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut payload = Vec::new();

        match self {
            Message::Command { text } => {
                write_string(&mut payload, text)?;
            }
            Message::CatalogListing { json } => {
                write_string(&mut payload, json)?;
            }
            Message::SegmentChunk { data } => {
                write_bytes(&mut payload, data)?;
            }
            Message::SegmentEnd {
                total_bytes,
                frames,
            } => {
                payload.extend_from_slice(&total_bytes.to_le_bytes());
                payload.extend_from_slice(&frames.to_le_bytes());
            }
            Message::ShutdownAck { message } => {
                write_string(&mut payload, message)?;
            }
            Message::ErrorResponse { kind, message } => {
                payload.push(*kind as u8);
                write_string(&mut payload, message)?;
            }
        }

        if payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::InvalidPayloadSize(payload.len() as u32));
        }

        // Build final message: [type:u8][length:u32][payload...]
        let mut message = Vec::with_capacity(5 + payload.len());
        message.push(self.message_type() as u8);
        message.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        message.extend_from_slice(&payload);

        Ok(message)
    }

    /// Deserialize message from bytes
    pub fn from_bytes(message_type: MessageType, payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = payload;

        match message_type {
            MessageType::Command => {
                let text = read_string(&mut reader)?;
                Ok(Message::Command { text })
            }
            MessageType::CatalogListing => {
                let json = read_string(&mut reader)?;
                Ok(Message::CatalogListing { json })
            }
            MessageType::SegmentChunk => {
                let data = read_bytes(&mut reader)?;
                Ok(Message::SegmentChunk { data })
            }
            MessageType::SegmentEnd => {
                if reader.len() < 12 {
                    return Err(ProtocolError::InvalidPayloadSize(reader.len() as u32));
                }
                let total_bytes = u64::from_le_bytes([
                    reader[0], reader[1], reader[2], reader[3], reader[4], reader[5], reader[6],
                    reader[7],
                ]);
                let frames = u32::from_le_bytes([reader[8], reader[9], reader[10], reader[11]]);
                Ok(Message::SegmentEnd {
                    total_bytes,
                    frames,
                })
            }
            MessageType::ShutdownAck => {
                let message = read_string(&mut reader)?;
                Ok(Message::ShutdownAck { message })
            }
            MessageType::ErrorResponse => {
                if reader.is_empty() {
                    return Err(ProtocolError::InvalidPayloadSize(0));
                }
                let kind = ErrorKind::try_from(reader[0])?;
                reader = &reader[1..];
                let message = read_string(&mut reader)?;
                Ok(Message::ErrorResponse { kind, message })
            }
        }
    }
}

/// Connection wrapper for reading/writing messages
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Result<Self, ProtocolError> {
        let reader_stream = stream.try_clone()?;
        let reader = BufReader::new(reader_stream);
        let writer = BufWriter::new(stream);

        Ok(Connection { reader, writer })
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.writer.get_ref().peer_addr()?)
    }

    /// Read a message from the connection
    pub fn read_message(&mut self) -> Result<Message, ProtocolError> {
        // Read message type and length
        let mut header = [0u8; 5];
        self.reader.read_exact(&mut header)?;

        let message_type = MessageType::try_from(header[0])?;
        let payload_length = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);

        if payload_length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::InvalidPayloadSize(payload_length));
        }

        // Read payload
        let mut payload = vec![0u8; payload_length as usize];
        if payload_length > 0 {
            self.reader.read_exact(&mut payload)?;
        }

        // Parse message
        Message::from_bytes(message_type, &payload)
    }

    /// Write a message to the connection
    pub fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let bytes = message.to_bytes()?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

// Helper functions for reading/writing strings and byte arrays

fn write_string(buffer: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    write_bytes(buffer, s.as_bytes())
}

fn read_string(reader: &mut &[u8]) -> Result<String, ProtocolError> {
    let bytes = read_bytes(reader)?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidString)
}

fn write_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<(), ProtocolError> {
    let len = bytes.len() as u32;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(bytes);
    Ok(())
}

fn read_bytes(reader: &mut &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if reader.len() < 4 {
        return Err(ProtocolError::InvalidPayloadSize(reader.len() as u32));
    }

    let len = u32::from_le_bytes([reader[0], reader[1], reader[2], reader[3]]) as usize;
    *reader = &reader[4..];

    if reader.len() < len {
        return Err(ProtocolError::InvalidPayloadSize(reader.len() as u32));
    }

    let bytes = reader[..len].to_vec();
    *reader = &reader[len..];

    Ok(bytes)
}

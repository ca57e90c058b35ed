//! # Segment Protocol
//!
//! TCP protocol and client for fetching time-sliced audio segments from the
//! segment server.
//!
//! This crate provides:
//! - Low-level protocol definitions (framed messages, serialization)
//! - Shared catalog types
//! - High-level blocking client
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use segment_protocol::client::SegmentClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SegmentClient::connect("127.0.0.1:12345")?;
//!
//! for entry in client.list()? {
//!     println!("{} ({:.2}s, {})", entry.name, entry.duration, entry.format);
//! }
//!
//! let segment = client.fetch_segment("a.wav", 2.0, 4.0)?;
//! std::fs::write("segment_a.wav", &segment.data)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod protocol;

// Re-export commonly used types
pub use client::{SegmentClient, SegmentDownload};
pub use protocol::{
    AudioFormat, CatalogEntry, Connection, ErrorKind, Message, MessageType, ProtocolError,
};

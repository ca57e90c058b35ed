pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod extractor;
pub mod session;
pub mod shutdown;
pub mod tcp_server;
pub mod test_utils;

pub use catalog::{AudioAsset, Catalog};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use extractor::{extract, SegmentPayload};
pub use shutdown::ShutdownSignal;
pub use tcp_server::{SegmentServer, ServerHandle};

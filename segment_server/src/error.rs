use crate::catalog::CatalogError;
use crate::command::CommandError;
use crate::extractor::ExtractError;
use segment_protocol::{ErrorKind, ProtocolError};
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Too many connections (max: {max})")]
    TooManyConnections { max: usize },
}

impl ServerError {
    /// Category reported to the client in an `ErrorResponse`
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Catalog(CatalogError::NotFound(_)) => ErrorKind::NotFound,
            ServerError::Catalog(_) => ErrorKind::Io,
            ServerError::Extract(ExtractError::InvalidRange { .. }) => ErrorKind::InvalidRange,
            ServerError::Extract(ExtractError::EmptyRange { .. }) => ErrorKind::EmptyRange,
            ServerError::Extract(_) => ErrorKind::Io,
            ServerError::Command(CommandError::InvalidRange(_)) => ErrorKind::InvalidRange,
            ServerError::Command(_) => ErrorKind::MalformedCommand,
            ServerError::Protocol(_) => ErrorKind::Protocol,
            ServerError::Io(_) => ErrorKind::Io,
            ServerError::TooManyConnections { .. } => ErrorKind::Busy,
        }
    }
}

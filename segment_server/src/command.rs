use crate::extractor::ExtractError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unrecognized command: {0:?}")]
    Unrecognized(String),

    #[error("Expected <name>,<start>,<end> but got {0} field(s)")]
    FieldCount(usize),

    #[error("Missing file name")]
    MissingName,

    #[error("Invalid {field} time: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{0}")]
    InvalidRange(ExtractError),
}

/// A segment request as parsed off the wire
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    pub asset_name: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl SegmentRequest {
    /// Validate bounds: non-negative, finite, `end > start`
    pub fn new(
        asset_name: impl Into<String>,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Self, CommandError> {
        let valid = start_seconds.is_finite()
            && end_seconds.is_finite()
            && start_seconds >= 0.0
            && end_seconds > start_seconds;
        if !valid {
            return Err(CommandError::InvalidRange(ExtractError::InvalidRange {
                start: start_seconds,
                end: end_seconds,
            }));
        }

        Ok(Self {
            asset_name: asset_name.into(),
            start_seconds,
            end_seconds,
        })
    }
}

/// Commands understood by a session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Segment(SegmentRequest),
    Shutdown,
}

impl Command {
    /// Parse one command. Surrounding whitespace (including a trailing
    /// newline from line-oriented clients) is ignored.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        match text {
            "list" => return Ok(Command::List),
            "shutdown" => return Ok(Command::Shutdown),
            _ => {}
        }

        if !text.contains(',') {
            return Err(CommandError::Unrecognized(text.to_string()));
        }

        let fields: Vec<&str> = text.split(',').map(str::trim).collect();
        let &[name, start, end] = &fields[..] else {
            return Err(CommandError::FieldCount(fields.len()));
        };

        if name.is_empty() {
            return Err(CommandError::MissingName);
        }

        let start_seconds = parse_seconds("start", start)?;
        let end_seconds = parse_seconds("end", end)?;

        SegmentRequest::new(name, start_seconds, end_seconds).map(Command::Segment)
    }
}

fn parse_seconds(field: &'static str, value: &str) -> Result<f64, CommandError> {
    value
        .parse::<f64>()
        .map_err(|_| CommandError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

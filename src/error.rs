use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

use crate::event::IngestMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum VigilError {
    #[error("Channel error: {0}")]
    Channel(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Graph invariant violation: {0}")]
    InvariantViolation(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Entity transform failed: {0}")]
    Transform(String),
}

impl From<toml::de::Error> for VigilError {
    fn from(src: toml::de::Error) -> VigilError {
        VigilError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for VigilError {
    fn from(src: toml::ser::Error) -> VigilError {
        VigilError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for VigilError {
    fn from(src: JsonError) -> VigilError {
        VigilError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for VigilError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => VigilError::NotFound(format!("{x}")),
            _ => VigilError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<TokioSendError<IngestMessage>> for VigilError {
    fn from(x: TokioSendError<IngestMessage>) -> Self {
        VigilError::Channel(format!(
            "Channel send Error, could not transmit ingest message {}",
            x.0
        ))
    }
}

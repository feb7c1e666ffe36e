//! Centralized error types for Sunlink.
//!
//! Every fallible channel, store, or decode path returns one of these types.
//! None of them reach the rendering layer: callers log them and fall back to
//! a stale or placeholder display.

use thiserror::Error;

/// Top-level error type for both device roles.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Record schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Forecast store error: {0}")]
    Store(#[from] ForecastStoreError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether the next natural trigger may succeed where this one failed.
    ///
    /// Nothing is retried automatically; this only decides the log level.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Channel(e) => e.is_transient(),
            SyncError::Store(ForecastStoreError::Busy(_)) => true,
            _ => false,
        }
    }
}

/// Transport failures reported by the channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error("Channel is not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Peer {0} is not reachable")]
    PeerUnreachable(String),

    #[error("Send to {peer} failed with status {status}")]
    SendFailed { peer: String, status: i32 },

    #[error("Channel closed")]
    Closed,
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ChannelError::Closed)
    }
}

/// A record did not match the expected field layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Field {key} has type {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unexpected record path: {0}")]
    WrongPath(String),
}

/// Local forecast store errors.
#[derive(Debug, Error)]
pub enum ForecastStoreError {
    #[error("Store could not be opened: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Store is busy: {0}")]
    Busy(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_store_error(self) -> ForecastStoreError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_store_error(self) -> ForecastStoreError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                ForecastStoreError::Busy(self.to_string())
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                ForecastStoreError::Corruption(self.to_string())
            }
            _ => ForecastStoreError::Query(self.to_string()),
        }
    }
}

// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum RingError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("put with obsolete or concurrent version")]
    ObsoleteVersion,

    #[error("metadata is in an inconsistent state: {0}")]
    InconsistentMetadata(String),

    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("unknown metadata key: {0}")]
    UnknownMetadataKey(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid vector clock encoding: {0}")]
    InvalidClockFormat(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("engine does not support this operation: {0}")]
    NotSupported(String),

    #[error("socket pool checkout timed out for {0}")]
    PoolTimeout(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PartialEq for RingError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RingError::Io(a), RingError::Io(b)) => a.to_string() == b.to_string(),
            (RingError::ObsoleteVersion, RingError::ObsoleteVersion) => true,
            (RingError::IncompleteData, RingError::IncompleteData) => true,
            (RingError::InconsistentMetadata(a), RingError::InconsistentMetadata(b)) => a == b,
            (RingError::StoreNotFound(a), RingError::StoreNotFound(b)) => a == b,
            (RingError::UnknownMetadataKey(a), RingError::UnknownMetadataKey(b)) => a == b,
            (RingError::PermissionDenied(a), RingError::PermissionDenied(b)) => a == b,
            (RingError::InvalidClockFormat(a), RingError::InvalidClockFormat(b)) => a == b,
            (RingError::InvalidRequest(a), RingError::InvalidRequest(b)) => a == b,
            (RingError::NotSupported(a), RingError::NotSupported(b)) => a == b,
            (RingError::PoolTimeout(a), RingError::PoolTimeout(b)) => a == b,
            (RingError::Timeout(a), RingError::Timeout(b)) => a == b,
            (RingError::Internal(a), RingError::Internal(b)) => a == b,
            _ => false,
        }
    }
}

impl From<std::io::Error> for RingError {
    fn from(e: std::io::Error) -> Self {
        RingError::Io(Arc::new(e))
    }
}

impl From<std::string::FromUtf8Error> for RingError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        RingError::InvalidRequest(format!("key/value is not valid UTF-8: {e}"))
    }
}

/// Stable wire short-codes for every error kind, used to marshal errors across
/// the admin protocol as `(i16 code, utf8 message)` (spec.md section 7).
///
/// The codes are a contract with peers: adding a new kind must pick an unused
/// code, never renumber an existing one.
impl RingError {
    pub fn short_code(&self) -> i16 {
        match self {
            RingError::Io(_) => 1,
            RingError::IncompleteData => 2,
            RingError::ObsoleteVersion => 3,
            RingError::InconsistentMetadata(_) => 4,
            RingError::StoreNotFound(_) => 5,
            RingError::UnknownMetadataKey(_) => 6,
            RingError::PermissionDenied(_) => 7,
            RingError::InvalidClockFormat(_) => 8,
            RingError::InvalidRequest(_) => 9,
            RingError::NotSupported(_) => 10,
            RingError::PoolTimeout(_) => 11,
            RingError::Timeout(_) => 12,
            RingError::Internal(_) => 13,
        }
    }

    /// Re-inflates an error received over the wire from its short code and message.
    pub fn from_wire(code: i16, message: &str) -> Self {
        match code {
            2 => RingError::IncompleteData,
            3 => RingError::ObsoleteVersion,
            4 => RingError::InconsistentMetadata(message.to_string()),
            5 => RingError::StoreNotFound(message.to_string()),
            6 => RingError::UnknownMetadataKey(message.to_string()),
            7 => RingError::PermissionDenied(message.to_string()),
            8 => RingError::InvalidClockFormat(message.to_string()),
            9 => RingError::InvalidRequest(message.to_string()),
            10 => RingError::NotSupported(message.to_string()),
            11 => RingError::PoolTimeout(message.to_string()),
            12 => RingError::Timeout(message.to_string()),
            1 | 13 | _ => RingError::Internal(message.to_string()),
        }
    }
}

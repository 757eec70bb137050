use thiserror::Error;
use sqlx::Error as SqlxError;
use serde_json::Error as JsonError;
use std::io::Error as IoError;

use crate::composer::sdl::SdlError;
use crate::record::ErrorRecord;

/// Failures from the cache backend. Kept `Clone` because a cache read error
/// can reach every caller waiting on a coalesced request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cached payload could not be decoded: {0}")]
    Decode(String),
}

impl From<SqlxError> for CacheError {
    fn from(err: SqlxError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Errors surfaced by a connector to its model and resolvers.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("{0}")]
    Request(Box<ErrorRecord>),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<ErrorRecord> for ConnectorError {
    fn from(record: ErrorRecord) -> Self {
        ConnectorError::Request(Box::new(record))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("{0}")]
    Record(Box<ErrorRecord>),

    #[error("Duplicate context key: {0}")]
    DuplicateContextKey(String),

    #[error("{0}")]
    ForbiddenOption(String),

    #[error("{type_name}.{field} defined in resolvers, but not in schema")]
    UnknownResolverField { type_name: String, field: String },

    #[error("\"{0}\" defined in resolvers, but not in schema")]
    UnknownType(String),

    #[error("Schema error: {0}")]
    Sdl(#[from] SdlError),

    #[error("Unknown data source module: {0}")]
    UnknownModule(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] JsonError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Storage error: {0}")]
    Storage(#[from] SqlxError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<ErrorRecord> for GatewayError {
    fn from(record: ErrorRecord) -> Self {
        GatewayError::Record(Box::new(record))
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Unknown(err.to_string())
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::InvalidConfig(err.to_string())
    }
}

impl GatewayError {
    /// The structured record carried by this error, if it already is one.
    pub fn as_record(&self) -> Option<&ErrorRecord> {
        match self {
            GatewayError::Record(record) => Some(record),
            GatewayError::Connector(ConnectorError::Request(record)) => Some(record),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

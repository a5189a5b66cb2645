//! Error types for the OpenApi client.
//!
//! # Design
//! Only local failures are errors. A response that arrives and decodes but
//! carries `Successful=false` is returned as data; callers inspect
//! `BizResponse::successful` for business-level outcomes.

use thiserror::Error;

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by `Client` operations and envelope accessors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request envelope, filter, or business object could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The HTTP round trip failed (connection, DNS, TLS, body read).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body, or a value inside `ReturnData`, did not have the
    /// expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The response carried no `ReturnData` at all.
    #[error("response carries no ReturnData")]
    NoData,

    /// The caller-supplied attachment reader failed.
    #[error("attachment read failed: {0}")]
    Attachment(#[from] std::io::Error),

    /// Required configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

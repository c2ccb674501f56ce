//! Error types for the routing layer.

use thiserror::Error;

/// Result type alias for registry mutations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors returned by service registry mutations.
///
/// The hot path never sees these: data-plane reads are infallible and
/// policies signal "no path" through the sentinel id instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Add failed because the service already exists.
    #[error("service already exists")]
    Exists,

    /// Replace failed because the service was not found.
    #[error("service not found")]
    NotFound,

    /// Input validation failed (ids, IPs, duplicates, field limits).
    #[error("invalid service or PoP data")]
    Invalid,

    /// Operation rejected due to configured capacity limits.
    #[error("registry capacity exceeded")]
    Capacity,
}

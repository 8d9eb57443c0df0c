//! Biquad core error types.

use thiserror::Error;

/// Result type for biquad core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in filter design and pipeline simulation.
///
/// All errors are raised synchronously at the point of validation. This
/// crate performs no I/O, so there is nothing to retry; device communication
/// failures belong to the DAQ layer and never reach this taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// Physically impossible filter specification.
    #[error("invalid filter specification: {0}")]
    InvalidSpec(String),

    /// Coefficient domain violation.
    #[error("invalid coefficient parameter: {0}")]
    InvalidParameter(String),

    /// Malformed sample stream length or shape.
    #[error("invalid input stream: {0}")]
    InvalidInput(String),
}

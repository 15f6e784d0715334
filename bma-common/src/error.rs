//! Common error types for BMA

use thiserror::Error;

/// Common result type for BMA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the BMA crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

//! Error types for the head tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Frame geometry cannot be used for error normalization
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Actuator command failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Frame source, detector or direction sensor failed
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Shared tracking state was poisoned by a panicking thread
    #[error("Tracking state poisoned: {0}")]
    StatePoisoned(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

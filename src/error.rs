//! # Error Types
//!
//! This module defines error types used throughout the hueforge library.

use thiserror::Error;

/// Main error type for hueforge operations
#[derive(Debug, Error)]
pub enum HueforgeError {
    /// Image decoding or processing error
    #[error("Image error: {0}")]
    Image(String),

    /// Mesh construction error (heightmap too small, bad geometry)
    #[error("Mesh error: {0}")]
    Mesh(String),

    /// A user-supplied parameter could not be parsed or is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Client-side HTTP errors (connection, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server startup or runtime errors
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration or initialization error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

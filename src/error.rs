//! Error types for qrtist operations

use thiserror::Error;

/// Result type alias using qrtist's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrtist operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed request field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reference to a short link that does not exist
    #[error("Link not found: {0}")]
    NotFound(String),

    /// Background image could not be decoded
    #[error("Failed to decode background image: {0}")]
    ImageDecode(String),

    /// Payload exceeds what a QR code at error-correction level H can hold
    #[error("Payload of {length} bytes is too long for a level-H QR code")]
    PayloadTooLong {
        /// Payload length in bytes
        length: usize,
    },

    /// QR code encoding failed for a reason other than capacity
    #[error("Failed to encode QR code: {0}")]
    QrEncode(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in image
    #[error("No QR code found in image")]
    NoQrCodeFound,

    /// Composited image did not decode back to its payload
    #[error("Composited image is not scannable: {0}")]
    Unscannable(String),

    /// Unexpected persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its request deadline
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

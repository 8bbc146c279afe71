//! Error types for the report exporter

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, rasterizing or assembling a report
#[derive(Error, Debug)]
pub enum Error {
    /// The capture handle is not attached to anything renderable
    #[error("Capture target not found: {0}")]
    MissingTarget(String),

    /// A style override selector could not be parsed
    #[error("Invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    /// Failed to rasterize the capture region
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to paginate or assemble the output document
    #[error("Document assembly failed: {0}")]
    DocumentError(String),

    /// Failed to reach or understand the prediction backend
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error while saving the report
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RenderError(err.to_string())
    }
}

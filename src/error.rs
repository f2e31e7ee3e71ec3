//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or assembling a document
#[derive(Error, Debug)]
pub enum Error {
    /// The page exposed no outline entries; nothing was clicked or scrolled
    #[error("No outline found; make sure the document outline is expanded")]
    NoOutline,

    /// An export was requested while another one is still running
    #[error("An export is already in progress")]
    Busy,

    /// Failed to launch or attach to the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the target URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// A page script failed or returned something unexpected
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Failed to read or encode a rendered surface
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to assemble the PDF
    #[error("PDF assembly failed: {0}")]
    PdfError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error while writing the output
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

//! Error types for the certificate pipeline

use thiserror::Error;

/// Result type alias for certificate operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while producing or handing out a certificate
#[derive(Error, Debug)]
pub enum RenderError {
    /// The certificate could not be composed (markup, layout, background)
    #[error("Composition failed: {0}")]
    Composition(String),

    /// The rasterizer failed to produce pixels
    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    /// The PDF document could not be assembled
    #[error("Document assembly failed: {0}")]
    Document(String),

    /// Rasterization did not finish in time
    #[error("Rasterization timed out after {0}ms")]
    Timeout(u64),

    /// The handle was released or never issued by this store
    #[error("Unknown document handle: {0}")]
    UnknownHandle(u64),

    /// The step has no finished document to hand out
    #[error("Certificate is not ready")]
    NotReady,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem error while writing a download
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// True for failures of the render pipeline itself, as opposed to misuse
    /// of handles or the surrounding step.
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(
            self,
            RenderError::Composition(_)
                | RenderError::Rasterization(_)
                | RenderError::Document(_)
                | RenderError::Timeout(_)
        )
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Rasterization(err.to_string())
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Document(err.to_string())
    }
}

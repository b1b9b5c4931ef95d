// Core types for screenshot and page-source capture

use thiserror::Error;

use crate::mime::Mime;

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations. Recovered by the recorder: the step
/// keeps its comment and drops the image.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The target could not produce a screenshot
    #[error("Capture error: {0}")]
    Screenshot(String),

    /// The target could not produce its page source
    #[error("Page source error: {0}")]
    PageSource(String),

    /// Image encoding or decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Output of a single capture
#[derive(Debug, Clone)]
pub struct Capture {
    /// Encoded image bytes
    pub image: Vec<u8>,
    /// Encoding of `image`
    pub mime: Mime,
    /// Page source, when requested and available
    pub page_source: Option<String>,
}

use crate::format::FourCc;

/// Failures surfaced by [`crate::Viewer`] operations.
///
/// Every variant leaves the viewer in the state it had before the failing
/// call; nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(FourCc),
    #[error("pixel format and source image size must be set before binding planes")]
    NotConfigured,
    #[error("format expects {expected} plane(s) but {actual} were supplied")]
    PlaneCountMismatch { expected: usize, actual: usize },
    #[error("plane {plane} holds {actual} bytes but its geometry needs {required}")]
    PlaneTooSmall {
        plane: usize,
        required: usize,
        actual: usize,
    },
    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocation(String),
    #[error("failed to build fragment pipeline: {0}")]
    Pipeline(String),
    #[error("draw call failed: {0}")]
    Draw(String),
}

//! Common error types for Tagmetry

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for Tagmetry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by all analysis stages.
///
/// Per-image transient failures (an unreadable sidecar, a dimension probe
/// that fails) are reported as warnings instead of surfacing here; an `Error`
/// value always means the job aborts.
#[derive(Error, Debug)]
pub enum Error {
    /// Input directory does not exist or is not a directory
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),

    /// A resolved image path ceased to exist between enumeration and read
    #[error("Image file missing: {0}")]
    ImageFileMissing(PathBuf),

    /// Header identification failed for a recognized image extension
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Recommendation ruleset could not be parsed into the rule envelope
    #[error("Invalid ruleset: {0}")]
    InvalidRuleset(String),

    /// Normalization rules or other configuration malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem read/write failure not covered above
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cooperative cancellation observed
    #[error("Analysis cancelled")]
    Cancelled,
}

impl Error {
    /// Short stable name for the error kind, used in user-visible failure
    /// text instead of internal detail.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InputNotFound(_) => "InputNotFound",
            Error::ImageFileMissing(_) => "ImageFileMissing",
            Error::UnsupportedImageFormat(_) => "UnsupportedImageFormat",
            Error::InvalidRuleset(_) => "InvalidRuleset",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::Io(_) => "IoFailure",
            Error::Cancelled => "Cancelled",
        }
    }

    /// True when the error is the cooperative-cancellation marker.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(Error::Cancelled.kind(), "Cancelled");
        assert_eq!(
            Error::InputNotFound(PathBuf::from("/nope")).kind(),
            "InputNotFound"
        );
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.kind(), "IoFailure");
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::InvalidConfig("bad".into()).is_cancelled());
    }
}

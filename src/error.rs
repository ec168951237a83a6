//! Error types for boundary adherence scoring

use thiserror::Error;

/// Result type alias for boundary adherence operations
pub type Result<T> = std::result::Result<T, BoundaryError>;

/// Error taxonomy for boundary adherence scoring
#[derive(Error, Debug)]
pub enum BoundaryError {
    /// Ground truth is not 2-D or the candidate's spatial shape disagrees with it
    #[error("Shape error: {0}")]
    Shape(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Report parsing or other processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoundaryError {
    /// Create a new shape error
    pub fn shape<S: Into<String>>(msg: S) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a shape error describing two disagreeing spatial shapes
    pub fn shape_mismatch(what: &str, expected: (usize, usize), actual: &[usize]) -> Self {
        Self::Shape(format!(
            "{} spatial shape {:?} does not match ground truth shape ({}, {})",
            what, actual, expected.0, expected.1
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether this error is a shape/dimensionality precondition failure
    #[must_use]
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::Shape(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BoundaryError::invalid_config("test config error");
        assert!(matches!(err, BoundaryError::InvalidConfig(_)));

        let err = BoundaryError::shape("mask must be 2-D");
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_error_display() {
        let err = BoundaryError::shape("mask must be 2-D; got shape [2, 3, 4]");
        assert_eq!(
            err.to_string(),
            "Shape error: mask must be 2-D; got shape [2, 3, 4]"
        );
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = BoundaryError::shape_mismatch("Candidate image", (100, 100), &[100, 101, 3]);
        let message = err.to_string();
        assert!(message.contains("[100, 101, 3]"));
        assert!(message.contains("(100, 100)"));
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BoundaryError::file_io_error("read mask", Path::new("/data/site_01.tif"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read mask"));
        assert!(error_string.contains("/data/site_01.tif"));

        let err = BoundaryError::config_value_error("edge sigma", -1.0, "> 0", Some(2.0));
        let error_string = err.to_string();
        assert!(error_string.contains("edge sigma"));
        assert!(error_string.contains("-1"));
        assert!(error_string.contains("Recommended: 2"));

        let err = BoundaryError::processing_stage_error(
            "curve parsing",
            "missing column",
            Some("batch_curve_long.csv"),
        );
        let error_string = err.to_string();
        assert!(error_string.contains("curve parsing"));
        assert!(error_string.contains("batch_curve_long.csv"));
        assert!(!err.is_shape_error());
    }
}

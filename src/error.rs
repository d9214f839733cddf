//! Error types for mockup compositing operations

use thiserror::Error;

/// Result type alias for mockup operations
pub type Result<T> = std::result::Result<T, MockupError>;

/// Error types for the mockup pipeline
#[derive(Error, Debug)]
pub enum MockupError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Manifest or landmark JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input bytes could not be decoded as a raster image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration or control value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Segmentation or pose provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Buffers that must share dimensions do not
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Overlay mutation attempted before a design was loaded
    #[error("No design overlay loaded")]
    OverlayEmpty,

    /// Render or export attempted before any photo was selected
    #[error("No model image selected")]
    NoBaseImage,

    /// Pixel pipeline errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl MockupError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new provider error
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a dimension mismatch error
    #[must_use]
    pub fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::DimensionMismatch { expected, actual }
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
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with the valid range and an optional recommendation
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Create provider error naming the provider and the failed operation
    pub fn provider_error(provider: &str, operation: &str, error: &str) -> Self {
        Self::Provider(format!("{operation} failed in '{provider}' provider: {error}"))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {info})"),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{stage}'{input_context}: {details}"
        ))
    }

    /// Whether the session stays usable after this error
    ///
    /// Provider and decode failures leave the previous working canvas intact.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::Decode(_)
                | Self::InvalidConfig(_)
                | Self::OverlayEmpty
                | Self::NoBaseImage
        )
    }
}

//! Error types module
//!
//! One type per failure class of the transformation core. Build-time failures
//! (`ValidationError`, `UnknownOperationError`, `PipelineTypeError`) are raised
//! before any stage runs; `OperationError` wraps the cause reported by an
//! executor and records which stage failed. `MediaError` unifies all of them for
//! callers that only need a single error type.

use crate::models::{Capabilities, MediaFormat, MediaKind, OperationName};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejected or unreadable media
    Warn,
    /// Error level - for unexpected executor failures
    Error,
}

/// Metadata describing how an error should be presented to a user-facing collaborator
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Human-readable message naming the operation and the violated constraint
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Input is empty")]
    Empty,

    #[error("Input too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Format {format} is not enabled for decoding")]
    UnsupportedFormat { format: MediaFormat },

    #[error("Failed to decode {format} input: {source}")]
    Corrupt {
        format: MediaFormat,
        #[source]
        source: anyhow::Error,
    },

    #[error("Decoded {kind} has invalid dimensions {width}x{height}")]
    InvalidDimensions {
        kind: MediaKind,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Cannot encode {kind} as {format}")]
    Unsupported { kind: MediaKind, format: MediaFormat },

    #[error("Format {format} is not enabled for export")]
    FormatDisabled { format: MediaFormat },

    #[error("Failed to encode {format}: {source}")]
    Failed {
        format: MediaFormat,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{operation}: unknown parameter '{parameter}'")]
    UnknownParameter {
        operation: OperationName,
        parameter: String,
    },

    #[error("{operation}: missing required parameter '{parameter}'")]
    MissingParameter {
        operation: OperationName,
        parameter: String,
    },

    #[error("{operation}: parameter '{parameter}' must be {expected}")]
    TypeMismatch {
        operation: OperationName,
        parameter: String,
        expected: &'static str,
    },

    #[error("{operation}: parameter '{parameter}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        operation: OperationName,
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("{operation}: parameter '{parameter}' = {value} must be odd")]
    NotOdd {
        operation: OperationName,
        parameter: String,
        value: i64,
    },

    #[error("{operation}: parameter '{parameter}' = '{value}' must be one of {allowed:?}")]
    InvalidChoice {
        operation: OperationName,
        parameter: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("{operation}: {message}")]
    Constraint {
        operation: OperationName,
        message: String,
    },
}

impl ValidationError {
    pub fn operation(&self) -> OperationName {
        match self {
            ValidationError::UnknownParameter { operation, .. }
            | ValidationError::MissingParameter { operation, .. }
            | ValidationError::TypeMismatch { operation, .. }
            | ValidationError::OutOfRange { operation, .. }
            | ValidationError::NotOdd { operation, .. }
            | ValidationError::InvalidChoice { operation, .. }
            | ValidationError::Constraint { operation, .. } => *operation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation: '{name}'")]
pub struct UnknownOperationError {
    pub name: String,
}

impl UnknownOperationError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Operation '{name}' is already registered")]
pub struct DuplicateOperationError {
    pub name: OperationName,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineTypeError {
    #[error("Pipeline expects {declared} input but received {found}")]
    InputKind { declared: MediaKind, found: MediaKind },

    #[error("Stage {index} ({operation}) accepts {accepts} but receives {found}")]
    Stage {
        index: usize,
        operation: OperationName,
        accepts: Capabilities,
        found: MediaKind,
    },
}

/// Executor-level failure of a single pipeline stage
#[derive(Debug, thiserror::Error)]
#[error("Stage {index} ({operation}) failed: {source}")]
pub struct OperationError {
    pub index: usize,
    pub operation: OperationName,
    #[source]
    pub source: anyhow::Error,
}

/// Everything `Pipeline` can return
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Type(#[from] PipelineTypeError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("Pipeline cancelled after {completed} completed stage(s)")]
    Cancelled { completed: usize },
}

/// Unified error for collaborators that drive the whole decode → apply → export flow
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateOperationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ValidationError> for MediaError {
    fn from(err: ValidationError) -> Self {
        MediaError::Pipeline(err.into())
    }
}

impl From<UnknownOperationError> for MediaError {
    fn from(err: UnknownOperationError) -> Self {
        MediaError::Pipeline(err.into())
    }
}

impl From<PipelineTypeError> for MediaError {
    fn from(err: PipelineTypeError) -> Self {
        MediaError::Pipeline(err.into())
    }
}

impl From<OperationError> for MediaError {
    fn from(err: OperationError) -> Self {
        MediaError::Pipeline(err.into())
    }
}

/// Static metadata for each variant: (error_code, suggested_action, log_level).
fn media_error_static_metadata(err: &MediaError) -> (&'static str, Option<&'static str>, LogLevel) {
    match err {
        MediaError::Decode(DecodeError::TooLarge { .. }) => (
            "PAYLOAD_TOO_LARGE",
            Some("Reduce file size and try again"),
            LogLevel::Debug,
        ),
        MediaError::Decode(_) => (
            "DECODE_ERROR",
            Some("Check the file format and try a different file"),
            LogLevel::Warn,
        ),
        MediaError::Encode(_) => (
            "ENCODE_ERROR",
            Some("Choose an output format that matches the media kind"),
            LogLevel::Warn,
        ),
        MediaError::Duplicate(_) => ("DUPLICATE_OPERATION", None, LogLevel::Error),
        MediaError::Pipeline(PipelineError::UnknownOperation(_)) => (
            "UNKNOWN_OPERATION",
            Some("Pick an operation from the published list"),
            LogLevel::Debug,
        ),
        MediaError::Pipeline(PipelineError::Validation(_)) => (
            "VALIDATION_ERROR",
            Some("Adjust the parameter to the allowed range"),
            LogLevel::Debug,
        ),
        MediaError::Pipeline(PipelineError::Type(_)) => (
            "PIPELINE_TYPE_ERROR",
            Some("Remove operations that do not apply to this media kind"),
            LogLevel::Debug,
        ),
        MediaError::Pipeline(PipelineError::Operation(_)) => (
            "OPERATION_FAILED",
            Some("Check the input file or adjust the operation settings"),
            LogLevel::Error,
        ),
        MediaError::Pipeline(PipelineError::Cancelled { .. }) => {
            ("CANCELLED", None, LogLevel::Debug)
        }
    }
}

impl ErrorMetadata for MediaError {
    fn error_code(&self) -> &'static str {
        media_error_static_metadata(self).0
    }

    fn suggested_action(&self) -> Option<&'static str> {
        media_error_static_metadata(self).1
    }

    fn user_message(&self) -> String {
        match self {
            // Executor causes can be long subprocess dumps; keep the top-level cause only
            MediaError::Pipeline(PipelineError::Operation(err)) => format!(
                "{} failed at step {}: {}",
                err.operation,
                err.index + 1,
                err.source
            ),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        media_error_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_operation_and_constraint() {
        let err = ValidationError::OutOfRange {
            operation: OperationName::Rotate,
            parameter: "angle".to_string(),
            value: "450".to_string(),
            min: "0".to_string(),
            max: "360".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rotate: parameter 'angle' = 450 is outside [0, 360]"
        );
        assert_eq!(err.operation(), OperationName::Rotate);
    }

    #[test]
    fn test_media_error_metadata() {
        let err: MediaError = ValidationError::NotOdd {
            operation: OperationName::Blur,
            parameter: "kernel_size".to_string(),
            value: 4,
        }
        .into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.user_message().contains("kernel_size"));
    }

    #[test]
    fn test_operation_error_user_message() {
        let err: MediaError = OperationError {
            index: 1,
            operation: OperationName::Crop,
            source: anyhow::anyhow!("crop region exceeds image bounds"),
        }
        .into();
        assert_eq!(err.error_code(), "OPERATION_FAILED");
        assert_eq!(err.log_level(), LogLevel::Error);
        assert_eq!(
            err.user_message(),
            "crop failed at step 2: crop region exceeds image bounds"
        );
    }

    #[test]
    fn test_too_large_is_debug_level() {
        let err: MediaError = DecodeError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(err.error_code(), "PAYLOAD_TOO_LARGE");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_type_error_message() {
        let err = PipelineTypeError::Stage {
            index: 0,
            operation: OperationName::Trim,
            accepts: Capabilities::VIDEO,
            found: MediaKind::Image,
        };
        assert_eq!(
            err.to_string(),
            "Stage 0 (trim) accepts video but receives image"
        );
    }
}

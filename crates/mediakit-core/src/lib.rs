//! Mediakit Core Library
//!
//! This crate provides the domain models, error taxonomy and configuration
//! shared by every Mediakit component.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{MediaConfig, QualityPreset};
pub use error::{
    DecodeError, DuplicateOperationError, EncodeError, ErrorMetadata, LogLevel, MediaError,
    OperationError, PipelineError, PipelineTypeError, UnknownOperationError, ValidationError,
};
pub use models::{Capabilities, ColorSpace, Dimensions, MediaFormat, MediaKind, OperationName};

//! Domain models shared by the processing crate and its collaborators

pub mod media;
pub mod operation;

pub use media::{Capabilities, ColorSpace, Dimensions, MediaFormat, MediaKind};
pub use operation::OperationName;

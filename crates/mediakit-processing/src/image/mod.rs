//! Image executors built on the `image` and `imageproc` crates

pub mod filters;
pub mod geometry;

pub use filters::{ColorFilter, ImageFilters};
pub use geometry::ImageGeometry;

//! Video and audio processing through ffmpeg subprocesses

pub mod executors;
pub mod ffmpeg;

pub use executors::VideoOps;
pub use ffmpeg::{CommandOutput, CommandRunner, FfmpegTools, SystemRunner};

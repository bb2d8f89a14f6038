//! Mediakit Processing Library
//!
//! Media assets, the operation registry, transformation pipelines and export.
//! Images are processed in memory with `image`/`imageproc`; video and audio go
//! through ffmpeg subprocesses on scratch files.

pub mod asset;
pub mod builtin;
pub mod codec;
pub mod export;
pub mod image;
pub mod operation;
pub mod pipeline;
pub mod registry;
pub mod scratch;
pub mod session;
pub mod video;
pub mod worker;

pub use asset::{AssetSummary, AudioAsset, AudioInfo, ImageAsset, MediaAsset, VideoAsset, VideoInfo};
pub use codec::MediaCodec;
pub use export::{Export, ExportBody, ExportService, ExportStream};
pub use operation::{
    params, Operation, OperationDescriptor, ParamKind, ParamSpec, ParamValue, Parameters,
    ValidatedParameters,
};
pub use pipeline::{Pipeline, PipelineState, Stage};
pub use registry::{Executor, OperationRegistry, RegisteredOperation};
pub use scratch::{ScratchFile, ScratchSpace};
pub use session::EditSession;
pub use video::{CommandOutput, CommandRunner, FfmpegTools, SystemRunner, VideoOps};
pub use worker::{JobOutcome, PipelineJob, PipelineWorker};

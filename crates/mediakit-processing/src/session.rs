//! Single-user editing session
//!
//! Holds the decoded original, the pipeline the user is composing and the
//! last rendered result. Rendering always starts from the original, so
//! changing stages and rendering again never compounds earlier output.

use mediakit_core::{MediaError, MediaFormat, OperationName, PipelineError};
use std::sync::Arc;

use crate::asset::MediaAsset;
use crate::codec::MediaCodec;
use crate::export::{Export, ExportService};
use crate::operation::Parameters;
use crate::pipeline::Pipeline;
use crate::registry::OperationRegistry;

#[derive(Debug)]
pub struct EditSession {
    original: MediaAsset,
    pipeline: Pipeline,
    exporter: ExportService,
    rendered: Option<MediaAsset>,
}

impl EditSession {
    pub fn new(
        original: MediaAsset,
        registry: Arc<OperationRegistry>,
        exporter: ExportService,
    ) -> Self {
        let pipeline = Pipeline::new(registry, original.kind());
        Self {
            original,
            pipeline,
            exporter,
            rendered: None,
        }
    }

    /// Decode an upload and start a session on it
    pub fn open(
        bytes: &[u8],
        format: MediaFormat,
        registry: Arc<OperationRegistry>,
        codec: MediaCodec,
    ) -> Result<Self, MediaError> {
        let original = codec.decode(bytes, format)?;
        tracing::info!(kind = %original.kind(), format = %format, "Session opened");
        Ok(Self::new(original, registry, ExportService::new(codec)))
    }

    pub fn original(&self) -> &MediaAsset {
        &self.original
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Output of the last successful render, if stages have not changed since
    pub fn rendered(&self) -> Option<&MediaAsset> {
        self.rendered.as_ref()
    }

    pub fn add_stage(
        &mut self,
        name: OperationName,
        params: &Parameters,
    ) -> Result<(), PipelineError> {
        self.pipeline.add_stage(name, params)?;
        self.rendered = None;
        Ok(())
    }

    pub fn add_stage_str(&mut self, name: &str, params: &Parameters) -> Result<(), PipelineError> {
        self.pipeline.add_stage_str(name, params)?;
        self.rendered = None;
        Ok(())
    }

    /// Apply the current stages to a copy of the original
    pub fn render(&mut self) -> Result<&MediaAsset, PipelineError> {
        let output = match self.rendered.take() {
            Some(output) => output,
            None => self.pipeline.apply(self.original.clone())?,
        };
        Ok(self.rendered.insert(output))
    }

    /// Drop every stage; the next render yields the original again
    pub fn reset(&mut self) {
        self.pipeline.clear();
        self.rendered = None;
    }

    /// Render (if needed) and encode the result
    pub fn export(&mut self, format: MediaFormat) -> Result<Export, MediaError> {
        self.render()?;
        let asset = self.rendered.as_ref().unwrap_or(&self.original);
        Ok(self.exporter.export(asset, format)?)
    }
}

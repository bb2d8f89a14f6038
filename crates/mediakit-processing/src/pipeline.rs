//! Ordered, validated sequence of operations
//!
//! Stages are checked when they are added (name, parameters and the media
//! kind flowing into them), and the whole sequence is checked again against
//! the concrete input before any stage runs. Execution is strictly sequential;
//! the first failing stage aborts the run and the asset it received stays
//! available through [`Pipeline::last_successful`].
//!
//! State machine: `Empty -> Building -> Validated -> Applied | Failed`.

use anyhow::anyhow;
use mediakit_core::{MediaKind, OperationError, OperationName, PipelineError, PipelineTypeError};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::asset::MediaAsset;
use crate::operation::{Operation, Parameters, ValidatedParameters};
use crate::registry::{Executor, OperationRegistry, RegisteredOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Empty,
    Building,
    Validated,
    Applied,
    Failed,
}

/// One operation with bound, validated parameters
#[derive(Clone)]
pub struct Stage {
    operation: Operation,
    params: ValidatedParameters,
    executor: Arc<dyn Executor>,
}

impl Stage {
    pub fn name(&self) -> OperationName {
        self.operation.name()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn params(&self) -> &ValidatedParameters {
        &self.params
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("operation", &self.operation.name())
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug)]
pub struct Pipeline {
    registry: Arc<OperationRegistry>,
    kind: MediaKind,
    stages: Vec<Stage>,
    state: PipelineState,
    last_successful: Option<MediaAsset>,
}

impl Pipeline {
    /// Empty pipeline for assets of `kind`
    pub fn new(registry: Arc<OperationRegistry>, kind: MediaKind) -> Self {
        Self {
            registry,
            kind,
            stages: Vec::new(),
            state: PipelineState::Empty,
            last_successful: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Kind of the asset the current stage sequence produces
    pub fn output_kind(&self) -> MediaKind {
        self.stages
            .iter()
            .fold(self.kind, |kind, stage| stage.operation.output_kind(kind))
    }

    /// Append a stage. Invalid parameters and operations that cannot accept
    /// the kind flowing into this position are rejected immediately and leave
    /// the pipeline unchanged.
    pub fn add_stage(
        &mut self,
        name: OperationName,
        params: &Parameters,
    ) -> Result<(), PipelineError> {
        let entry = self.registry.resolve(name)?.clone();
        self.push_stage(entry, params)
    }

    /// Append a stage by user-supplied operation name
    pub fn add_stage_str(&mut self, name: &str, params: &Parameters) -> Result<(), PipelineError> {
        let entry = self.registry.resolve_str(name)?.clone();
        self.push_stage(entry, params)
    }

    fn push_stage(
        &mut self,
        entry: RegisteredOperation,
        params: &Parameters,
    ) -> Result<(), PipelineError> {
        let operation = entry.operation().clone();
        let incoming = self.output_kind();
        if !operation.accepts(incoming) {
            return Err(PipelineTypeError::Stage {
                index: self.stages.len(),
                operation: operation.name(),
                accepts: operation.applies_to(),
                found: incoming,
            }
            .into());
        }

        let params = operation.validate_for(incoming, params)?;
        tracing::debug!(
            operation = %operation.name(),
            stage = self.stages.len(),
            "Stage added"
        );
        self.stages.push(Stage {
            operation,
            params,
            executor: entry.executor().clone(),
        });
        self.state = PipelineState::Building;
        self.last_successful = None;
        Ok(())
    }

    /// Drop every stage
    pub fn clear(&mut self) {
        self.stages.clear();
        self.state = PipelineState::Empty;
        self.last_successful = None;
    }

    /// Check the whole stage sequence against a concrete input
    pub fn validate(&mut self, input: &MediaAsset) -> Result<(), PipelineTypeError> {
        match self.check_sequence(input.kind()) {
            Ok(_) => {
                self.state = PipelineState::Validated;
                Ok(())
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    fn check_sequence(&self, input: MediaKind) -> Result<MediaKind, PipelineTypeError> {
        if input != self.kind {
            return Err(PipelineTypeError::InputKind {
                declared: self.kind,
                found: input,
            });
        }
        let mut kind = input;
        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.operation.accepts(kind) {
                return Err(PipelineTypeError::Stage {
                    index,
                    operation: stage.name(),
                    accepts: stage.operation.applies_to(),
                    found: kind,
                });
            }
            kind = stage.operation.output_kind(kind);
        }
        Ok(kind)
    }

    /// Run every stage in order on `input`
    pub fn apply(&mut self, input: MediaAsset) -> Result<MediaAsset, PipelineError> {
        self.apply_with_cancel(input, &CancellationToken::new())
    }

    /// Run every stage in order, checking `cancel` before each one.
    /// A cancelled run keeps the last finished intermediate.
    pub fn apply_with_cancel(
        &mut self,
        input: MediaAsset,
        cancel: &CancellationToken,
    ) -> Result<MediaAsset, PipelineError> {
        self.validate(&input)?;
        self.last_successful = None;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "pipeline",
            %run_id,
            kind = %self.kind,
            stages = self.stages.len()
        );
        let _guard = span.enter();
        let started = Instant::now();

        let mut current = input;
        for (index, stage) in self.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(completed = index, "Pipeline cancelled");
                self.state = PipelineState::Failed;
                self.last_successful = Some(current);
                return Err(PipelineError::Cancelled { completed: index });
            }

            let stage_started = Instant::now();
            tracing::debug!(stage = index, operation = %stage.name(), "Applying stage");

            let expected = stage.operation.output_kind(current.kind());
            let outcome = stage
                .executor
                .execute(&current, &stage.params)
                .and_then(|next| {
                    if next.kind() == expected {
                        Ok(next)
                    } else {
                        Err(anyhow!(
                            "Executor produced {} output, expected {}",
                            next.kind(),
                            expected
                        ))
                    }
                });

            match outcome {
                Ok(next) => {
                    tracing::debug!(
                        stage = index,
                        operation = %stage.name(),
                        elapsed_ms = stage_started.elapsed().as_millis() as u64,
                        "Stage completed"
                    );
                    current = next;
                }
                Err(source) => {
                    tracing::warn!(
                        stage = index,
                        operation = %stage.name(),
                        error = %source,
                        "Stage failed"
                    );
                    self.state = PipelineState::Failed;
                    self.last_successful = Some(current);
                    return Err(OperationError {
                        index,
                        operation: stage.name(),
                        source,
                    }
                    .into());
                }
            }
        }

        self.state = PipelineState::Applied;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_kind = %current.kind(),
            "Pipeline applied"
        );
        Ok(current)
    }

    /// Input of the stage that failed (or was about to run when cancelled)
    pub fn last_successful(&self) -> Option<&MediaAsset> {
        self.last_successful.as_ref()
    }

    pub fn take_last_successful(&mut self) -> Option<MediaAsset> {
        self.last_successful.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AudioAsset, AudioInfo};
    use crate::operation::params;
    use crate::scratch::ScratchSpace;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use mediakit_core::{Capabilities, MediaConfig, MediaFormat};

    fn image_asset() -> MediaAsset {
        MediaAsset::from_image(DynamicImage::ImageRgb8(RgbImage::from_fn(20, 10, |x, y| {
            Rgb([(x * 12) as u8, (y * 25) as u8, 200])
        })))
        .unwrap()
    }

    fn builtins() -> Arc<OperationRegistry> {
        Arc::new(OperationRegistry::with_builtins(&MediaConfig::default()).unwrap())
    }

    fn no_params() -> Parameters {
        Parameters::new()
    }

    #[test]
    fn test_state_transitions() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        assert_eq!(pipeline.state(), PipelineState::Empty);

        pipeline
            .add_stage(OperationName::Grayscale, &no_params())
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Building);

        let input = image_asset();
        pipeline.validate(&input).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Validated);

        pipeline.apply(input).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Applied);

        pipeline.clear();
        assert_eq!(pipeline.state(), PipelineState::Empty);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        let input = image_asset();
        assert_eq!(pipeline.apply(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_add_stage_rejects_wrong_kind() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        let err = pipeline
            .add_stage(OperationName::Trim, &params([("start", 0), ("end", 5)]))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Type(PipelineTypeError::Stage {
                index: 0,
                operation: OperationName::Trim,
                found: MediaKind::Image,
                ..
            })
        ));
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.state(), PipelineState::Empty);
    }

    #[test]
    fn test_kind_is_tracked_across_stages() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Video);
        pipeline
            .add_stage(OperationName::ExtractAudio, &no_params())
            .unwrap();
        assert_eq!(pipeline.output_kind(), MediaKind::Audio);

        let err = pipeline
            .add_stage(OperationName::Grayscale, &no_params())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Type(PipelineTypeError::Stage {
                index: 1,
                found: MediaKind::Audio,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_parameters_surface_immediately() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        let err = pipeline
            .add_stage(OperationName::Blur, &params([("kernel_size", 4)]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_unknown_operation_name() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        let err = pipeline.add_stage_str("vintage", &no_params()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownOperation(_)));
    }

    #[test]
    fn test_validate_rejects_input_of_other_kind() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Video);
        let err = pipeline.apply(image_asset()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Type(PipelineTypeError::InputKind {
                declared: MediaKind::Video,
                found: MediaKind::Image
            })
        ));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_failure_reports_stage_and_keeps_last_successful() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        pipeline
            .add_stage(OperationName::Grayscale, &no_params())
            .unwrap();
        // 20x10 input; x2 is out of bounds
        pipeline
            .add_stage(
                OperationName::Crop,
                &params([("x1", 0), ("y1", 0), ("x2", 50), ("y2", 5)]),
            )
            .unwrap();

        let err = pipeline.apply(image_asset()).unwrap_err();
        match err {
            PipelineError::Operation(e) => {
                assert_eq!(e.index, 1);
                assert_eq!(e.operation, OperationName::Crop);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(pipeline.state(), PipelineState::Failed);

        let last = pipeline.last_successful().unwrap();
        assert_eq!(last.color_space(), Some(mediakit_core::ColorSpace::Grayscale));
    }

    #[test]
    fn test_cancelled_before_first_stage() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        pipeline
            .add_stage(OperationName::Grayscale, &no_params())
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let input = image_asset();
        let err = pipeline.apply_with_cancel(input.clone(), &token).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { completed: 0 }));
        assert_eq!(pipeline.take_last_successful(), Some(input));
    }

    #[test]
    fn test_executor_changing_kind_is_an_operation_error() {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                Operation::new(OperationName::Sketch, Capabilities::IMAGE),
                |_: &MediaAsset, _: &ValidatedParameters| -> anyhow::Result<MediaAsset> {
                    let file = ScratchSpace::default().create("mp3")?;
                    let info = AudioInfo {
                        duration: 1.0,
                        codec: "mp3".to_string(),
                        sample_rate: None,
                        channels: None,
                    };
                    Ok(MediaAsset::Audio(AudioAsset::new(file, MediaFormat::Mp3, info)?))
                },
            )
            .unwrap();
        let mut pipeline = Pipeline::new(Arc::new(registry), MediaKind::Image);
        pipeline.add_stage(OperationName::Sketch, &no_params()).unwrap();

        let err = pipeline.apply(image_asset()).unwrap_err();
        assert!(err.to_string().contains("expected image"));
        assert!(matches!(err, PipelineError::Operation(_)));
    }

    #[test]
    fn test_two_stages_equal_sequential_application() {
        let registry = builtins();
        let blur = params([("kernel_size", 3)]);
        let rotate = params([("angle", 90)]);

        let mut combined = Pipeline::new(registry.clone(), MediaKind::Image);
        combined.add_stage(OperationName::Blur, &blur).unwrap();
        combined.add_stage(OperationName::Rotate, &rotate).unwrap();
        let together = combined.apply(image_asset()).unwrap();

        let mut first = Pipeline::new(registry.clone(), MediaKind::Image);
        first.add_stage(OperationName::Blur, &blur).unwrap();
        let mut second = Pipeline::new(registry, MediaKind::Image);
        second.add_stage(OperationName::Rotate, &rotate).unwrap();
        let separately = second.apply(first.apply(image_asset()).unwrap()).unwrap();

        assert_eq!(together, separately);
        assert_eq!(together.as_image().unwrap().image().dimensions(), (10, 20));
    }
}

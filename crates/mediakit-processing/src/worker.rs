//! Background pipeline execution
//!
//! Pipelines are synchronous and may block for a long time on video stages, so
//! jobs run on tokio's blocking pool behind a semaphore that bounds how many
//! run at once. Callers get a handle they can await or cancel.

use anyhow::Context;
use mediakit_core::PipelineError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::asset::MediaAsset;
use crate::pipeline::Pipeline;

/// A finished job: the pipeline (with its final state) and the run result
#[derive(Debug)]
pub struct JobOutcome {
    pub pipeline: Pipeline,
    pub result: Result<MediaAsset, PipelineError>,
}

impl JobOutcome {
    pub fn into_result(self) -> Result<MediaAsset, PipelineError> {
        self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Intermediate kept by a failed or cancelled run
    pub fn last_successful(&self) -> Option<&MediaAsset> {
        self.pipeline.last_successful()
    }
}

/// Handle to a pipeline running in the background
#[derive(Debug)]
pub struct PipelineJob {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<JobOutcome>>,
}

impl PipelineJob {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the job to stop before its next stage
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job. The outer error means the job itself died
    /// (panic or runtime shutdown); pipeline failures are in the outcome.
    pub async fn wait(self) -> anyhow::Result<JobOutcome> {
        self.handle
            .await
            .with_context(|| format!("Pipeline job {} did not complete", self.id))?
    }
}

#[derive(Debug, Clone)]
pub struct PipelineWorker {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl PipelineWorker {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Free job slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `pipeline` on `input` in the background. Must be called from within
    /// a tokio runtime.
    pub fn spawn(&self, pipeline: Pipeline, input: MediaAsset) -> PipelineJob {
        self.spawn_with_token(pipeline, input, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), cancelled through `cancel` (for example a
    /// child of a shutdown token).
    pub fn spawn_with_token(
        &self,
        mut pipeline: Pipeline,
        input: MediaAsset,
        cancel: CancellationToken,
    ) -> PipelineJob {
        let id = Uuid::new_v4();
        let token = cancel.clone();
        let semaphore = self.semaphore.clone();
        let span = tracing::info_span!(
            "pipeline_job",
            job.id = %id,
            kind = %pipeline.kind(),
            stages = pipeline.len()
        );

        let handle = tokio::spawn(
            async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .context("Pipeline worker is closed")?;
                tracing::debug!("Job started");

                let span = tracing::Span::current();
                let outcome = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    span.in_scope(|| {
                        let result = pipeline.apply_with_cancel(input, &token);
                        JobOutcome { pipeline, result }
                    })
                })
                .await
                .context("Pipeline job panicked")?;

                match &outcome.result {
                    Ok(_) => tracing::info!("Job finished"),
                    Err(e) => tracing::warn!(error = %e, "Job failed"),
                }
                Ok(outcome)
            }
            .instrument(span),
        );

        PipelineJob { id, cancel, handle }
    }
}

impl Default for PipelineWorker {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::new(parallelism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{params, Operation, Parameters, ValidatedParameters};
    use crate::pipeline::PipelineState;
    use crate::registry::OperationRegistry;
    use image::{DynamicImage, RgbImage};
    use mediakit_core::{Capabilities, ColorSpace, MediaConfig, MediaKind, OperationName};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn rgb(width: u32, height: u32) -> MediaAsset {
        MediaAsset::from_image(DynamicImage::ImageRgb8(RgbImage::new(width, height))).unwrap()
    }

    fn builtins() -> Arc<OperationRegistry> {
        Arc::new(OperationRegistry::with_builtins(&MediaConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_job_applies_pipeline() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        pipeline
            .add_stage(OperationName::Grayscale, &Parameters::new())
            .unwrap();
        pipeline
            .add_stage(OperationName::Resize, &params([("width", 8), ("height", 4)]))
            .unwrap();

        let job = PipelineWorker::new(2).spawn(pipeline, rgb(16, 16));
        let outcome = job.wait().await.unwrap();

        assert!(outcome.is_ok());
        assert_eq!(outcome.pipeline.state(), PipelineState::Applied);
        let output = outcome.into_result().unwrap();
        assert_eq!(output.color_space(), Some(ColorSpace::Grayscale));
        assert_eq!(output.dimensions().map(|d| (d.width, d.height)), Some((8, 4)));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let mut pipeline = Pipeline::new(builtins(), MediaKind::Image);
        pipeline
            .add_stage(OperationName::Grayscale, &Parameters::new())
            .unwrap();

        let input = rgb(4, 4);
        let job = PipelineWorker::new(1).spawn(pipeline, input.clone());
        job.cancel();
        assert!(job.is_cancelled());

        let outcome = job.wait().await.unwrap();
        assert!(matches!(
            outcome.result,
            Err(PipelineError::Cancelled { completed: 0 })
        ));
        assert_eq!(outcome.last_successful(), Some(&input));
        assert_eq!(outcome.pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_between_stages_keeps_intermediate() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let mut registry = OperationRegistry::new();
        registry
            .register(
                Operation::new(OperationName::Grayscale, Capabilities::IMAGE),
                move |input: &MediaAsset, _: &ValidatedParameters| -> anyhow::Result<MediaAsset> {
                    trigger.cancel();
                    let image = input.as_image().context("expected image")?;
                    MediaAsset::from_image(image.image().grayscale()).map_err(anyhow::Error::from)
                },
            )
            .unwrap();
        registry
            .register(
                Operation::new(OperationName::Sketch, Capabilities::IMAGE),
                |_: &MediaAsset, _: &ValidatedParameters| -> anyhow::Result<MediaAsset> {
                    Err(anyhow::anyhow!("must not run after cancellation"))
                },
            )
            .unwrap();

        let mut pipeline = Pipeline::new(Arc::new(registry), MediaKind::Image);
        pipeline
            .add_stage(OperationName::Grayscale, &Parameters::new())
            .unwrap();
        pipeline
            .add_stage(OperationName::Sketch, &Parameters::new())
            .unwrap();

        let job = PipelineWorker::new(1).spawn_with_token(pipeline, rgb(4, 4), cancel);
        let outcome = job.wait().await.unwrap();

        assert!(matches!(
            outcome.result,
            Err(PipelineError::Cancelled { completed: 1 })
        ));
        let kept = outcome.last_successful().unwrap();
        assert_eq!(kept.color_space(), Some(ColorSpace::Grayscale));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut registry = OperationRegistry::new();
        {
            let running = running.clone();
            let peak = peak.clone();
            registry
                .register(
                    Operation::new(OperationName::Grayscale, Capabilities::IMAGE),
                    move |input: &MediaAsset,
                          _: &ValidatedParameters|
                          -> anyhow::Result<MediaAsset> {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(30));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(input.clone())
                    },
                )
                .unwrap();
        }
        let registry = Arc::new(registry);

        let worker = PipelineWorker::new(2);
        assert_eq!(worker.available(), 2);

        let jobs: Vec<PipelineJob> = (0..6)
            .map(|_| {
                let mut pipeline = Pipeline::new(registry.clone(), MediaKind::Image);
                pipeline
                    .add_stage(OperationName::Grayscale, &Parameters::new())
                    .unwrap();
                worker.spawn(pipeline, rgb(2, 2))
            })
            .collect();

        for job in jobs {
            assert!(job.wait().await.unwrap().is_ok());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(worker.available(), 2);
    }

    #[test]
    fn test_zero_concurrency_is_raised_to_one() {
        assert_eq!(PipelineWorker::new(0).max_concurrent(), 1);
    }
}

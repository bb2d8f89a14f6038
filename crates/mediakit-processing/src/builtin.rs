//! Built-in operation catalogue and executor bindings

use anyhow::{anyhow, Result};
use image::DynamicImage;
use mediakit_core::{
    Capabilities, DuplicateOperationError, MediaConfig, MediaFormat, MediaKind, OperationName,
};

use crate::asset::{MediaAsset, VideoAsset};
use crate::image::{ColorFilter, ImageFilters, ImageGeometry};
use crate::operation::{Operation, ParamSpec, ValidatedParameters};
use crate::registry::{Executor, OperationRegistry};
use crate::video::{FfmpegTools, VideoOps};

const MAX_SIDE: i64 = 16384;
const MAX_COORD: i64 = 65535;
const MAX_SECONDS: f64 = 86400.0;

/// Schemas of every built-in operation, in catalogue order
pub fn catalogue() -> Vec<Operation> {
    OperationName::ALL.iter().map(|name| schema(*name)).collect()
}

/// Schema of one built-in operation
pub fn schema(name: OperationName) -> Operation {
    match name {
        OperationName::Grayscale => Operation::new(name, Capabilities::VISUAL)
            .with_summary("Convert to single-channel luma"),
        OperationName::Blur => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Gaussian blur")
            .with_param(
                ParamSpec::integer("kernel_size", 1, 21)
                    .odd_only()
                    .with_default(5)
                    .with_description("Odd kernel size in pixels"),
            ),
        OperationName::EdgeDetect => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Canny edge detection")
            .with_param(
                ParamSpec::integer("threshold1", 0, 255)
                    .with_default(50)
                    .with_description("Lower hysteresis threshold"),
            )
            .with_param(
                ParamSpec::integer("threshold2", 0, 255)
                    .with_default(150)
                    .with_description("Upper hysteresis threshold"),
            ),
        OperationName::Upscale => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Cubic upscale by an integer factor")
            .with_param(ParamSpec::integer("factor", 1, 4).with_default(2)),
        OperationName::Resize => Operation::new(name, Capabilities::VISUAL)
            .with_summary("Resize to exact dimensions")
            .with_param(
                ParamSpec::integer("width", 1, MAX_SIDE).with_description("Width in pixels"),
            )
            .with_param(
                ParamSpec::integer("height", 1, MAX_SIDE).with_description("Height in pixels"),
            )
            .with_kind_constraint(video_dimensions_are_even),
        OperationName::Rotate => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Rotate counter-clockwise, expanding the canvas")
            .with_param(
                ParamSpec::integer("angle", 0, 360)
                    .with_default(0)
                    .with_description("Degrees"),
            ),
        OperationName::Crop => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Keep the region [x1, x2) x [y1, y2)")
            .with_param(ParamSpec::integer("x1", 0, MAX_COORD))
            .with_param(ParamSpec::integer("y1", 0, MAX_COORD))
            .with_param(ParamSpec::integer("x2", 0, MAX_COORD))
            .with_param(ParamSpec::integer("y2", 0, MAX_COORD))
            .with_constraint(crop_region_is_ordered),
        OperationName::BrightnessContrast => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Scale by alpha, shift by beta")
            .with_param(
                ParamSpec::float("alpha", 0.5, 3.0)
                    .with_default(1.0)
                    .with_description("Contrast gain"),
            )
            .with_param(
                ParamSpec::integer("beta", -100, 100)
                    .with_default(0)
                    .with_description("Brightness offset"),
            ),
        OperationName::Denoise => Operation::new(name, Capabilities::IMAGE)
            .with_summary("Median-filter noise removal")
            .with_param(ParamSpec::integer("strength", 1, 10).with_default(3)),
        OperationName::Sketch => {
            Operation::new(name, Capabilities::IMAGE).with_summary("Pencil sketch")
        }
        OperationName::ColorFilter => Operation::new(name, Capabilities::VISUAL)
            .with_summary("Sepia, negative or brightness tone")
            .with_param(ParamSpec::choice("filter", &ColorFilter::OPTIONS))
            .with_param(
                ParamSpec::float("factor", 0.1, 2.0)
                    .with_default(1.0)
                    .with_description("Brightness multiplier"),
            ),
        OperationName::Trim => Operation::new(name, Capabilities::VIDEO)
            .with_summary("Keep the span [start, end) in seconds")
            .with_param(ParamSpec::float("start", 0.0, MAX_SECONDS))
            .with_param(ParamSpec::float("end", 0.0, MAX_SECONDS))
            .with_constraint(trim_span_is_ordered),
        OperationName::ExtractAudio => extract_audio_schema(&[
            MediaFormat::Mp3,
            MediaFormat::Aac,
            MediaFormat::Wav,
        ]),
    }
}

/// `extract-audio` offering only the audio formats in `enabled`.
/// Defaults to mp3 when it is enabled, otherwise to the first enabled format.
fn extract_audio_schema(enabled: &[MediaFormat]) -> Operation {
    let options: Vec<&'static str> = enabled.iter().map(|f| f.extension()).collect();
    let mut format = ParamSpec::choice("format", &options);
    if let Some(default) = enabled
        .iter()
        .find(|f| **f == MediaFormat::Mp3)
        .or_else(|| enabled.first())
    {
        format = format.with_default(default.extension());
    }

    Operation::new(OperationName::ExtractAudio, Capabilities::VIDEO)
        .with_output(MediaKind::Audio)
        .with_summary("Keep only the audio track")
        .with_param(format)
}

fn crop_region_is_ordered(params: &ValidatedParameters) -> Result<(), String> {
    let get = |name| params.int(name).map_err(|e| e.to_string());
    let (x1, y1, x2, y2) = (get("x1")?, get("y1")?, get("x2")?, get("y2")?);
    if x2 <= x1 {
        return Err(format!("x2 ({}) must be greater than x1 ({})", x2, x1));
    }
    if y2 <= y1 {
        return Err(format!("y2 ({}) must be greater than y1 ({})", y2, y1));
    }
    Ok(())
}

/// Most video encoders need even dimensions for 4:2:0 output
fn video_dimensions_are_even(kind: MediaKind, params: &ValidatedParameters) -> Result<(), String> {
    if kind != MediaKind::Video {
        return Ok(());
    }
    let width = params.int("width").map_err(|e| e.to_string())?;
    let height = params.int("height").map_err(|e| e.to_string())?;
    if width % 2 != 0 || height % 2 != 0 {
        return Err(format!("Video dimensions must be even, got {}x{}", width, height));
    }
    Ok(())
}

fn trim_span_is_ordered(params: &ValidatedParameters) -> Result<(), String> {
    let start = params.float("start").map_err(|e| e.to_string())?;
    let end = params.float("end").map_err(|e| e.to_string())?;
    if end <= start {
        return Err(format!("end ({}) must be greater than start ({})", end, start));
    }
    Ok(())
}

/// Register every built-in operation, with video executors bound to the
/// configured ffmpeg tools
pub fn register_builtins(
    registry: &mut OperationRegistry,
    config: &MediaConfig,
) -> Result<(), DuplicateOperationError> {
    register_builtins_with(registry, config, FfmpegTools::from_config(config))
}

/// Like [`register_builtins`] with explicitly supplied ffmpeg tools
pub fn register_builtins_with(
    registry: &mut OperationRegistry,
    config: &MediaConfig,
    tools: FfmpegTools,
) -> Result<(), DuplicateOperationError> {
    let video = VideoOps::new(tools);

    for name in OperationName::ALL {
        let operation = match name {
            OperationName::ExtractAudio => extract_audio_schema(&config.audio_formats),
            _ => schema(name),
        };
        match name {
            OperationName::Grayscale => {
                let v = video.clone();
                registry.register(
                    operation,
                    visual_op(
                        |img, _| Ok(ImageFilters::grayscale(img)),
                        move |clip, _| Ok(MediaAsset::Video(v.grayscale(clip)?)),
                    ),
                )?
            }
            OperationName::Blur => registry.register(
                operation,
                image_op(|img, p| Ok(ImageFilters::gaussian_blur(img, p.uint("kernel_size")?))),
            )?,
            OperationName::EdgeDetect => registry.register(
                operation,
                image_op(|img, p| {
                    Ok(ImageFilters::edge_detect(
                        img,
                        p.int("threshold1")? as f32,
                        p.int("threshold2")? as f32,
                    ))
                }),
            )?,
            OperationName::Upscale => registry.register(
                operation,
                image_op(|img, p| ImageGeometry::upscale(img, p.uint("factor")?)),
            )?,
            OperationName::Resize => {
                let v = video.clone();
                registry.register(
                    operation,
                    visual_op(
                        |img, p| {
                            let (width, height) = (p.uint("width")?, p.uint("height")?);
                            Ok(ImageGeometry::resize(img, width, height))
                        },
                        move |clip, p| {
                            Ok(MediaAsset::Video(v.resize(
                                clip,
                                p.uint("width")?,
                                p.uint("height")?,
                            )?))
                        },
                    ),
                )?
            }
            OperationName::Rotate => registry.register(
                operation,
                image_op(|img, p| Ok(ImageGeometry::rotate(img, p.uint("angle")?))),
            )?,
            OperationName::Crop => registry.register(
                operation,
                image_op(|img, p| {
                    let (x1, y1) = (p.uint("x1")?, p.uint("y1")?);
                    ImageGeometry::crop(img, x1, y1, p.uint("x2")?, p.uint("y2")?)
                }),
            )?,
            OperationName::BrightnessContrast => registry.register(
                operation,
                image_op(|img, p| {
                    Ok(ImageFilters::brightness_contrast(
                        img,
                        p.float("alpha")? as f32,
                        p.int("beta")? as f32,
                    ))
                }),
            )?,
            OperationName::Denoise => registry.register(
                operation,
                image_op(|img, p| Ok(ImageFilters::denoise(img, p.uint("strength")?))),
            )?,
            OperationName::Sketch => {
                registry.register(operation, image_op(|img, _| Ok(ImageFilters::sketch(img))))?
            }
            OperationName::ColorFilter => {
                let v = video.clone();
                registry.register(
                    operation,
                    visual_op(
                        |img, p| {
                            let filter = ColorFilter::parse(p.text("filter")?)?;
                            Ok(ImageFilters::color_filter(img, filter, p.float("factor")? as f32))
                        },
                        move |clip, p| {
                            let filter = ColorFilter::parse(p.text("filter")?)?;
                            Ok(MediaAsset::Video(v.color_filter(
                                clip,
                                filter,
                                p.float("factor")? as f32,
                            )?))
                        },
                    ),
                )?
            }
            OperationName::Trim => {
                let v = video.clone();
                registry.register(
                    operation,
                    video_op(move |clip, p| {
                        Ok(MediaAsset::Video(v.trim(clip, p.float("start")?, p.float("end")?)?))
                    }),
                )?
            }
            OperationName::ExtractAudio => {
                let v = video.clone();
                registry.register(
                    operation,
                    video_op(move |clip, p| {
                        let format = MediaFormat::parse(p.text("format")?).map_err(|e| anyhow!(e))?;
                        Ok(MediaAsset::Audio(v.extract_audio(clip, format)?))
                    }),
                )?
            }
        }
    }

    Ok(())
}

fn mismatch(expected: &str, input: &MediaAsset) -> anyhow::Error {
    anyhow!("Expected {} input, got {}", expected, input.kind())
}

/// Executor for image-only operations
fn image_op<I>(image_fn: I) -> impl Executor
where
    I: Fn(&DynamicImage, &ValidatedParameters) -> Result<DynamicImage> + Send + Sync + 'static,
{
    move |input: &MediaAsset, params: &ValidatedParameters| -> Result<MediaAsset> {
        let image = input.as_image().ok_or_else(|| mismatch("image", input))?;
        Ok(MediaAsset::from_image(image_fn(image.image(), params)?)?)
    }
}

/// Executor for video-only operations
fn video_op<V>(video_fn: V) -> impl Executor
where
    V: Fn(&VideoAsset, &ValidatedParameters) -> Result<MediaAsset> + Send + Sync + 'static,
{
    move |input: &MediaAsset, params: &ValidatedParameters| -> Result<MediaAsset> {
        let video = input.as_video().ok_or_else(|| mismatch("video", input))?;
        video_fn(video, params)
    }
}

/// Executor for operations with both an image and a video implementation
fn visual_op<I, V>(image_fn: I, video_fn: V) -> impl Executor
where
    I: Fn(&DynamicImage, &ValidatedParameters) -> Result<DynamicImage> + Send + Sync + 'static,
    V: Fn(&VideoAsset, &ValidatedParameters) -> Result<MediaAsset> + Send + Sync + 'static,
{
    move |input: &MediaAsset, params: &ValidatedParameters| -> Result<MediaAsset> {
        match input {
            MediaAsset::Image(image) => {
                Ok(MediaAsset::from_image(image_fn(image.image(), params)?)?)
            }
            MediaAsset::Video(video) => video_fn(video, params),
            MediaAsset::Audio(_) => Err(mismatch("image or video", input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::params;
    use mediakit_core::ValidationError;

    #[test]
    fn test_catalogue_matches_names() {
        let names: Vec<_> = catalogue().iter().map(|op| op.name()).collect();
        assert_eq!(names, OperationName::ALL.to_vec());
    }

    #[test]
    fn test_capabilities() {
        assert!(schema(OperationName::Grayscale).accepts(MediaKind::Video));
        assert!(schema(OperationName::Resize).accepts(MediaKind::Video));
        assert!(schema(OperationName::ColorFilter).accepts(MediaKind::Video));
        assert!(!schema(OperationName::Blur).accepts(MediaKind::Video));
        assert!(!schema(OperationName::Trim).accepts(MediaKind::Image));
        assert_eq!(
            schema(OperationName::ExtractAudio).output_kind(MediaKind::Video),
            MediaKind::Audio
        );
    }

    #[test]
    fn test_every_range_is_boundary_inclusive() {
        use crate::operation::{ParamKind, ParamValue};

        for op in catalogue() {
            for spec in op.parameters() {
                match &spec.kind {
                    ParamKind::Integer { min, max, odd_only } => {
                        let inside = |v: i64| !*odd_only || v % 2 != 0;
                        for v in [*min, *max] {
                            if inside(v) {
                                assert!(spec.check(op.name(), &ParamValue::Int(v)).is_ok());
                            }
                        }
                        assert!(spec.check(op.name(), &ParamValue::Int(min - 1)).is_err());
                        assert!(spec.check(op.name(), &ParamValue::Int(max + 1)).is_err());
                    }
                    ParamKind::Float { min, max } => {
                        assert!(spec.check(op.name(), &ParamValue::Float(*min)).is_ok());
                        assert!(spec.check(op.name(), &ParamValue::Float(*max)).is_ok());
                        assert!(spec.check(op.name(), &ParamValue::Float(min - 0.01)).is_err());
                        assert!(spec.check(op.name(), &ParamValue::Float(max + 0.01)).is_err());
                    }
                    ParamKind::Choice { options } => {
                        for option in options {
                            assert!(spec.check(op.name(), &ParamValue::from(*option)).is_ok());
                        }
                        assert!(spec.check(op.name(), &ParamValue::from("nope")).is_err());
                    }
                }
            }
        }
    }

    #[test]
    fn test_blur_rejects_even_kernel() {
        let blur = schema(OperationName::Blur);
        assert!(matches!(
            blur.validate(&params([("kernel_size", 4)])),
            Err(ValidationError::NotOdd { value: 4, .. })
        ));
        assert!(blur.validate(&params([("kernel_size", 5)])).is_ok());
    }

    #[test]
    fn test_rotate_rejects_450() {
        let err = schema(OperationName::Rotate)
            .validate(&params([("angle", 450)]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_crop_requires_ordered_region() {
        let crop = schema(OperationName::Crop);
        assert!(crop
            .validate(&params([("x1", 0), ("y1", 0), ("x2", 10), ("y2", 10)]))
            .is_ok());
        let err = crop
            .validate(&params([("x1", 10), ("y1", 0), ("x2", 10), ("y2", 10)]))
            .unwrap_err();
        assert!(err.to_string().contains("x2 (10) must be greater than x1 (10)"));
    }

    #[test]
    fn test_trim_requires_end_after_start() {
        let trim = schema(OperationName::Trim);
        assert!(trim.validate(&params([("start", 0), ("end", 5)])).is_ok());
        assert!(matches!(
            trim.validate(&params([("start", 5.0), ("end", 2.0)])),
            Err(ValidationError::Constraint { .. })
        ));
    }

    #[test]
    fn test_extract_audio_defaults_to_mp3() {
        let validated = schema(OperationName::ExtractAudio)
            .validate(&params::<_, &str, &str>([]))
            .unwrap();
        assert_eq!(validated.text("format").unwrap(), "mp3");
    }

    #[test]
    fn test_video_resize_requires_even_dimensions() {
        let resize = schema(OperationName::Resize);
        let odd = params([("width", 641), ("height", 480)]);
        assert!(resize.validate_for(MediaKind::Image, &odd).is_ok());
        let err = resize.validate_for(MediaKind::Video, &odd).unwrap_err();
        assert!(matches!(err, ValidationError::Constraint { .. }));
        assert!(err.to_string().contains("641x480"));
        assert!(resize
            .validate_for(MediaKind::Video, &params([("width", 640), ("height", 480)]))
            .is_ok());
    }

    #[test]
    fn test_extract_audio_offers_only_enabled_formats() {
        let op = extract_audio_schema(&[MediaFormat::Wav, MediaFormat::Aac]);
        let validated = op.validate(&params::<_, &str, &str>([])).unwrap();
        assert_eq!(validated.text("format").unwrap(), "wav");
        assert!(matches!(
            op.validate(&params([("format", "mp3")])),
            Err(ValidationError::InvalidChoice { .. })
        ));
        assert!(op.validate(&params([("format", "aac")])).is_ok());
    }

    #[test]
    fn test_registered_extract_audio_follows_config() {
        let config = MediaConfig {
            audio_formats: vec![MediaFormat::Wav],
            ..MediaConfig::default()
        };
        let registry = OperationRegistry::with_builtins(&config).unwrap();
        let entry = registry.resolve(OperationName::ExtractAudio).unwrap();
        let validated = entry
            .operation()
            .validate(&params::<_, &str, &str>([]))
            .unwrap();
        assert_eq!(validated.text("format").unwrap(), "wav");
        assert!(entry
            .operation()
            .validate(&params([("format", "mp3")]))
            .is_err());
    }

    #[test]
    fn test_color_filter_requires_filter() {
        assert!(matches!(
            schema(OperationName::ColorFilter).validate(&params([("factor", 1.5)])),
            Err(ValidationError::MissingParameter { .. })
        ));
    }
}

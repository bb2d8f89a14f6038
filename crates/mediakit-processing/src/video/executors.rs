//! Video and audio executors
//!
//! Each executor renders a new scratch file with ffmpeg and derives the
//! output's stream properties from the operation instead of probing again.

use anyhow::{anyhow, Result};
use mediakit_core::{ColorSpace, Dimensions, MediaFormat};

use crate::asset::{AudioAsset, AudioInfo, VideoAsset, VideoInfo};
use crate::image::ColorFilter;
use crate::video::ffmpeg::FfmpegTools;

#[derive(Debug, Clone)]
pub struct VideoOps {
    tools: FfmpegTools,
}

impl VideoOps {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    /// Re-encode `video` through an ffmpeg `-vf` filter chain
    fn filter(
        &self,
        operation: &str,
        video: &VideoAsset,
        filter: String,
        info: VideoInfo,
    ) -> Result<VideoAsset> {
        let format = video.format();
        let encode = self.tools.video_encode_args(format);
        let output = self.tools.render(
            operation,
            video.source().path(),
            format.extension(),
            |input, output| {
                let mut args = vec![
                    "-y".to_string(),
                    "-i".to_string(),
                    input,
                    "-vf".to_string(),
                    filter,
                ];
                args.extend(encode);
                args.extend(["-c:a".to_string(), "copy".to_string(), output]);
                args
            },
        )?;
        Ok(VideoAsset::new(output, format, info)?)
    }

    pub fn grayscale(&self, video: &VideoAsset) -> Result<VideoAsset> {
        let info = VideoInfo {
            color_space: ColorSpace::Grayscale,
            ..video.info().clone()
        };
        self.filter("grayscale", video, "hue=s=0".to_string(), info)
    }

    /// Exact resize; most encoders need even dimensions for 4:2:0 output
    pub fn resize(&self, video: &VideoAsset, width: u32, height: u32) -> Result<VideoAsset> {
        if width % 2 != 0 || height % 2 != 0 {
            return Err(anyhow!(
                "Video dimensions must be even, got {}x{}",
                width,
                height
            ));
        }
        let info = VideoInfo {
            dimensions: Dimensions::new(width, height),
            ..video.info().clone()
        };
        self.filter("resize", video, format!("scale={}:{}", width, height), info)
    }

    pub fn color_filter(
        &self,
        video: &VideoAsset,
        filter: ColorFilter,
        factor: f32,
    ) -> Result<VideoAsset> {
        let chain = match filter {
            ColorFilter::Sepia => {
                "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131".to_string()
            }
            ColorFilter::Invert => "negate".to_string(),
            ColorFilter::Brightness => {
                format!("colorchannelmixer=rr={f}:gg={f}:bb={f}", f = factor)
            }
        };
        let color_space = match (filter, video.info().color_space) {
            (ColorFilter::Sepia, ColorSpace::Grayscale) => ColorSpace::Rgb,
            (ColorFilter::Sepia, ColorSpace::GrayscaleAlpha) => ColorSpace::Rgba,
            (_, current) => current,
        };
        let info = VideoInfo {
            color_space,
            ..video.info().clone()
        };
        self.filter("color-filter", video, chain, info)
    }

    /// Keep `[start, end)` seconds. `end` is clamped to the duration.
    pub fn trim(&self, video: &VideoAsset, start: f64, end: f64) -> Result<VideoAsset> {
        let duration = video.info().duration;
        if start >= duration {
            return Err(anyhow!(
                "Trim start {:.3}s is beyond the video duration {:.3}s",
                start,
                duration
            ));
        }
        // ffmpeg receives millisecond precision; the asset reports the same span
        let length = ((end.min(duration) - start) * 1000.0).floor() / 1000.0;
        if length < 0.001 {
            return Err(anyhow!(
                "Trim span from {:.3}s is shorter than 1ms after clamping to {:.3}s",
                start,
                duration
            ));
        }

        let format = video.format();
        let encode = self.tools.video_encode_args(format);
        let output = self.tools.render(
            "trim",
            video.source().path(),
            format.extension(),
            |input, output| {
                let mut args = vec![
                    "-y".to_string(),
                    "-ss".to_string(),
                    format!("{:.3}", start),
                    "-i".to_string(),
                    input,
                    "-t".to_string(),
                    format!("{:.3}", length),
                ];
                args.extend(encode);
                args.extend(["-c:a".to_string(), "copy".to_string(), output]);
                args
            },
        )?;

        let info = VideoInfo {
            duration: length,
            ..video.info().clone()
        };
        Ok(VideoAsset::new(output, format, info)?)
    }

    /// Drop the picture track and keep the audio as `format`
    pub fn extract_audio(&self, video: &VideoAsset, format: MediaFormat) -> Result<AudioAsset> {
        if !video.info().has_audio {
            return Err(anyhow!("Video has no audio track"));
        }
        let output = self.tools.transcode_audio(video.source().path(), format)?;
        let codec = match format {
            MediaFormat::Wav => "pcm_s16le",
            other => other.extension(),
        };
        let info = AudioInfo {
            duration: video.info().duration,
            codec: codec.to_string(),
            sample_rate: None,
            channels: None,
        };
        Ok(AudioAsset::new(output, format, info)?)
    }
}

//! Decode uploads into assets and encode assets into artefacts

use anyhow::Context;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use mediakit_core::{
    ColorSpace, DecodeError, EncodeError, MediaConfig, MediaFormat, MediaKind,
};
use std::io::Cursor;

use crate::asset::{AudioAsset, ImageAsset, MediaAsset, VideoAsset};
use crate::scratch::ScratchFile;
use crate::video::FfmpegTools;

/// Codec layer bound to the configured format sets, size limits and tools
#[derive(Debug, Clone)]
pub struct MediaCodec {
    config: MediaConfig,
    tools: FfmpegTools,
}

impl MediaCodec {
    pub fn new(config: &MediaConfig) -> Self {
        Self::with_tools(config, FfmpegTools::from_config(config))
    }

    pub fn with_tools(config: &MediaConfig, tools: FfmpegTools) -> Self {
        Self {
            config: config.clone(),
            tools,
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    /// Decode raw bytes declared as `format`
    pub fn decode(&self, bytes: &[u8], format: MediaFormat) -> Result<MediaAsset, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if !self.config.supports_format(format) {
            return Err(DecodeError::UnsupportedFormat { format });
        }
        let max = self.config.max_input_bytes(format.kind());
        if bytes.len() > max {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                max,
            });
        }

        let asset = match format.kind() {
            MediaKind::Image => {
                let image_format = image_format(format)
                    .ok_or(DecodeError::UnsupportedFormat { format })?;
                let image = image::load_from_memory_with_format(bytes, image_format)
                    .map_err(|e| DecodeError::Corrupt {
                        format,
                        source: e.into(),
                    })?;
                MediaAsset::Image(ImageAsset::new(image)?)
            }
            MediaKind::Video => {
                let file = self.stage_upload(bytes, format)?;
                let info = self
                    .tools
                    .probe_video(file.path())
                    .map_err(|source| DecodeError::Corrupt { format, source })?;
                MediaAsset::Video(VideoAsset::new(file, format, info)?)
            }
            MediaKind::Audio => {
                let file = self.stage_upload(bytes, format)?;
                let info = self
                    .tools
                    .probe_audio(file.path())
                    .map_err(|source| DecodeError::Corrupt { format, source })?;
                MediaAsset::Audio(AudioAsset::new(file, format, info)?)
            }
        };

        tracing::debug!(
            format = %format,
            size_bytes = bytes.len(),
            kind = %asset.kind(),
            "Decoded upload"
        );
        Ok(asset)
    }

    fn stage_upload(&self, bytes: &[u8], format: MediaFormat) -> Result<ScratchFile, DecodeError> {
        self.tools
            .scratch()
            .write(bytes, format.extension())
            .context("Failed to write scratch file")
            .map_err(|source| DecodeError::Corrupt { format, source })
    }

    /// Encode the whole asset into one buffer
    pub fn encode(&self, asset: &MediaAsset, format: MediaFormat) -> Result<Bytes, EncodeError> {
        match asset {
            MediaAsset::Image(image) => self.encode_image(image, format),
            _ => {
                let file = self.render_file(asset, format)?;
                let data = std::fs::read(file.path())
                    .context("Failed to read rendered file")
                    .map_err(|source| EncodeError::Failed { format, source })?;
                Ok(Bytes::from(data))
            }
        }
    }

    pub fn encode_image(
        &self,
        image: &ImageAsset,
        format: MediaFormat,
    ) -> Result<Bytes, EncodeError> {
        self.check_target(MediaKind::Image, format)?;
        let image_format = image_format(format).ok_or(EncodeError::Unsupported {
            kind: MediaKind::Image,
            format,
        })?;

        let prepared = prepare_for(image.image(), image.color_space(), format);
        let mut buffer = Vec::new();
        let result = if format == MediaFormat::Jpeg {
            let encoder = JpegEncoder::new_with_quality(
                &mut buffer,
                self.config.export_quality.jpeg_quality(),
            );
            prepared.write_with_encoder(encoder)
        } else {
            prepared.write_to(&mut Cursor::new(&mut buffer), image_format)
        };
        result.map_err(|e| EncodeError::Failed {
            format,
            source: e.into(),
        })?;

        tracing::debug!(format = %format, size_bytes = buffer.len(), "Encoded image");
        Ok(Bytes::from(buffer))
    }

    /// Produce a file holding a video or audio asset in `format`.
    /// Returns the asset's own file when no transcoding is needed.
    pub fn render_file(
        &self,
        asset: &MediaAsset,
        format: MediaFormat,
    ) -> Result<ScratchFile, EncodeError> {
        self.check_target(asset.kind(), format)?;
        let failed = |source| EncodeError::Failed { format, source };
        match asset {
            MediaAsset::Image(_) => Err(EncodeError::Unsupported {
                kind: MediaKind::Image,
                format,
            }),
            MediaAsset::Video(video) if video.format() == format => Ok(video.source().clone()),
            MediaAsset::Video(video) => self
                .tools
                .transcode_video(video.source().path(), format)
                .map_err(failed),
            MediaAsset::Audio(audio) if audio.format() == format => Ok(audio.source().clone()),
            MediaAsset::Audio(audio) => self
                .tools
                .transcode_audio(audio.source().path(), format)
                .map_err(failed),
        }
    }

    fn check_target(&self, kind: MediaKind, format: MediaFormat) -> Result<(), EncodeError> {
        if format.kind() != kind {
            return Err(EncodeError::Unsupported { kind, format });
        }
        if !self.config.supports_format(format) {
            return Err(EncodeError::FormatDisabled { format });
        }
        Ok(())
    }
}

fn image_format(format: MediaFormat) -> Option<ImageFormat> {
    match format {
        MediaFormat::Png => Some(ImageFormat::Png),
        MediaFormat::Jpeg => Some(ImageFormat::Jpeg),
        MediaFormat::WebP => Some(ImageFormat::WebP),
        MediaFormat::Gif => Some(ImageFormat::Gif),
        MediaFormat::Bmp => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Convert to an 8-bit layout the target encoder accepts
fn prepare_for(image: &DynamicImage, color_space: ColorSpace, format: MediaFormat) -> DynamicImage {
    use ColorSpace::*;
    match (format, color_space) {
        // JPEG has no alpha channel
        (MediaFormat::Jpeg, Grayscale | GrayscaleAlpha) => {
            DynamicImage::ImageLuma8(image.to_luma8())
        }
        (MediaFormat::Jpeg, Rgb | Rgba) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (MediaFormat::WebP, Grayscale | Rgb) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (MediaFormat::WebP, GrayscaleAlpha | Rgba) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (MediaFormat::Gif, _) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (MediaFormat::Bmp, GrayscaleAlpha) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (_, Grayscale) => DynamicImage::ImageLuma8(image.to_luma8()),
        (_, GrayscaleAlpha) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (_, Rgb) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (_, Rgba) => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

//! In-memory handles to decoded media
//!
//! Assets are immutable once constructed: every operation produces a new
//! asset. Images own their pixel buffer; video and audio own a shared scratch
//! file that is deleted when the last asset referencing it is dropped.

use bytes::Bytes;
use image::{ColorType, DynamicImage, GenericImageView};
use mediakit_core::{
    ColorSpace, DecodeError, Dimensions, EncodeError, MediaFormat, MediaKind,
};
use serde::Serialize;

use crate::codec::MediaCodec;
use crate::scratch::ScratchFile;

#[derive(Debug, Clone, PartialEq)]
pub enum MediaAsset {
    Image(ImageAsset),
    Video(VideoAsset),
    Audio(AudioAsset),
}

impl MediaAsset {
    /// Decode raw upload bytes declared as `format`
    pub fn decode(
        bytes: &[u8],
        format: MediaFormat,
        codec: &MediaCodec,
    ) -> Result<MediaAsset, DecodeError> {
        codec.decode(bytes, format)
    }

    /// Encode the whole asset into a single buffer
    pub fn encode(&self, format: MediaFormat, codec: &MediaCodec) -> Result<Bytes, EncodeError> {
        codec.encode(self, format)
    }

    pub fn from_image(image: DynamicImage) -> Result<MediaAsset, DecodeError> {
        Ok(MediaAsset::Image(ImageAsset::new(image)?))
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaAsset::Image(_) => MediaKind::Image,
            MediaAsset::Video(_) => MediaKind::Video,
            MediaAsset::Audio(_) => MediaKind::Audio,
        }
    }

    /// Pixel dimensions; `None` for audio
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self {
            MediaAsset::Image(img) => Some(img.dimensions()),
            MediaAsset::Video(video) => Some(video.info.dimensions),
            MediaAsset::Audio(_) => None,
        }
    }

    pub fn color_space(&self) -> Option<ColorSpace> {
        match self {
            MediaAsset::Image(img) => Some(img.color_space()),
            MediaAsset::Video(video) => Some(video.info.color_space),
            MediaAsset::Audio(_) => None,
        }
    }

    /// Duration in seconds; `None` for still images
    pub fn duration(&self) -> Option<f64> {
        match self {
            MediaAsset::Image(_) => None,
            MediaAsset::Video(video) => Some(video.info.duration),
            MediaAsset::Audio(audio) => Some(audio.info.duration),
        }
    }

    pub fn as_image(&self) -> Option<&ImageAsset> {
        match self {
            MediaAsset::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoAsset> {
        match self {
            MediaAsset::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioAsset> {
        match self {
            MediaAsset::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            kind: self.kind(),
            dimensions: self.dimensions(),
            color_space: self.color_space(),
            duration: self.duration(),
            frame_rate: self.as_video().map(|v| v.info.frame_rate),
            format: match self {
                MediaAsset::Image(_) => None,
                MediaAsset::Video(v) => Some(v.format),
                MediaAsset::Audio(a) => Some(a.format),
            },
        }
    }
}

/// Serializable overview of an asset for collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<ColorSpace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<MediaFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    image: DynamicImage,
    color_space: ColorSpace,
}

impl ImageAsset {
    pub fn new(image: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions {
                kind: MediaKind::Image,
                width,
                height,
            });
        }
        let color_space = color_space_of(&image);
        Ok(Self { image, color_space })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = self.image.dimensions();
        Dimensions::new(width, height)
    }
}

pub(crate) fn color_space_of(image: &DynamicImage) -> ColorSpace {
    match image.color() {
        ColorType::L8 | ColorType::L16 => ColorSpace::Grayscale,
        ColorType::La8 | ColorType::La16 => ColorSpace::GrayscaleAlpha,
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorSpace::Rgb,
        _ => ColorSpace::Rgba,
    }
}

/// Stream properties of a video file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub dimensions: Dimensions,
    pub duration: f64,
    pub frame_rate: f64,
    pub codec: String,
    pub color_space: ColorSpace,
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    source: ScratchFile,
    format: MediaFormat,
    info: VideoInfo,
}

impl VideoAsset {
    pub fn new(
        source: ScratchFile,
        format: MediaFormat,
        info: VideoInfo,
    ) -> Result<Self, DecodeError> {
        if format.kind() != MediaKind::Video {
            return Err(DecodeError::UnsupportedFormat { format });
        }
        if !info.dimensions.is_valid() {
            return Err(DecodeError::InvalidDimensions {
                kind: MediaKind::Video,
                width: info.dimensions.width,
                height: info.dimensions.height,
            });
        }
        Ok(Self {
            source,
            format,
            info,
        })
    }

    pub fn source(&self) -> &ScratchFile {
        &self.source
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

/// Stream properties of an audio file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioInfo {
    pub duration: f64,
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    source: ScratchFile,
    format: MediaFormat,
    info: AudioInfo,
}

impl AudioAsset {
    pub fn new(
        source: ScratchFile,
        format: MediaFormat,
        info: AudioInfo,
    ) -> Result<Self, DecodeError> {
        if format.kind() != MediaKind::Audio {
            return Err(DecodeError::UnsupportedFormat { format });
        }
        Ok(Self {
            source,
            format,
            info,
        })
    }

    pub fn source(&self) -> &ScratchFile {
        &self.source
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn info(&self) -> &AudioInfo {
        &self.info
    }
}

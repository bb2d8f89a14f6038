//! Configuration module
//!
//! Settings for the codec layer, the ffmpeg collaborators and the format sets
//! accepted at registry-configuration time. Values come from the environment
//! (optionally via a `.env` file) and fall back to the documented defaults.

use std::env;
use std::path::PathBuf;

use crate::models::{MediaFormat, MediaKind};

const MAX_IMAGE_SIZE_MB: usize = 20;
const MAX_VIDEO_SIZE_MB: usize = 500;
const DEFAULT_IMAGE_FORMATS: &str = "png,jpeg,webp,gif,bmp";
const DEFAULT_VIDEO_FORMATS: &str = "mp4,mov,avi,mkv,webm";
const DEFAULT_AUDIO_FORMATS: &str = "mp3,wav,aac";

/// Quality presets for lossy export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    #[default]
    Normal,
    Better,
    Best,
    Lighter,
    Lightest,
}

impl QualityPreset {
    pub fn parse(s: &str) -> Result<Self, anyhow::Error> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(QualityPreset::Normal),
            "better" => Ok(QualityPreset::Better),
            "best" => Ok(QualityPreset::Best),
            "lighter" => Ok(QualityPreset::Lighter),
            "lightest" => Ok(QualityPreset::Lightest),
            _ => Err(anyhow::anyhow!("Invalid quality preset: {}", s)),
        }
    }

    /// JPEG quality (0-100)
    pub fn jpeg_quality(self) -> u8 {
        match self {
            QualityPreset::Normal => 75,
            QualityPreset::Better => 85,
            QualityPreset::Best => 95,
            QualityPreset::Lighter => 65,
            QualityPreset::Lightest => 50,
        }
    }

    /// x264 constant rate factor (lower is better)
    pub fn video_crf(self) -> u8 {
        match self {
            QualityPreset::Normal => 23,
            QualityPreset::Better => 20,
            QualityPreset::Best => 17,
            QualityPreset::Lighter => 26,
            QualityPreset::Lightest => 30,
        }
    }

    /// Audio bitrate in kbps for lossy audio
    pub fn audio_bitrate_kbps(self) -> u32 {
        match self {
            QualityPreset::Normal => 192,
            QualityPreset::Better => 256,
            QualityPreset::Best => 320,
            QualityPreset::Lighter => 128,
            QualityPreset::Lightest => 96,
        }
    }
}

/// Media processing configuration
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub environment: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_codec: String,
    pub scratch_dir: Option<PathBuf>,
    pub max_image_size_bytes: usize,
    pub max_video_size_bytes: usize,
    pub image_formats: Vec<MediaFormat>,
    pub video_formats: Vec<MediaFormat>,
    pub audio_formats: Vec<MediaFormat>,
    pub export_quality: QualityPreset,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            scratch_dir: None,
            max_image_size_bytes: MAX_IMAGE_SIZE_MB * 1024 * 1024,
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
            image_formats: parse_format_list(DEFAULT_IMAGE_FORMATS).unwrap_or_default(),
            video_formats: parse_format_list(DEFAULT_VIDEO_FORMATS).unwrap_or_default(),
            audio_formats: parse_format_list(DEFAULT_AUDIO_FORMATS).unwrap_or_default(),
            export_quality: QualityPreset::Normal,
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let max_image_size_mb = env::var("MAX_IMAGE_SIZE_MB")
            .unwrap_or_else(|_| MAX_IMAGE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_IMAGE_SIZE_MB);

        let max_video_size_mb = env::var("MAX_VIDEO_SIZE_MB")
            .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_VIDEO_SIZE_MB);

        let export_quality = match env::var("EXPORT_QUALITY") {
            Ok(value) => QualityPreset::parse(&value)?,
            Err(_) => QualityPreset::Normal,
        };

        let config = Self {
            environment,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            video_codec: env::var("VIDEO_CODEC").unwrap_or(defaults.video_codec),
            scratch_dir: env::var("SCRATCH_DIR").ok().map(PathBuf::from),
            max_image_size_bytes: megabytes_to_bytes("MAX_IMAGE_SIZE_MB", max_image_size_mb)?,
            max_video_size_bytes: megabytes_to_bytes("MAX_VIDEO_SIZE_MB", max_video_size_mb)?,
            image_formats: parse_format_list(
                &env::var("IMAGE_FORMATS").unwrap_or_else(|_| DEFAULT_IMAGE_FORMATS.to_string()),
            )?,
            video_formats: parse_format_list(
                &env::var("VIDEO_FORMATS").unwrap_or_else(|_| DEFAULT_VIDEO_FORMATS.to_string()),
            )?,
            audio_formats: parse_format_list(
                &env::var("AUDIO_FORMATS").unwrap_or_else(|_| DEFAULT_AUDIO_FORMATS.to_string()),
            )?,
            export_quality,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_executable_path("FFMPEG_PATH", &self.ffmpeg_path)?;
        validate_executable_path("FFPROBE_PATH", &self.ffprobe_path)?;

        if self.video_codec.trim().is_empty() {
            return Err(anyhow::anyhow!("VIDEO_CODEC cannot be empty"));
        }
        if self.max_image_size_bytes == 0 || self.max_video_size_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum upload sizes must be greater than 0"));
        }

        for (list, expected, var) in [
            (&self.image_formats, MediaKind::Image, "IMAGE_FORMATS"),
            (&self.video_formats, MediaKind::Video, "VIDEO_FORMATS"),
            (&self.audio_formats, MediaKind::Audio, "AUDIO_FORMATS"),
        ] {
            if let Some(bad) = list.iter().find(|f| f.kind() != expected) {
                return Err(anyhow::anyhow!(
                    "{} contains {} which is not an {} format",
                    var,
                    bad,
                    expected
                ));
            }
        }

        if let Some(dir) = &self.scratch_dir {
            if !dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "SCRATCH_DIR does not exist or is not a directory: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Whether `format` is enabled for decode and export
    pub fn supports_format(&self, format: MediaFormat) -> bool {
        self.formats_for(format.kind()).contains(&format)
    }

    pub fn formats_for(&self, kind: MediaKind) -> &[MediaFormat] {
        match kind {
            MediaKind::Image => &self.image_formats,
            MediaKind::Video => &self.video_formats,
            MediaKind::Audio => &self.audio_formats,
        }
    }

    /// Upload size limit for a media kind
    pub fn max_input_bytes(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Image => self.max_image_size_bytes,
            MediaKind::Video | MediaKind::Audio => self.max_video_size_bytes,
        }
    }
}

fn parse_format_list(value: &str) -> Result<Vec<MediaFormat>, anyhow::Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| MediaFormat::parse(s).map_err(anyhow::Error::msg))
        .collect()
}

fn megabytes_to_bytes(var: &str, mb: usize) -> Result<usize, anyhow::Error> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {} MB", var, mb))
}

/// Reject executable paths that could smuggle shell syntax into a subprocess call
fn validate_executable_path(var: &str, path: &str) -> Result<(), anyhow::Error> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() {
        return Err(anyhow::anyhow!("{} cannot be empty", var));
    }
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow::anyhow!("{} contains dangerous characters", var));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MediaConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.supports_format(MediaFormat::Png));
        assert!(config.supports_format(MediaFormat::Mkv));
        assert!(config.supports_format(MediaFormat::Mp3));
        assert_eq!(config.max_input_bytes(MediaKind::Image), 20 * 1024 * 1024);
    }

    #[test]
    fn test_rejects_dangerous_ffmpeg_path() {
        let config = MediaConfig {
            ffmpeg_path: "ffmpeg; rm -rf /".to_string(),
            ..MediaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_format_of_wrong_kind() {
        let config = MediaConfig {
            image_formats: vec![MediaFormat::Png, MediaFormat::Mp4],
            ..MediaConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("IMAGE_FORMATS"));
    }

    #[test]
    fn test_restricted_format_set() {
        let config = MediaConfig {
            image_formats: vec![MediaFormat::Png],
            ..MediaConfig::default()
        };
        assert!(!config.supports_format(MediaFormat::Gif));
        assert!(config.supports_format(MediaFormat::Png));
    }

    #[test]
    fn test_parse_format_list() {
        let formats = parse_format_list("png, jpg ,,webp").unwrap();
        assert_eq!(
            formats,
            vec![MediaFormat::Png, MediaFormat::Jpeg, MediaFormat::WebP]
        );
        assert!(parse_format_list("png,tiff").is_err());
    }

    #[test]
    fn test_megabytes_to_bytes_rejects_overflow() {
        assert_eq!(megabytes_to_bytes("MAX_IMAGE_SIZE_MB", 2).unwrap(), 2 * 1024 * 1024);
        let err = megabytes_to_bytes("MAX_VIDEO_SIZE_MB", usize::MAX).unwrap_err();
        assert!(err.to_string().contains("MAX_VIDEO_SIZE_MB is too large"));
    }

    #[test]
    fn test_quality_preset_parse() {
        assert_eq!(QualityPreset::parse("BEST").unwrap(), QualityPreset::Best);
        assert!(QualityPreset::parse("ultra").is_err());
        assert!(QualityPreset::Best.jpeg_quality() > QualityPreset::Lightest.jpeg_quality());
        assert!(QualityPreset::Best.video_crf() < QualityPreset::Lightest.video_crf());
    }

    #[test]
    fn test_is_production() {
        let config = MediaConfig {
            environment: "Prod".to_string(),
            ..MediaConfig::default()
        };
        assert!(config.is_production());
        assert!(!MediaConfig::default().is_production());
    }
}

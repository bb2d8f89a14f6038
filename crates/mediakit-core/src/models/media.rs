use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Media kind flowing through a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    fn bit(self) -> u8 {
        match self {
            MediaKind::Image => 0b001,
            MediaKind::Video => 0b010,
            MediaKind::Audio => 0b100,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of media kinds an operation accepts
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const IMAGE: Capabilities = Capabilities(0b001);
    pub const VIDEO: Capabilities = Capabilities(0b010);
    pub const AUDIO: Capabilities = Capabilities(0b100);
    pub const VISUAL: Capabilities = Capabilities(0b011);

    pub fn contains(self, kind: MediaKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn kinds(self) -> Vec<MediaKind> {
        [MediaKind::Image, MediaKind::Video, MediaKind::Audio]
            .into_iter()
            .filter(|k| self.contains(*k))
            .collect()
    }
}

impl From<MediaKind> for Capabilities {
    fn from(kind: MediaKind) -> Self {
        Capabilities(kind.bit())
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kinds().into_iter().map(MediaKind::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.kinds().serialize(serializer)
    }
}

/// Pixel dimensions, strictly positive on every constructed asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Channel layout of decoded pixel data.
///
/// Buffers are always RGB-ordered; the tag records how many channels an
/// operation will see so that grayscale results are never re-read as colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    Rgb,
    Rgba,
    Grayscale,
    GrayscaleAlpha,
}

impl ColorSpace {
    pub fn channels(self) -> u8 {
        match self {
            ColorSpace::Rgb => 3,
            ColorSpace::Rgba => 4,
            ColorSpace::Grayscale => 1,
            ColorSpace::GrayscaleAlpha => 2,
        }
    }

    pub fn is_grayscale(self) -> bool {
        matches!(self, ColorSpace::Grayscale | ColorSpace::GrayscaleAlpha)
    }
}

/// Container / file formats understood by the codec layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
    Bmp,
    Mp4,
    Mov,
    Avi,
    Mkv,
    WebM,
    Mp3,
    Wav,
    Aac,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 13] = [
        MediaFormat::Png,
        MediaFormat::Jpeg,
        MediaFormat::WebP,
        MediaFormat::Gif,
        MediaFormat::Bmp,
        MediaFormat::Mp4,
        MediaFormat::Mov,
        MediaFormat::Avi,
        MediaFormat::Mkv,
        MediaFormat::WebM,
        MediaFormat::Mp3,
        MediaFormat::Wav,
        MediaFormat::Aac,
    ];

    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(MediaFormat::Png),
            "jpeg" | "jpg" => Ok(MediaFormat::Jpeg),
            "webp" => Ok(MediaFormat::WebP),
            "gif" => Ok(MediaFormat::Gif),
            "bmp" => Ok(MediaFormat::Bmp),
            "mp4" | "m4v" => Ok(MediaFormat::Mp4),
            "mov" => Ok(MediaFormat::Mov),
            "avi" => Ok(MediaFormat::Avi),
            "mkv" => Ok(MediaFormat::Mkv),
            "webm" => Ok(MediaFormat::WebM),
            "mp3" => Ok(MediaFormat::Mp3),
            "wav" => Ok(MediaFormat::Wav),
            "aac" => Ok(MediaFormat::Aac),
            other => Err(format!("Unknown media format: {}", other)),
        }
    }

    /// Guess the format from a file name's extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::parse(e).ok())
    }

    pub fn kind(self) -> MediaKind {
        match self {
            MediaFormat::Png
            | MediaFormat::Jpeg
            | MediaFormat::WebP
            | MediaFormat::Gif
            | MediaFormat::Bmp => MediaKind::Image,
            MediaFormat::Mp4
            | MediaFormat::Mov
            | MediaFormat::Avi
            | MediaFormat::Mkv
            | MediaFormat::WebM => MediaKind::Video,
            MediaFormat::Mp3 | MediaFormat::Wav | MediaFormat::Aac => MediaKind::Audio,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Png => "png",
            MediaFormat::Jpeg => "jpg",
            MediaFormat::WebP => "webp",
            MediaFormat::Gif => "gif",
            MediaFormat::Bmp => "bmp",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mov => "mov",
            MediaFormat::Avi => "avi",
            MediaFormat::Mkv => "mkv",
            MediaFormat::WebM => "webm",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Wav => "wav",
            MediaFormat::Aac => "aac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Png => "image/png",
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Bmp => "image/bmp",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Mov => "video/quicktime",
            MediaFormat::Avi => "video/x-msvideo",
            MediaFormat::Mkv => "video/x-matroska",
            MediaFormat::WebM => "video/webm",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Aac => "audio/aac",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaFormat::Jpeg => "jpeg",
            other => other.extension(),
        })
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

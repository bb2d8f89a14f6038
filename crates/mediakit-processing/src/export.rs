//! Final artefact production for the download collaborator
//!
//! Images are encoded into a single buffer. Video and audio are handed out as
//! a stream over a scratch file so a full transcoded video never has to sit in
//! memory.

use anyhow::Context;
use bytes::Bytes;
use mediakit_core::{EncodeError, MediaFormat};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::asset::MediaAsset;
use crate::codec::MediaCodec;
use crate::scratch::ScratchFile;

/// Readable handle over a rendered file. The file is removed once the last
/// handle to it (this stream or an asset sharing it) is dropped.
#[derive(Debug)]
pub struct ExportStream {
    file: ScratchFile,
    reader: File,
    len: u64,
}

impl ExportStream {
    fn open(file: ScratchFile) -> io::Result<Self> {
        let reader = File::open(file.path())?;
        let len = reader.metadata()?.len();
        Ok(Self { file, reader, len })
    }

    /// Total size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Read for ExportStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

#[derive(Debug)]
pub enum ExportBody {
    Buffer(Bytes),
    Stream(ExportStream),
}

/// An encoded artefact plus what a download needs to label it
#[derive(Debug)]
pub struct Export {
    format: MediaFormat,
    body: ExportBody,
}

impl Export {
    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// `stem.ext` for the download
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }

    pub fn body(&self) -> &ExportBody {
        &self.body
    }

    pub fn into_body(self) -> ExportBody {
        self.body
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.body, ExportBody::Stream(_))
    }

    /// Size in bytes
    pub fn len(&self) -> u64 {
        match &self.body {
            ExportBody::Buffer(bytes) => bytes.len() as u64,
            ExportBody::Stream(stream) => stream.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the whole artefact into `writer`
    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<u64> {
        match self.body {
            ExportBody::Buffer(bytes) => {
                writer.write_all(&bytes)?;
                Ok(bytes.len() as u64)
            }
            ExportBody::Stream(mut stream) => io::copy(&mut stream, writer),
        }
    }

    /// Collect the artefact into memory
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self.body {
            ExportBody::Buffer(bytes) => Ok(bytes),
            ExportBody::Stream(mut stream) => {
                let mut data = Vec::with_capacity(stream.len() as usize);
                stream.read_to_end(&mut data)?;
                Ok(Bytes::from(data))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportService {
    codec: MediaCodec,
}

impl ExportService {
    pub fn new(codec: MediaCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &MediaCodec {
        &self.codec
    }

    /// Encode `asset` as `format`
    pub fn export(&self, asset: &MediaAsset, format: MediaFormat) -> Result<Export, EncodeError> {
        let body = match asset {
            MediaAsset::Image(image) => ExportBody::Buffer(self.codec.encode_image(image, format)?),
            _ => {
                let file = self.codec.render_file(asset, format)?;
                let stream = ExportStream::open(file)
                    .context("Failed to open rendered file")
                    .map_err(|source| EncodeError::Failed { format, source })?;
                ExportBody::Stream(stream)
            }
        };

        let export = Export { format, body };
        tracing::info!(
            kind = %asset.kind(),
            format = %format,
            size_bytes = export.len(),
            streamed = export.is_stream(),
            "Export ready"
        );
        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{VideoAsset, VideoInfo};
    use crate::scratch::ScratchSpace;
    use image::{DynamicImage, RgbImage};
    use mediakit_core::{ColorSpace, Dimensions, MediaConfig, MediaKind};

    fn service() -> ExportService {
        ExportService::new(MediaCodec::new(&MediaConfig::default()))
    }

    fn video(bytes: &[u8]) -> MediaAsset {
        let file = ScratchSpace::default().write(bytes, "mp4").unwrap();
        MediaAsset::Video(
            VideoAsset::new(
                file,
                MediaFormat::Mp4,
                VideoInfo {
                    dimensions: Dimensions::new(640, 480),
                    duration: 5.0,
                    frame_rate: 30.0,
                    codec: "h264".to_string(),
                    color_space: ColorSpace::Rgb,
                    has_audio: false,
                },
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_image_export_is_buffer() {
        let asset = MediaAsset::from_image(DynamicImage::ImageRgb8(RgbImage::new(6, 4))).unwrap();
        let export = service().export(&asset, MediaFormat::Png).unwrap();
        assert!(!export.is_stream());
        assert_eq!(export.mime_type(), "image/png");
        assert_eq!(export.file_name("result"), "result.png");

        let bytes = export.into_bytes().unwrap();
        let codec = MediaCodec::new(&MediaConfig::default());
        let decoded = codec.decode(&bytes, MediaFormat::Png).unwrap();
        assert_eq!(decoded.kind(), MediaKind::Image);
    }

    #[test]
    fn test_video_in_own_container_streams_existing_file() {
        let asset = video(b"pretend mp4 payload");
        let export = service().export(&asset, MediaFormat::Mp4).unwrap();
        assert!(export.is_stream());
        assert_eq!(export.len(), 19);
        assert_eq!(export.extension(), "mp4");

        let mut out = Vec::new();
        export.write_to(&mut out).unwrap();
        assert_eq!(out, b"pretend mp4 payload");
    }

    #[test]
    fn test_stream_releases_file_with_last_handle() {
        let asset = video(b"abc");
        let export = service().export(&asset, MediaFormat::Mp4).unwrap();
        let path = match export.body() {
            ExportBody::Stream(stream) => stream.path().to_path_buf(),
            ExportBody::Buffer(_) => panic!("expected a stream"),
        };

        drop(asset);
        assert!(path.exists());
        drop(export);
        assert!(!path.exists());
    }

    #[test]
    fn test_video_as_image_format_is_unsupported() {
        let err = service().export(&video(b"x"), MediaFormat::Png).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Unsupported {
                kind: MediaKind::Video,
                format: MediaFormat::Png
            }
        ));
    }
}

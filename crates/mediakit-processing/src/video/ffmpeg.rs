//! ffmpeg / ffprobe subprocess plumbing
//!
//! Every subprocess goes through a [`CommandRunner`] so argument vectors can be
//! inspected without the binaries installed. Arguments are passed as a vector,
//! never through a shell.

use anyhow::{anyhow, Context, Result};
use mediakit_core::{ColorSpace, Dimensions, MediaConfig, MediaFormat, QualityPreset};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use crate::asset::{AudioInfo, VideoInfo};
use crate::scratch::{ScratchFile, ScratchSpace};

const STDERR_TAIL_LINES: usize = 12;

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Executes external programs on behalf of the video executors
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs programs with `std::process::Command`, blocking until they exit
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Configured ffmpeg and ffprobe collaborators
#[derive(Clone)]
pub struct FfmpegTools {
    ffmpeg_path: String,
    ffprobe_path: String,
    video_codec: String,
    quality: QualityPreset,
    scratch: ScratchSpace,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for FfmpegTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegTools")
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("video_codec", &self.video_codec)
            .field("quality", &self.quality)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

impl FfmpegTools {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            video_codec: config.video_codec.clone(),
            quality: config.export_quality,
            scratch: ScratchSpace::new(config.scratch_dir.clone()),
            runner: Arc::new(SystemRunner),
        }
    }

    /// Replace the subprocess runner
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    /// Video encoder for a container; WebM cannot carry H.264
    pub fn video_codec_for(&self, container: MediaFormat) -> &str {
        match container {
            MediaFormat::WebM => "libvpx-vp9",
            _ => &self.video_codec,
        }
    }

    /// Encoder arguments for the picture track of `container`
    pub fn video_encode_args(&self, container: MediaFormat) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec_for(container).to_string(),
            "-crf".to_string(),
            self.quality.video_crf().to_string(),
        ];
        if container == MediaFormat::WebM {
            // constant-quality mode for VP9
            args.extend_from_slice(&["-b:v".to_string(), "0".to_string()]);
        }
        args
    }

    /// Encoder arguments for an audio-only output
    pub fn audio_encode_args(&self, format: MediaFormat) -> Result<Vec<String>> {
        let bitrate = format!("{}k", self.quality.audio_bitrate_kbps());
        let args = match format {
            MediaFormat::Mp3 => vec!["-c:a", "libmp3lame", "-b:a", bitrate.as_str()],
            MediaFormat::Aac => vec!["-c:a", "aac", "-b:a", bitrate.as_str()],
            MediaFormat::Wav => vec!["-c:a", "pcm_s16le"],
            other => return Err(anyhow!("{} is not an audio format", other)),
        };
        Ok(args.into_iter().map(str::to_string).collect())
    }

    /// Run ffmpeg with `args`, failing with the stderr tail on a non-zero exit
    pub fn run_ffmpeg(&self, operation: &str, args: Vec<String>) -> Result<()> {
        let start = Instant::now();
        tracing::debug!(
            process.executable.path = %self.ffmpeg_path,
            ffmpeg.operation = operation,
            args = ?args,
            "Running ffmpeg"
        );

        let output = self
            .runner
            .run(&self.ffmpeg_path, &args)
            .context("Failed to execute ffmpeg")?;

        if !output.success {
            let stderr = stderr_tail(&output.stderr);
            tracing::warn!(
                ffmpeg.operation = operation,
                stderr = %stderr,
                "ffmpeg exited with an error"
            );
            return Err(anyhow!("FFmpeg {} failed: {}", operation, stderr));
        }

        tracing::debug!(
            ffmpeg.operation = operation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );
        Ok(())
    }

    /// Create a scratch output with `extension`, let `build` produce the
    /// argument vector from the input and output paths, and run ffmpeg.
    /// The output file is removed again if ffmpeg fails.
    pub fn render<F>(
        &self,
        operation: &str,
        input: &Path,
        extension: &str,
        build: F,
    ) -> Result<ScratchFile>
    where
        F: FnOnce(String, String) -> Vec<String>,
    {
        let output = self
            .scratch
            .create(extension)
            .context("Failed to create scratch file")?;
        let args = build(path_arg(input), path_arg(output.path()));
        self.run_ffmpeg(operation, args)?;
        Ok(output)
    }

    /// Re-encode a video into another container
    pub fn transcode_video(&self, input: &Path, to: MediaFormat) -> Result<ScratchFile> {
        let video_args = self.video_encode_args(to);
        let audio_codec = match to {
            MediaFormat::WebM => "libopus",
            _ => "aac",
        };
        self.render("transcode", input, to.extension(), |input, output| {
            let mut args = vec!["-y".to_string(), "-i".to_string(), input];
            args.extend(video_args);
            args.extend(["-c:a".to_string(), audio_codec.to_string(), output]);
            args
        })
    }

    /// Re-encode an audio file (or the audio track of a video) into `to`
    pub fn transcode_audio(&self, input: &Path, to: MediaFormat) -> Result<ScratchFile> {
        let audio_args = self.audio_encode_args(to)?;
        self.render("transcode", input, to.extension(), |input, output| {
            let mut args = vec!["-y".to_string(), "-i".to_string(), input, "-vn".to_string()];
            args.extend(audio_args);
            args.push(output);
            args
        })
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    fn probe(&self, path: &Path) -> Result<serde_json::Value> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path_arg(path),
        ];

        let output = self
            .runner
            .run(&self.ffprobe_path, &args)
            .context("Failed to execute ffprobe")?;

        if !output.success {
            return Err(anyhow!("ffprobe failed: {}", stderr_tail(&output.stderr)));
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")
    }

    pub fn probe_video(&self, path: &Path) -> Result<VideoInfo> {
        let start = Instant::now();
        let info = parse_video_probe(&self.probe(path)?)?;
        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = info.duration,
            width = info.dimensions.width,
            height = info.dimensions.height,
            codec = %info.codec,
            "Video probe completed"
        );
        Ok(info)
    }

    pub fn probe_audio(&self, path: &Path) -> Result<AudioInfo> {
        parse_audio_probe(&self.probe(path)?)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Last lines of a subprocess's stderr, which is where ffmpeg puts the cause
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join("\n")
}

/// Parse an ffprobe rate such as `30000/1001`
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den != 0.0 && num > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

fn parse_seconds(value: &serde_json::Value) -> Option<f64> {
    value.as_str().and_then(|d| d.parse::<f64>().ok())
}

/// Channel layout implied by an ffmpeg pixel format name
pub fn color_space_for_pix_fmt(pix_fmt: &str) -> ColorSpace {
    if pix_fmt == "ya8" || pix_fmt == "ya16be" || pix_fmt == "ya16le" {
        ColorSpace::GrayscaleAlpha
    } else if pix_fmt.starts_with("gray") {
        ColorSpace::Grayscale
    } else if pix_fmt.contains("yuva") || pix_fmt.contains("rgba") || pix_fmt.contains("bgra")
        || pix_fmt.starts_with("argb") || pix_fmt.starts_with("abgr")
    {
        ColorSpace::Rgba
    } else {
        ColorSpace::Rgb
    }
}

/// Extract video properties from `ffprobe -show_format -show_streams` JSON
pub fn parse_video_probe(probe: &serde_json::Value) -> Result<VideoInfo> {
    let streams = probe["streams"]
        .as_array()
        .ok_or_else(|| anyhow!("ffprobe reported no streams"))?;

    let stream = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let duration = parse_seconds(&probe["format"]["duration"])
        .or_else(|| parse_seconds(&stream["duration"]))
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;

    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;

    let frame_rate = stream["avg_frame_rate"]
        .as_str()
        .and_then(parse_rate)
        .or_else(|| stream["r_frame_rate"].as_str().and_then(parse_rate))
        .ok_or_else(|| anyhow!("Could not parse frame rate"))?;

    Ok(VideoInfo {
        dimensions: Dimensions::new(width, height),
        duration,
        frame_rate,
        codec: stream["codec_name"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        color_space: color_space_for_pix_fmt(stream["pix_fmt"].as_str().unwrap_or("")),
        has_audio: streams.iter().any(|s| s["codec_type"] == "audio"),
    })
}

/// Extract audio properties from `ffprobe -show_format -show_streams` JSON
pub fn parse_audio_probe(probe: &serde_json::Value) -> Result<AudioInfo> {
    let stream = probe["streams"]
        .as_array()
        .and_then(|streams| streams.iter().find(|s| s["codec_type"] == "audio"))
        .ok_or_else(|| anyhow!("No audio stream found"))?;

    let duration = parse_seconds(&probe["format"]["duration"])
        .or_else(|| parse_seconds(&stream["duration"]))
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    Ok(AudioInfo {
        duration,
        codec: stream["codec_name"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        sample_rate: stream["sample_rate"]
            .as_str()
            .and_then(|r| r.parse::<u32>().ok()),
        channels: stream["channels"].as_u64().map(|c| c as u32),
    })
}

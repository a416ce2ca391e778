//! Video stream pipelines.
//!
//! A video capture pushes one composited RGBA frame at a time into a
//! [`VideoStream`]; the stream owns the encoder and hands back the encoded
//! container bytes when finished. The default implementation pipes raw
//! frames into an `ffmpeg` subprocess producing WebM.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbaImage;
use loopdraw_common::clock::unix_time_ms;
use loopdraw_common::config::CaptureDefaults;
use loopdraw_common::error::{LoopdrawError, LoopdrawResult};

/// An open, continuously fed video encoder.
pub trait VideoStream: Send {
    /// Append one frame. Frames must match the dimensions the stream was
    /// opened with.
    fn push_frame(&mut self, frame: &RgbaImage) -> LoopdrawResult<()>;

    /// Stop the stream and return the encoded output.
    fn finish(&mut self) -> LoopdrawResult<Vec<u8>>;

    /// Tear the stream down, discarding any output.
    fn abort(&mut self);

    /// Stream statistics so far.
    fn stats(&self) -> PipelineStats;
}

/// Opens video streams on demand.
pub trait VideoStreamFactory: Send {
    /// Open a stream for frames of the given size and rate.
    fn open(&mut self, width: u32, height: u32, fps: u32) -> LoopdrawResult<Box<dyn VideoStream>>;

    /// Check if the backing encoder is available on this system.
    fn is_available(&self) -> bool;

    /// Factory name for logging.
    fn name(&self) -> &str;
}

/// Runtime statistics from a video stream.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames accepted by the stream.
    pub frames_pushed: u64,

    /// Raw bytes written to the encoder.
    pub bytes_written: u64,
}

/// Settings for the ffmpeg WebM encoder.
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub binary: String,
    pub codec: String,
    pub bitrate_kbps: u32,
    /// Directory for the intermediate output file.
    pub scratch_dir: PathBuf,
}

impl FfmpegSettings {
    pub fn from_defaults(defaults: &CaptureDefaults) -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            codec: defaults.video_codec.clone(),
            bitrate_kbps: defaults.video_bitrate_kbps,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Opens [`FfmpegVideoStream`]s.
#[derive(Debug, Clone)]
pub struct FfmpegVideoStreamFactory {
    settings: FfmpegSettings,
}

impl FfmpegVideoStreamFactory {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    fn build_args(&self, width: u32, height: u32, fps: u32, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{width}x{height}"),
            "-r".to_string(),
            fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            // yuv420p needs even dimensions.
            "-vf".to_string(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
            "-c:v".to_string(),
            self.settings.codec.clone(),
            "-b:v".to_string(),
            format!("{}k", self.settings.bitrate_kbps),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-f".to_string(),
            "webm".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl VideoStreamFactory for FfmpegVideoStreamFactory {
    fn open(&mut self, width: u32, height: u32, fps: u32) -> LoopdrawResult<Box<dyn VideoStream>> {
        if width == 0 || height == 0 {
            return Err(LoopdrawError::capture(format!(
                "Invalid video dimensions {width}x{height}"
            )));
        }

        let output = self.settings.scratch_dir.join(format!(
            "loopdraw-capture-{}-{}.webm",
            std::process::id(),
            unix_time_ms()
        ));
        let args = self.build_args(width, height, fps.max(1), &output);
        tracing::debug!(?args, "Starting ffmpeg video stream");

        let mut child = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LoopdrawError::capture(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LoopdrawError::capture("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LoopdrawError::capture("Failed to capture ffmpeg stderr"))?;

        // ffmpeg stalls once its stderr pipe fills up.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(pid = child.id(), width, height, fps, "ffmpeg video stream started");

        Ok(Box::new(FfmpegVideoStream {
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            output,
            width,
            height,
            stats: PipelineStats::default(),
        }))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.settings.binary)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// A raw-RGBA-over-stdin ffmpeg encoder writing WebM to a scratch file.
pub struct FfmpegVideoStream {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    output: PathBuf,
    width: u32,
    height: u32,
    stats: PipelineStats,
}

impl FfmpegVideoStream {
    fn join_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }
}

impl VideoStream for FfmpegVideoStream {
    fn push_frame(&mut self, frame: &RgbaImage) -> LoopdrawResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(LoopdrawError::capture(format!(
                "Frame size {:?} does not match stream size {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| LoopdrawError::capture("Video stream already closed"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| LoopdrawError::capture(format!("Failed to write frame to ffmpeg: {e}")))?;
        self.stats.frames_pushed += 1;
        self.stats.bytes_written += frame.as_raw().len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> LoopdrawResult<Vec<u8>> {
        // Closing stdin signals end of input so ffmpeg can finalize the container.
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| LoopdrawError::capture("Video stream already finished"))?;
        let status = child
            .wait()
            .map_err(|e| LoopdrawError::capture(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self.join_stderr();

        if !status.success() {
            let _ = std::fs::remove_file(&self.output);
            return Err(LoopdrawError::encode(format!(
                "ffmpeg video encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        let bytes = std::fs::read(&self.output)?;
        let _ = std::fs::remove_file(&self.output);
        tracing::info!(
            frames = self.stats.frames_pushed,
            bytes = bytes.len(),
            "ffmpeg video stream finished"
        );
        Ok(bytes)
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.join_stderr();
        let _ = std::fs::remove_file(&self.output);
        tracing::info!("ffmpeg video stream aborted");
    }

    fn stats(&self) -> PipelineStats {
        self.stats.clone()
    }
}

impl Drop for FfmpegVideoStream {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

/// Whether `binary` resolves on the current `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

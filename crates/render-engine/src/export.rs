//! Export artifacts, still-image export, and the download sink.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use loopdraw_common::error::{LoopdrawError, LoopdrawResult};
use loopdraw_stroke_model::stroke::{Color, Stroke};

use crate::compositor::flatten;
use crate::raster::RasterSurface;
use crate::renderer::{draw_stroke, render_snapshot, SnapshotOptions};

/// Background every exported frame is flattened onto.
pub const EXPORT_BACKGROUND: Color = Color::WHITE;

/// What kind of artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Snapshot,
    Video,
    Gif,
}

impl ArtifactKind {
    /// Label used in file names.
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Snapshot => "snapshot",
            ArtifactKind::Video => "video",
            ArtifactKind::Gif => "gif",
        }
    }

    /// File extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Snapshot => "png",
            ArtifactKind::Video => "webm",
            ArtifactKind::Gif => "gif",
        }
    }
}

/// A finished export held in memory until it is handed to a sink.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,

    /// Encoded file content.
    pub bytes: Vec<u8>,

    /// Frame dimensions in the encoded output.
    pub width: u32,
    pub height: u32,

    /// Number of frames, for animated artifacts.
    pub frame_count: Option<usize>,

    /// Wall-clock unix milliseconds at creation.
    pub created_at_unix_ms: i64,
}

impl Artifact {
    /// `loopdraw-<artifact>-<unixTimeMs>.<ext>`
    pub fn file_name(&self) -> String {
        format!(
            "loopdraw-{}-{}.{}",
            self.kind.label(),
            self.created_at_unix_ms,
            self.kind.extension()
        )
    }
}

/// Receives finished artifacts and makes them available to the user.
pub trait DownloadSink {
    /// Persist the artifact, returning where it went.
    fn save(&mut self, artifact: &Artifact) -> LoopdrawResult<PathBuf>;
}

/// Writes artifacts into a directory using their canonical file name.
#[derive(Debug, Clone)]
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn save(&mut self, artifact: &Artifact) -> LoopdrawResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(artifact.file_name());
        std::fs::write(&path, &artifact.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = artifact.bytes.len(),
            kind = artifact.kind.label(),
            "Artifact saved"
        );
        Ok(path)
    }
}

/// Render every committed stroke plus the open stroke into a PNG artifact.
///
/// The open stroke is drawn in a final pass since it is not yet part of
/// the timeline.
pub fn export_snapshot_png(
    strokes: &[Stroke],
    open_stroke: Option<&Stroke>,
    width: u32,
    height: u32,
    created_at_unix_ms: i64,
) -> LoopdrawResult<Artifact> {
    let mut surface = RasterSurface::new(width, height);
    render_snapshot(&mut surface, strokes, SnapshotOptions::full());
    if let Some(open) = open_stroke {
        draw_stroke(&mut surface, open);
    }

    let frame = flatten(&surface, EXPORT_BACKGROUND);
    let bytes = encode_png(&frame)?;
    tracing::debug!(width, height, bytes = bytes.len(), "Snapshot encoded");

    Ok(Artifact {
        kind: ArtifactKind::Snapshot,
        bytes,
        width,
        height,
        frame_count: None,
        created_at_unix_ms,
    })
}

/// Encode a frame as PNG.
pub fn encode_png(frame: &RgbaImage) -> LoopdrawResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    frame
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| LoopdrawError::encode(format!("Failed to encode PNG: {e}")))?;
    Ok(buffer.into_inner())
}

//! Export the cumulative drawing of a script as a PNG.

use std::path::PathBuf;

use loopdraw_capture_engine::{
    CaptureCoordinator, FfmpegSettings, FfmpegVideoStreamFactory, GifAnimationEncoder,
};
use loopdraw_common::clock::unix_time_ms;
use loopdraw_common::config::AppConfig;
use loopdraw_loop_engine::{LoopSession, SessionSettings};
use loopdraw_render_engine::export::{export_snapshot_png, DirectoryDownloadSink, DownloadSink};

use super::{load_script, to_commands};

pub fn run(
    script: PathBuf,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    mut config: AppConfig,
) -> anyhow::Result<()> {
    let events = load_script(&script)?;
    if let Some(width) = width {
        config.canvas.width = width;
    }
    if let Some(height) = height {
        config.canvas.height = height;
    }

    let settings = SessionSettings::from_config(&config);
    let capture = CaptureCoordinator::new(
        settings.capture.clone(),
        Box::new(FfmpegVideoStreamFactory::new(FfmpegSettings::from_defaults(
            &config.capture,
        ))),
        Box::new(GifAnimationEncoder::default()),
    );
    let mut sink = DirectoryDownloadSink::new(&config.output_dir);
    let mut session = LoopSession::new(settings, 0, capture, Box::new(sink.clone()));

    let last_ms = events.last().map(|e| e.at_ms).unwrap_or(0);
    session.submit_all(to_commands(&events, 0));
    session.tick(last_ms);

    let (w, h) = session.dimensions();
    let timeline = session.timeline();
    let artifact =
        export_snapshot_png(timeline.strokes(), timeline.open_stroke(), w, h, unix_time_ms())?;

    let path = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &artifact.bytes)?;
            path
        }
        None => sink.save(&artifact)?,
    };

    println!(
        "Snapshot of {} strokes ({}x{}) written to: {}",
        timeline.len(),
        w,
        h,
        path.display()
    );
    Ok(())
}

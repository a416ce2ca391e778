//! Run a looping session over an input script.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use loopdraw_capture_engine::{
    CaptureCoordinator, CaptureEvent, FfmpegSettings, FfmpegVideoStreamFactory,
    GifAnimationEncoder, VideoStreamFactory,
};
use loopdraw_common::clock::{Millis, SessionClock};
use loopdraw_common::config::AppConfig;
use loopdraw_loop_engine::{LoopSession, SessionSettings, TickReport};
use loopdraw_render_engine::export::{encode_png, DirectoryDownloadSink};
use loopdraw_stroke_model::event::{ExportFormat, ScriptEventKind};

use super::{load_script, to_commands};

pub struct PlayOptions {
    pub script: PathBuf,
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: u32,
    pub output: Option<PathBuf>,
    pub realtime: bool,
    pub linger_cycles: u32,
    pub seed: Option<u64>,
    pub preview: Option<PathBuf>,
}

pub async fn run(options: PlayOptions, mut config: AppConfig) -> anyhow::Result<()> {
    let events = load_script(&options.script)?;

    if let Some(secs) = options.duration_secs {
        config.cycle.duration_secs = secs;
    }
    if let Some(width) = options.width {
        config.canvas.width = width;
    }
    if let Some(height) = options.height {
        config.canvas.height = height;
    }
    if let Some(seed) = options.seed {
        config.cycle.seed = Some(seed);
    }
    if let Some(output) = options.output {
        config.output_dir = output;
    }

    let settings = SessionSettings::from_config(&config);
    let ffmpeg = FfmpegVideoStreamFactory::new(FfmpegSettings::from_defaults(&config.capture));
    let wants_video = events.iter().any(|e| {
        matches!(
            e.kind,
            ScriptEventKind::Export {
                format: ExportFormat::Video
            }
        )
    });
    if wants_video && !ffmpeg.is_available() {
        tracing::warn!("ffmpeg not found; video exports in this script will fail");
    }

    println!("Playing script: {}", options.script.display());
    println!("  Events: {}", events.len());
    println!(
        "  Canvas: {}x{}, cycle {:.1}s",
        settings.width,
        settings.height,
        SessionClock::ms_to_secs(settings.duration_ms)
    );
    println!("  Output: {}", config.output_dir.display());
    println!();

    let capture = CaptureCoordinator::new(
        settings.capture.clone(),
        Box::new(ffmpeg),
        Box::new(GifAnimationEncoder::default()),
    );
    let sink = DirectoryDownloadSink::new(&config.output_dir);
    let step_ms = (1000 / options.fps.max(1) as Millis).max(1);

    let session = if options.realtime {
        run_realtime(settings, capture, sink, &events, step_ms, options.linger_cycles).await?
    } else {
        run_simulated(settings, capture, sink, &events, step_ms, options.linger_cycles)
    };

    println!();
    println!(
        "Finished at cycle {} with {} strokes ({} points)",
        session.clock().index(),
        session.timeline().len(),
        session.timeline().point_count()
    );

    if let Some(path) = options.preview {
        let bytes = encode_png(&session.compose_display())?;
        std::fs::write(&path, bytes)?;
        println!("Preview written to: {}", path.display());
    }

    Ok(())
}

/// Tracks when the session may stop: after it settles, plus lingering cycles.
struct StopPolicy {
    linger_cycles: u32,
    stop_at: Option<Millis>,
}

impl StopPolicy {
    fn new(linger_cycles: u32) -> Self {
        Self {
            linger_cycles,
            stop_at: None,
        }
    }

    fn should_stop(&mut self, session: &LoopSession, now_ms: Millis) -> bool {
        if !session.is_settled() {
            self.stop_at = None;
            return false;
        }
        let stop_at = *self.stop_at.get_or_insert_with(|| {
            now_ms.saturating_add(
                (self.linger_cycles as Millis).saturating_mul(session.clock().duration_ms()),
            )
        });
        now_ms >= stop_at
    }
}

fn run_simulated(
    settings: SessionSettings,
    capture: CaptureCoordinator,
    sink: DirectoryDownloadSink,
    events: &[loopdraw_stroke_model::event::ScriptEvent],
    step_ms: Millis,
    linger_cycles: u32,
) -> LoopSession {
    let mut session = LoopSession::new(settings, 0, capture, Box::new(sink));
    session.submit_all(to_commands(events, 0));

    let mut policy = StopPolicy::new(linger_cycles);
    let mut now = 0;
    loop {
        let report = session.tick(now);
        print_report(&session, &report);
        if policy.should_stop(&session, now) {
            break;
        }
        now += step_ms;
    }
    tracing::info!(simulated_ms = now, "Simulated playback complete");
    session
}

async fn run_realtime(
    settings: SessionSettings,
    capture: CaptureCoordinator,
    sink: DirectoryDownloadSink,
    events: &[loopdraw_stroke_model::event::ScriptEvent],
    step_ms: Millis,
    linger_cycles: u32,
) -> anyhow::Result<LoopSession> {
    let clock = SessionClock::start();
    let mut session = LoopSession::new(settings, clock.now_ms(), capture, Box::new(sink));
    session.submit_all(to_commands(events, clock.now_ms()));
    tracing::info!(epoch = clock.epoch_wall(), "Realtime playback started");

    let mut interval = tokio::time::interval(Duration::from_millis(step_ms));
    let mut policy = StopPolicy::new(linger_cycles);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock.now_ms();
                let report = session.tick(now);
                print_report(&session, &report);
                if policy.should_stop(&session, now) {
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                println!();
                println!("Interrupted.");
                break;
            }
        }
    }
    Ok(session)
}

fn print_report(session: &LoopSession, report: &TickReport) {
    for event in &report.capture_events {
        match event {
            CaptureEvent::Started { mode, cycle_index } => {
                println!();
                println!("Capture started: {mode:?} at cycle {cycle_index}");
            }
            CaptureEvent::Finished(artifact) => {
                println!();
                println!(
                    "Capture finished: {} ({} bytes, {} frames)",
                    artifact.file_name(),
                    artifact.bytes.len(),
                    artifact.frame_count.unwrap_or(0)
                );
            }
            CaptureEvent::Failed { mode, reason } => {
                println!();
                println!("Capture failed: {mode:?}: {reason}");
            }
        }
    }
    for path in &report.saved {
        println!("Saved: {}", path.display());
    }
    for failure in &report.failures {
        eprintln!("Export failed: {failure}");
    }

    let status = session.capture().status_text();
    print!(
        "\r  Cycle {:>3}  [{:<20}] {:>5.1}%  {:<26}",
        session.clock().index(),
        "=".repeat((session.cycle_progress() * 20.0) as usize),
        session.cycle_progress() * 100.0,
        status
    );
    let _ = std::io::stdout().flush();
}

//! The driving loop.
//!
//! A [`LoopSession`] owns every piece of session state (timeline, cycle
//! clock, surfaces, onion overlay, capture coordinator) and advances it one
//! display frame at a time. Inputs arrive as timestamped commands and are
//! applied at the start of the tick that reaches their timestamp.

use std::collections::VecDeque;
use std::path::PathBuf;

use image::RgbaImage;
use loopdraw_capture_engine::{
    CaptureCoordinator, CaptureEvent, CaptureMode, CapturePhase, CaptureSettings,
};
use loopdraw_common::clock::{unix_time_ms, Millis, SessionClock};
use loopdraw_common::config::AppConfig;
use loopdraw_render_engine::compositor::{compose, Layer};
use loopdraw_render_engine::export::{export_snapshot_png, Artifact, DownloadSink};
use loopdraw_render_engine::renderer::{render_live_segment, render_replay};
use loopdraw_render_engine::{OnionSkin, PaintSurface, RasterSurface};
use loopdraw_stroke_model::event::ExportFormat;
use loopdraw_stroke_model::stroke::Color;
use loopdraw_stroke_model::timeline::{CommitOutcome, StrokeHandle, TimelineStore};
use loopdraw_stroke_model::tool::{Tool, CYCLE_PALETTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::command::{SessionCommand, TimedCommand};
use crate::cycle::{CycleClock, CycleTick};

/// Background the display frame is composed on.
pub const DISPLAY_BACKGROUND: Color = Color::WHITE;

/// Session parameters.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub duration_ms: Millis,
    pub width: u32,
    pub height: u32,
    /// Subtracted from incoming pointer coordinates.
    pub origin_x: f64,
    pub origin_y: f64,
    pub onion_opacity: f32,
    /// Palette RNG seed; random when unset.
    pub seed: Option<u64>,
    pub capture: CaptureSettings,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            duration_ms: SessionClock::secs_to_ms(config.cycle.duration_secs).max(1),
            width: config.canvas.width.max(1),
            height: config.canvas.height.max(1),
            origin_x: config.canvas.origin_x,
            origin_y: config.canvas.origin_y,
            onion_opacity: config.onion.opacity,
            seed: config.cycle.seed,
            capture: CaptureSettings::from_defaults(&config.capture),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Clock state after the tick.
    pub cycle: Option<CycleTick>,
    /// Whether any rollover happened during the tick, including while
    /// applying queued commands.
    pub rolled_over: bool,
    pub commands_applied: usize,
    pub capture_events: Vec<CaptureEvent>,
    /// Artifacts handed to the download sink.
    pub saved: Vec<PathBuf>,
    /// Exports that could not be produced or saved.
    pub failures: Vec<String>,
}

impl TickReport {
    pub fn elapsed_ms(&self) -> Millis {
        self.cycle.map(|c| c.elapsed_ms).unwrap_or(0)
    }
}

pub struct LoopSession {
    settings: SessionSettings,
    timeline: TimelineStore,
    clock: CycleClock,
    tool: Tool,
    cycle_color: Color,
    rng: StdRng,
    pointer: Option<StrokeHandle>,
    width: u32,
    height: u32,
    live: RasterSurface,
    replay: RasterSurface,
    onion: OnionSkin,
    capture: CaptureCoordinator,
    sink: Box<dyn DownloadSink>,
    queue: VecDeque<TimedCommand>,
    last_elapsed_ms: Millis,
}

impl LoopSession {
    /// Start a session at `now_ms` on the session clock.
    pub fn new(
        settings: SessionSettings,
        now_ms: Millis,
        capture: CaptureCoordinator,
        sink: Box<dyn DownloadSink>,
    ) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let cycle_color = pick_color(&mut rng);
        let (width, height) = (settings.width.max(1), settings.height.max(1));

        tracing::info!(
            duration_ms = settings.duration_ms,
            width,
            height,
            seed,
            color = %cycle_color,
            "Loop session started"
        );

        Self {
            clock: CycleClock::new(now_ms, settings.duration_ms),
            timeline: TimelineStore::new(),
            tool: Tool::default(),
            cycle_color,
            rng,
            pointer: None,
            width,
            height,
            live: RasterSurface::new(width, height),
            replay: RasterSurface::new(width, height),
            onion: OnionSkin::new(width, height, settings.onion_opacity),
            capture,
            sink,
            queue: VecDeque::new(),
            last_elapsed_ms: 0,
            settings,
        }
    }

    /// Queue a command. Commands with equal timestamps keep submission order.
    pub fn submit(&mut self, command: TimedCommand) {
        let pos = self.queue.partition_point(|c| c.at_ms <= command.at_ms);
        self.queue.insert(pos, command);
    }

    /// Queue many commands.
    pub fn submit_all(&mut self, commands: impl IntoIterator<Item = TimedCommand>) {
        for command in commands {
            self.submit(command);
        }
    }

    /// Advance the session to `now_ms`.
    ///
    /// Due commands are applied first, then the clock is evaluated, the
    /// replay is rendered at the elapsed time, and finally the capture
    /// coordinator records the frame.
    pub fn tick(&mut self, now_ms: Millis) -> TickReport {
        let mut report = TickReport::default();

        while self.queue.front().is_some_and(|c| c.at_ms <= now_ms) {
            if let Some(command) = self.queue.pop_front() {
                self.apply(command, &mut report);
                report.commands_applied += 1;
            }
        }

        let cycle = self.advance_clock(now_ms, &mut report);
        render_replay(&mut self.replay, self.timeline.strokes(), cycle.elapsed_ms);
        self.last_elapsed_ms = cycle.elapsed_ms;

        if let Some(event) = self.capture.on_tick(
            now_ms,
            cycle.elapsed_ms,
            self.clock.duration_ms(),
            &self.replay,
        ) {
            self.handle_capture_event(event, &mut report);
        }

        report.cycle = Some(cycle);
        report
    }

    fn advance_clock(&mut self, now_ms: Millis, report: &mut TickReport) -> CycleTick {
        let cycle = self.clock.tick(now_ms);
        if cycle.rolled_over {
            report.rolled_over = true;
            self.cycle_color = pick_color(&mut self.rng);
            self.live.clear();
            tracing::info!(cycle = cycle.index, color = %self.cycle_color, "Cycle rolled over");
            if let Some(event) = self
                .capture
                .on_rollover(cycle.index, self.width, self.height)
            {
                self.handle_capture_event(event, report);
            }
        }
        cycle
    }

    fn apply(&mut self, command: TimedCommand, report: &mut TickReport) {
        let at_ms = command.at_ms;
        // Evaluate the boundary first so points are stamped in the right cycle.
        self.advance_clock(at_ms, report);

        match command.command {
            SessionCommand::PointerDown { x, y } => self.pointer_down(at_ms, x, y),
            SessionCommand::PointerMove { x, y } => self.pointer_move(at_ms, x, y),
            SessionCommand::PointerUp => self.pointer_up(),
            SessionCommand::SetTool(tool) => {
                self.tool = tool;
                tracing::debug!(?tool, "Tool selected");
            }
            SessionCommand::SetDuration(ms) => {
                if self.clock.set_duration(ms) {
                    tracing::info!(duration_ms = ms, "Cycle duration changed");
                }
            }
            SessionCommand::ToggleOnion => {
                let enabled = self.onion.toggle(self.timeline.strokes());
                tracing::info!(enabled, "Onion skin toggled");
            }
            SessionCommand::Clear => self.clear(at_ms),
            SessionCommand::Export(format) => self.export(format, report),
            SessionCommand::CancelExport => {
                if self.capture.cancel() {
                    tracing::info!("Export cancelled");
                }
            }
            SessionCommand::Resize { width, height } => self.resize(width, height),
        }
    }

    fn pointer_down(&mut self, at_ms: Millis, x: f64, y: f64) {
        let color = self.tool.stroke_color(self.cycle_color);
        let handle = match self.timeline.begin_stroke(color, self.tool.is_eraser()) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring pointer down");
                return;
            }
        };
        let (x, y) = self.to_canvas(x, y);
        self.timeline
            .append_point(handle, x, y, self.clock.elapsed_at(at_ms));
        self.pointer = Some(handle);
    }

    fn pointer_move(&mut self, at_ms: Millis, x: f64, y: f64) {
        let Some(handle) = self.pointer else {
            return;
        };
        let (x, y) = self.to_canvas(x, y);
        if !self
            .timeline
            .append_point(handle, x, y, self.clock.elapsed_at(at_ms))
        {
            self.pointer = None;
            return;
        }
        if let Some(stroke) = self.timeline.open_stroke() {
            render_live_segment(&mut self.live, stroke);
        }
    }

    fn pointer_up(&mut self) {
        let Some(handle) = self.pointer.take() else {
            return;
        };
        match self.timeline.commit_stroke(handle) {
            CommitOutcome::Committed { index } => {
                if let Some(stroke) = self.timeline.stroke(index) {
                    tracing::debug!(index, points = stroke.points.len(), "Stroke committed");
                    self.onion.on_stroke_committed(stroke);
                }
            }
            CommitOutcome::Discarded => tracing::debug!("Empty stroke discarded"),
            CommitOutcome::Ignored => tracing::debug!("Ignoring pointer up for stale stroke"),
        }
    }

    fn clear(&mut self, at_ms: Millis) {
        let removed = self.timeline.clear();
        self.pointer = None;
        self.clock.reset_for_clear(at_ms);
        self.cycle_color = pick_color(&mut self.rng);
        self.live.clear();
        self.replay.clear();
        self.onion.clear();
        tracing::info!(removed, color = %self.cycle_color, "Canvas cleared");
    }

    fn export(&mut self, format: ExportFormat, report: &mut TickReport) {
        match format {
            ExportFormat::Png => {
                let result = export_snapshot_png(
                    self.timeline.strokes(),
                    self.timeline.open_stroke(),
                    self.width,
                    self.height,
                    unix_time_ms(),
                );
                match result {
                    Ok(artifact) => self.save_artifact(&artifact, report),
                    Err(e) => {
                        tracing::warn!(error = %e, "Snapshot export failed");
                        report.failures.push(e.to_string());
                    }
                }
            }
            ExportFormat::Video => {
                self.capture.arm(CaptureMode::Video);
            }
            ExportFormat::Gif => {
                self.capture.arm(CaptureMode::Gif);
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "Ignoring empty resize");
            return;
        }
        self.width = width;
        self.height = height;
        self.live.resize(width, height);
        self.replay.resize(width, height);
        self.onion.resize(width, height);
        tracing::info!(width, height, "Canvas resized");
    }

    fn handle_capture_event(&mut self, event: CaptureEvent, report: &mut TickReport) {
        match &event {
            CaptureEvent::Finished(artifact) => self.save_artifact(artifact, report),
            CaptureEvent::Failed { reason, .. } => report.failures.push(reason.clone()),
            CaptureEvent::Started { .. } => {}
        }
        report.capture_events.push(event);
    }

    fn save_artifact(&mut self, artifact: &Artifact, report: &mut TickReport) {
        match self.sink.save(artifact) {
            Ok(path) => report.saved.push(path),
            Err(e) => {
                tracing::warn!(error = %e, file = %artifact.file_name(), "Failed to save artifact");
                report.failures.push(e.to_string());
            }
        }
    }

    fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.settings.origin_x, y - self.settings.origin_y)
    }

    /// White background, onion overlay at its opacity, replay, then live strokes.
    pub fn compose_display(&self) -> RgbaImage {
        compose(
            self.width,
            self.height,
            DISPLAY_BACKGROUND,
            &[
                Layer {
                    surface: self.onion.surface(),
                    opacity: self.onion.opacity(),
                },
                Layer::opaque(&self.replay),
                Layer::opaque(&self.live),
            ],
        )
    }

    /// No queued commands and no capture armed or running.
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.capture.phase() == CapturePhase::Idle
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn timeline(&self) -> &TimelineStore {
        &self.timeline
    }

    pub fn clock(&self) -> &CycleClock {
        &self.clock
    }

    pub fn capture(&self) -> &CaptureCoordinator {
        &self.capture
    }

    pub fn onion(&self) -> &OnionSkin {
        &self.onion
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn cycle_color(&self) -> Color {
        self.cycle_color
    }

    pub fn live_surface(&self) -> &RasterSurface {
        &self.live
    }

    pub fn replay_surface(&self) -> &RasterSurface {
        &self.replay
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Elapsed time the replay was last rendered at.
    pub fn last_elapsed_ms(&self) -> Millis {
        self.last_elapsed_ms
    }

    /// Progress bar value for the current cycle.
    pub fn cycle_progress(&self) -> f64 {
        self.clock.progress(self.last_elapsed_ms)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

fn pick_color(rng: &mut StdRng) -> Color {
    CYCLE_PALETTE[rng.random_range(0..CYCLE_PALETTE.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopdraw_capture_engine::{GifAnimationEncoder, VideoStream, VideoStreamFactory};
    use loopdraw_common::error::{LoopdrawError, LoopdrawResult};
    use std::sync::{Arc, Mutex};

    struct NoVideo;

    impl VideoStreamFactory for NoVideo {
        fn open(&mut self, _w: u32, _h: u32, _fps: u32) -> LoopdrawResult<Box<dyn VideoStream>> {
            Err(LoopdrawError::capture("video disabled in tests"))
        }

        fn is_available(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        saved: Arc<Mutex<Vec<Artifact>>>,
    }

    impl DownloadSink for MemorySink {
        fn save(&mut self, artifact: &Artifact) -> LoopdrawResult<PathBuf> {
            self.saved.lock().unwrap().push(artifact.clone());
            Ok(PathBuf::from(artifact.file_name()))
        }
    }

    fn session(duration_ms: Millis) -> (LoopSession, MemorySink) {
        let settings = SessionSettings {
            duration_ms,
            width: 64,
            height: 48,
            seed: Some(7),
            ..SessionSettings::default()
        };
        let sink = MemorySink::default();
        let capture = CaptureCoordinator::new(
            settings.capture.clone(),
            Box::new(NoVideo),
            Box::new(GifAnimationEncoder::default()),
        );
        (
            LoopSession::new(settings, 0, capture, Box::new(sink.clone())),
            sink,
        )
    }

    fn cmd(at_ms: Millis, command: SessionCommand) -> TimedCommand {
        TimedCommand::new(at_ms, command)
    }

    #[test]
    fn test_points_are_stamped_with_cycle_time_and_origin() {
        let (mut s, _) = session(1000);
        s.settings.origin_x = 10.0;
        s.submit_all([
            cmd(100, SessionCommand::PointerDown { x: 20.0, y: 5.0 }),
            cmd(150, SessionCommand::PointerMove { x: 30.0, y: 5.0 }),
            cmd(200, SessionCommand::PointerUp),
        ]);
        let report = s.tick(200);
        assert_eq!(report.commands_applied, 3);

        let stroke = &s.timeline().strokes()[0];
        assert_eq!(stroke.color, s.cycle_color());
        assert_eq!(stroke.points[0].x, 10.0);
        assert_eq!(stroke.points[0].t, 100);
        assert_eq!(stroke.points[1].t, 150);
        assert!(!s.live_surface().is_blank());
    }

    #[test]
    fn test_submit_orders_by_time() {
        let (mut s, _) = session(1000);
        s.submit(cmd(300, SessionCommand::PointerUp));
        s.submit(cmd(100, SessionCommand::PointerDown { x: 1.0, y: 1.0 }));
        s.submit(cmd(300, SessionCommand::ToggleOnion));
        assert_eq!(s.pending_commands(), 3);

        s.tick(100);
        assert_eq!(s.pending_commands(), 2);
        assert!(s.timeline().open_stroke().is_some());
        s.tick(300);
        assert_eq!(s.timeline().len(), 1);
        assert!(s.onion().is_enabled());
    }

    #[test]
    fn test_eraser_strokes_are_white() {
        let (mut s, _) = session(1000);
        s.submit_all([
            cmd(0, SessionCommand::SetTool(Tool::Eraser)),
            cmd(10, SessionCommand::PointerDown { x: 1.0, y: 1.0 }),
            cmd(20, SessionCommand::PointerUp),
        ]);
        s.tick(20);
        let stroke = &s.timeline().strokes()[0];
        assert!(stroke.is_eraser);
        assert_eq!(stroke.color, Color::WHITE);
    }

    #[test]
    fn test_rollover_clears_live_surface() {
        let (mut s, _) = session(500);
        s.submit_all([
            cmd(10, SessionCommand::PointerDown { x: 5.0, y: 5.0 }),
            cmd(20, SessionCommand::PointerMove { x: 25.0, y: 5.0 }),
            cmd(30, SessionCommand::PointerUp),
        ]);
        s.tick(30);
        assert!(!s.live_surface().is_blank());

        let report = s.tick(500);
        assert!(report.rolled_over);
        assert_eq!(s.clock().index(), 2);
        assert!(s.live_surface().is_blank());
    }

    #[test]
    fn test_png_export_saves_immediately() {
        let (mut s, sink) = session(1000);
        s.submit_all([
            cmd(0, SessionCommand::PointerDown { x: 5.0, y: 5.0 }),
            cmd(10, SessionCommand::PointerMove { x: 25.0, y: 5.0 }),
            cmd(20, SessionCommand::Export(ExportFormat::Png)),
        ]);
        let report = s.tick(20);
        assert_eq!(report.saved.len(), 1);

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved[0].kind, loopdraw_render_engine::ArtifactKind::Snapshot);
        let decoded = image::load_from_memory(&saved[0].bytes).unwrap().to_rgba8();
        // The open stroke is part of the snapshot.
        assert_ne!(decoded.get_pixel(15, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_video_export_without_encoder_fails_at_rollover() {
        let (mut s, _) = session(200);
        s.submit(cmd(0, SessionCommand::Export(ExportFormat::Video)));
        s.tick(0);
        assert_eq!(s.capture().phase(), CapturePhase::ArmedWaiting);

        let report = s.tick(200);
        assert!(matches!(
            report.capture_events.as_slice(),
            [CaptureEvent::Failed { .. }]
        ));
        assert_eq!(report.failures.len(), 1);
        assert!(s.is_settled());
    }

    #[test]
    fn test_cancel_export() {
        let (mut s, _) = session(200);
        s.submit_all([
            cmd(0, SessionCommand::Export(ExportFormat::Gif)),
            cmd(50, SessionCommand::CancelExport),
        ]);
        s.tick(0);
        assert!(!s.is_settled());
        s.tick(50);
        assert!(s.is_settled());
        assert_eq!(s.capture().status_text(), "");
    }

    #[test]
    fn test_resize_preserves_drawing() {
        let (mut s, _) = session(1000);
        s.submit_all([
            cmd(0, SessionCommand::PointerDown { x: 5.0, y: 5.0 }),
            cmd(10, SessionCommand::PointerMove { x: 25.0, y: 5.0 }),
            cmd(20, SessionCommand::Resize {
                width: 100,
                height: 80,
            }),
            cmd(30, SessionCommand::Resize {
                width: 0,
                height: 80,
            }),
        ]);
        s.tick(30);
        assert_eq!(s.dimensions(), (100, 80));
        assert_eq!(s.live_surface().image().dimensions(), (100, 80));
        assert!(!s.live_surface().is_blank());
        assert_eq!(s.compose_display().dimensions(), (100, 80));
    }

    #[test]
    fn test_onion_layer_shows_in_display() {
        let (mut s, _) = session(1000);
        s.submit_all([
            cmd(0, SessionCommand::ToggleOnion),
            cmd(10, SessionCommand::PointerDown { x: 5.0, y: 20.0 }),
            cmd(20, SessionCommand::PointerMove { x: 40.0, y: 20.0 }),
            cmd(30, SessionCommand::PointerUp),
        ]);
        s.tick(30);
        assert!(!s.onion().surface().is_blank());

        // Live and replay layers hidden after rollover; only the onion remains.
        s.tick(1000);
        s.tick(1001);
        let frame = s.compose_display();
        let px = frame.get_pixel(20, 20).0;
        assert!(px[0] > 150 && px[0] < 255, "pixel = {px:?}");
    }
}

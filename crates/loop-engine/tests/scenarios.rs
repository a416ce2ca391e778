use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use loopdraw_capture_engine::{
    CaptureCoordinator, CaptureEvent, CaptureMode, CapturePhase, FfmpegSettings,
    FfmpegVideoStreamFactory, GifAnimationEncoder,
};
use loopdraw_common::clock::Millis;
use loopdraw_common::config::CaptureDefaults;
use loopdraw_common::error::LoopdrawResult;
use loopdraw_loop_engine::{LoopSession, SessionCommand, SessionSettings, TimedCommand};
use loopdraw_render_engine::{Artifact, ArtifactKind, DirectoryDownloadSink, DownloadSink};
use loopdraw_stroke_model::event::{parse_script, ExportFormat};

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

fn settings(duration_ms: Millis, width: u32, height: u32) -> SessionSettings {
    SessionSettings {
        duration_ms,
        width,
        height,
        seed: Some(42),
        ..SessionSettings::default()
    }
}

fn coordinator(settings: &SessionSettings) -> CaptureCoordinator {
    let mut ffmpeg = FfmpegSettings::from_defaults(&CaptureDefaults::default());
    ffmpeg.binary = "loopdraw-missing-ffmpeg".to_string();
    CaptureCoordinator::new(
        settings.capture.clone(),
        Box::new(FfmpegVideoStreamFactory::new(ffmpeg)),
        Box::new(GifAnimationEncoder::default()),
    )
}

fn session_with(settings: SessionSettings, sink: Box<dyn DownloadSink>) -> LoopSession {
    let capture = coordinator(&settings);
    LoopSession::new(settings, 0, capture, sink)
}

fn cmd(at_ms: Millis, command: SessionCommand) -> TimedCommand {
    TimedCommand::new(at_ms, command)
}

fn alpha_at(session: &LoopSession, x: u32, y: u32) -> u8 {
    session.replay_surface().image().get_pixel(x, y).0[3]
}

#[test]
fn replay_clips_by_elapsed_and_restarts_each_cycle() {
    let mut session = session_with(settings(1000, 120, 40), Box::new(MemorySink::default()));
    session.submit_all([
        cmd(0, SessionCommand::PointerDown { x: 10.0, y: 10.0 }),
        cmd(200, SessionCommand::PointerMove { x: 50.0, y: 10.0 }),
        cmd(400, SessionCommand::PointerMove { x: 90.0, y: 10.0 }),
        cmd(450, SessionCommand::PointerUp),
    ]);
    session.tick(450);
    assert_eq!(session.timeline().len(), 1);

    let report = session.tick(1000);
    assert!(report.rolled_over);
    assert_eq!(session.clock().index(), 2);
    assert_eq!(report.elapsed_ms(), 0);
    assert!(session.replay_surface().is_blank());

    let report = session.tick(1300);
    assert_eq!(report.elapsed_ms(), 300);
    assert_eq!(alpha_at(&session, 30, 10), 255);
    assert_eq!(alpha_at(&session, 70, 10), 0);

    session.tick(1500);
    assert_eq!(alpha_at(&session, 70, 10), 255);
}

#[test]
fn gif_export_records_exactly_one_cycle() {
    let dir = std::env::temp_dir().join("loopdraw_test_gif_scenario");
    let _ = std::fs::remove_dir_all(&dir);

    let mut session = session_with(
        settings(1000, 80, 60),
        Box::new(DirectoryDownloadSink::new(&dir)),
    );
    session.submit_all([
        cmd(0, SessionCommand::PointerDown { x: 5.0, y: 5.0 }),
        cmd(300, SessionCommand::PointerMove { x: 70.0, y: 50.0 }),
        cmd(320, SessionCommand::PointerUp),
        cmd(100, SessionCommand::Export(ExportFormat::Gif)),
    ]);

    let mut events = Vec::new();
    let mut saved = Vec::new();
    let mut now = 0;
    while now <= 3000 {
        let report = session.tick(now);
        events.extend(report.capture_events);
        saved.extend(report.saved);
        if now == 112 {
            assert_eq!(session.capture().phase(), CapturePhase::ArmedWaiting);
            assert_eq!(session.capture().status_text(), "Waiting for next cycle...");
        }
        now += 16;
    }

    let started = events.iter().find_map(|e| match e {
        CaptureEvent::Started { mode, cycle_index } => Some((*mode, *cycle_index)),
        _ => None,
    });
    assert_eq!(started, Some((CaptureMode::Gif, 2)));

    let artifact = events
        .iter()
        .find_map(|e| match e {
            CaptureEvent::Finished(a) => Some(a.clone()),
            _ => None,
        })
        .expect("gif should finish");
    assert_eq!(artifact.kind, ArtifactKind::Gif);
    assert_eq!((artifact.width, artifact.height), (40, 30));
    let frames = artifact.frame_count.unwrap();
    assert!((9..=11).contains(&frames), "frames = {frames}");

    assert_eq!(saved.len(), 1);
    let name = saved[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("loopdraw-gif-") && name.ends_with(".gif"));
    assert_eq!(std::fs::read(&saved[0]).unwrap(), artifact.bytes);
    assert!(session.is_settled());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn clear_mid_stroke_discards_open_stroke_and_resets_cycle() {
    let mut session = session_with(settings(1000, 100, 100), Box::new(MemorySink::default()));
    session.submit_all([
        cmd(0, SessionCommand::PointerDown { x: 10.0, y: 10.0 }),
        cmd(50, SessionCommand::PointerMove { x: 60.0, y: 10.0 }),
        cmd(100, SessionCommand::PointerUp),
    ]);
    for now in [100, 1000, 2000, 2500] {
        session.tick(now);
    }
    assert_eq!(session.clock().index(), 3);

    session.submit_all([
        cmd(2600, SessionCommand::PointerDown { x: 10.0, y: 50.0 }),
        cmd(2650, SessionCommand::PointerMove { x: 60.0, y: 50.0 }),
        cmd(2700, SessionCommand::Clear),
        cmd(2750, SessionCommand::PointerMove { x: 90.0, y: 50.0 }),
        cmd(2800, SessionCommand::PointerUp),
    ]);
    session.tick(2800);

    assert!(session.timeline().is_empty());
    assert!(session.timeline().open_stroke().is_none());
    assert_eq!(session.clock().index(), 1);
    assert_eq!(session.clock().elapsed_at(2800), 100);
    assert!(session.live_surface().is_blank());

    session.submit_all([
        cmd(2900, SessionCommand::PointerDown { x: 10.0, y: 90.0 }),
        cmd(2950, SessionCommand::PointerMove { x: 40.0, y: 90.0 }),
        cmd(3000, SessionCommand::PointerUp),
    ]);
    session.tick(3000);
    assert_eq!(session.timeline().len(), 1);
    assert_eq!(session.timeline().strokes()[0].points[0].t, 200);
}

#[test]
fn video_export_without_ffmpeg_returns_to_idle() {
    let mut session = session_with(settings(200, 32, 32), Box::new(MemorySink::default()));
    session.submit(cmd(0, SessionCommand::Export(ExportFormat::Video)));
    session.tick(0);
    session.submit(cmd(10, SessionCommand::Export(ExportFormat::Gif)));
    session.tick(10);
    assert_eq!(session.capture().mode(), Some(CaptureMode::Video));

    let report = session.tick(200);
    assert!(matches!(
        report.capture_events.as_slice(),
        [CaptureEvent::Failed {
            mode: CaptureMode::Video,
            ..
        }]
    ));
    assert!(session.is_settled());
}

#[test]
fn fixture_script_drives_session() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("scripts")
        .join("two-cycles.jsonl");
    let content = std::fs::read_to_string(path).expect("fixture script should be readable");
    let events = parse_script(&content).expect("fixture script should parse");

    let sink = MemorySink::default();
    let mut session = session_with(settings(30_000, 160, 100), Box::new(sink.clone()));
    session.submit_all(events.iter().map(|e| TimedCommand::from_script_event(e, 0)));

    let mut now = 0;
    while now <= 4000 && !(session.is_settled() && now > 1000) {
        session.tick(now);
        now += 33;
    }

    assert_eq!(session.clock().duration_ms(), 1000);
    assert_eq!(session.timeline().len(), 3);
    assert!(session.timeline().strokes()[2].is_eraser);
    assert!(session.onion().is_enabled());

    let saved = sink.saved.lock().unwrap();
    let kinds: Vec<_> = saved.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ArtifactKind::Snapshot, ArtifactKind::Gif]);
}

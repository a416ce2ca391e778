//! Check export capabilities.

use loopdraw_capture_engine::command_exists;
use loopdraw_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("LoopDraw System Check");
    println!("{}", "=".repeat(50));

    println!("[OK] PNG snapshot export");
    println!("[OK] GIF export");

    if command_exists("ffmpeg") {
        println!(
            "[OK] ffmpeg found: WebM export via {} at {} kbps",
            config.capture.video_codec, config.capture.video_bitrate_kbps
        );
    } else {
        println!("[WARN] ffmpeg not found: video export unavailable");
        println!("       Install ffmpeg with libvpx to enable WebM loops.");
    }

    println!();
    let config_path = config_file_path();
    if config_path.exists() {
        println!("Config: {}", config_path.display());
    } else {
        println!("Config: {} (not present, using defaults)", config_path.display());
    }
    println!("Exports: {}", config.output_dir.display());

    Ok(())
}

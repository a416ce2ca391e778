//! Show or persist the effective configuration.

use loopdraw_common::config::AppConfig;

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        let path = config.save()?;
        println!();
        println!("Config written to: {}", path.display());
    }
    Ok(())
}

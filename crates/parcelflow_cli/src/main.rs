//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `parcelflow_core` wiring: config, logging, storage, migrations.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `parcelflow_cli [config.toml]` (defaults to `parcelflow.toml`).

use log::info;
use parcelflow_core::db::migrations::{latest_version, schema_version};
use parcelflow_core::{core_version, init_logging, open_db_in_memory, open_db_with_busy_timeout};
use parcelflow_core::EngineConfig;
use std::error::Error;
use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "parcelflow.toml";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parcelflow_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = EngineConfig::load(&config_path)?;

    let log_dir = std::env::temp_dir().join("parcelflow-logs");
    init_logging(&config.log_level, &log_dir.to_string_lossy())?;

    let conn = match &config.database_path {
        Some(path) => open_db_with_busy_timeout(path, config.busy_timeout())?,
        None => open_db_in_memory()?,
    };
    let version = schema_version(&conn)?;
    info!("event=cli_probe module=cli status=ok schema_version={version}");

    println!("parcelflow_core version={}", core_version());
    println!(
        "parcelflow_core schema_version={version} latest={}",
        latest_version()
    );
    println!(
        "parcelflow_core storage={}",
        config
            .database_path
            .as_ref()
            .map_or_else(|| "memory".to_string(), |path| path.display().to_string())
    );
    Ok(())
}

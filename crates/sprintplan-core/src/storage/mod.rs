mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, NarrativeConfig, PlannerConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable that overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "SPRINTPLAN_DATA_DIR";

/// Set to `dev` to use the development data directory.
pub const PROFILE_ENV: &str = "SPRINTPLAN_ENV";

/// Returns `~/.config/sprintplan[-dev]/`, or `$SPRINTPLAN_DATA_DIR` when set.
///
/// The directory is created if missing.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var(PROFILE_ENV).unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("sprintplan-dev")
            } else {
                base_dir.join("sprintplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

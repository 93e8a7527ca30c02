mod config;
pub mod database;
pub mod migrations;
pub mod record_store;
pub mod session_store;

pub use config::{
    Config, NotificationsConfig, RecordsConfig, SessionConfig, SignalsConfig, MAX_SIGNAL_DELAY_MS,
};
pub use database::Database;
pub use record_store::RecordStore;
pub use session_store::SessionStore;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `JARAGO_DATA_DIR` overrides the location outright. Otherwise it is
/// `~/.config/jarago`, or `~/.config/jarago-dev` when `JARAGO_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("JARAGO_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("JARAGO_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("jarago-dev")
            } else {
                base_dir.join("jarago")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Application configuration.
//!
//! This module manages the application configuration file. Every field has a
//! default, so a file written by an older version still loads.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    queue::CursorPolicy,
    session::{SessionSettings, SkipPrevious},
};

const CONFIG_NAME: &str = "chooplay";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    pub media_dirs: Vec<String>,
    pub database_file: String,
    /// File extensions a scan picks up, compared case-insensitively.
    pub extensions: Vec<String>,
    pub cursor_policy: CursorPolicy,
    pub skip_previous: SkipPrevious,
    pub stale_tick_tolerance_ms: u64,
    pub scan_on_start: bool,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            media_dirs: vec![],
            database_file: "music.db".to_string(),
            extensions: ["mp3", "flac", "ogg", "opus", "m4a", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            cursor_policy: CursorPolicy::default(),
            skip_previous: SkipPrevious::default(),
            stale_tick_tolerance_ms: 500,
            scan_on_start: false,
            log_filter: "chooplay=info".to_string(),
        }
    }
}

impl AppConfig {
    pub(crate) fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            stale_tick_tolerance_ms: self.stale_tick_tolerance_ms,
            skip_previous: self.skip_previous,
        }
    }
}

pub fn load_config() -> AppConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    })
}

pub fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}

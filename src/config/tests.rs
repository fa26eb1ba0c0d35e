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

use super::*;

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chooplay.toml");
    std::fs::write(&path, "version = 1\ncursor_policy = \"wrap\"\n").unwrap();

    let config: AppConfig = confy::load_path(&path).unwrap();

    assert_eq!(config.cursor_policy, CursorPolicy::Wrap);
    assert_eq!(config.skip_previous, SkipPrevious::PreviousEntry);
    assert_eq!(config.stale_tick_tolerance_ms, 500);
    assert_eq!(config.database_file, "music.db");
    assert!(config.extensions.iter().any(|e| e == "flac"));
}

#[test]
fn store_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chooplay.toml");

    let config = AppConfig {
        media_dirs: vec!["/srv/music".to_string()],
        skip_previous: SkipPrevious::RestartAfter(3000),
        scan_on_start: true,
        ..AppConfig::default()
    };
    confy::store_path(&path, &config).unwrap();

    let reloaded: AppConfig = confy::load_path(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn session_settings() {
    let config = AppConfig {
        skip_previous: SkipPrevious::RestartTrack,
        stale_tick_tolerance_ms: 250,
        ..AppConfig::default()
    };

    let settings = config.session_settings();
    assert_eq!(settings.skip_previous, SkipPrevious::RestartTrack);
    assert_eq!(settings.stale_tick_tolerance_ms, 250);
}

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

//! Test doubles shared by the session and dispatcher tests.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Result, bail};
use tempfile::TempDir;

use crate::{
    db,
    library::Library,
    model::{Track, TrackId},
    player::MediaBackend,
    session::SessionToken,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendCall {
    Load(SessionToken, PathBuf),
    Play,
    Pause,
    Seek(u64),
    Release,
}

/// A backend that records every call and never produces events on its own.
#[derive(Clone, Default)]
pub(crate) struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    fail_loads: Arc<Mutex<bool>>,
}

impl RecordingBackend {
    pub(crate) fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn releases(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == BackendCall::Release)
            .count()
    }

    pub(crate) fn loads(&self) -> Vec<SessionToken> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Load(token, _) => Some(*token),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Makes every following `load` call fail synchronously.
    pub(crate) fn fail_loads(&self) {
        *self.fail_loads.lock().unwrap() = true;
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaBackend for RecordingBackend {
    fn load(&mut self, token: SessionToken, locator: &Path) -> Result<()> {
        if *self.fail_loads.lock().unwrap() {
            bail!("device unavailable");
        }
        self.record(BackendCall::Load(token, locator.to_path_buf()));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(BackendCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(BackendCall::Pause);
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.record(BackendCall::Seek(position_ms));
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.record(BackendCall::Release);
        Ok(())
    }
}

pub(crate) fn sample_track(n: u64) -> Track {
    Track {
        id: TrackId(n),
        locator: PathBuf::from(format!("/music/track-{}.flac", n)),
        duration_ms: Some(180_000),
        title: format!("Track {}", n),
        artist: Some("The Testers".to_string()),
        album: Some("Fixtures".to_string()),
        genre: None,
        year: Some(2026),
    }
}

/// A library in a temporary directory, holding tracks `1..=count`.
pub(crate) struct TestLibrary {
    pub(crate) dir: TempDir,
    pub(crate) library: Arc<Library>,
}

impl TestLibrary {
    pub(crate) fn with_tracks(count: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_database(&dir.path().join("library.db")).unwrap();
        let library = Library::with_connection(conn).unwrap();

        for n in 1..=count {
            library.upsert(sample_track(n)).unwrap();
        }

        Self {
            dir,
            library: Arc::new(library),
        }
    }

    pub(crate) fn database_path(&self) -> PathBuf {
        self.dir.path().join("library.db")
    }
}

/// Writes `samples` of 8 kHz mono 16-bit silence as a PCM WAV file.
pub(crate) fn write_wav(path: &Path, samples: u32) {
    let data_len = samples * 2;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&8_000u32.to_le_bytes());
    bytes.extend_from_slice(&16_000u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);

    std::fs::write(path, bytes).unwrap();
}

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

//! The library index.
//!
//! The [`Library`] is the single owner of [`Track`] records. Everything else
//! in the engine holds a [`TrackId`] and resolves it here.
//!
//! # Concurrency
//!
//! Lookups are served from an in-memory map behind an [`RwLock`], so any
//! thread can resolve a track without waiting on SQLite. Writes go to the
//! database first, through the library's own connection mutex, and only then
//! update the map. None of this shares a lock with the playback session.


use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError, RwLock},
};

use anyhow::Context;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
    db::{
        self,
        scan::{self, ScanOutcome},
    },
    error::{Error, Result},
    model::{LibraryTotals, Track, TrackId, TrackStats},
};

/// Totals from importing a directory into the library.
#[derive(Debug, Default)]
pub(crate) struct ScanReport {
    pub(crate) discovered: usize,
    pub(crate) failed: Vec<(PathBuf, String)>,
    /// Tracks under the scanned root whose files are gone.
    pub(crate) removed: usize,
}

pub(crate) struct Library {
    tracks: RwLock<HashMap<TrackId, Track>>,
    conn: Mutex<Connection>,
}

impl Library {
    /// Opens the library stored at `path`, loading every present track into
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or read.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = db::open_database(path).context("Failed to open library")?;
        Self::with_connection(conn)
    }

    pub(crate) fn with_connection(conn: Connection) -> Result<Self> {
        let tracks: HashMap<TrackId, Track> = db::fetch_tracks(&conn)?
            .into_iter()
            .map(|track| (track.id, track))
            .collect();

        info!(count = tracks.len(), "Library loaded");

        Ok(Self {
            tracks: RwLock::new(tracks),
            conn: Mutex::new(conn),
        })
    }

    /// Resolves a track id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown or was removed.
    pub(crate) fn lookup(&self, id: TrackId) -> Result<Track> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    pub(crate) fn contains(&self, id: TrackId) -> bool {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Inserts or replaces a track by id.
    ///
    /// Calling this twice with the same track leaves the library unchanged.
    pub(crate) fn upsert(&self, track: Track) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.connection();
        db::upsert_track(&conn, &track, now)?;

        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(track.id, track);

        Ok(())
    }

    /// Marks a track as absent.
    ///
    /// Queue entries referring to the track are left alone; playing one later
    /// surfaces as a missing-track error.
    ///
    /// Returns `true` if the track was present.
    pub(crate) fn remove(&self, id: TrackId) -> Result<bool> {
        let conn = self.connection();
        let removed = db::mark_removed(&conn, id)?;

        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        Ok(removed)
    }

    /// Lazily scans `root` for audio files, without touching the library.
    pub(crate) fn scan(root: &Path, extensions: &[String]) -> impl Iterator<Item = ScanOutcome> + use<> {
        scan::scan(root, extensions)
    }

    /// Scans `root` and upserts every discovered track.
    ///
    /// Individual file failures are collected in the report and never stop
    /// the import. Tracks previously found under `root` whose files no longer
    /// exist are then removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to the library fails.
    pub(crate) fn import(&self, root: &Path, extensions: &[String]) -> Result<ScanReport> {
        info!(root = %root.display(), "Scanning library directory");

        let mut report = ScanReport::default();
        let mut seen = HashSet::new();

        for outcome in Self::scan(root, extensions) {
            match outcome {
                ScanOutcome::Discovered(track) => {
                    debug!(id = %track.id, path = %track.locator.display(), "Discovered track");
                    seen.insert(track.id);
                    self.upsert(track)?;
                    report.discovered += 1;
                }
                ScanOutcome::Failed { locator, cause } => {
                    warn!(path = %locator.display(), %cause, "Skipping file");
                    report.failed.push((locator, cause));
                }
            }
        }

        // An unmounted root says nothing about its files.
        let vanished = if root.is_dir() {
            self.vanished_under(root, &seen)
        } else {
            Vec::new()
        };
        for id in vanished {
            if self.remove(id)? {
                info!(%id, "Removed track whose file is gone");
                report.removed += 1;
            }
        }

        info!(
            root = %root.display(),
            discovered = report.discovered,
            failed = report.failed.len(),
            removed = report.removed,
            "Scan finished"
        );

        Ok(report)
    }

    /// Records the duration reported by the backend, if it differs from what
    /// the scan found.
    pub(crate) fn refine_duration(&self, id: TrackId, duration_ms: u64) -> Result<()> {
        let mut track = self.lookup(id)?;
        if track.duration_ms == Some(duration_ms) {
            return Ok(());
        }

        debug!(%id, duration_ms, "Refining track duration");
        let conn = self.connection();
        db::update_duration(&conn, id, duration_ms)?;

        track.duration_ms = Some(duration_ms);
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, track);

        Ok(())
    }

    /// Bumps the play count and last played time of a track.
    pub(crate) fn record_play(&self, id: TrackId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        db::increment_play_count(&self.connection(), id, now)?;
        Ok(())
    }

    pub(crate) fn set_favourite(&self, id: TrackId, favourite: bool) -> Result<()> {
        // Fail on unknown ids rather than creating orphan stats rows.
        self.lookup(id)?;
        db::update_favourite(&self.connection(), id, favourite)?;
        Ok(())
    }

    pub(crate) fn stats(&self, id: TrackId) -> Result<TrackStats> {
        Ok(db::fetch_stats(&self.connection(), id)?)
    }

    pub(crate) fn most_played(&self, limit: usize) -> Result<Vec<(Track, u32)>> {
        let rows = db::fetch_most_played(&self.connection(), limit)?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, count)| self.lookup(id).ok().map(|track| (track, count)))
            .collect())
    }

    pub(crate) fn search(&self, text: &str) -> Result<Vec<Track>> {
        Ok(db::search_tracks(&self.connection(), text)?)
    }

    pub(crate) fn favourites(&self) -> Result<Vec<Track>> {
        Ok(db::fetch_favourites(&self.connection())?)
    }

    /// The latest played tracks with the time they were played, in
    /// milliseconds since the epoch.
    pub(crate) fn recently_played(&self, limit: usize) -> Result<Vec<(Track, i64)>> {
        Ok(db::fetch_recently_played(&self.connection(), limit)?)
    }

    pub(crate) fn recently_added(&self, limit: usize) -> Result<Vec<Track>> {
        Ok(db::fetch_recently_added(&self.connection(), limit)?)
    }

    pub(crate) fn tracks_by_artist(&self, artist: &str) -> Result<Vec<Track>> {
        Ok(db::fetch_tracks_by_artist(&self.connection(), artist)?)
    }

    pub(crate) fn tracks_by_album(&self, album: &str) -> Result<Vec<Track>> {
        Ok(db::fetch_tracks_by_album(&self.connection(), album)?)
    }

    pub(crate) fn artists(&self) -> Result<Vec<String>> {
        Ok(db::fetch_artists(&self.connection())?)
    }

    pub(crate) fn albums(&self) -> Result<Vec<String>> {
        Ok(db::fetch_albums(&self.connection())?)
    }

    pub(crate) fn totals(&self) -> Result<LibraryTotals> {
        Ok(db::fetch_totals(&self.connection())?)
    }

    /// Ids of tracks located under `root`, not in `seen`, whose files are
    /// missing.
    fn vanished_under(&self, root: &Path, seen: &HashSet<TrackId>) -> Vec<TrackId> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|track| {
                !seen.contains(&track.id) && track.locator.starts_with(root) && !track.locator.exists()
            })
            .map(|track| track.id)
            .collect()
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

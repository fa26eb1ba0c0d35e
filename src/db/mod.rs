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

//! Data access layer.
//!
//! This module handles all interactions with the SQLite database: schema
//! creation, track records, listening statistics and the persisted play
//! queue. It uses cached statements for frequently executed queries.
//!
//! # Tables
//!
//! * `tracks` - Library tracks keyed by their stable track id.
//! * `track_stats` - Play counts, last played time and favourites.
//! * `queue_entries` - The play queue, one row per contiguous position.
//! * `queue_state` - A single row holding the queue cursor.
//!
//! # Performance
//!
//! Most functions in this module use [`rusqlite::Connection::prepare_cached`]
//! to reduce SQL parsing overhead.

mod model;
pub(crate) mod queue;
pub(crate) mod scan;


use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{LibraryTotals, Track, TrackId, TrackStats};

const MIN_SEARCH_LEN: usize = 3;

/// Opens a connection to the SQLite database and configures performance settings.
///
/// This function performs the following setup:
/// * **WAL Mode**: Enables Write-Ahead Logging so the library and the queue
///   store can each hold their own connection to the same file.
/// * **Performance Tuning**: Sets synchronous mode to `NORMAL` and increases the cache size.
/// * **Schema**: Executes [`create_schema`] to ensure all tables exist.
///
/// # Arguments
///
/// * `path` - The file system path to the SQLite database file.
///
/// # Errors
///
/// Returns an error if:
/// * The database file cannot be opened.
/// * The initial PRAGMA configurations fail.
/// * The schema initialization fails.
pub(crate) fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        anyhow::bail!(
            "Failed to switch to WAL mode. Current mode: {}",
            journal_mode
        );
    }

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -16000;
    ",
    )?;

    conn.set_prepared_statement_cache_capacity(100);

    create_schema(&conn)?;

    Ok(conn)
}

/// Create the database schema.
///
/// Track rows are never deleted by the library; removing a track only sets
/// its `removed` flag so that statistics and queue references stay
/// meaningful if the file comes back.
///
/// This operation is wrapped in a single SQL transaction to ensure the schema
/// is updated atomically.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            duration_ms INTEGER,
            title TEXT NOT NULL COLLATE NOCASE,
            artist TEXT COLLATE NOCASE,
            album TEXT COLLATE NOCASE,
            genre TEXT,
            year INTEGER,
            added_at INTEGER NOT NULL DEFAULT 0,
            removed INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_filename ON tracks (filename);

        CREATE TABLE IF NOT EXISTS track_stats (
            track_id INTEGER PRIMARY KEY,
            play_count INTEGER NOT NULL DEFAULT 0,
            last_played INTEGER,
            favourite INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS queue_entries (
            position INTEGER PRIMARY KEY,
            track_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS queue_state (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            cursor INTEGER
        );

        COMMIT;",
    )
    .context("Failed to create schema")
}

/// Inserts a track, or replaces every column of an existing one with the
/// same id.
///
/// Upserting also clears the `removed` flag, so a rediscovered file becomes
/// visible again. `added_at_ms` is only recorded for a new track.
pub(crate) fn upsert_track(conn: &Connection, track: &Track, added_at_ms: i64) -> Result<()> {
    let sql = "
        INSERT INTO tracks (id, filename, duration_ms, title, artist, album, genre, year, added_at, removed)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
        ON CONFLICT (id)
        DO UPDATE SET
            filename = excluded.filename,
            duration_ms = excluded.duration_ms,
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            genre = excluded.genre,
            year = excluded.year,
            removed = 0";

    let filename = track
        .locator
        .to_str()
        .context("Path contains invalid UTF-8")?;

    let mut stmt = conn.prepare_cached(sql)?;
    stmt.execute(params![
        track.id,
        filename,
        track.duration_ms.map(|d| d as i64),
        track.title,
        track.artist,
        track.album,
        track.genre,
        track.year,
        added_at_ms,
    ])?;

    Ok(())
}

/// Fetches every track that has not been marked removed.
///
/// # Errors
///
/// Returns an error if the SQL query fails or if a row cannot be mapped to a
/// [`Track`].
pub(crate) fn fetch_tracks(conn: &Connection) -> Result<Vec<Track>> {
    let sql = "
        SELECT id, filename, duration_ms, title, artist, album, genre, year
        FROM tracks
        WHERE removed = 0
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Flags a track as absent from the library.
///
/// Returns `true` if a present track was marked.
pub(crate) fn mark_removed(conn: &Connection, id: TrackId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("UPDATE tracks SET removed = 1 WHERE id = ? AND removed = 0")?;
    let changed = stmt.execute([id])?;

    Ok(changed > 0)
}

pub(crate) fn update_duration(conn: &Connection, id: TrackId, duration_ms: u64) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE tracks SET duration_ms = ?2 WHERE id = ?1")?;
    stmt.execute(params![id, duration_ms as i64])?;

    Ok(())
}

/// Searches present tracks by title, artist or album.
///
/// Queries shorter than three characters return nothing rather than the
/// whole library.
pub(crate) fn search_tracks(conn: &Connection, text: &str) -> Result<Vec<Track>> {
    let text = text.trim();
    if text.len() < MIN_SEARCH_LEN {
        return Ok(vec![]);
    }

    let sql = "
        SELECT id, filename, duration_ms, title, artist, album, genre, year
        FROM tracks
        WHERE removed = 0 AND (title LIKE ?1 OR artist LIKE ?1 OR album LIKE ?1)
        ORDER BY artist, album, title
    ";

    let param = format!("%{}%", text);
    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([param], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub(crate) fn increment_play_count(conn: &Connection, id: TrackId, played_at_ms: i64) -> Result<()> {
    let sql = "
        INSERT INTO track_stats (track_id, play_count, last_played)
        VALUES (?1, 1, ?2)
        ON CONFLICT (track_id)
        DO UPDATE SET play_count = play_count + 1, last_played = ?2";

    let mut stmt = conn.prepare_cached(sql)?;
    stmt.execute(params![id, played_at_ms])?;

    Ok(())
}

pub(crate) fn update_favourite(conn: &Connection, id: TrackId, favourite: bool) -> Result<()> {
    let sql = "
        INSERT INTO track_stats (track_id, favourite)
        VALUES (?1, ?2)
        ON CONFLICT (track_id)
        DO UPDATE SET favourite = ?2";

    let mut stmt = conn.prepare_cached(sql)?;
    stmt.execute(params![id, favourite])?;

    Ok(())
}

/// Fetches the statistics for a track, defaulting when it was never played.
pub(crate) fn fetch_stats(conn: &Connection, id: TrackId) -> Result<TrackStats> {
    let mut stmt = conn.prepare_cached(
        "SELECT play_count, last_played, favourite FROM track_stats WHERE track_id = ?",
    )?;
    let stats = stmt
        .query_row([id], |row| {
            Ok(TrackStats {
                play_count: row.get(0)?,
                last_played_ms: row.get(1)?,
                favourite: row.get(2)?,
            })
        })
        .optional()?;

    Ok(stats.unwrap_or_default())
}

/// Fetches the most played present tracks with their play counts.
pub(crate) fn fetch_most_played(conn: &Connection, limit: usize) -> Result<Vec<(TrackId, u32)>> {
    let sql = "
        SELECT st.track_id, st.play_count
        FROM track_stats st
        JOIN tracks tr ON tr.id = st.track_id
        WHERE tr.removed = 0 AND st.play_count > 0
        ORDER BY st.play_count DESC, st.last_played DESC
        LIMIT ?
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches present tracks marked as favourites.
pub(crate) fn fetch_favourites(conn: &Connection) -> Result<Vec<Track>> {
    let sql = "
        SELECT tr.id, tr.filename, tr.duration_ms, tr.title, tr.artist, tr.album, tr.genre, tr.year
        FROM tracks tr
        JOIN track_stats st ON st.track_id = tr.id
        WHERE tr.removed = 0 AND st.favourite = 1
        ORDER BY tr.artist, tr.album, tr.title
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches present tracks by when they were last played, latest first, with
/// that time.
pub(crate) fn fetch_recently_played(conn: &Connection, limit: usize) -> Result<Vec<(Track, i64)>> {
    let sql = "
        SELECT tr.id, tr.filename, tr.duration_ms, tr.title, tr.artist, tr.album, tr.genre, tr.year,
               st.last_played
        FROM tracks tr
        JOIN track_stats st ON st.track_id = tr.id
        WHERE tr.removed = 0 AND st.last_played IS NOT NULL
        ORDER BY st.last_played DESC
        LIMIT ?
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([limit as i64], |row| Ok((Track::from_row(row)?, row.get(8)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches the most recently added present tracks.
pub(crate) fn fetch_recently_added(conn: &Connection, limit: usize) -> Result<Vec<Track>> {
    let sql = "
        SELECT id, filename, duration_ms, title, artist, album, genre, year
        FROM tracks
        WHERE removed = 0
        ORDER BY added_at DESC, artist, album, title
        LIMIT ?
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([limit as i64], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches the present tracks of one artist, ignoring case.
pub(crate) fn fetch_tracks_by_artist(conn: &Connection, artist: &str) -> Result<Vec<Track>> {
    let sql = "
        SELECT id, filename, duration_ms, title, artist, album, genre, year
        FROM tracks
        WHERE removed = 0 AND artist = ?
        ORDER BY year, album, title
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([artist.trim()], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches the present tracks of one album, ignoring case.
pub(crate) fn fetch_tracks_by_album(conn: &Connection, album: &str) -> Result<Vec<Track>> {
    let sql = "
        SELECT id, filename, duration_ms, title, artist, album, genre, year
        FROM tracks
        WHERE removed = 0 AND album = ?
        ORDER BY artist, title
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([album.trim()], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Distinct artist names across present tracks, sorted.
pub(crate) fn fetch_artists(conn: &Connection) -> Result<Vec<String>> {
    let sql = "
        SELECT DISTINCT artist FROM tracks
        WHERE removed = 0 AND artist IS NOT NULL
        ORDER BY artist
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Distinct album names across present tracks, sorted.
pub(crate) fn fetch_albums(conn: &Connection) -> Result<Vec<String>> {
    let sql = "
        SELECT DISTINCT album FROM tracks
        WHERE removed = 0 AND album IS NOT NULL
        ORDER BY album
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub(crate) fn fetch_totals(conn: &Connection) -> Result<LibraryTotals> {
    let sql = "
        SELECT COUNT(*), COALESCE(SUM(duration_ms), 0), COUNT(DISTINCT artist), COUNT(DISTINCT album)
        FROM tracks
        WHERE removed = 0
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let (tracks, duration_ms, artists, albums): (i64, i64, i64, i64) =
        stmt.query_row([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?;

    Ok(LibraryTotals {
        tracks: tracks as usize,
        duration_ms: duration_ms as u64,
        artists: artists as usize,
        albums: albums as usize,
    })
}

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

//! Persisted play queue.
//!
//! The queue is small and rewritten in full on every mutation, inside one
//! transaction, so a crash never leaves entries and cursor out of step.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    db::open_database,
    model::TrackId,
    queue::{PersistedQueue, QueuePersistence},
};

/// SQLite-backed [`QueuePersistence`] owning a dedicated connection.
pub(crate) struct SqliteQueueStore {
    conn: Connection,
}

impl SqliteQueueStore {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = open_database(path).context("Failed to open queue store")?;
        Ok(Self { conn })
    }
}

impl QueuePersistence for SqliteQueueStore {
    fn save(&mut self, queue: &PersistedQueue) -> Result<()> {
        save_queue(&mut self.conn, &queue.track_ids, queue.cursor)
    }

    fn load(&mut self) -> Result<PersistedQueue> {
        let (track_ids, cursor) = load_queue(&self.conn)?;
        Ok(PersistedQueue { track_ids, cursor })
    }
}

/// Replaces the persisted queue and cursor atomically.
pub(crate) fn save_queue(conn: &mut Connection, track_ids: &[TrackId], cursor: Option<usize>) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM queue_entries", [])?;
    {
        let mut stmt = tx.prepare_cached("INSERT INTO queue_entries (position, track_id) VALUES (?, ?)")?;
        for (position, id) in track_ids.iter().enumerate() {
            stmt.execute(params![position as i64, id])?;
        }
    }

    tx.execute(
        "INSERT INTO queue_state (id, cursor) VALUES (0, ?1)
         ON CONFLICT (id) DO UPDATE SET cursor = ?1",
        params![cursor.map(|c| c as i64)],
    )?;

    tx.commit().context("Failed to commit queue")
}

/// Loads the persisted queue in position order, with its cursor.
pub(crate) fn load_queue(conn: &Connection) -> Result<(Vec<TrackId>, Option<usize>)> {
    let mut stmt = conn.prepare_cached("SELECT track_id FROM queue_entries ORDER BY position")?;
    let track_ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<TrackId>, _>>()?;

    let cursor: Option<i64> = conn
        .query_row("SELECT cursor FROM queue_state WHERE id = 0", [], |row| row.get(0))
        .optional()?
        .flatten();

    Ok((track_ids, cursor.and_then(|c| usize::try_from(c).ok())))
}

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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result rows
//! and high-level domain models, ensuring type-safe extraction of model
//! attributes from database queries.

use std::path::PathBuf;

use rusqlite::{
    Result, Row, ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::model::{Track, TrackId};

impl Track {
    /// Maps an SQLite row to a [`Track`] instance.
    ///
    /// This is a helper function designed to be used with [`rusqlite::Statement::query_map`].
    /// Columns are expected in the order `id, filename, duration_ms, title,
    /// artist, album, genre, year`.
    ///
    /// # Errors
    ///
    /// Returns a [`rusqlite::Error`] if:
    /// * The row does not contain enough columns.
    /// * The data in a column cannot be converted to the required Rust type.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let filename: String = row.get(1)?;
        let duration_ms: Option<i64> = row.get(2)?;

        Ok(Self {
            id: row.get(0)?,
            locator: PathBuf::from(filename),
            duration_ms: duration_ms.and_then(|d| u64::try_from(d).ok()),
            title: row.get(3)?,
            artist: row.get(4)?,
            album: row.get(5)?,
            genre: row.get(6)?,
            year: row.get(7)?,
        })
    }
}

// SQLite integers are signed, the id is stored bit-for-bit.
impl ToSql for TrackId {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0 as i64))
    }
}

impl FromSql for TrackId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(TrackId(value.as_i64()? as u64))
    }
}

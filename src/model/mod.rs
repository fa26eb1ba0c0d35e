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

//! Domain models and core data structures.
//!
//! This module defines the central entities of the engine: library tracks,
//! queue entries and the playback state. Tracks are owned by the library and
//! everything else refers to them by [`TrackId`] only.

use std::{fmt, num::ParseIntError, path::PathBuf, str::FromStr};

/// Stable identifier of a library track.
///
/// Identifiers are derived from the identity of the audio itself rather than
/// from its location, so renaming or moving a file keeps its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TrackId(pub(crate) u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s.trim(), 16).map(TrackId)
    }
}

/// A playable item in the library.
///
/// Created by a library scan and replaced wholesale on metadata refresh.
/// Playback never mutates a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Track {
    pub(crate) id: TrackId,
    pub(crate) locator: PathBuf,
    pub(crate) duration_ms: Option<u64>,
    pub(crate) title: String,
    pub(crate) artist: Option<String>,
    pub(crate) album: Option<String>,
    pub(crate) genre: Option<String>,
    pub(crate) year: Option<u32>,
}

impl Track {
    /// Human-readable "artist - title" label.
    pub(crate) fn display_name(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

/// Listening statistics kept alongside, but separate from, a [`Track`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TrackStats {
    pub(crate) play_count: u32,
    pub(crate) last_played_ms: Option<i64>,
    pub(crate) favourite: bool,
}

/// Aggregate figures over the present tracks of the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LibraryTotals {
    pub(crate) tracks: usize,
    pub(crate) duration_ms: u64,
    pub(crate) artists: usize,
    pub(crate) albums: usize,
}

/// A single queue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueEntry {
    pub(crate) position: usize,
    pub(crate) track_id: TrackId,
}

/// What the engine is doing right now.
///
/// Exactly one variant is active at any time, and it is the single source of
/// truth for what a presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum PlaybackState {
    #[default]
    Idle,
    Preparing(TrackId),
    Playing(TrackId, u64),
    Paused(TrackId, u64),
    Completed(TrackId),
    Error(TrackId, String),
}

impl PlaybackState {
    /// The track this state refers to, if any.
    pub(crate) fn track_id(&self) -> Option<TrackId> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Preparing(id)
            | PlaybackState::Playing(id, _)
            | PlaybackState::Paused(id, _)
            | PlaybackState::Completed(id)
            | PlaybackState::Error(id, _) => Some(*id),
        }
    }

    /// The playback position, for states that have a loaded track.
    pub(crate) fn position_ms(&self) -> Option<u64> {
        match self {
            PlaybackState::Playing(_, pos) | PlaybackState::Paused(_, pos) => Some(*pos),
            _ => None,
        }
    }
}

/// Read-only projection handed to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub(crate) state: PlaybackState,
    pub(crate) queue: Vec<QueueEntry>,
    pub(crate) cursor: Option<usize>,
}

impl Snapshot {
    /// The track id under the cursor.
    pub(crate) fn current_track_id(&self) -> Option<TrackId> {
        self.cursor
            .and_then(|c| self.queue.get(c))
            .map(|entry| entry.track_id)
    }
}

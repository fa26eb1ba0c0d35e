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

//! Engine error taxonomy.
//!
//! Most of these never cross a component boundary as an `Err`: a missing track
//! or a failed load becomes part of the playback state, an empty queue on
//! auto-advance simply settles the session, and stale events are dropped.

use thiserror::Error;

use crate::{model::TrackId, session::SessionToken};

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// The track id does not resolve in the library.
    #[error("track {0} not found")]
    NotFound(TrackId),

    /// The backend could not open or decode the file.
    #[error("backend failed to load track: {0}")]
    BackendLoadFailure(String),

    /// There is no track to move to.
    #[error("queue has no track to move to")]
    QueueEmpty,

    /// A backend callback for a superseded load.
    #[error("stale event for session {token}, current session is {current}")]
    StaleEvent {
        token: SessionToken,
        current: SessionToken,
    },

    /// The persistent store failed.
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),

    /// The engine's event channel has been closed.
    #[error("engine event channel closed")]
    ChannelClosed,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

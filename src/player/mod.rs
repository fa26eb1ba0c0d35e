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

//! Media backend interface.
//!
//! The playback session does not decode audio itself. It drives a
//! [`MediaBackend`] through a handful of calls, and the backend reports back
//! asynchronously with [`BackendEvent`]s delivered through the engine's event
//! channel, each tagged with the [`SessionToken`] of the load it belongs to.

mod mpv;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use mpv::MpvBackend;

use std::path::Path;

use anyhow::Result;

use crate::session::SessionToken;

/// Asynchronous notifications from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendEvent {
    /// The file is buffered and ready to play.
    Ready { duration_ms: Option<u64> },
    /// The file could not be opened or decoded.
    Failed(String),
    /// Periodic playback position.
    Position(u64),
    /// Playback reached the end of the file.
    Ended,
}

/// The calls a playback session makes on a backend.
///
/// Calls must not block on I/O: `load` only starts loading, with the outcome
/// arriving later as [`BackendEvent::Ready`] or [`BackendEvent::Failed`].
pub(crate) trait MediaBackend: Send {
    /// Starts loading a file, paused, for the given session.
    fn load(&mut self, token: SessionToken, locator: &Path) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Jumps to an absolute position.
    fn seek(&mut self, position_ms: u64) -> Result<()>;

    /// Unloads whatever is loaded, cancelling a load still in flight.
    fn release(&mut self) -> Result<()>;
}

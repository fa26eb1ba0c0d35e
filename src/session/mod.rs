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

//! The playback session state machine.
//!
//! A [`Session`] owns the [`PlaybackState`], the play queue and the media
//! backend. It is driven one event at a time by the dispatcher and is never
//! shared between threads, so none of its transitions need locking.
//!
//! # Transitions
//!
//! ```text
//! Idle ──start──▶ Preparing ──ready──▶ Playing ◀──resume── Paused
//!                     │                  │  └────pause──────▶ ▲
//!                   failed             ended                   │
//!                     ▼                  ▼                     │
//!                   Error            Completed ──advance──▶ Preparing
//! ```
//!
//! `stop` reaches `Idle` from every state. Each `start` takes a new
//! [`SessionToken`]; backend events carrying an older token are stale and
//! dropped.

#[cfg(test)]
mod tests;

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    events::{Command, Reorder},
    library::Library,
    model::{PlaybackState, Snapshot, TrackId},
    player::{BackendEvent, MediaBackend},
    queue::{CursorMove, QueueManager},
};

/// Cause recorded when a track id no longer resolves in the library.
pub(crate) const MISSING_TRACK: &str = "missing";

/// How far past a seek target the first tick after the seek may land.
const SEEK_SETTLE_MS: u64 = 2_000;

/// Ticks dropped while waiting for a seek to land before taking the backend's
/// word for the position again.
const MAX_UNSETTLED_TICKS: u32 = 40;

/// Monotonic counter identifying one backend load attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SessionToken(u64);

impl SessionToken {
    fn next(self) -> Self {
        SessionToken(self.0 + 1)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What "skip previous" does.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SkipPrevious {
    /// Move the cursor back one entry.
    #[default]
    PreviousEntry,
    /// Restart the current track from the beginning.
    RestartTrack,
    /// Restart when more than this many milliseconds have played, otherwise
    /// move back one entry.
    RestartAfter(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionSettings {
    /// How far behind the last position a tick may be before it is treated
    /// as stale.
    pub(crate) stale_tick_tolerance_ms: u64,
    pub(crate) skip_previous: SkipPrevious,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stale_tick_tolerance_ms: 500,
            skip_previous: SkipPrevious::default(),
        }
    }
}

/// A seek the backend may not have applied yet.
#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target_ms: u64,
    dropped: u32,
}

pub(crate) struct Session {
    library: Arc<Library>,
    queue: QueueManager,
    backend: Box<dyn MediaBackend>,
    settings: SessionSettings,

    state: PlaybackState,
    token: SessionToken,

    /// Token of the load currently holding the backend, if any.
    lease: Option<SessionToken>,

    pending_seek: Option<PendingSeek>,

    /// States entered since the last [`Session::drain_transitions`].
    transitions: Vec<PlaybackState>,
}

impl Session {
    pub(crate) fn new(
        library: Arc<Library>,
        queue: QueueManager,
        backend: Box<dyn MediaBackend>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            library,
            queue,
            backend,
            settings,
            state: PlaybackState::Idle,
            token: SessionToken::default(),
            lease: None,
            pending_seek: None,
            transitions: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn token(&self) -> SessionToken {
        self.token
    }

    #[cfg(test)]
    pub(crate) fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            queue: self.queue.entries(),
            cursor: self.queue.cursor(),
        }
    }

    /// Every state entered since the last call, oldest first.
    pub(crate) fn drain_transitions(&mut self) -> Vec<PlaybackState> {
        std::mem::take(&mut self.transitions)
    }

    /// Applies a user command.
    pub(crate) fn apply(&mut self, command: Command) {
        debug!(?command, state = ?self.state, "Applying command");

        match command {
            Command::Start(id) => self.start(id),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => self.toggle_pause(),
            Command::Stop => self.stop(),
            Command::Seek(position_ms) => self.seek(position_ms),
            Command::SkipNext => self.skip_next(),
            Command::SkipPrevious => self.skip_previous(),
            Command::Enqueue(ids) => self.enqueue(ids),
            Command::Insert(position, ids) => self.insert(position, ids),
            Command::Reorder(reorder) => self.reorder(reorder),
            Command::RemoveFromQueue(positions) => self.remove_from_queue(&positions),
            Command::ClearQueue => self.clear_queue(),
            Command::PlayQueue(ids) => self.play_queue(ids),
            Command::PlayAt(position) => self.play_at(position),
        }
    }

    /// Applies a backend notification for the load identified by `token`.
    pub(crate) fn on_backend(&mut self, token: SessionToken, event: BackendEvent) {
        if token != self.token {
            let stale = Error::StaleEvent {
                token,
                current: self.token,
            };
            debug!(?event, "Dropping event: {}", stale);
            return;
        }

        match (event, self.state.clone()) {
            (BackendEvent::Ready { duration_ms }, PlaybackState::Preparing(id)) => {
                self.on_ready(id, duration_ms)
            }
            (
                BackendEvent::Failed(cause),
                PlaybackState::Preparing(id) | PlaybackState::Playing(id, _) | PlaybackState::Paused(id, _),
            ) => {
                let failure = Error::BackendLoadFailure(cause.clone());
                warn!(%id, "{}", failure);
                self.set_state(PlaybackState::Error(id, cause));
            }
            (BackendEvent::Position(position_ms), PlaybackState::Playing(id, last_ms)) => {
                self.on_position(id, position_ms, last_ms)
            }
            (BackendEvent::Ended, PlaybackState::Playing(id, _)) => {
                info!(%id, "Track completed");
                self.set_state(PlaybackState::Completed(id));
                self.auto_advance();
            }
            (event, state) => {
                debug!(?event, ?state, "Ignoring backend event in current state");
            }
        }
    }

    /// Loads a track, superseding whatever was loaded or loading before.
    ///
    /// If the track sits in the queue, the cursor moves to it so that
    /// auto-advance continues from there.
    pub(crate) fn start(&mut self, id: TrackId) {
        self.release_backend();
        self.token = self.token.next();
        self.pending_seek = None;

        if self.queue.current_track_id() != Some(id) {
            if let Some(position) = self.queue.position_of(id) {
                self.queue.move_cursor(CursorMove::To(position));
            }
        }

        let track = match self.library.lookup(id) {
            Ok(track) => track,
            Err(e) => {
                warn!(token = %self.token, "Cannot start: {}", e);
                self.set_state(PlaybackState::Error(id, MISSING_TRACK.to_string()));
                return;
            }
        };

        info!(%id, token = %self.token, track = %track.display_name(), "Loading track");

        self.lease = Some(self.token);
        match self.backend.load(self.token, &track.locator) {
            Ok(()) => self.set_state(PlaybackState::Preparing(id)),
            Err(e) => {
                let cause = format!("{:#}", e);
                warn!(%id, "{}", Error::BackendLoadFailure(cause.clone()));
                self.release_backend();
                self.set_state(PlaybackState::Error(id, cause));
            }
        }
    }

    pub(crate) fn pause(&mut self) {
        let PlaybackState::Playing(id, position_ms) = self.state else {
            debug!(state = ?self.state, "Ignoring pause");
            return;
        };

        if let Err(e) = self.backend.pause() {
            warn!("Backend pause failed: {:#}", e);
        }
        self.set_state(PlaybackState::Paused(id, position_ms));
    }

    pub(crate) fn resume(&mut self) {
        let PlaybackState::Paused(id, position_ms) = self.state else {
            debug!(state = ?self.state, "Ignoring resume");
            return;
        };

        if let Err(e) = self.backend.play() {
            warn!("Backend play failed: {:#}", e);
        }
        self.set_state(PlaybackState::Playing(id, position_ms));
    }

    pub(crate) fn toggle_pause(&mut self) {
        match self.state {
            PlaybackState::Playing(..) => self.pause(),
            PlaybackState::Paused(..) => self.resume(),
            _ => debug!(state = ?self.state, "Ignoring toggle pause"),
        }
    }

    /// Returns to `Idle` from any state, releasing the backend if it is held.
    pub(crate) fn stop(&mut self) {
        self.release_backend();
        self.pending_seek = None;
        self.set_state(PlaybackState::Idle);
    }

    /// Jumps within the loaded track. Only meaningful while playing or
    /// paused; ignored otherwise.
    pub(crate) fn seek(&mut self, position_ms: u64) {
        let (id, paused) = match self.state {
            PlaybackState::Playing(id, _) => (id, false),
            PlaybackState::Paused(id, _) => (id, true),
            _ => {
                debug!(state = ?self.state, "Ignoring seek");
                return;
            }
        };

        let position_ms = match self.library.lookup(id).ok().and_then(|t| t.duration_ms) {
            Some(duration_ms) => position_ms.min(duration_ms),
            None => position_ms,
        };

        match self.backend.seek(position_ms) {
            Ok(()) => {
                self.pending_seek = Some(PendingSeek {
                    target_ms: position_ms,
                    dropped: 0,
                })
            }
            Err(e) => warn!("Backend seek failed: {:#}", e),
        }

        self.set_state(if paused {
            PlaybackState::Paused(id, position_ms)
        } else {
            PlaybackState::Playing(id, position_ms)
        });
    }

    pub(crate) fn skip_next(&mut self) {
        match self.queue.advance() {
            Ok(id) => self.start(id),
            Err(e) => debug!("Skip next: {}", e),
        }
    }

    pub(crate) fn skip_previous(&mut self) {
        match self.settings.skip_previous {
            SkipPrevious::PreviousEntry => self.previous_entry(),
            SkipPrevious::RestartTrack => self.restart_current(),
            SkipPrevious::RestartAfter(threshold_ms) => {
                if self.state.position_ms().is_some_and(|p| p > threshold_ms) {
                    self.restart_current();
                } else {
                    self.previous_entry();
                }
            }
        }
    }

    /// Appends tracks to the queue, dropping ids the library cannot resolve.
    pub(crate) fn enqueue(&mut self, ids: Vec<TrackId>) {
        let ids = self.resolvable(ids);
        self.queue.append(ids);
    }

    pub(crate) fn insert(&mut self, position: usize, ids: Vec<TrackId>) {
        let ids = self.resolvable(ids);
        self.queue.insert_at(position, ids);
    }

    pub(crate) fn reorder(&mut self, reorder: Reorder) {
        match reorder {
            Reorder::Move { from, to } => self.queue.move_entry(from, to),
            Reorder::ShuffleUpcoming => self.queue.shuffle_upcoming(),
        }
    }

    /// Removes queue entries.
    ///
    /// If the entry under the cursor goes while a track is loaded, playback
    /// follows the cursor: an active session starts the new current entry,
    /// anything else stops.
    pub(crate) fn remove_from_queue(&mut self, positions: &BTreeSet<usize>) {
        let removal = self.queue.remove_at(positions);

        if !removal.cursor_entry_removed || self.state == PlaybackState::Idle {
            return;
        }

        let active = matches!(
            self.state,
            PlaybackState::Preparing(_) | PlaybackState::Playing(..)
        );

        // A paused or finished session does not start playing on its own.
        match self.queue.current_track_id() {
            Some(next) if active => self.start(next),
            _ => self.stop(),
        }
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
        if self.state != PlaybackState::Idle {
            self.stop();
        }
    }

    /// Replaces the queue and starts its first entry.
    pub(crate) fn play_queue(&mut self, ids: Vec<TrackId>) {
        let ids = self.resolvable(ids);
        self.queue.replace_queue(ids);

        match self.queue.current_track_id() {
            Some(id) => self.start(id),
            None => self.stop(),
        }
    }

    pub(crate) fn play_at(&mut self, position: usize) {
        match self.queue.move_cursor(CursorMove::To(position)) {
            Some(id) => self.start(id),
            None => debug!(position, "Nothing to play at position"),
        }
    }

    /// Releases the backend ahead of the engine shutting down.
    pub(crate) fn shutdown(&mut self) {
        self.stop();
    }

    fn on_ready(&mut self, id: TrackId, duration_ms: Option<u64>) {
        if let Err(e) = self.backend.play() {
            let cause = format!("{:#}", e);
            warn!(%id, "Backend play failed: {}", cause);
            self.set_state(PlaybackState::Error(id, cause));
            return;
        }

        self.set_state(PlaybackState::Playing(id, 0));

        if let Some(duration_ms) = duration_ms {
            if let Err(e) = self.library.refine_duration(id, duration_ms) {
                warn!(%id, "Failed to refine duration: {}", e);
            }
        }
        if let Err(e) = self.library.record_play(id) {
            warn!(%id, "Failed to record play: {}", e);
        }
    }

    /// Applies a position tick.
    ///
    /// Ticks the backend sent before it applied a seek are dropped until one
    /// lands near the seek target. Otherwise a tick more than the tolerance
    /// behind the last position is stale.
    fn on_position(&mut self, id: TrackId, position_ms: u64, last_ms: u64) {
        let tolerance_ms = self.settings.stale_tick_tolerance_ms;

        if let Some(pending) = self.pending_seek.as_mut() {
            let settled = position_ms.saturating_add(tolerance_ms) >= pending.target_ms
                && position_ms <= pending.target_ms.saturating_add(SEEK_SETTLE_MS);

            if !settled && pending.dropped < MAX_UNSETTLED_TICKS {
                pending.dropped += 1;
                debug!(%id, position_ms, target_ms = pending.target_ms, "Dropping tick from before seek");
                return;
            }

            self.pending_seek = None;
            self.set_state(PlaybackState::Playing(id, position_ms));
            return;
        }

        if position_ms.saturating_add(tolerance_ms) < last_ms {
            debug!(%id, position_ms, last_ms, "Dropping stale position tick");
        } else {
            self.set_state(PlaybackState::Playing(id, position_ms));
        }
    }

    fn auto_advance(&mut self) {
        match self.queue.advance() {
            Ok(next) => self.start(next),
            Err(e) => {
                info!("Playback finished: {}", e);
                self.stop();
            }
        }
    }

    fn previous_entry(&mut self) {
        match self.queue.retreat() {
            Ok(id) => self.start(id),
            Err(_) => self.restart_current(),
        }
    }

    fn restart_current(&mut self) {
        match self.state {
            PlaybackState::Playing(..) | PlaybackState::Paused(..) => self.seek(0),
            _ => {
                if let Some(id) = self.queue.current_track_id() {
                    self.start(id);
                }
            }
        }
    }

    fn resolvable(&self, ids: Vec<TrackId>) -> Vec<TrackId> {
        ids.into_iter()
            .filter(|&id| {
                let found = self.library.contains(id);
                if !found {
                    warn!(%id, "Not queueing unknown track");
                }
                found
            })
            .collect()
    }

    fn release_backend(&mut self) {
        let Some(token) = self.lease.take() else {
            return;
        };

        debug!(%token, "Releasing backend");
        if let Err(e) = self.backend.release() {
            warn!("Backend release failed: {:#}", e);
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if state != self.state {
            self.state = state.clone();
            self.transitions.push(state);
        }
    }
}

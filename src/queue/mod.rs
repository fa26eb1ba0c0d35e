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

//! Play queue management.
//!
//! This module provides the [`QueueManager`], the exclusive owner of the
//! ordered list of queued track ids and the cursor pointing at the current
//! one.
//!
//! Every mutation builds the complete new state and swaps it in under a
//! single write lock, so a [`QueueView`] held by another thread never
//! observes, say, a moved cursor over entries that are not yet renumbered.
//! The new state is then handed to the configured [`QueuePersistence`].


use std::{
    collections::BTreeSet,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use rand::{rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{Error, Result},
    model::{QueueEntry, TrackId},
};

/// How cursor movement behaves at either end of the queue.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CursorPolicy {
    #[default]
    Clamp,
    Wrap,
}

/// A requested cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorMove {
    By(isize),
    To(usize),
}

/// The queue as written to and read from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PersistedQueue {
    pub(crate) track_ids: Vec<TrackId>,
    pub(crate) cursor: Option<usize>,
}

/// Durable storage for the queue, so it survives a restart.
pub(crate) trait QueuePersistence: Send {
    fn save(&mut self, queue: &PersistedQueue) -> anyhow::Result<()>;
    fn load(&mut self) -> anyhow::Result<PersistedQueue>;
}

/// Outcome of [`QueueManager::remove_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Removal {
    pub(crate) removed: usize,
    pub(crate) cursor_entry_removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QueueState {
    track_ids: Vec<TrackId>,
    cursor: Option<usize>,
}

impl QueueState {
    fn current(&self) -> Option<TrackId> {
        self.cursor.and_then(|c| self.track_ids.get(c).copied())
    }

    fn entries(&self) -> Vec<QueueEntry> {
        self.track_ids
            .iter()
            .enumerate()
            .map(|(position, &track_id)| QueueEntry { position, track_id })
            .collect()
    }
}

/// A cheap, cloneable read-only handle on the queue.
#[derive(Clone)]
pub(crate) struct QueueView {
    state: Arc<RwLock<QueueState>>,
}

impl QueueView {
    #[cfg(test)]
    pub(crate) fn current_track_id(&self) -> Option<TrackId> {
        self.read().current()
    }

    /// Entries and cursor, read together.
    pub(crate) fn snapshot(&self) -> (Vec<QueueEntry>, Option<usize>) {
        let state = self.read();
        (state.entries(), state.cursor)
    }

    fn read(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct QueueManager {
    state: Arc<RwLock<QueueState>>,
    policy: CursorPolicy,
    store: Option<Box<dyn QueuePersistence>>,
}

impl QueueManager {
    /// Creates an empty, unpersisted queue.
    pub(crate) fn new(policy: CursorPolicy) -> Self {
        Self {
            state: Arc::new(RwLock::new(QueueState::default())),
            policy,
            store: None,
        }
    }

    /// Rebuilds the queue from a store, which then receives every later
    /// mutation.
    ///
    /// A stored cursor that no longer fits the stored entries is pulled back
    /// onto the last entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub(crate) fn restore(policy: CursorPolicy, mut store: Box<dyn QueuePersistence>) -> Result<Self> {
        let persisted = store.load()?;

        let len = persisted.track_ids.len();
        let cursor = match persisted.cursor {
            _ if len == 0 => None,
            Some(c) if c >= len => {
                warn!(cursor = c, len, "Persisted queue cursor out of range, repairing");
                Some(len - 1)
            }
            cursor => cursor,
        };

        Ok(Self {
            state: Arc::new(RwLock::new(QueueState {
                track_ids: persisted.track_ids,
                cursor,
            })),
            policy,
            store: Some(store),
        })
    }

    pub(crate) fn view(&self) -> QueueView {
        QueueView {
            state: Arc::clone(&self.state),
        }
    }

    pub(crate) fn current_track_id(&self) -> Option<TrackId> {
        self.read().current()
    }

    pub(crate) fn cursor(&self) -> Option<usize> {
        self.read().cursor
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.read().track_ids.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn entries(&self) -> Vec<QueueEntry> {
        self.read().entries()
    }

    /// First position holding `id`.
    pub(crate) fn position_of(&self, id: TrackId) -> Option<usize> {
        self.read().track_ids.iter().position(|&t| t == id)
    }

    /// Replaces the whole queue, putting the cursor on the first entry.
    pub(crate) fn replace_queue(&mut self, track_ids: Vec<TrackId>) {
        self.update(|state| {
            state.cursor = if track_ids.is_empty() { None } else { Some(0) };
            state.track_ids = track_ids;
        });
    }

    /// Adds entries to the end of the queue, leaving the cursor alone.
    ///
    /// Appending to an empty queue puts the cursor on the first new entry.
    pub(crate) fn append(&mut self, track_ids: Vec<TrackId>) {
        if track_ids.is_empty() {
            return;
        }

        self.update(|state| {
            if state.track_ids.is_empty() {
                state.cursor = Some(0);
            }
            state.track_ids.extend(track_ids);
        });
    }

    /// Inserts entries before `position`, clamped to the end of the queue.
    ///
    /// When the insertion lands at or before the cursor, the cursor shifts by
    /// the inserted count so it keeps pointing at the same entry. Inserting
    /// into an empty queue puts the cursor on the first entry.
    pub(crate) fn insert_at(&mut self, position: usize, track_ids: Vec<TrackId>) {
        if track_ids.is_empty() {
            return;
        }

        self.update(|state| {
            let position = position.min(state.track_ids.len());
            let count = track_ids.len();
            let was_empty = state.track_ids.is_empty();

            state.track_ids.splice(position..position, track_ids);

            match state.cursor {
                None if was_empty => state.cursor = Some(0),
                Some(c) if position <= c => state.cursor = Some(c + count),
                _ => {}
            }
        });
    }

    /// Removes the entries at the given positions.
    ///
    /// Positions past the end are ignored. If the cursor's entry goes, the
    /// cursor moves to the next surviving entry after it, or to `None` when
    /// there is none.
    pub(crate) fn remove_at(&mut self, positions: &BTreeSet<usize>) -> Removal {
        self.update(|state| {
            let len = state.track_ids.len();
            let doomed: BTreeSet<usize> = positions.iter().copied().filter(|&p| p < len).collect();

            let cursor_entry_removed = state.cursor.is_some_and(|c| doomed.contains(&c));
            let shift = |index: usize| index - doomed.range(..index).count();

            state.cursor = match state.cursor {
                None => None,
                Some(c) if cursor_entry_removed => {
                    (c + 1..len).find(|p| !doomed.contains(p)).map(shift)
                }
                Some(c) => Some(shift(c)),
            };

            let mut index = 0;
            state.track_ids.retain(|_| {
                let keep = !doomed.contains(&index);
                index += 1;
                keep
            });

            Removal {
                removed: doomed.len(),
                cursor_entry_removed,
            }
        })
    }

    /// Moves one entry to a new position, keeping the cursor on the entry it
    /// pointed at before.
    pub(crate) fn move_entry(&mut self, from: usize, to: usize) {
        self.update(|state| {
            let len = state.track_ids.len();
            if from >= len {
                return;
            }
            let to = to.min(len - 1);

            let id = state.track_ids.remove(from);
            state.track_ids.insert(to, id);

            state.cursor = state.cursor.map(|c| {
                if c == from {
                    to
                } else if from < c && to >= c {
                    c - 1
                } else if from > c && to <= c {
                    c + 1
                } else {
                    c
                }
            });
        });
    }

    /// Shuffles the entries after the cursor; the current and already played
    /// entries keep their place. A cursor past the end has nothing upcoming.
    pub(crate) fn shuffle_upcoming(&mut self) {
        self.update(|state| {
            let Some(cursor) = state.cursor else {
                return;
            };
            if cursor + 1 < state.track_ids.len() {
                state.track_ids[cursor + 1..].shuffle(&mut rng());
            }
        });
    }

    pub(crate) fn clear(&mut self) {
        self.update(|state| *state = QueueState::default());
    }

    /// Moves the cursor and returns the track now under it.
    ///
    /// A cursor of `None` over a non-empty queue sits just past the last
    /// entry, so `By(-1)` lands on the last entry. With
    /// [`CursorPolicy::Clamp`] movement stops at either end; with
    /// [`CursorPolicy::Wrap`] it wraps around.
    pub(crate) fn move_cursor(&mut self, movement: CursorMove) -> Option<TrackId> {
        let policy = self.policy;

        self.update(|state| {
            let len = state.track_ids.len();
            if len == 0 {
                return None;
            }

            state.cursor = match (movement, policy) {
                (CursorMove::To(p), CursorPolicy::Clamp) => Some(p.min(len - 1)),
                (CursorMove::To(p), CursorPolicy::Wrap) => Some(p % len),
                (CursorMove::By(delta), policy) => {
                    let origin = state.cursor.unwrap_or(len) as isize;
                    let target = origin.saturating_add(delta);

                    match policy {
                        CursorPolicy::Wrap => Some(target.rem_euclid(len as isize) as usize),
                        CursorPolicy::Clamp if state.cursor.is_none() && target >= len as isize => None,
                        CursorPolicy::Clamp => Some(target.clamp(0, len as isize - 1) as usize),
                    }
                }
            };

            state.current()
        })
    }

    /// Steps forward to the next entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueEmpty`] if there is no next entry, leaving the
    /// cursor where it was.
    pub(crate) fn advance(&mut self) -> Result<TrackId> {
        self.step(1)
    }

    /// Steps back to the previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueEmpty`] if there is no previous entry.
    pub(crate) fn retreat(&mut self) -> Result<TrackId> {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> Result<TrackId> {
        let before = self.cursor();
        let after = self.move_cursor(CursorMove::By(delta));

        match after {
            Some(id) if self.policy == CursorPolicy::Wrap || self.cursor() != before => Ok(id),
            _ => Err(Error::QueueEmpty),
        }
    }

    /// Applies a mutation to a copy of the state, swaps it in and persists it
    /// if anything changed.
    fn update<R>(&mut self, mutate: impl FnOnce(&mut QueueState) -> R) -> R {
        let (result, changed) = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let mut next = guard.clone();
            let result = mutate(&mut next);
            let changed = next != *guard;
            if changed {
                *guard = next;
            }
            (result, changed)
        };

        if changed {
            self.persist();
        }

        result
    }

    fn persist(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };

        let persisted = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            PersistedQueue {
                track_ids: state.track_ids.clone(),
                cursor: state.cursor,
            }
        };

        if let Err(e) = store.save(&persisted) {
            warn!("Failed to persist queue: {:#}", e);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

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

use std::path::PathBuf;

use super::*;
use crate::{
    db::queue::SqliteQueueStore,
    player::testing::{BackendCall, RecordingBackend, TestLibrary},
    queue::CursorPolicy,
};

const T1: TrackId = TrackId(1);
const T2: TrackId = TrackId(2);
const T3: TrackId = TrackId(3);

struct Harness {
    fixture: TestLibrary,
    backend: RecordingBackend,
    session: Session,
}

impl Harness {
    fn new(tracks: u64) -> Self {
        Self::with_settings(tracks, SessionSettings::default())
    }

    fn with_settings(tracks: u64, settings: SessionSettings) -> Self {
        let fixture = TestLibrary::with_tracks(tracks);
        let backend = RecordingBackend::default();
        let session = Session::new(
            Arc::clone(&fixture.library),
            QueueManager::new(CursorPolicy::Clamp),
            Box::new(backend.clone()),
            settings,
        );

        Self {
            fixture,
            backend,
            session,
        }
    }

    fn ready(&mut self) {
        let token = self.session.token();
        self.session.on_backend(token, BackendEvent::Ready { duration_ms: None });
    }

    fn backend_event(&mut self, event: BackendEvent) {
        let token = self.session.token();
        self.session.on_backend(token, event);
    }

    /// Plays the queue `ids` and lets the first track start.
    fn playing(&mut self, ids: &[TrackId]) {
        self.session.play_queue(ids.to_vec());
        self.ready();
    }

    fn cursor(&self) -> Option<usize> {
        self.session.queue().cursor()
    }
}

#[test]
fn start_prepares_then_plays_when_ready() {
    let mut h = Harness::new(3);

    h.session.start(T1);
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T1));
    assert_eq!(
        h.backend.calls(),
        vec![BackendCall::Load(
            h.session.token(),
            PathBuf::from("/music/track-1.flac")
        )]
    );

    h.session.on_backend(h.session.token(), BackendEvent::Ready { duration_ms: Some(181_000) });

    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 0));
    assert_eq!(h.backend.calls().last(), Some(&BackendCall::Play));
    assert_eq!(h.fixture.library.stats(T1).unwrap().play_count, 1);
    assert_eq!(h.fixture.library.lookup(T1).unwrap().duration_ms, Some(181_000));
}

#[test]
fn superseded_start_ignores_late_ready() {
    let mut h = Harness::new(2);

    h.session.start(T1);
    let first = h.session.token();
    h.session.start(T2);
    let second = h.session.token();
    assert!(second > first);

    h.session.on_backend(first, BackendEvent::Ready { duration_ms: None });

    assert_eq!(*h.session.state(), PlaybackState::Preparing(T2));
    assert_eq!(h.backend.releases(), 1);
    assert_eq!(h.backend.loads(), vec![first, second]);

    h.session.on_backend(second, BackendEvent::Ready { duration_ms: None });
    assert_eq!(*h.session.state(), PlaybackState::Playing(T2, 0));
    assert_eq!(h.fixture.library.stats(T1).unwrap().play_count, 0);
}

#[test]
fn stop_releases_exactly_once_from_every_state() {
    let cases = [
        ("idle", 0),
        ("preparing", 1),
        ("playing", 1),
        ("paused", 1),
        ("error", 1),
        ("finished", 0),
    ];

    for (name, expected) in cases {
        let mut h = Harness::new(3);
        match name {
            "idle" => {}
            "preparing" => h.session.start(T1),
            "playing" => h.playing(&[T1]),
            "paused" => {
                h.playing(&[T1]);
                h.session.pause();
            }
            "error" => {
                h.session.start(T1);
                h.backend_event(BackendEvent::Failed("bad file".to_string()));
            }
            _ => {
                h.playing(&[T1]);
                h.backend_event(BackendEvent::Ended);
            }
        }
        h.backend.clear();

        h.session.stop();
        h.session.stop();

        assert_eq!(*h.session.state(), PlaybackState::Idle, "{}", name);
        assert_eq!(h.backend.releases(), expected, "{}", name);
    }
}

#[test]
fn removing_current_entry_follows_the_queue() {
    let mut h = Harness::new(3);
    h.playing(&[T1, T2, T3]);

    h.session.skip_next();
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T2));
    assert_eq!(h.cursor(), Some(1));

    h.session.remove_from_queue(&BTreeSet::from([1]));
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T3));
    assert_eq!(h.session.queue().current_track_id(), Some(T3));

    h.session.remove_from_queue(&BTreeSet::from([1]));
    assert_eq!(*h.session.state(), PlaybackState::Idle);
    assert_eq!(h.cursor(), None);
    assert_eq!(h.session.queue().len(), 1);
}

#[test]
fn removing_current_entry_while_paused_stops() {
    let mut h = Harness::new(3);
    h.playing(&[T1, T2]);
    h.session.pause();

    h.session.remove_from_queue(&BTreeSet::from([0]));

    assert_eq!(*h.session.state(), PlaybackState::Idle);
    assert_eq!(h.session.queue().current_track_id(), Some(T2));
}

#[test]
fn removing_other_entries_leaves_playback_alone() {
    let mut h = Harness::new(3);
    h.playing(&[T1, T2, T3]);
    h.backend.clear();

    h.session.remove_from_queue(&BTreeSet::from([2]));

    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 0));
    assert!(h.backend.calls().is_empty());
}

#[test]
fn failed_load_then_start_again() {
    let mut h = Harness::new(2);

    h.session.start(T1);
    h.backend_event(BackendEvent::Failed("corrupt".to_string()));
    assert_eq!(
        *h.session.state(),
        PlaybackState::Error(T1, "corrupt".to_string())
    );
    assert_eq!(h.backend.releases(), 0);

    h.session.start(T2);
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T2));
    assert_eq!(h.backend.releases(), 1);
}

#[test]
fn synchronous_load_failure_releases_once() {
    let mut h = Harness::new(1);
    h.backend.fail_loads();

    h.session.start(T1);

    assert!(matches!(h.session.state(), PlaybackState::Error(T1, cause) if cause.contains("device unavailable")));
    assert_eq!(h.backend.releases(), 1);

    h.session.stop();
    assert_eq!(h.backend.releases(), 1);
}

#[test]
fn missing_track_is_an_error_state() {
    let mut h = Harness::new(2);
    h.session.enqueue(vec![T1, T2]);
    h.fixture.library.remove(T2).unwrap();

    h.session.play_at(1);

    assert_eq!(
        *h.session.state(),
        PlaybackState::Error(T2, MISSING_TRACK.to_string())
    );
    assert!(h.backend.loads().is_empty());
}

#[test]
fn position_ticks_update_and_stale_ones_are_dropped() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);

    h.backend_event(BackendEvent::Position(10_000));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 10_000));

    h.backend_event(BackendEvent::Position(9_700));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 9_700));

    h.backend_event(BackendEvent::Position(5_000));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 9_700));
}

#[test]
fn tick_in_flight_during_backward_seek_does_not_pin_position() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);
    h.backend_event(BackendEvent::Position(60_000));

    h.session.seek(10_000);
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 10_000));

    // Sent by the backend before it handled the seek.
    h.backend_event(BackendEvent::Position(60_050));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 10_000));

    h.backend_event(BackendEvent::Position(10_250));
    h.backend_event(BackendEvent::Position(11_250));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 11_250));
}

#[test]
fn tick_in_flight_during_forward_seek_is_dropped() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);
    h.backend_event(BackendEvent::Position(5_000));

    h.session.seek(90_000);
    h.backend_event(BackendEvent::Position(5_050));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 90_000));

    h.backend_event(BackendEvent::Position(90_100));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 90_100));
}

#[test]
fn unsettled_seek_eventually_follows_the_backend() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);
    h.backend_event(BackendEvent::Position(60_000));
    h.session.seek(10_000);

    for _ in 0..MAX_UNSETTLED_TICKS {
        h.backend_event(BackendEvent::Position(60_100));
    }
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 10_000));

    h.backend_event(BackendEvent::Position(60_200));
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 60_200));
}

#[test]
fn ticks_outside_playing_are_ignored() {
    let mut h = Harness::new(1);
    h.session.start(T1);

    h.backend_event(BackendEvent::Position(1_000));
    h.backend_event(BackendEvent::Ended);

    assert_eq!(*h.session.state(), PlaybackState::Preparing(T1));
}

#[test]
fn pause_resume_and_toggle() {
    let mut h = Harness::new(1);

    h.session.start(T1);
    h.session.pause();
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T1));

    h.ready();
    h.backend_event(BackendEvent::Position(2_000));

    h.session.toggle_pause();
    assert_eq!(*h.session.state(), PlaybackState::Paused(T1, 2_000));
    assert_eq!(h.backend.calls().last(), Some(&BackendCall::Pause));

    h.session.pause();
    assert_eq!(*h.session.state(), PlaybackState::Paused(T1, 2_000));

    h.session.resume();
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 2_000));
    assert_eq!(h.backend.calls().last(), Some(&BackendCall::Play));
}

#[test]
fn seek_clamps_to_duration_and_keeps_pause() {
    let mut h = Harness::new(1);

    h.session.seek(5_000);
    assert!(h.backend.calls().is_empty());

    h.playing(&[T1]);
    h.session.pause();
    h.session.seek(999_999);

    assert_eq!(*h.session.state(), PlaybackState::Paused(T1, 180_000));
    assert_eq!(h.backend.calls().last(), Some(&BackendCall::Seek(180_000)));
}

#[test]
fn completed_track_advances_to_next() {
    let mut h = Harness::new(2);
    h.playing(&[T1, T2]);
    h.session.drain_transitions();

    h.backend_event(BackendEvent::Ended);

    assert_eq!(
        h.session.drain_transitions(),
        vec![PlaybackState::Completed(T1), PlaybackState::Preparing(T2)]
    );
    assert_eq!(h.cursor(), Some(1));
}

#[test]
fn end_of_queue_goes_idle() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);
    h.backend.clear();

    h.backend_event(BackendEvent::Ended);

    assert_eq!(*h.session.state(), PlaybackState::Idle);
    assert_eq!(h.backend.releases(), 1);
    assert_eq!(h.cursor(), Some(0));
}

#[test]
fn skip_next_at_end_does_nothing() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);

    h.session.skip_next();

    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 0));
}

#[test]
fn skip_previous_moves_back_or_restarts_first_track() {
    let mut h = Harness::new(2);
    h.playing(&[T1, T2]);
    h.session.skip_next();
    h.ready();

    h.session.skip_previous();
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T1));
    h.ready();
    h.backend_event(BackendEvent::Position(7_000));

    h.session.skip_previous();
    assert_eq!(*h.session.state(), PlaybackState::Playing(T1, 0));
    assert_eq!(h.backend.calls().last(), Some(&BackendCall::Seek(0)));
}

#[test]
fn skip_previous_restart_after_threshold() {
    let settings = SessionSettings {
        skip_previous: SkipPrevious::RestartAfter(3_000),
        ..SessionSettings::default()
    };
    let mut h = Harness::with_settings(2, settings);
    h.playing(&[T1, T2]);
    h.session.skip_next();
    h.ready();

    h.backend_event(BackendEvent::Position(5_000));
    h.session.skip_previous();
    assert_eq!(*h.session.state(), PlaybackState::Playing(T2, 0));

    h.backend_event(BackendEvent::Position(1_000));
    h.session.skip_previous();
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T1));
}

#[test]
fn skip_previous_restart_track() {
    let settings = SessionSettings {
        skip_previous: SkipPrevious::RestartTrack,
        ..SessionSettings::default()
    };
    let mut h = Harness::with_settings(2, settings);
    h.playing(&[T1, T2]);
    h.session.skip_next();
    h.ready();

    h.session.skip_previous();

    assert_eq!(*h.session.state(), PlaybackState::Playing(T2, 0));
    assert_eq!(h.cursor(), Some(1));
}

#[test]
fn unknown_ids_are_not_queued() {
    let mut h = Harness::new(2);

    h.session.enqueue(vec![T1, TrackId(77), T2]);
    h.session.insert(0, vec![TrackId(78)]);

    let queued: Vec<TrackId> = h.session.queue().entries().iter().map(|e| e.track_id).collect();
    assert_eq!(queued, vec![T1, T2]);
}

#[test]
fn play_queue_of_unknown_ids_stops() {
    let mut h = Harness::new(1);
    h.playing(&[T1]);

    h.session.play_queue(vec![TrackId(99)]);

    assert_eq!(*h.session.state(), PlaybackState::Idle);
    assert!(h.session.queue().is_empty());
}

#[test]
fn start_moves_cursor_to_queued_track() {
    let mut h = Harness::new(3);
    h.session.enqueue(vec![T1, T2, T3]);

    h.session.start(T3);

    assert_eq!(h.cursor(), Some(2));
    assert_eq!(*h.session.state(), PlaybackState::Preparing(T3));
}

#[test]
fn clear_queue_stops_playback() {
    let mut h = Harness::new(2);
    h.playing(&[T1, T2]);

    h.session.clear_queue();

    assert_eq!(*h.session.state(), PlaybackState::Idle);
    assert_eq!(h.session.snapshot(), Snapshot::default());
}

#[test]
fn reorder_commands_reach_the_queue() {
    let mut h = Harness::new(3);
    h.playing(&[T1, T2, T3]);

    h.session.apply(Command::Reorder(Reorder::Move { from: 2, to: 0 }));

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.queue[0].track_id, T3);
    assert_eq!(snapshot.current_track_id(), Some(T1));
    assert_eq!(snapshot.state, PlaybackState::Playing(T1, 0));
}

#[test]
fn queue_survives_a_restart() {
    let fixture = TestLibrary::with_tracks(3);
    let path = fixture.database_path();

    {
        let queue = QueueManager::restore(
            CursorPolicy::Clamp,
            Box::new(SqliteQueueStore::open(&path).unwrap()),
        )
        .unwrap();
        let mut session = Session::new(
            Arc::clone(&fixture.library),
            queue,
            Box::new(RecordingBackend::default()),
            SessionSettings::default(),
        );
        session.play_queue(vec![T1, T2, T3]);
        session.skip_next();
    }

    let restored = QueueManager::restore(
        CursorPolicy::Clamp,
        Box::new(SqliteQueueStore::open(&path).unwrap()),
    )
    .unwrap();

    assert_eq!(restored.len(), 3);
    assert_eq!(restored.cursor(), Some(1));
    assert_eq!(restored.current_track_id(), Some(T2));
}

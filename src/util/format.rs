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

use crate::model::PlaybackState;

/// Formats a duration in milliseconds into a human-readable `MM:SS` string.
///
/// Sub-second remainders are truncated.
///
/// # Arguments
///
/// * `millis` - The duration to format.
///
/// # Examples
///
/// ```
/// assert_eq!(format_time(65_400), "01:05");
/// assert_eq!(format_time(3_600_000), "60:00");
/// ```
pub(crate) fn format_time(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let mins = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// Formats an optional duration, using `--:--` when it is unknown.
pub(crate) fn format_duration(millis: Option<u64>) -> String {
    millis.map_or_else(|| "--:--".to_string(), format_time)
}

/// A short label for a playback state, without the track.
pub(crate) fn state_label(state: &PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "stopped",
        PlaybackState::Preparing(_) => "loading",
        PlaybackState::Playing(..) => "playing",
        PlaybackState::Paused(..) => "paused",
        PlaybackState::Completed(_) => "finished",
        PlaybackState::Error(..) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackId;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65_999), "01:05");
        assert_eq!(format_time(3_600_000), "60:00");
        assert_eq!(format_duration(None), "--:--");
        assert_eq!(format_duration(Some(181_000)), "03:01");
    }

    #[test]
    fn labels_states() {
        assert_eq!(state_label(&PlaybackState::Idle), "stopped");
        assert_eq!(state_label(&PlaybackState::Paused(TrackId(1), 5)), "paused");
    }
}

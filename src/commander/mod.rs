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

//! Command-line input parsing.
//!
//! Turns one line typed at the prompt into an [`Input`]: either a [`Command`]
//! for the engine, or a request the front-end answers itself from the
//! library.

#[cfg(test)]
mod tests;

use std::{collections::BTreeSet, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};

use crate::{
    events::{Command, Reorder},
    model::TrackId,
};

const DEFAULT_LIST_LIMIT: usize = 10;

pub(crate) const HELP: &str = "\
commands:
  start ID          play a track          p                 play/pause
  pause | resume    pause or resume       stop              stop playback
  seek [MM:]SS      seek                  pn | pp           next / previous
  aq ID..           enqueue               ins POS ID..      insert
  mv FROM TO        move entry            shuffle           shuffle upcoming
  rm POS..          remove entries        cq                clear queue
  pq ID..           play these ids        at POS            play queue entry
  s TEXT            search library        scan [DIR]        scan directories
  st                status                sq                show queue
  stats ID          track statistics      top [N]           most played
  fav ID | unfav ID mark favourite        favs              list favourites
  recent [N]        recently played       new [N]           recently added
  artist NAME       tracks by artist      album NAME        tracks on album
  artists           list artists          albums            list albums
  info              library totals        q                 quit";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Engine(Command),
    Search(String),
    Scan(Option<PathBuf>),
    Status,
    ShowQueue,
    Stats(TrackId),
    Favourite(TrackId, bool),
    MostPlayed(usize),
    Favourites,
    RecentlyPlayed(usize),
    RecentlyAdded(usize),
    ByArtist(String),
    ByAlbum(String),
    Artists,
    Albums,
    Totals,
    Help,
    Quit,
    Empty,
}

/// Parses one line of input.
///
/// # Errors
///
/// Returns an error for an unknown command or malformed arguments.
pub(crate) fn parse(line: &str) -> Result<Input> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let input = match parts.as_slice() {
        [] => Input::Empty,

        ["q" | "quit"] => Input::Quit,
        ["h" | "help" | "?"] => Input::Help,

        ["st" | "status"] => Input::Status,
        ["sq" | "queue"] => Input::ShowQueue,

        ["scan"] => Input::Scan(None),
        ["scan", dir @ ..] => Input::Scan(Some(PathBuf::from(dir.join(" ")))),

        ["s" | "search", text @ ..] if !text.is_empty() => Input::Search(text.join(" ")),

        ["stats", id] => Input::Stats(track_id(id)?),
        ["fav", id] => Input::Favourite(track_id(id)?, true),
        ["unfav", id] => Input::Favourite(track_id(id)?, false),

        ["top"] => Input::MostPlayed(DEFAULT_LIST_LIMIT),
        ["top", limit] => Input::MostPlayed(number(limit)?),
        ["favs"] => Input::Favourites,
        ["recent"] => Input::RecentlyPlayed(DEFAULT_LIST_LIMIT),
        ["recent", limit] => Input::RecentlyPlayed(number(limit)?),
        ["new"] => Input::RecentlyAdded(DEFAULT_LIST_LIMIT),
        ["new", limit] => Input::RecentlyAdded(number(limit)?),
        ["artist", name @ ..] if !name.is_empty() => Input::ByArtist(name.join(" ")),
        ["album", name @ ..] if !name.is_empty() => Input::ByAlbum(name.join(" ")),
        ["artists"] => Input::Artists,
        ["albums"] => Input::Albums,
        ["info"] => Input::Totals,

        ["start", id] => Input::Engine(Command::Start(track_id(id)?)),
        ["p"] => Input::Engine(Command::TogglePause),
        ["pause"] => Input::Engine(Command::Pause),
        ["resume"] => Input::Engine(Command::Resume),
        ["stop"] => Input::Engine(Command::Stop),
        ["seek", position] => Input::Engine(Command::Seek(position_ms(position)?)),
        ["pn" | "next"] => Input::Engine(Command::SkipNext),
        ["pp" | "prev"] => Input::Engine(Command::SkipPrevious),

        ["aq", ids @ ..] if !ids.is_empty() => Input::Engine(Command::Enqueue(track_ids(ids)?)),
        ["ins", position, ids @ ..] if !ids.is_empty() => {
            Input::Engine(Command::Insert(number(position)?, track_ids(ids)?))
        }
        ["mv", from, to] => Input::Engine(Command::Reorder(Reorder::Move {
            from: number(from)?,
            to: number(to)?,
        })),
        ["shuffle"] => Input::Engine(Command::Reorder(Reorder::ShuffleUpcoming)),
        ["rm", positions @ ..] if !positions.is_empty() => {
            let positions = positions
                .iter()
                .map(|p| number(p))
                .collect::<Result<BTreeSet<usize>>>()?;
            Input::Engine(Command::RemoveFromQueue(positions))
        }
        ["cq"] => Input::Engine(Command::ClearQueue),
        ["pq", ids @ ..] if !ids.is_empty() => Input::Engine(Command::PlayQueue(track_ids(ids)?)),
        ["at", position] => Input::Engine(Command::PlayAt(number(position)?)),

        [cmd, ..] => bail!("Unknown command or missing arguments: {}", cmd),
    };

    Ok(input)
}

fn track_id(text: &str) -> Result<TrackId> {
    TrackId::from_str(text).with_context(|| format!("Invalid track id: {}", text))
}

fn track_ids(texts: &[&str]) -> Result<Vec<TrackId>> {
    texts.iter().map(|t| track_id(t)).collect()
}

fn number(text: &str) -> Result<usize> {
    text.parse()
        .with_context(|| format!("Invalid number: {}", text))
}

/// Parses `SS` or `MM:SS` into milliseconds.
fn position_ms(text: &str) -> Result<u64> {
    let seconds = match text.split_once(':') {
        Some((mins, secs)) => {
            let mins: u64 = mins.parse().with_context(|| format!("Invalid minutes: {}", mins))?;
            let secs: u64 = secs.parse().with_context(|| format!("Invalid seconds: {}", secs))?;
            if secs >= 60 {
                bail!("Seconds out of range: {}", secs);
            }
            mins.checked_mul(60)
                .and_then(|s| s.checked_add(secs))
                .with_context(|| format!("Position out of range: {}", text))?
        }
        None => text
            .parse()
            .with_context(|| format!("Invalid position: {}", text))?,
    };

    seconds
        .checked_mul(1000)
        .with_context(|| format!("Position out of range: {}", text))
}

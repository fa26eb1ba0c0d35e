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

use super::*;

#[test]
fn blank_line_is_empty() {
    assert_eq!(parse("   ").unwrap(), Input::Empty);
}

#[test]
fn playback_commands() {
    assert_eq!(parse("p").unwrap(), Input::Engine(Command::TogglePause));
    assert_eq!(parse("pn").unwrap(), Input::Engine(Command::SkipNext));
    assert_eq!(parse("pp").unwrap(), Input::Engine(Command::SkipPrevious));
    assert_eq!(
        parse("start 00000000000000ff").unwrap(),
        Input::Engine(Command::Start(TrackId(255)))
    );
}

#[test]
fn seek_positions() {
    assert_eq!(parse("seek 90").unwrap(), Input::Engine(Command::Seek(90_000)));
    assert_eq!(parse("seek 1:30").unwrap(), Input::Engine(Command::Seek(90_000)));
    assert!(parse("seek 1:75").is_err());
    assert!(parse("seek soon").is_err());
}

#[test]
fn seek_rejects_positions_that_overflow() {
    assert!(parse("seek 18446744073709552").is_err());
    assert!(parse("seek 307445734561825861:00").is_err());
    assert_eq!(
        parse("seek 18446744073709551").unwrap(),
        Input::Engine(Command::Seek(18_446_744_073_709_551_000))
    );
}

#[test]
fn queue_commands() {
    assert_eq!(
        parse("aq 1 2 a").unwrap(),
        Input::Engine(Command::Enqueue(vec![TrackId(1), TrackId(2), TrackId(10)]))
    );
    assert_eq!(
        parse("ins 0 3").unwrap(),
        Input::Engine(Command::Insert(0, vec![TrackId(3)]))
    );
    assert_eq!(
        parse("mv 2 0").unwrap(),
        Input::Engine(Command::Reorder(Reorder::Move { from: 2, to: 0 }))
    );
    assert_eq!(
        parse("rm 3 1 3").unwrap(),
        Input::Engine(Command::RemoveFromQueue(BTreeSet::from([1, 3])))
    );
    assert_eq!(parse("at 4").unwrap(), Input::Engine(Command::PlayAt(4)));
}

#[test]
fn library_requests() {
    assert_eq!(
        parse("s  blue   monday").unwrap(),
        Input::Search("blue monday".to_string())
    );
    assert_eq!(parse("top").unwrap(), Input::MostPlayed(10));
    assert_eq!(parse("top 3").unwrap(), Input::MostPlayed(3));
    assert_eq!(parse("unfav 2a").unwrap(), Input::Favourite(TrackId(42), false));
    assert_eq!(parse("favs").unwrap(), Input::Favourites);
    assert_eq!(parse("recent").unwrap(), Input::RecentlyPlayed(10));
    assert_eq!(parse("new 25").unwrap(), Input::RecentlyAdded(25));
    assert_eq!(
        parse("artist new  order").unwrap(),
        Input::ByArtist("new order".to_string())
    );
    assert_eq!(parse("album Closer").unwrap(), Input::ByAlbum("Closer".to_string()));
    assert_eq!(parse("artists").unwrap(), Input::Artists);
    assert_eq!(parse("albums").unwrap(), Input::Albums);
    assert_eq!(parse("info").unwrap(), Input::Totals);
    assert_eq!(
        parse("scan /srv/my music").unwrap(),
        Input::Scan(Some(PathBuf::from("/srv/my music")))
    );
}

#[test]
fn rejects_unknown_and_incomplete() {
    assert!(parse("dance").is_err());
    assert!(parse("aq").is_err());
    assert!(parse("artist").is_err());
    assert!(parse("start not-hex").is_err());
}

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

//! Media file discovery.
//!
//! This module walks a directory tree and turns audio files into [`Track`]
//! records. It utilizes `WalkDir` for directory traversal and `Lofty` for
//! metadata extraction.
//!
//! The scan is lazy: nothing is read until the caller pulls the next item, and
//! every call to [`scan`] starts a fresh walk. A file that cannot be read
//! produces a [`ScanOutcome::Failed`] item and the walk carries on.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use walkdir::WalkDir;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

use crate::model::{Track, TrackId};

/// How many leading bytes of an untagged file contribute to its id.
const FINGERPRINT_BYTES: u64 = 64 * 1024;

/// A single result of a library scan.
#[derive(Debug)]
pub(crate) enum ScanOutcome {
    Discovered(Track),
    Failed { locator: PathBuf, cause: String },
}

/// Lazily scans `root` for audio files with one of the given extensions.
///
/// # Arguments
///
/// * `root` - The directory to walk recursively.
/// * `extensions` - Accepted file extensions, compared case-insensitively and
///   without the leading dot.
///
/// # Returns
///
/// An iterator yielding one [`ScanOutcome`] per candidate file, plus one
/// failure per unreadable directory entry.
pub(crate) fn scan(root: &Path, extensions: &[String]) -> impl Iterator<Item = ScanOutcome> + use<> {
    let root = root.to_path_buf();
    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    WalkDir::new(root.clone())
        .follow_links(true)
        .into_iter()
        .filter_map(move |entry| match entry {
            Err(e) => Some(ScanOutcome::Failed {
                locator: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                cause: e.to_string(),
            }),
            Ok(entry) => {
                if !entry.file_type().is_file() || !has_extension(entry.path(), &extensions) {
                    return None;
                }

                Some(match read_track(entry.path()) {
                    Ok(track) => ScanOutcome::Discovered(track),
                    Err(e) => ScanOutcome::Failed {
                        locator: entry.path().to_path_buf(),
                        cause: format!("{:#}", e),
                    },
                })
            }
        })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Probes a single audio file and builds its [`Track`].
///
/// Files without tags still produce a track, titled after the file name.
/// Paths that are not valid UTF-8 are rejected, as neither the library nor
/// the player can store them.
pub(crate) fn read_track(path: &Path) -> Result<Track> {
    if path.to_str().is_none() {
        bail!("Path contains invalid UTF-8");
    }

    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .context("Failed to read audio file")?;

    let duration = tagged_file.properties().duration();
    let duration_ms = (!duration.is_zero()).then(|| duration.as_millis() as u64);

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let title = tag
        .and_then(|t| t.title())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file_stem(path));
    let artist = tag.and_then(|t| t.artist()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let album = tag.and_then(|t| t.album()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let genre = tag.and_then(|t| t.genre()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let year = tag.and_then(tag_year);

    let id = match (&artist, tag.is_some()) {
        (Some(artist), true) => metadata_id(artist, album.as_deref(), &title, duration_ms),
        _ => content_id(path)?,
    };

    Ok(Track {
        id,
        locator: path.to_path_buf(),
        duration_ms,
        title,
        artist,
        album,
        genre,
        year,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn tag_year(tag: &Tag) -> Option<u32> {
    [ItemKey::Year, ItemKey::RecordingDate]
        .iter()
        .filter_map(|key| tag.get(key).and_then(|item| item.value().text()))
        .find_map(parse_year)
}

/// Extracts a leading four digit year from values such as `1999` or
/// `1999-04-12`.
pub(crate) fn parse_year(value: &str) -> Option<u32> {
    let digits: String = value.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Identity of a tagged track, independent of where the file lives.
pub(crate) fn metadata_id(artist: &str, album: Option<&str>, title: &str, duration_ms: Option<u64>) -> TrackId {
    let seconds = duration_ms.map(|d| d / 1000).unwrap_or_default();
    let key = format!(
        "{}\0{}\0{}\0{}",
        artist.to_lowercase(),
        album.unwrap_or_default().to_lowercase(),
        title.to_lowercase(),
        seconds
    );

    TrackId(xxh3_64(key.as_bytes()))
}

/// Identity of an untagged file: its length and leading bytes.
fn content_id(path: &Path) -> Result<TrackId> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file.metadata()?.len();

    let mut head = Vec::new();
    file.take(FINGERPRINT_BYTES)
        .read_to_end(&mut head)
        .context("Failed to read file header")?;

    let mut hasher = Xxh3::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(&head);

    Ok(TrackId(hasher.digest()))
}

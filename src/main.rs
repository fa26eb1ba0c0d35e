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

//! # Headless music player.
//!
//! A music library and playback engine driven from the console.
//!
//! The engine is split across a few threads that only talk through
//! `std::sync::mpsc` channels:
//!
//! * The **Main Thread** reads commands from stdin and issues them to the
//!   engine.
//! * The **Dispatcher** owns the playback session and applies commands and
//!   backend callbacks strictly one at a time.
//! * The **MPV Worker** drives `libmpv` and reports load, position and end of
//!   file events back to the dispatcher.
//! * The **Observer** prints every published snapshot.
//!
//! ## Architecture
//!
//! Tracks live in the library, the queue refers to them by id only, and the
//! play queue is written to the same SQLite file on every change so it
//! survives a restart. Playback itself is never resumed automatically.

mod commander;
mod config;
mod db;
mod error;
mod events;
mod library;
mod model;
mod player;
mod queue;
mod session;
mod util;

use std::{
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::{Arc, mpsc::Receiver},
    thread,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    commander::Input,
    config::AppConfig,
    db::queue::SqliteQueueStore,
    events::{BackendSender, Engine},
    library::Library,
    model::{PlaybackState, Snapshot, Track, TrackId},
    player::MpvBackend,
    queue::{QueueManager, QueueView},
    session::Session,
    util::format::{format_duration, format_time, state_label},
};

#[derive(Parser, Debug)]
#[command(name = "chooplay")]
#[command(about = "Console music player")]
#[command(version)]
struct Args {
    /// Library database file, overriding the configured one
    #[arg(long, env = "CHOOPLAY_DATABASE")]
    database: Option<PathBuf>,

    /// Scan the media directories before starting
    #[arg(long)]
    scan: bool,

    /// Media directories to scan instead of the configured ones
    dirs: Vec<PathBuf>,
}

/// The entry point of the application.
///
/// Opens the library, restores the queue, starts the engine and then reads
/// commands from stdin until `q` or end of input.
fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = config::load_config();

    init_logging(&config);

    // The first directories given on the command line become the default.
    if config.media_dirs.is_empty() && !args.dirs.is_empty() {
        config.media_dirs = args.dirs.iter().map(|d| d.display().to_string()).collect();
        if let Err(e) = config::save_config(&config) {
            warn!("Failed to save configuration: {}", e);
        }
    }

    let database = args
        .database
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.database_file));

    let library = Arc::new(Library::open(&database).context("Failed to open library")?);

    let dirs: Vec<PathBuf> = if args.dirs.is_empty() {
        config.media_dirs.iter().map(PathBuf::from).collect()
    } else {
        args.dirs.clone()
    };
    if args.scan || config.scan_on_start || !args.dirs.is_empty() {
        for dir in &dirs {
            scan_directory(&library, dir, &config.extensions);
        }
    }

    let store = SqliteQueueStore::open(&database)?;
    let queue = QueueManager::restore(config.cursor_policy, Box::new(store))
        .context("Failed to restore play queue")?;
    let queue_view = queue.view();

    let (event_tx, event_rx) = events::channel();
    let backend = MpvBackend::new(BackendSender::new(event_tx.clone()))
        .context("Failed to start audio backend")?;

    let session = Session::new(
        Arc::clone(&library),
        queue,
        Box::new(backend),
        config.session_settings(),
    );
    let engine = Engine::spawn(session, event_tx, event_rx).context("Failed to start engine")?;

    let snapshots = engine.subscribe()?;
    let observer = {
        let library = Arc::clone(&library);
        thread::Builder::new()
            .name("observer".to_string())
            .spawn(move || print_snapshots(&library, snapshots))
            .context("Failed to spawn observer")?
    };

    info!(tracks = library.len(), "Ready");
    println!("{}", commander::HELP);

    let res = run(&engine, &library, &queue_view, &config);

    engine.shutdown();
    let _ = observer.join();

    res.context("Application error occurred")
}

/// Installs the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured filter.
fn init_logging(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| "chooplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Reads and executes commands until asked to quit or stdin closes.
fn run(engine: &Engine, library: &Library, queue: &QueueView, config: &AppConfig) -> Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read input")?;

        let input = match commander::parse(&line) {
            Ok(input) => input,
            Err(e) => {
                println!("{:#}", e);
                continue;
            }
        };

        match execute(input, engine, library, queue, config) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}

/// Executes one parsed input. Returns `false` when the user quits.
fn execute(
    input: Input,
    engine: &Engine,
    library: &Library,
    queue: &QueueView,
    config: &AppConfig,
) -> error::Result<bool> {
    match input {
        Input::Quit => return Ok(false),
        Input::Empty => {}
        Input::Help => println!("{}", commander::HELP),

        Input::Engine(command) => engine.issue(command)?,

        Input::Status => print_status(library, &engine.snapshot()),
        Input::ShowQueue => print_queue(library, queue),

        Input::Search(text) => print_tracks(&library.search(&text)?),

        Input::Scan(dir) => {
            let dirs = match dir {
                Some(dir) => vec![dir],
                None => config.media_dirs.iter().map(PathBuf::from).collect(),
            };
            for dir in &dirs {
                scan_directory(library, dir, &config.extensions);
            }
        }

        Input::Stats(id) => {
            let track = library.lookup(id)?;
            let stats = library.stats(id)?;
            let last_played = stats
                .last_played_ms
                .map(local_time)
                .unwrap_or_else(|| "never".to_string());

            println!(
                "{}: played {} times, last {}{}",
                track.display_name(),
                stats.play_count,
                last_played,
                if stats.favourite { ", favourite" } else { "" }
            );
        }

        Input::Favourite(id, favourite) => library.set_favourite(id, favourite)?,

        Input::MostPlayed(limit) => {
            for (track, count) in library.most_played(limit)? {
                println!("{:>5}  {}  {}", count, track.id, track.display_name());
            }
        }

        Input::Favourites => print_tracks(&library.favourites()?),

        Input::RecentlyPlayed(limit) => {
            for (track, played_at) in library.recently_played(limit)? {
                println!("{}  {}  {}", local_time(played_at), track.id, track.display_name());
            }
        }

        Input::RecentlyAdded(limit) => print_tracks(&library.recently_added(limit)?),
        Input::ByArtist(artist) => print_tracks(&library.tracks_by_artist(&artist)?),
        Input::ByAlbum(album) => print_tracks(&library.tracks_by_album(&album)?),

        Input::Artists => library.artists()?.iter().for_each(|artist| println!("{}", artist)),
        Input::Albums => library.albums()?.iter().for_each(|album| println!("{}", album)),

        Input::Totals => {
            let totals = library.totals()?;
            println!(
                "{} tracks, {} artists, {} albums, {} total",
                totals.tracks,
                totals.artists,
                totals.albums,
                format_time(totals.duration_ms)
            );
        }
    }

    Ok(true)
}

fn scan_directory(library: &Library, dir: &Path, extensions: &[String]) {
    match library.import(dir, extensions) {
        Ok(report) => println!(
            "{}: {} tracks, {} unreadable, {} removed",
            dir.display(),
            report.discovered,
            report.failed.len(),
            report.removed
        ),
        Err(e) => warn!(dir = %dir.display(), "Scan failed: {}", e),
    }
}

fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("no matches");
    }
    for track in tracks {
        println!("{}  {}  {}", track.id, format_duration(track.duration_ms), track.display_name());
    }
}

/// Renders milliseconds since the epoch in local time.
fn local_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn track_name(library: &Library, id: TrackId) -> String {
    library
        .lookup(id)
        .map(|track| track.display_name())
        .unwrap_or_else(|_| format!("<missing {}>", id))
}

fn print_status(library: &Library, snapshot: &Snapshot) {
    let state = &snapshot.state;

    let Some(id) = state.track_id() else {
        match snapshot.current_track_id() {
            Some(next) => println!("[{}] next up: {}", state_label(state), track_name(library, next)),
            None => println!("[{}]", state_label(state)),
        }
        return;
    };

    let duration = library.lookup(id).ok().and_then(|t| t.duration_ms);
    match state {
        PlaybackState::Playing(_, position) | PlaybackState::Paused(_, position) => println!(
            "[{}] {} {} / {}",
            state_label(state),
            track_name(library, id),
            format_time(*position),
            format_duration(duration)
        ),
        PlaybackState::Error(_, cause) => {
            println!("[{}] {}: {}", state_label(state), track_name(library, id), cause)
        }
        _ => println!("[{}] {}", state_label(state), track_name(library, id)),
    }
}

fn print_queue(library: &Library, queue: &QueueView) {
    let (entries, cursor) = queue.snapshot();
    if entries.is_empty() {
        println!("queue is empty");
        return;
    }

    for entry in entries {
        let marker = if Some(entry.position) == cursor { '>' } else { ' ' };
        println!(
            "{} {:>3}  {}  {}",
            marker,
            entry.position,
            entry.track_id,
            track_name(library, entry.track_id)
        );
    }
}

/// Prints snapshots as they arrive, skipping those that only move the
/// playback position.
fn print_snapshots(library: &Library, snapshots: Receiver<Snapshot>) {
    let mut last: Option<PlaybackState> = None;

    for snapshot in snapshots {
        let position_only = matches!(
            (&last, &snapshot.state),
            (Some(PlaybackState::Playing(a, _)), PlaybackState::Playing(b, _)) if a == b
        );
        if !position_only {
            print_status(library, &snapshot);
        }
        last = Some(snapshot.state);
    }
}

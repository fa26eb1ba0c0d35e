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

//! MPV-backed media backend.
//!
//! This module implements [`MediaBackend`] on top of `libmpv`. A dedicated
//! worker thread owns the MPV context and bridges between the session's calls
//! and MPV's property observation system.
//!
//! # Architecture
//!
//! The worker operates using a dual-channel communication pattern:
//! 1. **Command Channel**: Receives [`MpvCommand`]s from the session.
//! 2. **Event Channel**: Forwards [`BackendEvent`]s into the engine's event
//!    stream, tagged with the token of the load in progress.

use std::{
    path::Path,
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result, anyhow};
use mpv::Format;
use tracing::{debug, error, warn};

use crate::{
    events::BackendSender,
    player::{BackendEvent, MediaBackend},
    session::SessionToken,
};

/// How long the worker waits for an MPV event before checking for commands.
const EVENT_WAIT_SECS: f64 = 0.05;

#[derive(Debug)]
enum MpvCommand {
    Load(SessionToken, String),
    Play,
    Pause,
    Seek(u64),
    Release,
    Shutdown,
}

/// A handle to the MPV worker thread.
///
/// This struct acts as a command proxy; it does not perform audio processing
/// itself but instead sends instructions to the worker.
pub(crate) struct MpvBackend {
    command_tx: Sender<MpvCommand>,
    worker: Option<JoinHandle<()>>,
}

impl MpvBackend {
    /// Spawns the MPV worker thread and returns a new backend handle.
    ///
    /// # Arguments
    ///
    /// * `events` - Where the worker delivers [`BackendEvent`]s.
    pub(crate) fn new(events: BackendSender) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<MpvCommand>();

        let worker = thread::Builder::new()
            .name("mpv-backend".to_string())
            .spawn(move || {
                if let Err(e) = mpv_worker(command_rx, &events) {
                    error!("MPV worker failure: {:#}", e);
                }
            })
            .context("Failed to spawn MPV worker")?;

        Ok(Self {
            command_tx,
            worker: Some(worker),
        })
    }

    fn send(&self, command: MpvCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| anyhow!("MPV worker is not running"))
    }
}

impl MediaBackend for MpvBackend {
    fn load(&mut self, token: SessionToken, locator: &Path) -> Result<()> {
        let filename = locator.to_str().context("Path contains invalid UTF-8")?;
        self.send(MpvCommand::Load(token, filename.to_string()))
    }

    fn play(&mut self) -> Result<()> {
        self.send(MpvCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(MpvCommand::Pause)
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.send(MpvCommand::Seek(position_ms))
    }

    fn release(&mut self) -> Result<()> {
        self.send(MpvCommand::Release)
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MpvCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker-side view of the load in progress.
#[derive(Default)]
struct LoadState {
    token: Option<SessionToken>,
    loading: bool,
    /// Set from a seek command until MPV restarts playback at the target.
    seeking: bool,
}

/// The primary execution loop for the MPV worker.
///
/// Initializes a local `libmpv` context with audio only output, then
/// alternates between draining commands and waiting briefly for MPV events
/// until told to shut down or the engine goes away.
///
/// # Errors
///
/// Returns an error if the MPV context fails to initialize or if MPV rejects
/// a property observation.
fn mpv_worker(command_rx: Receiver<MpvCommand>, events: &BackendSender) -> Result<()> {
    let mut handler = (|| {
        let mut builder = mpv::MpvHandlerBuilder::new().context("Failed to create MPV builder")?;
        builder
            .set_option("vo", "null")
            .context("Failed to set no video output")?;
        builder.build().context("Failed to build MPV handler")
    })()?;

    handler
        .observe_property::<f64>("time-pos", 0)
        .context("Failed to observe time-pos")?;

    let mut load = LoadState::default();

    loop {
        if !process_commands(&mut handler, &command_rx, &mut load, events) {
            break;
        }
        if !process_mpv_events(&mut handler, &mut load, events) {
            break;
        }
    }

    handler.command(&["stop"]).ok();
    debug!("MPV worker stopped");

    Ok(())
}

/// Drains and executes all pending commands.
///
/// Returns `false` once the worker should stop.
fn process_commands(
    handler: &mut mpv::MpvHandler,
    command_rx: &Receiver<MpvCommand>,
    load: &mut LoadState,
    events: &BackendSender,
) -> bool {
    loop {
        let command = match command_rx.try_recv() {
            Ok(command) => command,
            Err(mpsc::TryRecvError::Empty) => return true,
            Err(mpsc::TryRecvError::Disconnected) => return false,
        };

        match command {
            MpvCommand::Load(token, filename) => {
                load.token = Some(token);
                load.loading = true;
                load.seeking = false;

                let started = handler
                    .set_property("pause", true)
                    .and_then(|_| handler.command(&["loadfile", &filename, "replace"]));

                if let Err(e) = started {
                    load.loading = false;
                    let cause = format!("Failed to load file {}: {:?}", filename, e);
                    if events.notify(token, BackendEvent::Failed(cause)).is_err() {
                        return false;
                    }
                }
            }
            MpvCommand::Play => {
                if let Err(e) = handler.set_property("pause", false) {
                    warn!("Failed to unpause: {:?}", e);
                }
            }
            MpvCommand::Pause => {
                if let Err(e) = handler.set_property("pause", true) {
                    warn!("Failed to pause: {:?}", e);
                }
            }
            MpvCommand::Seek(position_ms) => {
                let seconds = format!("{:.3}", position_ms as f64 / 1000.0);
                match handler.command(&["seek", &seconds, "absolute"]) {
                    Ok(()) => load.seeking = true,
                    Err(e) => warn!("Seek to {}s rejected: {:?}", seconds, e),
                }
            }
            MpvCommand::Release => {
                load.token = None;
                load.loading = false;
                load.seeking = false;
                handler.command(&["stop"]).ok();
            }
            MpvCommand::Shutdown => return false,
        }
    }
}

/// The parts of an MPV event the worker cares about, detached from the
/// handler's borrow.
enum Observed {
    FileLoaded,
    PlaybackRestart,
    Position(f64),
    EndOfFile,
    EndWithError(String),
    Other,
}

fn observe(event: mpv::Event<'_>) -> Observed {
    match event {
        mpv::Event::FileLoaded => Observed::FileLoaded,
        mpv::Event::PlaybackRestart => Observed::PlaybackRestart,
        mpv::Event::PropertyChange { name, change, .. } => match (name, change) {
            ("time-pos", Format::Double(seconds)) if seconds >= 0.0 => Observed::Position(seconds),
            _ => Observed::Other,
        },
        mpv::Event::EndFile(result) => match result {
            Ok(mpv::EndFileReason::MPV_END_FILE_REASON_EOF) => Observed::EndOfFile,
            Ok(mpv::EndFileReason::MPV_END_FILE_REASON_ERROR) => {
                Observed::EndWithError("playback error".to_string())
            }
            Ok(_) => Observed::Other,
            Err(e) => Observed::EndWithError(format!("{:?}", e)),
        },
        _ => Observed::Other,
    }
}

/// Polls for an MPV event and forwards it as a [`BackendEvent`].
///
/// Events arriving while no load is active are dropped. Returns `false` once
/// the engine's event channel has closed.
fn process_mpv_events(handler: &mut mpv::MpvHandler, load: &mut LoadState, events: &BackendSender) -> bool {
    let observed = match handler.wait_event(EVENT_WAIT_SECS) {
        Some(event) => observe(event),
        None => return true,
    };

    let Some(token) = load.token else {
        return true;
    };

    let backend_event = match observed {
        Observed::FileLoaded if load.loading => {
            load.loading = false;
            let duration_ms = handler
                .get_property::<f64>("duration")
                .ok()
                .filter(|seconds| *seconds > 0.0)
                .map(|seconds| (seconds * 1000.0) as u64);
            Some(BackendEvent::Ready { duration_ms })
        }
        Observed::PlaybackRestart => {
            load.seeking = false;
            None
        }
        // Positions reported between a seek and the restart are from before it.
        Observed::Position(seconds) if !load.loading && !load.seeking => {
            Some(BackendEvent::Position((seconds * 1000.0) as u64))
        }
        Observed::EndOfFile if !load.loading => Some(BackendEvent::Ended),
        Observed::EndWithError(cause) => {
            load.loading = false;
            Some(BackendEvent::Failed(cause))
        }
        _ => None,
    };

    match backend_event {
        Some(event) => events.notify(token, event).is_ok(),
        None => true,
    }
}

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

//! Event dispatching.
//!
//! User commands and backend callbacks arrive from different threads. This
//! module funnels both into one [`EngineEvent`] channel, drained by a single
//! dispatcher thread that owns the [`Session`]. Whatever the session ends up
//! in is published as a [`Snapshot`] to a shared slot and to every
//! subscribed observer.
//!
//! # Organization
//!
//! * [`Command`]: the operations a front-end can request.
//! * [`BackendSender`]: the handle a media backend reports through.
//! * [`Engine`]: the front-end's handle on the running dispatcher.


use std::{
    collections::BTreeSet,
    sync::{
        Arc, PoisonError, RwLock,
        mpsc::{self, Receiver, Sender},
    },
    thread::{self, JoinHandle},
};

use anyhow::Context;
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    model::{Snapshot, TrackId},
    player::BackendEvent,
    session::{Session, SessionToken},
};

/// An operation requested by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Start(TrackId),
    Pause,
    Resume,
    TogglePause,
    Stop,
    Seek(u64),
    SkipNext,
    SkipPrevious,
    Enqueue(Vec<TrackId>),
    Insert(usize, Vec<TrackId>),
    Reorder(Reorder),
    RemoveFromQueue(BTreeSet<usize>),
    ClearQueue,
    PlayQueue(Vec<TrackId>),
    PlayAt(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reorder {
    Move { from: usize, to: usize },
    ShuffleUpcoming,
}

#[derive(Debug)]
pub(crate) enum EngineEvent {
    Command(Command),
    Backend {
        token: SessionToken,
        event: BackendEvent,
    },
    Subscribe(Sender<Snapshot>),
    Shutdown,
}

/// Creates the channel the dispatcher consumes.
///
/// The channel exists before the [`Engine`] so that a backend can be handed a
/// [`BackendSender`] ahead of the session it will serve.
pub(crate) fn channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    mpsc::channel()
}

/// Delivers backend callbacks into the dispatcher's event stream.
#[derive(Clone)]
pub(crate) struct BackendSender {
    tx: Sender<EngineEvent>,
}

impl BackendSender {
    pub(crate) fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once the dispatcher has gone.
    pub(crate) fn notify(&self, token: SessionToken, event: BackendEvent) -> Result<()> {
        self.tx
            .send(EngineEvent::Backend { token, event })
            .map_err(|_| Error::ChannelClosed)
    }
}

/// The running engine.
///
/// Dropping the handle shuts the engine down.
pub(crate) struct Engine {
    event_tx: Sender<EngineEvent>,
    snapshot: Arc<RwLock<Snapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Starts the dispatcher thread.
    ///
    /// # Arguments
    ///
    /// * `session` - The session the dispatcher takes ownership of.
    /// * `event_tx` - Sending half of the channel from [`channel`].
    /// * `event_rx` - Receiving half of the same channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub(crate) fn spawn(
        session: Session,
        event_tx: Sender<EngineEvent>,
        event_rx: Receiver<EngineEvent>,
    ) -> Result<Self> {
        let snapshot = Arc::new(RwLock::new(session.snapshot()));

        let mut dispatcher = Dispatcher {
            session,
            snapshot: Arc::clone(&snapshot),
            observers: Vec::new(),
        };

        let worker = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || dispatcher.run(event_rx))
            .context("Failed to spawn dispatcher")?;

        Ok(Self {
            event_tx,
            snapshot,
            worker: Some(worker),
        })
    }

    /// Queues a command for the session.
    pub(crate) fn issue(&self, command: Command) -> Result<()> {
        self.send(EngineEvent::Command(command))
    }

    /// The most recently published snapshot.
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers an observer.
    ///
    /// The receiver gets the current snapshot straight away, then one for
    /// every change.
    pub(crate) fn subscribe(&self) -> Result<Receiver<Snapshot>> {
        let (tx, rx) = mpsc::channel();
        self.send(EngineEvent::Subscribe(tx))?;
        Ok(rx)
    }

    /// Stops playback, releases the backend and waits for the dispatcher to
    /// finish.
    pub(crate) fn shutdown(mut self) {
        self.stop_worker();
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        self.event_tx.send(event).map_err(|_| Error::ChannelClosed)
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.event_tx.send(EngineEvent::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

struct Dispatcher {
    session: Session,
    snapshot: Arc<RwLock<Snapshot>>,
    observers: Vec<Sender<Snapshot>>,
}

impl Dispatcher {
    /// Applies events strictly in arrival order until shutdown, or until every
    /// sender has gone.
    fn run(&mut self, event_rx: Receiver<EngineEvent>) {
        debug!("Dispatcher started");

        while let Ok(event) = event_rx.recv() {
            let shutdown = matches!(event, EngineEvent::Shutdown);

            match event {
                EngineEvent::Command(command) => self.session.apply(command),
                EngineEvent::Backend { token, event } => self.session.on_backend(token, event),
                EngineEvent::Subscribe(observer) => self.subscribe(observer),
                EngineEvent::Shutdown => self.session.shutdown(),
            }

            self.publish();

            if shutdown {
                break;
            }
        }

        info!("Dispatcher stopped");
    }

    fn subscribe(&mut self, observer: Sender<Snapshot>) {
        let current = self.current();
        if observer.send(current).is_ok() {
            self.observers.push(observer);
        }
    }

    /// Publishes every state the last event passed through, then the final
    /// snapshot.
    fn publish(&mut self) {
        let mut transitions = self.session.drain_transitions();
        // The last one is the current state.
        transitions.pop();

        for state in transitions {
            let mut intermediate = self.session.snapshot();
            intermediate.state = state;
            self.offer(intermediate);
        }

        let snapshot = self.session.snapshot();
        self.offer(snapshot);
    }

    /// Stores and broadcasts a snapshot unless it equals the current one.
    fn offer(&mut self, snapshot: Snapshot) {
        {
            let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            if *slot == snapshot {
                return;
            }
            *slot = snapshot.clone();
        }

        self.observers.retain(|observer| observer.send(snapshot.clone()).is_ok());
    }

    fn current(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

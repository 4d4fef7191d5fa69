use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use super::controls::Controls;
use super::input::Key;
use super::navigator::{Intent, Navigator, ReadingMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReaderEvent {
    Key(Key),
    Click { x: f64, width: f64 },
    /// Pointer movement or hover over the controls.
    Pointer,
    GoTo(i64),
    Skip(i64),
    ToggleMode,
}

/// What the view renders.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReaderSnapshot {
    pub page: u32,
    pub total_pages: u32,
    pub mode: ReadingMode,
    pub controls_visible: bool,
    pub progress: f64,
    /// Number of events applied so far. Timer-driven snapshots leave it as is.
    pub events_handled: u64,
}

/// Single-threaded driver for one chapter view: feeds input events to the
/// [`Navigator`] and owns the controls hide timer.
pub struct ReaderSession {
    navigator: Navigator,
    controls: Controls,
    events_handled: u64,
}

impl ReaderSession {
    pub fn new(navigator: Navigator) -> Self {
        ReaderSession {
            navigator,
            controls: Controls::new(Instant::now()),
            events_handled: 0,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            page: self.navigator.page(),
            total_pages: self.navigator.total_pages(),
            mode: self.navigator.mode(),
            controls_visible: self.controls.is_visible(),
            progress: self.navigator.progress(),
            events_handled: self.events_handled,
        }
    }

    /// Applies one event. Every event counts as an interaction.
    pub fn handle(&mut self, event: ReaderEvent, now: Instant) -> Option<Intent> {
        self.controls.interact(now);
        self.events_handled += 1;
        match event {
            ReaderEvent::Key(key) => self.navigator.key(key).intent,
            ReaderEvent::Click { x, width } => self.navigator.click(x, width),
            ReaderEvent::Pointer => None,
            ReaderEvent::GoTo(page) => {
                self.navigator.go_to(page);
                None
            }
            ReaderEvent::Skip(delta) => {
                self.navigator.skip(delta);
                None
            }
            ReaderEvent::ToggleMode => {
                self.navigator.toggle_mode();
                None
            }
        }
    }

    pub fn poll_controls(&mut self, now: Instant) -> bool {
        self.controls.poll(now)
    }

    /// Runs until the event channel closes, which is how the view tears the
    /// session down. The hide timer goes with it. Returns the final position.
    ///
    /// While the router is not taking intents the latest one is held back and
    /// replaces any older one still waiting; events and the hide timer keep
    /// being served in the meantime.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ReaderEvent>,
        intents: mpsc::Sender<Intent>,
        snapshots: watch::Sender<ReaderSnapshot>,
    ) -> Navigator {
        let mut pending: Option<Intent> = None;
        loop {
            let deadline = self.controls.deadline();
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Reader for {} closed", self.navigator.manga_slug());
                        break;
                    };
                    let intent = self.handle(event, Instant::now());
                    snapshots.send_replace(self.snapshot());
                    if let Some(intent) = intent {
                        debug!("Reader intent {:?}", intent);
                        if let Some(dropped) = pending.replace(intent) {
                            warn!("Router busy, dropping intent {:?}", dropped);
                        }
                    }
                }
                permit = intents.reserve(), if pending.is_some() => {
                    let Ok(permit) = permit else { break };
                    if let Some(intent) = pending.take() {
                        permit.send(intent);
                    }
                }
                _ = wait_until(deadline) => {
                    if self.poll_controls(Instant::now()) {
                        snapshots.send_replace(self.snapshot());
                    }
                }
            }
        }
        self.navigator
    }
}

/// Sends one event and waits for the snapshot that reflects it, skipping any
/// published in between (the controls hiding, say). `None` once the session
/// has gone away.
pub async fn dispatch(
    events: &mpsc::Sender<ReaderEvent>,
    snapshots: &mut watch::Receiver<ReaderSnapshot>,
    event: ReaderEvent,
) -> Option<ReaderSnapshot> {
    let handled = snapshots.borrow_and_update().events_handled;
    events.send(event).await.ok()?;
    let snapshot = snapshots
        .wait_for(|snapshot| snapshot.events_handled > handled)
        .await
        .ok()?;
    Some(snapshot.clone())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::chat::controller::{Dispatch, SessionController};
use crate::chat::events::{Intent, StreamEventMapped};
use crate::chat::message::StreamTarget;
use crate::chat::snapshot::SessionSnapshot;
use crate::llm::{ProviderEventStream, ProviderStreamHandle};

/// Messages forwarded from stream reader tasks into the session loop.
#[derive(Debug)]
enum StreamUpdate {
    Event(StreamEventMapped),
    Closed(StreamTarget),
}

/// Cloneable front end of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Intent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queues an intent; returns false once the session loop has stopped.
    pub fn dispatch(&self, intent: Intent) -> bool {
        self.intents.send(intent).is_ok()
    }

    pub fn send(&self, text: impl Into<String>) -> bool {
        self.dispatch(Intent::Send(text.into()))
    }

    /// Latest published snapshot.
    pub fn current(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver of the latest snapshot.
    ///
    /// Intermediate snapshots are skipped when the receiver falls behind; use
    /// [`SessionRuntime::snapshot_feed`] to observe every one.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

/// Single event loop that serializes intents and stream events into the controller.
///
/// One snapshot is published after every applied intent or stream event. The
/// `watch` side only keeps the latest one; the optional feed delivers each of them
/// and holds the loop back while its buffer is full.
pub struct SessionRuntime {
    controller: SessionController,
    intents: mpsc::UnboundedReceiver<Intent>,
    updates_tx: mpsc::UnboundedSender<StreamUpdate>,
    updates_rx: mpsc::UnboundedReceiver<StreamUpdate>,
    snapshots: watch::Sender<SessionSnapshot>,
    feed: Option<mpsc::Sender<SessionSnapshot>>,
    readers: HashMap<StreamTarget, JoinHandle<()>>,
}

impl SessionRuntime {
    pub fn new(mut controller: SessionController) -> (Self, SessionHandle) {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(controller.snapshot());

        let runtime = Self {
            controller,
            intents: intents_rx,
            updates_tx,
            updates_rx,
            snapshots: snapshots_tx,
            feed: None,
            readers: HashMap::new(),
        };
        let handle = SessionHandle {
            intents: intents_tx,
            snapshots: snapshots_rx,
        };

        (runtime, handle)
    }

    /// Opens a bounded feed that receives every published snapshot in order,
    /// starting with the current one.
    ///
    /// The loop waits for room in the feed, so a slow renderer slows the session
    /// down instead of missing fragments. Dropping the receiver detaches the feed.
    /// Only the last call's feed is kept. `capacity` must be non-zero.
    pub fn snapshot_feed(&mut self, capacity: usize) -> mpsc::Receiver<SessionSnapshot> {
        let (feed_tx, feed_rx) = mpsc::channel(capacity);
        self.feed = Some(feed_tx);
        feed_rx
    }

    /// Runs until every [`SessionHandle`] is dropped and the remaining streams have
    /// settled, then returns the final controller.
    ///
    /// Must be polled inside a tokio runtime; stream workers are spawned onto it.
    pub async fn run(mut self) -> SessionController {
        tracing::debug!("session loop started");
        let mut handles_dropped = false;
        self.publish().await;

        loop {
            if handles_dropped && self.readers.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                Some(update) = self.updates_rx.recv() => {
                    self.handle_stream_update(update);
                }
                intent = self.intents.recv(), if !handles_dropped => {
                    match intent {
                        Some(intent) => self.handle_intent(intent),
                        None => {
                            tracing::debug!(
                                open_streams = self.readers.len(),
                                "all session handles dropped"
                            );
                            handles_dropped = true;
                            continue;
                        }
                    }
                }
            }

            self.publish().await;
        }

        tracing::debug!("session loop stopped");
        self.controller
    }

    fn handle_intent(&mut self, intent: Intent) {
        match self.controller.dispatch(intent) {
            Dispatch::None => {}
            Dispatch::StartStream(handle) => self.spawn_stream(handle),
            Dispatch::CancelStream(target) => self.cancel_stream(target),
        }
    }

    fn handle_stream_update(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Event(event) => {
                self.controller.apply_stream_event(event);
            }
            StreamUpdate::Closed(target) => {
                self.readers.remove(&target);
                self.controller.stream_closed(target);
            }
        }
    }

    fn spawn_stream(&mut self, handle: ProviderStreamHandle) {
        let ProviderStreamHandle { stream, worker } = handle;
        let target = stream.target();

        // The worker is detached; it stops on its own once the stream is dropped.
        tokio::spawn(worker);
        let reader = tokio::spawn(Self::forward_stream(stream, self.updates_tx.clone()));
        self.readers.insert(target, reader);
    }

    async fn forward_stream(
        mut stream: ProviderEventStream,
        updates: mpsc::UnboundedSender<StreamUpdate>,
    ) {
        let target = stream.target();
        while let Some(event) = stream.recv().await {
            if updates.send(StreamUpdate::Event(event)).is_err() {
                return;
            }
        }

        let _ = updates.send(StreamUpdate::Closed(target));
    }

    fn cancel_stream(&mut self, target: StreamTarget) {
        // Aborting the reader drops its event stream, which signals the worker.
        if let Some(reader) = self.readers.remove(&target) {
            reader.abort();
            tracing::debug!(target = ?target, "stream reader aborted");
        }
    }

    async fn publish(&mut self) {
        let snapshot = self.controller.snapshot();
        if let Some(feed) = &self.feed {
            if feed.send(snapshot.clone()).await.is_err() {
                tracing::debug!("snapshot feed receiver dropped");
                self.feed = None;
            }
        }
        self.snapshots.send_replace(snapshot);
    }
}

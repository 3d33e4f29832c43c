use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use linktrack_core::config::Settings;
use linktrack_sdk::{bootstrap, FileEvent, FileTracker, IdentityService, LinkStore};

use super::Connection;
use crate::output::{format, OutputFormat};

/// One line of the event stream on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Opened { path: String },
    Closed { path: String },
    /// Drop the session and authorize again.
    Reconnect,
}

impl WatchEvent {
    fn into_file_event(self) -> Option<FileEvent> {
        match self {
            WatchEvent::Opened { path } => Some(FileEvent::Opened { path }),
            WatchEvent::Closed { path } => Some(FileEvent::Closed { path }),
            WatchEvent::Reconnect => None,
        }
    }
}

pub fn run(conn: &Connection, fmt: OutputFormat) -> Result<()> {
    let settings = conn.settings()?;
    let rt = super::runtime()?;
    rt.block_on(watch(&settings, fmt))
}

async fn watch(settings: &Settings, fmt: OutputFormat) -> Result<()> {
    let anonymous = super::store(settings)?;
    let tracker = super::connect(settings).await?;
    eprintln!("{}", format::format_started(tracker.context()));

    let stdin = BufReader::new(tokio::io::stdin());
    pump(&anonymous, Arc::new(tracker), stdin, fmt).await?;
    Ok(())
}

type Job<S> = (Arc<FileTracker<S>>, FileEvent);

/// Applies events for the same path in arrival order. Each path has its own
/// queue and worker, so distinct paths still run concurrently.
struct Dispatcher<S> {
    queues: HashMap<String, mpsc::UnboundedSender<Job<S>>>,
    workers: JoinSet<()>,
    fmt: OutputFormat,
}

impl<S: LinkStore + 'static> Dispatcher<S> {
    fn new(fmt: OutputFormat) -> Self {
        Self {
            queues: HashMap::new(),
            workers: JoinSet::new(),
            fmt,
        }
    }

    fn submit(&mut self, tracker: &Arc<FileTracker<S>>, event: FileEvent) {
        let path = event.path().to_string();
        let mut job = (Arc::clone(tracker), event);
        if let Some(queue) = self.queues.get(&path) {
            match queue.send(job) {
                Ok(()) => return,
                // The worker died; start a new one below.
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.workers.spawn(drain(job, rx, self.fmt));
        self.queues.insert(path, tx);
    }

    /// Close every queue and wait for the queued events to be applied.
    async fn finish(self) {
        let Self {
            queues,
            mut workers,
            ..
        } = self;
        drop(queues);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "event worker failed");
            }
        }
    }
}

async fn drain<S: LinkStore>(
    first: Job<S>,
    mut rx: mpsc::UnboundedReceiver<Job<S>>,
    fmt: OutputFormat,
) {
    let mut next = Some(first);
    while let Some((tracker, event)) = next {
        match tracker.apply(&event).await {
            Ok(outcome) => println!("{}", format::format_outcome(&outcome, fmt)),
            Err(e) => {
                tracing::warn!(path = event.path(), error = %e, "event dropped");
            }
        }
        next = rx.recv().await;
    }
}

/// Apply every event read from `input`, returning the tracker in use at the
/// end of the stream.
async fn pump<S, R>(
    anonymous: &S,
    mut tracker: Arc<FileTracker<S>>,
    input: R,
    fmt: OutputFormat,
) -> Result<Arc<FileTracker<S>>>
where
    S: LinkStore + IdentityService + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut dispatcher = Dispatcher::new(fmt);
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read events")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: WatchEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, line, "skipping malformed event");
                continue;
            }
        };

        let Some(event) = event.into_file_event() else {
            match reconnect(anonymous, &tracker).await {
                Ok(fresh) => {
                    eprintln!("{}", format::format_started(fresh.context()));
                    tracker = Arc::new(fresh);
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::warn!(%error, "reconnect failed, keeping session");
                }
            }
            continue;
        };

        dispatcher.submit(&tracker, event);
    }

    dispatcher.finish().await;
    Ok(tracker)
}

// Queued events keep the old session; the renewed tracker shares its locks.
async fn reconnect<S>(anonymous: &S, tracker: &FileTracker<S>) -> Result<FileTracker<S>>
where
    S: LinkStore + IdentityService,
{
    let authorized = bootstrap(anonymous).await.context("Failed to authorize")?;
    let fresh = tracker
        .renew(authorized.store, authorized.session)
        .await
        .context("Failed to restart tracking")?;
    Ok(fresh)
}

//! # Resilient Merge
//!
//! Fan-out/fan-in over independently failing producers.
//!
//! ```text
//!  producer task 0 ──┐ (event, resume)        ┌── next() ──▶ caller
//!  producer task 1 ──┼──▶ unbounded FIFO ─────┤
//!  producer task N ──┘ Finished{index}        └── resume.send(()) on the following next()
//! ```
//!
//! Each task holds at most one unconsumed event: after pushing it waits on the
//! event's resume signal, which the merge completes only when the caller asks
//! for the next item. A failing or panicking producer is logged and turned
//! into its terminal marker; it never reaches the caller.

use futures::stream::{self, Stream};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;

use super::events::Event;
use super::producer::{EventSource, ProducerHandle};

type SharedSource = Arc<Mutex<Box<dyn EventSource>>>;

enum MergeItem {
    Event {
        event: Event,
        resume: oneshot::Sender<()>,
    },
    Finished {
        index: usize,
    },
}

/// Pushes the producer's terminal marker when its task ends, however it ends
struct TerminalMarker {
    index: usize,
    tx: mpsc::UnboundedSender<MergeItem>,
}

impl Drop for TerminalMarker {
    fn drop(&mut self) {
        let _ = self.tx.send(MergeItem::Finished { index: self.index });
    }
}

/// A running merge over a set of producers
///
/// Obtained from [`merge_resilient`]. Pull events with [`ResilientMerge::next`]
/// and finish with [`ResilientMerge::close`]. Dropping an unclosed merge aborts
/// its tasks and closes the producers on a background task.
pub struct ResilientMerge {
    rx: mpsc::UnboundedReceiver<MergeItem>,
    tasks: JoinSet<()>,
    producers: Vec<(String, SharedSource)>,
    started: usize,
    finished: usize,
    pending_resume: Option<oneshot::Sender<()>>,
    closed: bool,
}

/// Run every producer concurrently and merge their events
///
/// Must be called from within a tokio runtime. An empty list spawns nothing
/// and yields nothing.
pub fn merge_resilient(producers: Vec<ProducerHandle>) -> ResilientMerge {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut tasks = JoinSet::new();
    let mut registered = Vec::with_capacity(producers.len());

    for handle in producers {
        let source: SharedSource = Arc::new(Mutex::new(handle.source));
        registered.push((handle.name.clone(), Arc::clone(&source)));
        tasks.spawn(drive_producer(handle.name, handle.index, source, tx.clone()));
    }

    tracing::debug!(producers = registered.len(), "Resilient merge started");

    ResilientMerge {
        rx,
        tasks,
        started: registered.len(),
        producers: registered,
        finished: 0,
        pending_resume: None,
        closed: false,
    }
}

async fn drive_producer(
    name: String,
    index: usize,
    source: SharedSource,
    tx: mpsc::UnboundedSender<MergeItem>,
) {
    let _marker = TerminalMarker {
        index,
        tx: tx.clone(),
    };
    let mut emitted = 0usize;

    loop {
        let mut guard = source.lock().await;
        let pulled = AssertUnwindSafe(guard.next_event()).catch_unwind().await;
        drop(guard);

        let event = match pulled {
            Ok(Some(Ok(event))) => event,
            Ok(None) => {
                tracing::debug!(producer = %name, index, emitted, "Producer exhausted");
                break;
            }
            Ok(Some(Err(err))) => {
                tracing::error!(
                    producer = %name,
                    index,
                    emitted,
                    error = ?err,
                    "Producer '{}' failed; isolated by resilient merge",
                    name
                );
                break;
            }
            Err(payload) => {
                tracing::error!(
                    producer = %name,
                    index,
                    emitted,
                    panic = %panic_message(&*payload),
                    "Producer '{}' panicked; isolated by resilient merge",
                    name
                );
                break;
            }
        };

        let (resume_tx, resume_rx) = oneshot::channel();
        if tx
            .send(MergeItem::Event {
                event,
                resume: resume_tx,
            })
            .is_err()
        {
            break;
        }
        emitted += 1;

        // Consumer went away without resuming us
        if resume_rx.await.is_err() {
            break;
        }
    }
}

async fn close_producers(producers: Vec<(String, SharedSource)>) {
    for (name, source) in producers {
        let mut guard = source.lock().await;
        match AssertUnwindSafe(guard.close()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(producer = %name, error = ?err, "Ignoring producer close error")
            }
            Err(payload) => tracing::debug!(
                producer = %name,
                panic = %panic_message(&*payload),
                "Ignoring producer close panic"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl ResilientMerge {
    /// Next merged event, `None` once every producer has finished
    ///
    /// Calling this releases the producer of the previously returned event.
    pub async fn next(&mut self) -> Option<Event> {
        if let Some(resume) = self.pending_resume.take() {
            let _ = resume.send(());
        }

        while self.finished < self.started {
            match self.rx.recv().await {
                Some(MergeItem::Event { event, resume }) => {
                    self.pending_resume = Some(resume);
                    return Some(event);
                }
                Some(MergeItem::Finished { index }) => {
                    self.finished += 1;
                    tracing::trace!(index, finished = self.finished, "Producer finished");
                }
                None => break,
            }
        }

        None
    }

    /// Number of producers the merge started
    pub fn started(&self) -> usize {
        self.started
    }

    /// Number of terminal markers observed so far
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// Tear down: abort running tasks and close every producer once
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.pending_resume.take();
        self.rx.close();
        self.tasks.shutdown().await;
        close_producers(std::mem::take(&mut self.producers)).await;
    }

    /// Adapt into a stream; dropping the stream tears the merge down
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        stream::unfold(self, |mut merge| async move {
            let event = merge.next().await?;
            Some((event, merge))
        })
    }
}

impl Drop for ResilientMerge {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.pending_resume.take();
        self.tasks.abort_all();

        let producers = std::mem::take(&mut self.producers);
        if producers.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_producers(producers));
            }
            Err(_) => tracing::debug!(
                producers = producers.len(),
                "No runtime to close producers; dropping them"
            ),
        }
    }
}

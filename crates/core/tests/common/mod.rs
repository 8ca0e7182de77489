//! Shared helpers for merge and pipeline integration tests
//!
//! Scripted producers with probes for pulls and closes, plus a log capture
//! that scopes a tracing subscriber to the current thread.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use validator_core::swarm::{Event, EventKind, EventSource, InvocationContext, ProducerHandle};

/// How a scripted producer ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Returns `None` after its events
    Exhausted,
    /// Returns an error on the pull after its events
    Fails,
    /// Panics on the pull after its events
    Panics,
    /// Never resolves the pull after its events
    Hangs,
}

/// Counters shared between a producer and the test
#[derive(Debug, Default)]
pub struct Probe {
    pub pulls: AtomicUsize,
    pub closes: AtomicUsize,
    /// Set once the source itself is dropped
    pub released: AtomicBool,
}

impl Probe {
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// A producer emitting `events` numbered events then ending as scripted
pub struct ScriptedSource {
    name: String,
    events: usize,
    ending: Ending,
    delay: Duration,
    close_fails: bool,
    emitted: usize,
    probe: Arc<Probe>,
}

impl ScriptedSource {
    pub fn new(name: &str, events: usize, ending: Ending) -> Self {
        Self {
            name: name.to_string(),
            events,
            ending,
            delay: Duration::ZERO,
            close_fails: false,
            emitted: 0,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    pub fn into_handle(self, index: usize) -> ProducerHandle {
        let name = self.name.clone();
        ProducerHandle::new(name, index, self)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<anyhow::Result<Event>> {
        self.probe.pulls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.emitted < self.events {
            let event = Event::new(&InvocationContext::new("test"), EventKind::Progress, &self.name)
                .with_content(self.emitted.to_string());
            self.emitted += 1;
            return Some(Ok(event));
        }

        match self.ending {
            Ending::Exhausted => None,
            Ending::Fails => Some(Err(anyhow::anyhow!("{} lost its connection", self.name))),
            Ending::Panics => panic!("{} crashed", self.name),
            Ending::Hangs => {
                futures::future::pending::<()>().await;
                None
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails {
            anyhow::bail!("{} refused to close", self.name);
        }
        Ok(())
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.probe.released.store(true, Ordering::SeqCst);
    }
}

/// Sequence number carried in a scripted event's content
pub fn seq(event: &Event) -> usize {
    event
        .content
        .as_deref()
        .and_then(|c| c.parse().ok())
        .unwrap_or(usize::MAX)
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture logs emitted on this thread until the guard drops
///
/// Pair with the default current-thread `#[tokio::test]` runtime so spawned
/// producer tasks log through the same subscriber.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

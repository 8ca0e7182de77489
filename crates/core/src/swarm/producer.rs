//! # Producers
//!
//! The capability the resilient merger consumes: something that yields
//! events, may fail at any point, and can be closed early.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use super::events::Event;

/// Event stream of one agent invocation
pub type AgentRun = BoxStream<'static, anyhow::Result<Event>>;

/// A lazy, fallible source of events
#[async_trait]
pub trait EventSource: Send {
    /// Pull the next event; `None` once exhausted
    async fn next_event(&mut self) -> Option<anyhow::Result<Event>>;

    /// Release the source early. Callers ignore the result.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Adapts an [`AgentRun`] into an [`EventSource`]; closing drops the stream
pub struct StreamSource {
    stream: Option<AgentRun>,
}

impl StreamSource {
    pub fn new(stream: AgentRun) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl EventSource for StreamSource {
    async fn next_event(&mut self) -> Option<anyhow::Result<Event>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.stream.take();
        Ok(())
    }
}

/// One producer handed to the merger
pub struct ProducerHandle {
    /// Used for fault attribution in logs
    pub name: String,
    /// Position in the submitted producer list; labels failures only
    pub index: usize,
    pub(crate) source: Box<dyn EventSource>,
}

impl ProducerHandle {
    pub fn new(name: impl Into<String>, index: usize, source: impl EventSource + 'static) -> Self {
        Self {
            name: name.into(),
            index,
            source: Box::new(source),
        }
    }

    /// Wrap an agent run
    pub fn from_run(name: impl Into<String>, index: usize, run: AgentRun) -> Self {
        Self::new(name, index, StreamSource::new(run))
    }
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("name", &self.name)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

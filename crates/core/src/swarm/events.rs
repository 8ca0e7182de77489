//! # Swarm Events
//!
//! The unit of progress emitted by agents and merged by the resilient merger.
//! The merger never looks inside an event; only the consumer does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::context::InvocationContext;

/// Kind of event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Intermediate status update (searching, fetching, etc.)
    Progress,
    /// Agent produced its output (usually carries a state delta)
    Output,
    /// Agent was not selected by the plan and did nothing
    Skipped,
    /// Agent bookkeeping for resumable invocations
    AgentState,
    /// Agent is waiting on a long-running tool (human input)
    InputRequired,
}

/// Side effects an event asks the session to apply
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventActions {
    /// Keys to write into session state
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub state_delta: HashMap<String, serde_json::Value>,
    /// Checkpoint for the authoring agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<serde_json::Value>,
    /// Authoring agent has finished for this invocation
    #[serde(default)]
    pub end_of_agent: bool,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: String,
    /// Invocation this event belongs to
    pub invocation_id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Agent that produced this event
    pub author: String,
    /// Branch path of the producing agent (e.g. `market_research.reddit`)
    #[serde(default)]
    pub branch: Option<String>,
    /// Kind of event
    pub kind: EventKind,
    /// Human-readable text
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub actions: EventActions,
    /// Tool calls that will complete out of band
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_tool_ids: Vec<String>,
}

impl Event {
    /// Create a new event authored within `ctx`
    pub fn new(ctx: &InvocationContext, kind: EventKind, author: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: ctx.invocation_id.clone(),
            timestamp: Utc::now(),
            author: author.to_string(),
            branch: ctx.branch.clone(),
            kind,
            content: None,
            actions: EventActions::default(),
            long_running_tool_ids: Vec::new(),
        }
    }

    /// Snapshot of `author`'s bookkeeping in `ctx`
    pub fn agent_state(ctx: &InvocationContext, author: &str) -> Self {
        let mut event = Self::new(ctx, EventKind::AgentState, author);
        event.actions.agent_state = ctx.agent_state(author).cloned();
        event.actions.end_of_agent = ctx.is_finished(author);
        event
    }

    /// Add text content to the event
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Add a state write to the event
    pub fn with_state(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.actions.state_delta.insert(key.into(), value);
        self
    }

    /// Mark a tool call as long-running
    pub fn with_long_running_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.long_running_tool_ids.push(tool_id.into());
        self
    }

    /// Whether the event is waiting on work that completes outside this invocation
    pub fn awaits_input(&self) -> bool {
        !self.long_running_tool_ids.is_empty()
    }
}

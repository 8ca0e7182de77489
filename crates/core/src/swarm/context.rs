//! # Invocation Context
//!
//! Execution context handed to every agent run. Each concurrent branch gets
//! its own deep copy, so state written by one producer never leaks into its
//! siblings or its parent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::events::Event;

/// Execution context of one agent invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvocationContext {
    /// Identifier shared by every event of this invocation
    pub invocation_id: String,
    /// Dot-joined scope path, `None` at the root
    #[serde(default)]
    pub branch: Option<String>,
    /// Session state visible to agents
    #[serde(default)]
    pub state: HashMap<String, serde_json::Value>,
    /// Whether agents checkpoint so a paused invocation can be resumed
    #[serde(default)]
    pub resumable: bool,
    /// Per-agent checkpoints
    #[serde(default)]
    pub agent_states: HashMap<String, serde_json::Value>,
    /// Agents that already ran to completion
    #[serde(default)]
    pub end_of_agents: HashMap<String, bool>,
}

/// Extend `parent` with `merger.producer`, dot-joined
///
/// An empty or missing parent yields just the suffix.
pub fn branch_path(parent: Option<&str>, merger: &str, producer: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}.{}.{}", parent, merger, producer),
        _ => format!("{}.{}", merger, producer),
    }
}

impl InvocationContext {
    /// Create a root context
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            ..Self::default()
        }
    }

    /// Enable checkpointing
    pub fn resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    /// Seed a state key
    pub fn with_state(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Derive an isolated child context scoped to one producer of a merger
    pub fn derive_branch(&self, merger: &str, producer: &str) -> Self {
        let mut child = self.clone();
        child.branch = Some(branch_path(self.branch.as_deref(), merger, producer));
        child
    }

    /// Checkpoint for `agent`, if any
    pub fn agent_state(&self, agent: &str) -> Option<&serde_json::Value> {
        self.agent_states.get(agent)
    }

    /// Whether `agent` already finished in this invocation
    pub fn is_finished(&self, agent: &str) -> bool {
        self.end_of_agents.get(agent).copied().unwrap_or(false)
    }

    /// Record bookkeeping for `agent`
    ///
    /// `end_of_agent` wins over `state` and drops the checkpoint. Passing
    /// neither clears everything recorded for the agent.
    pub fn set_agent_state(
        &mut self,
        agent: &str,
        state: Option<serde_json::Value>,
        end_of_agent: bool,
    ) {
        if end_of_agent {
            self.end_of_agents.insert(agent.to_string(), true);
            self.agent_states.remove(agent);
        } else if let Some(state) = state {
            self.agent_states.insert(agent.to_string(), state);
            self.end_of_agents.insert(agent.to_string(), false);
        } else {
            self.end_of_agents.remove(agent);
            self.agent_states.remove(agent);
        }
    }

    /// Whether the consumer must stop after `event`
    pub fn should_pause_invocation(&self, event: &Event) -> bool {
        self.resumable && event.awaits_input()
    }

    /// Fold an event's actions into this context
    pub fn apply(&mut self, event: &Event) {
        for (key, value) in &event.actions.state_delta {
            self.state.insert(key.clone(), value.clone());
        }
        if event.actions.end_of_agent || event.actions.agent_state.is_some() {
            self.set_agent_state(
                &event.author,
                event.actions.agent_state.clone(),
                event.actions.end_of_agent,
            );
        }
    }
}

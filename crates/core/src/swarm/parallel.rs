//! # Resilient Parallel Agent
//!
//! Runs sub-agents concurrently like a plain parallel agent, but one sub-agent
//! failing (transport error, panic) does not fail the batch. The failure shows
//! up in the logs only; the batch keeps streaming the others' events.

use futures::StreamExt;
use std::sync::Arc;

use super::agent::{Agent, AgentRef};
use super::context::InvocationContext;
use super::events::Event;
use super::merge::merge_resilient;
use super::producer::{AgentRun, ProducerHandle};

/// Parallel agent that keeps going when individual sub-agents fail
pub struct ResilientParallelAgent {
    name: String,
    description: String,
    sub_agents: Vec<AgentRef>,
}

impl ResilientParallelAgent {
    pub fn new(name: impl Into<String>, sub_agents: Vec<AgentRef>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sub_agents,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn sub_agents(&self) -> &[AgentRef] {
        &self.sub_agents
    }

    /// One producer per sub-agent still pending in `ctx`, each on its own branch
    fn branch_producers(&self, ctx: &InvocationContext) -> Vec<ProducerHandle> {
        self.sub_agents
            .iter()
            .filter(|agent| !ctx.is_finished(agent.name()))
            .enumerate()
            .map(|(index, agent)| {
                let branch_ctx = ctx.derive_branch(&self.name, agent.name());
                ProducerHandle::from_run(agent.name(), index, Arc::clone(agent).run(branch_ctx))
            })
            .collect()
    }
}

impl Agent for ResilientParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(self: Arc<Self>, mut ctx: InvocationContext) -> AgentRun {
        let events = async_stream::stream! {
            if self.sub_agents.is_empty() {
                return;
            }

            if ctx.resumable && ctx.agent_state(&self.name).is_none() {
                ctx.set_agent_state(&self.name, Some(serde_json::json!({})), false);
                yield Event::agent_state(&ctx, &self.name);
            }

            let producers = self.branch_producers(&ctx);
            tracing::info!(
                agent = %self.name,
                sub_agents = producers.len(),
                "Running sub-agents in resilient parallel"
            );

            let mut merge = merge_resilient(producers);
            while let Some(event) = merge.next().await {
                // Consumers stop polling at a pausing event, so tear down first
                if ctx.should_pause_invocation(&event) {
                    merge.close().await;
                    tracing::info!(agent = %self.name, "Invocation paused; sub-agents torn down");
                    yield event;
                    return;
                }
                yield event;
            }
            merge.close().await;

            if ctx.resumable {
                ctx.set_agent_state(&self.name, None, true);
                yield Event::agent_state(&ctx, &self.name);
            }
        };

        events.map(Ok).boxed()
    }
}

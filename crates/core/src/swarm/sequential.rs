//! # Sequential Agent
//!
//! Runs sub-agents one after another. Each stage sees the state written by
//! the stages before it, so a batch of investigations can feed a synthesizer.

use futures::StreamExt;
use std::sync::Arc;

use super::agent::{Agent, AgentRef};
use super::context::InvocationContext;
use super::events::Event;
use super::producer::AgentRun;

/// Runs sub-agents in order, threading state between them
pub struct SequentialAgent {
    name: String,
    description: String,
    sub_agents: Vec<AgentRef>,
}

impl SequentialAgent {
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
}

impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(self: Arc<Self>, mut ctx: InvocationContext) -> AgentRun {
        let events = async_stream::stream! {
            for agent in self.sub_agents.iter() {
                if ctx.is_finished(agent.name()) {
                    tracing::debug!(agent = %self.name, stage = %agent.name(), "Stage already finished; skipping");
                    continue;
                }

                tracing::debug!(agent = %self.name, stage = %agent.name(), "Starting stage");
                let mut run = Arc::clone(agent).run(ctx.clone());
                while let Some(item) = run.next().await {
                    let event = match item {
                        Ok(event) => event,
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    };
                    ctx.apply(&event);
                    let pause = ctx.should_pause_invocation(&event);
                    yield Ok(event);
                    if pause {
                        tracing::info!(agent = %self.name, stage = %agent.name(), "Invocation paused");
                        return;
                    }
                }
            }

            if ctx.resumable {
                ctx.set_agent_state(&self.name, None, true);
                yield Ok(Event::agent_state(&ctx, &self.name));
            }
        };

        events.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::EventKind;
    use futures::stream;
    use serde_json::json;

    /// Writes `key` = number of keys it could already see
    struct Recorder {
        name: String,
        key: String,
        pause: bool,
    }

    impl Agent for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(self: Arc<Self>, ctx: InvocationContext) -> AgentRun {
            let mut event = Event::new(&ctx, EventKind::Output, &self.name)
                .with_state(self.key.clone(), json!(ctx.state.len()));
            if self.pause {
                event = event.with_long_running_tool("approve");
            }
            stream::iter(vec![Ok(event)]).boxed()
        }
    }

    fn recorder(name: &str, pause: bool) -> AgentRef {
        Arc::new(Recorder {
            name: name.to_string(),
            key: format!("{}_out", name),
            pause,
        })
    }

    struct Failing;

    impl Agent for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(self: Arc<Self>, _ctx: InvocationContext) -> AgentRun {
            stream::iter(vec![Err(anyhow::anyhow!("stage broke"))]).boxed()
        }
    }

    #[tokio::test]
    async fn test_state_flows_between_stages() {
        let agent = Arc::new(SequentialAgent::new(
            "pipeline",
            vec![recorder("first", false), recorder("second", false)],
        ));
        let events: Vec<Event> = agent
            .run(InvocationContext::new("inv"))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].actions.state_delta["first_out"], json!(0));
        assert_eq!(events[1].actions.state_delta["second_out"], json!(1));
    }

    #[tokio::test]
    async fn test_pause_stops_pipeline() {
        let agent = Arc::new(SequentialAgent::new(
            "pipeline",
            vec![recorder("first", true), recorder("second", false)],
        ));
        let events: Vec<Event> = agent
            .run(InvocationContext::new("inv").resumable(true))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, "first");
    }

    #[tokio::test]
    async fn test_finished_stage_skipped_and_self_marked() {
        let agent = Arc::new(SequentialAgent::new(
            "pipeline",
            vec![recorder("first", false), recorder("second", false)],
        ));
        let mut ctx = InvocationContext::new("inv").resumable(true);
        ctx.set_agent_state("first", None, true);

        let events: Vec<Event> = agent.run(ctx).map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].author, "second");
        assert_eq!(events[1].author, "pipeline");
        assert!(events[1].actions.end_of_agent);
    }

    #[tokio::test]
    async fn test_stage_error_propagates() {
        let agent = Arc::new(SequentialAgent::new(
            "pipeline",
            vec![Arc::new(Failing) as AgentRef, recorder("after", false)],
        ));
        let items: Vec<anyhow::Result<Event>> = agent.run(InvocationContext::new("inv")).collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}

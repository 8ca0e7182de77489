//! # Source Agent
//!
//! One source investigation. Provider calls are simulated: the agent walks
//! the plan's keywords, reports progress per query, then writes its findings
//! into `<source>_validation`. Timing and faults are scripted so a pipeline
//! can be exercised with slow, failing, or crashing sources.

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::catalog::{confirmation_key, source_description, validation_key, ResearchPlan};
use crate::swarm::{Agent, AgentRun, Event, EventKind, InvocationContext};

/// Why a source investigation failed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error talking to {source_name}: {message}")]
    Transport { source_name: String, message: String },
    #[error("no research plan in session state")]
    MissingPlan,
}

/// Scripted behavior of a simulated source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceScript {
    /// Pause before each query
    pub step_delay: Duration,
    /// Upper bound on queries
    pub max_search_iterations: usize,
    /// Fail with a transport error after this many events
    pub fail_after: Option<usize>,
    /// Panic after this many events
    pub panic_after: Option<usize>,
    /// Ask for human confirmation before reporting
    pub require_input: bool,
}

/// A simulated source investigation
pub struct SourceAgent {
    name: String,
    script: SourceScript,
}

impl SourceAgent {
    pub fn new(name: impl Into<String>, script: SourceScript) -> Self {
        Self {
            name: name.into(),
            script,
        }
    }

    pub fn script(&self) -> &SourceScript {
        &self.script
    }

    /// Apply scripted faults once `emitted` events are out
    fn checkpoint(&self, emitted: usize) -> Result<(), SourceError> {
        if self.script.panic_after == Some(emitted) {
            panic!("{} source crashed after {} events", self.name, emitted);
        }
        if self.script.fail_after == Some(emitted) {
            return Err(SourceError::Transport {
                source_name: self.name.clone(),
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }

    fn findings(&self, plan: &ResearchPlan, queries: &[String]) -> serde_json::Value {
        let signal_score = (30 + 15 * queries.len()).min(100);
        json!({
            "source": self.name,
            "product_idea": plan.product_idea,
            "queries": queries,
            "signal_score": signal_score,
            "summary": format!(
                "{} queries on {} for '{}'",
                queries.len(),
                self.name,
                plan.product_idea
            ),
        })
    }
}

impl Agent for SourceAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        source_description(&self.name).unwrap_or("")
    }

    fn run(self: Arc<Self>, ctx: InvocationContext) -> AgentRun {
        let events = async_stream::stream! {
            let plan = match ResearchPlan::from_context(&ctx) {
                Some(plan) => plan,
                None => {
                    yield Err(anyhow::Error::from(SourceError::MissingPlan));
                    return;
                }
            };

            if !plan.selects(&self.name) {
                yield Ok(Event::new(&ctx, EventKind::Skipped, &self.name)
                    .with_content("Source not selected; skipped."));
                return;
            }

            let queries = plan.queries(self.script.max_search_iterations);
            let mut emitted = 0usize;
            for query in &queries {
                if let Err(err) = self.checkpoint(emitted) {
                    yield Err(anyhow::Error::from(err));
                    return;
                }
                if !self.script.step_delay.is_zero() {
                    tokio::time::sleep(self.script.step_delay).await;
                }
                yield Ok(Event::new(&ctx, EventKind::Progress, &self.name)
                    .with_content(format!("Searching {} for '{}'", self.name, query)));
                emitted += 1;
            }

            if let Err(err) = self.checkpoint(emitted) {
                yield Err(anyhow::Error::from(err));
                return;
            }

            let confirmed = ctx
                .state
                .get(&confirmation_key(&self.name))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if self.script.require_input && !confirmed {
                yield Ok(Event::new(&ctx, EventKind::InputRequired, &self.name)
                    .with_content(format!("Confirm {} findings before reporting", self.name))
                    .with_long_running_tool(format!("{}-confirm", self.name)));
            }

            let findings = self.findings(&plan, &queries);
            let mut output = Event::new(&ctx, EventKind::Output, &self.name)
                .with_content(format!("{} findings recorded", self.name))
                .with_state(validation_key(&self.name), findings);
            output.actions.end_of_agent = ctx.resumable;
            yield Ok(output);
        };

        events.boxed()
    }
}

//! # Validation Coordinator
//!
//! Drives one validation from a research plan to the saved report. Events
//! are folded into the session context, recorded, and streamed to an
//! optional channel as they arrive.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ValidatorConfig;
use crate::sources::{validation_key, ResearchPlan, FINAL_VALIDATION_KEY};
use crate::state::save_report;

use super::agent::Agent;
use super::context::InvocationContext;
use super::events::Event;
use super::pipeline::build_execution_pipeline;

/// Result of a validation run
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub invocation_id: String,
    /// Events in the order they were delivered
    pub events: Vec<Event>,
    /// Stopped on an event awaiting human input
    pub paused: bool,
    /// Final markdown report, absent when paused
    pub report: Option<String>,
    /// Where the report was saved
    pub report_path: Option<PathBuf>,
    /// Selected sources that produced findings
    pub reported_sources: Vec<String>,
    /// Selected sources without findings
    pub missing_sources: Vec<String>,
    /// Session context at the end of the run; resume from it after a pause
    pub context: InvocationContext,
}

/// The validation coordinator
pub struct Coordinator {
    config: ValidatorConfig,
    /// Events recorded during the current run
    events: Vec<Event>,
    /// Event channel for streaming
    event_tx: Option<mpsc::Sender<Event>>,
}

impl Coordinator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Record an event and forward it to the channel
    async fn emit(&mut self, event: Event) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Validate a product idea from scratch
    #[tracing::instrument(skip(self, plan), fields(idea = %plan.product_idea.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, plan: ResearchPlan) -> Result<ValidationResult> {
        let unknown = plan.unknown_sources();
        if !unknown.is_empty() {
            anyhow::bail!("Unknown sources in research plan: {}", unknown.join(", "));
        }
        let ctx = InvocationContext::new(uuid::Uuid::new_v4().to_string())
            .resumable(self.config.resumable)
            .with_state(
                ResearchPlan::STATE_KEY,
                serde_json::to_value(&plan).context("Failed to serialize research plan")?,
            );
        self.drive(ctx).await
    }

    /// Continue a paused invocation
    ///
    /// Agents marked finished in `ctx` are skipped; the rest run again.
    #[tracing::instrument(skip(self, ctx), fields(invocation_id = %ctx.invocation_id))]
    pub async fn resume(&mut self, ctx: InvocationContext) -> Result<ValidationResult> {
        if !ctx.resumable {
            anyhow::bail!("Invocation {} is not resumable", ctx.invocation_id);
        }
        self.drive(ctx).await
    }

    async fn drive(&mut self, ctx: InvocationContext) -> Result<ValidationResult> {
        self.config.validate()?;
        let plan = ResearchPlan::from_context(&ctx).context("No research plan in context")?;
        self.events.clear();

        tracing::info!(
            sources = plan.selected_sources.len(),
            batches = self.config.batches.len(),
            resumable = ctx.resumable,
            "Starting validation"
        );

        let pipeline = Arc::new(build_execution_pipeline(&self.config));
        let mut session = ctx.clone();
        let mut run = pipeline.run(ctx);
        let mut paused = false;

        while let Some(item) = run.next().await {
            let event = item.context("Execution pipeline failed")?;
            session.apply(&event);
            let pause = session.should_pause_invocation(&event);
            self.emit(event).await;
            if pause {
                paused = true;
                break;
            }
        }
        drop(run);

        let (reported_sources, missing_sources): (Vec<String>, Vec<String>) = plan
            .selected_sources
            .iter()
            .cloned()
            .partition(|source| session.state.contains_key(&validation_key(source)));

        let report = if paused {
            None
        } else {
            session
                .state
                .get(FINAL_VALIDATION_KEY)
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };

        let mut report_path = None;
        if let Some(report) = report.as_deref() {
            if self.config.save_report {
                match save_report(&plan.product_idea, report).await {
                    Ok(path) => report_path = Some(path),
                    Err(e) => tracing::warn!("Failed to save report: {}", e),
                }
            }
        }

        if paused {
            tracing::info!(
                events = self.events.len(),
                "Validation paused awaiting input"
            );
        } else {
            tracing::info!(
                events = self.events.len(),
                reported = reported_sources.len(),
                missing = missing_sources.len(),
                "Validation complete"
            );
        }

        Ok(ValidationResult {
            invocation_id: session.invocation_id.clone(),
            events: std::mem::take(&mut self.events),
            paused,
            report,
            report_path,
            reported_sources,
            missing_sources,
            context: session,
        })
    }
}

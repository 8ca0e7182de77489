//! # Final Validator
//!
//! Aggregates every `<source>_validation` entry into a markdown report. A
//! selected source with no entry is listed under missing evidence; that is
//! the only place an isolated source failure shows up in the report.

use futures::{stream, StreamExt};
use std::sync::Arc;

use super::catalog::{validation_key, ResearchPlan};
use super::source_agent::SourceError;
use crate::swarm::{Agent, AgentRun, Event, EventKind, InvocationContext};

/// State key of the finished report
pub const FINAL_VALIDATION_KEY: &str = "final_validation";

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Proceed,
    Pivot,
    Abandon,
}

impl Recommendation {
    pub fn from_score(score: u64) -> Self {
        if score >= 60 {
            Recommendation::Proceed
        } else if score >= 35 {
            Recommendation::Pivot
        } else {
            Recommendation::Abandon
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "proceed",
            Recommendation::Pivot => "pivot",
            Recommendation::Abandon => "abandon",
        }
    }
}

/// Synthesizes source findings into the final report
pub struct FinalValidator {
    name: String,
}

impl Default for FinalValidator {
    fn default() -> Self {
        Self {
            name: "final_validator".to_string(),
        }
    }
}

impl FinalValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the report from plan and state
    pub fn render(plan: &ResearchPlan, ctx: &InvocationContext) -> String {
        let mut reported = Vec::new();
        let mut missing = Vec::new();
        for source in &plan.selected_sources {
            match ctx.state.get(&validation_key(source)) {
                Some(findings) => reported.push((source.as_str(), findings)),
                None => missing.push(source.as_str()),
            }
        }

        let mut report = format!("# Product Validation Report\n\n**Idea:** {}\n", plan.product_idea);
        if !plan.research_focus.is_empty() {
            report.push_str(&format!("**Focus:** {}\n", plan.research_focus));
        }

        report.push_str("\n## Evidence by Source\n");
        let mut total = 0u64;
        for (source, findings) in &reported {
            let score = findings["signal_score"].as_u64().unwrap_or(0);
            total += score;
            report.push_str(&format!(
                "\n### {}\n- Signal score: {}/100\n- {}\n",
                source,
                score,
                findings["summary"].as_str().unwrap_or("No summary")
            ));
        }

        if !missing.is_empty() {
            report.push_str("\n## Missing Evidence\n\n");
            for source in &missing {
                report.push_str(&format!("- {} (selected, no findings)\n", source));
            }
        }

        report.push_str("\n## Verdict\n\n");
        if reported.is_empty() {
            report.push_str("No source produced evidence; no recommendation.\n");
        } else {
            let average = total / reported.len() as u64;
            report.push_str(&format!(
                "Average signal score {}/100 across {} of {} sources: **{}**\n",
                average,
                reported.len(),
                plan.selected_sources.len(),
                Recommendation::from_score(average).as_str()
            ));
        }
        report
    }
}

impl Agent for FinalValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Aggregates evidence from all source agents into a validation report"
    }

    fn run(self: Arc<Self>, ctx: InvocationContext) -> AgentRun {
        let item = match ResearchPlan::from_context(&ctx) {
            Some(plan) => {
                let report = Self::render(&plan, &ctx);
                Ok(Event::new(&ctx, EventKind::Output, &self.name)
                    .with_content("Validation report ready")
                    .with_state(FINAL_VALIDATION_KEY, serde_json::Value::String(report)))
            }
            None => Err(anyhow::Error::from(SourceError::MissingPlan)),
        };
        stream::once(async move { item }).boxed()
    }
}

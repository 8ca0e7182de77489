//! # Execution Pipeline
//!
//! Builds the agent tree for a validation run:
//!
//! ```text
//! execution_pipeline (SequentialAgent)
//! ├── market_research (ResilientParallelAgent)
//! ├── buyer_intent_research (ResilientParallelAgent)
//! ├── community_tech_research (ResilientParallelAgent)
//! └── final_validator
//! ```

use std::sync::Arc;

use super::agent::AgentRef;
use super::parallel::ResilientParallelAgent;
use super::sequential::SequentialAgent;
use crate::config::ValidatorConfig;
use crate::sources::{FinalValidator, SourceAgent};

/// Name of the root agent
pub const EXECUTION_PIPELINE: &str = "execution_pipeline";

/// One resilient parallel stage per configured batch, then the final validator
pub fn build_execution_pipeline(config: &ValidatorConfig) -> SequentialAgent {
    let mut stages: Vec<AgentRef> = config
        .batches
        .iter()
        .map(|batch| {
            let sources: Vec<AgentRef> = batch
                .sources
                .iter()
                .map(|source| {
                    Arc::new(SourceAgent::new(source.clone(), config.script_for(source)))
                        as AgentRef
                })
                .collect();
            Arc::new(ResilientParallelAgent::new(batch.name.clone(), sources)) as AgentRef
        })
        .collect();
    stages.push(Arc::new(FinalValidator::new()));

    SequentialAgent::new(EXECUTION_PIPELINE, stages)
        .with_description("Runs source batches in order, then synthesizes the report")
}

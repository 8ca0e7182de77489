//! # Research Sources
//!
//! Source investigations and the synthesizer that runs after them.
//!
//! - `catalog` - Source names, default batches, and the research plan
//! - `source_agent` - Simulated, scriptable source investigation
//! - `final_validator` - Aggregates findings into the markdown report

pub mod catalog;
pub mod final_validator;
pub mod source_agent;

pub use catalog::{
    confirmation_key, default_batches, is_known_source, source_description, validation_key, ResearchPlan,
    SourceBatch, SOURCE_NAMES,
};
pub use final_validator::{FinalValidator, Recommendation, FINAL_VALIDATION_KEY};
pub use source_agent::{SourceAgent, SourceError, SourceScript};

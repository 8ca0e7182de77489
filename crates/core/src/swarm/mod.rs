//! # Swarm Orchestration
//!
//! Agents, the resilient merger that fans their runs in, and the coordinator
//! that drives a validation end to end.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Research Plan → [market_research ∥] → [buyer_intent_research ∥] → [community_tech_research ∥] → Final Validator
//! ```
//!
//! Each `∥` stage is a [`ResilientParallelAgent`]: its sources run concurrently
//! and a failing source only shrinks that stage's output.

pub mod agent;
pub mod context;
pub mod coordinator;
pub mod events;
pub mod merge;
pub mod parallel;
pub mod pipeline;
pub mod producer;
pub mod sequential;

pub use agent::{Agent, AgentRef};
pub use context::{branch_path, InvocationContext};
pub use coordinator::{Coordinator, ValidationResult};
pub use events::{Event, EventActions, EventKind};
pub use merge::{merge_resilient, ResilientMerge};
pub use parallel::ResilientParallelAgent;
pub use pipeline::build_execution_pipeline;
pub use producer::{AgentRun, EventSource, ProducerHandle, StreamSource};
pub use sequential::SequentialAgent;

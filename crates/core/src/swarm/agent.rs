//! # Agents
//!
//! An agent turns an invocation context into an event stream. Composite
//! agents ([`SequentialAgent`](super::SequentialAgent),
//! [`ResilientParallelAgent`](super::ResilientParallelAgent)) nest other
//! agents, so one run can be an arbitrarily deep pipeline.

use std::sync::Arc;

use super::context::InvocationContext;
use super::producer::AgentRun;

/// Anything that can be invoked as part of the swarm
pub trait Agent: Send + Sync {
    /// Unique name within its parent; used in branch paths and logs
    fn name(&self) -> &str;

    /// One-line description for catalogs
    fn description(&self) -> &str {
        ""
    }

    /// Start a run; the returned stream is lazy
    fn run(self: Arc<Self>, ctx: InvocationContext) -> AgentRun;
}

/// Shared handle to an agent
pub type AgentRef = Arc<dyn Agent>;

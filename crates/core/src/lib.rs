//! # Validator Core
//!
//! Business logic of the product-idea validator: research sources, the
//! resilient merger that runs them concurrently, and report persistence.
//!
//! ## Architecture
//!
//! - `swarm/` - Agents, the resilient event-stream merger, and the coordinator
//! - `sources/` - Source catalog, simulated source agents, final validator
//! - `config` - Persisted runtime configuration
//! - `state/` - Runtime directory I/O and saved reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use validator_core::{sources::ResearchPlan, swarm::Coordinator, ValidatorConfig};
//!
//! let mut coordinator = Coordinator::new(ValidatorConfig::load().await?);
//! let result = coordinator.run(ResearchPlan::new("Pet GPS collar")).await?;
//! ```

pub mod config;
pub mod sources;
pub mod state;
pub mod swarm;

pub use config::{ConfigPatch, ValidatorConfig};

//! # Validator Configuration
//!
//! Pipeline layout and source scripting, persisted as JSON in the runtime
//! directory (`.validator/config.json`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sources::{default_batches, is_known_source, SourceBatch, SourceScript};
use crate::state::io::get_runtime_path;

/// Configuration for a validation run
///
/// ## Example
/// ```rust,ignore
/// use validator_core::config::ValidatorConfig;
///
/// let mut config = ValidatorConfig::load().await?;
/// config.failing_sources.push("reddit".to_string());
/// config.validate()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Checkpoint agent state so a paused run can be resumed
    pub resumable: bool,
    /// Resilient parallel stages, run in order
    pub batches: Vec<SourceBatch>,
    /// Upper bound on queries per source
    pub max_search_iterations: usize,
    /// Simulated latency per query
    pub step_delay_ms: u64,
    /// Sources that fail with a transport error
    pub failing_sources: Vec<String>,
    /// Sources that panic mid-run
    pub panicking_sources: Vec<String>,
    /// Events a faulty source emits before it breaks
    pub fault_after: usize,
    /// Sources that stop for human confirmation
    pub input_required_sources: Vec<String>,
    /// Write the final report under `reports/`
    pub save_report: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            resumable: false,
            batches: default_batches(),
            max_search_iterations: 5,
            step_delay_ms: 150,
            failing_sources: Vec::new(),
            panicking_sources: Vec::new(),
            fault_after: 1,
            input_required_sources: Vec::new(),
            save_report: true,
        }
    }
}

/// Partial update; `None` fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<Vec<SourceBatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_search_iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panicking_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_after: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_required_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_report: Option<bool>,
}

impl ValidatorConfig {
    /// Default location: `<runtime>/config.json`
    pub fn default_path() -> PathBuf {
        get_runtime_path().join("config.json")
    }

    /// Load from the default location, falling back to defaults
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    /// Load from `path`; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if tokio::fs::metadata(path).await.is_err() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config: {:?}", path))
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config: {:?}", path))
    }

    /// Apply a partial update
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(resumable) = patch.resumable {
            self.resumable = resumable;
        }
        if let Some(batches) = patch.batches {
            self.batches = batches;
        }
        if let Some(max) = patch.max_search_iterations {
            self.max_search_iterations = max;
        }
        if let Some(delay) = patch.step_delay_ms {
            self.step_delay_ms = delay;
        }
        if let Some(sources) = patch.failing_sources {
            self.failing_sources = sources;
        }
        if let Some(sources) = patch.panicking_sources {
            self.panicking_sources = sources;
        }
        if let Some(after) = patch.fault_after {
            self.fault_after = after;
        }
        if let Some(sources) = patch.input_required_sources {
            self.input_required_sources = sources;
        }
        if let Some(save) = patch.save_report {
            self.save_report = save;
        }
    }

    /// Reject unknown sources and duplicated names
    pub fn validate(&self) -> Result<()> {
        let mut batch_names = HashSet::new();
        let mut sources = HashSet::new();
        for batch in &self.batches {
            if batch.name.is_empty() {
                anyhow::bail!("Batch names must not be empty");
            }
            if !batch_names.insert(batch.name.as_str()) {
                anyhow::bail!("Duplicate batch name: {}", batch.name);
            }
            for source in &batch.sources {
                if !is_known_source(source) {
                    anyhow::bail!("Unknown source '{}' in batch {}", source, batch.name);
                }
                if !sources.insert(source.as_str()) {
                    anyhow::bail!("Source '{}' appears in more than one batch", source);
                }
            }
        }

        let scripted = self
            .failing_sources
            .iter()
            .chain(&self.panicking_sources)
            .chain(&self.input_required_sources);
        for source in scripted {
            if !is_known_source(source) {
                anyhow::bail!("Unknown source '{}' in fault settings", source);
            }
        }
        Ok(())
    }

    /// Scripted behavior for one source
    pub fn script_for(&self, source: &str) -> SourceScript {
        let listed = |list: &[String]| list.iter().any(|s| s == source);
        SourceScript {
            step_delay: Duration::from_millis(self.step_delay_ms),
            max_search_iterations: self.max_search_iterations,
            fail_after: listed(&self.failing_sources).then_some(self.fault_after),
            panic_after: listed(&self.panicking_sources).then_some(self.fault_after),
            require_input: listed(&self.input_required_sources),
        }
    }
}

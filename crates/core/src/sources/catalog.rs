//! # Source Catalog
//!
//! The research sources a plan can select, how they are grouped into
//! resilient parallel batches, and the plan itself.

use serde::{Deserialize, Serialize};

use crate::swarm::InvocationContext;

/// Every source a plan may select
pub const SOURCE_NAMES: [&str; 10] = [
    "hackernews",
    "openalex",
    "google_trends",
    "reddit",
    "github",
    "brave_search",
    "competitors",
    "review_sites",
    "jobs_signal",
    "seo_intent",
];

/// Whether `name` is a known source
pub fn is_known_source(name: &str) -> bool {
    SOURCE_NAMES.contains(&name)
}

/// What each source is good for
pub fn source_description(name: &str) -> Option<&'static str> {
    let description = match name {
        "hackernews" => "Developer sentiment and startup critiques",
        "openalex" => "Academic papers for deep-tech, AI, health, science",
        "google_trends" => "Search volume for consumer demand and timing",
        "reddit" => "Unfiltered user feedback and pain points",
        "github" => "Open source competitors and technical feasibility",
        "brave_search" => "General market research, articles, industry reports",
        "competitors" => "Product Hunt, AppSumo, and social launches",
        "review_sites" => "Buyer-intent clues from G2, Capterra, Trustpilot",
        "jobs_signal" => "Hiring demand as a proxy for budget and urgency",
        "seo_intent" => "Commercial-intent keywords and SERP competitiveness",
        _ => return None,
    };
    Some(description)
}

/// State key a source writes its findings under
pub fn validation_key(source: &str) -> String {
    format!("{}_validation", source)
}

/// State key a human sets to `true` to confirm a source's findings
pub fn confirmation_key(source: &str) -> String {
    format!("{}_confirmed", source)
}

/// A group of sources run as one resilient parallel stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceBatch {
    pub name: String,
    pub sources: Vec<String>,
}

impl SourceBatch {
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Market, buyer-intent, then community/tech
pub fn default_batches() -> Vec<SourceBatch> {
    vec![
        SourceBatch::new(
            "market_research",
            &["brave_search", "google_trends", "competitors"],
        ),
        SourceBatch::new(
            "buyer_intent_research",
            &["review_sites", "jobs_signal", "seo_intent"],
        ),
        SourceBatch::new(
            "community_tech_research",
            &["hackernews", "reddit", "github", "openalex"],
        ),
    ]
}

/// Structured plan guiding the source investigations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchPlan {
    /// Summary of the product idea being validated
    pub product_idea: String,
    /// Which sources to query
    pub selected_sources: Vec<String>,
    /// Starting keywords for the sources
    #[serde(default)]
    pub search_keywords: Vec<String>,
    /// What the sources should look for
    #[serde(default)]
    pub research_focus: String,
    /// Why each source was selected or excluded
    #[serde(default)]
    pub sources_rationale: String,
}

impl ResearchPlan {
    /// State key the plan lives under
    pub const STATE_KEY: &'static str = "research_plan";

    /// Plan selecting every source
    pub fn new(product_idea: impl Into<String>) -> Self {
        Self {
            product_idea: product_idea.into(),
            selected_sources: SOURCE_NAMES.iter().map(|s| s.to_string()).collect(),
            search_keywords: Vec::new(),
            research_focus: String::new(),
            sources_rationale: String::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.selected_sources = sources;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.search_keywords = keywords;
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.research_focus = focus.into();
        self
    }

    /// Whether `source` was selected
    pub fn selects(&self, source: &str) -> bool {
        self.selected_sources.iter().any(|s| s == source)
    }

    /// Selected names that are not in the catalog
    pub fn unknown_sources(&self) -> Vec<&str> {
        self.selected_sources
            .iter()
            .map(String::as_str)
            .filter(|s| !is_known_source(s))
            .collect()
    }

    /// Up to `limit` queries; falls back to the idea itself
    pub fn queries(&self, limit: usize) -> Vec<String> {
        if self.search_keywords.is_empty() {
            return vec![self.product_idea.clone()];
        }
        self.search_keywords.iter().take(limit.max(1)).cloned().collect()
    }

    /// Read the plan out of session state
    pub fn from_context(ctx: &InvocationContext) -> Option<Self> {
        ctx.state
            .get(Self::STATE_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

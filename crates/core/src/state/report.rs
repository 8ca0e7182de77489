//! # Report Persistence
//!
//! Saves the final validation report as markdown under `reports/`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::io::{list_runtime_files, read_file, write_runtime_file};

const REPORTS_DIR: &str = "reports";

/// Lowercase, dash-separated, at most 48 chars
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 48 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "validation".to_string()
    } else {
        slug.to_string()
    }
}

/// `reports/<slug>_<YYYYmmdd_HHMMSS>.md`
pub fn report_file_name(product_idea: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.md",
        REPORTS_DIR,
        slugify(product_idea),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write the report, returning where it landed
pub async fn save_report(product_idea: &str, report: &str) -> Result<PathBuf> {
    let path = write_runtime_file(report_file_name(product_idea, Utc::now()), report).await?;
    tracing::info!(path = %path.display(), "Saved validation report");
    Ok(path)
}

/// Read a saved report by file name
pub async fn load_report(file_name: &str) -> Result<String> {
    if file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.') {
        anyhow::bail!("Invalid report name: {}", file_name);
    }
    read_file(format!("{}/{}", REPORTS_DIR, file_name)).await
}

/// Saved report file names, oldest first
pub async fn list_reports() -> Result<Vec<String>> {
    list_runtime_files(REPORTS_DIR).await
}

//! Report compiler

use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use super::state::Section;
use crate::error::ReportError;

/// Placeholder for a planned section that never completed
pub const MISSING_SECTION_PLACEHOLDER: &str = "[Section not completed]";

/// Join completed section contents in plan order.
///
/// Completion order is irrelevant; duplicates resolve to the last entry.
/// Missing sections become the placeholder and are logged.
pub fn compile_report(plan: &[Section], completed: &[Section]) -> String {
    let lookup: HashMap<&str, &str> = completed
        .iter()
        .map(|s| (s.name.as_str(), s.content.as_str()))
        .collect();

    plan.iter()
        .map(|section| match lookup.get(section.name.as_str()) {
            Some(content) => *content,
            None => {
                warn!(section = %section.name, "Section not completed, using placeholder");
                MISSING_SECTION_PLACEHOLDER
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write the report as UTF-8 text, creating parent directories
pub async fn persist_report(path: &Path, report: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, report).await?;
    info!(path = %path.display(), bytes = report.len(), "Final report written");
    Ok(())
}

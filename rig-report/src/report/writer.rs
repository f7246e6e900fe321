//! Final section writers and the research context document

use tracing::{error, info};

use super::context::ReportContext;
use super::prompts::ReportPrompts;
use super::state::Section;

/// Content used when a writer call fails
pub const WRITE_ERROR_SENTINEL: &str = "[Error generating content]";

/// Replace blank model output with the error sentinel
pub(crate) fn non_empty_or_sentinel(content: String) -> String {
    if content.trim().is_empty() {
        WRITE_ERROR_SENTINEL.to_string()
    } else {
        content
    }
}

/// Render sections as the context document for non-research writers
pub fn format_sections(sections: &[&Section]) -> String {
    let rule = "=".repeat(60);
    let mut formatted = String::new();

    for (idx, section) in sections.iter().enumerate() {
        let content = if section.content.is_empty() { "[Not yet written]" } else { section.content.as_str() };
        formatted.push_str(&format!(
            "\n{rule}\nSection {}: {}\n{rule}\nDescription:\n{}\nRequires Research:\n{}\n\nContent:\n{}\n\n",
            idx + 1,
            section.name,
            section.description,
            section.research,
            content,
        ));
    }

    formatted
}

/// Write a section that draws only on the gathered research context
pub async fn write_final_section(ctx: &ReportContext, section: Section, research_context: &str) -> Section {
    info!(section = %section.name, "Writing final section");
    let instructions = ReportPrompts::final_section_writer(&section.name, &section.description, research_context);

    let content = match ctx.llm.text(&instructions, ReportPrompts::FINAL_SECTION_WRITER_HUMAN).await {
        Ok(content) => non_empty_or_sentinel(content),
        Err(e) => {
            error!(section = %section.name, error = %e, "Error writing final section");
            WRITE_ERROR_SENTINEL.to_string()
        }
    };

    section.with_content(content)
}

//! Markdown report generation.
//!
//! This module renders the aggregated hazard data as a Markdown
//! document or JSON. Section order follows the group display order.

use crate::cli::OutputFormat;
use crate::models::{Report, ReportData, ReportMetadata, UnitDescriptor};
use anyhow::{Context, Result};
use std::path::Path;

/// Report text section shown above the summary table.
const SECTION_TOP: &str = "Top";
/// Report text section used as the summary table heading.
const SECTION_TABLE_HEADING: &str = "Table1headingautogenerated table";
/// Report text section shown below the summary table.
const SECTION_BOTTOM: &str = "Bottom";
/// Report text section for the closing resources page.
const SECTION_OTHER_RESOURCES: &str = "OtherGeologicHazardResources";

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Geologic Hazards Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(&report.data));
    output.push_str(&generate_summary_section(&report.data));

    // One section per hazard group, in display order
    for (group, hazard_codes) in report.data.group_to_hazard_codes.iter() {
        output.push_str(&generate_group_section(&report.data, group, hazard_codes));
    }

    output.push_str(&generate_resources_section(&report.data));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Area of Interest\n\n");
    section.push_str(&format!("- **Description:** {}\n", metadata.aoi_description));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Layers Queried:** {} ({} with mapped hazards)\n",
        metadata.sources_queried, metadata.sources_with_results
    ));
    section.push_str(&format!("- **Hazards Found:** {}\n", metadata.hazards_found));
    section.push_str(&format!(
        "- **Query Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(data: &ReportData) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Report Summary](#report-summary)\n");

    for (group, hazard_codes) in data.group_to_hazard_codes.iter() {
        toc.push_str(&format!("- [{}](#{})\n", group, anchor(group)));
        for code in hazard_codes {
            if let Some(name) = data.hazard_name_for(code) {
                toc.push_str(&format!("  - [{}](#{})\n", name, anchor(name)));
            }
        }
    }

    toc.push_str("- [Other Geologic Hazard Resources](#other-geologic-hazard-resources)\n\n");

    toc
}

/// Generate the summary page: report text around a table of every unit.
fn generate_summary_section(data: &ReportData) -> String {
    let mut section = String::new();

    section.push_str("## Report Summary\n\n");
    push_paragraph(&mut section, data.section_text(SECTION_TOP));
    push_paragraph(&mut section, data.section_text(SECTION_TABLE_HEADING));

    let rows = data.summary_rows();
    if rows.is_empty() {
        section.push_str("_No mapped geologic hazards intersect this area._\n\n");
    } else {
        section.push_str("| Mapped Geologic Hazards | Hazard Category |\n");
        section.push_str("|:---|:---|\n");
        for unit in rows {
            section.push_str(&format!(
                "| [{}](#{}) | {} |\n",
                unit.name,
                anchor(&unit.name),
                unit.category
            ));
        }
        section.push('\n');
    }

    push_paragraph(&mut section, data.section_text(SECTION_BOTTOM));
    section
}

/// Generate one hazard group with its hazards.
fn generate_group_section(data: &ReportData, group: &str, hazard_codes: &[String]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", group));
    if let Some(text) = data.group_to_text.get(group) {
        push_paragraph(&mut section, text);
    }

    for code in hazard_codes {
        // Hazards without unit descriptions are not rendered
        let Some(units) = data.hazard_code_to_units.get(code) else {
            continue;
        };
        let name = units.first().map(|u| u.name.as_str()).unwrap_or(code.as_str());

        section.push_str(&format!("### {}\n\n", name));
        push_paragraph(&mut section, data.intro_text_for(code));

        for unit in units {
            section.push_str(&generate_unit_block(unit));
        }

        let references = data.references_for(code);
        if !references.is_empty() {
            section.push_str("#### References\n\n");
            for reference in references {
                section.push_str(&format!("- {}\n", reference));
            }
            section.push('\n');
        }
    }

    section
}

/// Generate a single unit block.
fn generate_unit_block(unit: &UnitDescriptor) -> String {
    let mut block = String::new();

    block.push_str(&format!("**{}** (`{}`)\n\n", unit.category, unit.unit_code));
    push_paragraph(&mut block, &unit.description);

    block
}

/// Generate the closing resources section.
fn generate_resources_section(data: &ReportData) -> String {
    let mut section = String::new();

    section.push_str("## Other Geologic Hazard Resources\n\n");
    push_paragraph(&mut section, data.section_text(SECTION_OTHER_RESOURCES));

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by hazard-report v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

fn push_paragraph(out: &mut String, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push_str(text);
        out.push_str("\n\n");
    }
}

/// Markdown heading anchor for a title.
fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Render the report in `format` and write it to `path`.
pub fn write_report(report: &Report, format: OutputFormat, path: &Path) -> Result<()> {
    let output = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, output)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

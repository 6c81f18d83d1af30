//! Run summary formatting.
//!
//! Renders an [`AggregateReport`] as the plain-text summary printed after a
//! run, or as JSON for programmatic access.

use serde::Serialize;

use crate::aggregate::{AggregateReport, FileOutcome};
use crate::tokens::Encoding;

/// Report format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable summary (default).
    #[default]
    Text,
    /// JSON for programmatic access.
    Json,
}

/// Format a run summary.
pub fn format_report(report: &AggregateReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(format_report_text(report)),
        ReportFormat::Json => format_report_json(report),
    }
}

// ============================================================================
// Text Formatting
// ============================================================================

fn format_report_text(report: &AggregateReport) -> String {
    let mut output = String::with_capacity(256);
    let target = report.output.display();

    let included: Vec<&FileOutcome> = report.included().collect();
    let skipped: Vec<&FileOutcome> = report.skipped().collect();

    output.push_str("Summary:\n");
    output.push_str(&format!("Included Files: {}\n", included.len()));
    for file in &included {
        output.push_str(&format!("  - {}\n", file.label()));
    }

    if !skipped.is_empty() {
        output.push_str(&format!("Skipped Files: {}\n", skipped.len()));
        for file in &skipped {
            if let FileOutcome::Skipped { label, reason } = file {
                output.push_str(&format!("  - {label} ({reason})\n"));
            }
        }
    }

    output.push_str(&format!("Written to: {target}\n"));
    output.push_str(&format!("Total Tokens in {target}: {}", report.tokens));
    output
}

// ============================================================================
// JSON Formatting
// ============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    output: String,
    encoding: Encoding,
    tokens: usize,
    included: Vec<JsonIncluded<'a>>,
    skipped: Vec<JsonSkipped<'a>>,
}

#[derive(Serialize)]
struct JsonIncluded<'a> {
    label: &'a str,
    lines: usize,
}

#[derive(Serialize)]
struct JsonSkipped<'a> {
    label: &'a str,
    reason: &'a str,
}

fn format_report_json(report: &AggregateReport) -> Result<String, serde_json::Error> {
    let mut included = Vec::new();
    let mut skipped = Vec::new();
    for file in &report.files {
        match file {
            FileOutcome::Included { label, lines } => included.push(JsonIncluded {
                label,
                lines: *lines,
            }),
            FileOutcome::Skipped { label, reason } => skipped.push(JsonSkipped { label, reason }),
        }
    }

    let json = JsonReport {
        output: report.output.display().to_string(),
        encoding: report.encoding,
        tokens: report.tokens,
        included,
        skipped,
    };
    serde_json::to_string_pretty(&json)
}

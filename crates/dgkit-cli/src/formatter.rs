//! Output formatters for command results.

use clap::ValueEnum;
use dgkit_core::{Finding, IndexedCatalog, SyncPlan, SyncReport, UnitId};
use serde_json::{json, Value};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format the outcome of a pull.
    fn format_pull(&self, catalog: &IndexedCatalog, snapshot_written: bool) -> String;

    /// Format a sync report.
    fn format_report(&self, report: &SyncReport) -> String;

    /// Format a dry-run plan.
    fn format_plan(&self, plan: &SyncPlan) -> String;

    /// Format convention findings.
    fn format_findings(&self, findings: &[Finding]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_pull(&self, catalog: &IndexedCatalog, snapshot_written: bool) -> String {
        let mut output = format!(
            "Pulled {} row(s), {} page(s)",
            catalog.len(),
            catalog.page_by_id.len()
        );
        if snapshot_written {
            output.push_str("; snapshot written");
        }
        output
    }

    fn format_report(&self, report: &SyncReport) -> String {
        let mut output = format!("Sync finished: {}", report);
        for failure in &report.failures {
            output.push_str(&format!("\n  {}", failure));
        }
        output
    }

    fn format_plan(&self, plan: &SyncPlan) -> String {
        if plan.is_empty() {
            return "Dry run: nothing to do".to_string();
        }
        let mut output = format!("Dry run: {}", plan);
        append_ids(&mut output, "delete", &plan.to_delete);
        append_ids(&mut output, "add", &plan.to_add);
        output
    }

    fn format_findings(&self, findings: &[Finding]) -> String {
        if findings.is_empty() {
            return "No findings".to_string();
        }
        let mut lines: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
        lines.push(format!("{} finding(s)", findings.len()));
        lines.join("\n")
    }
}

fn append_ids(output: &mut String, label: &str, ids: &[UnitId]) {
    for id in ids {
        output.push_str(&format!("\n  {} {}", label, id));
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_pull(&self, catalog: &IndexedCatalog, snapshot_written: bool) -> String {
        to_json(json!({
            "rows": catalog.len(),
            "pages": catalog.page_by_id.len(),
            "snapshot_written": snapshot_written,
        }))
    }

    fn format_report(&self, report: &SyncReport) -> String {
        let failures: Vec<Value> = report
            .failures
            .iter()
            .map(|failure| {
                json!({
                    "unit_id": failure.unit_id,
                    "phase": failure.phase.as_str(),
                    "error": failure.error.to_string(),
                })
            })
            .collect();

        to_json(json!({
            "deleted": report.deleted,
            "rows_added": report.rows_added,
            "pages_added": report.pages_added,
            "rows_updated": report.rows_updated,
            "pages_updated": report.pages_updated,
            "unchanged": report.unchanged,
            "failures": failures,
            "checkpoint_error": report.checkpoint_error.as_ref().map(|e| e.to_string()),
        }))
    }

    fn format_plan(&self, plan: &SyncPlan) -> String {
        to_json(json!({
            "dry_run": true,
            "to_delete": plan.to_delete,
            "to_add": plan.to_add,
            "rows_to_update": plan.rows_to_update,
            "pages_to_update": plan.pages_to_update,
        }))
    }

    fn format_findings(&self, findings: &[Finding]) -> String {
        to_json(json!({ "findings": findings }))
    }
}

fn to_json(value: Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

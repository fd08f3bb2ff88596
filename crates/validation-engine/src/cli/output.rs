//! Output formatting for the entity validation CLI
//!
//! Every command result renders as JSON, YAML, or a colored table.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::io::{self, Write};

use crate::contracts::{
    AlertSeverity, BulkValidation, DailyReport, OutcomeSeverity, RuleDefinition, ValidationAlert,
    ValidationIssue, ValidationMetricsSnapshot, ValidationOutcome, WeeklyReport,
};
use crate::error::Result;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Something the CLI can print as a table
pub trait TableRender {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Print `value` to stdout in `format`
pub fn emit<T: Serialize + TableRender>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Table => {
            let mut stdout = io::stdout();
            value.render_table(&mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn heading(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title.cyan().bold())?;
    writeln!(out, "{}", "=".repeat(60))
}

fn status(valid: bool) -> ColoredString {
    if valid {
        "+".green()
    } else {
        "x".red()
    }
}

fn severity_label(severity: OutcomeSeverity) -> ColoredString {
    match severity {
        OutcomeSeverity::Info => severity.to_string().blue(),
        OutcomeSeverity::Warning => severity.to_string().yellow(),
        OutcomeSeverity::Error => severity.to_string().red(),
    }
}

fn alert_label(severity: AlertSeverity) -> ColoredString {
    match severity {
        AlertSeverity::Low => severity.as_str().blue(),
        AlertSeverity::Medium => severity.as_str().yellow(),
        AlertSeverity::High => severity.as_str().red(),
        AlertSeverity::Critical => severity.as_str().red().bold(),
    }
}

fn issue_row(out: &mut dyn Write, marker: ColoredString, issue: &ValidationIssue) -> io::Result<()> {
    let field = if issue.field.is_empty() {
        "<entity>".to_string()
    } else {
        issue.field.clone()
    };
    write!(out, "  {} [{}] {}: {}", marker, issue.code.dimmed(), field.bold(), issue.message)?;
    if let Some(rule) = &issue.rule {
        write!(out, " {}", format!("({})", rule).dimmed())?;
    }
    writeln!(out)
}

fn outcome_rows(out: &mut dyn Write, outcome: &ValidationOutcome) -> io::Result<()> {
    let label = match &outcome.entity_id {
        Some(id) => format!("{} {}", outcome.entity_type, id),
        None => outcome.entity_type.clone(),
    };
    writeln!(
        out,
        "{} {} ({}, {} rule(s), {} ms)",
        status(outcome.is_valid),
        label.bold(),
        severity_label(outcome.severity),
        outcome.rules_applied.len(),
        outcome.duration_ms
    )?;
    for issue in &outcome.errors {
        issue_row(out, "x".red(), issue)?;
    }
    for issue in &outcome.warnings {
        issue_row(out, "!".yellow(), issue)?;
    }
    Ok(())
}

impl TableRender for ValidationOutcome {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, "Validation Result")?;
        outcome_rows(out, self)?;
        if !self.rules_applied.is_empty() {
            writeln!(out)?;
            writeln!(out, "Rules applied: {}", self.rules_applied.join(", ").dimmed())?;
        }
        Ok(())
    }
}

impl TableRender for BulkValidation {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, "Bulk Validation")?;
        for outcome in &self.results {
            outcome_rows(out, outcome)?;
        }
        let s = &self.summary;
        writeln!(out)?;
        writeln!(out, "{}", "Summary:".cyan().bold())?;
        writeln!(out, "  Validated: {}", s.total_validated)?;
        writeln!(out, "  {} Passed:    {}", "+".green(), s.passed.to_string().green())?;
        writeln!(out, "  {} Failed:    {}", "x".red(), s.failed.to_string().red())?;
        writeln!(out, "  Errors: {}  Warnings: {}", s.errors, s.warnings)
    }
}

/// Rule listing
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RuleList(pub Vec<RuleDefinition>);

impl TableRender for RuleList {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, "Active Rules")?;
        if self.0.is_empty() {
            return writeln!(out, "{}", "No rules".dimmed());
        }
        writeln!(out, "{:<28} {:<12} {:<6} {:<12} {:>3}", "NAME", "DOMAIN", "MODE", "KIND", "VER")?;
        writeln!(out, "{}", "-".repeat(60))?;
        for rule in &self.0 {
            writeln!(
                out,
                "{:<28} {:<12} {:<6} {:<12} {:>3}",
                rule.name,
                rule.domain.to_string(),
                rule.execution_kind.to_string(),
                rule.definition.as_str(),
                rule.version
            )?;
        }
        Ok(())
    }
}

impl TableRender for ValidationMetricsSnapshot {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, "Validation Metrics")?;
        writeln!(
            out,
            "Window: {} .. {}",
            self.window_start.to_rfc3339(),
            self.window_end.to_rfc3339()
        )?;
        writeln!(out, "Total:        {}", self.total)?;
        writeln!(out, "Successful:   {}", self.successful.to_string().green())?;
        writeln!(out, "Failed:       {}", self.failed.to_string().red())?;
        writeln!(out, "Error rate:   {:.1}%", self.error_rate * 100.0)?;
        writeln!(out, "Quality:      {:.1}", self.data_quality_score)?;
        writeln!(out, "Avg response: {:.1} ms", self.average_response_time_ms)?;
        if !self.top_failing_rules.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", "Top failing rules:".cyan().bold())?;
            for rule in &self.top_failing_rules {
                writeln!(out, "  {:<40} {}", rule.rule_name, rule.failure_count)?;
            }
        }
        Ok(())
    }
}

impl TableRender for DailyReport {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, &format!("Daily Report {}", self.date))?;
        writeln!(
            out,
            "Total: {}  Successful: {}  Failed: {}  Success rate: {:.1}%",
            self.total, self.successful, self.failed, self.success_rate
        )?;
        if !self.by_entity_type.is_empty() {
            writeln!(out)?;
            writeln!(out, "{:<24} {:>7} {:>7} {:>7} {:>8}", "ENTITY TYPE", "TOTAL", "OK", "FAILED", "RATE")?;
            writeln!(out, "{}", "-".repeat(60))?;
            for row in &self.by_entity_type {
                writeln!(
                    out,
                    "{:<24} {:>7} {:>7} {:>7} {:>7.1}%",
                    row.entity_type, row.total, row.successful, row.failed, row.success_rate
                )?;
            }
        }
        Ok(())
    }
}

impl TableRender for WeeklyReport {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        heading(out, &format!("Weekly Report {} .. {}", self.start_date, self.end_date))?;
        writeln!(
            out,
            "Total: {}  Successful: {}  Failed: {}  Success rate: {:.1}%",
            self.total, self.successful, self.failed, self.success_rate
        )?;
        writeln!(out)?;
        writeln!(out, "{:<12} {:>7} {:>7} {:>7} {:>8}", "DATE", "TOTAL", "OK", "FAILED", "RATE")?;
        writeln!(out, "{}", "-".repeat(60))?;
        for day in &self.daily {
            writeln!(
                out,
                "{:<12} {:>7} {:>7} {:>7} {:>7.1}%",
                day.date.to_string(),
                day.total,
                day.successful,
                day.failed,
                day.success_rate
            )?;
        }
        Ok(())
    }
}

impl TableRender for ValidationAlert {
    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{} [{}] {} {}",
            "ALERT".red().bold(),
            alert_label(self.severity),
            self.alert_type.as_str().bold(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{BulkSummary, ValidationIssue};

    fn render(value: &impl TableRender) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        value.render_table(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_outcome_table_lists_issues() {
        let mut outcome = ValidationOutcome::new("contact", Some("c-1".to_string()));
        outcome
            .errors
            .push(ValidationIssue::new("email", "format", "Invalid email").with_rule("contact-schema"));
        outcome.warnings.push(ValidationIssue::new("", "HIERARCHY_INCONSISTENT", "Differs"));
        outcome.refresh();

        let text = render(&outcome);
        assert!(text.contains("contact c-1"));
        assert!(text.contains("[format] email: Invalid email (contact-schema)"));
        assert!(text.contains("<entity>"));
    }

    #[test]
    fn test_bulk_table_has_summary() {
        let validation = BulkValidation {
            results: vec![ValidationOutcome::new("contact", None)],
            summary: BulkSummary {
                total_validated: 1,
                passed: 1,
                ..BulkSummary::default()
            },
        };
        let text = render(&validation);
        assert!(text.contains("Validated: 1"));
    }

    #[test]
    fn test_empty_rule_list() {
        assert!(render(&RuleList(Vec::new())).contains("No rules"));
    }
}

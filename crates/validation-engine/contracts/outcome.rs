//! Validation outcomes
//!
//! An outcome is the full result of validating one entity against the set of
//! rules resolved for it. Severity is always derived from the issue lists so
//! that `severity == Error` holds exactly when `errors` is non-empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::codes;

/// A single problem found while validating an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field (empty for entity-level issues)
    pub field: String,

    /// Human-readable message
    pub message: String,

    /// Stable machine-readable code
    pub code: String,

    /// Offending value, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Name of the rule that raised the issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            value: None,
            rule: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.code, self.field, self.message)
        }
    }
}

/// Overall severity of an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeSeverity {
    Info,
    Warning,
    Error,
}

impl OutcomeSeverity {
    /// Derive severity from issue lists
    pub fn derive(errors: &[ValidationIssue], warnings: &[ValidationIssue]) -> Self {
        if !errors.is_empty() {
            OutcomeSeverity::Error
        } else if !warnings.is_empty() {
            OutcomeSeverity::Warning
        } else {
            OutcomeSeverity::Info
        }
    }
}

impl fmt::Display for OutcomeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeSeverity::Info => write!(f, "info"),
            OutcomeSeverity::Warning => write!(f, "warning"),
            OutcomeSeverity::Error => write!(f, "error"),
        }
    }
}

/// Result of executing one rule against one payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl RuleEvaluation {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn failed(issue: ValidationIssue) -> Self {
        Self {
            errors: vec![issue],
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Tag every issue with the rule that produced it
    pub fn attributed_to(mut self, rule_name: &str) -> Self {
        for issue in self.errors.iter_mut().chain(self.warnings.iter_mut()) {
            if issue.rule.is_none() {
                issue.rule = Some(rule_name.to_string());
            }
        }
        self
    }
}

/// Full result of validating one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Identifier of this outcome record
    pub id: Uuid,

    pub is_valid: bool,

    #[serde(default)]
    pub errors: Vec<ValidationIssue>,

    #[serde(default)]
    pub warnings: Vec<ValidationIssue>,

    pub entity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Set when exactly one rule produced this outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,

    pub severity: OutcomeSeverity,

    /// Names of the rules that were executed
    #[serde(default)]
    pub rules_applied: Vec<String>,

    /// Names of the rules that produced at least one error
    #[serde(default)]
    pub failed_rules: Vec<String>,

    /// Wall time spent computing the outcome
    #[serde(default)]
    pub duration_ms: u64,

    pub validated_at: DateTime<Utc>,
}

impl ValidationOutcome {
    /// An outcome with no rules applied: trivially valid
    pub fn new(entity_type: impl Into<String>, entity_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            entity_type: entity_type.into(),
            entity_id,
            rule_id: None,
            severity: OutcomeSeverity::Info,
            rules_applied: Vec::new(),
            failed_rules: Vec::new(),
            duration_ms: 0,
            validated_at: Utc::now(),
        }
    }

    /// An outcome standing in for an entity that could not be validated
    pub fn synthetic_failure(
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        let mut outcome = Self::new(entity_type, entity_id);
        outcome.errors.push(ValidationIssue::new("", code, message));
        outcome.refresh();
        outcome
    }

    /// Shorthand for a `VALIDATION_ERROR` synthetic failure
    pub fn validation_error(
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::synthetic_failure(entity_type, entity_id, codes::VALIDATION_ERROR, message)
    }

    /// Merge one rule's evaluation into the outcome
    pub fn absorb(&mut self, rule_name: &str, rule_id: Uuid, evaluation: RuleEvaluation) {
        let evaluation = evaluation.attributed_to(rule_name);
        if !evaluation.is_valid() {
            self.failed_rules.push(rule_name.to_string());
        }
        self.rules_applied.push(rule_name.to_string());
        self.errors.extend(evaluation.errors);
        self.warnings.extend(evaluation.warnings);

        self.rule_id = if self.rules_applied.len() == 1 {
            Some(rule_id)
        } else {
            None
        };
        self.refresh();
    }

    /// Stamp the duration and completion time
    pub fn finish(mut self, elapsed: Duration, at: DateTime<Utc>) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self.validated_at = at;
        self.refresh();
        self
    }

    /// Re-derive `is_valid` and `severity` from the issue lists
    pub fn refresh(&mut self) {
        self.is_valid = self.errors.is_empty();
        self.severity = OutcomeSeverity::derive(&self.errors, &self.warnings);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// One entry of a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEntity {
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Entity payload; a missing payload fails only this entry
    #[serde(default, alias = "payload")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl BulkEntity {
    pub fn new(entity_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            data: Some(data),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Aggregate counts for a bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_validated: usize,
    pub passed: usize,
    pub failed: usize,
    /// Total warning issues across all entities
    pub warnings: usize,
    /// Total error issues across all entities
    pub errors: usize,
}

impl BulkSummary {
    pub fn record(&mut self, outcome: &ValidationOutcome) {
        self.total_validated += 1;
        if outcome.is_valid {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.warnings += outcome.warnings.len();
        self.errors += outcome.errors.len();
    }
}

/// Results of a bulk run, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkValidation {
    pub results: Vec<ValidationOutcome>,
    pub summary: BulkSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_outcome_is_trivially_valid() {
        let outcome = ValidationOutcome::new("contact", None);
        assert!(outcome.is_valid);
        assert_eq!(outcome.severity, OutcomeSeverity::Info);
        assert!(outcome.errors.is_empty() && outcome.warnings.is_empty());
    }

    #[test]
    fn test_absorb_tracks_failed_rules_and_severity() {
        let mut outcome = ValidationOutcome::new("contact", Some("c-1".to_string()));

        let mut warn = RuleEvaluation::passed();
        warn.push_warning(ValidationIssue::new("region", "HIERARCHY_INCONSISTENT", "differs"));
        outcome.absorb("hierarchy", Uuid::new_v4(), warn);
        assert!(outcome.is_valid);
        assert_eq!(outcome.severity, OutcomeSeverity::Warning);
        assert!(outcome.rule_id.is_some());

        outcome.absorb(
            "email-format",
            Uuid::new_v4(),
            RuleEvaluation::failed(ValidationIssue::new("email", "format", "bad email")),
        );
        assert!(!outcome.is_valid);
        assert_eq!(outcome.severity, OutcomeSeverity::Error);
        assert_eq!(outcome.failed_rules, vec!["email-format".to_string()]);
        assert_eq!(outcome.rules_applied.len(), 2);
        assert!(outcome.rule_id.is_none());
        assert_eq!(outcome.errors[0].rule.as_deref(), Some("email-format"));
    }

    #[test]
    fn test_synthetic_failure() {
        let outcome = ValidationOutcome::validation_error("workflow", None, "payload missing");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.severity, OutcomeSeverity::Error);
        assert_eq!(outcome.errors[0].code, codes::VALIDATION_ERROR);
    }

    #[test]
    fn test_bulk_summary_counts_issues() {
        let mut summary = BulkSummary::default();
        summary.record(&ValidationOutcome::new("contact", None));
        summary.record(&ValidationOutcome::validation_error("contact", None, "boom"));

        assert_eq!(summary.total_validated, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 0);
    }

    #[test]
    fn test_bulk_entity_accepts_payload_alias() {
        let entity: BulkEntity =
            serde_json::from_str(r#"{"type":"contact","payload":{"name":"Ada"}}"#).unwrap();
        assert!(entity.data.is_some());

        let missing: BulkEntity = serde_json::from_str(r#"{"type":"contact"}"#).unwrap();
        assert!(missing.data.is_none());
    }
}

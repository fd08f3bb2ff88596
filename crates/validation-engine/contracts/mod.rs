//! Validation Engine Contract Definitions
//!
//! This module defines the data contracts shared by every component of the
//! engine and by the collaborators around it (transport layer, storage,
//! dashboards).
//!
//! # Architecture
//!
//! - `rules` - versioned rule definitions and the closed set of rule kinds
//! - `outcome` - validation issues, outcomes and bulk summaries
//! - `monitoring` - rolling metrics, alerts and periodic reports
//!
//! # Design Principles
//!
//! - **Closed dispatch**: rule kinds are a tagged enum, never a free-form string
//! - **Stable codes**: every issue carries a machine-readable `code`
//! - **Serializable**: every contract round-trips through JSON for persistence

pub mod monitoring;
pub mod outcome;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use monitoring::{
    AlertSeverity, AlertType, DailyReport, DailyTrendPoint, EntityTypeSummary, RuleFailureCount,
    ValidationAlert, ValidationMetricsSnapshot, WeeklyReport,
};
pub use outcome::{
    BulkEntity, BulkSummary, BulkValidation, OutcomeSeverity, RuleEvaluation, ValidationIssue,
    ValidationOutcome,
};
pub use rules::{
    CustomPredicate, DataSourceCheck, Expectation, FieldFormat, FieldSpec, FieldType, NewRule,
    ParamValue, RuleDefinition, RuleKind, SchemaSpec,
};

/// Stable issue codes emitted by the engine.
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const TYPE: &str = "type";
    pub const FORMAT: &str = "format";
    pub const PATTERN: &str = "pattern";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const ENUM: &str = "enum";
    pub const UNKNOWN_FIELD: &str = "unknown_field";

    pub const NOT_UNIQUE: &str = "NOT_UNIQUE";
    pub const CIRCULAR_DEPENDENCY: &str = "CIRCULAR_DEPENDENCY";
    pub const HIERARCHY_INCONSISTENT: &str = "HIERARCHY_INCONSISTENT";
    pub const HIERARCHY_DEPTH_EXCEEDED: &str = "HIERARCHY_DEPTH_EXCEEDED";
    pub const DATABASE_VALIDATION_FAILED: &str = "DATABASE_VALIDATION_FAILED";

    pub const RULE_EXECUTION_ERROR: &str = "RULE_EXECUTION_ERROR";
    pub const RULE_CONFIGURATION_ERROR: &str = "RULE_CONFIGURATION_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
}

/// Category of entity that rules apply to.
///
/// The three built-in domains are always known to the registry; any other
/// name becomes known once a rule is created for it or it is registered
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Domain {
    Contact,
    Workflow,
    CrossSystem,
    Other(String),
}

impl Domain {
    /// Built-in domains, in display order
    pub fn builtin() -> [Domain; 3] {
        [Domain::Contact, Domain::Workflow, Domain::CrossSystem]
    }

    pub fn as_str(&self) -> &str {
        match self {
            Domain::Contact => "contact",
            Domain::Workflow => "workflow",
            Domain::CrossSystem => "cross-system",
            Domain::Other(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Domain::Other(_))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err("Domain name must not be empty".to_string()),
            "contact" => Ok(Domain::Contact),
            "workflow" => Ok(Domain::Workflow),
            "cross-system" | "cross_system" => Ok(Domain::CrossSystem),
            _ => Ok(Domain::Other(normalized)),
        }
    }
}

impl TryFrom<String> for Domain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.as_str().to_string()
    }
}

/// Which validation path a rule is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    Sync,
    Async,
    Batch,
}

impl ExecutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionKind::Sync => "sync",
            ExecutionKind::Async => "async",
            ExecutionKind::Batch => "batch",
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sync" => Ok(ExecutionKind::Sync),
            "async" => Ok(ExecutionKind::Async),
            "batch" => Ok(ExecutionKind::Batch),
            other => Err(format!("Unknown execution kind: {}", other)),
        }
    }
}

//! Rule execution
//!
//! A [`RuleExecutor`] runs one rule against one payload and reports errors
//! and warnings. Dispatch is by [`RuleKind`]:
//!
//! - [`schema`] - field presence, type, format, range and length checks
//! - [`custom`] - built-in predicates backed by the record store
//! - [`data_source`] - a parameterized read plus an expected result
//!
//! A rule that faults never aborts evaluation of its siblings. Faults are
//! turned into a single error issue coded `RULE_CONFIGURATION_ERROR` or
//! `RULE_EXECUTION_ERROR`.

pub mod custom;
pub mod data_source;
pub mod schema;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ExecutorConfig;
use crate::contracts::{codes, RuleDefinition, RuleEvaluation, RuleKind, ValidationIssue};
use crate::error::StoreError;
use crate::store::{RecordQuery, RecordStore};

/// Executes a single rule against a single payload
#[async_trait]
pub trait RuleExecutor: Send + Sync {
    /// Never fails: faults are reported as error issues
    async fn execute(&self, rule: &RuleDefinition, payload: &Value, entity_type: &str) -> RuleEvaluation;
}

/// A rule could not be evaluated
#[derive(Debug, Error)]
pub enum RuleFault {
    /// The rule definition itself is unusable
    #[error("rule configuration error: {0}")]
    Configuration(String),

    /// The rule was fine but a collaborator failed
    #[error("rule execution error: {0}")]
    Execution(String),
}

impl RuleFault {
    pub fn configuration(msg: impl Into<String>) -> Self {
        RuleFault::Configuration(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            RuleFault::Configuration(_) => codes::RULE_CONFIGURATION_ERROR,
            RuleFault::Execution(_) => codes::RULE_EXECUTION_ERROR,
        }
    }

    fn into_issue(self, rule_name: &str) -> ValidationIssue {
        let code = self.code();
        ValidationIssue::new("", code, format!("Rule '{}' failed: {}", rule_name, self)).with_rule(rule_name)
    }
}

impl From<StoreError> for RuleFault {
    fn from(err: StoreError) -> Self {
        RuleFault::Execution(err.to_string())
    }
}

pub type FaultResult<T> = std::result::Result<T, RuleFault>;

/// Check a rule definition for problems detectable without a payload
pub fn check_definition(kind: &RuleKind) -> FaultResult<()> {
    match kind {
        RuleKind::Schema(spec) => schema::check(spec),
        RuleKind::Custom(predicate) => custom::check(predicate),
        RuleKind::DataSource(check) => data_source::check(check),
    }
}

/// Executor backed by a [`RecordStore`]
///
/// Every store read is bounded by `query_timeout_ms`; a timeout becomes a
/// `RULE_EXECUTION_ERROR` issue.
pub struct DefaultRuleExecutor {
    records: Arc<dyn RecordStore>,
    config: ExecutorConfig,
}

impl DefaultRuleExecutor {
    pub fn new(records: Arc<dyn RecordStore>, config: ExecutorConfig) -> Self {
        Self { records, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub(crate) async fn get_record(&self, collection: &str, id: &str) -> FaultResult<Option<Value>> {
        let timeout = self.config.query_timeout();
        match tokio::time::timeout(timeout, self.records.get_record(collection, id)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RuleFault::Execution(format!(
                "record lookup in '{}' timed out after {}ms",
                collection, self.config.query_timeout_ms
            ))),
        }
    }

    pub(crate) async fn find_records(&self, query: &RecordQuery) -> FaultResult<Vec<Value>> {
        let timeout = self.config.query_timeout();
        match tokio::time::timeout(timeout, self.records.find_records(query)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RuleFault::Execution(format!(
                "query on '{}' timed out after {}ms",
                query.collection, self.config.query_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl RuleExecutor for DefaultRuleExecutor {
    async fn execute(&self, rule: &RuleDefinition, payload: &Value, entity_type: &str) -> RuleEvaluation {
        let result = match &rule.definition {
            RuleKind::Schema(spec) => schema::evaluate(spec, payload),
            RuleKind::Custom(predicate) => custom::evaluate(self, predicate, payload, entity_type).await,
            RuleKind::DataSource(check) => data_source::evaluate(self, check, payload).await,
        };

        match result {
            Ok(evaluation) => evaluation.attributed_to(&rule.name),
            Err(fault) => {
                tracing::warn!(
                    rule = %rule.name,
                    rule_id = %rule.id,
                    kind = rule.definition.as_str(),
                    code = fault.code(),
                    error = %fault,
                    "Rule evaluation faulted"
                );
                RuleEvaluation::failed(fault.into_issue(&rule.name))
            }
        }
    }
}

//! Storage collaborators
//!
//! The engine never talks to a database directly. It consumes three narrow
//! traits:
//!
//! - [`RuleStore`] - rule definitions keyed by (domain, name, version)
//! - [`OutcomeStore`] - persisted outcomes, range-scanned by timestamp
//! - [`RecordStore`] - read-only view of entity records used by custom and
//!   data-source rules
//!
//! [`InMemoryStore`] implements all three for tests and offline use.
//! [`HttpOutcomeStore`] persists outcomes to a results service over HTTP.

pub mod http;
pub mod memory;

pub use http::{HttpOutcomeStore, HttpStoreConfig};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::contracts::{Domain, RuleDefinition, ValidationOutcome};
use crate::error::StoreResult;

/// Storage of versioned rule definitions
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Insert a new rule row.
    ///
    /// Fails with `Conflict` when the row would be a second active version
    /// of its (domain, name) or does not exceed every stored version.
    async fn insert_rule(&self, rule: RuleDefinition) -> StoreResult<()>;

    /// Atomically deactivate `previous` and insert `next`.
    ///
    /// Fails with `Conflict`, writing nothing, when `previous` is no longer
    /// active.
    async fn supersede_rule(&self, previous: Uuid, next: RuleDefinition) -> StoreResult<()>;

    /// Flip the active flag of a rule row; activating a row while a sibling
    /// version is active is a `Conflict`
    async fn set_rule_active(&self, id: Uuid, active: bool) -> StoreResult<()>;

    async fn get_rule(&self, id: Uuid) -> StoreResult<Option<RuleDefinition>>;

    /// All rows of a domain, active or not
    async fn list_rules(&self, domain: &Domain) -> StoreResult<Vec<RuleDefinition>>;

    /// Domains that have at least one rule row
    async fn domains(&self) -> StoreResult<Vec<Domain>>;
}

/// Storage of validation outcomes
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn save_outcome(&self, outcome: &ValidationOutcome) -> StoreResult<()>;

    /// Outcomes with `from <= validated_at < to`
    async fn outcomes_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ValidationOutcome>>;
}

/// Exact-match read over a record collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub collection: String,
    /// Dotted path -> expected value
    pub filter: BTreeMap<String, serde_json::Value>,
    /// Compare string values ignoring ASCII case
    #[serde(default)]
    pub case_insensitive: bool,
}

impl RecordQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, path: impl Into<String>, value: serde_json::Value) -> Self {
        self.filter.insert(path.into(), value);
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Whether `record` satisfies every filter entry
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        self.filter.iter().all(|(path, expected)| {
            crate::path::lookup(record, path)
                .map(|actual| crate::path::values_equal(actual, expected, self.case_insensitive))
                .unwrap_or(false)
        })
    }
}

/// Read-only access to entity records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point lookup by `id`
    async fn get_record(&self, collection: &str, id: &str) -> StoreResult<Option<serde_json::Value>>;

    async fn find_records(&self, query: &RecordQuery) -> StoreResult<Vec<serde_json::Value>>;
}

/// Records without an `is_active` (or `isActive`) flag count as active
pub fn record_is_active(record: &serde_json::Value) -> bool {
    record
        .get("is_active")
        .or_else(|| record.get("isActive"))
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

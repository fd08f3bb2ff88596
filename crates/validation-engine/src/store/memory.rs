//! In-memory implementation of every storage trait
//!
//! Used by tests and by the CLI, which loads rules and records from files.
//! All maps sit behind `RwLock`s; a poisoned lock surfaces as
//! `StoreError::Unavailable` instead of a panic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use super::{OutcomeStore, RecordQuery, RecordStore, RuleStore};
use crate::contracts::{Domain, RuleDefinition, ValidationOutcome};
use crate::error::{StoreError, StoreResult};

/// Process-local store for rules, outcomes and records
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rules: RwLock<Vec<RuleDefinition>>,
    outcomes: RwLock<Vec<ValidationOutcome>>,
    records: RwLock<HashMap<String, Vec<serde_json::Value>>>,
    unavailable: AtomicBool,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("Failed to acquire lock: {}", e))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Add an entity record to a collection
    pub fn insert_record(&self, collection: impl Into<String>, record: serde_json::Value) -> StoreResult<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.entry(collection.into()).or_default().push(record);
        Ok(())
    }

    /// Replace the whole record set
    pub fn load_records(&self, records: HashMap<String, Vec<serde_json::Value>>) -> StoreResult<()> {
        *self.records.write().map_err(poisoned)? = records;
        Ok(())
    }

    /// Add previously computed outcomes (e.g. from a results export)
    pub fn load_outcomes(&self, outcomes: Vec<ValidationOutcome>) -> StoreResult<()> {
        self.outcomes.write().map_err(poisoned)?.extend(outcomes);
        Ok(())
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn outcomes(&self) -> Vec<ValidationOutcome> {
        self.outcomes.read().map(|o| o.clone()).unwrap_or_default()
    }
}

/// Enforce the rule-row invariants for `next` against the stored rows:
/// versions grow per (domain, name) and at most one of them is active.
fn check_rule_row(rules: &[RuleDefinition], next: &RuleDefinition) -> StoreResult<()> {
    if rules.iter().any(|r| r.id == next.id) {
        return Err(StoreError::Conflict(format!("rule {} already exists", next.id)));
    }
    let siblings = rules.iter().filter(|r| r.domain == next.domain && r.name == next.name);
    for sibling in siblings {
        if sibling.version >= next.version {
            return Err(StoreError::Conflict(format!(
                "rule '{}' in domain '{}' already has version {}",
                next.name, next.domain, sibling.version
            )));
        }
        if next.is_active && sibling.is_active {
            return Err(StoreError::Conflict(format!(
                "rule '{}' is already active in domain '{}'",
                next.name, next.domain
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl RuleStore for InMemoryStore {
    async fn insert_rule(&self, rule: RuleDefinition) -> StoreResult<()> {
        self.check_available()?;
        let mut rules = self.rules.write().map_err(poisoned)?;
        check_rule_row(&rules, &rule)?;
        rules.push(rule);
        Ok(())
    }

    async fn supersede_rule(&self, previous: Uuid, next: RuleDefinition) -> StoreResult<()> {
        self.check_available()?;
        let mut rules = self.rules.write().map_err(poisoned)?;
        let index = rules
            .iter()
            .position(|r| r.id == previous)
            .ok_or_else(|| StoreError::NotFound(format!("rule {}", previous)))?;
        if !rules[index].is_active {
            return Err(StoreError::Conflict(format!(
                "rule {} (version {}) was already superseded or deactivated",
                previous, rules[index].version
            )));
        }

        rules[index].is_active = false;
        if let Err(e) = check_rule_row(&rules, &next) {
            rules[index].is_active = true;
            return Err(e);
        }
        rules.push(next);
        Ok(())
    }

    async fn set_rule_active(&self, id: Uuid, active: bool) -> StoreResult<()> {
        self.check_available()?;
        let mut rules = self.rules.write().map_err(poisoned)?;
        let index = rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {}", id)))?;
        let (domain, name) = (&rules[index].domain, &rules[index].name);
        if active && rules.iter().any(|r| r.id != id && r.is_active && &r.domain == domain && &r.name == name) {
            return Err(StoreError::Conflict(format!(
                "rule '{}' is already active in domain '{}'",
                name, domain
            )));
        }
        rules[index].is_active = active;
        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> StoreResult<Option<RuleDefinition>> {
        self.check_available()?;
        let rules = self.rules.read().map_err(poisoned)?;
        Ok(rules.iter().find(|r| r.id == id).cloned())
    }

    async fn list_rules(&self, domain: &Domain) -> StoreResult<Vec<RuleDefinition>> {
        self.check_available()?;
        let rules = self.rules.read().map_err(poisoned)?;
        Ok(rules.iter().filter(|r| &r.domain == domain).cloned().collect())
    }

    async fn domains(&self) -> StoreResult<Vec<Domain>> {
        self.check_available()?;
        let rules = self.rules.read().map_err(poisoned)?;
        let domains: BTreeSet<Domain> = rules.iter().map(|r| r.domain.clone()).collect();
        Ok(domains.into_iter().collect())
    }
}

#[async_trait]
impl OutcomeStore for InMemoryStore {
    async fn save_outcome(&self, outcome: &ValidationOutcome) -> StoreResult<()> {
        self.check_available()?;
        self.outcomes.write().map_err(poisoned)?.push(outcome.clone());
        Ok(())
    }

    async fn outcomes_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ValidationOutcome>> {
        self.check_available()?;
        let outcomes = self.outcomes.read().map_err(poisoned)?;
        Ok(outcomes
            .iter()
            .filter(|o| o.validated_at >= from && o.validated_at < to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_record(&self, collection: &str, id: &str) -> StoreResult<Option<serde_json::Value>> {
        self.check_available()?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(collection).and_then(|items| {
            items
                .iter()
                .find(|r| crate::path::entity_id(r).as_deref() == Some(id))
                .cloned()
        }))
    }

    async fn find_records(&self, query: &RecordQuery) -> StoreResult<Vec<serde_json::Value>> {
        self.check_available()?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(&query.collection)
            .map(|items| items.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

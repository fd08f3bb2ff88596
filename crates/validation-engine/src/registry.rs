//! Rule registry
//!
//! Resolves the active rules for a (domain, execution kind, name filter)
//! request and owns the rule lifecycle. Updates never mutate a stored rule:
//! they deactivate the current version and insert `version + 1`, so at most
//! one active version exists per (domain, name).

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::contracts::{Domain, ExecutionKind, NewRule, RuleDefinition};
use crate::engine::check_definition;
use crate::error::{EngineError, Result, StoreError};
use crate::store::RuleStore;

/// Store-level conflicts are lost races on the same rule
fn rule_write_error(e: StoreError) -> EngineError {
    match e {
        StoreError::Conflict(msg) => EngineError::Conflict(msg),
        other => EngineError::Store(other),
    }
}

/// Selects and manages rule definitions
pub struct RuleRegistry {
    store: Arc<dyn RuleStore>,
    registered: RwLock<BTreeSet<Domain>>,
}

impl RuleRegistry {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            registered: RwLock::new(Domain::builtin().into_iter().collect()),
        }
    }

    /// Make a domain known without creating a rule for it
    pub fn register_domain(&self, domain: Domain) -> Result<()> {
        self.registered
            .write()
            .map_err(|e| EngineError::Internal(format!("Failed to acquire lock: {}", e)))?
            .insert(domain);
        Ok(())
    }

    /// Built-in, registered and rule-bearing domains
    pub async fn known_domains(&self) -> Result<Vec<Domain>> {
        let mut domains = self
            .registered
            .read()
            .map_err(|e| EngineError::Internal(format!("Failed to acquire lock: {}", e)))?
            .clone();
        domains.extend(self.store.domains().await?);
        Ok(domains.into_iter().collect())
    }

    async fn parse_domain(&self, domain: &str) -> Result<Domain> {
        let parsed: Domain = domain
            .parse()
            .map_err(|e: String| EngineError::not_found(format!("domain '{}': {}", domain, e)))?;
        if self.known_domains().await?.contains(&parsed) {
            Ok(parsed)
        } else {
            Err(EngineError::not_found(format!("domain '{}'", domain)))
        }
    }

    /// Active rules of `kind` in `domain`, optionally narrowed to `names`,
    /// ordered by name. Unknown domains are `NotFound`; a known domain with
    /// nothing to check yields an empty list.
    pub async fn resolve(
        &self,
        domain: &str,
        kind: ExecutionKind,
        names: Option<&[String]>,
    ) -> Result<Vec<RuleDefinition>> {
        let domain = self.parse_domain(domain).await?;
        let mut rules: Vec<RuleDefinition> = self
            .store
            .list_rules(&domain)
            .await?
            .into_iter()
            .filter(|r| r.is_active && r.execution_kind == kind)
            .filter(|r| names.map_or(true, |names| names.iter().any(|n| n == &r.name)))
            .collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(
            domain = %domain,
            kind = %kind,
            resolved = rules.len(),
            "Resolved rules"
        );
        Ok(rules)
    }

    fn check_new_rule(rule: &NewRule) -> Result<()> {
        if rule.name.trim().is_empty() {
            return Err(EngineError::InvalidRule("rule name must not be empty".to_string()));
        }
        check_definition(&rule.definition).map_err(|e| EngineError::InvalidRule(e.to_string()))
    }

    /// Create a rule.
    ///
    /// A name that was retired earlier continues its version sequence, so
    /// (domain, name, version) stays unique across the whole history.
    pub async fn create_rule(&self, rule: NewRule) -> Result<RuleDefinition> {
        Self::check_new_rule(&rule)?;
        let history: Vec<RuleDefinition> = self
            .store
            .list_rules(&rule.domain)
            .await?
            .into_iter()
            .filter(|r| r.name == rule.name)
            .collect();
        if let Some(existing) = history.iter().find(|r| r.is_active) {
            return Err(EngineError::Conflict(format!(
                "rule '{}' is already active in domain '{}' (version {})",
                existing.name, existing.domain, existing.version
            )));
        }
        let latest = history.iter().map(|r| r.version).max().unwrap_or(0);

        let mut definition = RuleDefinition::from_new(rule);
        definition.version = latest + 1;
        self.store
            .insert_rule(definition.clone())
            .await
            .map_err(rule_write_error)?;
        tracing::info!(
            rule = %definition.name,
            rule_id = %definition.id,
            domain = %definition.domain,
            version = definition.version,
            kind = definition.definition.as_str(),
            "Rule created"
        );
        Ok(definition)
    }

    /// Supersede the active rule `id` with a new version.
    ///
    /// Name and domain are carried over from the superseded version.
    pub async fn update_rule(&self, id: Uuid, rule: NewRule) -> Result<RuleDefinition> {
        Self::check_new_rule(&rule)?;
        let current = self.get_rule(id).await?;
        if !current.is_active {
            return Err(EngineError::Conflict(format!(
                "rule {} (version {}) is not active",
                id, current.version
            )));
        }

        let next = current.next_version(rule);
        self.store
            .supersede_rule(current.id, next.clone())
            .await
            .map_err(rule_write_error)?;
        tracing::info!(
            rule = %next.name,
            previous_id = %current.id,
            rule_id = %next.id,
            version = next.version,
            "Rule superseded"
        );
        Ok(next)
    }

    /// Retire a rule version; it is kept for historical references
    pub async fn deactivate_rule(&self, id: Uuid) -> Result<RuleDefinition> {
        let mut rule = self.get_rule(id).await?;
        if rule.is_active {
            self.store.set_rule_active(id, false).await?;
            rule.is_active = false;
            tracing::info!(rule = %rule.name, rule_id = %id, "Rule deactivated");
        }
        Ok(rule)
    }

    pub async fn get_rule(&self, id: Uuid) -> Result<RuleDefinition> {
        self.store
            .get_rule(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("rule {}", id)))
    }

    /// Every version in a domain, ordered by name then version
    pub async fn list_rules(&self, domain: &Domain) -> Result<Vec<RuleDefinition>> {
        let mut rules = self.store.list_rules(domain).await?;
        rules.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
        Ok(rules)
    }
}

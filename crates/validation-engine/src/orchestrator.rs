//! Validation orchestrator
//!
//! The engine's facade. Composes the [`RuleRegistry`], a [`RuleExecutor`] and
//! the [`ResultCache`] into three modes:
//!
//! - **sync**: cached, never touches the outcome store
//! - **async**: returns the computed outcome and persists it on a spawned
//!   task; persistence failures are logged and counted, never surfaced
//! - **bulk**: runs the sync path per entity in input order; one bad entity
//!   never aborts the batch
//!
//! No mode returns an error. Anything that goes wrong before rules run (an
//! unknown domain, a store outage while resolving rules) becomes a synthetic
//! `VALIDATION_ERROR` outcome.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::cache::{fingerprint, CacheStats, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::contracts::{
    codes, BulkEntity, BulkSummary, BulkValidation, ExecutionKind, ValidationOutcome,
};
use crate::engine::RuleExecutor;
use crate::error::Result;
use crate::events::{EventBus, ValidationEvent};
use crate::path;
use crate::registry::RuleRegistry;
use crate::store::OutcomeStore;
use crate::telemetry::{EngineMetrics, Mode};

/// Entry point for entity validation
pub struct ValidationOrchestrator {
    registry: Arc<RuleRegistry>,
    executor: Arc<dyn RuleExecutor>,
    outcomes: Arc<dyn OutcomeStore>,
    cache: Arc<ResultCache>,
    cache_enabled: bool,
    events: Arc<EventBus<ValidationEvent>>,
    metrics: Option<Arc<EngineMetrics>>,
    clock: Arc<dyn Clock>,
}

/// Builder for [`ValidationOrchestrator`]
pub struct OrchestratorBuilder {
    registry: Arc<RuleRegistry>,
    executor: Arc<dyn RuleExecutor>,
    outcomes: Arc<dyn OutcomeStore>,
    cache: CacheConfig,
    events: Option<Arc<EventBus<ValidationEvent>>>,
    metrics: Option<Arc<EngineMetrics>>,
    clock: Arc<dyn Clock>,
}

impl OrchestratorBuilder {
    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn events(mut self, events: Arc<EventBus<ValidationEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> ValidationOrchestrator {
        let cache = Arc::new(ResultCache::new(self.cache.ttl(), Arc::clone(&self.clock)));
        ValidationOrchestrator {
            registry: self.registry,
            executor: self.executor,
            outcomes: self.outcomes,
            cache,
            cache_enabled: self.cache.enabled,
            events: self.events.unwrap_or_default(),
            metrics: self.metrics,
            clock: self.clock,
        }
    }
}

impl ValidationOrchestrator {
    pub fn builder(
        registry: Arc<RuleRegistry>,
        executor: Arc<dyn RuleExecutor>,
        outcomes: Arc<dyn OutcomeStore>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            executor,
            outcomes,
            cache: CacheConfig::default(),
            events: None,
            metrics: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus<ValidationEvent>> {
        &self.events
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolve `kind` rules for the entity type and run each of them
    async fn evaluate(
        &self,
        entity_type: &str,
        payload: &Value,
        kind: ExecutionKind,
        names: Option<&[String]>,
    ) -> Result<ValidationOutcome> {
        let start = Instant::now();
        let rules = self.registry.resolve(entity_type, kind, names).await?;
        let mut outcome = ValidationOutcome::new(entity_type, path::entity_id(payload));

        for rule in &rules {
            let evaluation = self.executor.execute(rule, payload, entity_type).await;
            if let Some(metrics) = &self.metrics {
                for issue in &evaluation.errors {
                    if issue.code == codes::RULE_EXECUTION_ERROR || issue.code == codes::RULE_CONFIGURATION_ERROR {
                        metrics.record_rule_fault(&issue.code);
                    }
                }
            }
            outcome.absorb(&rule.name, rule.id, evaluation);
        }

        Ok(outcome.finish(start.elapsed(), self.clock.now()))
    }

    fn failure_outcome(&self, entity_type: &str, payload: &Value, err: impl std::fmt::Display) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::validation_error(
            entity_type,
            path::entity_id(payload),
            format!("Validation could not run: {}", err),
        );
        outcome.validated_at = self.clock.now();
        outcome
    }

    /// The sync path without metrics or events; returns whether it was a cache hit
    async fn sync_outcome(
        &self,
        entity_type: &str,
        payload: &Value,
        names: Option<&[String]>,
    ) -> (ValidationOutcome, bool) {
        let key = self.cache_enabled.then(|| fingerprint(entity_type, names, payload));

        if let Some(key) = &key {
            let hit = self.cache.get(key);
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_lookup(hit.is_some());
            }
            if let Some(outcome) = hit {
                tracing::debug!(entity_type = entity_type, outcome_id = %outcome.id, "Cache hit");
                return (outcome, true);
            }
        }

        match self.evaluate(entity_type, payload, ExecutionKind::Sync, names).await {
            Ok(outcome) => {
                if let Some(key) = key {
                    self.cache.put(key, outcome.clone());
                }
                (outcome, false)
            }
            Err(e) => {
                tracing::warn!(entity_type = entity_type, error = %e, "Synchronous validation failed");
                (self.failure_outcome(entity_type, payload, e), false)
            }
        }
    }

    fn record(&self, mode: Mode, outcome: &ValidationOutcome, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_validation(mode, &outcome.entity_type, outcome.is_valid, elapsed.as_secs_f64());
        }
    }

    /// Validate against the sync rules of the entity type's domain.
    ///
    /// A cache hit within the TTL is returned unchanged.
    pub async fn validate_sync(
        &self,
        entity_type: &str,
        payload: &Value,
        names: Option<&[String]>,
    ) -> ValidationOutcome {
        let start = Instant::now();
        let (outcome, cached) = self.sync_outcome(entity_type, payload, names).await;

        self.record(Mode::Sync, &outcome, start.elapsed());
        self.events.publish(ValidationEvent::SyncCompleted {
            outcome: outcome.clone(),
            cached,
        });
        outcome
    }

    /// Validate against the async rules and persist the outcome.
    ///
    /// Persistence runs on its own task: it may finish before or after this
    /// call returns.
    pub async fn validate_async(
        &self,
        entity_type: &str,
        payload: &Value,
        names: Option<&[String]>,
    ) -> ValidationOutcome {
        let start = Instant::now();
        let outcome = match self.evaluate(entity_type, payload, ExecutionKind::Async, names).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(entity_type = entity_type, error = %e, "Asynchronous validation failed");
                self.failure_outcome(entity_type, payload, e)
            }
        };

        self.persist_in_background(vec![outcome.clone()]);
        self.record(Mode::Async, &outcome, start.elapsed());
        self.events.publish(ValidationEvent::AsyncCompleted {
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Validate every entity through the sync path, in input order
    pub async fn validate_bulk(&self, entities: Vec<BulkEntity>) -> BulkValidation {
        let start = Instant::now();
        let mut results = Vec::with_capacity(entities.len());
        let mut summary = BulkSummary::default();

        for entity in entities {
            let entity_start = Instant::now();
            let outcome = match &entity.data {
                Some(payload) => {
                    let (mut outcome, cached) = self.sync_outcome(&entity.entity_type, payload, None).await;
                    // each bulk result is persisted as its own row
                    if cached {
                        outcome.id = Uuid::new_v4();
                        outcome.validated_at = self.clock.now();
                    }
                    if entity.id.is_some() {
                        outcome.entity_id = entity.id.clone();
                    }
                    outcome
                }
                None => {
                    let mut outcome = ValidationOutcome::validation_error(
                        &entity.entity_type,
                        entity.id.clone(),
                        "Entity payload is missing",
                    );
                    outcome.validated_at = self.clock.now();
                    outcome
                }
            };

            self.record(Mode::Bulk, &outcome, entity_start.elapsed());
            summary.record(&outcome);
            results.push(outcome);
        }

        tracing::info!(
            total = summary.total_validated,
            passed = summary.passed,
            failed = summary.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bulk validation completed"
        );

        self.persist_in_background(results.clone());
        let validation = BulkValidation { results, summary };
        self.events.publish(ValidationEvent::BulkCompleted {
            validation: validation.clone(),
        });
        validation
    }

    fn persist_in_background(&self, outcomes: Vec<ValidationOutcome>) {
        let store = Arc::clone(&self.outcomes);
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            for outcome in outcomes {
                if let Err(e) = store.save_outcome(&outcome).await {
                    tracing::warn!(
                        outcome_id = %outcome.id,
                        entity_type = %outcome.entity_type,
                        error = %e,
                        "Failed to persist validation outcome"
                    );
                    if let Some(metrics) = &metrics {
                        metrics.record_persistence_failure();
                    }
                }
            }
        });
    }
}

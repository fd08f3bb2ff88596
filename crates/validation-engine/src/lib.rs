//! Entity Validation Engine
//!
//! Validates domain entities (contacts, workflows, cross-system links and any
//! registered custom domain) against a versioned set of rules before they are
//! persisted or acted upon elsewhere.
//!
//! ## Architecture
//!
//! 1. **Registry** (`registry`): versioned rule storage and selection by
//!    domain, execution kind and optional name filter.
//!
//! 2. **Engine** (`engine`): executes one rule against one payload. Schema
//!    rules, built-in predicates (uniqueness, acyclicity, hierarchy
//!    consistency) and data-source checks. Faults become issues, never errors.
//!
//! 3. **Cache** (`cache`): TTL cache of sync outcomes keyed by a canonical
//!    payload fingerprint.
//!
//! 4. **Orchestrator** (`orchestrator`): sync, async and bulk validation.
//!
//! 5. **Monitor** (`monitor`): rolling metrics, threshold alerts and
//!    daily/weekly reports over persisted outcomes.
//!
//! 6. **Store** (`store`): rule, outcome and record storage traits with an
//!    in-memory implementation and an HTTP results-service client.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use validation_engine::{
//!     contracts::{Domain, ExecutionKind, FieldFormat, FieldSpec, FieldType, NewRule, RuleKind, SchemaSpec},
//!     DefaultRuleExecutor, ExecutorConfig, InMemoryStore, RuleRegistry, ValidationOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> validation_engine::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let registry = Arc::new(RuleRegistry::new(store.clone()));
//!
//!     let schema = SchemaSpec::new().with_field(
//!         "email",
//!         FieldSpec::required(FieldType::String).with_format(FieldFormat::Email),
//!     );
//!     registry
//!         .create_rule(NewRule::new("contact-email", Domain::Contact, ExecutionKind::Sync, RuleKind::Schema(schema)))
//!         .await?;
//!
//!     let executor = Arc::new(DefaultRuleExecutor::new(store.clone(), ExecutorConfig::default()));
//!     let orchestrator = ValidationOrchestrator::builder(registry, executor, store).build();
//!
//!     let outcome = orchestrator
//!         .validate_sync("contact", &json!({"email": "ada@example.com"}), None)
//!         .await;
//!     assert!(outcome.is_valid);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod monitor;
pub mod orchestrator;
pub mod path;
pub mod registry;
pub mod store;
pub mod telemetry;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use cache::{fingerprint, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AlertThresholds, CacheConfig, EngineConfig, EngineConfigBuilder, EventsConfig, ExecutorConfig,
    MonitorConfig, StoreConfig,
};
pub use engine::{DefaultRuleExecutor, RuleExecutor, RuleFault};
pub use error::{EngineError, Result, StoreError};
pub use events::{EventBus, MonitorEvent, ValidationEvent};
pub use monitor::{AlertManager, MonitorBuilder, ValidationMonitor};
pub use orchestrator::{OrchestratorBuilder, ValidationOrchestrator};
pub use registry::RuleRegistry;
pub use store::{HttpOutcomeStore, HttpStoreConfig, InMemoryStore, OutcomeStore, RecordQuery, RecordStore, RuleStore};
pub use telemetry::{EngineMetrics, MetricsRegistry, Mode};

pub use cli::{EntityCli, ExitCode, OutputFormat};

/// Crate version (from Cargo.toml)
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI application
///
/// ```rust,no_run
/// use clap::Parser;
/// use validation_engine::{run_cli, EntityCli};
///
/// #[tokio::main]
/// async fn main() {
///     let cli = EntityCli::parse();
///     let exit_code = run_cli(cli).await;
///     std::process::exit(exit_code.into());
/// }
/// ```
pub async fn run_cli(cli: EntityCli) -> ExitCode {
    cli::run_cli(cli).await
}

//! CLI command definitions for the entity validation engine
//!
//! Commands run the engine in-process over local files: rules, records and
//! persisted outcomes are read from JSON, YAML or TOML documents. `monitor`
//! is the exception and reads outcomes from a results service over HTTP.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::output::{emit, OutputFormat, RuleList, TableRender};
use super::ExitCode;
use crate::clock::{Clock, ManualClock, SystemClock};
use crate::config::EngineConfig;
use crate::contracts::{BulkEntity, Domain, NewRule, ValidationOutcome};
use crate::engine::DefaultRuleExecutor;
use crate::error::{EngineError, Result};
use crate::events::{EventBus, MonitorEvent};
use crate::monitor::ValidationMonitor;
use crate::orchestrator::ValidationOrchestrator;
use crate::registry::RuleRegistry;
use crate::store::{HttpOutcomeStore, HttpStoreConfig, InMemoryStore};
use crate::telemetry::MetricsRegistry;

/// Entity validation CLI
///
/// Validate entities against versioned rules, inspect rule sets and
/// summarize persisted validation results.
#[derive(Parser, Debug)]
#[command(name = "entity-validate")]
#[command(about = "Entity validation engine - validate entities and report on results", long_about = None)]
#[command(version)]
pub struct EntityCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine configuration file (TOML, YAML or JSON); environment otherwise
    #[arg(long, global = true, env = "VALIDATION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: EntityCommands,
}

/// Validation mode for the `validate` command
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum ValidateMode {
    /// Sync rules, cached, not persisted
    #[default]
    Sync,
    /// Async rules
    Async,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum EntityCommands {
    /// Validate one entity payload
    Validate {
        /// Entity type; selects the rule domain
        #[arg(short = 't', long = "type")]
        entity_type: String,

        /// Path to the entity payload
        #[arg(short, long)]
        payload: PathBuf,

        /// Path to the rules document (`rules: [...]`)
        #[arg(short, long)]
        rules: PathBuf,

        /// Path to the records document (`collection: [records]`)
        #[arg(long)]
        records: Option<PathBuf>,

        /// Only run the named rules (repeatable)
        #[arg(long = "rule")]
        rule_names: Vec<String>,

        #[arg(long, value_enum, default_value = "sync")]
        mode: ValidateMode,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Validate a list of entities (`[{type, data, id?}]`)
    Bulk {
        /// Path to the entities document
        #[arg(short, long)]
        entities: PathBuf,

        #[arg(short, long)]
        rules: PathBuf,

        #[arg(long)]
        records: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the active rules of a rules document
    Rules {
        #[arg(short, long)]
        rules: PathBuf,

        /// Restrict to one domain
        #[arg(short, long)]
        domain: Option<String>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Summarize a document of persisted outcomes
    Report {
        #[command(subcommand)]
        report: ReportCommand,
    },

    /// Run the scheduled monitor against a results service until Ctrl-C
    Monitor {
        /// Base URL of the results service; defaults to the configured one
        #[arg(long, env = "VALIDATION_RESULTS_URL")]
        results_url: Option<String>,

        /// Print the Prometheus exposition on exit
        #[arg(long)]
        print_metrics: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Report kinds
#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Rolling metrics over the trailing window
    Metrics {
        /// Path to the outcomes document
        #[arg(short, long)]
        results: PathBuf,

        /// End of the window (RFC 3339); now by default
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Per-entity-type summary of one UTC day
    Daily {
        #[arg(short, long)]
        results: PathBuf,

        /// Day to report (YYYY-MM-DD); yesterday by default
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Seven-day trend
    Weekly {
        #[arg(short, long)]
        results: PathBuf,

        /// Last day of the week (YYYY-MM-DD); yesterday by default
        #[arg(long)]
        ending: Option<NaiveDate>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Rules document layout
#[derive(Debug, Deserialize)]
pub struct RulesDocument {
    #[serde(default)]
    pub rules: Vec<NewRule>,
}

/// Read a document, choosing the parser by file extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EngineError::File(format!("Failed to read '{}': {}", path.display(), e))
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => Ok(serde_json::from_str(&content)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        "toml" => Ok(toml::from_str(&content)?),
        other => Err(EngineError::invalid_input(format!(
            "Unsupported file extension '{}' for '{}'",
            other,
            path.display()
        ))),
    }
}

/// Load the engine configuration from `path`, or from the environment
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

/// An in-process engine over an in-memory store
pub struct LocalEngine {
    pub store: Arc<InMemoryStore>,
    pub registry: Arc<RuleRegistry>,
    pub orchestrator: ValidationOrchestrator,
}

impl LocalEngine {
    pub async fn load(config: &EngineConfig, rules: &Path, records: Option<&Path>) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        if let Some(records) = records {
            let records: HashMap<String, Vec<serde_json::Value>> = read_document(records)?;
            store.load_records(records)?;
        }

        let registry = Arc::new(RuleRegistry::new(store.clone()));
        let document: RulesDocument = read_document(rules)?;
        for rule in document.rules {
            registry.create_rule(rule).await?;
        }

        let executor = Arc::new(DefaultRuleExecutor::new(store.clone(), config.executor.clone()));
        let orchestrator = ValidationOrchestrator::builder(Arc::clone(&registry), executor, store.clone())
            .cache_config(config.cache.clone())
            .events(Arc::new(EventBus::new(config.events.capacity)))
            .build();

        Ok(Self {
            store,
            registry,
            orchestrator,
        })
    }
}

fn yesterday() -> NaiveDate {
    (Utc::now() - ChronoDuration::days(1)).date_naive()
}

/// Execute the validate command
pub async fn execute_validate(
    config: &EngineConfig,
    entity_type: String,
    payload: PathBuf,
    rules: PathBuf,
    records: Option<PathBuf>,
    rule_names: Vec<String>,
    mode: ValidateMode,
    format: OutputFormat,
) -> Result<ExitCode> {
    let engine = LocalEngine::load(config, &rules, records.as_deref()).await?;
    let payload: serde_json::Value = read_document(&payload)?;
    let names = (!rule_names.is_empty()).then_some(rule_names.as_slice());

    let outcome = match mode {
        ValidateMode::Sync => engine.orchestrator.validate_sync(&entity_type, &payload, names).await,
        ValidateMode::Async => engine.orchestrator.validate_async(&entity_type, &payload, names).await,
    };

    emit(&outcome, format)?;
    Ok(ExitCode::from_validation_result(!outcome.is_valid, outcome.has_warnings()))
}

/// Execute the bulk command
pub async fn execute_bulk(
    config: &EngineConfig,
    entities: PathBuf,
    rules: PathBuf,
    records: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let engine = LocalEngine::load(config, &rules, records.as_deref()).await?;
    let entities: Vec<BulkEntity> = read_document(&entities)?;

    let validation = engine.orchestrator.validate_bulk(entities).await;
    emit(&validation, format)?;

    let summary = validation.summary;
    Ok(ExitCode::from_validation_result(summary.failed > 0, summary.warnings > 0))
}

/// Execute the rules command
pub async fn execute_rules(
    config: &EngineConfig,
    rules: PathBuf,
    domain: Option<String>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let engine = LocalEngine::load(config, &rules, None).await?;

    let domains = match domain {
        Some(domain) => vec![domain.parse::<Domain>().map_err(EngineError::InvalidInput)?],
        None => engine.registry.known_domains().await?,
    };

    let mut listed = Vec::new();
    for domain in &domains {
        listed.extend(engine.registry.list_rules(domain).await?);
    }
    listed.retain(|rule| rule.is_active);

    emit(&RuleList(listed), format)?;
    Ok(ExitCode::Success)
}

/// Execute a report command
pub async fn execute_report(config: &EngineConfig, report: ReportCommand) -> Result<ExitCode> {
    let (results, at) = match &report {
        ReportCommand::Metrics { results, at, .. } => (results, *at),
        ReportCommand::Daily { results, .. } | ReportCommand::Weekly { results, .. } => (results, None),
    };

    let store = Arc::new(InMemoryStore::new());
    let outcomes: Vec<ValidationOutcome> = read_document(results)?;
    store.load_outcomes(outcomes)?;

    let clock: Arc<dyn Clock> = match at {
        Some(at) => Arc::new(ManualClock::new(at)),
        None => Arc::new(SystemClock),
    };
    let monitor = ValidationMonitor::builder(store, config.monitor.clone())
        .clock(clock)
        .build();

    match report {
        ReportCommand::Metrics { format, .. } => emit(&monitor.run_metrics_tick().await?, format)?,
        ReportCommand::Daily { date, format, .. } => {
            emit(&monitor.daily_report(date.unwrap_or_else(yesterday)).await?, format)?
        }
        ReportCommand::Weekly { ending, format, .. } => {
            emit(&monitor.weekly_report(ending.unwrap_or_else(yesterday)).await?, format)?
        }
    }
    Ok(ExitCode::Success)
}

fn print_event(event: &MonitorEvent, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Table {
        return match format {
            OutputFormat::Yaml => {
                println!("---\n{}", serde_yaml::to_string(event)?);
                Ok(())
            }
            _ => {
                println!("{}", serde_json::to_string(event)?);
                Ok(())
            }
        };
    }

    let mut stdout = std::io::stdout();
    match event {
        MonitorEvent::Metrics { snapshot } => snapshot.render_table(&mut stdout)?,
        MonitorEvent::Alert { alert } => alert.render_table(&mut stdout)?,
        MonitorEvent::DailyReport { report } => report.render_table(&mut stdout)?,
        MonitorEvent::WeeklyReport { report } => report.render_table(&mut stdout)?,
    }
    Ok(())
}

/// Execute the monitor command
pub async fn execute_monitor(
    config: &EngineConfig,
    results_url: Option<String>,
    print_metrics: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut store_config = config.store.clone();
    if results_url.is_some() {
        store_config.results_url = results_url;
    }
    let http_config = HttpStoreConfig::from_store_config(&store_config).ok_or_else(|| {
        EngineError::invalid_input("A results service URL is required (--results-url)")
    })?;
    let store = Arc::new(HttpOutcomeStore::new(http_config)?);

    let metrics = MetricsRegistry::new()?;
    let monitor = ValidationMonitor::builder(store, config.monitor.clone())
        .events(Arc::new(EventBus::new(config.events.capacity)))
        .metrics(metrics.engine())
        .build();
    let mut events = monitor.events().subscribe();

    monitor.start()?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, format)?,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Monitor output lagging; events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    monitor.stop();

    if print_metrics {
        print!("{}", metrics.encode_text()?);
    }
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const RULES: &str = r#"
rules:
  - name: contact-schema
    domain: contact
    execution_kind: sync
    definition:
      kind: schema
      fields:
        email:
          type: string
          required: true
          format: email
"#;

    #[test]
    fn test_cli_parses_validate() {
        let cli = EntityCli::try_parse_from([
            "entity-validate",
            "validate",
            "--type",
            "contact",
            "--payload",
            "p.json",
            "--rules",
            "r.yaml",
            "--rule",
            "a",
            "--rule",
            "b",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            EntityCommands::Validate {
                entity_type,
                rule_names,
                mode,
                format,
                ..
            } => {
                assert_eq!(entity_type, "contact");
                assert_eq!(rule_names, vec!["a", "b"]);
                assert_eq!(mode, ValidateMode::Sync);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_read_document_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "payload.txt", "{}");
        let result: Result<serde_json::Value> = read_document(&path);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));

        let missing: Result<serde_json::Value> = read_document(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(EngineError::File(_))));
    }

    #[tokio::test]
    async fn test_validate_command_exit_codes() {
        let dir = TempDir::new().unwrap();
        let rules = write(&dir, "rules.yaml", RULES);
        let good = write(&dir, "good.json", r#"{"email": "a@example.com"}"#);
        let bad = write(&dir, "bad.json", r#"{"email": "nope"}"#);
        let config = EngineConfig::default();

        let code = execute_validate(
            &config,
            "contact".to_string(),
            good,
            rules.clone(),
            None,
            Vec::new(),
            ValidateMode::Sync,
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::Success);

        let code = execute_validate(
            &config,
            "contact".to_string(),
            bad,
            rules,
            None,
            Vec::new(),
            ValidateMode::Sync,
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::ValidationError);
    }

    #[tokio::test]
    async fn test_local_engine_uses_configured_event_capacity() {
        let dir = TempDir::new().unwrap();
        let rules = write(&dir, "rules.yaml", RULES);
        let mut config = EngineConfig::default();
        config.events.capacity = 16;

        let engine = LocalEngine::load(&config, &rules, None).await.unwrap();
        assert_eq!(engine.orchestrator.events().capacity(), 16);
    }

    #[tokio::test]
    async fn test_bulk_command_reports_failures() {
        let dir = TempDir::new().unwrap();
        let rules = write(&dir, "rules.yaml", RULES);
        let entities = write(
            &dir,
            "entities.json",
            r#"[{"type": "contact", "data": {"email": "a@example.com"}}, {"type": "contact", "id": "c-2"}]"#,
        );

        let code = execute_bulk(&EngineConfig::default(), entities, rules, None, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::ValidationError);
    }

    #[tokio::test]
    async fn test_monitor_requires_results_url() {
        let result = execute_monitor(&EngineConfig::default(), None, false, OutputFormat::Json).await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}

//! CLI module for the entity validation engine
//!
//! Validates entity payloads against rule documents, lists rules, summarizes
//! persisted outcomes and runs the scheduled monitor.

pub mod commands;
pub mod output;

pub use commands::{EntityCli, EntityCommands, ReportCommand};
pub use output::{OutputFormat, TableRender};

use colored::Colorize;

use crate::error::{EngineError, Result};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// All validations passed
    Success = 0,
    /// Validation failed with errors
    ValidationError = 1,
    /// Validation passed with warnings
    ValidationWarning = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code from validation result
    pub fn from_validation_result(has_errors: bool, has_warnings: bool) -> Self {
        if has_errors {
            ExitCode::ValidationError
        } else if has_warnings {
            ExitCode::ValidationWarning
        } else {
            ExitCode::Success
        }
    }

    /// Exit code for a command that failed before producing a result
    pub fn from_error(err: &EngineError) -> Self {
        match err {
            EngineError::File(_) => ExitCode::FileError,
            EngineError::InvalidInput(_)
            | EngineError::InvalidRule(_)
            | EngineError::Conflict(_)
            | EngineError::NotFound(_)
            | EngineError::Config(_)
            | EngineError::Serialization(_) => ExitCode::InvalidInput,
            _ => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments
pub async fn run(cli: EntityCli) -> Result<ExitCode> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        EntityCommands::Validate {
            entity_type,
            payload,
            rules,
            records,
            rule_names,
            mode,
            format,
        } => {
            commands::execute_validate(&config, entity_type, payload, rules, records, rule_names, mode, format)
                .await
        }
        EntityCommands::Bulk {
            entities,
            rules,
            records,
            format,
        } => commands::execute_bulk(&config, entities, rules, records, format).await,
        EntityCommands::Rules { rules, domain, format } => {
            commands::execute_rules(&config, rules, domain, format).await
        }
        EntityCommands::Report { report } => commands::execute_report(&config, report).await,
        EntityCommands::Monitor {
            results_url,
            print_metrics,
            format,
        } => commands::execute_monitor(&config, results_url, print_metrics, format).await,
    }
}

/// Run the CLI, printing any error, and return the exit code
pub async fn run_cli(cli: EntityCli) -> ExitCode {
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::ValidationError), 1);
        assert_eq!(i32::from(ExitCode::ValidationWarning), 2);
        assert_eq!(i32::from(ExitCode::InternalError), 10);
    }

    #[test]
    fn test_exit_code_from_validation_result() {
        assert_eq!(ExitCode::from_validation_result(false, false), ExitCode::Success);
        assert_eq!(ExitCode::from_validation_result(true, false), ExitCode::ValidationError);
        assert_eq!(ExitCode::from_validation_result(false, true), ExitCode::ValidationWarning);
        assert_eq!(ExitCode::from_validation_result(true, true), ExitCode::ValidationError);
    }

    #[test]
    fn test_exit_code_from_error() {
        assert_eq!(
            ExitCode::from_error(&EngineError::File("missing".to_string())),
            ExitCode::FileError
        );
        assert_eq!(
            ExitCode::from_error(&EngineError::invalid_input("bad")),
            ExitCode::InvalidInput
        );
        assert_eq!(
            ExitCode::from_error(&EngineError::Internal("boom".to_string())),
            ExitCode::InternalError
        );
    }
}

//! The `check` command.
//!
//! Loads a schema and the settings and reports problems that would surface
//! only when a query is compiled.

use std::io::Write;

use cteql_core::{CteqlError, CteqlResult, Settings};
use cteql_db::{Dialect, ModelRegistry};

use crate::command::ManagementCommand;
use crate::commands::sqlcte::read_json;

/// Runs schema and configuration checks.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity level of this check result.
    pub level: CheckLevel,
    /// A human-readable description of the issue.
    pub msg: String,
    /// An optional hint for how to resolve the issue.
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "schema.W001").
    pub id: String,
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    /// Informational message.
    Info,
    /// A warning that may indicate a problem.
    Warning,
    /// An error that must be resolved.
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Runs every check against `registry` and `settings`.
pub fn run_checks(registry: &ModelRegistry, settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    match Dialect::from_name(&settings.dialect) {
        Err(err) => messages.push(CheckMessage {
            level: CheckLevel::Error,
            msg: err.to_string(),
            hint: Some("Use one of sqlite, mysql, postgres, mssql".to_string()),
            id: "config.E001".to_string(),
        }),
        Ok(dialect) => {
            if !dialect.supports_cte_order_limit_offset
                && settings.cte_pagination == cteql_core::CtePagination::Drop
            {
                messages.push(CheckMessage {
                    level: CheckLevel::Warning,
                    msg: format!(
                        "ORDER BY/LIMIT/OFFSET inside CTEs is silently dropped on {}",
                        dialect.name()
                    ),
                    hint: Some("Set cte_pagination = \"reject\" to fail instead".to_string()),
                    id: "config.W001".to_string(),
                });
            }
        }
    }

    let models = registry.model_names();
    if models.is_empty() {
        messages.push(CheckMessage {
            level: CheckLevel::Warning,
            msg: "The schema declares no models".to_string(),
            hint: None,
            id: "schema.W001".to_string(),
        });
    }

    for name in models {
        let Ok(model) = registry.model(name) else {
            continue;
        };
        let walkable = registry.associations_of(name).into_iter().any(|assoc| {
            registry
                .model(&assoc.target)
                .is_ok_and(|target| model.columns().all(|c| target.has_column(c)))
        });
        if !walkable {
            messages.push(CheckMessage {
                level: CheckLevel::Info,
                msg: format!("Model '{name}' has no association usable as a recursive step"),
                hint: Some("Recursive CTEs need an association whose target has every column of the model".to_string()),
                id: "schema.I001".to_string(),
            });
        }
    }

    messages
}

impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Check a schema and the settings"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("schema")
                .long("schema")
                .required(true)
                .value_name("FILE")
                .help("JSON file declaring models and associations"),
        )
    }

    fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        out: &mut dyn Write,
    ) -> CteqlResult<()> {
        let schema_path = matches
            .get_one::<String>("schema")
            .ok_or_else(|| CteqlError::ConfigurationError("--schema is required".to_string()))?;
        let registry = ModelRegistry::from_json(&read_json(schema_path, &mut std::io::stdin())?)?;
        let messages = run_checks(&registry, settings);

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            writeln!(out, "{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text)?;
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();
        if messages.is_empty() {
            writeln!(out, "Check identified no issues")?;
        } else {
            tracing::info!(errors, warnings, "check identified {} issue(s)", messages.len());
        }

        if errors > 0 {
            return Err(CteqlError::ConfigurationError(format!(
                "Check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}

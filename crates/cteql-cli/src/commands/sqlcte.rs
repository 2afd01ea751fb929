//! The `sqlcte` command.
//!
//! Compiles a JSON query document against a JSON schema and prints the SQL.
//! Nothing is executed; the output is one statement terminated with `;`.

use std::io::{Read, Write};
use std::path::Path;

use cteql_core::{CtePagination, CteqlError, CteqlResult, Settings};
use cteql_db::{parse_select, ModelRegistry, SqlCompiler};

use crate::command::ManagementCommand;

/// Prints the SQL for a query document.
pub struct SqlcteCommand;

/// Reads a JSON document from `path`, or from `stdin` when `path` is `-`.
pub fn read_json(path: &str, stdin: &mut dyn Read) -> CteqlResult<serde_json::Value> {
    let text = if path == "-" {
        let mut buf = String::new();
        stdin.read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(Path::new(path))?
    };
    serde_json::from_str(&text)
        .map_err(|e| CteqlError::SerializationError(format!("Failed to parse JSON from '{path}': {e}")))
}

/// Compiles `query` over `model` using the dialect and pagination policy in
/// `settings`.
pub fn compile_document(
    registry: &ModelRegistry,
    model: &str,
    query: &serde_json::Value,
    settings: &Settings,
) -> CteqlResult<String> {
    let compiler = SqlCompiler::from_settings(settings)?;
    compiler.compile_select(registry, &parse_select(model, query)?)
}

impl ManagementCommand for SqlcteCommand {
    fn name(&self) -> &'static str {
        "sqlcte"
    }

    fn help(&self) -> &'static str {
        "Print the SQL for a recursive CTE query document"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("schema")
                .long("schema")
                .required(true)
                .value_name("FILE")
                .help("JSON file declaring models and associations"),
        )
        .arg(
            clap::Arg::new("model")
                .long("model")
                .short('m')
                .required(true)
                .help("The model the outer SELECT reads"),
        )
        .arg(
            clap::Arg::new("query")
                .long("query")
                .short('q')
                .default_value("-")
                .value_name("FILE")
                .help("JSON query document, '-' for stdin"),
        )
        .arg(
            clap::Arg::new("dialect")
                .long("dialect")
                .short('d')
                .help("Dialect preset, overriding the settings"),
        )
        .arg(
            clap::Arg::new("cte-pagination")
                .long("cte-pagination")
                .value_parser(["reject", "drop"])
                .help("Policy for ORDER BY/LIMIT/OFFSET the dialect cannot place inside a CTE"),
        )
    }

    fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        out: &mut dyn Write,
    ) -> CteqlResult<()> {
        let mut settings = settings.clone();
        if let Some(dialect) = matches.get_one::<String>("dialect") {
            settings.dialect.clone_from(dialect);
        }
        if let Some(policy) = matches.get_one::<String>("cte-pagination") {
            settings.cte_pagination = policy.parse::<CtePagination>()?;
        }

        let schema_path = matches
            .get_one::<String>("schema")
            .ok_or_else(|| CteqlError::ConfigurationError("--schema is required".to_string()))?;
        let model = matches
            .get_one::<String>("model")
            .ok_or_else(|| CteqlError::ConfigurationError("--model is required".to_string()))?;
        let query_path = matches.get_one::<String>("query").map_or("-", String::as_str);

        let registry = ModelRegistry::from_json(&read_json(schema_path, &mut std::io::empty())?)?;
        let query = read_json(query_path, &mut std::io::stdin())?;

        tracing::info!(
            model = %model,
            dialect = %settings.dialect,
            policy = %settings.cte_pagination,
            "compiling query document"
        );
        let sql = compile_document(&registry, model, &query, &settings)?;
        writeln!(out, "{sql}")?;
        Ok(())
    }
}

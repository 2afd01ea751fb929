//! The `cteql` binary.
//!
//! ```bash
//! cteql sqlcte --schema schema.json --model user --query query.json --dialect postgres
//! cteql dialects
//! cteql check --schema schema.json --settings cteql.toml
//! ```

use anyhow::Context;
use cteql_cli::command::CommandRegistry;
use cteql_cli::commands::register_builtin_commands;
use cteql_core::logging::setup_logging;
use cteql_core::settings_loader;

fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match matches.get_one::<String>("settings") {
        Some(path) => settings_loader::from_file_with_env(path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => settings_loader::from_env().context("reading CTEQL_* environment")?,
    };
    setup_logging(&settings);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    registry.execute(&matches, &settings, &mut out)?;
    Ok(())
}

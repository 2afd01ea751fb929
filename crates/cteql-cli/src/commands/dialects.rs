//! The `dialects` command.
//!
//! Prints the capability table of every dialect preset.

use std::io::Write;

use cteql_core::{CteqlResult, Settings};
use cteql_db::{Dialect, LimitSyntax};

use crate::command::ManagementCommand;

/// Lists the dialect presets and what each can express.
pub struct DialectsCommand;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

const fn limit_syntax(syntax: LimitSyntax) -> &'static str {
    match syntax {
        LimitSyntax::LimitOffset => "LIMIT n OFFSET m",
        LimitSyntax::OffsetComma => "LIMIT m, n",
        LimitSyntax::OffsetFetch => "OFFSET m ROWS FETCH NEXT n ROWS ONLY",
    }
}

/// Renders one row per preset, marking the one `selected` names.
pub fn capability_table(selected: &str) -> Vec<String> {
    let mut rows = vec![format!(
        "  {:<10} {:<7} {:<10} {:<8} {:<9} {}",
        "dialect", "quote", "recursive", "keyword", "cte-page", "pagination"
    )];
    for dialect in Dialect::presets() {
        let marker = if dialect.name() == selected { '*' } else { ' ' };
        rows.push(format!(
            "{marker} {:<10} {:<7} {:<10} {:<8} {:<9} {}",
            dialect.name(),
            format!("{}{}", dialect.quote_open, dialect.quote_close),
            yes_no(dialect.supports_recursive_cte),
            yes_no(dialect.recursive_keyword),
            yes_no(dialect.supports_cte_order_limit_offset),
            limit_syntax(dialect.limit_syntax),
        ));
    }
    rows
}

impl ManagementCommand for DialectsCommand {
    fn name(&self) -> &'static str {
        "dialects"
    }

    fn help(&self) -> &'static str {
        "List dialect presets and their CTE capabilities"
    }

    fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
        out: &mut dyn Write,
    ) -> CteqlResult<()> {
        let selected = Dialect::from_name(&settings.dialect).map_or("", |d| d.name());
        for row in capability_table(selected) {
            writeln!(out, "{}", row.trim_end())?;
        }
        Ok(())
    }
}

//! Built-in commands.
//!
//! Each command implements the
//! [`ManagementCommand`](crate::command::ManagementCommand) trait.

pub mod check;
pub mod dialects;
pub mod sqlcte;

pub use check::CheckCommand;
pub use dialects::DialectsCommand;
pub use sqlcte::SqlcteCommand;

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(SqlcteCommand));
    registry.register(Box::new(DialectsCommand));
    registry.register(Box::new(CheckCommand));
}

//! SQL Execution
//!
//! The DuckDB tools talk to a [`SqlRunner`], so they can be driven by the real
//! `duckdb` CLI or by an in-memory mock.

mod duckdb_cli;
mod mock;

pub use duckdb_cli::DuckDbCli;
pub use mock::MockSqlRunner;

use async_trait::async_trait;

use crate::error::{Result, ToolsError};

/// SQL runner trait (Strategy pattern)
#[async_trait]
pub trait SqlRunner: Send + Sync {
    /// Run one command (SQL or a CLI dot-command) and return its text output
    async fn execute(&self, command: &str) -> Result<String>;

    /// Runner name, for logs
    fn name(&self) -> &str;
}

/// Quote a possibly schema-qualified table name as SQL identifiers.
///
/// `main.users` becomes `"main"."users"`; embedded quotes are doubled.
/// Every `.` separates identifiers, so a table whose own name contains a dot
/// cannot be addressed through this function.
pub fn quote_ident(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains('\0') {
        return Err(ToolsError::InvalidIdentifier(name.to_string()));
    }
    let parts: Vec<&str> = name.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ToolsError::InvalidIdentifier(name.to_string()));
    }
    Ok(parts
        .iter()
        .map(|p| format!("\"{}\"", p.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join("."))
}

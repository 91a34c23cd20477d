//! DuckDB CLI runner
//!
//! Runs `duckdb <db> -c <command>` as a subprocess. Arguments are passed
//! directly to the process, never through a shell.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::SqlRunner;
use crate::error::{Result, ToolsError};

/// Runner backed by the `duckdb` command-line shell
#[derive(Clone, Debug)]
pub struct DuckDbCli {
    binary: PathBuf,
    db_path: PathBuf,
    timeout: Duration,
}

impl DuckDbCli {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("duckdb"),
            db_path: db_path.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Use a specific `duckdb` executable
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }
}

#[async_trait]
impl SqlRunner for DuckDbCli {
    async fn execute(&self, command: &str) -> Result<String> {
        tracing::debug!(db = %self.db_path.display(), %command, "Running duckdb");

        let child = Command::new(&self.binary)
            .arg(&self.db_path)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ToolsError::QueryTimeout(self.timeout.as_secs()))?
            .map_err(|source| ToolsError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolsError::QueryFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "duckdb"
    }
}

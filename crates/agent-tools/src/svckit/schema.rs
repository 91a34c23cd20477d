//! Schema exploration tools: `list_tables`, `describe_table`, `sample_table`

use std::sync::Arc;

use agent_core::{ParamType, ParameterSpec, Result as CoreResult, Tool, ToolArgs, ToolHandler, ToolSpec};
use async_trait::async_trait;

use crate::error::ToolsError;
use crate::sql::{SqlRunner, quote_ident};

const MAX_SAMPLE_ROWS: i64 = 1000;

fn reasoning_param(description: &str) -> ParameterSpec {
    ParameterSpec::required("reasoning", ParamType::String, description)
}

/// Lists the tables in the database
pub struct ListTablesTool {
    runner: Arc<dyn SqlRunner>,
}

impl ListTablesTool {
    pub fn new(runner: Arc<dyn SqlRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolHandler for ListTablesTool {
    async fn invoke(&self, args: ToolArgs<'_>) -> CoreResult<String> {
        tracing::info!(reasoning = args.reasoning(), "list_tables");
        let output = self.runner.execute(".tables").await?;
        let tables: Vec<&str> = output.split_whitespace().collect();
        Ok(tables.join("\n"))
    }
}

impl Tool for ListTablesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("list_tables", "Returns list of available tables in database")
            .param(reasoning_param("Why we need to list tables relative to user request"))
    }
}

/// Shows the schema of one table
pub struct DescribeTableTool {
    runner: Arc<dyn SqlRunner>,
}

impl DescribeTableTool {
    pub fn new(runner: Arc<dyn SqlRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolHandler for DescribeTableTool {
    async fn invoke(&self, args: ToolArgs<'_>) -> CoreResult<String> {
        let table = args.str("table_name")?;
        tracing::info!(reasoning = args.reasoning(), table, "describe_table");
        let sql = format!("DESCRIBE {};", quote_ident(table)?);
        Ok(self.runner.execute(&sql).await?)
    }
}

impl Tool for DescribeTableTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("describe_table", "Returns schema info for specified table")
            .param(reasoning_param("Why we need to describe this table"))
            .param(ParameterSpec::required("table_name", ParamType::String, "Name of table to describe"))
    }
}

/// Returns a few rows of one table
pub struct SampleTableTool {
    runner: Arc<dyn SqlRunner>,
}

impl SampleTableTool {
    pub fn new(runner: Arc<dyn SqlRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolHandler for SampleTableTool {
    async fn invoke(&self, args: ToolArgs<'_>) -> CoreResult<String> {
        let table = args.str("table_name")?;
        let rows = args.int("row_sample_size")?;
        if !(1..=MAX_SAMPLE_ROWS).contains(&rows) {
            return Err(ToolsError::InvalidArgument(format!(
                "row_sample_size must be between 1 and {MAX_SAMPLE_ROWS}, got {rows}"
            ))
            .into());
        }
        tracing::info!(reasoning = args.reasoning(), table, rows, "sample_table");
        let sql = format!("SELECT * FROM {} LIMIT {rows};", quote_ident(table)?);
        Ok(self.runner.execute(&sql).await?)
    }
}

impl Tool for SampleTableTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "sample_table",
            "Returns sample rows from specified table, always specify row_sample_size",
        )
        .param(reasoning_param("Why we need to sample this table"))
        .param(ParameterSpec::required("table_name", ParamType::String, "Name of table to sample"))
        .param(ParameterSpec::required(
            "row_sample_size",
            ParamType::Integer,
            "Number of rows to sample aim for 3-5 rows",
        ))
    }
}
